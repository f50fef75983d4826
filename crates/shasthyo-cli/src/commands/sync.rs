use shasthyo_core::sync::DrainOutcome;

use crate::commands::common::{build_coordinator, build_engine, CliContext};
use crate::error::CliError;

pub async fn run_sync(context: &CliContext) -> Result<(), CliError> {
    let engine = build_engine(context).await?;
    if !engine.connectivity.is_online() {
        println!("Backend unreachable; queued actions were left untouched.");
        return Ok(());
    }

    let coordinator = build_coordinator(context, &engine);
    match coordinator.drain().await? {
        DrainOutcome::Coalesced => println!("Another sync is already in progress."),
        DrainOutcome::Drained(report) => {
            println!(
                "Sync finished: {} acknowledged, {} rejected{}",
                report.acknowledged,
                report.rejected,
                if report.stalled {
                    " (some items deferred)"
                } else {
                    ""
                }
            );
        }
    }

    Ok(())
}
