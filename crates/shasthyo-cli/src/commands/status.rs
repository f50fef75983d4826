use shasthyo_core::EngineSnapshot;

use crate::commands::common::{build_engine, CliContext};
use crate::error::CliError;

pub async fn run_status(as_json: bool, context: &CliContext) -> Result<(), CliError> {
    let engine = build_engine(context).await?;
    let snapshot = engine.service.snapshot()?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        for line in format_status(&snapshot) {
            println!("{line}");
        }
    }

    Ok(())
}

pub fn format_status(snapshot: &EngineSnapshot) -> Vec<String> {
    vec![
        format!("state:    {}", snapshot.sync_state()),
        format!(
            "backend:  {}",
            if snapshot.online {
                "reachable"
            } else {
                "unreachable"
            }
        ),
        format!("pending:  {}", snapshot.pending_actions),
        format!("failed:   {}", snapshot.failed_actions),
    ]
}
