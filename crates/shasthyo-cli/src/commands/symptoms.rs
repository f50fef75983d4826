use crate::commands::common::{build_engine, format_symptom_lines, CliContext};
use crate::error::CliError;

pub async fn run_symptoms(
    refresh: bool,
    as_json: bool,
    context: &CliContext,
) -> Result<(), CliError> {
    let engine = build_engine(context).await?;

    let symptoms = if refresh {
        engine.service.refresh_symptoms().await?
    } else {
        engine.service.symptom_catalog().await?
    };

    if symptoms.is_empty() {
        return Err(CliError::EmptyCatalog);
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&symptoms)?);
    } else {
        for line in format_symptom_lines(&symptoms) {
            println!("{line}");
        }
    }

    Ok(())
}
