use shasthyo_core::models::Consultation;

use crate::commands::common::{build_engine, format_timestamp, CliContext};
use crate::error::CliError;

pub async fn run_consultations(as_json: bool, context: &CliContext) -> Result<(), CliError> {
    let engine = build_engine(context).await?;
    let consultations = engine.service.consultations().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&consultations)?);
        return Ok(());
    }

    if consultations.is_empty() {
        println!("No consultations recorded.");
        return Ok(());
    }

    for line in format_consultation_lines(&consultations) {
        println!("{line}");
    }

    Ok(())
}

pub fn format_consultation_lines(consultations: &[Consultation]) -> Vec<String> {
    consultations
        .iter()
        .map(|consultation| {
            let symptoms = consultation
                .symptoms
                .iter()
                .map(|symptom| symptom.id.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "{}  {:<10}  {}{}",
                format_timestamp(consultation.created_at.timestamp_millis()),
                consultation.severity_level,
                symptoms,
                if consultation.is_offline_result {
                    "  (offline)"
                } else {
                    ""
                }
            )
        })
        .collect()
}
