use shasthyo_core::models::TriageResult;

use crate::cli::DurationArg;
use crate::commands::common::{build_engine, resolve_symptom_refs, CliContext};
use crate::error::CliError;

pub async fn run_triage(
    symptom_ids: &[String],
    duration: Option<DurationArg>,
    as_json: bool,
    context: &CliContext,
) -> Result<(), CliError> {
    let engine = build_engine(context).await?;

    let catalog = engine.store.cached_symptoms()?;
    let symptoms = resolve_symptom_refs(&catalog, symptom_ids);
    let result = engine
        .service
        .submit_triage(symptoms, duration.map(DurationArg::to_duration))
        .await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for line in format_triage_result(&result) {
            println!("{line}");
        }
    }

    Ok(())
}

pub fn format_triage_result(result: &TriageResult) -> Vec<String> {
    let source = if result.is_offline_result {
        match &result.rule_version {
            Some(version) => format!("offline, rules {version}"),
            None => "offline".to_string(),
        }
    } else {
        "server".to_string()
    };

    let mut lines = vec![
        format!(
            "Severity: {} ({source})",
            result.severity_level.as_str().to_uppercase()
        ),
        String::new(),
        result.explanation.clone(),
        String::new(),
        result.guidance_bn.clone(),
        String::new(),
        result.guidance_en.clone(),
    ];
    if result.is_offline_result {
        lines.push(String::new());
        lines.push("This result was produced offline and will be confirmed when a connection is available.".to_string());
    }
    lines
}
