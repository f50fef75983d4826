use shasthyo_core::models::{Gender, ProfileDraft, UserProfile};

use crate::commands::common::{build_engine, CliContext};
use crate::error::CliError;

pub async fn run_profile_set(
    age: u32,
    gender: &str,
    location: Option<String>,
    context: &CliContext,
) -> Result<(), CliError> {
    let gender: Gender = gender
        .parse()
        .map_err(|_| CliError::InvalidGender(gender.to_string()))?;

    let engine = build_engine(context).await?;
    let profile = engine
        .service
        .save_profile(ProfileDraft {
            age,
            gender,
            location,
        })
        .await?;

    println!("{}", profile.id);
    Ok(())
}

pub async fn run_profile_show(as_json: bool, context: &CliContext) -> Result<(), CliError> {
    let engine = build_engine(context).await?;

    // Prefer the backend copy when reachable; edits from another device
    // only reach the local store through this refresh.
    let profile = if engine.connectivity.is_online() {
        match engine.service.refresh_profile().await {
            Ok(profile) => Some(profile),
            Err(error) => {
                tracing::warn!("profile refresh failed, showing local copy: {error}");
                engine.service.profile()?
            }
        }
    } else {
        engine.service.profile()?
    };
    let profile = profile.ok_or(CliError::ProfileMissing)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        for line in format_profile(&profile) {
            println!("{line}");
        }
    }

    Ok(())
}

pub fn format_profile(profile: &UserProfile) -> Vec<String> {
    vec![
        format!("id:        {}", profile.id),
        format!("age:       {}", profile.age),
        format!("gender:    {}", profile.gender),
        format!(
            "location:  {}",
            profile.location.as_deref().unwrap_or("-")
        ),
        format!(
            "created:   {}",
            profile.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
    ]
}
