use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use shasthyo_core::connectivity::{ConnectivityHandle, HttpProbe, ReachabilityProbe};
use shasthyo_core::models::{Symptom, SymptomRef, SyncQueueItem};
use shasthyo_core::rpc::HttpRpcClient;
use shasthyo_core::sync::ReconciliationCoordinator;
use shasthyo_core::triage::RuleEngine;
use shasthyo_core::{EngineConfig, StoreService, TriageService};

use crate::error::CliError;

/// Resolved invocation context shared by all commands
pub struct CliContext {
    pub db_path: PathBuf,
    pub offline: bool,
    pub config: EngineConfig,
}

impl CliContext {
    /// Layered resolution: flags override `SHASTHYO_*` env vars, which
    /// override the config file, which overrides built-in defaults.
    pub fn resolve(
        db_path: Option<PathBuf>,
        api_url: Option<String>,
        offline: bool,
    ) -> Result<Self, CliError> {
        let mut config = load_config_file()?;
        if let Some(url) = api_url.or_else(|| env::var("SHASTHYO_API_URL").ok()) {
            config.api_base_url = url;
        }
        config.validate()?;

        let db_path = db_path
            .or_else(|| env::var_os("SHASTHYO_DB_PATH").map(PathBuf::from))
            .or_else(|| config.db_path.clone())
            .unwrap_or_else(default_db_path);

        Ok(Self {
            db_path,
            offline,
            config,
        })
    }
}

fn load_config_file() -> Result<EngineConfig, CliError> {
    let Some(path) = default_config_path() else {
        return Ok(EngineConfig::default());
    };
    if !path.exists() {
        return Ok(EngineConfig::default());
    }

    let payload = std::fs::read_to_string(&path)?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(EngineConfig::from_json(&payload)?)
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("shasthyo").join("config.json"))
}

/// The wired-up engine a command operates on
pub struct Engine {
    pub service: TriageService,
    pub store: StoreService,
    pub rpc: Arc<HttpRpcClient>,
    pub connectivity: ConnectivityHandle,
}

/// Open the store, probe reachability once, and assemble the service
/// stack. CLI invocations are one-shot, so a single probe stands in for
/// the long-running connectivity monitor the mobile client runs.
pub async fn build_engine(context: &CliContext) -> Result<Engine, CliError> {
    let store = StoreService::open_path(&context.db_path)?;
    let rpc = Arc::new(
        HttpRpcClient::new(context.config.api_base_url(), context.config.request_timeout())
            .map_err(|error| CliError::Http(error.to_string()))?,
    );

    let connectivity = if context.offline {
        ConnectivityHandle::fixed(false)
    } else {
        let probe = HttpProbe::new(rpc.health_url(), context.config.request_timeout())
            .map_err(|error| CliError::Http(error.to_string()))?;
        let online = probe.probe().await;
        tracing::debug!(online, "one-shot reachability probe");
        ConnectivityHandle::fixed(online)
    };

    let service = TriageService::new(
        store.clone(),
        Arc::clone(&rpc) as Arc<dyn shasthyo_core::rpc::RpcClient>,
        connectivity.clone(),
        RuleEngine::with_embedded_table(),
    );

    Ok(Engine {
        service,
        store,
        rpc,
        connectivity,
    })
}

pub fn build_coordinator(context: &CliContext, engine: &Engine) -> ReconciliationCoordinator {
    ReconciliationCoordinator::new(
        engine.store.clone(),
        Arc::clone(&engine.rpc) as Arc<dyn shasthyo_core::rpc::RpcClient>,
        engine.connectivity.clone(),
        context.config.retry_policy(),
        context.config.drain_interval(),
    )
}

/// Map CLI symptom IDs onto catalog entries. IDs missing from the cache
/// still go through with the raw ID for both display names, so triage
/// works before the first catalog fetch.
pub fn resolve_symptom_refs(catalog: &[Symptom], ids: &[String]) -> Vec<SymptomRef> {
    ids.iter()
        .map(|id| {
            catalog
                .iter()
                .find(|symptom| symptom.id == *id)
                .map_or_else(|| SymptomRef::new(id, id, id), Symptom::to_ref)
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct QueueListItem {
    pub sequence_no: i64,
    pub action: String,
    pub status: String,
    pub attempt_count: u32,
    pub enqueued_at: i64,
    pub enqueued_at_iso: String,
    pub last_error: Option<String>,
}

pub fn queue_item_to_list_item(item: &SyncQueueItem) -> QueueListItem {
    QueueListItem {
        sequence_no: item.sequence_no,
        action: item.kind().to_string(),
        status: item.status.to_string(),
        attempt_count: item.attempt_count,
        enqueued_at: item.enqueued_at,
        enqueued_at_iso: format_timestamp(item.enqueued_at),
        last_error: item.last_error.clone(),
    }
}

pub fn format_queue_lines(items: &[SyncQueueItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            let base = format!(
                "{:>5}  {:<20}  {:<16}  tries={}  {}",
                item.sequence_no,
                item.kind(),
                item.status,
                item.attempt_count,
                format_timestamp(item.enqueued_at)
            );
            match &item.last_error {
                Some(error) => format!("{base}  {error}"),
                None => base,
            }
        })
        .collect()
}

pub fn format_symptom_lines(symptoms: &[Symptom]) -> Vec<String> {
    symptoms
        .iter()
        .map(|symptom| {
            let category = symptom.category.as_deref().unwrap_or("-");
            format!(
                "{:<24}  {:<24}  {:<16}  {}",
                symptom.id, symptom.name_en, category, symptom.name_bn
            )
        })
        .collect()
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shasthyo")
        .join("shasthyo.db")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn catalog() -> Vec<Symptom> {
        vec![Symptom {
            id: "fever".to_string(),
            name_en: "Fever".to_string(),
            name_bn: "জ্বর".to_string(),
            icon: None,
            category: Some("general".to_string()),
            severity_weight: 2,
        }]
    }

    #[test]
    fn resolve_symptom_refs_prefers_catalog_names() {
        let refs = resolve_symptom_refs(&catalog(), &["fever".to_string()]);
        assert_eq!(refs[0].name_en, "Fever");
        assert_eq!(refs[0].name_bn, "জ্বর");
    }

    #[test]
    fn resolve_symptom_refs_falls_back_to_raw_id() {
        let refs = resolve_symptom_refs(&catalog(), &["dizziness".to_string()]);
        assert_eq!(refs[0].id, "dizziness");
        assert_eq!(refs[0].name_en, "dizziness");
    }

    #[test]
    fn format_timestamp_renders_utc() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
    }

    #[test]
    fn format_symptom_lines_includes_both_names() {
        let lines = format_symptom_lines(&catalog());
        assert!(lines[0].contains("fever"));
        assert!(lines[0].contains("Fever"));
        assert!(lines[0].contains("জ্বর"));
    }
}
