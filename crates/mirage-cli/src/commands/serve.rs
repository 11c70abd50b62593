//! `mirage serve` - run the enabled front ends until interrupted.

use crate::commands::check;
use anyhow::{Context, Result};
use mirage_adapter_ollama::OllamaBackend;
use mirage_adapter_pg::PostgresStore;
use mirage_audit::AuditLogger;
use mirage_core::MirageConfig;
use mirage_proxy::MirageProxy;
use mirage_runtime::{DeceptionRouter, RowStore};
use mirage_server::HttpServer;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Read, schema-check and validate a configuration file.
pub fn load_config(path: &Path) -> Result<MirageConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let results = check::check_content(&content);

    for finding in &results.findings {
        match finding.severity {
            check::Severity::Error => {
                tracing::error!(category = finding.category, "{}", finding.message)
            }
            check::Severity::Warning => warn!(category = finding.category, "{}", finding.message),
        }
    }
    if results.has_errors() {
        anyhow::bail!(
            "{} has {} error(s); run `mirage check` for details",
            path.display(),
            results.error_count()
        );
    }

    results
        .config
        .with_context(|| format!("{} could not be parsed", path.display()))
}

async fn connect_store(config: &MirageConfig) -> Result<PostgresStore> {
    match PostgresStore::connect(&config.upstream).await {
        Ok(store) => Ok(store),
        Err(e) => {
            warn!(
                upstream = %config.upstream.redacted_target(),
                error = %e,
                "Upstream unreachable; connecting on first benign query"
            );
            PostgresStore::connect_lazy(&config.upstream)
                .context("invalid upstream connection settings")
        }
    }
}

pub async fn run(config_path: &Path) -> Result<()> {
    info!(config = %config_path.display(), "Loading configuration");
    let config = load_config(config_path)?;

    let audit = Arc::new(
        AuditLogger::new(config.audit.clone()).context("failed to initialize audit logger")?,
    );
    let store: Arc<dyn RowStore> = Arc::new(connect_store(&config).await?);
    let backend = OllamaBackend::from_config(&config.shadow)
        .context("failed to build generative backend client")?;
    info!(
        base_url = %config.shadow.base_url,
        model = %config.shadow.model,
        record_count = config.shadow.record_count,
        "Shadow path ready"
    );

    let router = Arc::new(DeceptionRouter::from_config(
        &config,
        store,
        Arc::new(backend),
        audit,
    ));

    let mut front_ends: JoinSet<Result<()>> = JoinSet::new();

    if config.proxy.enabled {
        let proxy = MirageProxy::new(config.proxy.clone(), router.clone());
        front_ends.spawn(async move { proxy.run().await.context("Postgres front end stopped") });
    }

    if config.http.enabled {
        let server = HttpServer::new(config.http.clone(), router.clone());
        front_ends.spawn(async move { server.run().await.context("HTTP front end stopped") });
    }

    tokio::select! {
        result = supervise(front_ends) => result,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            info!("Shutdown signal received");
            Ok(())
        }
    }
}

/// Wait on every front end; the first one to fail ends the wait with its
/// error. Dropping the set aborts the rest.
async fn supervise(mut front_ends: JoinSet<Result<()>>) -> Result<()> {
    while let Some(joined) = front_ends.join_next().await {
        if let Err(e) = joined.context("front end task failed")? {
            tracing::error!(error = %format!("{:#}", e), "Front end failed");
            return Err(e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirage.yaml");
        fs::write(&path, "shadow:\n  record_count: 0\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_load_config_accepts_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirage.yaml");
        fs::write(&path, "").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.proxy.listen_port, 5433);
    }

    #[tokio::test]
    async fn test_first_failed_front_end_ends_supervision() {
        let mut front_ends: JoinSet<Result<()>> = JoinSet::new();
        front_ends.spawn(std::future::pending::<Result<()>>());
        front_ends.spawn(async { Err(anyhow::anyhow!("address already in use")) });

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), supervise(front_ends))
            .await
            .expect("supervision should end once a front end fails");

        assert!(result.unwrap_err().to_string().contains("address already in use"));
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = taken.local_addr().unwrap().to_string();

        let config = MirageConfig::default();
        let router = Arc::new(DeceptionRouter::from_config(
            &config,
            Arc::new(PostgresStore::connect_lazy(&config.upstream).unwrap()),
            Arc::new(OllamaBackend::from_config(&config.shadow).unwrap()),
            Arc::new(AuditLogger::disabled()),
        ));
        let server = HttpServer::new(
            mirage_core::HttpConfig {
                enabled: true,
                bind: address,
            },
            router,
        );

        let mut front_ends: JoinSet<Result<()>> = JoinSet::new();
        front_ends.spawn(std::future::pending::<Result<()>>());
        front_ends.spawn(async move { server.run().await.context("HTTP front end stopped") });

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), supervise(front_ends))
            .await
            .expect("supervision should end once a front end fails");
        assert!(format!("{:#}", result.unwrap_err()).contains("HTTP front end stopped"));
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(load_config(Path::new("/nonexistent/mirage.yaml")).is_err());
    }
}
