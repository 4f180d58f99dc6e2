//! `at-tracker run`: keep a session alive and log what it reports.
//!
//! Status transitions are always logged. Values are logged only when they
//! differ from the last one seen for the same key.

use std::collections::HashMap;

use at_domain::config::{ConfigSeverity, TrackerConfig};
use at_tracker_sdk::{SessionBuilder, SessionEvent};

pub async fn run(config: TrackerConfig) -> anyhow::Result<()> {
    for issue in config.validate() {
        match issue.severity {
            ConfigSeverity::Error => tracing::error!(issue = %issue, "config"),
            ConfigSeverity::Warning => tracing::warn!(issue = %issue, "config"),
        }
    }

    let mut session = SessionBuilder::from_config(&config)
        .build()
        .map_err(|e| anyhow::anyhow!("invalid session settings: {e}"))?
        .spawn();

    tracing::info!(
        host = %config.connection.host,
        port = config.connection.port,
        selected = ?config.stats.selected,
        "at-tracker starting"
    );
    session.controller.start()?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut last: HashMap<String, u8> = HashMap::new();
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            ev = session.events.recv() => match ev {
                Some(SessionEvent::Status { status }) => {
                    tracing::info!(status = %status, phase = %session.controller.phase(), "session status");
                }
                Some(SessionEvent::Value(v)) => {
                    if last.insert(v.key.clone(), v.value) != Some(v.value) {
                        tracing::info!(
                            key = %v.key,
                            value = v.value,
                            observed_at = %v.observed_at.to_rfc3339(),
                            "stat changed"
                        );
                    }
                }
                None => break,
            },
        }
    }

    session.controller.stop()?;
    session.controller.shutdown();
    if let Err(e) = session.task.await {
        tracing::warn!(error = %e, "session task ended abnormally");
    }
    tracing::info!("at-tracker stopped");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot watch SIGTERM");
                let _ = ctrl_c.await;
                tracing::info!("received SIGINT, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        tracing::info!("received SIGINT, shutting down");
    }
}
