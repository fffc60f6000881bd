use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use kyc_onboard::config::PortalConfig;
use kyc_onboard::onboarding::{FlowController, OnboardingRouteState, kyc_step_graph, onboarding_routes};
use kyc_onboard::services::{Collaborators, HttpCaseClient};
use kyc_onboard::store::LibSqlMirror;

/// Console logging always; a daily rolling file as well when a log dir is set.
fn init_tracing(log_dir: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "kyc-onboard.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = PortalConfig::from_env().context("Failed to load configuration")?;
    let _log_guard = init_tracing(config.log_dir.as_deref());

    eprintln!("KYC Onboard v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Case API: {}", config.api_base_url);
    eprintln!("   Mirror:   {}", config.db_path.display());
    eprintln!("   REST:     http://0.0.0.0:{}/api/onboarding/status", config.port);
    if config.flow.bypass_evidence_check {
        eprintln!("   Evidence check BYPASSED (development only)");
    }

    let client = Arc::new(HttpCaseClient::from_config(&config).context("Failed to build case API client")?);
    let mirror = Arc::new(
        LibSqlMirror::new_local(&config.db_path)
            .await
            .context("Failed to open local mirror")?,
    );

    let graph = kyc_step_graph().context("Built-in step graph is invalid")?;
    let controller = Arc::new(FlowController::new(
        graph,
        Collaborators::http(client),
        mirror,
        config.flow.clone(),
    ));

    match controller.restore_local().await {
        Ok(true) => {
            let step_id = controller.repair_position().await;
            tracing::info!(step_id, "Restored onboarding progress from local mirror");
        }
        Ok(false) => tracing::info!("Starting a fresh onboarding session"),
        Err(e) => tracing::warn!("Failed to restore local progress: {}", e),
    }

    let app = onboarding_routes(OnboardingRouteState { controller });
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Onboarding portal started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}
