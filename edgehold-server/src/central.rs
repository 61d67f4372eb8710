//! `edgehold central`: report intake in front of the shared central API.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use edgehold_core::kube::{HttpResourceApi, ResourceApi};
use edgehold_core::reconciler::UpstreamReconciler;
use edgehold_types::CentralConfig;

use crate::router::build_central_router;
use crate::server_utils::{create_listener, shutdown_signal};
use crate::state::CentralState;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run(config: CentralConfig) -> Result<()> {
    let api: Arc<dyn ResourceApi> = Arc::new(HttpResourceApi::new(
        config.api_server_url.clone(),
        config.bearer_token.clone(),
        CONNECT_TIMEOUT,
    )?);
    let reconciler = UpstreamReconciler::new(api, config.conflict_retries);
    let app = build_central_router(CentralState::new(reconciler));

    let listener = create_listener(&config.listen_addr)
        .with_context(|| format!("binding report intake on {}", config.listen_addr))?;
    info!(
        api_server = %config.api_server_url,
        "Report intake listening on http://{}", config.listen_addr
    );

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!("Report intake stopped");
    Ok(())
}
