use std::net::SocketAddr;

use tracing::{error, info};

mod api_chat;
mod api_meta;
mod api_query;
mod api_records;
mod app_state;
mod bootstrap;
mod rephrase;
mod responses;
mod router;
mod telemetry;

pub(crate) use app_state::AppState;

#[tokio::main]
async fn main() {
    telemetry::init();

    let state = match bootstrap::build_state().await {
        Ok(state) => state,
        Err(err) => {
            error!(%err, "failed to initialize gatekeeper state");
            std::process::exit(2);
        }
    };
    bootstrap::spawn_audit_tail(state.bus());
    state
        .bus()
        .publish(jade_topics::TOPIC_SERVICE_START, &serde_json::json!({}));

    let app = router::build(state.clone());
    let addr = bootstrap::bind_addr();
    info!(%addr, "jade-server listening");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%err, %addr, "failed to bind");
            std::process::exit(2);
        }
    };
    let serve = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal());
    if let Err(err) = serve.await {
        error!(%err, "server error");
    }
    state
        .bus()
        .publish(jade_topics::TOPIC_SERVICE_STOP, &serde_json::json!({}));
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
