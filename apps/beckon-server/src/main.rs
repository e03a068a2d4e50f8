use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde::Serialize;
use tracing::{error, info};

use beckon_api::{
    ApiError, CommandApi, CommandRequest, CommandService, ConfirmRequest, DeviceResultRequest,
    ErrorCode,
};
use beckon_config::{load_config, BeckonConfig};
use beckon_core::store::PlanStore;
use beckon_planners::planner_from_config;
use beckon_stores::{InMemoryAuditStore, InMemoryPlanStore, InMemorySessionStore};
use beckon_tools::{default_registry, InMemoryCalendarBackend};

#[derive(Debug, Parser)]
#[command(name = "beckon-server")]
struct Args {
    #[arg(long, default_value = "config/beckon.yaml")]
    config: PathBuf,
    /// Override the listen address from the config file.
    #[arg(long)]
    listen: Option<SocketAddr>,
}

#[derive(Clone)]
struct AppState {
    api: Arc<CommandApi>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args.config)
        .with_context(|| format!("load config from {}", args.config.display()))?;

    init_tracing(&config);

    let listen: SocketAddr = match args.listen {
        Some(addr) => addr,
        None => config
            .server
            .listen
            .parse()
            .with_context(|| format!("parse server.listen '{}'", config.server.listen))?,
    };

    let backend = Arc::new(InMemoryCalendarBackend::new());
    let registry = Arc::new(default_registry(backend));
    let planner = Arc::new(
        planner_from_config(&config.planner, registry.clone())
            .context("build planner from config")?,
    );
    let plans = Arc::new(InMemoryPlanStore::with_ttl(chrono::Duration::seconds(
        config.plans.ttl_secs as i64,
    )));
    let sessions = Arc::new(InMemorySessionStore::with_max_messages(
        config.session.max_messages,
    ));
    let audit = Arc::new(InMemoryAuditStore::new());

    let api = Arc::new(CommandApi::new(
        planner,
        registry,
        plans.clone(),
        sessions,
        audit,
    ));

    spawn_plan_sweeper(plans, config.plans.sweep_interval_secs);

    let state = AppState { api };
    let app = Router::new()
        .route("/health", get(health))
        .route("/command", post(submit_command))
        .route("/command/confirm", post(confirm_plan))
        .route("/command/device-result", post(report_device_results))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .context("bind server listener failed")?;
    info!(app = %config.app.name, %listen, "beckon-server listening");
    axum::serve(listener, app)
        .await
        .context("server terminated with error")
}

fn init_tracing(config: &BeckonConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.observability.log_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Periodically drop plans past their TTL so late confirmations and device
/// results are rejected instead of matching stale state.
fn spawn_plan_sweeper(plans: Arc<InMemoryPlanStore>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        loop {
            interval.tick().await;
            if let Err(err) = plans.purge_expired().await {
                error!(error = %err, "plan sweep failed");
            }
        }
    });
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status":"ok"}))
}

async fn submit_command(
    State(state): State<AppState>,
    Json(payload): Json<CommandRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let resp = state
        .api
        .submit_command(payload)
        .await
        .map_err(map_api_error)?;
    Ok(Json(resp))
}

async fn confirm_plan(
    State(state): State<AppState>,
    Json(payload): Json<ConfirmRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let resp = state
        .api
        .confirm_plan(payload)
        .await
        .map_err(map_api_error)?;
    Ok(Json(resp))
}

async fn report_device_results(
    State(state): State<AppState>,
    Json(payload): Json<DeviceResultRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let resp = state
        .api
        .report_device_results(payload)
        .await
        .map_err(map_api_error)?;
    Ok(Json(resp))
}

fn map_api_error(err: ApiError) -> (StatusCode, Json<ErrorBody>) {
    let (status, code) = match err.code() {
        ErrorCode::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        ErrorCode::Conflict => (StatusCode::CONFLICT, "conflict"),
        ErrorCode::InvalidArgument => (StatusCode::BAD_REQUEST, "invalid_argument"),
        ErrorCode::PlanExpired => (StatusCode::GONE, "plan_expired"),
        ErrorCode::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };
    (
        status,
        Json(ErrorBody {
            code: code.to_string(),
            message: err.to_string(),
        }),
    )
}
