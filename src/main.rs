use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use std::env;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use contact_scout::{scanner::ScanError, tools, types::*, AppState};

fn parse_port_from_args() -> Option<u16> {
    let mut args = std::env::args().peekable();
    while let Some(a) = args.next() {
        if a == "--port" {
            if let Some(v) = args.next() {
                if let Ok(p) = v.parse::<u16>() {
                    return Some(p);
                }
            }
        } else if let Some(rest) = a.strip_prefix("--port=") {
            if let Ok(p) = rest.parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

fn port_from_env() -> Option<u16> {
    for k in ["CONTACT_SCOUT_PORT", "PORT"] {
        if let Ok(v) = std::env::var(k) {
            if let Ok(p) = v.trim().parse::<u16>() {
                return Some(p);
            }
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // Create HTTP client
    let http_timeout = env::var("HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(30);
    let connect_timeout = env::var("HTTP_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(10);
    let http_client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(http_timeout))
        .connect_timeout(std::time::Duration::from_secs(connect_timeout))
        .build()?;

    let state = Arc::new(AppState::new(http_client));
    info!("contact-scout starting ({:?})", state);

    // One-shot mode: scan, print the result, exit.
    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--scan-once") {
        let result = tools::run_scan(&state).await;
        state.shutdown().await;
        let response = result?;
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    // Build router
    let app = Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/scan", post(scan_handler))
        .route("/contacts", get(contacts_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    // Start server
    let port: u16 = parse_port_from_args()
        .or_else(port_from_env)
        .unwrap_or(5010);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "Address already in use: {}. Stop the existing process or run with --port {} (or set PORT/CONTACT_SCOUT_PORT).",
                bind_addr,
                port.saturating_add(1)
            )
        }
        Err(e) => return Err(e.into()),
    };
    info!("contact-scout listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await?;

    Ok(())
}

async fn shutdown_signal(state: Arc<AppState>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).ok();
        let mut sigint = signal(SignalKind::interrupt()).ok();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(ref mut s) = sigterm {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
            _ = async {
                if let Some(ref mut s) = sigint {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    state.shutdown().await;
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "contact-scout",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

fn scan_error_status(e: &ScanError) -> StatusCode {
    match e {
        ScanError::AlreadyRunning => StatusCode::CONFLICT,
        ScanError::ChatListMissing => StatusCode::UNPROCESSABLE_ENTITY,
        ScanError::LoginTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        ScanError::Browser(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn scan_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ScanResponse>, (StatusCode, Json<ErrorResponse>)> {
    match tools::run_scan(&state).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            let status = scan_error_status(&e);
            if status == StatusCode::CONFLICT {
                warn!("Scan rejected: {}", e);
            } else {
                error!("Scan error: {}", e);
            }
            Err((
                status,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
    }
}

async fn contacts_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ScanResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.last_result.read().await.clone() {
        Some(response) => Ok(Json(response)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "no scan has completed yet".to_string(),
            }),
        )),
    }
}
