use std::future::Future;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::afk::AfkMonitor;
use crate::cache::PromptCache;
use crate::config::Config;
use crate::error::{NovaError, Result};
use crate::memory::MemoryStore;
use crate::providers::GeminiClient;
use crate::scheduler::Scheduler;
use crate::services::{ChatService, WarmupJob};

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub gemini: Arc<GeminiClient>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(rename = "userId", default = "default_user_id")]
    pub user_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "userInfo", default)]
    pub user_info: Option<Map<String, Value>>,
}

fn default_user_id() -> String {
    "default".to_string()
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub key_present: bool,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn chat(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Ok(Json(request)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ChatResponse {
                response: "Geçersiz JSON".to_string(),
            }),
        )
            .into_response();
    };

    let reply = state
        .chat
        .handle_message(
            &request.user_id,
            &request.message,
            request.user_info.as_ref(),
        )
        .await;
    match reply {
        Ok(response) => (StatusCode::OK, Json(ChatResponse { response })).into_response(),
        Err(NovaError::Validation(message)) => (
            StatusCode::BAD_REQUEST,
            Json(ChatResponse { response: message }),
        )
            .into_response(),
        Err(err) => {
            error!("chat request for user {} failed: {err}", request.user_id);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ChatResponse {
                    response: format!("⚠️ Hata: {err}"),
                }),
            )
                .into_response()
        }
    }
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let key_present = state.gemini.has_key();
    let status = if key_present {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthResponse {
            ok: key_present,
            key_present,
        }),
    )
        .into_response()
}

pub async fn run(config: Config) -> Result<()> {
    run_with_shutdown(config, futures::future::pending::<()>()).await
}

/// Starts the daemon and serves until `shutdown` resolves. The scheduler is
/// stopped before the serve loop returns so warm-up tasks do not outlive the
/// listener.
pub async fn run_with_shutdown<F>(config: Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let gemini = Arc::new(GeminiClient::new(&config));
    let memory = Arc::new(MemoryStore::open(config.data_dir.as_str()).await?);
    let cache = Arc::new(PromptCache::new());
    let afk = Arc::new(AfkMonitor::new(config.warm_speed_multiplier));
    let chat = Arc::new(ChatService::new(
        Arc::clone(&gemini),
        memory,
        Arc::clone(&cache),
        Arc::clone(&afk),
    ));

    let mut scheduler = Scheduler::new();
    if gemini.has_key() {
        scheduler.register(Arc::new(WarmupJob::new(
            Arc::clone(&gemini),
            Arc::clone(&cache),
            Arc::clone(&afk),
            &config,
        )));
    } else {
        warn!("GEMINI_API_KEY is not set; warm-up scheduling disabled");
    }
    scheduler.start();

    let state = AppState {
        chat,
        gemini: Arc::clone(&gemini),
    };
    let app = build_router(state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| NovaError::Runtime(e.to_string()))?;
    info!("listening on {addr}");

    let shutdown = async move {
        shutdown.await;
        scheduler.stop().await;
    };
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| NovaError::Runtime(e.to_string()))?;
    Ok(())
}
