//! HTTP proxy gateway for TaskPilot.
//!
//! Exposes the four agent capabilities under `/api/agent/*` so that clients
//! without their own API key can run the agent on server-held keys. Each
//! request builds a direct gateway from the caller's model settings and a
//! key drawn from the server pool.
//!
//! Built on Axum for high performance async HTTP.

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use taskpilot_agent::{
    AgentRequest, CompletionGateway, DirectGateway, ExecuteResponse, Followup, NewTasksResponse,
};
use taskpilot_config::AppConfig;
use taskpilot_core::analysis::Analysis;
use taskpilot_core::error::{FailureKind, ProviderError};
use taskpilot_core::provider::Provider;
use taskpilot_core::settings::ModelSettings;
use taskpilot_providers::{SerperSearch, ServerKeys, WebSearch, build_provider};

/// Builds a completion provider from request settings and a server key.
pub type ProviderBuilder =
    Arc<dyn Fn(&ModelSettings, Option<&str>) -> Arc<dyn Provider> + Send + Sync>;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: AppConfig,
    pub keys: ServerKeys,
    pub search: Option<Arc<dyn WebSearch>>,
    pub provider_builder: ProviderBuilder,
}

impl GatewayState {
    /// State backed by real providers and the configured key pool.
    pub fn from_config(config: AppConfig) -> Self {
        let keys = ServerKeys::from_config(&config);
        let search = SerperSearch::from_config(&config.search)
            .map(|s| Arc::new(s) as Arc<dyn WebSearch>);
        let api_url = config.api_url.clone();
        let provider_builder: ProviderBuilder =
            Arc::new(move |settings: &ModelSettings, key: Option<&str>| {
                build_provider(settings, key, &api_url)
            });
        Self {
            config,
            keys,
            search,
            provider_builder,
        }
    }

    pub fn with_provider_builder(mut self, builder: ProviderBuilder) -> Self {
        self.provider_builder = builder;
        self
    }

    pub fn with_search(mut self, search: Option<Arc<dyn WebSearch>>) -> Self {
        self.search = search;
        self
    }

    /// A direct gateway for one request.
    ///
    /// The connection check stays off here: the proxy answers one
    /// capability per request and a failed call already reports itself.
    fn gateway_for(&self, settings: &ModelSettings) -> Result<DirectGateway, ProviderError> {
        let server_key = self.keys.pick();
        if !settings.has_personal_key() && server_key.is_none() {
            return Err(ProviderError::NotConfigured(
                "no server API key configured".into(),
            ));
        }
        let provider = (self.provider_builder)(settings, server_key);
        Ok(DirectGateway::new(provider).with_search(self.search.clone()))
    }
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - Per-client rate limiting on the capability routes
/// - Permissive CORS for browser clients
/// - Request body size limit
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let rate_limiter = Arc::new(RateLimiter::new(
        state.config.gateway.rate_limit_per_minute,
        std::time::Duration::from_secs(60),
    ));
    let body_limit = state.config.gateway.body_limit;

    let agent_routes = Router::new()
        .route("/start", post(start_handler))
        .route("/create", post(create_handler))
        .route("/analyze", post(analyze_handler))
        .route("/execute", post(execute_handler))
        .layer(axum::middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.clone();
            rate_limit_middleware(limiter, req, next)
        }));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/agent", agent_routes)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let state = GatewayState::from_config(config);

    if state.keys.is_empty() {
        warn!("No server API key configured; only requests carrying their own key will succeed");
    }
    info!(
        keys = state.keys.len(),
        search = state.search.is_some(),
        "Gateway state ready"
    );

    let app = build_router(Arc::new(state));

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Rate Limiter ---

/// Simple in-memory sliding-window rate limiter.
///
/// Tracks request timestamps per client key.
/// Thread-safe via `std::sync::Mutex` (non-async, held briefly).
struct RateLimiter {
    max_requests: usize,
    window: std::time::Duration,
    clients: std::sync::Mutex<HashMap<String, Vec<std::time::Instant>>>,
}

impl RateLimiter {
    fn new(max_requests: usize, window: std::time::Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Check if the client is within rate limits. Returns `true` if allowed.
    fn check(&self, client_key: &str) -> bool {
        let now = std::time::Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        if clients.len() > 10_000 {
            clients.retain(|_, timestamps| {
                timestamps
                    .last()
                    .is_some_and(|t| now.duration_since(*t) < self.window)
            });
        }

        let timestamps = clients.entry(client_key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push(now);
        true
    }
}

/// Keys clients by `X-Forwarded-For`, falling back to "anonymous".
/// Returns 429 when exceeded, which agents read as rate limiting.
async fn rate_limit_middleware(
    limiter: Arc<RateLimiter>,
    req: axum::extract::Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let client_key = req
        .headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "anonymous".to_string());

    if !limiter.check(&client_key) {
        warn!(client = %client_key, "Rate limit exceeded");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    Ok(next.run(req).await)
}

// --- Errors ---

/// A provider failure rendered as an HTTP response.
struct ApiError(ProviderError);

impl From<ProviderError> for ApiError {
    fn from(e: ProviderError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            FailureKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            FailureKind::ModelUnavailable => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_GATEWAY,
        };
        warn!(status = status.as_u16(), error = %self.0, "Capability request failed");
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn language(req: &AgentRequest) -> &str {
    let custom = req.custom_language.trim();
    if custom.is_empty() {
        req.model_settings.language()
    } else {
        custom
    }
}

async fn start_handler(
    State(state): State<SharedState>,
    Json(req): Json<AgentRequest>,
) -> Result<Json<NewTasksResponse>, ApiError> {
    debug!(model = req.model_settings.model(), "start request");
    let gateway = state.gateway_for(&req.model_settings)?;
    let new_tasks = gateway
        .start_goal(&req.model_settings, &req.goal, language(&req))
        .await?;
    Ok(Json(NewTasksResponse { new_tasks }))
}

async fn create_handler(
    State(state): State<SharedState>,
    Json(req): Json<AgentRequest>,
) -> Result<Json<NewTasksResponse>, ApiError> {
    debug!(model = req.model_settings.model(), "create request");
    let gateway = state.gateway_for(&req.model_settings)?;
    let pending = req.tasks.clone().unwrap_or_default();
    let completed = req.completed_tasks.clone().unwrap_or_default();
    let followup = Followup {
        pending: &pending,
        last_task: req.last_task.as_deref().unwrap_or_default(),
        result: req.result.as_deref().unwrap_or_default(),
        completed: &completed,
    };
    let new_tasks = gateway
        .create_followup_tasks(&req.model_settings, &req.goal, followup, language(&req))
        .await?;
    Ok(Json(NewTasksResponse { new_tasks }))
}

async fn analyze_handler(
    State(state): State<SharedState>,
    Json(req): Json<AgentRequest>,
) -> Result<Json<Analysis>, ApiError> {
    debug!(model = req.model_settings.model(), "analyze request");
    let gateway = state.gateway_for(&req.model_settings)?;
    let analysis = gateway
        .analyze_task(
            &req.model_settings,
            &req.goal,
            req.task.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok(Json(analysis))
}

async fn execute_handler(
    State(state): State<SharedState>,
    Json(req): Json<AgentRequest>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    debug!(model = req.model_settings.model(), "execute request");
    let gateway = state.gateway_for(&req.model_settings)?;
    let analysis = req.analysis.clone().unwrap_or_default();
    let response = gateway
        .execute_task(
            &req.model_settings,
            &req.goal,
            req.task.as_deref().unwrap_or_default(),
            &analysis,
            language(&req),
        )
        .await?;
    Ok(Json(ExecuteResponse { response }))
}
