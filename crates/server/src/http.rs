//! HTTP Endpoints
//!
//! REST API for the contact-center orchestrator.

use axum::{
    extract::{Json, Path, Query, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use contact_center_core::{
    Agent, AgentStatus, Channel, SessionFilter, SessionStatus, SessionStore, TurnRequest,
    TurnResponse,
};

use crate::metrics::metrics_handler;
use crate::state::AppState;
use crate::ServerError;

type ApiResult<T> = Result<Json<T>, ServerError>;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_layer = build_cors_layer(
        &state.settings.server.cors_origins,
        state.settings.server.cors_enabled,
    );

    Router::new()
        // Conversation
        .route("/api/turn", post(handle_turn))
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/end", post(end_session))
        .route("/api/sessions/:id/cancel", post(cancel_session))
        .route("/api/sessions/:id/flow", get(flow_status).delete(cancel_flow))
        // Escalations
        .route("/api/escalations", get(list_escalations).post(create_escalation))
        .route("/api/escalations/:id", get(escalation_status))
        .route("/api/escalations/:id/accept", post(accept_escalation))
        .route("/api/escalations/:id/resolve", post(resolve_escalation))
        .route("/api/escalations/:id/cancel", post(cancel_escalation))
        // Agents
        .route("/api/agents", get(list_agents).post(register_agent))
        .route("/api/agents/:id/status", put(set_agent_status).post(set_agent_status))
        // FAQ
        .route("/api/faq/search", get(search_faq))
        .route("/api/faq/popular", get(popular_faq))
        .route("/api/faq/categories", get(faq_categories))
        .route("/api/faq/:id/select", post(select_faq))
        // Flows
        .route("/api/flows", get(list_flows))
        .route("/admin/reload-flows", post(reload_flows))
        // Health and metrics
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer)
        .with_state(state)
}

/// CORS layer from configured origins
///
/// - disabled: permissive
/// - no valid origins: localhost:3000 only
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::warn!("CORS is disabled - allowing all origins");
        return CorsLayer::permissive();
    }

    let methods = [Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS];
    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::info!("No usable CORS origins configured, defaulting to localhost:3000");
        return CorsLayer::new()
            .allow_origin(HeaderValue::from_static("http://localhost:3000"))
            .allow_methods(methods)
            .allow_headers(Any);
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods(methods)
        .allow_headers(Any)
}

/// Process one customer message
async fn handle_turn(State(state): State<AppState>, Json(request): Json<TurnRequest>) -> Response {
    match state.orchestrator.handle_turn(request).await {
        TurnResponse::Reply(reply) => (StatusCode::OK, Json(reply)).into_response(),
        TurnResponse::Error(err) => {
            let status = match err.error_code.as_str() {
                "session_busy" | "conflict" => StatusCode::CONFLICT,
                "session_not_found" => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            };
            (status, Json(TurnResponse::Error(err))).into_response()
        },
    }
}

#[derive(Debug, Default, Deserialize)]
struct SessionQuery {
    status: Option<SessionStatus>,
    channel: Option<Channel>,
    user_id: Option<String>,
}

async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> ApiResult<serde_json::Value> {
    let filter = SessionFilter {
        statuses: query.status.map(|s| vec![s]),
        channel: query.channel,
        user_id: query.user_id,
    };
    let sessions = state.sessions.list_active(&filter).await?;
    let summaries: Vec<serde_json::Value> = sessions
        .iter()
        .map(|s| {
            serde_json::json!({
                "session_id": s.session_id,
                "user_id": s.user_id,
                "channel": s.channel,
                "status": s.status,
                "current_flow": s.current_flow,
                "turns": s.history.len(),
                "updated_at": s.updated_at,
            })
        })
        .collect();
    Ok(Json(serde_json::json!({
        "count": summaries.len(),
        "sessions": summaries,
    })))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<contact_center_core::Session> {
    state
        .sessions
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("session {id}")))
}

async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<contact_center_core::BotReply> {
    Ok(Json(state.orchestrator.end_session(&id).await?))
}

async fn cancel_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServerError> {
    state.orchestrator.cancel_session(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn flow_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<contact_center_agent::FlowStatus> {
    state
        .orchestrator
        .flow_status(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("no active flow for session {id}")))
}

async fn cancel_flow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<contact_center_core::BotReply> {
    Ok(Json(state.orchestrator.cancel_flow(&id).await?))
}

#[derive(Debug, Deserialize)]
struct EscalationBody {
    session_id: String,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Manual escalation by customer or operator
async fn create_escalation(
    State(state): State<AppState>,
    Json(body): Json<EscalationBody>,
) -> Result<(StatusCode, Json<contact_center_core::BotReply>), ServerError> {
    let reason = body.reason.as_deref().unwrap_or("customer_request");
    let reply = state
        .orchestrator
        .escalate_manually(&body.session_id, reason, body.description)
        .await?;
    Ok((StatusCode::CREATED, Json(reply)))
}

#[derive(Debug, Default, Deserialize)]
struct EscalationQuery {
    #[serde(default)]
    pending: bool,
}

async fn list_escalations(
    State(state): State<AppState>,
    Query(query): Query<EscalationQuery>,
) -> Json<Vec<contact_center_core::EscalationRequest>> {
    if query.pending {
        Json(state.escalation.pending())
    } else {
        Json(state.escalation.list())
    }
}

async fn escalation_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<contact_center_escalation::EscalationView> {
    Ok(Json(state.escalation.status(&id)?))
}

async fn accept_escalation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<contact_center_core::EscalationRequest> {
    Ok(Json(state.orchestrator.accept_escalation(&id).await?))
}

async fn resolve_escalation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<contact_center_core::EscalationRequest> {
    Ok(Json(state.escalation.resolve(&id)?))
}

#[derive(Debug, Default, Deserialize)]
struct CancelBody {
    #[serde(default)]
    reason: Option<String>,
}

async fn cancel_escalation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<CancelBody>>,
) -> ApiResult<contact_center_core::EscalationRequest> {
    let reason = body
        .and_then(|Json(b)| b.reason)
        .unwrap_or_else(|| "cancelled by operator".to_string());
    Ok(Json(state.escalation.cancel(&id, &reason)?))
}

async fn list_agents(State(state): State<AppState>) -> Json<Vec<Agent>> {
    Json(state.escalation.registry().list())
}

#[derive(Debug, Deserialize)]
struct AgentBody {
    agent_id: String,
    display_name: String,
    #[serde(default = "default_capacity")]
    max_capacity: u32,
    #[serde(default)]
    skills: Vec<String>,
    #[serde(default)]
    routing_profile: Option<String>,
}

fn default_capacity() -> u32 {
    3
}

async fn register_agent(
    State(state): State<AppState>,
    Json(body): Json<AgentBody>,
) -> Result<(StatusCode, Json<Agent>), ServerError> {
    if body.agent_id.trim().is_empty() {
        return Err(ServerError::InvalidRequest("agent_id is required".to_string()));
    }
    if body.max_capacity == 0 {
        return Err(ServerError::InvalidRequest("max_capacity must be at least 1".to_string()));
    }
    let mut agent =
        Agent::new(body.agent_id.clone(), body.display_name, body.max_capacity).with_skills(body.skills);
    if let Some(profile) = body.routing_profile {
        agent.routing_profile = profile;
    }
    state.escalation.register_agent(agent);
    let agent = state
        .escalation
        .registry()
        .get(&body.agent_id)
        .ok_or_else(|| ServerError::NotFound(format!("agent {}", body.agent_id)))?;
    Ok((StatusCode::CREATED, Json(agent)))
}

#[derive(Debug, Deserialize)]
struct AgentStatusBody {
    status: AgentStatus,
}

async fn set_agent_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AgentStatusBody>,
) -> ApiResult<Agent> {
    Ok(Json(state.escalation.set_agent_status(&id, body.status)?))
}

#[derive(Debug, Deserialize)]
struct FaqSearchQuery {
    q: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

async fn search_faq(
    State(state): State<AppState>,
    Query(query): Query<FaqSearchQuery>,
) -> ApiResult<serde_json::Value> {
    let result = state
        .faq
        .search_with_confidence(&query.q, query.category.as_deref(), query.limit)
        .await?;
    Ok(Json(serde_json::json!({
        "query": result.query,
        "confidence": result.confidence,
        "results": result.items,
    })))
}

#[derive(Debug, Deserialize)]
struct PopularQuery {
    #[serde(default)]
    category: Option<String>,
    #[serde(default = "default_popular_limit")]
    limit: usize,
}

fn default_popular_limit() -> usize {
    10
}

async fn popular_faq(
    State(state): State<AppState>,
    Query(query): Query<PopularQuery>,
) -> ApiResult<Vec<contact_center_core::FaqItem>> {
    Ok(Json(
        state
            .faq
            .popular(query.category.as_deref(), query.limit)
            .await?,
    ))
}

async fn faq_categories(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    Ok(Json(state.faq.categories().await?))
}

async fn select_faq(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<contact_center_core::FaqItem> {
    state
        .faq
        .select(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("faq {id}")))
}

async fn list_flows(State(state): State<AppState>) -> Json<serde_json::Value> {
    let flows: Vec<serde_json::Value> = state
        .catalog
        .flow_ids()
        .into_iter()
        .filter_map(|id| state.catalog.get(&id))
        .map(|flow| {
            serde_json::json!({
                "flow_id": flow.flow_id,
                "name": flow.name,
                "description": flow.description,
                "steps": flow.steps.len(),
            })
        })
        .collect();
    Json(serde_json::json!({ "flows": flows }))
}

/// POST /admin/reload-flows
///
/// Swaps in the flow files at `scenario.flows_path`. An invalid file
/// leaves the current set untouched.
async fn reload_flows(State(state): State<AppState>) -> Response {
    match state.reload_flows() {
        Ok(count) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "success", "flows": count })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Flow reload failed");
            e.into_response()
        },
    }
}

async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let mut checks = serde_json::Map::new();
    let mut healthy = true;

    match state.sessions.list_active(&SessionFilter::default()).await {
        Ok(active) => {
            checks.insert(
                "sessions".to_string(),
                serde_json::json!({ "status": "ok", "active": active.len() }),
            );
        },
        Err(e) => {
            healthy = false;
            tracing::warn!(error = %e, "Session store health check failed");
            checks.insert(
                "sessions".to_string(),
                serde_json::json!({ "status": "error" }),
            );
        },
    }

    let flows = state.catalog.len();
    checks.insert(
        "flows".to_string(),
        serde_json::json!({
            "status": if flows > 0 { "ok" } else { "degraded" },
            "count": flows,
        }),
    );

    let dead_letters = state.notifications.dead_letters().len();
    checks.insert(
        "notifications".to_string(),
        serde_json::json!({
            "status": if dead_letters == 0 { "ok" } else { "degraded" },
            "dead_letters": dead_letters,
        }),
    );

    checks.insert(
        "nlu".to_string(),
        serde_json::json!({ "status": "ok", "provider": state.nlu_provider() }),
    );

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status_code,
        Json(serde_json::json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "version": env!("CARGO_PKG_VERSION"),
            "checks": checks,
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use contact_center_config::Settings;

    #[tokio::test]
    async fn test_router_creation() {
        let state = AppState::build(Settings::default()).await.unwrap();
        let _ = create_router(state);
    }

    #[test]
    fn test_cors_layer_variants() {
        let _ = build_cors_layer(&[], true);
        let _ = build_cors_layer(&["https://cc.example.com".to_string()], true);
        let _ = build_cors_layer(&[], false);
    }
}
