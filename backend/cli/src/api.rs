//! HTTP JSON API for the browser front-end.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, warn};
use uuid::Uuid;

use tuvi_agent::{advance, AppEvent, ChartFlow, FlowSnapshot, RejectReason, TurnOutcome};
use tuvi_core::{ChartImage, ChatError, ChatMessage, Step, TransitionError, UserProfile};
use tuvi_report::{ReadingReport, ReportFormat};

use crate::sessions::{SessionRegistry, SharedState};

/// Shared application state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub flow: Arc<ChartFlow>,
    pub sessions: SessionRegistry,
    /// Profile new sessions start from.
    pub base_profile: UserProfile,
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/sessions/:id/profile", put(update_profile))
        .route("/api/sessions/:id/autofill", post(autofill))
        .route("/api/sessions/:id/submit", post(submit))
        .route("/api/sessions/:id/image", post(confirm_image))
        .route("/api/sessions/:id/back", post(back))
        .route("/api/sessions/:id/chat", post(chat))
        .route("/api/sessions/:id/reset", post(reset))
        .route("/api/sessions/:id/report", get(report))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ApiError {
    NotFound,
    BadRequest(String),
    Transition(TransitionError),
    Chat(ChatError),
}

impl From<TransitionError> for ApiError {
    fn from(e: TransitionError) -> Self {
        ApiError::Transition(e)
    }
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        ApiError::Chat(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Session not found".to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Transition(e) => (StatusCode::CONFLICT, e.to_string()),
            ApiError::Chat(ChatError::NoSession) => {
                (StatusCode::CONFLICT, ChatError::NoSession.to_string())
            }
            ApiError::Chat(e @ ChatError::Gateway(_)) => {
                error!(error = %e, "Consultation turn failed");
                (StatusCode::BAD_GATEWAY, e.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ---------------------------------------------------------------------------
// Bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct CreateSession {
    #[serde(default)]
    pub profile: Option<UserProfile>,
}

/// A chart image as a data URI or bare base64 payload.
#[derive(Debug, Deserialize)]
pub struct ImageBody {
    pub image: String,
}

impl ImageBody {
    fn into_image(self) -> ApiResult<ChartImage> {
        ChartImage::from_data_uri(self.image).map_err(|e| ApiError::BadRequest(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TurnReply {
    Answered { reply: ChatMessage },
    Rejected { reason: RejectReason },
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub format: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health(State(state): State<ApiState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "tuvi",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.sessions.len().await,
    }))
}

async fn session(state: &ApiState, id: Uuid) -> ApiResult<SharedState> {
    state.sessions.get(id).await.ok_or(ApiError::NotFound)
}

/// POST /api/sessions: start a reading in FORM.
async fn create_session(
    State(state): State<ApiState>,
    body: Option<Json<CreateSession>>,
) -> impl IntoResponse {
    let profile = body
        .and_then(|Json(b)| b.profile)
        .unwrap_or_else(|| state.base_profile.clone());
    let (_, shared) = state.sessions.create(profile).await;
    let snapshot = shared.lock().await.snapshot().await;
    (StatusCode::CREATED, Json(snapshot))
}

async fn get_session(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<FlowSnapshot>> {
    let shared = session(&state, id).await?;
    let snapshot = shared.lock().await.snapshot().await;
    Ok(Json(snapshot))
}

async fn delete_session(State(state): State<ApiState>, Path(id): Path<Uuid>) -> StatusCode {
    if state.sessions.remove(id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// Apply a synchronous event under the lock.
async fn apply_event(shared: &SharedState, event: AppEvent) -> ApiResult<FlowSnapshot> {
    let mut guard = shared.lock().await;
    let next = advance(&guard, event)?;
    *guard = next;
    Ok(guard.snapshot().await)
}

async fn update_profile(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(profile): Json<UserProfile>,
) -> ApiResult<Json<FlowSnapshot>> {
    let shared = session(&state, id).await?;
    Ok(Json(apply_event(&shared, AppEvent::EditProfile(profile)).await?))
}

/// POST /api/sessions/:id/autofill: OCR the chart and merge into the form.
async fn autofill(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ImageBody>,
) -> ApiResult<Json<Value>> {
    let shared = session(&state, id).await?;
    let image = body.into_image()?;
    {
        let guard = shared.lock().await;
        if guard.step() != Step::Form {
            return Err(TransitionError::Invalid { step: guard.step(), event: "auto_filled" }.into());
        }
    }

    let extracted = state.flow.extract(id, &image).await;
    let snapshot = apply_event(
        &shared,
        AppEvent::AutoFilled { image, extracted: extracted.clone() },
    )
    .await?;
    Ok(Json(json!({ "extracted": extracted, "session": snapshot })))
}

/// Run the pipeline for a session that just entered PROCESSING.
async fn run_analysis(state: &ApiState, shared: &SharedState) -> ApiResult<FlowSnapshot> {
    let (id, image, profile) = {
        let guard = shared.lock().await;
        if guard.step() != Step::Processing {
            return Ok(guard.snapshot().await);
        }
        let image = guard.captured_image.clone().ok_or(TransitionError::MissingImage)?;
        (guard.session_id, image, guard.profile.clone())
    };

    let event = state.flow.analysis_event(id, &image, &profile).await;

    let mut guard = shared.lock().await;
    // A reset or delete may have raced the analysis; only land a result
    // on the run that asked for it.
    if guard.step() == Step::Processing {
        let next = advance(&guard, event)?;
        *guard = next;
    } else {
        warn!(session_id = %id, step = %guard.step(), "Dropping analysis outcome for a session that moved on");
    }
    Ok(guard.snapshot().await)
}

async fn submit(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<FlowSnapshot>> {
    let shared = session(&state, id).await?;
    apply_event(&shared, AppEvent::Submit).await?;
    Ok(Json(run_analysis(&state, &shared).await?))
}

async fn confirm_image(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ImageBody>,
) -> ApiResult<Json<FlowSnapshot>> {
    let shared = session(&state, id).await?;
    let image = body.into_image()?;
    apply_event(&shared, AppEvent::ImageConfirmed(image)).await?;
    Ok(Json(run_analysis(&state, &shared).await?))
}

async fn back(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<FlowSnapshot>> {
    let shared = session(&state, id).await?;
    Ok(Json(apply_event(&shared, AppEvent::Back).await?))
}

/// POST /api/sessions/:id/chat: one consultation turn.
async fn chat(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ChatBody>,
) -> ApiResult<Json<Value>> {
    let shared = session(&state, id).await?;
    let consultation = {
        let guard = shared.lock().await;
        guard.consultation().cloned().ok_or(ChatError::NoSession)?
    };

    let turn = match state.flow.ask_session(id, &consultation, &body.text).await? {
        TurnOutcome::Answered(reply) => TurnReply::Answered { reply },
        TurnOutcome::Rejected(reason) => TurnReply::Rejected { reason },
    };
    Ok(Json(json!({ "turn": turn, "messages": consultation.transcript().await })))
}

async fn reset(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<FlowSnapshot>> {
    let shared = session(&state, id).await?;
    Ok(Json(apply_event(&shared, AppEvent::Reset).await?))
}

/// GET /api/sessions/:id/report: printable reading (HTML, or `?format=md`).
async fn report(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ReportQuery>,
) -> ApiResult<Response> {
    let shared = session(&state, id).await?;
    let report = {
        let guard = shared.lock().await;
        let Some(consultation) = guard.consultation() else {
            return Err(TransitionError::Invalid { step: guard.step(), event: "report" }.into());
        };
        ReadingReport::new(
            guard.profile.clone(),
            consultation.context().analysis().clone(),
            consultation.transcript().await,
        )
        .with_chart(guard.captured_image.clone())
    };

    let response = match query.format.as_deref() {
        Some("md") | Some("markdown") => (
            [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
            ReportFormat::Markdown.render(&report),
        )
            .into_response(),
        _ => Html(ReportFormat::Html.render(&report)).into_response(),
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;
    use tuvi_agent::FlowSettings;
    use tuvi_core::GatewayError;
    use tuvi_providers::MockGateway;

    const IMAGE: &str = "data:image/png;base64,iVBORw0KGgo=";

    fn app(gateway: MockGateway) -> (Router, ApiState) {
        let state = ApiState {
            flow: Arc::new(ChartFlow::new(Arc::new(gateway), &FlowSettings::default())),
            sessions: SessionRegistry::new(),
            base_profile: UserProfile::default(),
        };
        (build_router(state.clone()), state)
    }

    fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn new_session(app: &Router) -> String {
        let (status, body) = send(app, request("POST", "/api/sessions", None)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["step"], "FORM");
        body["sessionId"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (app, _) = app(MockGateway::new("mock"));
        let (status, body) = send(&app, request("GET", "/api/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["sessions"], 0);
    }

    #[tokio::test]
    async fn upload_flow_through_chat_and_report() {
        let (app, _) = app(
            MockGateway::new("mock")
                .with_response("## Mệnh")
                .with_response("## Năm 2026\n\nTài lộc vượng.")
                .with_response("Nên đầu tư đất."),
        );
        let id = new_session(&app).await;

        let (_, body) = send(&app, request("POST", &format!("/api/sessions/{id}/submit"), None)).await;
        assert_eq!(body["step"], "UPLOAD");

        let (status, body) = send(
            &app,
            request("POST", &format!("/api/sessions/{id}/image"), Some(json!({ "image": IMAGE }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["step"], "RESULT");
        assert_eq!(body["result"]["interpretation"], "## Năm 2026\n\nTài lộc vượng.");

        let (status, body) = send(
            &app,
            request("POST", &format!("/api/sessions/{id}/chat"), Some(json!({ "text": "Mua đất?" }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["turn"]["outcome"], "answered");
        assert_eq!(body["turn"]["reply"]["text"], "Nên đầu tư đất.");
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);

        let response = app
            .clone()
            .oneshot(request("GET", &format!("/api/sessions/{id}/report"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("<h2>Năm 2026</h2>"));
        assert!(html.contains("Câu hỏi của bạn:"));

        let (_, body) = send(&app, request("POST", &format!("/api/sessions/{id}/reset"), None)).await;
        assert_eq!(body["step"], "FORM");
        assert_eq!(body["hasImage"], false);
        assert!(body["result"].is_null());
    }

    #[tokio::test]
    async fn autofill_then_submit_skips_upload() {
        let (app, _) = app(
            MockGateway::new("mock")
                .with_response(r#"{"fullName":"Phạm D","gender":"Nữ","birthYear":"1995"}"#)
                .with_fallback("ok"),
        );
        let id = new_session(&app).await;

        let (status, body) = send(
            &app,
            request("POST", &format!("/api/sessions/{id}/autofill"), Some(json!({ "image": IMAGE }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["extracted"]["fullName"], "Phạm D");
        assert_eq!(body["session"]["profile"]["birthYear"], "1995");
        assert_eq!(body["session"]["profile"]["gender"], "Female");

        let (_, body) = send(&app, request("POST", &format!("/api/sessions/{id}/submit"), None)).await;
        assert_eq!(body["step"], "RESULT");
    }

    #[tokio::test]
    async fn analysis_failure_returns_to_upload_with_notice() {
        let (app, _) = app(MockGateway::new("mock").with_error(GatewayError::Timeout(180)));
        let id = new_session(&app).await;
        send(&app, request("POST", &format!("/api/sessions/{id}/submit"), None)).await;

        let (status, body) = send(
            &app,
            request("POST", &format!("/api/sessions/{id}/image"), Some(json!({ "image": IMAGE }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["step"], "UPLOAD");
        assert!(body["notice"].is_string());
        assert_eq!(body["hasImage"], true);
    }

    #[tokio::test]
    async fn invalid_requests_are_rejected() {
        let (app, _) = app(MockGateway::new("mock"));
        let unknown = Uuid::new_v4();
        let (status, _) = send(&app, request("GET", &format!("/api/sessions/{unknown}"), None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let id = new_session(&app).await;
        let (status, body) = send(&app, request("POST", &format!("/api/sessions/{id}/back"), None)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("back"));

        let (status, _) = send(
            &app,
            request("POST", &format!("/api/sessions/{id}/chat"), Some(json!({ "text": "hi" }))),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &app,
            request("POST", &format!("/api/sessions/{id}/autofill"), Some(json!({ "image": "data:image/png;base64," }))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, request("DELETE", &format!("/api/sessions/{id}"), None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn failed_chat_turn_is_bad_gateway_and_keeps_question() {
        let (app, _) = app(
            MockGateway::new("mock")
                .with_response("chart")
                .with_response("reading")
                .with_error(GatewayError::Status { status: 503, body: "busy".into() }),
        );
        let id = new_session(&app).await;
        send(&app, request("POST", &format!("/api/sessions/{id}/submit"), None)).await;
        send(
            &app,
            request("POST", &format!("/api/sessions/{id}/image"), Some(json!({ "image": IMAGE }))),
        )
        .await;

        let (status, _) = send(
            &app,
            request("POST", &format!("/api/sessions/{id}/chat"), Some(json!({ "text": "Q" }))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let (_, body) = send(&app, request("GET", &format!("/api/sessions/{id}"), None)).await;
        assert_eq!(body["messages"], json!([{ "role": "user", "text": "Q" }]));
    }
}
