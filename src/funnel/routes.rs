//! REST endpoints driving the funnel.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{FunnelError, SubmissionError};

use super::manager::{FunnelManager, FunnelView, Notification};

/// Shared state for funnel routes.
#[derive(Clone)]
pub struct FunnelRouteState {
    pub manager: Arc<FunnelManager>,
}

#[derive(Debug, Deserialize)]
struct IndexBody {
    index: usize,
}

#[derive(Debug, Deserialize)]
struct TextBody {
    value: String,
}

#[derive(Debug, Deserialize)]
struct EmailBody {
    email: String,
    #[serde(default)]
    token: Option<String>,
}

/// `Json` whose rejection uses the same `{ error, kind }` body as action
/// errors.
struct Body<T>(T);

impl<S, T> FromRequest<S> for Body<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Body(value)),
            Err(rejection) => Err(rejected(rejection)),
        }
    }
}

fn rejected(rejection: JsonRejection) -> Response {
    error_body(StatusCode::BAD_REQUEST, &rejection.body_text(), "invalid_request")
}

fn error_body(status: StatusCode, message: &str, kind: &str) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message, "kind": kind })),
    )
        .into_response()
}

fn status_for(err: &FunnelError) -> StatusCode {
    match err {
        FunnelError::InvalidAction { .. } | FunnelError::Validation(_) => StatusCode::BAD_REQUEST,
        FunnelError::Submission(SubmissionError::Validation(_)) => StatusCode::BAD_REQUEST,
        FunnelError::Busy => StatusCode::CONFLICT,
        FunnelError::Submission(SubmissionError::DuplicateEmail) => StatusCode::CONFLICT,
        FunnelError::Submission(_) => StatusCode::BAD_GATEWAY,
    }
}

/// Map an action result to a JSON response.
fn respond(result: Result<FunnelView, FunnelError>) -> Response {
    match result {
        Ok(view) => Json(view).into_response(),
        Err(e) => {
            let note = Notification::from(&e);
            error_body(status_for(&e), &note.message, &note.kind)
        }
    }
}

/// GET /api/funnel
async fn get_view(State(state): State<FunnelRouteState>) -> impl IntoResponse {
    Json(state.manager.view().await)
}

/// POST /api/funnel/start
async fn start(State(state): State<FunnelRouteState>) -> Response {
    respond(state.manager.start_session().await)
}

/// POST /api/funnel/continue
async fn continue_landing(State(state): State<FunnelRouteState>) -> Response {
    respond(state.manager.continue_from_landing().await)
}

/// POST /api/funnel/select `{ "index": n }`
async fn select(State(state): State<FunnelRouteState>, Body(body): Body<IndexBody>) -> Response {
    respond(state.manager.select_option(body.index).await)
}

/// POST /api/funnel/toggle `{ "index": n }`
async fn toggle(State(state): State<FunnelRouteState>, Body(body): Body<IndexBody>) -> Response {
    respond(state.manager.toggle_option(body.index).await)
}

/// POST /api/funnel/submit-selection
async fn submit_selection(State(state): State<FunnelRouteState>) -> Response {
    respond(state.manager.submit_selection().await)
}

/// POST /api/funnel/text `{ "value": "..." }`
async fn submit_text(
    State(state): State<FunnelRouteState>,
    Body(body): Body<TextBody>,
) -> Response {
    respond(state.manager.submit_text(&body.value).await)
}

/// POST /api/funnel/email `{ "email": "...", "token": "..." }`
async fn submit_email(
    State(state): State<FunnelRouteState>,
    Body(body): Body<EmailBody>,
) -> Response {
    respond(
        state
            .manager
            .submit_email(&body.email, body.token.as_deref())
            .await,
    )
}

/// POST /api/funnel/back
async fn back(State(state): State<FunnelRouteState>) -> Response {
    respond(state.manager.back().await)
}

/// Build the funnel REST routes.
pub fn funnel_routes(state: FunnelRouteState) -> Router {
    Router::new()
        .route("/api/funnel", get(get_view))
        .route("/api/funnel/start", post(start))
        .route("/api/funnel/continue", post(continue_landing))
        .route("/api/funnel/select", post(select))
        .route("/api/funnel/toggle", post(toggle))
        .route("/api/funnel/submit-selection", post(submit_selection))
        .route("/api/funnel/text", post(submit_text))
        .route("/api/funnel/email", post(submit_email))
        .route("/api/funnel/back", post(back))
        .with_state(state)
}
