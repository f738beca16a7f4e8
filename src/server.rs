use axum::{
    Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Json, Response},
    routing::post,
};
use metrics::counter;
use std::any::Any;
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::engine::Engine;
use crate::error::ApiError;
use crate::rate_limit::{RateLimiter, rate_limit_middleware};
use crate::types::{ClassificationRequest, ClassifyPayload, SuccessResponse};

#[derive(Clone)]
pub struct AppState {
    engine: Arc<dyn Engine + Send + Sync>,
}

impl AppState {
    pub fn new(engine: Arc<dyn Engine + Send + Sync>) -> Self {
        Self { engine }
    }
}

pub fn router(state: AppState, limiter: Arc<RateLimiter>) -> Router {
    Router::new()
        .route("/generate", post(generate_handler))
        .route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("Handler panicked while processing request");
    ApiError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Request processing error: internal server error",
    )
    .into_response()
}

#[tracing::instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4().simple()))]
async fn generate_handler(
    State(state): State<AppState>,
    payload: Result<Json<ClassifyPayload>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ApiError> {
    counter!("ddc_classification_requests_total").increment(1);

    let Json(payload) = payload.map_err(reject_payload)?;
    let text = payload.text.trim();
    if text.is_empty() {
        return Err(ApiError::bad_request("Please provide text to classify"));
    }
    if payload.api_key.is_blank() {
        return Err(ApiError::bad_request("Please provide an API key"));
    }

    let request = ClassificationRequest {
        text: text.to_string(),
        api_key: payload.api_key.trimmed(),
    };
    let classified = state.engine.classify(request).await?;
    Ok(Json(classified.into()))
}

fn reject_payload(rejection: JsonRejection) -> ApiError {
    tracing::debug!(reason = %rejection.body_text(), "Rejected request body");
    match rejection {
        JsonRejection::MissingJsonContentType(_) => ApiError::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Content-Type must be application/json",
        ),
        JsonRejection::JsonDataError(_) => ApiError::bad_request(
            "Request body must be a JSON object with string fields 'text' and 'api_key'",
        ),
        _ => ApiError::bad_request("No data provided"),
    }
}
