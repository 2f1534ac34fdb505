use crate::app::list_reports_use_case::ListReportsUseCase;
use crate::app::ports::{EvidencePinner, HttpClientPort};
use crate::app::sign_in_use_case::SignInUseCase;
use crate::app::submit_report_use_case::{SubmitReportInput, SubmitReportUseCase};
use crate::config::Config;
use crate::constants::{
    HEADER_AUTH_AVATAR, HEADER_AUTH_EMAIL, HEADER_AUTH_NAME, HEADER_AUTH_PROVIDER,
    HEADER_AUTH_PROVIDER_ID,
};
use crate::error::PhishError;
use crate::resolver::RedirectResolver;
use crate::storage::Storage;
use crate::types::{Identity, Principal, Report, User};
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use hyper::Server;
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Use cases shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub submit: Arc<SubmitReportUseCase>,
    pub list: Arc<ListReportsUseCase>,
    pub sign_in: Arc<SignInUseCase>,
}

impl AppState {
    pub fn new(
        storage: Arc<dyn Storage>,
        http: Arc<dyn HttpClientPort>,
        pinner: Arc<dyn EvidencePinner>,
        config: &Config,
    ) -> Self {
        let resolver = RedirectResolver::with_max_hops(http, config.resolver.max_hops);
        Self {
            submit: Arc::new(SubmitReportUseCase::new(
                storage.clone(),
                resolver,
                pinner,
                config.rate_limit.clone(),
                config.pinning.source_tag.clone(),
            )),
            list: Arc::new(ListReportsUseCase::new(storage.clone())),
            sign_in: Arc::new(SignInUseCase::new(storage)),
        }
    }
}

/// Build the caller identity from headers set by the authenticating proxy.
/// Provider and provider id are both required; the name falls back to the id.
pub fn identity_from_headers(headers: &HeaderMap) -> Identity {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    let (Some(provider), Some(provider_id)) =
        (header(HEADER_AUTH_PROVIDER), header(HEADER_AUTH_PROVIDER_ID))
    else {
        return Identity::Anonymous;
    };
    let name = header(HEADER_AUTH_NAME).unwrap_or_else(|| provider_id.clone());

    let mut principal = Principal::new(&provider, &provider_id, &name);
    principal.email = header(HEADER_AUTH_EMAIL);
    principal.avatar_url = header(HEADER_AUTH_AVATAR);
    Identity::Authenticated(principal)
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(identity_from_headers(&parts.headers))
    }
}

/// Error body shared by every failing endpoint
#[derive(Serialize)]
struct ErrorBody {
    ok: bool,
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            ok: false,
            error: message.into(),
        }),
    )
        .into_response()
}

pub struct ApiError(pub PhishError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            PhishError::Unauthenticated => StatusCode::UNAUTHORIZED,
            PhishError::Forbidden(_) => StatusCode::FORBIDDEN,
            PhishError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            PhishError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            other => {
                error!("Request failed: {}", other);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        error_response(status, self.0.to_string())
    }
}

#[derive(Serialize)]
struct SubmitResponse {
    ok: bool,
    report: Report,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<String>,
}

#[derive(Serialize)]
struct ListResponse {
    ok: bool,
    reports: Vec<Report>,
}

#[derive(Serialize)]
struct SignInResponse {
    ok: bool,
    user: User,
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "phishblock",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn submit_report(
    Extension(state): Extension<AppState>,
    identity: Identity,
    body: Bytes,
) -> Response {
    // Unparsable bodies reach validation as an empty submission
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap_or_default();
    let input = SubmitReportInput::from_json(&body);

    // Run detached so a client disconnect cannot cancel pinning once the report exists
    let use_case = state.submit.clone();
    let task = tokio::spawn(async move { use_case.submit(&identity, input).await });

    match task.await {
        Ok(Ok(outcome)) => {
            let (report, warning) = outcome.into_parts();
            (
                StatusCode::CREATED,
                Json(SubmitResponse {
                    ok: true,
                    report,
                    warning,
                }),
            )
                .into_response()
        }
        Ok(Err(e)) => ApiError(e).into_response(),
        Err(e) => {
            error!("Submission task failed: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
        }
    }
}

async fn list_reports(Extension(state): Extension<AppState>) -> Response {
    match state.list.list().await {
        Ok(reports) => Json(ListResponse { ok: true, reports }).into_response(),
        Err(e) => {
            error!("Failed to list reports: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Server error")
        }
    }
}

async fn sign_in(Extension(state): Extension<AppState>, identity: Identity) -> Response {
    match state.sign_in.sign_in(&identity).await {
        Ok(user) => Json(SignInResponse { ok: true, user }).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

/// Create the HTTP router with all routes
pub fn create_server(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/auth/sign-in", post(sign_in))
        .route("/api/reports", post(submit_report).get(list_reports))
        .layer(Extension(state))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on the specified port
pub async fn start_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = create_server(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("HTTP server running on http://localhost:{port}");
    info!("Health check: http://localhost:{port}/health");
    info!("Reports API:  http://localhost:{port}/api/reports");

    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}
