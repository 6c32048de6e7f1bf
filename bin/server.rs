// Recognition Ledger - Web Server
// REST API with Axum over the same Ledger the CLI uses.

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use recognition_ledger::{
    AppConfig, Ledger, LedgerConfig, LedgerError, RecognitionFilter, Student,
    DEFAULT_LEADERBOARD_LIMIT,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    ledger: Arc<Mutex<Ledger>>,
    config: LedgerConfig,
}

impl AppState {
    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ApiErrorBody>,
}

#[derive(Serialize)]
struct ApiErrorBody {
    code: &'static str,
    message: String,
    retryable: bool,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Ledger errors rendered with their HTTP status
struct ApiError(LedgerError);

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }

        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(ApiErrorBody {
                code: self.0.error_code(),
                message: self.0.to_string(),
                retryable: self.0.is_retryable(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::ok(data))))
}

fn created<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(data))))
}

// ============================================================================
// Request parsing
// ============================================================================

/// Integer field from a JSON body; numeric strings are accepted too
fn int_field(body: &Value, key: &str) -> Result<i64, LedgerError> {
    let invalid = || LedgerError::Validation(format!("{} must be an integer", key));

    match body.get(key) {
        Some(Value::Number(n)) => n.as_i64().ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn optional_str_field<'a>(body: &'a Value, key: &str) -> Result<Option<&'a str>, LedgerError> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(LedgerError::Validation(format!("{} must be a string", key))),
    }
}

// ============================================================================
// Response shapes
// ============================================================================

/// Student plus the derived values callers usually want next to it
#[derive(Serialize)]
struct StudentResponse {
    #[serde(flatten)]
    student: Student,
    monthly_sending_limit: i64,
    remaining_monthly_limit: i64,
    voucher_value_if_redeem_all: i64,
}

impl StudentResponse {
    fn new(student: Student, config: &LedgerConfig) -> Self {
        Self {
            monthly_sending_limit: config.monthly_sending_limit,
            remaining_monthly_limit: student.remaining_monthly_limit(config),
            voucher_value_if_redeem_all: student.redeemable_value(config),
            student,
        }
    }
}

#[derive(Deserialize)]
struct RecognitionQuery {
    sender_id: Option<i64>,
    recipient_id: Option<i64>,
}

#[derive(Deserialize)]
struct LeaderboardQuery {
    limit: Option<i64>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /students
async fn create_student(State(state): State<AppState>, Json(body): Json<Value>) -> ApiResult<StudentResponse> {
    let name = optional_str_field(&body, "name")?
        .ok_or_else(|| LedgerError::Validation("name is required".to_string()))?;

    let student = state.ledger().create_student(name)?;
    created(StudentResponse::new(student, &state.config))
}

/// GET /students/:id
async fn get_student(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StudentResponse> {
    let student = state.ledger().get_student(id)?;
    ok(StudentResponse::new(student, &state.config))
}

/// POST /recognitions
async fn create_recognition(State(state): State<AppState>, Json(body): Json<Value>) -> ApiResult<Value> {
    let sender_id = int_field(&body, "sender_id")?;
    let recipient_id = int_field(&body, "recipient_id")?;
    let amount = int_field(&body, "amount")?;
    let message = optional_str_field(&body, "message")?;

    let receipt = state
        .ledger()
        .recognize(sender_id, recipient_id, amount, message)?;

    created(serde_json::json!({
        "recognition": receipt.recognition,
        "sender": { "id": receipt.sender.id, "name": receipt.sender.name },
        "recipient": { "id": receipt.recipient.id, "name": receipt.recipient.name },
    }))
}

/// GET /recognitions?sender_id=&recipient_id=
async fn list_recognitions(
    State(state): State<AppState>,
    Query(query): Query<RecognitionQuery>,
) -> ApiResult<Vec<recognition_ledger::RecognitionEntry>> {
    let filter = RecognitionFilter {
        sender_id: query.sender_id,
        recipient_id: query.recipient_id,
    };
    ok(state.ledger().list_recognitions(filter)?)
}

/// GET /recognitions/:id
async fn get_recognition(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<recognition_ledger::RecognitionEntry> {
    ok(state.ledger().get_recognition(id)?)
}

/// POST /endorsements
async fn create_endorsement(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<recognition_ledger::EndorsementReceipt> {
    let recognition_id = int_field(&body, "recognition_id")?;
    let endorser_id = int_field(&body, "endorser_id")?;

    created(state.ledger().endorse(recognition_id, endorser_id)?)
}

/// POST /redemptions
async fn create_redemption(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<recognition_ledger::Redemption> {
    let student_id = int_field(&body, "student_id")?;
    let amount = int_field(&body, "amount")?;

    created(state.ledger().redeem(student_id, amount)?)
}

/// GET /leaderboard?limit=
async fn leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<Vec<recognition_ledger::LeaderboardEntry>> {
    let limit = query.limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT);
    ok(state.ledger().leaderboard(limit)?)
}

/// GET|POST /admin/reset_month
async fn reset_month(State(state): State<AppState>) -> ApiResult<recognition_ledger::ResetSummary> {
    ok(state.ledger().reset_current_month()?)
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/students", post(create_student))
        .route("/students/:id", get(get_student))
        .route("/recognitions", post(create_recognition).get(list_recognitions))
        .route("/recognitions/:id", get(get_recognition))
        .route("/endorsements", post(create_endorsement))
        .route("/redemptions", post(create_redemption))
        .route("/leaderboard", get(leaderboard))
        .route("/admin/reset_month", get(reset_month).post(reset_month))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recognition_ledger=info,ledger_server=info,tower_http=info".into()),
        )
        .init();

    let app_config = AppConfig::load().context("Failed to load configuration")?;

    let ledger = Ledger::from_app_config(&app_config)
        .with_context(|| format!("Failed to open ledger at {}", app_config.database.path))?;
    info!(path = %app_config.database.path, "ledger opened");

    let state = AppState {
        ledger: Arc::new(Mutex::new(ledger)),
        config: app_config.ledger,
    };

    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("server listening on http://{}", addr);

    axum::serve(listener, router(state))
        .await
        .context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_int_field_accepts_numbers_and_numeric_strings() {
        let body = json!({ "amount": 30, "sender_id": " 7 " });
        assert_eq!(int_field(&body, "amount").unwrap(), 30);
        assert_eq!(int_field(&body, "sender_id").unwrap(), 7);
    }

    #[test]
    fn test_int_field_rejects_non_integers() {
        let body = json!({ "a": 1.5, "b": "ten", "c": null, "d": true });
        for key in ["a", "b", "c", "d", "missing"] {
            let err = int_field(&body, key).unwrap_err();
            assert!(matches!(err, LedgerError::Validation(_)), "{key}");
            assert_eq!(err.status_code(), 400);
        }
    }

    #[test]
    fn test_optional_str_field() {
        let body = json!({ "message": "thanks", "empty": null, "number": 3 });
        assert_eq!(optional_str_field(&body, "message").unwrap(), Some("thanks"));
        assert_eq!(optional_str_field(&body, "empty").unwrap(), None);
        assert_eq!(optional_str_field(&body, "missing").unwrap(), None);
        assert!(matches!(
            optional_str_field(&body, "number"),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_api_error_status() {
        let response = ApiError(LedgerError::Conflict { attempts: 3 }).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = ApiError(LedgerError::NotFound("student 9".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
