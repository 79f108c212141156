// Realty Insights - API Server
// REST API with Axum over the shared SQLite database

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;

use realty_insights::{
    add_user, config::AppConfig, delete_user, get_user_courses, get_user_valuations, list_courses,
    list_users, load_catalog, logging, open_database, save_enrollment, save_valuation,
    CommercialPropertyInput, CredentialSource, Enrollment, Identity, ManagedUser, MemoryStore,
    NewUser, PropertyInput, RealtyError, ResidentialPropertyInput, Session, SqliteCredentials,
    ValuationResult, Valuator, DEFAULT_TOTAL_LESSONS,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    valuator: Valuator,
}

impl AppState {
    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError(RealtyError::Storage("database lock poisoned".to_string())))
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
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

impl ApiResponse<()> {
    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Domain errors mapped onto HTTP status codes
struct ApiError(RealtyError);

impl From<RealtyError> for ApiError {
    fn from(err: RealtyError) -> Self {
        ApiError(err)
    }
}

fn status_for(err: &RealtyError) -> StatusCode {
    match err {
        RealtyError::MissingRequiredField { .. }
        | RealtyError::PasswordMismatch
        | RealtyError::PasswordTooShort { .. } => StatusCode::BAD_REQUEST,
        RealtyError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        RealtyError::UsernameTaken(_) | RealtyError::SessionActive(_) => StatusCode::CONFLICT,
        RealtyError::UnknownPropertySubtype(_) | RealtyError::UnknownCondition(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        RealtyError::UserNotFound(_) | RealtyError::CourseNotFound(_) => StatusCode::NOT_FOUND,
        RealtyError::Storage(_) | RealtyError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(error = %self.0, status = status.as_u16(), "Request rejected");
        }
        (status, Json(ApiResponse::err(self.0.to_string()))).into_response()
    }
}

type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::ok(data))))
}

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    confirm_password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveValuationRequest {
    user_id: i64,
    property: PropertyInput,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SavedResponse {
    id: i64,
    #[serde(flatten)]
    result: ValuationResult,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddedUserResponse {
    user: ManagedUser,
    temporary_password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnrollRequest {
    total_lessons: Option<u32>,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/auth/login
async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> ApiResult<Identity> {
    let conn = state.conn()?;
    let mut session = Session::new(MemoryStore::new(), SqliteCredentials::new(&conn));

    let identity = session.login(&body.username, &body.password)?;
    tracing::info!(username = %identity.username, "Login");
    ok(identity)
}

/// POST /api/auth/register
async fn register(State(state): State<AppState>, Json(body): Json<RegisterRequest>) -> ApiResult<Identity> {
    let conn = state.conn()?;
    let credentials = SqliteCredentials::new(&conn);

    Session::new(MemoryStore::new(), SqliteCredentials::new(&conn)).register(
        &body.username,
        &body.password,
        &body.confirm_password,
    )?;

    let identity = credentials
        .authenticate(&body.username, &body.password)?
        .ok_or(RealtyError::InvalidCredentials)?;

    tracing::info!(username = %identity.username, "Registered");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(identity))))
}

/// GET /api/users
async fn users(State(state): State<AppState>) -> ApiResult<Vec<realty_insights::UserRow>> {
    let conn = state.conn()?;
    ok(list_users(&conn)?)
}

/// DELETE /api/users/:id
async fn remove_user(State(state): State<AppState>, Path(user_id): Path<i64>) -> ApiResult<i64> {
    let conn = state.conn()?;
    delete_user(&conn, user_id)?;
    ok(user_id)
}

/// POST /api/users - admin "add user"
async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<NewUser>,
) -> ApiResult<AddedUserResponse> {
    let conn = state.conn()?;
    let (user, temporary_password) = add_user(&conn, body)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(AddedUserResponse { user, temporary_password })),
    ))
}

/// GET /api/courses
async fn courses(State(state): State<AppState>) -> ApiResult<Vec<realty_insights::Course>> {
    let conn = state.conn()?;
    ok(list_courses(&conn)?)
}

/// GET /api/user/:id/courses
async fn user_courses(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Vec<realty_insights::EnrolledCourse>> {
    let conn = state.conn()?;
    ok(get_user_courses(&conn, user_id)?)
}

/// POST /api/user/:id/courses/:course_id - enroll; re-enrolling keeps progress
async fn enroll(
    State(state): State<AppState>,
    Path((user_id, course_id)): Path<(i64, i64)>,
    body: Option<Json<EnrollRequest>>,
) -> ApiResult<Enrollment> {
    let total_lessons = body
        .and_then(|Json(b)| b.total_lessons)
        .unwrap_or(DEFAULT_TOTAL_LESSONS);

    let conn = state.conn()?;
    let mut catalog = load_catalog(&conn, user_id)?;
    catalog.enroll(course_id, total_lessons)?;
    let enrollment = catalog
        .enrollment(course_id)
        .cloned()
        .ok_or(RealtyError::CourseNotFound(course_id))?;
    save_enrollment(&conn, user_id, &enrollment)?;
    ok(enrollment)
}

/// POST /api/user/:id/courses/:course_id/lesson - one more lesson done
async fn complete_lesson(
    State(state): State<AppState>,
    Path((user_id, course_id)): Path<(i64, i64)>,
) -> ApiResult<Enrollment> {
    let conn = state.conn()?;
    let mut catalog = load_catalog(&conn, user_id)?;
    catalog.record_lesson(course_id)?;
    let enrollment = catalog
        .enrollment(course_id)
        .cloned()
        .ok_or(RealtyError::CourseNotFound(course_id))?;
    save_enrollment(&conn, user_id, &enrollment)?;
    ok(enrollment)
}

/// POST /api/valuations/residential - compute only
async fn value_residential(
    State(state): State<AppState>,
    Json(input): Json<ResidentialPropertyInput>,
) -> ApiResult<ValuationResult> {
    ok(state.valuator.residential(&input)?)
}

/// POST /api/valuations/commercial - compute only
async fn value_commercial(
    State(state): State<AppState>,
    Json(input): Json<CommercialPropertyInput>,
) -> ApiResult<ValuationResult> {
    ok(state.valuator.commercial(&input)?)
}

/// POST /api/valuations - compute and save
async fn create_valuation(
    State(state): State<AppState>,
    Json(body): Json<SaveValuationRequest>,
) -> ApiResult<SavedResponse> {
    let result = state.valuator.valuate(&body.property)?;
    let conn = state.conn()?;
    let id = save_valuation(&conn, body.user_id, &body.property, &result)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(SavedResponse { id, result }))))
}

/// GET /api/user/:id/valuations
async fn user_valuations(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> ApiResult<Vec<realty_insights::SavedValuation>> {
    let conn = state.conn()?;
    ok(get_user_valuations(&conn, user_id)?)
}

// ============================================================================
// Main Server
// ============================================================================

fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/users", get(users).post(create_user))
        .route("/users/:id", delete(remove_user))
        .route("/courses", get(courses))
        .route("/user/:id/courses", get(user_courses))
        .route("/user/:id/courses/:course_id", post(enroll))
        .route("/user/:id/courses/:course_id/lesson", post(complete_lesson))
        .route("/valuations/residential", post(value_residential))
        .route("/valuations/commercial", post(value_commercial))
        .route("/valuations", post(create_valuation))
        .route("/user/:id/valuations", get(user_valuations))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var("REALTY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("realty.toml"));
    let config = AppConfig::load(Some(&config_path))?;
    logging::init(&config.logging);

    println!("🌐 Realty Insights - API Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let conn = open_database(&config.storage.db_path)?;
    tracing::info!(db = ?config.storage.db_path, "Database opened");

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        valuator: Valuator::new(config.valuation.reference_year),
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.addr).await?;

    println!("\n🚀 Server running on http://{}", config.server.addr);
    println!("   API: http://{}/api/health", config.server.addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await?;
    Ok(())
}
