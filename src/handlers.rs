use axum::extract::{Path, Query, State};
use axum::{Json, http::StatusCode, response::IntoResponse};
use axum_extra::extract::TypedHeader;
use axum_extra::headers::{self, Header};
use chrono::Utc;
use http::{HeaderName, HeaderValue};
use tracing::info;

use crate::{
    AppState,
    error::ApiError,
    models::{
        Booking, BookingDetails, BookingRequest, BookingStatusUpdate, ClassDraft, ClassType,
        FitnessClass,
    },
};

static X_CLIENT_EMAIL: HeaderName = HeaderName::from_static("x-client-email");

/// The caller's email, used as an identity key for listing bookings.
#[derive(Debug, Clone)]
pub struct ClientEmail(pub String);

impl Header for ClientEmail {
    fn name() -> &'static HeaderName {
        &X_CLIENT_EMAIL
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(headers::Error::invalid)?;
        let email = value.to_str().map_err(|_| headers::Error::invalid())?;
        Ok(ClientEmail(email.to_string()))
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        if let Ok(value) = HeaderValue::from_str(&self.0) {
            values.extend(std::iter::once(value));
        }
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct ClassListQuery {
    pub class_type: Option<String>,
}

impl ClassListQuery {
    fn class_type(&self) -> Result<Option<ClassType>, ApiError> {
        self.class_type
            .as_deref()
            .map(str::parse::<ClassType>)
            .transpose()
            .map_err(ApiError::BadRequest)
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct BookingListQuery {
    pub status: Option<String>,
}

#[utoipa::path(get, path = "/", tag = "studio")]
pub async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "message": format!("Welcome to {} Booking API", state.settings.studio_name),
        "endpoints": {
            "/classes": "List upcoming classes or create a class",
            "/classes.ical": "Download upcoming classes as iCal file",
            "/bookings": "Book a class or list your bookings"
        }
    }))
}

#[utoipa::path(get, path = "/healthz/live", tag = "studio")]
pub async fn healthz_live() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[utoipa::path(get, path = "/healthz/ready", tag = "studio")]
pub async fn healthz_ready() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[utoipa::path(
    post,
    path = "/classes",
    request_body = ClassDraft,
    responses(
        (status = 201, description = "Class created", body = FitnessClass),
        (status = 400, description = "Invalid class data"),
        (status = 409, description = "Same name with overlapping time")
    ),
    tag = "classes"
)]
pub async fn create_class(
    State(state): State<AppState>,
    Json(draft): Json<ClassDraft>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Creating new class: {} ({})", draft.name, draft.class_type);
    let now = Utc::now();
    state.classes.reconcile_statuses(now).await?;
    let class = state.classes.create_class(draft, now).await?;
    Ok((StatusCode::CREATED, Json(class)))
}

#[utoipa::path(
    get,
    path = "/classes",
    params(
        ("class_type" = Option<String>, Query, description = "Filter by class type (yoga, zumba, hiit)")
    ),
    responses(
        (status = 200, description = "Upcoming classes ordered by start time", body = [FitnessClass]),
        (status = 400, description = "Invalid class type")
    ),
    tag = "classes"
)]
pub async fn list_classes(
    State(state): State<AppState>,
    Query(query): Query<ClassListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let class_type = query.class_type()?;
    let classes = state.classes.list_upcoming(class_type, Utc::now()).await?;
    info!("Retrieved {} upcoming classes", classes.len());
    Ok(Json(classes))
}

#[utoipa::path(
    get,
    path = "/classes.ical",
    params(
        ("class_type" = Option<String>, Query, description = "Filter by class type (yoga, zumba, hiit)")
    ),
    responses(
        (status = 200, description = "iCal file", content_type = "text/calendar"),
        (status = 404, description = "No upcoming classes")
    ),
    tag = "classes"
)]
pub async fn get_ical(
    State(state): State<AppState>,
    Query(query): Query<ClassListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let class_type = query.class_type()?;
    let classes = state.classes.list_upcoming(class_type, Utc::now()).await?;
    if classes.is_empty() {
        return Err(ApiError::NotFound("No upcoming classes found".into()));
    }

    let body = state
        .exporter
        .generate(&state.settings.studio_name, &classes);
    Ok((
        StatusCode::OK,
        [
            ("content-type", "text/calendar"),
            ("content-disposition", "attachment; filename=classes.ics"),
        ],
        body,
    ))
}

#[utoipa::path(
    get,
    path = "/classes/{id}",
    params(("id" = i64, Path, description = "Class ID")),
    responses(
        (status = 200, description = "Class with current status", body = FitnessClass),
        (status = 404, description = "Class not found")
    ),
    tag = "classes"
)]
pub async fn get_class(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let class = state.classes.get_class(id, Utc::now()).await?;
    Ok(Json(class))
}

#[utoipa::path(
    delete,
    path = "/classes/{id}",
    params(("id" = i64, Path, description = "Class ID")),
    responses(
        (status = 204, description = "Class deleted"),
        (status = 404, description = "Class not found"),
        (status = 409, description = "Class still has confirmed bookings")
    ),
    tag = "classes"
)]
pub async fn delete_class(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    state.classes.reconcile_statuses(now).await?;
    state.classes.delete_class(id, now).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/bookings",
    request_body = BookingRequest,
    responses(
        (status = 201, description = "Booking created", body = BookingDetails),
        (status = 400, description = "Class not bookable, full, or bad input"),
        (status = 404, description = "Class not found"),
        (status = 409, description = "Already booked")
    ),
    tag = "bookings"
)]
pub async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<BookingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!(
        "Creating booking for class {} by {}",
        request.class_id, request.client_email
    );
    let booking = state.bookings.create_booking(request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

#[utoipa::path(
    get,
    path = "/bookings",
    params(
        ("x-client-email" = String, Header, description = "Client's email address"),
        ("status" = Option<String>, Query, description = "Filter by booking status")
    ),
    responses(
        (status = 200, description = "Bookings, newest first", body = [BookingDetails]),
        (status = 400, description = "Invalid email"),
        (status = 404, description = "No bookings found")
    ),
    tag = "bookings"
)]
pub async fn list_bookings(
    State(state): State<AppState>,
    TypedHeader(ClientEmail(email)): TypedHeader<ClientEmail>,
    Query(query): Query<BookingListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let bookings = state
        .bookings
        .get_bookings_by_email(&email, query.status.as_deref(), Utc::now())
        .await?;
    if bookings.is_empty() {
        return Err(ApiError::NotFound("No bookings found for this email".into()));
    }
    info!("Retrieved {} bookings for {}", bookings.len(), email);
    Ok(Json(bookings))
}

#[utoipa::path(
    patch,
    path = "/bookings/{id}",
    params(("id" = i64, Path, description = "Booking ID")),
    request_body = BookingStatusUpdate,
    responses(
        (status = 200, description = "Updated booking", body = Booking),
        (status = 400, description = "Invalid status or no slots to re-confirm"),
        (status = 404, description = "Booking not found")
    ),
    tag = "bookings"
)]
pub async fn update_booking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<BookingStatusUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    state.classes.reconcile_statuses(now).await?;
    let booking = state
        .bookings
        .update_booking_status(id, &update.status, now)
        .await?;
    Ok(Json(booking))
}

#[utoipa::path(
    delete,
    path = "/bookings/{id}",
    params(("id" = i64, Path, description = "Booking ID")),
    responses(
        (status = 204, description = "Booking deleted"),
        (status = 404, description = "Booking not found")
    ),
    tag = "bookings"
)]
pub async fn delete_booking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    state.classes.reconcile_statuses(now).await?;
    state.bookings.delete_booking(id, now).await?;
    Ok(StatusCode::NO_CONTENT)
}
