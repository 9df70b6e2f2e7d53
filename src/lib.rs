pub mod booking;
pub mod error;
pub mod handlers;
pub mod ical;
pub mod lifecycle;
pub mod models;
pub mod openapi;
pub mod settings;
pub mod store;
pub mod timezone;
pub mod validation;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch},
};
use handlers::{
    create_booking, create_class, delete_booking, delete_class, get_class, get_ical, healthz_live,
    healthz_ready, list_bookings, list_classes, root, update_booking,
};
use http::HeaderValue;
use tower_http::LatencyUnit;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::booking::{BookingPolicy, BookingWorkflow};
use crate::ical::ICalExporter;
use crate::lifecycle::{ClassLifecycle, ClassPolicy};
use crate::openapi::ApiDoc;
use crate::settings::Settings;
use crate::store::MemoryStore;

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub classes: Arc<ClassLifecycle>,
    pub bookings: Arc<BookingWorkflow>,
    pub exporter: Arc<ICalExporter>,
}

impl AppState {
    /// Wires the lifecycle engine and booking workflow over one store.
    pub fn new(settings: Settings, store: MemoryStore) -> Self {
        let classes = Arc::new(ClassLifecycle::new(
            Arc::new(store.clone()),
            ClassPolicy::from(&settings),
        ));
        let bookings = Arc::new(BookingWorkflow::new(
            classes.clone(),
            Arc::new(store),
            BookingPolicy::from(&settings),
        ));
        Self {
            settings,
            classes,
            bookings,
            exporter: Arc::new(ICalExporter::new()),
        }
    }
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;

    let env_filter = if settings.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .without_time()
        .init();

    let state = AppState::new(settings, MemoryStore::new());
    let app = build_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], state.settings.port));
    info!(
        "Starting {} Booking API on {addr} (default timezone {})",
        state.settings.studio_name, state.settings.default_timezone
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    let mut router = Router::new()
        .route("/", get(root))
        .route("/healthz/live", get(healthz_live))
        .route("/healthz/ready", get(healthz_ready))
        .route("/classes", get(list_classes).post(create_class))
        .route("/classes.ical", get(get_ical))
        .route("/classes/{id}", get(get_class).delete(delete_class))
        .route("/bookings", get(list_bookings).post(create_booking))
        .route("/bookings/{id}", patch(update_booking).delete(delete_booking))
        .with_state(state.clone());

    if state.settings.enable_swagger {
        let openapi = ApiDoc::openapi();
        let swagger = SwaggerUi::new("/docs").url("/openapi.json", openapi);
        router = router.merge(swagger);
    }

    if let Some(cors) = cors_layer(&state.settings.cors_origins) {
        router = router.layer(cors);
    }

    router.layer(trace_layer)
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(origin = %origin, error = %err, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if origins.is_empty() {
        return None;
    }
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any),
    )
}
