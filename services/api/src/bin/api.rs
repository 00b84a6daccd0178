//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{FallbackStore, FileHolidayCalendar, GistBackend, LocalFileBackend, PostgresBackend, StoreAdapter},
    config::Config,
    error::ApiError,
    web::{
        attendance::{
            export_excel_handler, home_handler, monthly_view_handler, punch_handler,
            save_attendance_handler, save_field_handler,
        },
        auth::{auth_form_handler, auth_status_handler, display_name_handler, logout_handler},
        middleware::require_auth,
        rest::ApiDoc,
        state::AppState,
        status_handler,
    },
};
use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use kintai_core::ports::{HolidayCalendar, StorageBackend};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Assemble the Storage Backend Chain ---
    // Priority order: primary document store, gist mirror, local file. A
    // provider that cannot be set up is skipped with a warning; the local
    // file is always present so the chain is never empty.
    let mut backends: Vec<Arc<dyn StorageBackend>> = Vec::new();

    if let Some(database_url) = &config.database_url {
        info!("Connecting to the primary document store...");
        match PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
        {
            Ok(pool) => {
                let backend = PostgresBackend::new(pool);
                info!("Running database migrations...");
                match backend.run_migrations().await {
                    Ok(()) => {
                        info!("Primary document store ready.");
                        backends.push(Arc::new(backend));
                    }
                    Err(e) => warn!("Migrations failed; primary store disabled: {e}"),
                }
            }
            Err(e) => warn!("Primary document store unreachable; degrading: {e}"),
        }
    }

    if let (Some(gist_id), Some(token)) = (&config.gist_id, &config.github_token) {
        info!("Gist mirror backend enabled.");
        backends.push(Arc::new(GistBackend::new(gist_id.clone(), token.clone())));
    }

    backends.push(Arc::new(LocalFileBackend::new(config.data_file.clone())));
    let storage = Arc::new(FallbackStore::new(backends));

    // --- 3. Initialize Service Adapters ---
    let store = Arc::new(StoreAdapter::new(
        storage.clone() as Arc<dyn StorageBackend>
    ));
    let holidays: Arc<dyn HolidayCalendar> = match &config.holiday_file {
        Some(path) => Arc::new(FileHolidayCalendar::from_file(path)),
        None => Arc::new(FileHolidayCalendar::weekend_only()),
    };

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        attendance: store.clone(),
        auth: store,
        holidays,
        storage,
        config: config.clone(),
    });

    // --- 5. Configure CORS ---
    let allowed_origin = config
        .allowed_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("invalid ALLOWED_ORIGIN: {e}")))?;
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 6. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth", get(auth_status_handler).post(auth_form_handler))
        .route("/logout", get(logout_handler))
        .route("/api/status", get(status_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/", get(home_handler))
        .route("/attendance", get(monthly_view_handler))
        .route("/attendance_info", get(monthly_view_handler))
        .route("/save_attendance", post(save_attendance_handler))
        .route("/api/punch", post(punch_handler))
        .route("/api/save_field", post(save_field_handler))
        .route("/api/save_attendance", post(save_field_handler))
        .route("/api/display_name", post(display_name_handler))
        .route("/export_excel", get(export_excel_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
