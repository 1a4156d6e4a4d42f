use actix_cors::Cors;
use actix_web::middleware::Compress;
use actix_web::{http::header, web, App, HttpResponse, HttpServer, Responder};
use actix_web_prometheus::PrometheusMetricsBuilder;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod config;
pub mod db;
pub mod report;

pub use crate::config::ReportConfig;
pub use crate::db::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self::new("NotFound", message)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new("BadRequest", message)
    }
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Server is up", body = HealthResponse))
)]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn route_not_found() -> impl Responder {
    HttpResponse::NotFound().json(ErrorResponse::not_found("Route not found"))
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::health,
        crate::report::handlers::get_course_report,
        crate::report::handlers::get_activity_report
    ),
    components(schemas(ErrorResponse, HealthResponse)),
    modifiers(&SecurityAddon),
    tags(
        (name = "Report Service", description = "Course and activity reports as PDF/A documents."),
        (name = "Health", description = "Liveness check.")
    ),
    servers(
        (url = "http://127.0.0.1:8080", description = "Localhost server")
    )
)]
pub struct ApiDoc;

/// Routes shared by the server and the handler tests.
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health)))
        .service(web::scope("/api").configure(report::handlers::config));
}

pub async fn run() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ReportConfig::from_env().context("Invalid server configuration")?;
    log::info!(
        "Evidence root: {}, report assets: {}, renderer: {}",
        config.storage_root.display(),
        config.assets_dir.display(),
        config.renderer_bin
    );

    let app_state = match AppState::new_with_config(&config).await {
        Ok(state) => web::Data::new(state),
        Err(e) => {
            log::error!("Failed to connect to database. Please check your DATABASE_URL in .env and ensure the database is running. Error: {}", e);
            return Err(e).context("Database connection failed");
        }
    };

    let prometheus = PrometheusMetricsBuilder::new("activity_report_server")
        .endpoint("/metrics")
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create Prometheus metrics middleware: {}", e))?;

    log::info!("Starting server at http://{}:{}", config.host, config.port);

    HttpServer::new(move || {
        let app_state = app_state.clone();
        let prometheus = prometheus.clone();
        let cors = Cors::default()
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://localhost:3000")
            .allowed_origin("http://localhost:8080")
            .allowed_origin("http://127.0.0.1:8080")
            .allowed_methods(vec!["GET", "OPTIONS"])
            .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT])
            .expose_headers(vec![header::CONTENT_DISPOSITION])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus)
            .wrap(cors)
            .app_data(app_state)
            .configure(configure_app)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .default_service(web::route().to(route_not_found))
    })
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
