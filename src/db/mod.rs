//! Database module - AppState and the PostgreSQL side of the report pipeline
//!
//! - `report` - read-only report snapshot over the activity tables
//! - `access` - role based access policy

pub mod access;
pub mod report;

use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ReportConfig;
use crate::report::evidence::EvidenceMaterializer;
use crate::report::pdf::PdfComposer;
use crate::report::ReportService;

pub use access::PgAccessPolicy;
pub use report::PgReportRepository;

#[derive(Clone)]
pub struct AppState {
    pub reports: Arc<ReportService>,
}

impl AppState {
    pub async fn new_with_config(config: &ReportConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(900))
            .max_lifetime(Duration::from_secs(1800))
            .connect(&config.database_url)
            .await?;
        log::info!("Connected to database");

        let composer = PdfComposer::from_config(config);
        if composer.is_archival() {
            log::info!("Reports will be generated as PDF/A-1b");
        } else {
            log::warn!("No ICC profile loaded, reports will be generated as plain PDF");
        }

        let service = ReportService::new(
            Arc::new(PgReportRepository::new(pool.clone())),
            Arc::new(PgAccessPolicy::new(pool)),
            EvidenceMaterializer::new(
                config.storage_root.clone(),
                config.evidence_read_concurrency,
            ),
            composer,
        );

        Ok(Self::from_service(service))
    }

    /// Wrap an already assembled service, e.g. one built over in-memory stores.
    pub fn from_service(service: ReportService) -> Self {
        Self {
            reports: Arc::new(service),
        }
    }
}
