//! Report module - generation of course and activity reports as PDF/A.
//!
//! The pipeline is split by stage:
//! - `access` - requester identity and authorization checks
//! - `loader` - entity lookups and bulk fetches from a read-only snapshot
//! - `aggregator` - category grouping and totals
//! - `evidence` - evidence files turned into inline images
//! - `text` / `view` - normalized text and the render-ready view model
//! - `template` - askama HTML templates
//! - `pdf` - HTML to PDF composition with the PDF/A fallback
//! - `service` - the stages wired together
//! - `handlers` - HTTP endpoints

pub mod access;
pub mod aggregator;
pub mod error;
pub mod evidence;
pub mod handlers;
pub mod loader;
pub mod models;
pub mod pdf;
pub mod repository;
pub mod service;
pub mod template;
pub mod text;
pub mod view;


pub use error::ReportError;
pub use models::{ActivityReportRequest, CourseReportRequest, GeneratedReport};
pub use repository::{AccessPolicy, ReportRepository, ReportSnapshot, RepositoryError};
pub use service::ReportService;
