//! In-memory doubles for the report pipeline.
#![allow(dead_code)]

use activity_report_server::report::evidence::EvidenceMaterializer;
use activity_report_server::report::loader::{report_order, ReportWindow};
use activity_report_server::report::models::{
    Activity, Category, Course, Evidence, ParticipantRole,
};
use activity_report_server::report::pdf::{HtmlRenderer, PdfComposer, RenderError};
use activity_report_server::report::repository::{
    AccessPolicy, ReportRepository, ReportSnapshot, RepositoryError,
};
use activity_report_server::report::ReportService;
use async_trait::async_trait;
use chrono::NaiveDate;
use image::{ImageFormat, RgbImage};
use lopdf::{dictionary, Document, Object};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Rows the mock store serves.
#[derive(Debug, Clone, Default)]
pub struct Fixture {
    pub courses: Vec<Course>,
    pub activities: Vec<Activity>,
    pub evidence: Vec<Evidence>,
    /// (activity id, role) participant links.
    pub links: Vec<(i64, ParticipantRole)>,
}

pub struct MockReportRepository {
    data: Arc<Fixture>,
    opened: AtomicUsize,
    finished: Arc<AtomicUsize>,
}

impl MockReportRepository {
    pub fn new(fixture: Fixture) -> Self {
        Self {
            data: Arc::new(fixture),
            opened: AtomicUsize::new(0),
            finished: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn snapshots_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn snapshots_finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportRepository for MockReportRepository {
    async fn begin_read(&self) -> Result<Box<dyn ReportSnapshot>, RepositoryError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSnapshot {
            data: Arc::clone(&self.data),
            finished: Arc::clone(&self.finished),
        }))
    }
}

struct MockSnapshot {
    data: Arc<Fixture>,
    finished: Arc<AtomicUsize>,
}

#[async_trait]
impl ReportSnapshot for MockSnapshot {
    async fn find_course_by_id(&mut self, id: i64) -> Result<Option<Course>, RepositoryError> {
        Ok(self.data.courses.iter().find(|c| c.id == id).cloned())
    }

    async fn find_activity_by_id(&mut self, id: i64) -> Result<Option<Activity>, RepositoryError> {
        Ok(self.data.activities.iter().find(|a| a.id == id).cloned())
    }

    async fn find_activities_for_report(
        &mut self,
        course_id: i64,
        window: &ReportWindow,
    ) -> Result<Vec<Activity>, RepositoryError> {
        let mut activities: Vec<Activity> = self
            .data
            .activities
            .iter()
            .filter(|a| a.course_id == course_id && window.admits(a))
            .cloned()
            .collect();
        activities.sort_by(report_order);
        Ok(activities)
    }

    async fn find_evidence_by_activity_ids(
        &mut self,
        activity_ids: &[i64],
    ) -> Result<Vec<Evidence>, RepositoryError> {
        let mut evidence: Vec<Evidence> = self
            .data
            .evidence
            .iter()
            .filter(|e| activity_ids.contains(&e.activity_id))
            .cloned()
            .collect();
        evidence.sort_by_key(|e| (e.order.is_none(), e.order, e.id));
        Ok(evidence)
    }

    async fn count_participants_by_activity_ids(
        &mut self,
        activity_ids: &[i64],
        roles: &[ParticipantRole],
    ) -> Result<HashMap<i64, i64>, RepositoryError> {
        let mut counts = HashMap::new();
        for (activity_id, role) in &self.data.links {
            if activity_ids.contains(activity_id) && roles.contains(role) {
                *counts.entry(*activity_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn finish(self: Box<Self>) -> Result<(), RepositoryError> {
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Grants exactly the listed (user, id) pairs.
#[derive(Default)]
pub struct MockAccessPolicy {
    pub course_access: Vec<(String, i64)>,
    pub activity_edit: Vec<(String, i64)>,
    calls: AtomicUsize,
}

impl MockAccessPolicy {
    pub fn allowing(user: &str, course_ids: &[i64], activity_ids: &[i64]) -> Self {
        Self {
            course_access: course_ids.iter().map(|id| (user.to_string(), *id)).collect(),
            activity_edit: activity_ids.iter().map(|id| (user.to_string(), *id)).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccessPolicy for MockAccessPolicy {
    async fn can_access_course(&self, user: &str, course_id: i64) -> Result<bool, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .course_access
            .iter()
            .any(|(u, id)| u == user && *id == course_id))
    }

    async fn can_edit_activity(
        &self,
        user: &str,
        activity_id: i64,
    ) -> Result<bool, RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .activity_edit
            .iter()
            .any(|(u, id)| u == user && *id == activity_id))
    }
}

/// Renderer that keeps every HTML document it receives and answers with a
/// one page PDF.
#[derive(Default)]
pub struct RecordingRenderer {
    pub documents: Mutex<Vec<String>>,
}

impl RecordingRenderer {
    pub fn last_html(&self) -> String {
        self.documents
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap_or_default()
    }
}

impl HtmlRenderer for RecordingRenderer {
    fn render(&self, html: &str, _base_uri: &str) -> Result<Vec<u8>, RenderError> {
        self.documents.lock().unwrap().push(html.to_string());
        Ok(blank_pdf())
    }
}

/// Renderer that always fails the way a crashing layout tool would.
pub struct FailingRenderer;

impl HtmlRenderer for FailingRenderer {
    fn render(&self, _html: &str, _base_uri: &str) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::RendererExit {
            code: 2,
            stderr: "layout engine crashed".to_string(),
        })
    }
}

pub fn blank_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(pages_id),
        "MediaBox" => Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(595),
            Object::Integer(842),
        ]),
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => Object::Array(vec![Object::Reference(page_id)]),
            "Count" => Object::Integer(1),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    let mut out = Vec::new();
    doc.save_to(&mut out).expect("Failed to save blank PDF");
    out
}

pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) {
    let image = RgbImage::from_pixel(width, height, image::Rgb([30, 120, 200]));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .expect("Failed to encode PNG");
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create evidence directory");
    }
    std::fs::write(path, bytes.into_inner()).expect("Failed to write PNG");
}

pub fn date(value: &str) -> NaiveDate {
    value.parse().expect("Invalid test date")
}

pub fn course(id: i64, name: &str) -> Course {
    Course {
        id,
        name: name.to_string(),
        description: Some("Curso de graduação".to_string()),
        type_name: Some("Bacharelado".to_string()),
        academic_unit: Some("Campus Sul".to_string()),
    }
}

pub fn activity(id: i64, course_id: i64, category: (i64, &str), name: &str, day: &str) -> Activity {
    Activity {
        id,
        name: name.to_string(),
        objective: Some("Integrar ensino e comunidade".to_string()),
        target_audience: Some("Estudantes".to_string()),
        coordinator_name: Some("Maria Souza".to_string()),
        realization_date: date(day),
        end_date: None,
        published: true,
        category: Category {
            id: category.0,
            name: category.1.to_string(),
        },
        course_id,
        funding_sources: Vec::new(),
    }
}

pub fn evidence(id: i64, activity_id: i64, order: Option<i32>, caption: Option<&str>, file: &str) -> Evidence {
    Evidence {
        id,
        caption: caption.map(str::to_string),
        order,
        file_path: file.to_string(),
        activity_id,
    }
}

/// Service over in-memory stores with evidence read from `storage_root`.
pub fn build_service(
    repository: Arc<MockReportRepository>,
    policy: Arc<MockAccessPolicy>,
    renderer: Arc<dyn HtmlRenderer>,
    storage_root: &Path,
    icc_profile: Option<Vec<u8>>,
) -> ReportService {
    ReportService::new(
        repository,
        policy,
        EvidenceMaterializer::new(storage_root.to_path_buf(), 2),
        PdfComposer::new(renderer, icc_profile, "file:///tmp/report/"),
    )
}
