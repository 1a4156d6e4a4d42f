//! The report pipeline. Stages run strictly in sequence and nothing is
//! retried; any failure aborts the request.

use chrono::Local;
use std::fmt;
use std::sync::Arc;

use super::access::{authorize_activity, authorize_course, require_identity};
use super::aggregator::{aggregate, attach};
use super::error::ReportError;
use super::evidence::EvidenceMaterializer;
use super::loader::{load_activity, load_attachments, load_course, load_course_activities, ReportWindow};
use super::models::{
    activity_report_filename, course_report_filename, ActivityReportRequest, CourseReportRequest,
    Evidence, GeneratedReport,
};
use super::pdf::{ComposedPdf, PdfComposer};
use super::repository::{AccessPolicy, ReportRepository};
use super::template::{render_activity_html, render_course_html};
use super::view::{build_activity_view, build_course_view};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStage {
    Loading,
    Authorizing,
    Aggregating,
    MaterializingEvidence,
    BuildingView,
    RenderingHtml,
    ComposingPdf,
    Done,
}

impl fmt::Display for ReportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Loading => "LOADING",
            Self::Authorizing => "AUTHORIZING",
            Self::Aggregating => "AGGREGATING",
            Self::MaterializingEvidence => "MATERIALIZING_EVIDENCE",
            Self::BuildingView => "BUILDING_VIEW",
            Self::RenderingHtml => "RENDERING_HTML",
            Self::ComposingPdf => "COMPOSING_PDF",
            Self::Done => "DONE",
        };
        f.write_str(name)
    }
}

fn enter(subject: &str, stage: ReportStage) {
    log::debug!("Report for {}: {}", subject, stage);
}

fn log_failure(subject: &str, error: &ReportError) {
    match error {
        ReportError::NotFound(_) | ReportError::Forbidden(_) => {
            log::warn!("Report for {} failed: {}", subject, error)
        }
        _ => log::error!("Report for {} failed: {}", subject, error),
    }
}

pub struct ReportService {
    repository: Arc<dyn ReportRepository>,
    policy: Arc<dyn AccessPolicy>,
    materializer: EvidenceMaterializer,
    composer: Arc<PdfComposer>,
}

impl ReportService {
    pub fn new(
        repository: Arc<dyn ReportRepository>,
        policy: Arc<dyn AccessPolicy>,
        materializer: EvidenceMaterializer,
        composer: PdfComposer,
    ) -> Self {
        Self {
            repository,
            policy,
            materializer,
            composer: Arc::new(composer),
        }
    }

    pub async fn generate_course_report(
        &self,
        request: CourseReportRequest,
    ) -> Result<GeneratedReport, ReportError> {
        let subject = format!("course {}", request.course_id);
        let result = self.run_course_report(&subject, request).await;
        if let Err(e) = &result {
            log_failure(&subject, e);
        }
        result
    }

    pub async fn generate_activity_report(
        &self,
        request: ActivityReportRequest,
    ) -> Result<GeneratedReport, ReportError> {
        let subject = format!("activity {}", request.activity_id);
        let result = self.run_activity_report(&subject, request).await;
        if let Err(e) = &result {
            log_failure(&subject, e);
        }
        result
    }

    async fn run_course_report(
        &self,
        subject: &str,
        request: CourseReportRequest,
    ) -> Result<GeneratedReport, ReportError> {
        let requester = require_identity(request.requester.as_deref())?;

        enter(subject, ReportStage::Loading);
        let mut snapshot = self.repository.begin_read().await?;
        let course = load_course(snapshot.as_mut(), request.course_id).await?;

        enter(subject, ReportStage::Authorizing);
        authorize_course(self.policy.as_ref(), requester, course.id).await?;

        let window = ReportWindow::new(request.start_date, request.end_date, request.category_ids);
        let data = load_course_activities(snapshot.as_mut(), course, &window).await?;
        snapshot.finish().await?;

        enter(subject, ReportStage::Aggregating);
        let aggregation = aggregate(data.activities, data.evidence, &data.participants);

        enter(subject, ReportStage::MaterializingEvidence);
        let evidence: Vec<Evidence> = aggregation
            .groups
            .iter()
            .flat_map(|g| g.activities.iter())
            .flat_map(|a| a.evidence.iter().cloned())
            .collect();
        let materialized = self.materializer.materialize_all(evidence).await;

        enter(subject, ReportStage::BuildingView);
        let view = build_course_view(
            &data.course,
            &window,
            request.introduction.as_deref(),
            &aggregation,
            &materialized,
            Local::now().naive_local(),
        );

        enter(subject, ReportStage::RenderingHtml);
        let html = render_course_html(&view)?;

        enter(subject, ReportStage::ComposingPdf);
        let composed = self.compose(html, view.title.clone()).await?;

        enter(subject, ReportStage::Done);
        log::info!(
            "Course report {} generated: {} activities, {} evidence, {} bytes{}",
            data.course.id,
            view.totals.activities,
            view.totals.evidence,
            composed.bytes.len(),
            if composed.archival { " (PDF/A-1b)" } else { "" }
        );

        Ok(GeneratedReport {
            filename: course_report_filename(data.course.id),
            pdf: composed.bytes,
            archival: composed.archival,
        })
    }

    async fn run_activity_report(
        &self,
        subject: &str,
        request: ActivityReportRequest,
    ) -> Result<GeneratedReport, ReportError> {
        let requester = require_identity(request.requester.as_deref())?;

        enter(subject, ReportStage::Loading);
        let mut snapshot = self.repository.begin_read().await?;
        let activity = load_activity(snapshot.as_mut(), request.activity_id).await?;

        enter(subject, ReportStage::Authorizing);
        authorize_activity(self.policy.as_ref(), requester, activity.id).await?;

        let course = load_course(snapshot.as_mut(), activity.course_id).await?;
        let (mut evidence, participants) = load_attachments(snapshot.as_mut(), &[activity.id]).await?;
        snapshot.finish().await?;

        enter(subject, ReportStage::Aggregating);
        let item = attach(activity, &mut evidence, &participants);

        enter(subject, ReportStage::MaterializingEvidence);
        let materialized = self.materializer.materialize_all(item.evidence.clone()).await;

        enter(subject, ReportStage::BuildingView);
        let view = build_activity_view(
            &course,
            &item,
            request.introduction.as_deref(),
            &materialized,
            Local::now().naive_local(),
        );

        enter(subject, ReportStage::RenderingHtml);
        let html = render_activity_html(&view)?;

        enter(subject, ReportStage::ComposingPdf);
        let composed = self.compose(html, view.activity.name.clone()).await?;

        enter(subject, ReportStage::Done);
        log::info!(
            "Activity report {} generated: {} evidence, {} bytes{}",
            item.activity.id,
            item.evidence.len(),
            composed.bytes.len(),
            if composed.archival { " (PDF/A-1b)" } else { "" }
        );

        Ok(GeneratedReport {
            filename: activity_report_filename(item.activity.id),
            pdf: composed.bytes,
            archival: composed.archival,
        })
    }

    /// Run the compositor on the blocking pool.
    async fn compose(&self, html: String, title: String) -> Result<ComposedPdf, ReportError> {
        let composer = Arc::clone(&self.composer);
        match tokio::task::spawn_blocking(move || composer.compose(&html, &title)).await {
            Ok(result) => result,
            Err(e) => Err(ReportError::Rendering {
                message: format!("composition task failed: {}", e),
                preview: String::new(),
            }),
        }
    }
}
