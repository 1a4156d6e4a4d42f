//! HTML rendering of the view models through the bundled askama templates.

use askama::Template;

use super::error::ReportError;
use super::view::{ActivityReportView, CourseReportView};

pub const COURSE_TEMPLATE: &str = "relatorio-curso.html";
pub const ACTIVITY_TEMPLATE: &str = "relatorio-atividade.html";

#[derive(Template)]
#[template(path = "relatorio-curso.html")]
pub struct CourseReportTemplate<'a> {
    pub report: &'a CourseReportView,
}

#[derive(Template)]
#[template(path = "relatorio-atividade.html")]
pub struct ActivityReportTemplate<'a> {
    pub report: &'a ActivityReportView,
}

pub fn render_course_html(view: &CourseReportView) -> Result<String, ReportError> {
    CourseReportTemplate { report: view }
        .render()
        .map_err(|e| template_failure(COURSE_TEMPLATE, e))
}

pub fn render_activity_html(view: &ActivityReportView) -> Result<String, ReportError> {
    ActivityReportTemplate { report: view }
        .render()
        .map_err(|e| template_failure(ACTIVITY_TEMPLATE, e))
}

fn template_failure(template: &str, error: askama::Error) -> ReportError {
    log::error!("Template {} failed to render: {}", template, error);
    ReportError::Rendering {
        message: format!("template {} failed: {}", template, error),
        preview: String::new(),
    }
}
