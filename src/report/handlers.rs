use actix_web::error::{InternalError, QueryPayloadError};
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse, Responder, ResponseError};
use chrono::NaiveDate;
use log::{debug, info};
use serde::Deserialize;
use utoipa::IntoParams;

use super::models::{ActivityReportRequest, CourseReportRequest, GeneratedReport};
use crate::auth::validate_request_token;
use crate::db::AppState;
use crate::ErrorResponse;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CourseReportQuery {
    /// First day of the report period (YYYY-MM-DD).
    pub start_date: Option<NaiveDate>,
    /// Last day of the report period (YYYY-MM-DD).
    pub end_date: Option<NaiveDate>,
    /// Comma-separated category ids, e.g. `1,4`.
    pub category_ids: Option<String>,
    pub introduction: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActivityReportQuery {
    pub introduction: Option<String>,
}

/// Parse a comma-separated id list. Empty input means no filter.
pub fn parse_category_ids(raw: Option<&str>) -> Result<Option<Vec<i64>>, String> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| format!("Invalid category id '{}'", s))
        })
        .collect::<Result<Vec<i64>, String>>()?;
    Ok(if ids.is_empty() { None } else { Some(ids) })
}

/// Username of a valid bearer token. Anything else counts as no identity.
fn requester_identity(req: &HttpRequest) -> Option<String> {
    match validate_request_token(req) {
        Ok(claims) => Some(claims.username),
        Err(e) => {
            debug!("No requester identity on report request: {}", e);
            None
        }
    }
}

/// Malformed query strings (e.g. `start_date=2024-13-45`) answer with the
/// same JSON body as every other client error.
fn query_error_handler(err: QueryPayloadError, req: &HttpRequest) -> actix_web::Error {
    let message = err.to_string();
    debug!("Rejected query string on {}: {}", req.path(), message);
    let response = HttpResponse::BadRequest().json(ErrorResponse::bad_request(&message));
    InternalError::from_response(err, response).into()
}

fn pdf_response(report: GeneratedReport) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(report.filename)],
        })
        .body(report.pdf)
}

#[utoipa::path(
    context_path = "/api",
    tag = "Report Service",
    get,
    path = "/reports/courses/{id}",
    params(
        ("id" = i64, Path, description = "ID of the course"),
        CourseReportQuery
    ),
    responses(
        (status = 200, description = "Course report PDF", content_type = "application/pdf", body = Vec<u8>),
        (status = 400, description = "Invalid query parameters", body = ErrorResponse),
        (status = 403, description = "Requester may not access the course", body = ErrorResponse),
        (status = 404, description = "Course not found", body = ErrorResponse),
        (status = 500, description = "Report rendering failed", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_course_report(
    req: HttpRequest,
    path: web::Path<i64>,
    query: web::Query<CourseReportQuery>,
    data: web::Data<AppState>,
) -> impl Responder {
    let course_id = path.into_inner();
    info!("Executing get_course_report handler for course {}", course_id);

    let query = query.into_inner();
    let category_ids = match parse_category_ids(query.category_ids.as_deref()) {
        Ok(ids) => ids,
        Err(message) => {
            return HttpResponse::BadRequest().json(ErrorResponse::bad_request(&message));
        }
    };

    let request = CourseReportRequest {
        course_id,
        start_date: query.start_date,
        end_date: query.end_date,
        category_ids,
        introduction: query.introduction,
        requester: requester_identity(&req),
    };

    match data.reports.generate_course_report(request).await {
        Ok(report) => pdf_response(report),
        Err(e) => e.error_response(),
    }
}

#[utoipa::path(
    context_path = "/api",
    tag = "Report Service",
    get,
    path = "/reports/activities/{id}",
    params(
        ("id" = i64, Path, description = "ID of the activity"),
        ActivityReportQuery
    ),
    responses(
        (status = 200, description = "Activity report PDF", content_type = "application/pdf", body = Vec<u8>),
        (status = 403, description = "Requester may not edit the activity", body = ErrorResponse),
        (status = 404, description = "Activity not found", body = ErrorResponse),
        (status = 500, description = "Report rendering failed", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_activity_report(
    req: HttpRequest,
    path: web::Path<i64>,
    query: web::Query<ActivityReportQuery>,
    data: web::Data<AppState>,
) -> impl Responder {
    let activity_id = path.into_inner();
    info!(
        "Executing get_activity_report handler for activity {}",
        activity_id
    );

    let request = ActivityReportRequest {
        activity_id,
        introduction: query.into_inner().introduction,
        requester: requester_identity(&req),
    };

    match data.reports.generate_activity_report(request).await {
        Ok(report) => pdf_response(report),
        Err(e) => e.error_response(),
    }
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::QueryConfig::default().error_handler(query_error_handler))
        .service(web::resource("/reports/courses/{id}").route(web::get().to(get_course_report)))
        .service(
            web::resource("/reports/activities/{id}").route(web::get().to(get_activity_report)),
        );
}
