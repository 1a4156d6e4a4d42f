mod common;

use activity_report_server::auth::generate_access_token;
use activity_report_server::{configure_app, AppState, ErrorResponse};
use actix_web::http::{header, StatusCode};
use actix_web::{test, web, App};
use common::*;
use std::sync::Arc;
use tempfile::TempDir;

const USER: &str = "gestor.agronomia";

fn fixture() -> Fixture {
    Fixture {
        courses: vec![course(1, "Agronomia")],
        activities: vec![
            activity(10, 1, (2, "Pesquisa"), "Oficina de solos", "2024-03-05"),
            activity(11, 1, (1, "Extensão"), "Dia de campo", "2024-04-10"),
        ],
        evidence: vec![evidence(100, 11, Some(1), Some("Abertura"), "foto.png")],
        links: Vec::new(),
    }
}

fn state(renderer: Arc<dyn activity_report_server::report::pdf::HtmlRenderer>) -> (web::Data<AppState>, TempDir) {
    let storage = tempfile::tempdir().expect("Failed to create storage root");
    write_png(storage.path(), "foto.png", 30, 30);
    let service = build_service(
        Arc::new(MockReportRepository::new(fixture())),
        Arc::new(MockAccessPolicy::allowing(USER, &[1], &[11])),
        renderer,
        storage.path(),
        None,
    );
    (web::Data::new(AppState::from_service(service)), storage)
}

fn bearer() -> String {
    let token = generate_access_token("7", USER).expect("Failed to generate token");
    format!("Bearer {}", token)
}

#[actix_web::test]
async fn test_course_report_returns_pdf_attachment() {
    let (data, _storage) = state(Arc::new(RecordingRenderer::default()));
    let app = test::init_service(App::new().app_data(data).configure(configure_app)).await;

    let req = test::TestRequest::get()
        .uri("/api/reports/courses/1")
        .insert_header((header::AUTHORIZATION, bearer()))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap();
    assert_eq!(content_type, "application/pdf");
    let disposition = resp
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment"));
    assert!(disposition.contains("relatorio-curso-1.pdf"));

    let body = test::read_body(resp).await;
    assert!(body.starts_with(b"%PDF"));
}

#[actix_web::test]
async fn test_course_report_query_parameters_reach_the_pipeline() {
    let renderer = Arc::new(RecordingRenderer::default());
    let (data, _storage) = state(renderer.clone());
    let app = test::init_service(App::new().app_data(data).configure(configure_app)).await;

    let req = test::TestRequest::get()
        .uri("/api/reports/courses/1?start_date=2024-04-01&category_ids=1&introduction=Resumo%20anual")
        .insert_header((header::AUTHORIZATION, bearer()))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let html = renderer.last_html();
    assert!(html.contains("Dia de campo"));
    assert!(!html.contains("Oficina de solos"));
    assert!(html.contains("Resumo anual"));
}

#[actix_web::test]
async fn test_missing_token_is_forbidden() {
    let (data, _storage) = state(Arc::new(RecordingRenderer::default()));
    let app = test::init_service(App::new().app_data(data).configure(configure_app)).await;

    let req = test::TestRequest::get()
        .uri("/api/reports/courses/1")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "Forbidden");
}

#[actix_web::test]
async fn test_invalid_category_ids_are_rejected() {
    let (data, _storage) = state(Arc::new(RecordingRenderer::default()));
    let app = test::init_service(App::new().app_data(data).configure(configure_app)).await;

    let req = test::TestRequest::get()
        .uri("/api/reports/courses/1?category_ids=1,abc")
        .insert_header((header::AUTHORIZATION, bearer()))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "BadRequest");
}

#[actix_web::test]
async fn test_malformed_date_is_a_json_bad_request() {
    let renderer = Arc::new(RecordingRenderer::default());
    let (data, _storage) = state(renderer.clone());
    let app = test::init_service(App::new().app_data(data).configure(configure_app)).await;

    let req = test::TestRequest::get()
        .uri("/api/reports/courses/1?start_date=2024-13-45")
        .insert_header((header::AUTHORIZATION, bearer()))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "BadRequest");
    assert!(!body.message.is_empty());
    assert!(renderer.documents.lock().unwrap().is_empty());
}

#[actix_web::test]
async fn test_unknown_course_is_not_found() {
    let (data, _storage) = state(Arc::new(RecordingRenderer::default()));
    let app = test::init_service(App::new().app_data(data).configure(configure_app)).await;

    let req = test::TestRequest::get()
        .uri("/api/reports/courses/42")
        .insert_header((header::AUTHORIZATION, bearer()))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "NotFound");
    assert!(!body.timestamp.is_empty());
}

#[actix_web::test]
async fn test_activity_report_route() {
    let (data, _storage) = state(Arc::new(RecordingRenderer::default()));
    let app = test::init_service(App::new().app_data(data).configure(configure_app)).await;

    let req = test::TestRequest::get()
        .uri("/api/reports/activities/11")
        .insert_header((header::AUTHORIZATION, bearer()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let disposition = resp
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("relatorio-atividade-11.pdf"));

    let req = test::TestRequest::get()
        .uri("/api/reports/activities/10")
        .insert_header((header::AUTHORIZATION, bearer()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_rendering_failure_hides_html_from_client() {
    let (data, _storage) = state(Arc::new(FailingRenderer));
    let app = test::init_service(App::new().app_data(data).configure(configure_app)).await;

    let req = test::TestRequest::get()
        .uri("/api/reports/courses/1")
        .insert_header((header::AUTHORIZATION, bearer()))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(body.error, "InternalRenderingFailure");
    assert!(!body.message.contains("<!DOCTYPE"));
}

#[actix_web::test]
async fn test_health_endpoint() {
    let (data, _storage) = state(Arc::new(RecordingRenderer::default()));
    let app = test::init_service(App::new().app_data(data).configure(configure_app)).await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
}
