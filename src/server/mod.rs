// src/server/mod.rs
//! Axum router and server start-up.

pub mod error;
pub mod handlers;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::utils::AppError;
use state::{AppState, SharedState};

// Room for multipart framing and form fields on top of the file itself.
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

/// Build and return the full Axum router.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.loader.max_bytes().saturating_add(BODY_LIMIT_SLACK);
    let shared: SharedState = Arc::new(state);

    Router::new()
        .route("/health",      get(handlers::health))
        .route("/api/toc",     post(handlers::documents::toc))
        .route("/api/process", post(handlers::documents::process))
        .route("/api/section", post(handlers::lookup::section))
        .route("/api/similar", post(handlers::lookup::similar))
        .route("/api/context", post(handlers::lookup::context))
        .route("/api/ask",     post(handlers::lookup::ask))
        .route("/api/cache",   delete(handlers::clear_cache))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), AppError> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::{HeadingRules, LocatorOptions};
    use crate::llm::testing::{assist_with, FakeBackend};
    use crate::pdf::{DocumentLoader, DEFAULT_MAX_UPLOAD_BYTES};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const FIXTURE: &str = include_str!("../../tests/fixtures/stenter_spec.txt");
    const BOUNDARY: &str = "X-LOCATOR-BOUNDARY";

    fn state(max_bytes: usize, backend: Option<Arc<FakeBackend>>) -> AppState {
        AppState::new(
            DocumentLoader::new(max_bytes, None),
            HeadingRules::default(),
            LocatorOptions::default(),
            backend.map(assist_with),
        )
    }

    fn app() -> Router {
        build_router(state(DEFAULT_MAX_UPLOAD_BYTES, None))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn json_request(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    /// `(name, file name, content type, content)`; file name `None` for plain fields.
    fn multipart_request(uri: &str, parts: &[(&str, Option<&str>, &str, &[u8])]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, file_name, content_type, content) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match file_name {
                Some(file_name) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, file_name, content_type
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes()),
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::post(uri)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(body))
            .expect("request")
    }

    #[tokio::test]
    async fn health_reports_llm_provider() {
        let (status, json) = send(app(), Request::get("/health").body(Body::empty()).expect("request")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert!(json["llm"].is_null());

        let with_llm = build_router(state(DEFAULT_MAX_UPLOAD_BYTES, Some(Arc::new(FakeBackend::answering("x")))));
        let (_, json) = send(with_llm, Request::get("/health").body(Body::empty()).expect("request")).await;
        assert_eq!(json["llm"], "fake");
        assert_eq!(json["cached_answers"], 0);
    }

    #[tokio::test]
    async fn cache_can_be_cleared() {
        let backend = Arc::new(FakeBackend::answering(
            "Similar Results for the keyword 'Heizung': Brenner\nDer Brenner heizt.",
        ));
        let app = build_router(state(DEFAULT_MAX_UPLOAD_BYTES, Some(backend.clone())));
        let body = serde_json::json!({"keyword": "Heizung", "context": "Der Brenner heizt."});
        send(app.clone(), json_request("/api/similar", body.clone())).await;

        let (_, json) = send(app.clone(), Request::get("/health").body(Body::empty()).expect("request")).await;
        assert_eq!(json["cached_answers"], 1);

        let (status, json) = send(app.clone(), Request::delete("/api/cache").body(Body::empty()).expect("request")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["cleared"], 1);

        let (_, again) = send(app, json_request("/api/similar", body)).await;
        assert_eq!(again["cached"], false);
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn section_endpoint_locates_keyword() {
        let request = json_request("/api/section", serde_json::json!({"text": FIXTURE, "keyword": "Fremdlüfter"}));
        let (status, json) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["found"], true);
        assert_eq!(json["heading"], "2.1 Antriebstechnik");
        assert_eq!(json["strategy"], "position_interval");

        let request = json_request("/api/section", serde_json::json!({"text": FIXTURE, "keyword": "Kühlwalze"}));
        let (status, json) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["found"], false);
        assert!(json["message"].is_string());
    }

    #[tokio::test]
    async fn section_endpoint_validates_input() {
        let request = json_request("/api/section", serde_json::json!({"text": FIXTURE, "keyword": "x".repeat(501)}));
        let (status, json) = send(app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);

        let request = json_request("/api/section", serde_json::json!({"text": FIXTURE}));
        let (status, _) = send(app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn similar_requires_llm() {
        let request = json_request("/api/similar", serde_json::json!({"keyword": "Heizung", "context": "Der Brenner heizt."}));
        let (status, json) = send(app(), request).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["error"], "LLM not configured");
    }

    #[tokio::test]
    async fn similar_answers_come_from_cache_on_repeat() {
        let backend = Arc::new(FakeBackend::answering(
            "Similar Results for the keyword 'Heizung': Brenner\nDer Brenner heizt.",
        ));
        let app = build_router(state(DEFAULT_MAX_UPLOAD_BYTES, Some(backend.clone())));
        let body = serde_json::json!({"keyword": "Heizung", "context": "Der Brenner heizt."});

        let (status, first) = send(app.clone(), json_request("/api/similar", body.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["term"], "Brenner");
        assert_eq!(first["cached"], false);

        let (_, second) = send(app, json_request("/api/similar", body)).await;
        assert_eq!(second["cached"], true);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn similar_reports_upstream_failures() {
        let backend = Arc::new(FakeBackend::new(vec![Err(503)]));
        let app = build_router(state(DEFAULT_MAX_UPLOAD_BYTES, Some(backend)));
        let request = json_request("/api/similar", serde_json::json!({"keyword": "Heizung", "context": "Text."}));
        let (status, _) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn section_endpoint_falls_back_to_llm() {
        let backend = Arc::new(FakeBackend::answering(
            "Similar Results for the keyword 'Energierückgewinnung': Wärmerückgewinnung\nWärme aus der Abluft.",
        ));
        let app = build_router(state(DEFAULT_MAX_UPLOAD_BYTES, Some(backend)));
        let request = json_request("/api/section", serde_json::json!({"text": FIXTURE, "keyword": "Energierückgewinnung"}));
        let (status, json) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["found"], true);
        assert_eq!(json["strategy"], "llm_similarity");
    }

    #[tokio::test]
    async fn ask_answers_questions_about_context() {
        let backend = Arc::new(FakeBackend::answering("Die Arbeitsbreite beträgt 2200 mm."));
        let app = build_router(state(DEFAULT_MAX_UPLOAD_BYTES, Some(backend)));
        let request = json_request("/api/ask", serde_json::json!({"query": "Wie breit?", "context": "Arbeitsbreite 2200 mm"}));
        let (status, json) = send(app.clone(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["answer"], "Die Arbeitsbreite beträgt 2200 mm.");
        assert_eq!(json["cached"], false);

        let request = json_request("/api/ask", serde_json::json!({"query": "Wie breit?", "context": "  "}));
        let (status, json) = send(app.clone(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);

        let request = json_request("/api/ask", serde_json::json!({"context": "Arbeitsbreite 2200 mm"}));
        let (status, _) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ask_requires_llm() {
        let request = json_request("/api/ask", serde_json::json!({"query": "Wie breit?", "context": "Arbeitsbreite 2200 mm"}));
        let (status, _) = send(app(), request).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn context_endpoint_returns_hits() {
        let text = "1. Trockner\nDer Brenner heizt. Die Luft zirkuliert.\n1.2 2 Stück Brenner Gas";
        let request = json_request("/api/context", serde_json::json!({"text": text, "keyword": "brenner", "radius": 1}));
        let (status, json) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["hits"][0]["title"], "1. Trockner");
        assert_eq!(json["article_lines"][0], "1.2 2 Stück Brenner Gas");
    }

    #[tokio::test]
    async fn uploads_are_validated() {
        let missing_file = multipart_request("/api/process", &[("requirements", None, "", &b"Preis"[..])]);
        let (status, json) = send(app(), missing_file).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);

        let not_pdf = multipart_request(
            "/api/process",
            &[("file", Some("notes.txt"), "text/plain", &b"hello"[..]), ("requirements", None, "", &b"Preis"[..])],
        );
        let (status, _) = send(app(), not_pdf).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let no_requirements = multipart_request("/api/process", &[("file", Some("a.pdf"), "application/pdf", &b"%PDF-1.4"[..])]);
        let (status, json) = send(app(), no_requirements).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["details"], "No requirements provided");
    }

    #[tokio::test]
    async fn oversized_and_unreadable_pdfs_are_rejected() {
        let small = build_router(state(10, None));
        let request = multipart_request("/api/toc", &[("file", Some("a.pdf"), "application/pdf", &[b'%'; 64][..])]);
        let (status, _) = send(small, request).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

        let request = multipart_request("/api/toc", &[("file", Some("a.pdf"), "application/pdf", &b"%PDF-1.4 kaputt"[..])]);
        let (status, json) = send(app(), request).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["success"], false);
    }
}
