//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: access logging, method checks and
//! dispatch to the upload, image and health handlers.

use crate::config::AppState;
use crate::handler::{images, upload};
use crate::http;
use crate::logger::{self, AccessLogEntry};
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::{Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

const UPLOAD_METHODS: &str = "POST, OPTIONS";
const IMAGE_METHODS: &str = "GET, HEAD, OPTIONS";

/// Request context encapsulating information needed for image requests
pub struct RequestContext {
    pub is_head: bool,
    pub if_none_match: Option<String>,
    pub range_header: Option<String>,
}

/// Main entry point for HTTP request handling
///
/// Generic over the body so the same routing serves hyper connections and
/// in-memory requests.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let mut entry = AccessLogEntry::new(peer_addr.ip().to_string(), method.to_string(), path.clone());
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = version_label(req.version()).to_string();
    entry.referer = header_string(req.headers(), &header::REFERER);
    entry.user_agent = header_string(req.headers(), &header::USER_AGENT);

    let mut response = route_request(req, &method, &path, &state, peer_addr).await;

    if let Ok(value) = HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().insert(header::SERVER, value);
    }

    if state.config.logging.access_log {
        entry.status = response.status().as_u16();
        entry.body_bytes = usize::try_from(response.body().size_hint().exact().unwrap_or(0))
            .unwrap_or(usize::MAX);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Route request based on path and method
async fn route_request<B>(
    req: Request<B>,
    method: &Method,
    path: &str,
    state: &Arc<AppState>,
    peer_addr: SocketAddr,
) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let cfg = &state.config;

    // 0. Health check endpoints (highest priority, always fast)
    if cfg.health.enabled && matches!(*method, Method::GET | Method::HEAD) {
        if path == cfg.health.liveness_path {
            return http::build_text_response(StatusCode::OK, "ok");
        }
        if path == cfg.health.readiness_path {
            return if state.store.is_ready().await {
                http::build_text_response(StatusCode::OK, "ok")
            } else {
                logger::log_warning("Readiness check failed: storage directory is missing");
                http::build_text_response(StatusCode::SERVICE_UNAVAILABLE, "storage unavailable")
            };
        }
    }

    // 1. Upload endpoint
    if path == cfg.upload.route {
        return match *method {
            Method::POST => upload::handle_upload(req, state, peer_addr).await,
            Method::OPTIONS => http::build_options_response(UPLOAD_METHODS, cfg.http.enable_cors),
            _ => {
                logger::log_warning(&format!("Method not allowed: {method} {path}"));
                http::build_405_response(UPLOAD_METHODS)
            }
        };
    }

    // 2. Stored images, read-only
    if let Some(name) = path
        .strip_prefix(cfg.upload.public_prefix.as_str())
        .and_then(|rest| rest.strip_prefix('/'))
    {
        return match *method {
            Method::GET | Method::HEAD => {
                let ctx = RequestContext {
                    is_head: *method == Method::HEAD,
                    if_none_match: header_string(req.headers(), &header::IF_NONE_MATCH),
                    range_header: header_string(req.headers(), &header::RANGE),
                };
                images::serve_image(&ctx, name, state).await
            }
            Method::OPTIONS => http::build_options_response(IMAGE_METHODS, cfg.http.enable_cors),
            _ => {
                logger::log_warning(&format!("Method not allowed: {method} {path}"));
                http::build_405_response(IMAGE_METHODS)
            }
        };
    }

    http::build_404_response()
}

fn header_string(headers: &HeaderMap, name: &header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

const fn version_label(version: hyper::Version) -> &'static str {
    match version {
        hyper::Version::HTTP_09 => "0.9",
        hyper::Version::HTTP_10 => "1.0",
        hyper::Version::HTTP_2 => "2",
        hyper::Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::test_support::{
        body_bytes, body_json, entry_count, multipart_request, peer, test_state,
    };
    use tempfile::TempDir;

    fn get(path: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    async fn dispatch(state: &Arc<AppState>, req: Request<Full<Bytes>>) -> Response<Full<Bytes>> {
        handle_request(req, Arc::clone(state), peer()).await.unwrap()
    }

    #[tokio::test]
    async fn test_upload_then_fetch_round_trip() {
        let temp = TempDir::new().unwrap();
        let state = test_state(temp.path()).await;
        let payload: Vec<u8> = (0..10 * 1024).map(|i| (i % 251) as u8).collect();

        let resp = dispatch(
            &state,
            multipart_request("image", "Cat.PNG", "image/png", &payload),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["message"], "File uploaded successfully!");
        assert_eq!(json["filename"], "Cat.PNG");

        let url = json["url"].as_str().expect("url");
        let prefix = "http://127.0.0.1:5000/images/";
        assert!(url.starts_with(prefix), "url: {url}");
        let stored = &url[prefix.len()..];
        let (ts, rest) = stored.split_once('-').expect("timestamp prefix");
        assert!(!ts.is_empty() && ts.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(rest, "cat.png");

        let fetched = dispatch(&state, get(&format!("/images/{stored}"))).await;
        assert_eq!(fetched.status(), StatusCode::OK);
        assert_eq!(
            fetched.headers().get(header::CONTENT_TYPE).unwrap(),
            "image/png"
        );
        assert_eq!(body_bytes(fetched).await, payload);
    }

    #[tokio::test]
    async fn test_concurrent_same_name_uploads_are_distinct() {
        let temp = TempDir::new().unwrap();
        let state = test_state(temp.path()).await;

        let (a, b) = tokio::join!(
            dispatch(&state, multipart_request("image", "same.gif", "image/gif", b"one")),
            dispatch(&state, multipart_request("image", "same.gif", "image/gif", b"two")),
        );
        let (a, b) = (body_json(a).await, body_json(b).await);
        let (url_a, url_b) = (a["url"].as_str().unwrap(), b["url"].as_str().unwrap());
        assert_ne!(url_a, url_b);
        assert_eq!(entry_count(temp.path()), 2);

        for (url, expected) in [(url_a, b"one"), (url_b, b"two")] {
            let path = &url["http://127.0.0.1:5000".len()..];
            let resp = dispatch(&state, get(path)).await;
            assert_eq!(body_bytes(resp).await, expected);
        }
    }

    #[tokio::test]
    async fn test_unknown_paths_and_methods() {
        let temp = TempDir::new().unwrap();
        let state = test_state(temp.path()).await;

        assert_eq!(dispatch(&state, get("/nothing")).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(dispatch(&state, get("/images/")).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            dispatch(&state, get("/images/..%2f..%2fetc%2fpasswd")).await.status(),
            StatusCode::NOT_FOUND
        );

        let resp = dispatch(&state, get("/upload")).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers().get(header::ALLOW).unwrap(), UPLOAD_METHODS);

        let delete = Request::builder()
            .method(Method::DELETE)
            .uri("/images/1-a.png")
            .body(Full::new(Bytes::new()))
            .unwrap();
        assert_eq!(
            dispatch(&state, delete).await.status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[tokio::test]
    async fn test_upload_preflight() {
        let temp = TempDir::new().unwrap();
        let state = test_state(temp.path()).await;
        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/upload")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let resp = dispatch(&state, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            resp.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
        assert_eq!(
            resp.headers().get("access-control-allow-methods").unwrap(),
            UPLOAD_METHODS
        );
    }

    #[tokio::test]
    async fn test_health_endpoints() {
        let temp = TempDir::new().unwrap();
        let state = test_state(&temp.path().join("images")).await;

        let resp = dispatch(&state, get("/healthz")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get(header::SERVER).unwrap(), "image-upload-server");

        assert_eq!(dispatch(&state, get("/readyz")).await.status(), StatusCode::OK);
        std::fs::remove_dir(temp.path().join("images")).unwrap();
        assert_eq!(
            dispatch(&state, get("/readyz")).await.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
