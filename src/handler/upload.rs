//! Upload endpoint
//!
//! Accepts one file from a multipart form, hands it to the image store and
//! answers with the public URL of the stored copy.

use crate::config::AppState;
use crate::error::{LimitScope, UploadError};
use crate::http;
use crate::logger;
use crate::storage::StoredFile;
use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::header;
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use std::net::SocketAddr;

#[derive(Debug, Serialize)]
struct UploadResponse<'a> {
    message: &'static str,
    url: String,
    filename: &'a str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

/// File part pulled out of the form, not yet on disk
struct ReceivedFile {
    original_name: String,
    content_type: String,
    data: Vec<u8>,
}

/// POST handler: 200 with the image URL, or 400 with a message
pub async fn handle_upload<B>(
    req: Request<B>,
    state: &AppState,
    peer_addr: SocketAddr,
) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let cors = state.config.http.enable_cors;

    let result = async {
        let file = receive_file(req, state).await?;
        state
            .store
            .store(&file.original_name, &file.content_type, &file.data)
            .await
    }
    .await;

    match result {
        Ok(stored) => {
            logger::log_upload_stored(&stored);
            success_response(&stored, state, cors)
        }
        Err(err) => {
            logger::log_upload_rejected(&peer_addr, &err);
            http::build_json_response(
                StatusCode::BAD_REQUEST,
                &ErrorResponse {
                    message: err.to_string(),
                },
                cors,
            )
        }
    }
}

fn success_response(stored: &StoredFile, state: &AppState, cors: bool) -> Response<Full<Bytes>> {
    http::build_json_response(
        StatusCode::OK,
        &UploadResponse {
            message: "File uploaded successfully!",
            url: state.image_url(&stored.stored_name),
            filename: &stored.original_name,
        },
        cors,
    )
}

/// Parse the multipart body and buffer the single expected file
///
/// The type check runs on the part headers, before any content is read.
/// The file ceiling is enforced while reading the file part, and the body
/// ceiling over the whole stream whether or not `Content-Length` is sent.
async fn receive_file<B>(req: Request<B>, state: &AppState) -> Result<ReceivedFile, UploadError>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
{
    let max_body_size = state.config.http.max_body_size;
    let declared_length = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared_length.is_some_and(|len| len > max_body_size) {
        return Err(UploadError::SizeLimit {
            limit: max_body_size,
            scope: LimitScope::Body,
        });
    }

    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| UploadError::MalformedRequest("missing Content-Type header".to_string()))?;
    let boundary = multer::parse_boundary(content_type).map_err(|_| {
        UploadError::MalformedRequest("expected multipart/form-data with a boundary".to_string())
    })?;

    let field_name = state.config.upload.field_name.as_str();
    let limit = state.store.max_file_size();
    let constraints = multer::Constraints::new()
        .size_limit(multer::SizeLimit::new().whole_stream(max_body_size));
    let mut multipart = multer::Multipart::with_constraints(
        req.into_body().into_data_stream(),
        boundary,
        constraints,
    );
    let mut received: Option<ReceivedFile> = None;

    while let Some(mut field) = multipart.next_field().await? {
        // Plain form fields and empty file inputs carry no upload
        let original_name = field
            .file_name()
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        let Some(original_name) = original_name else {
            while field.chunk().await?.is_some() {}
            continue;
        };

        let name = field.name().unwrap_or_default().to_string();
        if name != field_name || received.is_some() {
            return Err(UploadError::UnexpectedField(name));
        }

        let content_type = field
            .content_type()
            .map(ToString::to_string)
            .unwrap_or_default();
        state.store.check_type(&original_name, &content_type)?;

        let mut data = Vec::new();
        while let Some(chunk) = field.chunk().await? {
            if (data.len() + chunk.len()) as u64 > limit {
                return Err(UploadError::SizeLimit {
                    limit,
                    scope: LimitScope::File,
                });
            }
            data.extend_from_slice(&chunk);
        }

        received = Some(ReceivedFile {
            original_name,
            content_type,
            data,
        });
    }

    received.ok_or(UploadError::MissingFile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::test_support::{
        body_json, entry_count, multipart_body, multipart_request, peer, raw_multipart_request,
        test_state, BOUNDARY,
    };
    use hyper::HeaderMap;
    use tempfile::TempDir;

    async fn upload(
        state: &AppState,
        req: Request<Full<Bytes>>,
    ) -> (StatusCode, HeaderMap, serde_json::Value) {
        let resp = handle_upload(req, state, peer()).await;
        let status = resp.status();
        let headers = resp.headers().clone();
        (status, headers, body_json(resp).await)
    }

    #[tokio::test]
    async fn test_valid_upload_creates_one_file() {
        let temp = TempDir::new().unwrap();
        let state = test_state(temp.path()).await;

        let (status, headers, json) =
            upload(&state, multipart_request("image", "Cat.PNG", "image/png", &[7u8; 10 * 1024])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["filename"], "Cat.PNG");
        assert!(json["url"].as_str().unwrap().ends_with("-cat.png"));
        assert_eq!(
            headers.get("access-control-allow-origin").unwrap(),
            "*"
        );

        let names: Vec<String> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert_eq!(names[0], names[0].to_lowercase());
        assert_eq!(
            std::fs::metadata(temp.path().join(&names[0])).unwrap().len(),
            10 * 1024
        );
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected() {
        let temp = TempDir::new().unwrap();
        let state = test_state(temp.path()).await;

        let big = vec![0u8; 3 * 1024 * 1024];
        let (status, headers, json) =
            upload(&state, multipart_request("image", "big.jpg", "image/jpeg", &big)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["message"].as_str().unwrap().contains("too large"));
        assert_eq!(
            headers.get("access-control-allow-origin").unwrap(),
            "*"
        );
        assert_eq!(entry_count(temp.path()), 0);
    }

    #[tokio::test]
    async fn test_body_over_request_limit_is_rejected_early() {
        let temp = TempDir::new().unwrap();
        let state = test_state(temp.path()).await;

        let huge = vec![0u8; 11 * 1024 * 1024];
        let (status, _, json) =
            upload(&state, multipart_request("image", "huge.png", "image/png", &huge)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Request body too large: limit is 10485760 bytes");
        assert_eq!(entry_count(temp.path()), 0);
    }

    #[tokio::test]
    async fn test_body_limit_applies_without_content_length() {
        let temp = TempDir::new().unwrap();
        let state = test_state(temp.path()).await;

        // an oversized text field ahead of a tiny, otherwise valid file
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"pad\"\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(&vec![b'x'; 11 * 1024 * 1024]);
        body.extend_from_slice(
            format!(
                "\r\n--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"a.png\"\r\nContent-Type: image/png\r\n\r\nx\r\n--{BOUNDARY}--\r\n"
            )
            .as_bytes(),
        );
        let req = Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Full::new(Bytes::from(body)))
            .unwrap();

        let (status, _, json) = upload(&state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Request body too large: limit is 10485760 bytes");
        assert_eq!(entry_count(temp.path()), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported() {
        let temp = TempDir::new().unwrap();
        let images = temp.path().join("images");
        let state = test_state(&images).await;
        std::fs::remove_dir(&images).unwrap();

        let (status, headers, json) =
            upload(&state, multipart_request("image", "cat.png", "image/png", b"data")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["message"]
            .as_str()
            .unwrap()
            .starts_with("Failed to store file"));
        assert_eq!(
            headers.get("access-control-allow-origin").unwrap(),
            "*"
        );
        assert!(!images.exists());
        assert_eq!(entry_count(temp.path()), 0);
    }

    #[tokio::test]
    async fn test_wrong_type_is_rejected() {
        let temp = TempDir::new().unwrap();
        let state = test_state(temp.path()).await;

        for (name, content_type) in [
            ("notes.txt", "text/plain"),
            ("cat.png", "text/plain"),
            ("notjpegreal.txt", "image/jpeg"),
            ("script.svg", "image/svg+xml"),
        ] {
            let (status, _, json) =
                upload(&state, multipart_request("image", name, content_type, b"data")).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{name}");
            assert_eq!(json["message"], "Error: Images Only!");
        }
        assert_eq!(entry_count(temp.path()), 0);
    }

    #[tokio::test]
    async fn test_missing_file_field() {
        let temp = TempDir::new().unwrap();
        let state = test_state(temp.path()).await;

        let body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"\r\n\r\njust text\r\n--{BOUNDARY}--\r\n"
        );
        let (status, _, json) = upload(&state, raw_multipart_request(body.into_bytes())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["message"].as_str().unwrap().starts_with("No file uploaded"));
        assert_eq!(entry_count(temp.path()), 0);
    }

    #[tokio::test]
    async fn test_file_in_other_field_is_rejected() {
        let temp = TempDir::new().unwrap();
        let state = test_state(temp.path()).await;

        let (status, _, json) =
            upload(&state, multipart_request("avatar", "cat.png", "image/png", b"data")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Unexpected field: avatar");
        assert_eq!(entry_count(temp.path()), 0);
    }

    #[tokio::test]
    async fn test_second_file_is_rejected() {
        let temp = TempDir::new().unwrap();
        let state = test_state(temp.path()).await;

        let mut body = multipart_body("image", "a.png", "image/png", b"one");
        // drop the closing delimiter and append a second file part
        body.truncate(body.len() - format!("--{BOUNDARY}--\r\n").len());
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"b.png\"\r\nContent-Type: image/png\r\n\r\ntwo\r\n--{BOUNDARY}--\r\n"
            )
            .as_bytes(),
        );

        let (status, _, json) = upload(&state, raw_multipart_request(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Unexpected field: image");
        assert_eq!(entry_count(temp.path()), 0);
    }

    #[tokio::test]
    async fn test_non_multipart_request_is_rejected() {
        let temp = TempDir::new().unwrap();
        let state = test_state(temp.path()).await;

        let req = Request::builder()
            .method("POST")
            .uri("/upload")
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from_static(b"{}")))
            .unwrap();
        let (status, _, json) = upload(&state, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["message"]
            .as_str()
            .unwrap()
            .starts_with("Malformed upload request"));
    }

    #[tokio::test]
    async fn test_traversal_name_is_contained() {
        let temp = TempDir::new().unwrap();
        let images = temp.path().join("images");
        let state = test_state(&images).await;

        let (status, _, json) = upload(
            &state,
            multipart_request("image", "../../Evil Name.PNG", "image/png", b"data"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["filename"], "../../Evil Name.PNG");
        assert!(json["url"].as_str().unwrap().ends_with("-evil_name.png"));
        assert_eq!(entry_count(&images), 1);
        assert_eq!(entry_count(temp.path()), 1);
    }
}
