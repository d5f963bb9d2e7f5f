//! Read-only image serving
//!
//! Answers `GET`/`HEAD` under the public prefix straight from the storage
//! directory, with `ETag` revalidation and single-range support.

use crate::config::AppState;
use crate::handler::router::RequestContext;
use crate::http::{self, cache, RangeOutcome};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;

/// Serve one stored image by name, or 404
pub async fn serve_image(
    ctx: &RequestContext,
    name: &str,
    state: &AppState,
) -> Response<Full<Bytes>> {
    let Some((content, content_type)) = state.store.load(name).await else {
        return http::build_404_response();
    };

    let etag = cache::generate_etag(&content);
    if cache::is_not_modified(ctx.if_none_match.as_deref(), &etag) {
        return http::build_304_response(&etag);
    }

    let data = Bytes::from(content);
    match http::resolve_range(ctx.range_header.as_deref(), data.len()) {
        RangeOutcome::Full => http::build_image_response(data, content_type, &etag, ctx.is_head),
        RangeOutcome::Partial(range) => {
            http::build_partial_response(&data, range, content_type, &etag, ctx.is_head)
        }
        RangeOutcome::Unsatisfiable => http::build_416_response(data.len()),
    }
}
