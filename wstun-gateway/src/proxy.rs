//! Reverse-proxy route (§4.5): a single-host HTTP reverse proxy with
//! optional `dir_mode` prefix stripping and `X-Forwarded-Prefix`-style
//! header injection.

use hyper::body::Incoming;
use hyper::header::HeaderValue;
use hyper::{Request, Response, StatusCode, Uri};
use tracing::warn;

use crate::error::ProxyError;
use crate::routes::HttpRoute;
use crate::state::{boxed, BoxBody, GatewayState};

/// Result of rewriting a `dir_mode` request path (§4.5), split out as a
/// pure function so it can be unit-tested without standing up an HTTP
/// server (§13).
#[derive(Debug, PartialEq, Eq)]
pub struct DirRewrite {
    pub path: String,
    pub forwarded_prefix_header: String,
}

/// `canonical_prefix` always ends in `/` per `HttpRoute::canonical_prefix`.
/// `existing_header` is whatever the caller already sent in the path
/// header, if anything.
pub fn rewrite_dir_path(
    request_path: &str,
    canonical_prefix: &str,
    existing_header: Option<&str>,
) -> DirRewrite {
    let bare_prefix = canonical_prefix.trim_end_matches('/');
    let path = if request_path == bare_prefix {
        "/".to_string()
    } else {
        let stripped = request_path.strip_prefix(bare_prefix).unwrap_or(request_path);
        if stripped.is_empty() {
            "/".to_string()
        } else {
            stripped.to_string()
        }
    };
    let forwarded_prefix_header = match existing_header {
        Some(s) if !s.is_empty() => path_join(&path_clean(s), bare_prefix),
        _ => bare_prefix.to_string(),
    };
    DirRewrite {
        path,
        forwarded_prefix_header,
    }
}

/// A minimal analogue of Go's `path.Clean`: collapses `//`, drops `.`
/// segments, resolves `..` against what came before, and always returns an
/// absolute (`/`-prefixed) path.
fn path_clean(p: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for seg in p.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            s => out.push(s),
        }
    }
    format!("/{}", out.join("/"))
}

/// Go's `path.Join(a, b)`: concatenate then clean.
fn path_join(a: &str, b: &str) -> String {
    if a.is_empty() {
        return path_clean(b);
    }
    if b.is_empty() {
        return path_clean(a);
    }
    path_clean(&format!("{a}/{b}"))
}

/// Forwards one request to `route.upstream_addr`, applying the `dir_mode`
/// rewrite when configured (§4.5). Errors become `502 Bad Gateway` except
/// upstream EOF, which is squelched (§7).
pub async fn forward(
    state: &GatewayState,
    route: &HttpRoute,
    mut req: Request<Incoming>,
    path_header_name: &str,
) -> Response<BoxBody> {
    if route.dir_mode {
        let canonical = route.canonical_prefix();
        let existing = req
            .headers()
            .get(path_header_name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let rewrite = rewrite_dir_path(req.uri().path(), &canonical, existing.as_deref());

        let query = req.uri().query().map(|q| format!("?{q}")).unwrap_or_default();
        match build_uri(&route.upstream_addr, &rewrite.path, &query) {
            Ok(uri) => *req.uri_mut() = uri,
            Err(e) => return proxy_error_response(e),
        }
        if let Ok(value) = HeaderValue::from_str(&rewrite.forwarded_prefix_header) {
            req.headers_mut().insert(path_header_name, value);
        }
    } else {
        let path_and_query = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        match build_uri(&route.upstream_addr, "", &path_and_query) {
            Ok(uri) => *req.uri_mut() = uri,
            Err(e) => return proxy_error_response(e),
        }
    }
    req.headers_mut().remove(hyper::header::HOST);

    match state.upstream_client.request(req).await {
        Ok(resp) => resp.map(boxed),
        Err(e) => proxy_error_response(ProxyError::Upstream(e)),
    }
}

fn build_uri(upstream_addr: &str, path: &str, path_and_query_suffix: &str) -> Result<Uri, ProxyError> {
    let raw = if path.is_empty() {
        format!("http://{upstream_addr}{path_and_query_suffix}")
    } else {
        format!("http://{upstream_addr}{path}{path_and_query_suffix}")
    };
    raw.parse::<Uri>().map_err(ProxyError::from)
}

fn proxy_error_response(err: ProxyError) -> Response<BoxBody> {
    // EOF is squelched (§4.5/§7): no warning, but the caller still gets a
    // response since forwarding always fails before any bytes reach the
    // downstream client.
    if !err.is_eof() {
        warn!(error = %err, "reverse proxy upstream error");
    }
    empty_response(StatusCode::BAD_GATEWAY)
}

fn empty_response(status: StatusCode) -> Response<BoxBody> {
    use http_body_util::{BodyExt, Empty};
    Response::builder()
        .status(status)
        .body(
            Empty::new()
                .map_err(|never: std::convert::Infallible| match never {})
                .boxed(),
        )
        .expect("static response is well-formed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_prefix_request_rewrites_to_root() {
        let rewrite = rewrite_dir_path("/api", "/api/", None);
        assert_eq!(rewrite.path, "/");
        assert_eq!(rewrite.forwarded_prefix_header, "/api");
    }

    #[test]
    fn nested_path_strips_the_prefix() {
        let rewrite = rewrite_dir_path("/api/x", "/api/", None);
        assert_eq!(rewrite.path, "/x");
        assert_eq!(rewrite.forwarded_prefix_header, "/api");
    }

    #[test]
    fn existing_header_is_joined_before_the_route_prefix() {
        let rewrite = rewrite_dir_path("/api/x", "/api/", Some("/outer"));
        assert_eq!(rewrite.forwarded_prefix_header, "/outer/api");
    }

    #[test]
    fn existing_header_is_cleaned_before_joining() {
        let rewrite = rewrite_dir_path("/api/x", "/api/", Some("/outer//./"));
        assert_eq!(rewrite.forwarded_prefix_header, "/outer/api");
    }

    #[test]
    fn empty_existing_header_behaves_like_no_header() {
        let rewrite = rewrite_dir_path("/api/x", "/api/", Some(""));
        assert_eq!(rewrite.forwarded_prefix_header, "/api");
    }
}
