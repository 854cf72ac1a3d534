//! The `/` fallback chain (§4.3 item 3, §9 "`/` vs prefix mux"): the root
//! reverse-proxy route, if registered, gets first chance to answer; the
//! not-found page runs only when there is no root route at all. Callers may
//! suppress the whole chain with `X-Httpdx-Handle-Fallback: false` (§4.3,
//! used by layered deployments that want an outer instance to own it).

use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};

use crate::proxy;
use crate::state::{BoxBody, GatewayState};

const SUPPRESS_HEADER: &str = "X-Httpdx-Handle-Fallback";

pub async fn handle(state: &GatewayState, req: Request<Incoming>) -> Response<BoxBody> {
    if is_suppressed(&req) {
        return plain_status(StatusCode::NOT_FOUND);
    }

    if let Some(root) = &state.table.root_route {
        if !root.disabled {
            return proxy::forward(state, root, req, &root.path_header).await;
        }
    }

    if state.not_found_disabled {
        return plain_status(StatusCode::NOT_FOUND);
    }
    not_found_page(state)
}

fn is_suppressed(req: &Request<Incoming>) -> bool {
    req.headers()
        .get(SUPPRESS_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("false"))
        .unwrap_or(false)
}

fn not_found_page(state: &GatewayState) -> Response<BoxBody> {
    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header(hyper::header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(
            Full::new(Bytes::from(state.not_found_page.clone()))
                .map_err(|never: std::convert::Infallible| match never {})
                .boxed(),
        )
        .expect("static response is well-formed")
}

fn plain_status(status: StatusCode) -> Response<BoxBody> {
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
