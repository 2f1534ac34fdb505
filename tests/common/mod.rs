#![allow(dead_code)]

use axum::{
    http::{header::LOCATION, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::net::{SocketAddr, TcpListener};

/// Serve `app` on an ephemeral loopback port.
pub fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    let server = axum::Server::from_tcp(listener)
        .expect("server from listener")
        .serve(app.into_make_service());
    tokio::spawn(server);
    addr
}

/// A closed port for transport-failure cases.
pub fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
    listener.local_addr().expect("local addr")
}

fn moved(to: &'static str) -> impl IntoResponse {
    (StatusCode::MOVED_PERMANENTLY, [(LOCATION, to)])
}

fn garbled() -> impl IntoResponse {
    let location = HeaderValue::from_bytes(b"/ph\xffsh").expect("obs-text header value");
    (StatusCode::FOUND, [(LOCATION, location)])
}

/// Fake phishing site:
/// - `/start` 301 to `/phish/` (relative), which answers 200
/// - `/loop/a` -> `/loop/b` -> `/loop/c`, and `/loop/c` redirects to itself
/// - `/bare` answers 302 with no Location
/// - `/garbled` answers 302 with a Location that is not valid UTF-8
pub fn phish_site() -> SocketAddr {
    let app = Router::new()
        .route("/start", get(|| async { moved("/phish/") }))
        .route("/phish/", get(|| async { "Please log in to your bank" }))
        .route("/loop/a", get(|| async { moved("/loop/b") }))
        .route("/loop/b", get(|| async { moved("/loop/c") }))
        .route("/loop/c", get(|| async { moved("/loop/c") }))
        .route("/bare", get(|| async { StatusCode::FOUND }))
        .route("/garbled", get(|| async { garbled() }));
    spawn(app)
}

/// Pinata stand-in that always pins successfully.
pub fn pinning_ok() -> SocketAddr {
    let app = Router::new().route(
        "/pinning/pinJSONToIPFS",
        post(|| async { Json(json!({"IpfsHash": "QmIntegration", "PinSize": 42})) }),
    );
    spawn(app)
}

/// Pinata stand-in that is down.
pub fn pinning_down() -> SocketAddr {
    let app = Router::new().route(
        "/pinning/pinJSONToIPFS",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded") }),
    );
    spawn(app)
}
