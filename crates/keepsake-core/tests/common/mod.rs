//! Local HTTP server shared by the integration tests.

#![allow(dead_code)]

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;

/// A 35-byte HTML document
pub const HTML_DOC: &[u8] = b"<!DOCTYPE html><html>hello!!</html>";

pub const HTML_ETAG: &str = "\"doc-v1\"";
pub const HTML_LAST_MODIFIED: &str = "Wed, 21 Oct 2015 07:28:00 GMT";

pub const PDF_DOC: &[u8] = b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n1 0 obj\n<<>>\nendobj\n";

/// How long `/slow` waits before answering
pub const SLOW_DELAY: Duration = Duration::from_secs(3);

/// Start the test server and return its base URL (`http://127.0.0.1:port`)
pub async fn spawn_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app()).await.unwrap();
    });
    format!("http://{}", addr)
}

fn app() -> Router {
    Router::new()
        .route("/html", get(html))
        .route("/pdf", get(pdf))
        .route("/bytes/{n}", get(bytes))
        .route("/stream/{n}", get(stream))
        .route("/redirect/{n}", get(redirect))
        .route("/redirect-ftp", get(redirect_ftp))
        .route("/status/{code}", get(status))
        .route("/slow", get(slow))
}

async fn html() -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::ETAG, HTML_ETAG),
            (header::LAST_MODIFIED, HTML_LAST_MODIFIED),
        ],
        HTML_DOC.to_vec(),
    )
        .into_response()
}

/// PDF served as `application/octet-stream`, so only sniffing can type it
async fn pdf() -> Response {
    PDF_DOC.to_vec().into_response()
}

/// `n` bytes with a Content-Length header
async fn bytes(Path(n): Path<usize>) -> Response {
    ([(header::CONTENT_TYPE, "text/plain")], vec![b'a'; n]).into_response()
}

/// `n` bytes streamed in chunks, without a Content-Length header
async fn stream(Path(n): Path<usize>) -> Response {
    let chunks: Vec<Result<Bytes, std::io::Error>> = vec![b'a'; n]
        .chunks(1000)
        .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
        .collect();
    Body::from_stream(futures_util::stream::iter(chunks)).into_response()
}

/// Redirect chain of length `n` ending in a plain text body
async fn redirect(Path(n): Path<u32>) -> Response {
    if n == 0 {
        "landed".into_response()
    } else {
        Redirect::temporary(&format!("/redirect/{}", n - 1)).into_response()
    }
}

async fn redirect_ftp() -> Response {
    Redirect::temporary("ftp://files.example.com/archive.tar").into_response()
}

async fn status(Path(code): Path<u16>) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, format!("status {} body", code)).into_response()
}

async fn slow() -> Response {
    tokio::time::sleep(SLOW_DELAY).await;
    "finally".into_response()
}
