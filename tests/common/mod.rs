//! Shared fixtures: a recording transport and a local stand-in gateway.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1::Builder as ServerBuilder;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use outbound_gateway::transport::{HttpTransport, TransportRequest, TransportResponse};
use outbound_gateway::{HeaderList, ResponseBody, TransportError};
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;
use tokio::net::TcpListener;

/// Records every request and answers with a fixed status.
pub struct RecordingTransport {
    status: u16,
    seen: Mutex<Vec<TransportRequest>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::with_status(200)
    }

    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn last(&self) -> TransportRequest {
        self.requests().pop().expect("no request was sent")
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.seen.lock().unwrap().push(request);
        Ok(TransportResponse {
            status: self.status,
            headers: HeaderList::from([("content-type", "application/json")]),
            body: ResponseBody::Json(json!({"status": self.status})),
        })
    }
}

/// Always fails the way a refused connection would.
pub struct RefusingTransport;

#[async_trait]
impl HttpTransport for RefusingTransport {
    async fn send(&self, _request: TransportRequest) -> Result<TransportResponse, TransportError> {
        Err(TransportError::Connect("connection refused".to_string()))
    }
}

/// Starts a gateway stand-in on an ephemeral port.
///
/// Routes:
/// - `/status/500` answers 500 with a JSON error body
/// - `/slow` waits five seconds before answering
/// - `/binary` answers raw bytes
/// - `/text` answers a non-JSON body
/// - anything else echoes method, headers and body as JSON
pub async fn spawn_gateway() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let _ = ServerBuilder::new()
                    .serve_connection(TokioIo::new(stream), service_fn(handle))
                    .await;
            });
        }
    });

    addr
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

async fn handle(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path().to_string();

    let response = match path.as_str() {
        "/status/500" => Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from_static(br#"{"error":"upstream failed"}"#))),
        "/slow" => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Response::builder().body(Full::new(Bytes::from_static(b"late")))
        }
        "/binary" => Response::builder()
            .header("content-type", "application/octet-stream")
            .body(Full::new(Bytes::from_static(&[0x00, 0x9f, 0xff]))),
        "/text" => Response::builder()
            .header("content-type", "text/plain")
            .body(Full::new(Bytes::from_static(b"plain words"))),
        _ => {
            let method = req.method().to_string();
            let headers: serde_json::Map<String, serde_json::Value> = req
                .headers()
                .iter()
                .map(|(k, v)| {
                    (
                        k.as_str().to_string(),
                        json!(String::from_utf8_lossy(v.as_bytes())),
                    )
                })
                .collect();
            let body = req
                .into_body()
                .collect()
                .await
                .map(|c| c.to_bytes())
                .unwrap_or_default();
            let echo = json!({
                "method": method,
                "path": path,
                "headers": headers,
                "body": String::from_utf8_lossy(&body),
            });
            Response::builder()
                .header("content-type", "application/json")
                .header("x-gateway-by", "test-gateway")
                .body(Full::new(Bytes::from(echo.to_string())))
        }
    };

    Ok(response.unwrap())
}
