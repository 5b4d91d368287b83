//! The HTTP capability the forwarder talks through.
//!
//! [`HttpTransport`] is the seam: the forwarder only needs "send this
//! request, give me status, headers and body". Implementations must treat
//! every HTTP status as a response, never as an error, and must not cap the
//! response body size. Deadline and cancellation are carried on the request
//! and enforced by the transport.

use crate::error::TransportError;
use crate::headers::HeaderList;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use hyper::{Method, Request, Uri};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use log::trace;
use serde::{Deserialize, Serialize};
use std::error::Error as _;
use std::str::FromStr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How the response body should be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    #[default]
    Json,
    Text,
    Binary,
}

impl FromStr for ResponseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ResponseType::Json),
            "text" => Ok(ResponseType::Text),
            "binary" | "arraybuffer" => Ok(ResponseType::Binary),
            _ => Err(format!("Invalid response type: {}. Must be one of: json, text, binary", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(serde_json::Value),
    Text(String),
    Binary(Bytes),
}

impl ResponseBody {
    /// Decodes `bytes` as requested. A `Json` body that does not parse is
    /// returned as text instead of failing the call.
    pub fn decode(response_type: ResponseType, bytes: Bytes) -> Self {
        match response_type {
            ResponseType::Json => match serde_json::from_slice(&bytes) {
                Ok(value) => ResponseBody::Json(value),
                Err(_) => ResponseBody::Text(String::from_utf8_lossy(&bytes).into_owned()),
            },
            ResponseType::Text => ResponseBody::Text(String::from_utf8_lossy(&bytes).into_owned()),
            ResponseType::Binary => ResponseBody::Binary(bytes),
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&Bytes> {
        match self {
            ResponseBody::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: String,
    pub url: String,
    pub headers: HeaderList,
    pub body: Option<Bytes>,
    pub response_type: ResponseType,
    /// `None` means no deadline.
    pub timeout: Option<Duration>,
    pub cancellation: Option<CancellationToken>,
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderList,
    pub body: ResponseBody,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// hyper-based transport. Idle connections are not kept between calls.
pub struct HyperTransport {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl HyperTransport {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(HttpsConnector::new());

        Self { client }
    }

    async fn exchange(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let TransportRequest {
            method,
            url,
            headers,
            body,
            response_type,
            ..
        } = request;

        let method = Method::from_bytes(method.as_bytes())
            .map_err(|e| TransportError::InvalidRequest(format!("invalid method '{}': {}", method, e)))?;
        let uri: Uri = url
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| {
                TransportError::InvalidRequest(format!("invalid URL '{}': {}", url, e))
            })?;

        // hyper writes HTTP/1 header names lowercased; the caller's casing is
        // kept only in the HeaderList
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers.iter() {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::InvalidRequest(format!("invalid header name '{}': {}", name, e)))?;
            let header_value = HeaderValue::from_bytes(value.as_bytes())
                .map_err(|e| TransportError::InvalidRequest(format!("invalid value for header '{}': {}", name, e)))?;
            builder = builder.header(header_name, header_value);
        }

        let req = builder
            .body(Full::new(body.unwrap_or_default()))
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        trace!("Sending {} {}", req.method(), req.uri());
        let response = self.client.request(req).await.map_err(classify_client_error)?;

        let (parts, incoming) = response.into_parts();
        let bytes = incoming
            .collect()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?
            .to_bytes();

        Ok(TransportResponse {
            status: parts.status.as_u16(),
            headers: header_list_from_map(&parts.headers),
            body: ResponseBody::decode(response_type, bytes),
        })
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for HyperTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let timeout = request.timeout;
        let cancellation = request.cancellation.clone();
        let exchange = self.exchange(request);

        let bounded = async move {
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, exchange).await {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Timeout(limit)),
                },
                None => exchange.await,
            }
        };

        match cancellation {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(TransportError::Cancelled),
                    result = bounded => result,
                }
            }
            None => bounded.await,
        }
    }
}

/// Folds a hyper header map into a [`HeaderList`], joining repeated headers.
pub fn header_list_from_map(map: &HeaderMap) -> HeaderList {
    let mut headers = HeaderList::new();
    for (name, value) in map.iter() {
        let value = match value.to_str() {
            Ok(v) => v.to_string(),
            Err(_) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
        };
        headers.append(name.as_str(), value);
    }
    headers
}

fn classify_client_error(error: hyper_util::client::legacy::Error) -> TransportError {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    if error.is_connect() {
        TransportError::Connect(message)
    } else {
        TransportError::Http(message)
    }
}
