//! Gateway forwarding.
//!
//! When the outbound gateway is enabled, [`Forwarder::forward`] sends the
//! caller's request to the gateway endpoint instead of the real destination.
//! The destination travels in `x-target-url`, the upstream proxy (if any) in
//! `x-proxy-url`. Method and body pass through untouched.
//!
//! A disabled gateway is reported as `Ok(None)`: the caller should take its
//! normal direct path. Errors mean the gateway call was attempted (or the
//! request was unusable) and the caller decides whether to fall back.

use crate::config::{Config, GatewaySettings};
use crate::error::GatewayError;
use crate::headers::{self, HeaderList, X_PROXY_URL, X_TARGET_URL};
use crate::proxy_url::{build_proxy_url, mask_proxy_url, ProxySource};
use crate::transport::{HttpTransport, HyperTransport, ResponseBody, ResponseType, TransportRequest};
use bytes::Bytes;
use log::debug;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_METHOD: &str = "POST";

#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub target_url: Option<String>,
    pub method: String,
    pub headers: HeaderList,
    pub body: Option<Bytes>,
    pub response_type: ResponseType,
    /// Per-request timeout in milliseconds; `Some(0)` disables the deadline.
    pub timeout_ms: Option<u64>,
    pub cancellation: Option<CancellationToken>,
    pub proxy: Option<ProxySource>,
}

impl Default for ForwardRequest {
    fn default() -> Self {
        Self {
            target_url: None,
            method: DEFAULT_METHOD.to_string(),
            headers: HeaderList::new(),
            body: None,
            response_type: ResponseType::default(),
            timeout_ms: None,
            cancellation: None,
            proxy: None,
        }
    }
}

impl ForwardRequest {
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            target_url: Some(target_url.into()),
            ..Default::default()
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_headers(mut self, headers: HeaderList) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<ProxySource>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ForwardResult {
    pub status: u16,
    pub headers: HeaderList,
    pub body: ResponseBody,
    pub proxy_url_used: Option<String>,
}

impl ForwardResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub struct Forwarder<T = HyperTransport> {
    settings: GatewaySettings,
    transport: T,
}

impl Forwarder<HyperTransport> {
    /// Resolves `config` once and pairs it with the hyper transport.
    pub fn from_config(config: &Config) -> Result<Self, GatewayError> {
        let settings = GatewaySettings::from_config(config)?;
        Ok(Self::new(settings, HyperTransport::new()))
    }
}

impl<T: HttpTransport> Forwarder<T> {
    pub fn new(settings: GatewaySettings, transport: T) -> Self {
        Self { settings, transport }
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends `request` through the gateway.
    ///
    /// Returns `Ok(None)` without touching the network when the gateway is
    /// disabled. Any HTTP status from the gateway is a successful result;
    /// only transport failures are errors.
    pub async fn forward(&self, request: ForwardRequest) -> Result<Option<ForwardResult>, GatewayError> {
        if !self.is_enabled() {
            return Ok(None);
        }

        let (outbound, proxy_url) = self.compose(request)?;
        debug!(
            "Forwarding {} {} via gateway {} (proxy: {})",
            outbound.method,
            outbound.headers.get(X_TARGET_URL).unwrap_or_default(),
            outbound.url,
            mask_proxy_url(proxy_url.as_deref())
        );

        let response = self.transport.send(outbound).await?;
        debug!("Gateway answered with status {}", response.status);

        Ok(Some(ForwardResult {
            status: response.status,
            headers: response.headers,
            body: response.body,
            proxy_url_used: proxy_url,
        }))
    }

    /// Builds the gateway-bound request and the proxy URL it carries.
    pub fn compose(&self, request: ForwardRequest) -> Result<(TransportRequest, Option<String>), GatewayError> {
        let target_url = request
            .target_url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                GatewayError::InvalidArgument("targetUrl is required for gateway forwarding".to_string())
            })?;

        let mut outbound_headers = headers::sanitize(Some(&request.headers));
        // The real destination always wins over anything the caller sent
        outbound_headers.insert(X_TARGET_URL, target_url);

        // Only a synthesized proxy header ever reaches the gateway
        outbound_headers.remove(X_PROXY_URL);
        let proxy_url = build_proxy_url(request.proxy.as_ref());
        if self.settings.forward_proxy_header {
            if let Some(url) = &proxy_url {
                outbound_headers.insert(X_PROXY_URL, url.clone());
            }
        }

        let outbound = TransportRequest {
            method: request.method,
            url: self.settings.url.clone(),
            headers: outbound_headers,
            body: request.body,
            response_type: request.response_type,
            timeout: self.resolve_timeout(request.timeout_ms),
            cancellation: request.cancellation,
        };

        Ok((outbound, proxy_url))
    }

    fn resolve_timeout(&self, timeout_ms: Option<u64>) -> Option<Duration> {
        match timeout_ms {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => Some(self.settings.default_timeout),
        }
    }
}
