//! Upstream proxy descriptors and their URL form.
//!
//! The gateway learns which upstream proxy to use from the `x-proxy-url`
//! header, so the descriptor a caller holds (either structured or as a JSON
//! string) has to be turned into a `scheme://[user:pass@]host:port` URL.
//! Building is best-effort: anything unusable yields `None` and the request
//! simply goes out without the header.

use log::debug;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

// RFC 3986 userinfo, plus '%' so literal percent signs survive a round trip
const USERINFO: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b':')
    .add(b';')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

#[derive(Error, Debug)]
pub enum ProxyDescriptorError {
    #[error("malformed proxy descriptor: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProxyPort {
    Number(u64),
    Text(String),
}

impl ProxyPort {
    /// A usable, non-zero TCP port.
    pub fn value(&self) -> Option<u16> {
        let port = match self {
            ProxyPort::Number(n) => u16::try_from(*n).ok()?,
            ProxyPort::Text(s) => s.trim().parse::<u16>().ok()?,
        };
        (port != 0).then_some(port)
    }
}

impl From<u16> for ProxyPort {
    fn from(port: u16) -> Self {
        ProxyPort::Number(port as u64)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyDescriptor {
    #[serde(rename = "type", default)]
    pub proxy_type: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<ProxyPort>,
    #[serde(default, deserialize_with = "deserialize_credential")]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "deserialize_credential")]
    pub password: Option<String>,
}

/// Accepts a credential written as a string, number or boolean. Any other
/// shape is treated as absent so it cannot invalidate the whole descriptor.
fn deserialize_credential<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

impl ProxyDescriptor {
    pub fn new(proxy_type: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            proxy_type: Some(proxy_type.into()),
            host: Some(host.into()),
            port: Some(port.into()),
            username: None,
            password: None,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Canonical proxy URL, or `None` when the descriptor is incomplete or
    /// names an unsupported scheme.
    pub fn to_url(&self) -> Option<String> {
        let proxy_type = non_empty(&self.proxy_type)?;
        let host = non_empty(&self.host)?;
        let port = self.port.as_ref()?.value()?;

        // Partial credentials are dropped rather than rejected
        let auth = match (non_empty(&self.username), non_empty(&self.password)) {
            (Some(user), Some(pass)) => format!(
                "{}:{}@",
                utf8_percent_encode(user, USERINFO),
                utf8_percent_encode(pass, USERINFO)
            ),
            _ => String::new(),
        };

        match proxy_type {
            "socks5" => Some(format!("socks5://{}{}:{}", auth, host, port)),
            "http" | "https" => Some(format!("{}://{}{}:{}", proxy_type, auth, host, port)),
            _ => None,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// A proxy descriptor as callers hand it over: either already structured or
/// still in its serialized JSON form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProxySource {
    Raw(String),
    Parsed(ProxyDescriptor),
}

impl ProxySource {
    pub fn parse(&self) -> Result<ProxyDescriptor, ProxyDescriptorError> {
        match self {
            ProxySource::Raw(raw) => Ok(serde_json::from_str(raw)?),
            ProxySource::Parsed(descriptor) => Ok(descriptor.clone()),
        }
    }
}

impl From<ProxyDescriptor> for ProxySource {
    fn from(descriptor: ProxyDescriptor) -> Self {
        ProxySource::Parsed(descriptor)
    }
}

impl From<String> for ProxySource {
    fn from(raw: String) -> Self {
        ProxySource::Raw(raw)
    }
}

impl From<&str> for ProxySource {
    fn from(raw: &str) -> Self {
        ProxySource::Raw(raw.to_string())
    }
}

/// Builds the `x-proxy-url` value for a descriptor. Parse failures are
/// logged at debug level and reported as `None`.
pub fn build_proxy_url(source: Option<&ProxySource>) -> Option<String> {
    let source = source?;
    match source.parse() {
        Ok(descriptor) => descriptor.to_url(),
        Err(e) => {
            debug!("Failed to build proxy url for gateway: {}", e);
            None
        }
    }
}

/// Hides the password of a proxy URL for log output.
pub fn mask_proxy_url(proxy_url: Option<&str>) -> String {
    static PASSWORD: OnceLock<Regex> = OnceLock::new();

    let Some(url) = proxy_url.filter(|u| !u.is_empty()) else {
        return "None".to_string();
    };
    let pattern = PASSWORD.get_or_init(|| Regex::new(r":([^:@/]+)@").expect("valid masking pattern"));
    pattern.replace(url, ":***@").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(source: impl Into<ProxySource>) -> Option<String> {
        build_proxy_url(Some(&source.into()))
    }

    #[test]
    fn test_absent_and_empty_descriptors() {
        assert_eq!(build_proxy_url(None), None);
        assert_eq!(build(ProxyDescriptor::default()), None);
        assert_eq!(build("{}"), None);
    }

    #[test]
    fn test_http_without_credentials() {
        assert_eq!(
            build(ProxyDescriptor::new("http", "h", 8080)),
            Some("http://h:8080".to_string())
        );
        assert_eq!(
            build(ProxyDescriptor::new("https", "proxy.corp", 443)),
            Some("https://proxy.corp:443".to_string())
        );
    }

    #[test]
    fn test_socks5_with_credentials() {
        let descriptor = ProxyDescriptor::new("socks5", "h", 1080).with_credentials("u", "p");
        assert_eq!(build(descriptor), Some("socks5://u:p@h:1080".to_string()));
    }

    #[test]
    fn test_partial_credentials_are_dropped() {
        let mut descriptor = ProxyDescriptor::new("http", "h", 8080);
        descriptor.username = Some("u".to_string());
        assert_eq!(build(descriptor.clone()), Some("http://h:8080".to_string()));

        descriptor.username = None;
        descriptor.password = Some("p".to_string());
        assert_eq!(build(descriptor), Some("http://h:8080".to_string()));
    }

    #[test]
    fn test_unsupported_type() {
        assert_eq!(build(ProxyDescriptor::new("ftp", "h", 21)), None);
        assert_eq!(build(ProxyDescriptor::new("SOCKS5", "h", 1080)), None);
    }

    #[test]
    fn test_missing_required_fields() {
        let mut descriptor = ProxyDescriptor::new("http", "h", 8080);
        descriptor.host = None;
        assert_eq!(build(descriptor), None);

        let mut descriptor = ProxyDescriptor::new("http", "h", 8080);
        descriptor.port = None;
        assert_eq!(build(descriptor), None);

        assert_eq!(build(ProxyDescriptor::new("http", "h", 0)), None);
        assert_eq!(build(ProxyDescriptor::new("", "h", 8080)), None);
    }

    #[test]
    fn test_raw_json_matches_structured_form() {
        let raw = r#"{"type":"socks5","host":"10.0.0.2","port":1080,"username":"u","password":"p"}"#;
        assert_eq!(build(raw), Some("socks5://u:p@10.0.0.2:1080".to_string()));

        let string_port = r#"{"type":"http","host":"h","port":"3128"}"#;
        assert_eq!(build(string_port), Some("http://h:3128".to_string()));
    }

    #[test]
    fn test_numeric_credentials_are_stringified() {
        let numeric_password = r#"{"type":"http","host":"h","port":8080,"username":"u","password":12345}"#;
        assert_eq!(build(numeric_password), Some("http://u:12345@h:8080".to_string()));

        let numeric_username = r#"{"type":"socks5","host":"h","port":1080,"username":42,"password":"p"}"#;
        assert_eq!(build(numeric_username), Some("socks5://42:p@h:1080".to_string()));
    }

    #[test]
    fn test_unusable_credentials_only_drop_the_credentials() {
        let object_password = r#"{"type":"http","host":"h","port":8080,"username":"u","password":{"k":1}}"#;
        assert_eq!(build(object_password), Some("http://h:8080".to_string()));

        let null_username = r#"{"type":"http","host":"h","port":8080,"username":null,"password":"p"}"#;
        assert_eq!(build(null_username), Some("http://h:8080".to_string()));
    }

    #[test]
    fn test_unparseable_raw_is_none() {
        assert_eq!(build("not json"), None);
        assert_eq!(build("null"), None);
        assert_eq!(build("[1,2]"), None);
        assert_eq!(build(r#"{"type":"http","host":"h","port":true}"#), None);
    }

    #[test]
    fn test_reserved_characters_in_credentials_are_encoded() {
        let descriptor = ProxyDescriptor::new("http", "h", 8080).with_credentials("me@corp", "p:ss/w%rd");
        assert_eq!(
            build(descriptor),
            Some("http://me%40corp:p%3Ass%2Fw%25rd@h:8080".to_string())
        );
    }

    #[test]
    fn test_mask_proxy_url() {
        assert_eq!(mask_proxy_url(Some("http://u:secret@h:1")), "http://u:***@h:1");
        assert_eq!(mask_proxy_url(Some("socks5://h:1080")), "socks5://h:1080");
        assert_eq!(mask_proxy_url(Some("")), "None");
        assert_eq!(mask_proxy_url(None), "None");
    }

    #[test]
    fn test_proxy_source_deserializes_both_shapes() {
        let raw: ProxySource = serde_json::from_str(r#""{\"type\":\"http\"}""#).unwrap();
        assert!(matches!(raw, ProxySource::Raw(_)));

        let parsed: ProxySource = serde_json::from_str(r#"{"type":"http","host":"h","port":1}"#).unwrap();
        assert_eq!(parsed, ProxySource::Parsed(ProxyDescriptor::new("http", "h", 1)));
    }
}
