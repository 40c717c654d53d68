use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const MAX_TIMEOUT_MS: u64 = 300_000;
pub const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;
pub const MAX_HEADER_VALUE_LENGTH: usize = 4096;
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    #[must_use]
    pub const fn is_idempotent(self) -> bool {
        matches!(self, Self::Get | Self::Put | Self::Delete)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpHeader {
    pub name: String,
    pub value: String,
}

impl HttpHeader {
    /// Header names are normalized to lowercase so shells can match them
    /// without case gymnastics.
    pub fn new(name: &str, value: &str) -> Result<Self, HttpError> {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: "header name must be a non-empty ASCII token".into(),
            });
        }
        if value.len() > MAX_HEADER_VALUE_LENGTH {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: format!("header value exceeds {MAX_HEADER_VALUE_LENGTH} bytes"),
            });
        }
        if value.chars().any(|c| c == '\r' || c == '\n' || c == '\0') {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: "header value contains forbidden control characters".into(),
            });
        }
        Ok(Self {
            name: name.to_ascii_lowercase(),
            value: value.to_string(),
        })
    }
}

/// The operation the shell executes. One request, one response; the shell
/// resolves with `Ok` for any HTTP response it received, reserving `Err`
/// for transport-level failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<HttpHeader>,
    #[serde(with = "serde_bytes")]
    pub body: Option<Vec<u8>>,
    pub timeout_ms: u64,
}

impl HttpRequest {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.value.as_str())
    }
}

impl Operation for HttpRequest {
    type Output = HttpResult;
}

/// Context-free request assembly, shared by the capability and the API
/// layer. Validation failures are deferred: the first error is carried
/// until `finish`, so call sites never panic mid-chain.
#[derive(Debug)]
pub struct HttpRequestBuilder {
    method: HttpMethod,
    url: String,
    headers: Vec<HttpHeader>,
    body: Option<Vec<u8>>,
    timeout_ms: u64,
    error: Option<HttpError>,
}

impl HttpRequestBuilder {
    #[must_use]
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        let url = url.into();
        let error = match Url::parse(&url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => None,
            Ok(parsed) => Some(HttpError::InvalidUrl {
                url: url.clone(),
                reason: format!("scheme {} is not allowed", parsed.scheme()),
            }),
            Err(e) => Some(HttpError::InvalidUrl {
                url: url.clone(),
                reason: e.to_string(),
            }),
        };

        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            error,
        }
    }

    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    #[must_use]
    pub fn put(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, url)
    }

    #[must_use]
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, url)
    }

    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match HttpHeader::new(name, value) {
            Ok(header) => self.headers.push(header),
            Err(e) => self.set_error(e),
        }
        self
    }

    #[must_use]
    pub fn bearer(self, token: &str) -> Self {
        let value = format!("Bearer {token}");
        self.header("Authorization", &value)
    }

    #[must_use]
    pub fn idempotency_key(self, key: &str) -> Self {
        self.header("Idempotency-Key", key)
    }

    #[must_use]
    pub fn body(mut self, bytes: Vec<u8>) -> Self {
        if bytes.len() > MAX_REQUEST_BODY_BYTES {
            self.set_error(HttpError::BodyTooLarge {
                size: bytes.len(),
                max: MAX_REQUEST_BODY_BYTES,
            });
        } else {
            self.body = Some(bytes);
        }
        self
    }

    #[must_use]
    pub fn json<T: Serialize>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                self = self.header("Content-Type", "application/json");
                self.body(bytes)
            }
            Err(e) => {
                self.set_error(HttpError::Serialize {
                    message: e.to_string(),
                });
                self
            }
        }
    }

    #[must_use]
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms.min(MAX_TIMEOUT_MS);
        self
    }

    pub fn finish(mut self) -> Result<HttpRequest, HttpError> {
        if let Some(err) = self.error {
            return Err(err);
        }

        // Every outgoing request is traceable end to end.
        self.headers
            .push(HttpHeader::new(REQUEST_ID_HEADER, &Uuid::new_v4().to_string())?);

        Ok(HttpRequest {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: self.body,
            timeout_ms: self.timeout_ms,
        })
    }

    fn set_error(&mut self, error: HttpError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<HttpHeader>,
    #[serde(with = "serde_bytes")]
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status >= 400 && self.status < 500
    }

    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.status >= 500 && self.status < 600
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body).map_err(|e| HttpError::Deserialize {
            message: e.to_string(),
        })
    }

    pub fn body_string(&self) -> Result<String, HttpError> {
        String::from_utf8(self.body.clone()).map_err(|_| HttpError::Deserialize {
            message: "response body is not valid UTF-8".into(),
        })
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum HttpError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("request body of {size} bytes exceeds maximum of {max}")]
    BodyTooLarge { size: usize, max: usize },

    #[error("failed to serialize request body: {message}")]
    Serialize { message: String },

    #[error("failed to deserialize response body: {message}")]
    Deserialize { message: String },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("request timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },
}

impl HttpError {
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }
}

pub type HttpResult = Result<HttpResponse, HttpError>;

pub struct Http<Ev> {
    context: CapabilityContext<HttpRequest, Ev>,
}

impl<Ev> Capability<Ev> for Http<Ev> {
    type Operation = HttpRequest;
    type MappedSelf<MappedEv> = Http<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static,
    {
        Http::new(self.context.map_event(f))
    }
}

impl<Ev> Http<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<HttpRequest, Ev>) -> Self {
        Self { context }
    }

    pub fn send<F>(&self, request: HttpRequest, make_event: F)
    where
        F: FnOnce(HttpResult) -> Ev + Send + 'static,
        Ev: Send,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = context.request_from_shell(request).await;
            context.update_app(make_event(result));
        });
    }
}
