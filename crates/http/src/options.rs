use std::fmt;
use std::sync::Arc;

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use upqueue_queue::{DefaultLocalizer, Localizer, UrlSource};

use crate::error::HttpError;

/// Headers sent with every upload unless overridden by name.
pub const DEFAULT_HEADERS: [(&str, &str); 3] = [
    ("accept", "application/json"),
    ("cache-control", "no-cache"),
    ("x-requested-with", "XMLHttpRequest"),
];

/// Value of a custom request header.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderField {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl HeaderField {
    pub fn render(&self) -> String {
        render_scalar(self.as_scalar())
    }

    fn as_scalar(&self) -> Scalar<'_> {
        match self {
            Self::Text(s) => Scalar::Text(s),
            Self::Number(n) => Scalar::Number(*n),
            Self::Bool(b) => Scalar::Bool(*b),
        }
    }
}

/// Extra multipart field sent before the file.
#[derive(Debug, Clone, PartialEq)]
pub enum FormParam {
    Text(String),
    Number(f64),
    Bool(bool),
    /// Binary part with an optional file name.
    Bytes {
        data: Vec<u8>,
        file_name: Option<String>,
    },
}

impl FormParam {
    /// Text encoding of scalar params; `None` for byte parts.
    pub fn as_text(&self) -> Option<String> {
        let scalar = match self {
            Self::Text(s) => Scalar::Text(s),
            Self::Number(n) => Scalar::Number(*n),
            Self::Bool(b) => Scalar::Bool(*b),
            Self::Bytes { .. } => return None,
        };
        Some(render_scalar(scalar))
    }
}

enum Scalar<'a> {
    Text(&'a str),
    Number(f64),
    Bool(bool),
}

fn render_scalar(value: Scalar<'_>) -> String {
    match value {
        Scalar::Text(s) => s.to_string(),
        Scalar::Number(n) => n.to_string(),
        Scalar::Bool(b) => if b { "true" } else { "false" }.to_string(),
    }
}

/// Request configuration shared by every upload of one transport.
#[derive(Clone)]
pub struct UploadOptions {
    /// Used when a unit carries no resolved URL of its own.
    pub url: UrlSource,
    /// HTTP verb, case-insensitive. Defaults to `POST`.
    pub method: String,
    pub headers: Vec<(String, HeaderField)>,
    pub params: Vec<(String, FormParam)>,
    pub localizer: Arc<dyn Localizer>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            url: UrlSource::default(),
            method: "POST".into(),
            headers: Vec::new(),
            params: Vec::new(),
            localizer: Arc::new(DefaultLocalizer),
        }
    }
}

impl fmt::Debug for UploadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadOptions")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("params", &self.params.len())
            .finish_non_exhaustive()
    }
}

impl UploadOptions {
    pub fn new(url: impl Into<UrlSource>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: HeaderField) -> Self {
        self.headers.push((name.into(), value));
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: FormParam) -> Self {
        self.params.push((name.into(), value));
        self
    }

    pub fn with_localizer(mut self, localizer: Arc<dyn Localizer>) -> Self {
        self.localizer = localizer;
        self
    }

    pub fn http_method(&self) -> Result<Method, HttpError> {
        Method::from_bytes(self.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| HttpError::InvalidMethod(self.method.clone()))
    }

    /// Default headers overlaid with the configured ones.
    pub fn header_map(&self) -> Result<HeaderMap, HttpError> {
        let mut map = HeaderMap::new();
        for (name, value) in DEFAULT_HEADERS {
            map.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        }
        for (name, value) in &self.headers {
            let header = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| HttpError::InvalidHeader(name.clone()))?;
            let value = HeaderValue::from_str(&value.render())
                .map_err(|_| HttpError::InvalidHeader(name.clone()))?;
            map.insert(header, value);
        }
        Ok(map)
    }
}
