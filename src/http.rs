//! Request and response types handled by the agent.
//!
//! These are deliberately small value types: the agent only needs enough of
//! an HTTP model to decide whether a request is cacheable, look it up by
//! identity, and snapshot a response for storage. A response body can have
//! two independent consumers (the caller and the cache), so `Response` is
//! `Clone` and the interceptor clones before storing.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
  Get,
  Head,
  Post,
  Put,
  Delete,
  Patch,
  Options,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Head => "HEAD",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Delete => "DELETE",
      Method::Patch => "PATCH",
      Method::Options => "OPTIONS",
    }
  }
}

/// An intercepted outgoing request.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: Method,
  pub url: Url,
  pub headers: Vec<(String, String)>,
}

impl Request {
  /// Create a GET request with no headers.
  pub fn get(url: Url) -> Self {
    Self {
      method: Method::Get,
      url,
      headers: Vec::new(),
    }
  }

  /// Add a header (builder style).
  pub fn with_header(mut self, name: &str, value: &str) -> Self {
    self.headers.push((name.to_string(), value.to_string()));
    self
  }

  /// Look up a header value, case-insensitive on the name.
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }

  /// Whether the caller expects an HTML document back.
  ///
  /// A missing `Accept` header means "not HTML".
  pub fn accepts_html(&self) -> bool {
    self
      .header("accept")
      .map(|v| v.contains("text/html"))
      .unwrap_or(false)
  }
}

/// How a response relates to the agent's own origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseKind {
  /// Direct same-origin response
  Basic,
  /// Cross-origin response with readable status and headers
  Cors,
  /// Cross-origin response the agent cannot inspect
  Opaque,
}

/// A network response as seen by the interceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  pub status: u16,
  pub status_text: String,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
  pub kind: ResponseKind,
}

impl Response {
  /// Look up a header value, case-insensitive on the name.
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }

  /// Whether this response may be written into the cache: status exactly
  /// 200 and a direct same-origin response.
  pub fn is_cacheable(&self) -> bool {
    self.status == 200 && self.kind == ResponseKind::Basic
  }

  /// The synthetic fallback returned when the network is unreachable and
  /// no cached document applies.
  pub fn unavailable() -> Self {
    Self {
      status: 503,
      status_text: "Service Unavailable".to_string(),
      headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
      body: "Оффлайн-режим".as_bytes().to_vec(),
      kind: ResponseKind::Basic,
    }
  }
}

/// Identity of a request in the cache: method plus absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
  method: Method,
  url: String,
}

impl RequestKey {
  /// Identity of an intercepted request.
  pub fn of(request: &Request) -> Self {
    Self {
      method: request.method,
      url: request.url.to_string(),
    }
  }

  /// Identity of a plain GET for the given URL.
  pub fn for_get(url: &Url) -> Self {
    Self {
      method: Method::Get,
      url: url.to_string(),
    }
  }

  /// Stable fixed-length storage key.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.method.as_str().as_bytes());
    hasher.update(b" ");
    hasher.update(self.url.as_bytes());
    hex::encode(hasher.finalize())
  }

  /// Human-readable form for diagnostics.
  pub fn description(&self) -> String {
    format!("{} {}", self.method.as_str(), self.url)
  }
}
