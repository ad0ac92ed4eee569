//! Network fetch capability.
//!
//! The agent never talks to the network directly; it goes through the
//! `Fetcher` trait so hosts can swap the transport and tests can substitute
//! a deterministic fake. An `Err` from `fetch` means the network itself
//! failed (no connectivity, DNS failure) — HTTP error statuses come back as
//! `Ok` responses.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use url::Url;

use crate::http::{Request, Response, ResponseKind};

/// Abstract network fetch interface.
#[async_trait]
pub trait Fetcher: Send + Sync {
  async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// Production fetcher backed by `reqwest`.
pub struct HttpFetcher {
  client: reqwest::Client,
  scope: Url,
}

impl HttpFetcher {
  /// Create a fetcher classifying responses against the given scope origin.
  pub fn new(scope: Url) -> Result<Self> {
    let client = reqwest::Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client, scope })
  }

  /// Use a preconfigured client (e.g. one with a request timeout).
  pub fn with_client(client: reqwest::Client, scope: Url) -> Self {
    Self { client, scope }
  }
}

#[async_trait]
impl Fetcher for HttpFetcher {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
      .map_err(|e| eyre!("Invalid method {}: {}", request.method.as_str(), e))?;

    let mut builder = self.client.request(method, request.url.clone());
    for (name, value) in &request.headers {
      builder = builder.header(name, value);
    }

    let response = builder
      .send()
      .await
      .map_err(|e| eyre!("Fetch failed for {}: {}", request.url, e))?;

    let status = response.status();
    let final_url = response.url().clone();
    let headers: Vec<(String, String)> = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_string(), v.to_string()))
      })
      .collect();

    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body from {}: {}", request.url, e))?
      .to_vec();

    // Without a browser in the loop the post-redirect origin is the best
    // available signal for the basic/cross-origin distinction.
    let kind = if final_url.origin() == self.scope.origin() {
      ResponseKind::Basic
    } else {
      ResponseKind::Cors
    };

    Ok(Response {
      status: status.as_u16(),
      status_text: status.canonical_reason().unwrap_or_default().to_string(),
      headers,
      body,
      kind,
    })
  }
}
