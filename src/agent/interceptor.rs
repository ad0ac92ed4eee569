//! Request interception: cache-first with network fallback.

use color_eyre::Result;
use tracing::{debug, warn};

use crate::cache::{BucketStore, StoredResponse};
use crate::http::{Request, RequestKey, Response};

use super::Agent;

/// Where a handled response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Served {
  /// Stored response, no network contact
  Cache,
  /// Fresh network response
  Network,
  /// Cached root document, served because the network failed on an HTML
  /// navigation
  OfflineShell,
  /// Synthetic 503, nothing else applied
  Unavailable,
}

/// A response the agent decided to produce, with its provenance.
#[derive(Debug)]
pub struct FetchOutcome {
  pub response: Response,
  pub served: Served,
}

impl<S: BucketStore> Agent<S> {
  /// Intercept an outgoing request.
  ///
  /// Returns `None` for requests the agent must leave to default handling
  /// (third-party traffic, non-http schemes, other origins). For everything
  /// else the strategy is cache-first: stored response verbatim on a hit;
  /// otherwise the network, opportunistically caching direct same-origin
  /// 200s; on network failure, the offline shell for HTML navigations or a
  /// synthetic 503.
  pub async fn handle_fetch(&self, request: &Request) -> Result<Option<FetchOutcome>> {
    if self.is_bypassed(request) {
      return Ok(None);
    }

    let bucket = &self.config.cache_name;
    let key = RequestKey::of(request);

    if let Some(entry) = self.store.get(bucket, &key)? {
      debug!(url = %request.url, "serving from cache");
      return Ok(Some(FetchOutcome {
        response: entry.response.into_response(),
        served: Served::Cache,
      }));
    }

    match self.fetcher.fetch(request).await {
      Ok(response) => {
        if response.is_cacheable() {
          // The caller and the cache each need their own copy of the body
          let copy = response.clone();
          match self.store.put(bucket, &key, &StoredResponse::from_response(&copy)) {
            Ok(()) => debug!(url = %request.url, "cached new resource"),
            // Caching is best-effort; the response still goes out
            Err(err) => warn!(url = %request.url, error = %err, "failed to cache response"),
          }
        }

        Ok(Some(FetchOutcome {
          response,
          served: Served::Network,
        }))
      }
      Err(err) => {
        debug!(url = %request.url, error = %err, "network unavailable, falling back");

        if request.accepts_html() {
          let shell_key = RequestKey::for_get(&self.config.shell_url()?);
          if let Some(entry) = self.store.get(bucket, &shell_key)? {
            return Ok(Some(FetchOutcome {
              response: entry.response.into_response(),
              served: Served::OfflineShell,
            }));
          }
        }

        Ok(Some(FetchOutcome {
          response: Response::unavailable(),
          served: Served::Unavailable,
        }))
      }
    }
  }

  /// Requests the agent must not touch: third-party messaging traffic,
  /// non-http(s) schemes, and other origins.
  fn is_bypassed(&self, request: &Request) -> bool {
    let url = &request.url;

    if !matches!(url.scheme(), "http" | "https") {
      return true;
    }

    if url.origin() != self.config.scope.origin() {
      return true;
    }

    let raw = url.as_str();
    self
      .config
      .bypass_markers
      .iter()
      .any(|marker| raw.contains(marker.as_str()))
  }
}
