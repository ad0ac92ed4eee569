//! Core storage trait and stored-response snapshot.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};

use crate::http::{RequestKey, Response, ResponseKind};

/// Immutable snapshot of a network response at the time it was cached.
///
/// Never mutated after creation; replaced wholesale if the same key is
/// cached again; destroyed when its owning bucket is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
  pub status: u16,
  pub status_text: String,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl StoredResponse {
  /// Snapshot a response for storage.
  pub fn from_response(response: &Response) -> Self {
    Self {
      status: response.status,
      status_text: response.status_text.clone(),
      headers: response.headers.clone(),
      body: response.body.clone(),
    }
  }

  /// Rebuild the response served to the caller. A stored response was a
  /// direct same-origin response when it was cached, so it stays `Basic`.
  pub fn into_response(self) -> Response {
    Response {
      status: self.status,
      status_text: self.status_text,
      headers: self.headers,
      body: self.body,
      kind: ResponseKind::Basic,
    }
  }
}

/// A stored response together with its storage timestamp.
#[derive(Debug, Clone)]
pub struct CachedEntry {
  pub response: StoredResponse,
  pub cached_at: DateTime<Utc>,
}

/// Trait for bucket storage backends.
pub trait BucketStore: Send + Sync {
  /// Create the named bucket if it does not exist.
  fn open_bucket(&self, name: &str) -> Result<()>;

  /// Names of all existing buckets.
  fn list_buckets(&self) -> Result<Vec<String>>;

  /// Delete a bucket and every entry in it. Returns whether anything was
  /// removed.
  fn delete_bucket(&self, name: &str) -> Result<bool>;

  /// Look up a stored response by request identity.
  fn get(&self, bucket: &str, key: &RequestKey) -> Result<Option<CachedEntry>>;

  /// Store a response under the given identity, replacing any previous
  /// entry for that identity.
  fn put(&self, bucket: &str, key: &RequestKey, response: &StoredResponse) -> Result<()>;

  /// Store a batch of entries atomically: either every entry is committed
  /// or none is.
  fn put_all(&self, bucket: &str, entries: &[(RequestKey, StoredResponse)]) -> Result<()>;
}
