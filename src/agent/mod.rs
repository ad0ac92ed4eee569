//! The offline cache agent.
//!
//! `Agent` owns one versioned cache bucket and everything that decides, per
//! intercepted request, whether to serve from that bucket, from the network,
//! or from a fallback. It is composed from four injected capabilities —
//! bucket storage, network fetch, notifications, and window clients — so a
//! host wires it to the real platform and tests wire it to fakes.
//!
//! Every handler is an `async fn`; the returned future is the work the
//! triggering event must be held open for. Hosts await it before completing
//! the event.

mod background;
mod interceptor;
mod lifecycle;

pub use background::{SYNC_GAME_DATA_TAG, UPDATE_CONTENT_TAG};
pub use interceptor::{FetchOutcome, Served};
pub use lifecycle::GenerationState;

use color_eyre::{eyre::eyre, Result};
use std::sync::{Arc, Mutex};
use url::Url;

use crate::cache::{BucketStore, StoredResponse};
use crate::clients::WindowClients;
use crate::config::AgentConfig;
use crate::fetch::Fetcher;
use crate::http::{Request, RequestKey};
use crate::notify::NotificationSink;

/// One generation of the offline cache agent.
pub struct Agent<S: BucketStore> {
  config: AgentConfig,
  store: Arc<S>,
  fetcher: Arc<dyn Fetcher>,
  notifications: Arc<dyn NotificationSink>,
  windows: Arc<dyn WindowClients>,
  state: Mutex<GenerationState>,
}

impl<S: BucketStore> Agent<S> {
  pub fn new(
    config: AgentConfig,
    store: S,
    fetcher: Arc<dyn Fetcher>,
    notifications: Arc<dyn NotificationSink>,
    windows: Arc<dyn WindowClients>,
  ) -> Self {
    Self {
      config,
      store: Arc::new(store),
      fetcher,
      notifications,
      windows,
      state: Mutex::new(GenerationState::Registered),
    }
  }

  pub fn config(&self) -> &AgentConfig {
    &self.config
  }

  /// Current lifecycle state of this generation.
  pub fn state(&self) -> GenerationState {
    self
      .state
      .lock()
      .map(|state| *state)
      .unwrap_or(GenerationState::Failed)
  }

  pub(crate) fn set_state(&self, next: GenerationState) {
    if let Ok(mut state) = self.state.lock() {
      *state = next;
    }
  }

  /// Fetch a resource and snapshot it for storage. Fails on network error
  /// or on a response that must not be cached.
  pub(crate) async fn fetch_into_bucket(&self, url: &Url) -> Result<(RequestKey, StoredResponse)> {
    let request = Request::get(url.clone());
    let response = self.fetcher.fetch(&request).await?;

    if !response.is_cacheable() {
      return Err(eyre!(
        "Resource {} responded with status {} and cannot be cached",
        url,
        response.status
      ));
    }

    Ok((
      RequestKey::of(&request),
      StoredResponse::from_response(&response),
    ))
  }
}
