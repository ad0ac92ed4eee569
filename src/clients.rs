//! Application window capability.

use async_trait::async_trait;
use color_eyre::Result;
use url::Url;

/// An open application window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowClient {
  pub id: String,
  pub url: Url,
}

/// Abstract interface over the application's open windows.
#[async_trait]
pub trait WindowClients: Send + Sync {
  /// All currently open application windows.
  async fn list(&self) -> Result<Vec<WindowClient>>;

  /// Bring a window to the foreground. Returns whether the window could be
  /// focused (a host may not support focusing every window).
  async fn focus(&self, id: &str) -> Result<bool>;

  /// Open a new window at the given URL.
  async fn open(&self, url: &Url) -> Result<()>;

  /// Route all open windows' future requests through the current agent
  /// generation, without waiting for them to reload.
  async fn claim(&self) -> Result<()>;
}
