//! System notification capability.

use async_trait::async_trait;
use color_eyre::Result;
use url::Url;

/// A notification as the agent wants it displayed. `target_url` is carried
/// as auxiliary data and drives window routing when the notification is
/// clicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
  pub title: String,
  pub body: String,
  pub icon: String,
  pub badge: String,
  pub vibration: Vec<u32>,
  pub target_url: Url,
}

/// Abstract notification display interface.
#[async_trait]
pub trait NotificationSink: Send + Sync {
  /// Display the notification.
  async fn show(&self, notification: &Notification) -> Result<()>;

  /// Dismiss a displayed notification.
  async fn close(&self, notification: &Notification) -> Result<()>;
}
