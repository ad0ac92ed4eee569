//! Event contexts delivered to the agent by its host.
//!
//! Each context pairs with one handler on [`crate::Agent`]. The handler
//! returns a future; the host must await it before treating the event as
//! complete, otherwise the hosting context may be torn down with the work
//! abandoned mid-flight.

use serde::Deserialize;
use tracing::debug;

use crate::notify::Notification;

/// A deferred- or periodic-sync signal.
#[derive(Debug, Clone)]
pub struct SyncEvent {
  pub tag: String,
}

impl SyncEvent {
  pub fn new(tag: &str) -> Self {
    Self {
      tag: tag.to_string(),
    }
  }
}

/// An incoming push message with an optional raw payload.
#[derive(Debug, Clone)]
pub struct PushEvent {
  data: Option<Vec<u8>>,
}

/// Push payload contract: all fields optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushPayload {
  pub title: Option<String>,
  pub body: Option<String>,
  pub url: Option<String>,
}

impl PushEvent {
  pub fn new(data: Option<Vec<u8>>) -> Self {
    Self { data }
  }

  /// A push that arrived with no payload at all.
  pub fn empty() -> Self {
    Self { data: None }
  }

  /// Parse the payload. Absent or malformed data yields an empty payload —
  /// a bad push must never be fatal.
  pub fn payload(&self) -> PushPayload {
    match &self.data {
      Some(bytes) => match serde_json::from_slice(bytes) {
        Ok(payload) => payload,
        Err(err) => {
          debug!(error = %err, "malformed push payload, using defaults");
          PushPayload::default()
        }
      },
      None => PushPayload::default(),
    }
  }
}

/// A message posted to the agent by the application.
#[derive(Debug, Clone)]
pub struct MessageEvent {
  pub data: serde_json::Value,
}

impl MessageEvent {
  pub fn new(data: serde_json::Value) -> Self {
    Self { data }
  }

  /// Decode the application message contract; anything else is `None`.
  pub fn app_message(&self) -> Option<AppMessage> {
    serde_json::from_value(self.data.clone()).ok()
  }
}

/// Messages the application can send to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum AppMessage {
  /// Fetch and store a single resource into the current bucket.
  #[serde(rename = "CACHE_NEW_RESOURCE")]
  CacheNewResource { url: String },
}

/// A click on a previously shown notification.
#[derive(Debug, Clone)]
pub struct NotificationClickEvent {
  pub notification: Notification,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_push_payload_parses_fields() {
    let event = PushEvent::new(Some(
      serde_json::to_vec(&json!({"title": "X", "body": "Y", "url": "/page"})).unwrap(),
    ));
    let payload = event.payload();

    assert_eq!(payload.title.as_deref(), Some("X"));
    assert_eq!(payload.body.as_deref(), Some("Y"));
    assert_eq!(payload.url.as_deref(), Some("/page"));
  }

  #[test]
  fn test_push_payload_tolerates_absence() {
    let payload = PushEvent::empty().payload();
    assert!(payload.title.is_none());
    assert!(payload.body.is_none());
    assert!(payload.url.is_none());
  }

  #[test]
  fn test_push_payload_tolerates_garbage() {
    let payload = PushEvent::new(Some(b"not json".to_vec())).payload();
    assert!(payload.title.is_none());
  }

  #[test]
  fn test_app_message_decodes_cache_request() {
    let event = MessageEvent::new(json!({"type": "CACHE_NEW_RESOURCE", "url": "/quiz/42"}));
    assert_eq!(
      event.app_message(),
      Some(AppMessage::CacheNewResource {
        url: "/quiz/42".to_string()
      })
    );
  }

  #[test]
  fn test_app_message_ignores_unknown_types() {
    assert!(MessageEvent::new(json!({"type": "PING"})).app_message().is_none());
    assert!(MessageEvent::new(json!("plain string")).app_message().is_none());
    assert!(MessageEvent::new(json!({"url": "/x"})).app_message().is_none());
  }
}
