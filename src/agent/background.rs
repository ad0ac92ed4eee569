//! Background event handling: deferred sync, push notifications,
//! notification clicks, and application messages.

use color_eyre::Result;
use tracing::{debug, info, warn};

use crate::cache::BucketStore;
use crate::event::{AppMessage, MessageEvent, NotificationClickEvent, PushEvent, SyncEvent};
use crate::notify::Notification;

use super::Agent;

/// Deferred-sync tag for uploading buffered game results.
pub const SYNC_GAME_DATA_TAG: &str = "sync-game-data";

/// Periodic-sync tag for refreshing content in the background.
pub const UPDATE_CONTENT_TAG: &str = "update-content";

impl<S: BucketStore> Agent<S> {
  /// Handle a deferred-sync signal.
  pub async fn handle_sync(&self, event: &SyncEvent) -> Result<()> {
    if event.tag == SYNC_GAME_DATA_TAG {
      self.sync_game_data().await
    } else {
      debug!(tag = %event.tag, "ignoring unknown sync tag");
      Ok(())
    }
  }

  /// Handle a periodic-sync signal.
  pub async fn handle_periodic_sync(&self, event: &SyncEvent) -> Result<()> {
    if event.tag == UPDATE_CONTENT_TAG {
      self.update_content().await
    } else {
      debug!(tag = %event.tag, "ignoring unknown periodic sync tag");
      Ok(())
    }
  }

  // TODO: push locally buffered game results to the backend once the
  // results endpoint ships
  async fn sync_game_data(&self) -> Result<()> {
    info!("syncing game data");
    Ok(())
  }

  async fn update_content(&self) -> Result<()> {
    info!("refreshing content");
    Ok(())
  }

  /// Handle an incoming push message: build a notification from the
  /// payload (falling back to configured defaults field by field) and
  /// display it.
  pub async fn handle_push(&self, event: &PushEvent) -> Result<()> {
    let payload = event.payload();
    let defaults = &self.config.notifications;

    let target = payload.url.as_deref().unwrap_or(&defaults.default_url);
    let notification = Notification {
      title: payload.title.unwrap_or_else(|| defaults.default_title.clone()),
      body: payload.body.unwrap_or_else(|| defaults.default_body.clone()),
      icon: defaults.icon.clone(),
      badge: defaults.badge.clone(),
      vibration: defaults.vibration.clone(),
      target_url: self.config.resolve(target)?,
    };

    info!(title = %notification.title, "showing notification");
    self.notifications.show(&notification).await
  }

  /// Handle a click on a notification: dismiss it, then focus an existing
  /// window at its target URL or open a new one there.
  pub async fn handle_notification_click(&self, event: &NotificationClickEvent) -> Result<()> {
    self.notifications.close(&event.notification).await?;

    let target = &event.notification.target_url;
    for client in self.windows.list().await? {
      if client.url == *target && self.windows.focus(&client.id).await? {
        debug!(url = %target, "focused existing window");
        return Ok(());
      }
    }

    debug!(url = %target, "opening new window");
    self.windows.open(target).await
  }

  /// Handle a message posted by the application.
  pub async fn handle_message(&self, event: &MessageEvent) -> Result<()> {
    debug!(data = %event.data, "message received");

    match event.app_message() {
      Some(AppMessage::CacheNewResource { url }) => self.cache_resource(&url).await,
      None => Ok(()),
    }
  }

  /// Fetch and store a single resource, best-effort: failure is logged,
  /// never propagated to the sender.
  async fn cache_resource(&self, url: &str) -> Result<()> {
    let resolved = match self.config.resolve(url) {
      Ok(resolved) => resolved,
      Err(err) => {
        warn!(url = %url, error = %err, "cannot resolve resource to cache");
        return Ok(());
      }
    };

    match self.fetch_into_bucket(&resolved).await {
      Ok((key, stored)) => match self.store.put(&self.config.cache_name, &key, &stored) {
        Ok(()) => {
          info!(url = %resolved, "cached new resource");
          Ok(())
        }
        Err(err) => {
          warn!(url = %resolved, error = %err, "failed to store resource");
          Ok(())
        }
      },
      Err(err) => {
        warn!(url = %resolved, error = %err, "failed to fetch resource");
        Ok(())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::super::testing::{harness, ok_response};
  use super::*;
  use crate::http::RequestKey;
  use serde_json::json;
  use url::Url;

  #[tokio::test]
  async fn test_sync_tags_are_routed() {
    let h = harness();

    h.agent.handle_sync(&SyncEvent::new(SYNC_GAME_DATA_TAG)).await.unwrap();
    h.agent.handle_sync(&SyncEvent::new("unrelated")).await.unwrap();
    h.agent
      .handle_periodic_sync(&SyncEvent::new(UPDATE_CONTENT_TAG))
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn test_push_with_payload_builds_notification() {
    let h = harness();

    let event = PushEvent::new(Some(
      serde_json::to_vec(&json!({"title": "X", "body": "Y", "url": "/page"})).unwrap(),
    ));
    h.agent.handle_push(&event).await.unwrap();

    let shown = h.sink.shown.lock().unwrap();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].title, "X");
    assert_eq!(shown[0].body, "Y");
    assert_eq!(shown[0].target_url.as_str(), "https://medquiz.example/page");
    assert_eq!(shown[0].icon, "icon-192.png");
    assert_eq!(shown[0].vibration, vec![100, 50, 100]);
  }

  #[tokio::test]
  async fn test_push_without_payload_uses_defaults() {
    let h = harness();

    h.agent.handle_push(&PushEvent::empty()).await.unwrap();

    let shown = h.sink.shown.lock().unwrap();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].title, "MedQuiz");
    assert_eq!(shown[0].body, "Новое уведомление от MedQuiz");
    assert_eq!(shown[0].target_url.as_str(), "https://medquiz.example/");
  }

  fn clicked(target: &str) -> NotificationClickEvent {
    NotificationClickEvent {
      notification: Notification {
        title: "MedQuiz".to_string(),
        body: "n".to_string(),
        icon: "icon-192.png".to_string(),
        badge: "icon-192.png".to_string(),
        vibration: vec![100, 50, 100],
        target_url: Url::parse(target).unwrap(),
      },
    }
  }

  #[tokio::test]
  async fn test_click_focuses_existing_window() {
    let h = harness();
    h.windows.add_window("w1", "https://medquiz.example/other");
    h.windows.add_window("w2", "https://medquiz.example/page");

    h.agent
      .handle_notification_click(&clicked("https://medquiz.example/page"))
      .await
      .unwrap();

    assert_eq!(h.sink.closed.lock().unwrap().len(), 1);
    assert_eq!(*h.windows.focused.lock().unwrap(), vec!["w2".to_string()]);
    assert!(h.windows.opened.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_click_opens_new_window_when_none_matches() {
    let h = harness();
    h.windows.add_window("w1", "https://medquiz.example/other");

    h.agent
      .handle_notification_click(&clicked("https://medquiz.example/page"))
      .await
      .unwrap();

    assert!(h.windows.focused.lock().unwrap().is_empty());
    assert_eq!(
      *h.windows.opened.lock().unwrap(),
      vec![Url::parse("https://medquiz.example/page").unwrap()]
    );
  }

  #[tokio::test]
  async fn test_click_opens_new_window_when_focus_is_refused() {
    let h = harness();
    h.windows.add_window("w1", "https://medquiz.example/page");
    h.windows
      .focusable
      .store(false, std::sync::atomic::Ordering::SeqCst);

    h.agent
      .handle_notification_click(&clicked("https://medquiz.example/page"))
      .await
      .unwrap();

    assert_eq!(h.windows.opened.lock().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_message_caches_requested_resource() {
    let h = harness();
    h.fetcher.insert(
      "https://medquiz.example/quiz/42",
      ok_response("{\"quiz\":42}", "application/json"),
    );

    let event = MessageEvent::new(json!({"type": "CACHE_NEW_RESOURCE", "url": "/quiz/42"}));
    h.agent.handle_message(&event).await.unwrap();

    let key = RequestKey::for_get(&Url::parse("https://medquiz.example/quiz/42").unwrap());
    let entry = h.store.get("medquiz-v1.0", &key).unwrap().unwrap();
    assert_eq!(entry.response.body, b"{\"quiz\":42}");
  }

  #[tokio::test]
  async fn test_caching_same_resource_twice_keeps_latest() {
    let h = harness();
    let event = MessageEvent::new(json!({"type": "CACHE_NEW_RESOURCE", "url": "/quiz/42"}));

    h.fetcher.insert(
      "https://medquiz.example/quiz/42",
      ok_response("first", "application/json"),
    );
    h.agent.handle_message(&event).await.unwrap();

    h.fetcher.insert(
      "https://medquiz.example/quiz/42",
      ok_response("second", "application/json"),
    );
    h.agent.handle_message(&event).await.unwrap();

    assert_eq!(h.store.entry_count("medquiz-v1.0"), 1);
    let key = RequestKey::for_get(&Url::parse("https://medquiz.example/quiz/42").unwrap());
    let entry = h.store.get("medquiz-v1.0", &key).unwrap().unwrap();
    assert_eq!(entry.response.body, b"second");
  }

  #[tokio::test]
  async fn test_message_caching_is_best_effort() {
    let h = harness();
    h.fetcher.set_offline(true);

    let event = MessageEvent::new(json!({"type": "CACHE_NEW_RESOURCE", "url": "/quiz/42"}));
    // Network down: logged, swallowed, nothing stored
    h.agent.handle_message(&event).await.unwrap();
    assert_eq!(h.store.entry_count("medquiz-v1.0"), 0);
  }

  #[tokio::test]
  async fn test_unknown_message_is_ignored() {
    let h = harness();

    h.agent
      .handle_message(&MessageEvent::new(json!({"type": "PING"})))
      .await
      .unwrap();

    assert_eq!(h.fetcher.calls(), 0);
  }
}
