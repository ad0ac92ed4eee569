//! Offline caching agent for the MedQuiz web app.
//!
//! The agent sits between the application and the network. Intercepted
//! requests are answered cache-first: a stored response is served verbatim
//! with no network contact; on a miss the request goes to the network and a
//! direct same-origin 200 is opportunistically stored for future offline
//! use; when the network is down, HTML navigations fall back to the cached
//! root document and everything else gets a synthetic 503.
//!
//! Cache generations are versioned through the bucket name: installing a
//! new version warms a fresh bucket atomically, and activating it deletes
//! every bucket from earlier deployments before claiming the open pages.
//! Push notifications, notification-click window routing, deferred sync,
//! and an application message channel round out the event surface.
//!
//! Hosts construct an [`Agent`] from an [`AgentConfig`] and four
//! capability implementations, then deliver events to its handlers,
//! awaiting each returned future before treating the event as complete.

pub mod agent;
pub mod cache;
pub mod clients;
pub mod config;
pub mod event;
pub mod fetch;
pub mod http;
pub mod logging;
pub mod notify;

pub use agent::{
  Agent, FetchOutcome, GenerationState, Served, SYNC_GAME_DATA_TAG, UPDATE_CONTENT_TAG,
};
pub use cache::{BucketStore, CachedEntry, MemoryStorage, SqliteStorage, StoredResponse};
pub use clients::{WindowClient, WindowClients};
pub use config::{AgentConfig, NotificationConfig};
pub use event::{
  AppMessage, MessageEvent, NotificationClickEvent, PushEvent, PushPayload, SyncEvent,
};
pub use fetch::{Fetcher, HttpFetcher};
pub use http::{Method, Request, RequestKey, Response, ResponseKind};
pub use notify::{Notification, NotificationSink};
