//! Generation lifecycle: bring a new agent version online, retire the
//! previous one.

use color_eyre::{eyre::eyre, Result};
use tracing::{error, info};

use crate::cache::BucketStore;

use super::Agent;

/// Lifecycle state of one agent generation.
///
/// `Installing → Installed → Activating → Activated`; a failed install
/// leaves the generation in `Failed`, from which the platform may retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
  /// Registered but not yet installing
  Registered,
  Installing,
  /// Install finished; ready to take over immediately
  Installed,
  Activating,
  /// Controlling all open pages
  Activated,
  /// Install failed; never reaches `Activated`
  Failed,
}

impl<S: BucketStore> Agent<S> {
  /// Install this generation: open the versioned bucket and warm it with
  /// every preload path in one atomic bulk store.
  ///
  /// If any single fetch fails, the whole install fails and no partial
  /// cache is committed. On success the generation is ready to activate
  /// immediately — it does not wait for pages controlled by a previous
  /// generation to close.
  pub async fn install(&self) -> Result<()> {
    match self.state() {
      GenerationState::Registered | GenerationState::Failed => {}
      other => return Err(eyre!("Cannot install from state {:?}", other)),
    }

    self.set_state(GenerationState::Installing);
    info!(cache = %self.config.cache_name, "installing");

    match self.precache().await {
      Ok(count) => {
        self.set_state(GenerationState::Installed);
        info!(resources = count, "all preload resources cached");
        Ok(())
      }
      Err(err) => {
        self.set_state(GenerationState::Failed);
        error!(error = %err, "install failed");
        Err(err)
      }
    }
  }

  async fn precache(&self) -> Result<usize> {
    self.store.open_bucket(&self.config.cache_name)?;

    let mut entries = Vec::with_capacity(self.config.precache.len());
    for path in &self.config.precache {
      let url = self.config.resolve(path)?;
      entries.push(self.fetch_into_bucket(&url).await?);
    }

    self.store.put_all(&self.config.cache_name, &entries)?;
    Ok(entries.len())
  }

  /// Activate this generation: delete every bucket not named for the
  /// current version, then claim all open pages so their subsequent
  /// fetches route through this agent.
  pub async fn activate(&self) -> Result<()> {
    if self.state() != GenerationState::Installed {
      return Err(eyre!("Cannot activate from state {:?}", self.state()));
    }

    self.set_state(GenerationState::Activating);
    info!(cache = %self.config.cache_name, "activating");

    for name in self.store.list_buckets()? {
      if name != self.config.cache_name {
        info!(bucket = %name, "deleting stale cache");
        self.store.delete_bucket(&name)?;
      }
    }

    self.windows.claim().await?;
    self.set_state(GenerationState::Activated);
    info!("activated");

    Ok(())
  }
}
