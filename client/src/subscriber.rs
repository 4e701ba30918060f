//! Remote subscriber: checkpoints kept locally, changes asked from the master.

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Url;
use serde::Deserialize;
use syndex_engine::{sanitize, Changes, CheckpointTracker, JsonCheckpoints, Syndex};
use tokio::sync::Mutex;

use crate::error::{ClientError, Result};

/// Error body the master returns with every non-2xx status.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    code: String,
}

/// A named subscriber polling one master.
///
/// The master is queried with `GET /types/{type}/changes?since=n`, where `n`
/// is the subscriber's own checkpoint, and the checkpoint is advanced to the
/// counter the master answers with.
pub struct RemoteSubscriber {
    http: reqwest::Client,
    master: Url,
    name: String,
    checkpoints: CheckpointTracker,
    /// Held across a whole sync so checkpoint reads and writes do not interleave
    sync_lock: Mutex<()>,
}

impl RemoteSubscriber {
    /// Subscriber with in-memory checkpoints.
    pub fn new(master: &str, name: &str) -> Result<Self> {
        Self::with_checkpoints(master, name, CheckpointTracker::in_memory())
    }

    /// Subscriber whose checkpoints live in a JSON file and survive restarts.
    pub fn open(master: &str, name: &str, path: impl Into<PathBuf>) -> Result<Self> {
        let checkpoints = JsonCheckpoints::open(path)?;
        Self::with_checkpoints(master, name, CheckpointTracker::new(Arc::new(checkpoints)))
    }

    pub fn with_checkpoints(
        master: &str,
        name: &str,
        checkpoints: CheckpointTracker,
    ) -> Result<Self> {
        let name = sanitize::require("name", name)?;
        let master =
            Url::parse(master).map_err(|e| ClientError::InvalidUrl(format!("{master}: {e}")))?;
        if master.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(master.to_string()));
        }

        Ok(Self {
            http: reqwest::Client::new(),
            master,
            name,
            checkpoints,
            sync_lock: Mutex::new(()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ids of `type_name` changed since the last sync, with the master's counter.
    ///
    /// The checkpoint only moves after the master has answered; a failed
    /// request leaves it where it was.
    pub async fn sync(&self, type_name: &str) -> Result<Changes> {
        let type_name = sanitize::require("type", type_name)?;
        let _guard = self.sync_lock.lock().await;

        let since = self.syndex(&type_name).await?;
        let changes = match self.changes_above(&type_name, since).await {
            Ok(changes) => changes,
            Err(e) => {
                tracing::warn!(subscriber = %self.name, type_name = %type_name, "Sync failed: {}", e);
                return Err(e);
            }
        };
        self.store_checkpoint(&type_name, changes.syndex).await?;

        tracing::debug!(
            subscriber = %self.name,
            type_name = %type_name,
            from = since,
            to = changes.syndex,
            count = changes.ids.len(),
            "Synced from master"
        );
        Ok(changes)
    }

    /// Local checkpoint for `type_name`, 0 before the first sync.
    pub async fn syndex(&self, type_name: &str) -> Result<Syndex> {
        let name = self.name.clone();
        let type_name = type_name.to_string();
        self.blocking(move |checkpoints| checkpoints.get_checkpoint(&name, &type_name))
            .await
    }

    /// Move the local checkpoint, e.g. back to replay history on the next sync.
    pub async fn set_syndex(&self, type_name: &str, syndex: Syndex) -> Result<()> {
        let type_name = sanitize::require("type", type_name)?;
        let _guard = self.sync_lock.lock().await;
        self.store_checkpoint(&type_name, syndex).await
    }

    /// Forget every local checkpoint; the next sync of each type starts at 0.
    pub async fn flush(&self) -> Result<()> {
        let _guard = self.sync_lock.lock().await;
        let name = self.name.clone();
        self.blocking(move |checkpoints| checkpoints.flush(&name))
            .await?;
        tracing::info!(subscriber = %self.name, "Flushed local checkpoints");
        Ok(())
    }

    async fn changes_above(&self, type_name: &str, since: Syndex) -> Result<Changes> {
        let mut url = self.master.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.master.to_string()))?
            .pop_if_empty()
            .extend(["types", type_name, "changes"]);
        url.query_pairs_mut()
            .append_pair("since", &since.to_string());

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<Changes>().await?);
        }

        let (code, message) = match response.json::<ErrorBody>().await {
            Ok(body) => (body.code, body.error),
            Err(_) => ("unknown".to_string(), status.to_string()),
        };
        Err(ClientError::Remote {
            status: status.as_u16(),
            code,
            message,
        })
    }

    async fn store_checkpoint(&self, type_name: &str, syndex: Syndex) -> Result<()> {
        let name = self.name.clone();
        let type_name = type_name.to_string();
        self.blocking(move |checkpoints| checkpoints.set_checkpoint(&name, &type_name, syndex))
            .await
    }

    /// Checkpoint backends may write files, so they run on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(CheckpointTracker) -> syndex_engine::error::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let checkpoints = self.checkpoints.clone();
        tokio::task::spawn_blocking(move || f(checkpoints))
            .await
            .map_err(|e| ClientError::Task(e.to_string()))?
            .map_err(ClientError::from)
    }
}

impl std::fmt::Debug for RemoteSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSubscriber")
            .field("master", &self.master.as_str())
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_sanitized() {
        let subscriber = RemoteSubscriber::new("http://127.0.0.1:3000", "app 1!").unwrap();
        assert_eq!(subscriber.name(), "app 1");
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            RemoteSubscriber::new("http://127.0.0.1:3000", "$$"),
            Err(ClientError::Ledger(syndex_engine::Error::InvalidArgument(_)))
        ));
        assert!(matches!(
            RemoteSubscriber::new("not a url", "app1"),
            Err(ClientError::InvalidUrl(_))
        ));
        assert!(matches!(
            RemoteSubscriber::new("mailto:ops@example.com", "app1"),
            Err(ClientError::InvalidUrl(_))
        ));
    }
}
