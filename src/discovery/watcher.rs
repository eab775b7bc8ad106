//! Async location-watch loop feeding positions into [`DiscoveryService`].

use super::{DiscoveryEvent, DiscoveryService};
use crate::geo::Coordinate;
use crate::storage::JourneyStore;
use crossbeam::channel::{unbounded, Receiver};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Spawns location-watch loops.
pub struct LocationWatcher;

impl LocationWatcher {
    /// Start watching `positions` for `user_id`.
    ///
    /// Positions are evaluated in arrival order, each on Tokio's blocking
    /// pool since the store does synchronous I/O. Each new discovery is sent
    /// on the returned channel. The loop ends when the position stream closes
    /// or the handle is cancelled or dropped. Must be called from within a
    /// Tokio runtime.
    pub fn spawn<S>(
        service: Arc<DiscoveryService<S>>,
        user_id: impl Into<String>,
        mut positions: mpsc::Receiver<Coordinate>,
    ) -> (WatchHandle, Receiver<DiscoveryEvent>)
    where
        S: JourneyStore + Send + Sync + 'static,
    {
        let user_id = user_id.into();
        let (event_tx, event_rx) = unbounded();

        let task = tokio::spawn(async move {
            tracing::info!("Location watch started for {}", user_id);

            while let Some(position) = positions.recv().await {
                let service = Arc::clone(&service);
                let user = user_id.clone();
                let evaluated =
                    tokio::task::spawn_blocking(move || service.process_position(&user, &position))
                        .await;

                match evaluated {
                    Ok(Ok(events)) => {
                        for event in events {
                            if event_tx.send(event).is_err() {
                                tracing::debug!("Discovery receiver dropped for {}", user_id);
                            }
                        }
                    }
                    Ok(Err(e)) => {
                        tracing::warn!("Failed to evaluate position {}: {}", position, e);
                    }
                    Err(e) => {
                        tracing::error!("Position evaluation for {} panicked: {}", position, e);
                    }
                }
            }

            tracing::info!("Location watch ended for {}", user_id);
        });

        (WatchHandle { task: Some(task) }, event_rx)
    }
}

/// Owns a running watch loop. Dropping it stops the loop.
#[must_use = "dropping the handle stops the watch loop"]
pub struct WatchHandle {
    task: Option<JoinHandle<()>>,
}

impl WatchHandle {
    /// Stop the loop. A position already being evaluated still finishes on
    /// the blocking pool, but its events are not delivered.
    pub fn cancel(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Whether the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Wait until the loop exits on its own, i.e. after the position
    /// stream closes.
    pub async fn finished(mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    tracing::error!("Location watch task panicked: {}", e);
                }
            }
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
