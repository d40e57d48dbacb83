//! In-process fan-out of scan changes to each user's open SSE streams.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::record::ScanRecord;

pub const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanEvent {
    ScanCreated { record: ScanRecord },
    #[serde(rename_all = "camelCase")]
    ScanDeleted { scan_id: Uuid },
}

impl ScanEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ScanEvent::ScanCreated { .. } => "scan_created",
            ScanEvent::ScanDeleted { .. } => "scan_deleted",
        }
    }
}

/// Per-user broadcast channels, created on first subscribe.
#[derive(Clone)]
pub struct ScanHub {
    channels: Arc<RwLock<HashMap<Uuid, broadcast::Sender<ScanEvent>>>>,
    capacity: usize,
}

impl ScanHub {
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    /// No-op when the user has no open stream.
    pub async fn publish(&self, user_id: Uuid, event: ScanEvent) {
        let channels = self.channels.read().await;
        if let Some(tx) = channels.get(&user_id) {
            let _ = tx.send(event);
        }
    }

    pub async fn subscribe(&self, user_id: Uuid) -> broadcast::Receiver<ScanEvent> {
        let mut channels = self.channels.write().await;
        // Drop channels whose streams have all gone away.
        channels.retain(|_, tx| tx.receiver_count() > 0);
        channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }
}

impl Default for ScanHub {
    fn default() -> Self {
        Self::new()
    }
}
