use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{DialogName, NavigationState, TabId};

/// Chrome-level notifications, published after the state change they report
/// has fully completed (listeners never observe a half-applied transition).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    TabCreated(TabId),
    TabActivated(TabId),
    TabRemoved(TabId),
    DialogVisibilityChanged {
        name: DialogName,
        visible: bool,
    },
    ZoomFactorUpdated {
        tab: TabId,
        factor: f64,
        show_dialog: bool,
    },
    NavigationStateChanged {
        tab: TabId,
        state: NavigationState,
    },
    FullscreenChanged(bool),
    #[serde(other)]
    Unknown,
}

pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: Event) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
