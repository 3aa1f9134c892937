use serde::Serialize;
use tokio::sync::broadcast;

use super::state::LauncherState;
use crate::core::version::Version;

const EVENT_CAPACITY: usize = 64;

/// Notifications published by a launcher for whatever UI is attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LauncherEvent {
    StateChanged { state: LauncherState },
    VersionChanged { version: Version },
    BeginUpdate,
    BeginDownload { attempt: u32, url: String },
    BeginInstall,
    UpdateComplete { version: Version },
    Failed { reason: String },
}

/// Fan-out of [`LauncherEvent`]s. Sending never blocks and never fails the
/// caller; events published with no subscriber are dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LauncherEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LauncherEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: LauncherEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_without_subscribers_is_fine() {
        EventBus::new().emit(LauncherEvent::BeginUpdate);
    }

    #[test]
    fn events_serialize_tagged() {
        let json = serde_json::to_value(LauncherEvent::BeginDownload {
            attempt: 2,
            url: "https://host/real".into(),
        })
        .unwrap();
        assert_eq!(json["event"], "begin_download");
        assert_eq!(json["attempt"], 2);

        let json = serde_json::to_value(LauncherEvent::StateChanged {
            state: LauncherState::Installing,
        })
        .unwrap();
        assert_eq!(json["state"], "installing");
    }

    #[tokio::test]
    async fn subscribers_receive_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(LauncherEvent::BeginUpdate);
        bus.emit(LauncherEvent::BeginInstall);
        assert_eq!(rx.recv().await.unwrap(), LauncherEvent::BeginUpdate);
        assert_eq!(rx.recv().await.unwrap(), LauncherEvent::BeginInstall);
    }
}
