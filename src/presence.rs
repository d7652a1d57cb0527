use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::chat::event::ServerEvent;

const CHANNEL_CAPACITY: usize = 64;

/// Who is online right now, and one broadcast channel per online user so a
/// push reaches every tab that user has open.
#[derive(Default)]
pub struct Presence {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    conns: HashMap<Uuid, String>,
    channels: HashMap<String, broadcast::Sender<ServerEvent>>,
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the connection and subscribes it to its user's channel.
    pub fn register(&self, conn_id: Uuid, user_id: &str) -> broadcast::Receiver<ServerEvent> {
        let mut inner = self.inner.lock().unwrap();
        inner.conns.insert(conn_id, user_id.to_owned());
        inner
            .channels
            .entry(user_id.to_owned())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    pub fn unregister(&self, conn_id: Uuid) {
        let mut inner = self.inner.lock().unwrap();
        let Some(user_id) = inner.conns.remove(&conn_id) else {
            return;
        };

        // keep the channel while any other tab of the same user is open
        if !inner.conns.values().any(|id| *id == user_id) {
            inner.channels.remove(&user_id);
        }
    }

    pub fn online_user_ids(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        let mut ids: Vec<String> = inner.conns.values().cloned().collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Pushes an event to every live connection of one user; dropped
    /// silently when the user is offline.
    pub fn send_to_user(&self, user_id: &str, event: ServerEvent) {
        let inner = self.inner.lock().unwrap();
        if let Some(tx) = inner.channels.get(user_id) {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_unregister_leaves_no_trace() {
        let presence = Presence::new();
        let conn = Uuid::now_v7();

        let _rx = presence.register(conn, "u1");
        assert_eq!(presence.online_user_ids(), ["u1"]);

        presence.unregister(conn);
        assert!(presence.online_user_ids().is_empty());
    }

    #[test]
    fn user_stays_online_while_any_tab_remains() {
        let presence = Presence::new();
        let first = Uuid::now_v7();
        let second = Uuid::now_v7();

        let _rx1 = presence.register(first, "u1");
        let _rx2 = presence.register(second, "u1");
        let _rx3 = presence.register(Uuid::now_v7(), "u2");
        assert_eq!(presence.online_user_ids(), ["u1", "u2"]);

        presence.unregister(first);
        assert_eq!(presence.online_user_ids(), ["u1", "u2"]);

        presence.unregister(second);
        assert_eq!(presence.online_user_ids(), ["u2"]);
    }

    #[test]
    fn unregister_of_unknown_connection_is_a_noop() {
        let presence = Presence::new();
        let _rx = presence.register(Uuid::now_v7(), "u1");

        presence.unregister(Uuid::now_v7());
        assert_eq!(presence.online_user_ids(), ["u1"]);
    }

    #[test]
    fn send_to_user_reaches_every_tab() {
        let presence = Presence::new();
        let mut rx1 = presence.register(Uuid::now_v7(), "u1");
        let mut rx2 = presence.register(Uuid::now_v7(), "u1");

        presence.send_to_user("u1", ServerEvent::OnlineUsers(vec!["u1".to_owned()]));

        assert!(matches!(rx1.try_recv().unwrap(), ServerEvent::OnlineUsers(_)));
        assert!(matches!(rx2.try_recv().unwrap(), ServerEvent::OnlineUsers(_)));
    }

    #[test]
    fn send_to_offline_user_is_dropped() {
        let presence = Presence::new();
        presence.send_to_user("nobody", ServerEvent::OnlineUsers(vec![]));
    }
}
