use serde::{Deserialize, Serialize};

use crate::{conversations::Message, profiles::Profile};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    RequestThread { peer_id: String },
    SendMessage(SendMessage),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    PeerProfile(Option<Profile>),
    Thread(Vec<Message>),
    OnlineUsers(Vec<String>),
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessage {
    pub sender_id: String,
    pub receiver_id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_go_over_the_wire_in_kebab_case() {
        let roster = serde_json::to_value(ServerEvent::OnlineUsers(vec!["u1".to_owned()])).unwrap();
        assert_eq!(roster["event"], "online-users");
        assert_eq!(roster["data"][0], "u1");

        let parsed: ClientEvent =
            serde_json::from_str(r#"{"event":"request-thread","data":{"peer_id":"u2"}}"#).unwrap();
        assert!(matches!(parsed, ClientEvent::RequestThread { peer_id } if peer_id == "u2"));
    }

    #[test]
    fn send_message_media_fields_are_optional() {
        let parsed: ClientEvent = serde_json::from_str(
            r#"{"event":"send-message","data":{"sender_id":"u1","receiver_id":"u2","text":"hi"}}"#,
        )
        .unwrap();

        let ClientEvent::SendMessage(msg) = parsed else {
            panic!("expected send-message");
        };
        assert_eq!(msg.text.as_deref(), Some("hi"));
        assert_eq!(msg.image_url, None);
        assert_eq!(msg.video_url, None);
    }
}
