use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::identity::Identity;

// Client payloads keep every field optional so that malformed events can be
// dropped by the handlers with a warning instead of failing to parse.

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinDocumentMessage {
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub identity: Option<Identity>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUpdateMessage {
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserLeftMessage {
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub identity: Option<Identity>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MentionMessage {
    pub by: String,
    pub mentioned_user: String,
    pub document_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PingMessage {}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PongMessage {
    pub date: String,
}

/// Presence change pushed to a room
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceMessage {
    pub document_id: String,
    pub identity: Identity,
}

/// Full content pushed to a room
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentContentMessage {
    pub document_id: String,
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ReceivedMessage {
    #[serde(rename = "join-document")]
    JoinDocument(JoinDocumentMessage),
    #[serde(rename = "document-update")]
    DocumentUpdate(DocumentUpdateMessage),
    #[serde(rename = "user-left")]
    UserLeft(UserLeftMessage),
    #[serde(rename = "mention")]
    Mention(MentionMessage),
    #[serde(rename = "ping")]
    Ping(PingMessage),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum SendMessage {
    #[serde(rename = "user-joined")]
    UserJoined(PresenceMessage),
    #[serde(rename = "document-update")]
    DocumentUpdate(DocumentContentMessage),
    #[serde(rename = "user-left")]
    UserLeft(PresenceMessage),
    #[serde(rename = "mention")]
    Mention(MentionMessage),
    #[serde(rename = "pong")]
    Pong(PongMessage),
}
