use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

use super::identity::Identity;

/// Page wide access mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Read,
    #[default]
    Write,
}

impl AccessMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "read" => Some(AccessMode::Read),
            "write" => Some(AccessMode::Write),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::Read => "read",
            AccessMode::Write => "write",
        }
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Someone who touched the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl From<&Identity> for AccessGrant {
    fn from(identity: &Identity) -> Self {
        Self {
            user_name: identity.name.clone(),
            avatar_url: identity.avatar.clone(),
        }
    }
}

/// A collaborative page.
///
/// The content is an opaque rich-text tree. It is only ever replaced as a
/// whole, never merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub title: String,
    pub author_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[schema(value_type = Object)]
    pub content: Value,
    #[serde(default)]
    pub access: AccessMode,
    #[serde(default)]
    pub access_list: Vec<AccessGrant>,
    #[serde(default = "default_true")]
    pub is_published: bool,
    #[serde(default)]
    pub is_standalone: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub breadcrumbs: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl Document {
    /// Create an empty page owned by `author`.
    pub fn new(id: impl Into<String>, title: impl Into<String>, author: &Identity) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            author_id: author.name.clone(),
            project_id: None,
            content: Self::empty_content(),
            access: AccessMode::Write,
            access_list: vec![AccessGrant::from(author)],
            is_published: true,
            is_standalone: false,
            tags: Vec::new(),
            breadcrumbs: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The content a freshly created page starts with
    pub fn empty_content() -> Value {
        json!({
            "type": "doc",
            "content": [
                { "type": "paragraph", "content": [{ "type": "text", "text": "" }] }
            ]
        })
    }

    /// Writers are everyone when the page is open for writing, otherwise only the author.
    pub fn can_write(&self, identity: &Identity) -> bool {
        self.access == AccessMode::Write || self.author_id == identity.name
    }

    /// Add the identity to the access list unless it is already there.
    /// Returns true when the list changed.
    pub fn record_grant(&mut self, identity: &Identity) -> bool {
        if !identity.has_name() || self.access_list.iter().any(|g| g.user_name == identity.name) {
            return false;
        }
        self.access_list.push(AccessGrant::from(identity));
        true
    }

    /// Swap the content wholesale.
    pub fn replace_content(&mut self, content: Value, editor: Option<&Identity>) {
        self.content = content;
        if let Some(editor) = editor {
            self.record_grant(editor);
        }
        self.updated_at = Utc::now();
    }
}

/// An immutable snapshot in the append-only version log of a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentVersion {
    pub id: Uuid,
    pub page_id: String,
    #[schema(value_type = Object)]
    pub content: Value,
    pub edited_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DocumentVersion {
    pub fn new(page_id: impl Into<String>, content: Value, editor: &Identity) -> Self {
        Self {
            id: Uuid::new_v4(),
            page_id: page_id.into(),
            content,
            edited_by: editor.name.clone(),
            avatar_url: editor.avatar.clone(),
            created_at: Utc::now(),
        }
    }
}
