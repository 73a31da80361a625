use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The caller identity as supplied by the identity provider.
///
/// An identity with an empty name is anonymous: it can hold a connection
/// but cannot join a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Identity {
    pub fn new(name: impl Into<String>, avatar: Option<String>) -> Self {
        Self {
            name: name.into(),
            avatar,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, None)
    }

    pub fn has_name(&self) -> bool {
        !self.name.trim().is_empty()
    }
}
