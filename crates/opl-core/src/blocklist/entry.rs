//! Blocklist entry types

use super::normalize_host;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of labor action an organization is subject to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// Strike
    Strike,
    /// Walkout
    Walkout,
    /// Work slowdown
    Slowdown,
    /// Picket line
    Picket,
    /// Consumer boycott
    Boycott,
    /// Anything the feed labels differently
    #[default]
    #[serde(other)]
    Other,
}

impl ActionType {
    /// Parse from the feed's free-form label
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "strike" => Self::Strike,
            "walkout" | "walk-out" => Self::Walkout,
            "slowdown" | "slow-down" | "work-slowdown" => Self::Slowdown,
            "picket" | "picket-line" | "picketing" => Self::Picket,
            "boycott" => Self::Boycott,
            _ => Self::Other,
        }
    }

    /// Lowercase label
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strike => "strike",
            Self::Walkout => "walkout",
            Self::Slowdown => "slowdown",
            Self::Picket => "picket",
            Self::Boycott => "boycott",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One blocklisted host and the action behind it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlocklistEntry {
    /// Normalized host
    pub host: String,
    /// Organization id
    pub organization_id: String,
    /// Organization display name
    pub organization_name: String,
    /// Kind of action
    pub action_type: ActionType,
    /// Action id
    pub action_id: String,
}

impl BlocklistEntry {
    /// Build an entry from a host or URL, normalizing it.
    ///
    /// Returns `None` when `host_or_url` has no usable host.
    pub fn new(
        host_or_url: &str,
        organization_id: impl Into<String>,
        organization_name: impl Into<String>,
        action_type: ActionType,
        action_id: impl Into<String>,
    ) -> Option<Self> {
        Some(Self {
            host: normalize_host(host_or_url)?,
            organization_id: organization_id.into(),
            organization_name: organization_name.into(),
            action_type,
            action_id: action_id.into(),
        })
    }
}
