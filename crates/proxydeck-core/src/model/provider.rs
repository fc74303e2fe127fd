// ── Upstream providers ──
//
// The closed set of vendors the proxy can route to. Every per-provider
// map in the crate is keyed by this enum.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

/// An upstream model vendor.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Provider {
    Claude,
    OpenAi,
    Gemini,
    Qwen,
    IFlow,
    Vertex,
    Antigravity,
}

/// How a provider gets linked to the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    #[strum(to_string = "oauth")]
    OAuth,
    #[strum(to_string = "import")]
    Import,
}

impl Provider {
    pub const ALL: [Self; 7] = [
        Self::Claude,
        Self::OpenAi,
        Self::Gemini,
        Self::Qwen,
        Self::IFlow,
        Self::Vertex,
        Self::Antigravity,
    ];

    /// Vertex is linked by importing a service-account file; everything
    /// else goes through the browser OAuth handshake.
    pub fn connection_kind(self) -> ConnectionKind {
        match self {
            Self::Vertex => ConnectionKind::Import,
            _ => ConnectionKind::OAuth,
        }
    }

    /// Human-facing label.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Claude => "Claude",
            Self::OpenAi => "ChatGPT",
            Self::Gemini => "Gemini",
            Self::Qwen => "Qwen",
            Self::IFlow => "iFlow",
            Self::Vertex => "Vertex AI",
            Self::Antigravity => "Antigravity",
        }
    }
}
