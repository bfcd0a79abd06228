//! Request types shared across the broker.

use serde::{Deserialize, Serialize};

/// Role of a message segment in a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

impl Role {
    /// Stable tag used when canonicalizing a request for hashing.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

/// One role-tagged segment of a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSegment {
    pub role: Role,
    pub content: String,
}

impl MessageSegment {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// Which of the two backend model tiers a request targets.
///
/// The tier is part of the cache key so a light-model answer is never
/// served for a heavy-model request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Light,
    Heavy,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Light => "light",
            ModelTier::Heavy => "heavy",
        }
    }
}

/// A request submitted to the broker. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Ordered prompt segments.
    pub messages: Vec<MessageSegment>,

    /// Backend model tier to invoke.
    pub tier: ModelTier,

    /// Priority requests bypass the batch queue and are paced directly.
    pub priority: bool,
}

impl ChatRequest {
    pub fn new(messages: Vec<MessageSegment>, tier: ModelTier, priority: bool) -> Self {
        Self { messages, tier, priority }
    }

    /// A request requiring an immediate, synchronous answer.
    pub fn priority(messages: Vec<MessageSegment>, tier: ModelTier) -> Self {
        Self::new(messages, tier, true)
    }

    /// A request that may be deferred to the next batch flush.
    pub fn background(messages: Vec<MessageSegment>, tier: ModelTier) -> Self {
        Self::new(messages, tier, false)
    }

    /// Convenience constructor for the common system + user prompt pair.
    pub fn prompt(system: impl Into<String>, user: impl Into<String>, tier: ModelTier) -> Self {
        Self::priority(
            vec![MessageSegment::system(system), MessageSegment::user(user)],
            tier,
        )
    }

    /// First user-authored segment, falling back to the first segment of
    /// any role. This is what the fallback responder keys off.
    pub fn first_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::User)
            .or_else(|| self.messages.first())
            .map(|m| m.content.as_str())
    }
}
