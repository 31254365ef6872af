// Language model module
// Chat completion access for intent extraction and recommendations

pub mod client;

#[cfg(test)]
pub(crate) mod fakes;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use client::ChatClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A single-turn chat completion backend
pub trait ChatModel: Send + Sync {
    fn model(&self) -> &str;

    /// Send `messages` and return the assistant's reply text.
    ///
    /// `temperature` of `None` leaves sampling at the backend default.
    fn complete(&self, messages: &[ChatMessage], temperature: Option<f32>) -> Result<String>;
}
