// Chat model doubles for unit tests

use anyhow::Result;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{ChatMessage, ChatModel};

/// Replies with a fixed text and records every request
#[derive(Debug, Default)]
pub(crate) struct ScriptedChat {
    reply: String,
    calls: AtomicUsize,
    requests: Mutex<Vec<(Vec<ChatMessage>, Option<f32>)>>,
}

impl ScriptedChat {
    pub(crate) fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_request(&self) -> Option<(Vec<ChatMessage>, Option<f32>)> {
        self.requests
            .lock()
            .expect("request log lock should not be poisoned")
            .last()
            .cloned()
    }
}

impl ChatModel for ScriptedChat {
    fn model(&self) -> &str {
        "scripted"
    }

    fn complete(&self, messages: &[ChatMessage], temperature: Option<f32>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .expect("request log lock should not be poisoned")
            .push((messages.to_vec(), temperature));
        Ok(self.reply.clone())
    }
}

/// Fails every request
#[derive(Debug, Default)]
pub(crate) struct FailingChat {
    calls: AtomicUsize,
}

impl FailingChat {
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ChatModel for FailingChat {
    fn model(&self) -> &str {
        "failing"
    }

    fn complete(&self, _messages: &[ChatMessage], _temperature: Option<f32>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow::anyhow!("upstream unavailable"))
    }
}
