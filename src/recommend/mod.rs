// Recommendation module
// Turns a few search matches into a short natural-language recommendation


use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::catalog::LaptopRecord;
use crate::llm::{ChatMessage, ChatModel};

pub const NO_CANDIDATES_MESSAGE: &str = "Sorry, I couldn't find any laptops matching your request.";
pub const FAILURE_MESSAGE: &str =
    "Oops, there was a problem generating your recommendation. Please try again later.";

const SYSTEM_MESSAGE: &str = "You are a tech expert who helps users choose laptops.";

/// One prompt line per candidate
#[inline]
pub fn candidate_line(record: &LaptopRecord) -> String {
    format!(
        "- {}, {}GB RAM, {}GB {}, {} GPU, €{}, Weight: {}kg",
        record.display_name(),
        record.ram,
        record.primary_storage,
        record.primary_storage_type,
        record.gpu_model,
        record.price,
        record.weight
    )
}

#[inline]
pub fn build_prompt(query: &str, candidates: &[LaptopRecord]) -> String {
    let product_list = candidates
        .iter()
        .map(candidate_line)
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a tech shopping assistant. A user asked: \"{query}\"\n\n\
         Here are the matching laptops:\n{product_list}\n\n\
         Write a helpful natural language recommendation for the user. Focus on the top 2-3 options. \
         Mention highlights like performance, price, portability, or use-case fit (gaming, office, school, etc). \
         Be concise and helpful."
    )
}

/// Writes recommendations through a chat model. Never fails: problems
/// become one of the fixed fallback messages.
#[derive(Clone)]
pub struct RecommendationComposer {
    chat: Arc<dyn ChatModel>,
    temperature: f32,
}

impl RecommendationComposer {
    #[inline]
    pub fn new(chat: Arc<dyn ChatModel>, temperature: f32) -> Self {
        Self { chat, temperature }
    }

    #[inline]
    pub fn compose(&self, query: &str, candidates: &[LaptopRecord]) -> String {
        if candidates.is_empty() {
            warn!("No candidates passed to the recommendation composer");
            return NO_CANDIDATES_MESSAGE.to_string();
        }

        let messages = [
            ChatMessage::system(SYSTEM_MESSAGE),
            ChatMessage::user(build_prompt(query, candidates)),
        ];

        debug!("Requesting recommendation for {} candidates", candidates.len());
        match self.chat.complete(&messages, Some(self.temperature)) {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(_) => {
                error!("Recommendation model returned an empty reply");
                FAILURE_MESSAGE.to_string()
            }
            Err(e) => {
                error!("Recommendation request failed: {:#}", e);
                FAILURE_MESSAGE.to_string()
            }
        }
    }
}
