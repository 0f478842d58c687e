//! Prompt composition for grounded, multi-turn answering.

use crate::conversation::HistoryPair;
use crate::document::SearchResult;

/// Instruction placed at the top of every prompt.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions about \
the user's uploaded documents. Use only the provided context. If the context does not \
contain the answer, say that you don't know.";

/// Line rendered in place of the context block when retrieval found nothing.
pub const NO_CONTEXT: &str = "No relevant context was found in the uploaded documents.";

const CLOSING_INSTRUCTION: &str = "Answer based only on the context. If the answer is not in \
the context, say you don't know.";

/// Render retrieved chunks as numbered, source-tagged entries in rank order.
///
/// The block never exceeds `max_chars` characters: the entry that crosses the
/// budget is cut short and any later entries are left out.
pub fn render_context(results: &[SearchResult], max_chars: usize) -> String {
    if results.is_empty() {
        return NO_CONTEXT.to_string();
    }

    let mut block = String::new();
    let mut used = 0;
    for (i, result) in results.iter().enumerate() {
        let separator = if i == 0 { "" } else { "\n\n" };
        let entry = format!(
            "{separator}[{}] (source={}, page={})\n{}",
            i + 1,
            result.chunk.source,
            result.chunk.page,
            result.chunk.text
        );
        let entry_chars = entry.chars().count();
        if used + entry_chars <= max_chars {
            block.push_str(&entry);
            used += entry_chars;
            continue;
        }
        block.extend(entry.chars().take(max_chars - used));
        break;
    }
    block
}

/// Render history pairs in chronological order.
pub fn render_history(history: &[HistoryPair]) -> String {
    history
        .iter()
        .map(|pair| format!("User: {}\nAssistant: {}", pair.user, pair.assistant))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compose the single prompt sent to the generator.
pub fn compose_prompt(question: &str, context: &str, history: &str) -> String {
    format!(
        "{SYSTEM_PROMPT}\n\nContext:\n{context}\n\nConversation so far:\n{history}\n\n\
User question: {question}\n\n{CLOSING_INSTRUCTION}"
    )
}
