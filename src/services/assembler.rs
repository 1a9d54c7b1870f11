//! Context assembler.
//!
//! Merges task inputs, retrieved chunks and prior-task memory into one
//! prompt context with a deterministic concatenation policy: task
//! description first, then retrieved chunks in score order labeled with
//! provenance, then memory snippets, then output-format instructions.
//! When the combined context would exceed the character budget, low
//! priority sections are truncated first: memory before retrieved chunks
//! before the task description, which is never truncated.

use tracing::debug;

use crate::domain::models::RetrievalResult;

/// Approximate characters per token (conservative heuristic).
const CHARS_PER_TOKEN: usize = 4;

/// Assembled prompt context for one agent task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    /// System prompt: role, goal, backstory.
    pub system: String,
    /// User prompt: task, knowledge, memory, format instructions.
    pub user: String,
}

/// Estimate tokens with the chars/token heuristic.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(CHARS_PER_TOKEN)
}

/// Inputs for one assembly.
#[derive(Debug, Clone, Default)]
pub struct AssemblyInput {
    /// Task description. Never truncated.
    pub task_description: String,
    /// Expected-output contract, rendered as format instructions.
    pub expected_output: String,
    /// Retrieved knowledge, already score-ordered.
    pub retrieval: RetrievalResult,
    /// Prior-task outputs and conversational memory, most relevant first.
    pub memory_snippets: Vec<String>,
}

/// Deterministic prompt assembly with priority-ordered truncation.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    /// Character budget for the assembled user prompt.
    budget_chars: usize,
}

impl ContextAssembler {
    pub fn new(budget_chars: usize) -> Self {
        Self { budget_chars: budget_chars.max(1) }
    }

    /// Assemble a system prompt from an agent's identity fields.
    pub fn system_prompt(role: &str, goal: &str, backstory: &str) -> String {
        let mut out = format!("You are {role}.\nYour goal: {goal}");
        if !backstory.trim().is_empty() {
            out.push_str("\nBackground: ");
            out.push_str(backstory.trim());
        }
        out
    }

    /// Assemble the user prompt under the configured budget.
    pub fn assemble(&self, input: &AssemblyInput) -> PromptContext {
        let task_section = format!("# Task\n{}", input.task_description.trim());

        let format_section = if input.expected_output.trim().is_empty() {
            String::new()
        } else {
            format!("# Expected output\n{}", input.expected_output.trim())
        };

        let mut knowledge_section = String::new();
        if !input.retrieval.is_empty() {
            knowledge_section.push_str("# Retrieved knowledge\n");
            for hit in &input.retrieval.hits {
                knowledge_section.push_str(&format!(
                    "[source: {} #{} | score {:.3}]\n{}\n\n",
                    hit.chunk.document_id, hit.chunk.sequence_index, hit.score, hit.chunk.text
                ));
            }
        }

        let mut memory_section = String::new();
        if !input.memory_snippets.is_empty() {
            memory_section.push_str("# Context from earlier work\n");
            for snippet in &input.memory_snippets {
                memory_section.push_str(snippet.trim());
                memory_section.push_str("\n\n");
            }
        }

        // Task and format instructions are reserved off the top; memory
        // yields before knowledge when the rest does not fit.
        let reserved = task_section.len() + format_section.len() + 8;
        let remaining = self.budget_chars.saturating_sub(reserved);

        let knowledge_section = truncate_to(&knowledge_section, remaining);
        let remaining = remaining.saturating_sub(knowledge_section.len());
        let memory_section = truncate_to(&memory_section, remaining);

        let mut user = task_section;
        for section in [knowledge_section, memory_section, format_section] {
            if !section.is_empty() {
                user.push_str("\n\n");
                user.push_str(&section);
            }
        }

        debug!(
            chars = user.len(),
            estimated_tokens = estimate_tokens(&user),
            budget_chars = self.budget_chars,
            "assembled prompt context"
        );
        PromptContext { system: String::new(), user }
    }
}

/// Cut text to `max_chars`, preferring the last newline before the limit.
/// Returns empty when the limit leaves no useful content.
fn truncate_to(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }
    if max_chars < 40 {
        return String::new();
    }
    let mut cut = max_chars;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let cut = text[..cut].rfind('\n').unwrap_or(cut);
    let mut out = text[..cut].to_string();
    out.push_str("\n[truncated]");
    out
}
