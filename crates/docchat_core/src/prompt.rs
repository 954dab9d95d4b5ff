//! crates/docchat_core/src/prompt.rs
//!
//! Builds the prompt sent to the external language model from the retrieved
//! document context, recent conversation and the user's question.

use crate::domain::{Message, ScoredChunk};
use std::collections::BTreeSet;

const SYSTEM_INSTRUCTIONS: &str = r#"You are a knowledgeable medical assistant that helps people understand medical reports, lab results and symptoms.

How to answer:
- When DOCUMENT CONTEXT is provided, ground your answer in it and mention which source a finding comes from.
- Interpret lab values, findings and symptoms the way an experienced clinician would, in clear and structured language.
- If the context is incomplete or does not cover the question, say so plainly, then give general guidance based on accepted medical practice.
- Use the recent conversation to resolve follow-up questions.

Always end your reply by reminding the user that your answer is for informational purposes only and does not replace professional medical advice, diagnosis or treatment, and encourage them to consult a licensed healthcare professional."#;

const WITH_CONTEXT_INSTRUCTION: &str = "Answer the question using the document context above where it is relevant. If the context does not contain the answer, provide general medical guidance and recommend consulting healthcare professionals.";

const WITHOUT_CONTEXT_INSTRUCTION: &str = "No document context is available for this question. Provide general medical guidance and recommend consulting healthcare professionals.";

/// Limits applied while assembling a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptConfig {
    /// How many of the most recent exchanges are offered to the model.
    pub history_turns: usize,
    /// Upper bound on the prompt length in characters, system instructions included.
    pub max_prompt_chars: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            history_turns: 5,
            max_prompt_chars: 24_000,
        }
    }
}

/// A prompt split into the system instructions and the user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    /// Total length in characters.
    pub fn char_len(&self) -> usize {
        self.system.chars().count() + self.user.chars().count()
    }
}

/// The assembled prompt plus what ended up inside it.
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    pub prompt: Prompt,
    /// Retrieved chunks that survived truncation, highest score first.
    pub chunks: Vec<ScoredChunk>,
    pub history_turns: usize,
}

impl AssembledPrompt {
    pub fn context_used(&self) -> bool {
        !self.chunks.is_empty()
    }

    /// Distinct documents whose chunks are in the prompt, in ascending id order.
    pub fn source_document_ids(&self) -> Vec<i64> {
        self.chunks
            .iter()
            .map(|c| c.document_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PromptAssembler {
    config: PromptConfig,
}

impl PromptAssembler {
    pub fn new(config: PromptConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PromptConfig {
        &self.config
    }

    /// Assembles the prompt for `question`.
    ///
    /// `history` is chronological; only the last `history_turns` exchanges are
    /// considered. When the prompt exceeds `max_prompt_chars`, the oldest history
    /// turns are dropped first, then the lowest scoring chunks. The question itself
    /// is never shortened, so an oversized question still yields a prompt.
    pub fn assemble(
        &self,
        question: &str,
        chunks: &[ScoredChunk],
        history: &[Message],
    ) -> AssembledPrompt {
        let skip = history.len().saturating_sub(self.config.history_turns);
        let mut history: Vec<&Message> = history.iter().skip(skip).collect();

        let mut chunks: Vec<ScoredChunk> = chunks.to_vec();
        chunks.sort_by(|a, b| b.score.total_cmp(&a.score));

        loop {
            let prompt = render(question, &chunks, &history);
            let within_budget = prompt.char_len() <= self.config.max_prompt_chars;
            if within_budget || (history.is_empty() && chunks.is_empty()) {
                return AssembledPrompt {
                    prompt,
                    history_turns: history.len(),
                    chunks,
                };
            }
            if !history.is_empty() {
                history.remove(0);
            } else {
                chunks.pop();
            }
        }
    }
}

fn render(question: &str, chunks: &[ScoredChunk], history: &[&Message]) -> Prompt {
    let mut user = String::new();

    if !chunks.is_empty() {
        user.push_str("DOCUMENT CONTEXT (relevant excerpts from the uploaded documents):\n");
        for chunk in chunks {
            user.push_str(&format!(
                "\n[Source: {} (document {}), excerpt {}]\n{}\n",
                chunk.document_name, chunk.document_id, chunk.chunk_index, chunk.text
            ));
        }
        user.push('\n');
    }

    if !history.is_empty() {
        user.push_str("RECENT CONVERSATION:\n");
        for message in history {
            user.push_str(&format!(
                "User: {}\nAssistant: {}\n",
                message.user_message, message.bot_response
            ));
        }
        user.push('\n');
    }

    user.push_str("CURRENT QUESTION:\n");
    user.push_str(question);
    user.push_str("\n\n");
    user.push_str(if chunks.is_empty() {
        WITHOUT_CONTEXT_INSTRUCTION
    } else {
        WITH_CONTEXT_INSTRUCTION
    });

    Prompt {
        system: SYSTEM_INSTRUCTIONS.to_string(),
        user,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn chunk(document_id: i64, chunk_index: usize, score: f32, text: &str) -> ScoredChunk {
        ScoredChunk {
            chunk_id: document_id * 100 + chunk_index as i64,
            document_id,
            document_name: format!("report{document_id}.pdf"),
            chunk_index,
            text: text.to_string(),
            score,
        }
    }

    fn message(n: usize) -> Message {
        Message {
            id: n as i64,
            session_id: Uuid::nil(),
            user_message: format!("question {n}"),
            bot_response: format!("answer {n}"),
            timestamp: Utc::now(),
            response_time_ms: 10,
            context_used: false,
            sources_count: 0,
            relevant_document_ids: Vec::new(),
        }
    }

    #[test]
    fn without_context_omits_the_context_section() {
        let assembled = PromptAssembler::default().assemble("What is a normal HbA1c?", &[], &[]);

        assert!(!assembled.context_used());
        assert!(assembled.source_document_ids().is_empty());
        assert!(!assembled.prompt.user.contains("DOCUMENT CONTEXT"));
        assert!(assembled.prompt.user.contains("What is a normal HbA1c?"));
        assert!(assembled.prompt.user.contains(WITHOUT_CONTEXT_INSTRUCTION));
        assert!(assembled.prompt.system.contains("informational purposes only"));
    }

    #[test]
    fn context_chunks_are_tagged_with_their_source() {
        let chunks = vec![
            chunk(1, 0, 0.9, "LDL 130 mg/dL"),
            chunk(2, 3, 0.5, "BP 140/90"),
            chunk(1, 1, 0.4, "HDL 45 mg/dL"),
        ];
        let assembled = PromptAssembler::default().assemble("Is my LDL high?", &chunks, &[]);

        assert!(assembled.context_used());
        assert_eq!(assembled.source_document_ids(), vec![1, 2]);
        let user = &assembled.prompt.user;
        assert!(user.contains("[Source: report1.pdf (document 1), excerpt 0]\nLDL 130 mg/dL"));
        assert!(user.contains("[Source: report2.pdf (document 2), excerpt 3]\nBP 140/90"));
        assert!(user.find("LDL 130").unwrap() < user.find("BP 140/90").unwrap());
        assert!(user.contains(WITH_CONTEXT_INSTRUCTION));
    }

    #[test]
    fn only_the_most_recent_history_turns_are_included() {
        let history: Vec<Message> = (1..=8).map(message).collect();
        let assembler = PromptAssembler::new(PromptConfig {
            history_turns: 3,
            max_prompt_chars: 100_000,
        });
        let assembled = assembler.assemble("next?", &[], &history);

        assert_eq!(assembled.history_turns, 3);
        let user = &assembled.prompt.user;
        assert!(!user.contains("question 5"));
        assert!(user.contains("question 6"));
        assert!(user.find("question 6").unwrap() < user.find("question 8").unwrap());
    }

    #[test]
    fn truncation_drops_oldest_history_before_any_chunk() {
        let history: Vec<Message> = (1..=3).map(message).collect();
        let chunks = vec![chunk(1, 0, 0.9, "alpha"), chunk(1, 1, 0.2, "omega")];
        let unbounded = PromptAssembler::new(PromptConfig {
            history_turns: 5,
            max_prompt_chars: usize::MAX,
        })
        .assemble("q", &chunks, &history);
        let without_history = PromptAssembler::new(PromptConfig {
            history_turns: 0,
            max_prompt_chars: usize::MAX,
        })
        .assemble("q", &chunks, &history);

        // Room for everything except one history turn.
        let budget = unbounded.prompt.char_len() - 1;
        let assembled = PromptAssembler::new(PromptConfig {
            history_turns: 5,
            max_prompt_chars: budget,
        })
        .assemble("q", &chunks, &history);
        assert_eq!(assembled.history_turns, 2);
        assert_eq!(assembled.chunks.len(), 2);
        assert!(!assembled.prompt.user.contains("question 1"));
        assert!(assembled.prompt.user.contains("question 3"));

        // Room for the chunks only.
        let assembled = PromptAssembler::new(PromptConfig {
            history_turns: 5,
            max_prompt_chars: without_history.prompt.char_len(),
        })
        .assemble("q", &chunks, &history);
        assert_eq!(assembled.history_turns, 0);
        assert_eq!(assembled.chunks.len(), 2);
    }

    #[test]
    fn truncation_drops_lowest_similarity_chunks_after_history() {
        let chunks = vec![chunk(1, 1, 0.2, "low"), chunk(1, 0, 0.9, "high")];
        let full = PromptAssembler::default().assemble("q", &chunks, &[]);
        let assembled = PromptAssembler::new(PromptConfig {
            history_turns: 5,
            max_prompt_chars: full.prompt.char_len() - 1,
        })
        .assemble("q", &chunks, &[message(1)]);

        assert_eq!(assembled.history_turns, 0);
        assert_eq!(assembled.chunks.len(), 1);
        assert_eq!(assembled.chunks[0].text, "high");
    }

    #[test]
    fn question_is_never_truncated() {
        let question = "why ".repeat(500);
        let assembled = PromptAssembler::new(PromptConfig {
            history_turns: 5,
            max_prompt_chars: 10,
        })
        .assemble(&question, &[chunk(1, 0, 0.9, "ctx")], &[message(1)]);

        assert!(!assembled.context_used());
        assert_eq!(assembled.history_turns, 0);
        assert!(assembled.prompt.user.contains(&question));
    }
}
