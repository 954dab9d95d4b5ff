//! services/api/src/adapters/chat_llm.rs
//!
//! This module contains the adapter for the answer-generating LLM.
//! It implements the `GenerationService` port from the `core` crate against any
//! OpenAI-compatible chat completions endpoint (OpenAI, Groq, ...).

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use docchat_core::{
    ports::{GenerationService, PortError, PortResult},
    prompt::Prompt,
};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `GenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiChatAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChatAdapter {
    /// Creates a new `OpenAiChatAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self {
            client,
            model,
            temperature: 0.3,
            max_tokens: 1000,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }
}

fn unavailable(e: impl ToString) -> PortError {
    PortError::LlmUnavailable(e.to_string())
}

//=========================================================================================
// `GenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl GenerationService for OpenAiChatAdapter {
    /// Sends the system instructions and the assembled user turn as one completion request.
    async fn generate(&self, prompt: &Prompt) -> PortResult<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(prompt.system.as_str())
                .build()
                .map_err(unavailable)?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.user.as_str())
                .build()
                .map_err(unavailable)?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .n(1)
            .build()
            .map_err(unavailable)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| unavailable(e))?;

        // Extract the text content from the first choice in the response.
        let reply = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| unavailable("the model returned no text content"))?;

        let reply = reply.trim();
        if reply.is_empty() {
            return Err(unavailable("the model returned an empty reply"));
        }
        Ok(reply.to_string())
    }
}
