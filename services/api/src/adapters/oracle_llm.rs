//! services/api/src/adapters/oracle_llm.rs
//!
//! This module contains the adapter for the generative-text oracle.
//! It implements the `TextOracle` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use interview_core::ports::{EngineError, EngineResult, TextOracle};

const SYSTEM_INSTRUCTIONS: &str = "You are the reasoning engine behind a mock technical \
interview product. Follow the instructions in each request exactly. When a request asks \
for JSON, reply with a single JSON object and nothing else.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `TextOracle` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiOracleAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiOracleAdapter {
    /// Creates a new `OpenAiOracleAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// `TextOracle` Trait Implementation
//=========================================================================================

#[async_trait]
impl TextOracle for OpenAiOracleAdapter {
    /// Sends one prompt and returns the raw completion text. The engine owns
    /// all parsing and fallback behavior; this adapter only maps transport
    /// failures into `OracleUnavailable`.
    async fn generate_text(&self, prompt: &str) -> EngineResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| EngineError::OracleUnavailable(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| EngineError::OracleUnavailable(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| EngineError::OracleUnavailable(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| EngineError::OracleUnavailable(e.to_string()))?;

        if let Some(choice) = response.choices.into_iter().next() {
            if let Some(content) = choice.message.content {
                Ok(content)
            } else {
                Err(EngineError::OracleUnavailable(
                    "Oracle response contained no text content.".to_string(),
                ))
            }
        } else {
            Err(EngineError::OracleUnavailable(
                "Oracle returned no choices in its response.".to_string(),
            ))
        }
    }
}
