//! Turns source text into a two-host script with a chat-completion model.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::{ChatServiceConfig, VoiceTable};
use crate::error::{ConfigurationError, GenerationError, ServiceError};
use crate::script::{self, Script};

/// Any provider that takes a system instruction and a user message and
/// answers with one text completion.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ServiceError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    n: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Azure OpenAI chat-completions deployment.
pub struct AzureChatClient {
    config: ChatServiceConfig,
    client: reqwest::Client,
}

impl AzureChatClient {
    pub fn new(config: ChatServiceConfig) -> Result<Self, ConfigurationError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.config.endpoint, self.config.deployment, self.config.api_version
        )
    }
}

#[async_trait]
impl TextGenerator for AzureChatClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ServiceError> {
        let body = ChatRequest {
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            n: 1,
        };

        debug!("Sending chat completion request to deployment {}", self.config.deployment);
        let res = self
            .client
            .post(self.url())
            .header("api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = res
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ServiceError::InvalidResponse("completion has no content".to_string()))
    }
}

/// Builds the persona and style instruction for the two hosts.
pub fn system_prompt(voices: &VoiceTable) -> String {
    let a = &voices.inquisitive().name;
    let b = &voices.expert().name;
    format!(
        "You are an expert podcast script writer specializing in creating engaging, upbeat conversations.
Transform the given text into a dynamic discussion between two enthusiastic hosts:

Host Personalities:
- {a}: Energetic, curious, and great at asking insightful questions. Uses conversational language and often relates topics to real-world examples.
- {b}: Knowledgeable, friendly, and excellent at explaining complex ideas simply. Brings enthusiasm and often adds interesting insights.

Conversation Style Requirements:
1. Keep it upbeat and engaging throughout
2. Include natural reactions (\"That's fascinating!\", \"Wow, I hadn't thought of that!\")
3. Use conversational language rather than formal speech
4. Add brief personal touches or relevant anecdotes
5. Include occasional light humor where appropriate
6. Use short, punchy sentences for better audio flow
7. Total word count: about 300 words

Structure:
1. Start with a warm, engaging welcome and topic introduction
2. Main discussion with back-and-forth interaction
3. Include relevant examples or real-world applications
4. End with key takeaways and an upbeat conclusion

Interaction Guidelines:
- Add verbal nods (\"Exactly!\", \"Right!\", \"I see what you mean\")
- Include natural transitions between points
- Use questions to drive the conversation forward
- Alternate turns and balance speaking time between hosts
- Keep segments concise for better listening experience

Output Format:
Write one line per turn as `Name: what they say`, using only the names {a} and {b}.
Do not add stage directions, headings or narration.

Example:
{a}: Hey everyone! I'm super excited about today's topic. {b}, shall we dive in?
{b}: Absolutely, {a}! This is something I think our listeners will find fascinating.

Remember: The conversation should feel like two friends having an exciting discussion over coffee, while being informative and valuable to listeners."
    )
}

pub fn user_prompt(source: &str) -> String {
    format!("Original text to convert into conversation:\n{}", source)
}

/// Asks the text service for a conversation and parses it into a script.
pub struct ConversationGenerator {
    service: Arc<dyn TextGenerator>,
    system_prompt: String,
}

impl ConversationGenerator {
    pub fn new(service: Arc<dyn TextGenerator>, voices: &VoiceTable) -> Self {
        Self {
            service,
            system_prompt: system_prompt(voices),
        }
    }

    /// One outbound call, no retry.
    pub async fn generate(&self, source: &str) -> Result<Script, GenerationError> {
        info!(
            "Requesting conversation script ({} chars of source text)",
            source.chars().count()
        );
        let raw = self
            .service
            .complete(&self.system_prompt, &user_prompt(source))
            .await
            .map_err(|e| {
                error!("Text generation failed: {}", e);
                GenerationError::ServiceUnavailable(e)
            })?;
        debug!("Raw completion preview: {:.200}", raw.replace('\n', " | "));

        let script = script::parse(&raw);
        if script.is_empty() {
            error!("Model output contained no speaker-tagged lines");
            return Err(GenerationError::EmptyScript);
        }
        info!("Parsed script with {} lines", script.len());
        Ok(script)
    }
}
