//! Process-wide configuration, built once at startup and shared read-only.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

pub const DEFAULT_SILENCE_MS: u32 = 500;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Which persona a host plays in the generated conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostRole {
    /// Energetic, curious, asks the questions.
    Inquisitive,
    /// Knowledgeable, friendly, explains things simply.
    Expert,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostProfile {
    pub name: String,
    pub voice: String,
    pub role: HostRole,
}

/// Speaker name to voice identity, exactly one entry per host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceTable {
    inquisitive: HostProfile,
    expert: HostProfile,
}

impl VoiceTable {
    pub fn new(
        inquisitive_name: impl Into<String>,
        inquisitive_voice: impl Into<String>,
        expert_name: impl Into<String>,
        expert_voice: impl Into<String>,
    ) -> Result<Self, ConfigurationError> {
        let inquisitive = HostProfile {
            name: inquisitive_name.into().trim().to_string(),
            voice: inquisitive_voice.into().trim().to_string(),
            role: HostRole::Inquisitive,
        };
        let expert = HostProfile {
            name: expert_name.into().trim().to_string(),
            voice: expert_voice.into().trim().to_string(),
            role: HostRole::Expert,
        };
        for host in [&inquisitive, &expert] {
            if host.name.is_empty() || host.name.contains(':') {
                return Err(ConfigurationError::InvalidValue {
                    name: "host name".to_string(),
                    reason: format!("'{}' must be non-empty and contain no ':'", host.name),
                });
            }
            if host.voice.is_empty() {
                return Err(ConfigurationError::InvalidValue {
                    name: format!("voice for {}", host.name),
                    reason: "must be non-empty".to_string(),
                });
            }
        }
        if inquisitive.name == expert.name {
            return Err(ConfigurationError::InvalidValue {
                name: "host name".to_string(),
                reason: format!("both hosts are named '{}'", expert.name),
            });
        }
        Ok(Self {
            inquisitive,
            expert,
        })
    }

    pub fn voice_for(&self, speaker: &str) -> Option<&str> {
        self.hosts()
            .into_iter()
            .find(|h| h.name == speaker)
            .map(|h| h.voice.as_str())
    }

    pub fn inquisitive(&self) -> &HostProfile {
        &self.inquisitive
    }

    pub fn expert(&self) -> &HostProfile {
        &self.expert
    }

    pub fn hosts(&self) -> [&HostProfile; 2] {
        [&self.inquisitive, &self.expert]
    }
}

impl Default for VoiceTable {
    fn default() -> Self {
        Self {
            inquisitive: HostProfile {
                name: "Alex".to_string(),
                voice: "en-US-GuyNeural".to_string(),
                role: HostRole::Inquisitive,
            },
            expert: HostProfile {
                name: "Sarah".to_string(),
                voice: "en-US-JennyNeural".to_string(),
                role: HostRole::Expert,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatServiceConfig {
    pub api_key: String,
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SpeechServiceConfig {
    pub api_key: String,
    pub region: String,
    /// Overrides the region-derived endpoint when set.
    pub endpoint: Option<String>,
    pub output_format: String,
    pub timeout: Duration,
}

impl SpeechServiceConfig {
    pub fn endpoint(&self) -> String {
        match &self.endpoint {
            Some(e) => e.trim_end_matches('/').to_string(),
            None => format!("https://{}.tts.speech.microsoft.com", self.region),
        }
    }
}

/// Knobs for a single pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub silence_ms: u32,
    /// Upper bound on concurrent synthesis calls; 1 keeps them sequential.
    pub synthesis_workers: usize,
    /// Pause after each synthesis call to go easy on the backend.
    pub request_delay: Duration,
    pub temp_root: PathBuf,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            silence_ms: DEFAULT_SILENCE_MS,
            synthesis_workers: 1,
            request_delay: Duration::from_millis(100),
            temp_root: PathBuf::from("temp"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub chat: ChatServiceConfig,
    pub speech: SpeechServiceConfig,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds settings from an arbitrary variable source, reporting every
    /// missing required variable at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        const REQUIRED: [&str; 6] = [
            "AZURE_OPENAI_KEY",
            "AZURE_OPENAI_ENDPOINT",
            "AZURE_OPENAI_DEPLOYMENT",
            "AZURE_OPENAI_API_VERSION",
            "AZURE_SPEECH_KEY",
            "AZURE_SPEECH_REGION",
        ];

        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let missing: Vec<String> = REQUIRED
            .into_iter()
            .filter(|&name| get(name).is_none())
            .map(String::from)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigurationError::MissingVariables(missing));
        }
        let required = |name: &str| get(name).unwrap_or_default();

        Ok(Self {
            chat: ChatServiceConfig {
                api_key: required("AZURE_OPENAI_KEY"),
                endpoint: required("AZURE_OPENAI_ENDPOINT")
                    .trim_end_matches('/')
                    .to_string(),
                deployment: required("AZURE_OPENAI_DEPLOYMENT"),
                api_version: required("AZURE_OPENAI_API_VERSION"),
                temperature: 0.7,
                max_tokens: 1000,
                timeout: DEFAULT_REQUEST_TIMEOUT,
            },
            speech: SpeechServiceConfig {
                api_key: required("AZURE_SPEECH_KEY"),
                region: required("AZURE_SPEECH_REGION"),
                endpoint: get("AZURE_SPEECH_ENDPOINT"),
                output_format: "riff-24khz-16bit-mono-pcm".to_string(),
                timeout: DEFAULT_REQUEST_TIMEOUT,
            },
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.chat.timeout = timeout;
        self.speech.timeout = timeout;
        self
    }
}
