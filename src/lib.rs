//! Turns a block of text into a two-host podcast conversation: a chat model
//! writes the script, a speech service voices each line, and the lines are
//! stitched into one WAV file with short pauses in between.

pub mod audio;
pub mod config;
pub mod error;
pub mod generator;
pub mod pipeline;
pub mod script;
pub mod tts;

pub use audio::{AudioAssembler, AudioSegment, wav_duration_seconds};
pub use config::{HostProfile, HostRole, PipelineOptions, Settings, VoiceTable};
pub use error::{
    AssemblyError, ConfigurationError, GenerationError, PipelineError, ServiceError,
    SynthesisError,
};
pub use generator::{AzureChatClient, ConversationGenerator, TextGenerator};
pub use pipeline::{ConversationPipeline, ConversationResult, default_output_path};
pub use script::{Script, ScriptLine};
pub use tts::{AzureSpeechClient, SpeechService, VoiceSynthesizer};
