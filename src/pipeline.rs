//! Text in, one assembled two-host WAV out.

use std::any::Any;
use std::fs;
use std::io;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use futures::{FutureExt, StreamExt, stream};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use xxhash_rust::xxh3::xxh3_64;

use crate::audio::AudioAssembler;
use crate::config::{PipelineOptions, Settings, VoiceTable};
use crate::error::{ConfigurationError, PipelineError, SynthesisError};
use crate::generator::{AzureChatClient, ConversationGenerator, TextGenerator};
use crate::script::Script;
use crate::tts::{AzureSpeechClient, SpeechService, VoiceSynthesizer};

pub const EMPTY_INPUT_MESSAGE: &str = "Please enter some text to convert";
pub const SUCCESS_MESSAGE: &str = "Conversation generated successfully";

/// Outcome reported to callers. Either a path and a success message, or no
/// path and the reason the run failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationResult {
    pub success: bool,
    pub output_path: Option<PathBuf>,
    pub message: String,
}

impl ConversationResult {
    pub fn succeeded(path: PathBuf) -> Self {
        Self {
            success: true,
            output_path: Some(path),
            message: SUCCESS_MESSAGE.to_string(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output_path: None,
            message: message.into(),
        }
    }
}

/// Output file name derived from the source text, so that the same text maps
/// to the same file.
pub fn default_output_path(output_dir: &Path, source: &str) -> PathBuf {
    output_dir.join(format!("podcast_conversation_{:016x}.wav", xxh3_64(source.as_bytes())))
}

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]+").unwrap());

const WORKSPACE_ATTEMPTS: usize = 10;

/// Per-run scratch directory under the temp root. Whatever is left of it is
/// removed on drop, on every exit path.
struct RunWorkspace {
    root: PathBuf,
    dir: PathBuf,
}

impl RunWorkspace {
    fn create(root: &Path) -> Result<Self, PipelineError> {
        let dir = root.join(format!("run-{}", Uuid::new_v4().simple()));
        let mut attempt = 1;
        loop {
            match fs::create_dir_all(&dir) {
                Ok(()) => break,
                // Another run's drop can remove the empty root between the
                // root and run directory mkdirs.
                Err(e) if e.kind() == io::ErrorKind::NotFound && attempt < WORKSPACE_ATTEMPTS => {
                    debug!(
                        "Temp root vanished while creating {} (attempt {}); retrying",
                        dir.display(),
                        attempt
                    );
                    attempt += 1;
                }
                Err(source) => return Err(PipelineError::Workspace { path: dir, source }),
            }
        }
        debug!("Created temporary directory {}", dir.display());
        Ok(Self {
            root: root.to_path_buf(),
            dir,
        })
    }

    fn segment_path(&self, index: usize, speaker: &str) -> PathBuf {
        let speaker = UNSAFE_FILENAME_CHARS.replace_all(speaker, "_");
        self.dir.join(format!("segment_{:03}_{}.wav", index, speaker))
    }
}

impl Drop for RunWorkspace {
    fn drop(&mut self) {
        if self.dir.exists() {
            if let Err(e) = fs::remove_dir_all(&self.dir) {
                warn!("Failed to remove temporary directory {}: {}", self.dir.display(), e);
            }
        }
        if let Err(e) = fs::remove_dir(&self.root) {
            debug!("Leaving temp root {} in place: {}", self.root.display(), e);
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unexpected panic".to_string()
    }
}

/// Generator, synthesizer and assembler wired together for one kind of
/// request. Holds no per-request state, so one instance can serve many runs.
pub struct ConversationPipeline {
    generator: ConversationGenerator,
    synthesizer: VoiceSynthesizer,
    assembler: AudioAssembler,
    options: PipelineOptions,
}

impl ConversationPipeline {
    pub fn new(
        text: Arc<dyn TextGenerator>,
        speech: Arc<dyn SpeechService>,
        voices: Arc<VoiceTable>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            generator: ConversationGenerator::new(text, &voices),
            synthesizer: VoiceSynthesizer::new(speech, voices),
            assembler: AudioAssembler::new(options.silence_ms),
            options,
        }
    }

    /// Wires the Azure chat and speech clients from `settings`.
    pub fn from_settings(
        settings: &Settings,
        voices: VoiceTable,
        options: PipelineOptions,
    ) -> Result<Self, ConfigurationError> {
        let text = Arc::new(AzureChatClient::new(settings.chat.clone())?);
        let speech = Arc::new(AzureSpeechClient::new(settings.speech.clone())?);
        Ok(Self::new(text, speech, Arc::new(voices), options))
    }

    /// Runs the whole pipeline. Never fails: every error, and any panic along
    /// the way, comes back as an unsuccessful [`ConversationResult`].
    pub async fn run(&self, source: &str, output: &Path) -> ConversationResult {
        if source.trim().is_empty() {
            warn!("Rejecting empty source text");
            return ConversationResult::failed(EMPTY_INPUT_MESSAGE);
        }

        match AssertUnwindSafe(self.try_run(source, output))
            .catch_unwind()
            .await
        {
            Ok(Ok(path)) => {
                info!("Conversation written to {}", path.display());
                ConversationResult::succeeded(path)
            }
            Ok(Err(e)) => {
                error!("Pipeline failed: {}", e);
                ConversationResult::failed(e.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic);
                error!("Pipeline panicked: {}", message);
                ConversationResult::failed(PipelineError::Internal(message).to_string())
            }
        }
    }

    async fn try_run(&self, source: &str, output: &Path) -> Result<PathBuf, PipelineError> {
        let script = self.generator.generate(source).await?;

        let workspace = RunWorkspace::create(&self.options.temp_root)?;
        let segments = self.synthesize_all(&script, &workspace).await?;

        let assembler = self.assembler.clone();
        let output = output.to_path_buf();
        info!(
            "Assembling {} segments with {} ms pauses",
            segments.len(),
            assembler.silence_ms()
        );
        let path = tokio::task::spawn_blocking(move || assembler.assemble(&segments, &output))
            .await
            .map_err(|e| PipelineError::Internal(e.to_string()))??;
        Ok(path)
    }

    /// Synthesizes every line, at most `synthesis_workers` at a time, and
    /// returns the segments that succeeded in script order.
    async fn synthesize_all(
        &self,
        script: &Script,
        workspace: &RunWorkspace,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        let workers = self.options.synthesis_workers.max(1);
        let delay = self.options.request_delay;
        let total = script.len();
        let synthesizer = &self.synthesizer;

        let lines = script.lines();
        let outcomes: Vec<_> = stream::iter(0..total)
            .map(|index| {
                let line = &lines[index];
                let destination = workspace.segment_path(index, &line.speaker);
                async move {
                    info!("Synthesizing line {}/{} ({})", index + 1, total, line.speaker);
                    let result = synthesizer.synthesize(line, &destination).await;
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    (index, result)
                }
            })
            .buffered(workers)
            .collect()
            .await;

        let mut segments = Vec::with_capacity(total);
        let mut first_failure: Option<SynthesisError> = None;
        for (index, result) in outcomes {
            match result {
                Ok(path) => segments.push(path),
                Err(e) => {
                    warn!("Dropping line {} from the conversation: {}", index + 1, e);
                    if first_failure.is_none() {
                        first_failure = Some(e);
                    }
                }
            }
        }

        if segments.is_empty() {
            if let Some(source) = first_failure {
                let speaker = source.speaker().unwrap_or("unknown speaker").to_string();
                return Err(PipelineError::SynthesisFailed { speaker, source });
            }
        } else if first_failure.is_some() {
            warn!("{} of {} lines failed synthesis", total - segments.len(), total);
        }
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct PanickingGenerator;

    #[async_trait]
    impl TextGenerator for PanickingGenerator {
        async fn complete(&self, _: &str, _: &str) -> Result<String, ServiceError> {
            panic!("model client exploded");
        }
    }

    struct CountingGenerator(AtomicUsize);

    #[async_trait]
    impl TextGenerator for CountingGenerator {
        async fn complete(&self, _: &str, _: &str) -> Result<String, ServiceError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok("Alex: hi".to_string())
        }
    }

    struct SilentSpeech;

    #[async_trait]
    impl SpeechService for SilentSpeech {
        async fn speak(&self, _: &str, _: &str) -> Result<Vec<u8>, ServiceError> {
            Err(ServiceError::Timeout)
        }
    }

    fn options(temp_root: PathBuf) -> PipelineOptions {
        PipelineOptions {
            temp_root,
            request_delay: Duration::ZERO,
            ..PipelineOptions::default()
        }
    }

    #[test]
    fn test_segment_paths_are_unique_and_safe() {
        let dir = tempfile::tempdir().unwrap();
        let a = RunWorkspace::create(dir.path()).unwrap();
        let b = RunWorkspace::create(dir.path()).unwrap();
        assert_ne!(a.dir, b.dir);

        let p = a.segment_path(7, "Dr. Who/../x");
        let name = p.file_name().unwrap().to_str().unwrap();
        assert_eq!(name, "segment_007_Dr_Who_x.wav");
        assert_eq!(p.parent().unwrap(), a.dir);
    }

    #[test]
    fn test_workspace_drop_removes_run_dir_and_empty_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("temp");
        let ws = RunWorkspace::create(&root).unwrap();
        fs::write(ws.segment_path(0, "Alex"), b"leftover").unwrap();
        drop(ws);
        assert!(!root.exists());
    }

    #[test]
    fn test_workspace_drop_keeps_shared_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("temp");
        let first = RunWorkspace::create(&root).unwrap();
        let second = RunWorkspace::create(&root).unwrap();
        drop(first);
        assert!(root.exists());
        assert!(second.dir.exists());
    }

    #[test]
    fn test_workspaces_churning_on_one_root_never_fail() {
        let dir = tempfile::tempdir().unwrap();
        let root = Arc::new(dir.path().join("temp"));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let root = root.clone();
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let ws = RunWorkspace::create(&root).unwrap();
                        assert!(ws.dir.is_dir());
                        drop(ws);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(!root.exists());
    }

    #[test]
    fn test_default_output_path_is_stable() {
        let a = default_output_path(Path::new("output"), "same text");
        let b = default_output_path(Path::new("output"), "same text");
        let c = default_output_path(Path::new("output"), "other text");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("output"));
        assert_eq!(a.extension().unwrap(), "wav");
    }

    #[tokio::test]
    async fn test_empty_input_skips_generation() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(CountingGenerator(AtomicUsize::new(0)));
        let pipeline = ConversationPipeline::new(
            generator.clone(),
            Arc::new(SilentSpeech),
            Arc::new(VoiceTable::default()),
            options(dir.path().join("temp")),
        );

        let result = pipeline.run("  \n\t ", &dir.path().join("out.wav")).await;
        assert_eq!(result, ConversationResult::failed(EMPTY_INPUT_MESSAGE));
        assert_eq!(generator.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_panic_becomes_failure_result() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = ConversationPipeline::new(
            Arc::new(PanickingGenerator),
            Arc::new(SilentSpeech),
            Arc::new(VoiceTable::default()),
            options(dir.path().join("temp")),
        );

        let result = pipeline.run("some text", &dir.path().join("out.wav")).await;
        assert!(!result.success);
        assert!(result.output_path.is_none());
        assert!(result.message.contains("model client exploded"));
    }

    #[tokio::test]
    async fn test_all_lines_failing_names_first_speaker() {
        let dir = tempfile::tempdir().unwrap();
        let temp_root = dir.path().join("temp");
        let pipeline = ConversationPipeline::new(
            Arc::new(CountingGenerator(AtomicUsize::new(0))),
            Arc::new(SilentSpeech),
            Arc::new(VoiceTable::default()),
            options(temp_root.clone()),
        );
        let out = dir.path().join("out.wav");

        let result = pipeline.run("some text", &out).await;
        assert_eq!(
            result,
            ConversationResult::failed("Failed to synthesize speech for Alex")
        );
        assert!(!out.exists());
        assert!(!temp_root.exists());
    }
}
