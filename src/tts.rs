use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use tracing::{debug, error, info};

use crate::config::{SpeechServiceConfig, VoiceTable};
use crate::error::{ConfigurationError, ServiceError, SynthesisError};
use crate::script::ScriptLine;

/// A speech backend: voice identity plus text in, encoded audio out.
#[async_trait]
pub trait SpeechService: Send + Sync {
    async fn speak(&self, voice: &str, text: &str) -> Result<Vec<u8>, ServiceError>;
}

/// Azure Cognitive Services text-to-speech over REST.
pub struct AzureSpeechClient {
    config: SpeechServiceConfig,
    client: reqwest::Client,
}

impl AzureSpeechClient {
    pub fn new(config: SpeechServiceConfig) -> Result<Self, ConfigurationError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

pub fn build_ssml(voice: &str, text: &str) -> String {
    let lang = voice.splitn(3, '-').take(2).collect::<Vec<_>>().join("-");
    format!(
        "<speak version=\"1.0\" xmlns=\"http://www.w3.org/2001/10/synthesis\" xml:lang=\"{}\"><voice name=\"{}\">{}</voice></speak>",
        escape_xml(&lang),
        escape_xml(voice),
        escape_xml(text)
    )
}

#[async_trait]
impl SpeechService for AzureSpeechClient {
    async fn speak(&self, voice: &str, text: &str) -> Result<Vec<u8>, ServiceError> {
        let url = format!("{}/cognitiveservices/v1", self.config.endpoint());
        let res = self
            .client
            .post(&url)
            .header("Ocp-Apim-Subscription-Key", &self.config.api_key)
            .header(CONTENT_TYPE, "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", &self.config.output_format)
            .header(USER_AGENT, "podcastgen-rust/0.1")
            .body(build_ssml(voice, text))
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

        let audio = res.bytes().await?;
        if audio.is_empty() {
            return Err(ServiceError::Canceled(
                "service completed without audio".to_string(),
            ));
        }
        Ok(audio.to_vec())
    }
}

/// Renders one script line with its speaker's voice into a WAV file.
pub struct VoiceSynthesizer {
    service: Arc<dyn SpeechService>,
    voices: Arc<VoiceTable>,
}

impl VoiceSynthesizer {
    pub fn new(service: Arc<dyn SpeechService>, voices: Arc<VoiceTable>) -> Self {
        Self { service, voices }
    }

    pub async fn synthesize(
        &self,
        line: &ScriptLine,
        destination: &Path,
    ) -> Result<PathBuf, SynthesisError> {
        let voice = self
            .voices
            .voice_for(&line.speaker)
            .ok_or_else(|| SynthesisError::UnknownSpeaker(line.speaker.clone()))?;

        debug!("Synthesizing {} with voice {}: {:.80}", line.speaker, voice, line.dialogue);
        let audio = self
            .service
            .speak(voice, &line.dialogue)
            .await
            .map_err(|e| {
                error!("Speech synthesis failed for {}: {}", line.speaker, e);
                SynthesisError::BackendFailure {
                    speaker: line.speaker.clone(),
                    reason: e.reason(),
                    details: e.to_string(),
                }
            })?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| SynthesisError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(destination, &audio)
            .await
            .map_err(|source| SynthesisError::Io {
                path: destination.to_path_buf(),
                source,
            })?;

        info!("Wrote {} bytes of audio to {}", audio.len(), destination.display());
        Ok(destination.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct CountingService {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SpeechService for CountingService {
        async fn speak(&self, voice: &str, text: &str) -> Result<Vec<u8>, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ServiceError::Canceled("quota exceeded".to_string()));
            }
            Ok(format!("{voice}|{text}").into_bytes())
        }
    }

    fn synthesizer(fail: bool) -> (VoiceSynthesizer, Arc<CountingService>) {
        let service = Arc::new(CountingService {
            calls: AtomicUsize::new(0),
            fail,
        });
        let synth = VoiceSynthesizer::new(service.clone(), Arc::new(VoiceTable::default()));
        (synth, service)
    }

    fn speech_config(endpoint: String) -> SpeechServiceConfig {
        SpeechServiceConfig {
            api_key: "speech-key".to_string(),
            region: "westeurope".to_string(),
            endpoint: Some(endpoint),
            output_format: "riff-24khz-16bit-mono-pcm".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_build_ssml_escapes_text() {
        let ssml = build_ssml("en-US-GuyNeural", "Tom & Jerry say \"<hi>\"");
        assert!(ssml.contains("xml:lang=\"en-US\""));
        assert!(ssml.contains("<voice name=\"en-US-GuyNeural\">"));
        assert!(ssml.contains("Tom &amp; Jerry say &quot;&lt;hi&gt;&quot;"));
    }

    #[tokio::test]
    async fn test_unknown_speaker_makes_no_call() {
        let dir = tempfile::tempdir().unwrap();
        let (synth, service) = synthesizer(false);
        let dest = dir.path().join("seg.wav");

        let err = synth
            .synthesize(&ScriptLine::new("Narrator", "Meanwhile..."), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, SynthesisError::UnknownSpeaker(ref s) if s == "Narrator"));
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_synthesize_uses_speaker_voice_and_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let (synth, _) = synthesizer(false);
        let dest = dir.path().join("nested").join("seg.wav");

        let out = synth
            .synthesize(&ScriptLine::new("Sarah", "Great question."), &dest)
            .await
            .unwrap();

        assert_eq!(out, dest);
        let written = std::fs::read_to_string(&dest).unwrap();
        assert_eq!(written, "en-US-JennyNeural|Great question.");
    }

    #[tokio::test]
    async fn test_backend_failure_carries_reason() {
        let dir = tempfile::tempdir().unwrap();
        let (synth, _) = synthesizer(true);
        let dest = dir.path().join("seg.wav");

        let err = synth
            .synthesize(&ScriptLine::new("Alex", "Hello"), &dest)
            .await
            .unwrap_err();

        match err {
            SynthesisError::BackendFailure {
                speaker,
                reason,
                details,
            } => {
                assert_eq!(speaker, "Alex");
                assert_eq!(reason, "Canceled");
                assert!(details.contains("quota exceeded"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_azure_speech_client_posts_ssml() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cognitiveservices/v1"))
            .and(header("Ocp-Apim-Subscription-Key", "speech-key"))
            .and(header("Content-Type", "application/ssml+xml"))
            .and(header("X-Microsoft-OutputFormat", "riff-24khz-16bit-mono-pcm"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"RIFF-fake".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let client = AzureSpeechClient::new(speech_config(server.uri())).unwrap();
        let audio = client.speak("en-US-GuyNeural", "Hi").await.unwrap();
        assert_eq!(audio, b"RIFF-fake");

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8(requests[0].body.clone()).unwrap();
        assert!(body.contains("<voice name=\"en-US-GuyNeural\">Hi</voice>"));
    }

    #[tokio::test]
    async fn test_azure_speech_client_maps_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let client = AzureSpeechClient::new(speech_config(server.uri())).unwrap();
        let err = client.speak("en-US-GuyNeural", "Hi").await.unwrap_err();
        assert!(matches!(err, ServiceError::Status { status: 401, .. }));
        assert_eq!(err.reason(), "HTTP 401");
    }

    #[tokio::test]
    async fn test_azure_speech_client_empty_audio_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = AzureSpeechClient::new(speech_config(server.uri())).unwrap();
        let err = client.speak("en-US-GuyNeural", "Hi").await.unwrap_err();
        assert!(matches!(err, ServiceError::Canceled(_)));
    }
}
