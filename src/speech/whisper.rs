//! Local speech recognition with Whisper
//!
//! Each session runs on its own capture thread: microphone audio is
//! resampled to 16 kHz and accumulated into an utterance. While the user
//! speaks, the utterance is re-transcribed every second of new audio and
//! the hypothesis is emitted as a transcript. An utterance closes after a
//! short stretch of low energy (or when it reaches the maximum length), is
//! transcribed one final time, and the next one starts from empty.

use super::audio::{rms, Microphone, MonoResampler, WHISPER_SAMPLE_RATE};
use super::{RecognitionConfig, SpeechEventSink, SpeechRecognizer};
use crate::config::SpeechConfig;
use crate::{FluentError, Result};
use crossbeam_channel::{bounded, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

const SAMPLES_PER_SEC: usize = WHISPER_SAMPLE_RATE as usize;

/// New audio needed before an interim hypothesis is produced
const INTERIM_STEP: usize = SAMPLES_PER_SEC;

/// Trailing quiet that closes an utterance
const UTTERANCE_SILENCE: usize = SAMPLES_PER_SEC * 8 / 10;

/// Longest utterance handed to Whisper in one piece
const MAX_UTTERANCE: usize = SAMPLES_PER_SEC * 30;

/// RMS below this counts as silence
const SILENCE_RMS: f32 = 0.01;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct WhisperRecognizer {
    context: Arc<WhisperContext>,
    n_threads: i32,
    /// Run flag of the current capture thread
    running: Option<Arc<AtomicBool>>,
}

impl WhisperRecognizer {
    /// Load the model and check that an input device exists
    pub fn new(config: &SpeechConfig) -> Result<Self> {
        info!("Loading Whisper model from: {:?}", config.model_path);

        if !config.model_path.exists() {
            return Err(FluentError::ModelLoadError(format!(
                "Model file not found: {:?}",
                config.model_path
            )));
        }

        let path = config
            .model_path
            .to_str()
            .ok_or_else(|| FluentError::ModelLoadError("Invalid model path".to_string()))?;

        let context = WhisperContext::new_with_params(path, WhisperContextParameters::default())
            .map_err(|e| FluentError::ModelLoadError(format!("Failed to load Whisper model: {:?}", e)))?;

        // Fail the probe early rather than on the first mic press
        Microphone::open_default()?;

        info!("Whisper model loaded");

        Ok(Self {
            context: Arc::new(context),
            n_threads: config.n_threads,
            running: None,
        })
    }
}

impl SpeechRecognizer for WhisperRecognizer {
    fn start(&mut self, config: &RecognitionConfig, sink: SpeechEventSink) -> Result<()> {
        self.stop();

        let running = Arc::new(AtomicBool::new(true));
        let session = CaptureSession {
            transcriber: Transcriber {
                context: Arc::clone(&self.context),
                n_threads: self.n_threads,
                language: primary_language(&config.language),
            },
            continuous: config.continuous,
            interim_results: config.interim_results,
            running: Arc::clone(&running),
            sink,
        };

        thread::Builder::new()
            .name("speech-capture".to_string())
            .spawn(move || session.run())?;

        self.running = Some(running);
        Ok(())
    }

    fn stop(&mut self) {
        // Not joined: a transcription in progress finishes first
        if let Some(running) = self.running.take() {
            running.store(false, Ordering::SeqCst);
            debug!("Speech capture stop requested");
        }
    }
}

impl Drop for WhisperRecognizer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Whisper wants "en", not "en-US"
fn primary_language(tag: &str) -> String {
    tag.split(['-', '_'])
        .next()
        .unwrap_or(tag)
        .to_ascii_lowercase()
}

struct Transcriber {
    context: Arc<WhisperContext>,
    n_threads: i32,
    language: String,
}

impl Transcriber {
    fn transcribe(&self, samples: &[f32]) -> Result<String> {
        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(self.n_threads);
        params.set_translate(false);
        params.set_print_timestamps(false);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_language(Some(self.language.as_str()));

        let mut state = self
            .context
            .create_state()
            .map_err(|e| FluentError::SpeechError(format!("Failed to create state: {:?}", e)))?;

        state
            .full(params, samples)
            .map_err(|e| FluentError::SpeechError(format!("Transcription failed: {:?}", e)))?;

        let segments = state
            .full_n_segments()
            .map_err(|e| FluentError::SpeechError(format!("Failed to get segments: {:?}", e)))?;

        let mut text = String::new();
        for i in 0..segments {
            let segment = state
                .full_get_segment_text(i)
                .map_err(|e| FluentError::SpeechError(format!("Failed to get segment text: {:?}", e)))?;
            text.push_str(&segment);
        }

        Ok(text.trim().to_string())
    }
}

/// Utterance bookkeeping for one capture session
#[derive(Default)]
struct Utterance {
    samples: Vec<f32>,
    heard_speech: bool,
    trailing_silence: usize,
    transcribed_len: usize,
}

impl Utterance {
    fn push(&mut self, chunk: &[f32]) {
        if rms(chunk) < SILENCE_RMS {
            self.trailing_silence += chunk.len();
        } else {
            self.trailing_silence = 0;
            self.heard_speech = true;
        }
        self.samples.extend_from_slice(chunk);
    }

    fn wants_interim(&self) -> bool {
        self.heard_speech && self.samples.len() - self.transcribed_len >= INTERIM_STEP
    }

    fn is_complete(&self) -> bool {
        (self.heard_speech && self.trailing_silence >= UTTERANCE_SILENCE)
            || self.samples.len() >= MAX_UTTERANCE
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

struct CaptureSession {
    transcriber: Transcriber,
    continuous: bool,
    interim_results: bool,
    running: Arc<AtomicBool>,
    sink: SpeechEventSink,
}

impl CaptureSession {
    fn run(self) {
        let session = self.sink.session();
        info!(session, language = %self.transcriber.language, "Speech capture started");

        report_outcome(&self.sink, self.capture());
        info!(session, "Speech capture finished");
    }

    fn capture(&self) -> Result<()> {
        let microphone = Microphone::open_default()?;
        let mut resampler = MonoResampler::new(microphone.sample_rate())?;

        let (audio_tx, audio_rx) = bounded::<Vec<f32>>(64);
        let error_sink = self.sink.clone();
        let running = Arc::clone(&self.running);
        let _stream = microphone.stream(audio_tx, move |err| {
            debug!("Audio input stream error: {}", err);
            running.store(false, Ordering::SeqCst);
            error_sink.error(format!("audio-capture: {}", err));
        })?;

        let mut utterance = Utterance::default();

        while self.running.load(Ordering::SeqCst) {
            let chunk = match audio_rx.recv_timeout(POLL_INTERVAL) {
                Ok(chunk) => chunk,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(FluentError::AudioDeviceError("Input stream closed".into()))
                }
            };

            utterance.push(&resampler.push(&chunk)?);

            if utterance.is_complete() {
                if utterance.heard_speech {
                    self.emit(&utterance.samples)?;
                }
                utterance.reset();
                if !self.continuous {
                    break;
                }
            } else if self.interim_results && utterance.wants_interim() {
                utterance.transcribed_len = utterance.samples.len();
                self.emit(&utterance.samples)?;
            }
        }

        Ok(())
    }

    fn emit(&self, samples: &[f32]) -> Result<()> {
        if !self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        let text = self.transcriber.transcribe(samples)?;
        debug!(
            seconds = samples.len() as f32 / WHISPER_SAMPLE_RATE as f32,
            chars = text.len(),
            "Hypothesis"
        );
        if !text.is_empty() && !self.sink.transcript(text) {
            // Controller is gone
            self.running.store(false, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Hand a capture failure to the controller and close the session. The
/// controller's adapter logs the error.
fn report_outcome(sink: &SpeechEventSink, outcome: Result<()>) {
    if let Err(e) = outcome {
        debug!(session = sink.session(), "Speech capture failed: {}", e);
        sink.error(e.to_string());
    }
    sink.ended();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speech::{SpeechCaptureAdapter, SpeechEvent, SpeechFacility};
    use crate::testing::ScriptedRecognizer;
    use parking_lot::Mutex;
    use std::io::Write;
    use tokio::sync::mpsc::unbounded_channel;

    #[derive(Clone, Default)]
    struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_capture_failure_logs_one_error() {
        let logs = LogCapture::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (tx, mut rx) = unbounded_channel();
        let mut adapter = SpeechCaptureAdapter::new(
            SpeechFacility::Available(Box::new(ScriptedRecognizer::new())),
            RecognitionConfig::default(),
            tx.clone(),
        );
        assert!(adapter.start());
        let session = adapter.session();

        let sink = SpeechEventSink::new(1, tx);
        report_outcome(
            &sink,
            Err(FluentError::AudioDeviceError("Input stream closed".into())),
        );

        let failed = rx.try_recv().unwrap();
        assert!(matches!(failed.event, SpeechEvent::Error(_)));
        assert_eq!(adapter.accept(failed), None);
        assert_ne!(adapter.session(), session);

        let ended = rx.try_recv().unwrap();
        assert!(matches!(ended.event, SpeechEvent::Ended));
        assert_eq!(adapter.accept(ended), None);

        let output = String::from_utf8_lossy(&logs.0.lock()).into_owned();
        let errors: Vec<_> = output.lines().filter(|l| l.contains("ERROR")).collect();
        assert_eq!(errors.len(), 1, "{:?}", errors);
        assert!(errors[0].contains("Input stream closed"));
    }

    #[test]
    fn test_clean_finish_only_ends() {
        let (tx, mut rx) = unbounded_channel();
        report_outcome(&SpeechEventSink::new(3, tx), Ok(()));

        let ended = rx.try_recv().unwrap();
        assert_eq!(ended.session, 3);
        assert!(matches!(ended.event, SpeechEvent::Ended));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_primary_language() {
        assert_eq!(primary_language("en-US"), "en");
        assert_eq!(primary_language("pt_BR"), "pt");
        assert_eq!(primary_language("DE"), "de");
    }

    #[test]
    fn test_utterance_closes_after_trailing_silence() {
        let mut utterance = Utterance::default();
        utterance.push(&vec![0.0; UTTERANCE_SILENCE]);
        assert!(!utterance.is_complete(), "silence alone is not an utterance");

        utterance.push(&vec![0.5; SAMPLES_PER_SEC]);
        assert!(utterance.wants_interim());
        assert!(!utterance.is_complete());

        utterance.push(&vec![0.0; UTTERANCE_SILENCE]);
        assert!(utterance.is_complete());

        utterance.reset();
        assert!(utterance.samples.is_empty());
        assert!(!utterance.heard_speech);
    }

    #[test]
    fn test_utterance_length_cap() {
        let mut utterance = Utterance::default();
        utterance.push(&vec![0.5; MAX_UTTERANCE]);
        assert!(utterance.is_complete());
    }

    #[test]
    fn test_missing_model_is_load_error() {
        let mut config = SpeechConfig::default();
        config.model_path = "does/not/exist.bin".into();
        assert!(matches!(
            WhisperRecognizer::new(&config),
            Err(FluentError::ModelLoadError(_))
        ));
    }
}
