//! Test doubles for the responder and the speech facility
//!
//! Both doubles are `Clone` and share their state, so a test keeps one copy
//! for scripting and assertions while the controller owns the other.

use crate::dispatch::{ChatRequest, ChatResponse, Responder};
use crate::messages::{ConversationStore, Message};
use crate::speech::{RecognitionConfig, SpeechEventSink, SpeechRecognizer};
use crate::{FluentError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

struct ScriptedReply {
    result: Result<ChatResponse>,
    delay: Duration,
}

#[derive(Default)]
struct ResponderState {
    replies: VecDeque<ScriptedReply>,
    requests: Vec<ChatRequest>,
    observed: Option<ConversationStore>,
    history_at_request: Vec<Vec<Message>>,
}

/// Responder that answers from a queue of scripted replies
#[derive(Clone, Default)]
pub struct ScriptedResponder {
    state: Arc<Mutex<ResponderState>>,
}

impl ScriptedResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot `store` every time a request arrives
    pub fn observe(&self, store: &ConversationStore) {
        self.state.lock().observed = Some(store.clone());
    }

    pub fn push_success(&self, response: &str) {
        self.push(Ok(ChatResponse::success(response)), Duration::ZERO);
    }

    pub fn push_delayed_success(&self, response: &str, delay: Duration) {
        self.push(Ok(ChatResponse::success(response)), delay);
    }

    pub fn push_failure(&self, status: &str, message: Option<&str>) {
        self.push(Ok(ChatResponse::failure(status, message)), Duration::ZERO);
    }

    pub fn push_transport_error(&self, detail: &str) {
        self.push(
            Err(FluentError::TransportError(detail.to_string())),
            Duration::ZERO,
        );
    }

    fn push(&self, result: Result<ChatResponse>, delay: Duration) {
        self.state
            .lock()
            .replies
            .push_back(ScriptedReply { result, delay });
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.state.lock().requests.clone()
    }

    pub fn history_at_request(&self) -> Vec<Vec<Message>> {
        self.state.lock().history_at_request.clone()
    }
}

#[async_trait]
impl Responder for ScriptedResponder {
    async fn respond(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let reply = {
            let mut state = self.state.lock();
            state.requests.push(request.clone());
            if let Some(store) = state.observed.clone() {
                state.history_at_request.push(store.history());
            }
            state.replies.pop_front()
        };

        let Some(reply) = reply else {
            return Err(FluentError::TransportError(
                "No scripted reply left".to_string(),
            ));
        };

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.result
    }
}

#[derive(Default)]
struct RecognizerState {
    sink: Option<SpeechEventSink>,
    configs: Vec<RecognitionConfig>,
    stops: usize,
    fail_next_start: Option<String>,
}

/// Speech facility driven by the test
#[derive(Clone, Default)]
pub struct ScriptedRecognizer {
    state: Arc<Mutex<RecognizerState>>,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `start` fail with a speech error
    pub fn fail_next_start(&self, detail: &str) {
        self.state.lock().fail_next_start = Some(detail.to_string());
    }

    /// Sink of the running session
    pub fn sink(&self) -> Option<SpeechEventSink> {
        self.state.lock().sink.clone()
    }

    pub fn transcript(&self, text: &str) -> bool {
        self.sink().is_some_and(|sink| sink.transcript(text))
    }

    pub fn error(&self, detail: &str) -> bool {
        self.sink().is_some_and(|sink| sink.error(detail))
    }

    pub fn end(&self) -> bool {
        self.sink().is_some_and(|sink| sink.ended())
    }

    pub fn start_count(&self) -> usize {
        self.state.lock().configs.len()
    }

    pub fn stop_count(&self) -> usize {
        self.state.lock().stops
    }

    pub fn last_config(&self) -> Option<RecognitionConfig> {
        self.state.lock().configs.last().cloned()
    }
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn start(&mut self, config: &RecognitionConfig, sink: SpeechEventSink) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(detail) = state.fail_next_start.take() {
            return Err(FluentError::SpeechError(detail));
        }
        state.configs.push(config.clone());
        state.sink = Some(sink);
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state.lock();
        state.stops += 1;
        state.sink = None;
    }
}
