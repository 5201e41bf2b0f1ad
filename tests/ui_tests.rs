//! UI automation tests using egui_kittest and AccessKit
//!
//! The controller runs on its own thread against scripted doubles; the
//! tests drive the window through the accessibility tree and wait for the
//! controller's events to land.

use egui_kittest::kittest::Queryable;
use egui_kittest::Harness;
use fluentai::speech::SpeechFacility;
use fluentai::testing::{ScriptedRecognizer, ScriptedResponder};
use fluentai::ui::{FluentApp, Theme};
use fluentai::{ChatConfig, ControllerHandle, ConversationController, Role};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const GREETING: &str = "Hello! I'm FluentAI. How can I help you today?";

struct TestChat {
    handle: ControllerHandle,
    controller: Option<JoinHandle<()>>,
}

impl TestChat {
    fn start(config: ChatConfig, responder: &ScriptedResponder, facility: SpeechFacility) -> Self {
        let (controller, handle) =
            ConversationController::new(&config, Arc::new(responder.clone()), facility);
        let controller = controller.spawn().unwrap();
        Self {
            handle,
            controller: Some(controller),
        }
    }

    fn text_only(responder: &ScriptedResponder) -> Self {
        Self::start(
            ChatConfig::default().without_speech(),
            responder,
            SpeechFacility::Unavailable,
        )
    }

    fn harness(&self) -> Harness<'static, FluentApp> {
        let app = FluentApp::with_theme(self.handle.clone(), Theme::dark());
        Harness::builder()
            .with_size(egui::Vec2::new(480.0, 640.0))
            .build_state(|ctx, app: &mut FluentApp| app.show(ctx), app)
    }
}

impl Drop for TestChat {
    fn drop(&mut self) {
        let _ = self.handle.shutdown();
        if let Some(controller) = self.controller.take() {
            let _ = controller.join();
        }
    }
}

/// Run frames until `done` holds, failing after a few seconds
fn run_until(harness: &mut Harness<'_, FluentApp>, what: &str, done: impl Fn(&FluentApp) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        harness.run();
        if done(harness.state()) {
            return;
        }
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::sleep(Duration::from_millis(10));
    }
}

fn has_message(app: &FluentApp, role: Role, content: &str) -> bool {
    app.state()
        .messages
        .iter()
        .any(|m| m.role() == role && m.content() == content)
}

fn type_into_input(harness: &mut Harness<'_, FluentApp>, text: &str) {
    harness.get_by_label("Message input").focus();
    harness.run();
    harness.get_by_label("Message input").type_text(text);
    harness.run();
}

#[test]
fn test_greeting_is_shown() {
    let responder = ScriptedResponder::new();
    let chat = TestChat::text_only(&responder);
    let mut harness = chat.harness();

    harness.run();

    let _greeting = harness.get_by_label(&format!("Bot message: {}", GREETING));
    let _input = harness.get_by_label("Message input");
    let _send = harness.get_by_label("Send message");
}

#[test]
fn test_send_shows_user_message_then_reply() {
    let responder = ScriptedResponder::new();
    responder.push_success("Hi there!");
    let chat = TestChat::text_only(&responder);
    let mut harness = chat.harness();
    harness.run();

    type_into_input(&mut harness, "hi");
    assert_eq!(harness.state().state().input_text, "hi");

    harness.get_by_label("Send message").click();
    run_until(&mut harness, "bot reply", |app| {
        has_message(app, Role::Bot, "Hi there!")
    });

    let roles: Vec<_> = harness.state().state().messages.iter().map(|m| m.role()).collect();
    assert_eq!(roles, vec![Role::Bot, Role::User, Role::Bot]);
    assert!(harness.state().state().input_text.is_empty());

    let _user = harness.get_by_label("User message: hi");
    let _bot = harness.get_by_label("Bot message: Hi there!");
    assert_eq!(responder.requests()[0].message, "hi");
}

#[test]
fn test_failed_reply_leaves_only_user_message() {
    let responder = ScriptedResponder::new();
    responder.push_failure("error", Some("model offline"));
    responder.push_success("back online");
    let chat = TestChat::text_only(&responder);
    let mut harness = chat.harness();
    harness.run();

    type_into_input(&mut harness, "first");
    harness.get_by_label("Send message").click();
    run_until(&mut harness, "request", |_| responder.requests().len() == 1);

    type_into_input(&mut harness, "second");
    harness.get_by_label("Send message").click();
    run_until(&mut harness, "second reply", |app| {
        has_message(app, Role::Bot, "back online")
    });

    let contents: Vec<_> = harness
        .state()
        .state()
        .messages
        .iter()
        .map(|m| m.content().to_string())
        .collect();
    assert_eq!(contents, vec![GREETING, "first", "second", "back online"]);
}

#[test]
fn test_blank_input_is_not_sent() {
    let responder = ScriptedResponder::new();
    let chat = TestChat::text_only(&responder);
    let mut harness = chat.harness();
    harness.run();

    type_into_input(&mut harness, "   ");
    harness.get_by_label("Send message").click();
    harness.run();
    thread::sleep(Duration::from_millis(100));
    harness.run();

    assert_eq!(harness.state().state().messages.len(), 1);
    assert!(responder.requests().is_empty());
}

#[test]
fn test_mic_does_nothing_without_speech() {
    let responder = ScriptedResponder::new();
    let chat = TestChat::text_only(&responder);
    let mut harness = chat.harness();
    harness.run();

    harness.get_by_label("Start voice input").click();
    harness.run();
    thread::sleep(Duration::from_millis(100));
    harness.run();

    assert!(!harness.state().state().listening);
    assert!(!harness.state().state().speech_available());
}

#[test]
fn test_spoken_input_is_sent_after_silence() {
    let responder = ScriptedResponder::new();
    responder.push_success("General Kenobi");
    let recognizer = ScriptedRecognizer::new();
    let chat = TestChat::start(
        ChatConfig::default().with_silence(Duration::from_millis(300)),
        &responder,
        SpeechFacility::Available(Box::new(recognizer.clone())),
    );
    let mut harness = chat.harness();
    harness.run();

    harness.get_by_label("Start voice input").click();
    run_until(&mut harness, "listening", |app| app.state().listening);
    let _stop = harness.get_by_label("Stop voice input");

    recognizer.transcript("hello there");
    run_until(&mut harness, "transcript in input", |app| {
        app.state().input_text == "hello there"
    });

    run_until(&mut harness, "auto-submitted reply", |app| {
        has_message(app, Role::Bot, "General Kenobi")
    });
    assert!(has_message(harness.state(), Role::User, "hello there"));
    assert!(harness.state().state().input_text.is_empty());
    assert!(harness.state().state().listening, "listening continues after a submit");
}

#[test]
fn test_speech_error_resets_mic() {
    let responder = ScriptedResponder::new();
    let recognizer = ScriptedRecognizer::new();
    let chat = TestChat::start(
        ChatConfig::default(),
        &responder,
        SpeechFacility::Available(Box::new(recognizer.clone())),
    );
    let mut harness = chat.harness();
    harness.run();

    harness.get_by_label("Start voice input").click();
    run_until(&mut harness, "listening", |app| app.state().listening);

    recognizer.error("no-speech");
    run_until(&mut harness, "idle", |app| !app.state().listening);
    let _start = harness.get_by_label("Start voice input");
}
