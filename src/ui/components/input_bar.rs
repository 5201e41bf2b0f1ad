//! Input bar component
//!
//! Mic toggle, multi-line text input and send button.

use crate::ui::state::ChatViewState;
use crate::ui::theme::Theme;
use egui::{self, Key, Modifiers, RichText, Vec2};

pub const INPUT_LABEL: &str = "Message input";
pub const SEND_LABEL: &str = "Send message";
pub const START_LISTENING_LABEL: &str = "Start voice input";
pub const STOP_LISTENING_LABEL: &str = "Stop voice input";

/// Enter submits; Shift+Enter is left to the text field as a newline
pub fn is_submit_chord(key: Key, modifiers: Modifiers) -> bool {
    key == Key::Enter && !modifiers.shift
}

pub struct InputBar<'a> {
    state: &'a mut ChatViewState,
    theme: &'a Theme,
}

impl<'a> InputBar<'a> {
    pub fn new(state: &'a mut ChatViewState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }

    pub fn show(mut self, ui: &mut egui::Ui) {
        egui::Frame::none()
            .fill(self.theme.bg_secondary)
            .rounding(self.theme.card_rounding)
            .inner_margin(self.theme.spacing_sm)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    self.show_mic_button(ui);
                    self.show_text_input(ui);
                    self.show_send_button(ui);
                });
            });
    }

    fn show_mic_button(&mut self, ui: &mut egui::Ui) {
        let available = self.state.speech_available();
        let listening = self.state.listening;

        let (icon, label, color) = if listening {
            ("⏹", STOP_LISTENING_LABEL, self.theme.listening)
        } else {
            ("🎤", START_LISTENING_LABEL, self.theme.text_secondary)
        };

        let mut button = egui::Button::new(RichText::new(icon).size(18.0).color(color))
            .min_size(Vec2::splat(40.0))
            .rounding(self.theme.button_rounding);
        if listening {
            button = button.fill(self.theme.listening.gamma_multiply(0.2));
        }

        let response = ui.add_enabled(available, button);
        response.widget_info(|| egui::WidgetInfo::labeled(egui::WidgetType::Button, available, label));

        if response.clicked() {
            self.state.toggle_listening();
        }

        let tooltip = if available {
            label
        } else {
            "Speech input is not available"
        };
        response.on_hover_text(tooltip);
    }

    fn show_text_input(&mut self, ui: &mut egui::Ui) {
        let id = egui::Id::new("message_input");

        // Consume Enter before the text field turns it into a newline
        let had_focus = ui.memory(|m| m.has_focus(id));
        let shift = ui.input(|i| i.modifiers.shift);
        let submit_pressed = had_focus
            && is_submit_chord(Key::Enter, Modifiers { shift, ..Modifiers::NONE })
            && ui.input_mut(|i| i.consume_key(Modifiers::NONE, Key::Enter));

        let width = ui.available_width() - 56.0;
        let text_edit = egui::TextEdit::multiline(&mut self.state.input_text)
            .id(id)
            .hint_text("Type a message...")
            .desired_rows(1)
            .desired_width(width)
            .font(egui::TextStyle::Body)
            .margin(egui::Margin::symmetric(10.0, 8.0));

        let response = ui.add(text_edit);
        response.widget_info(|| egui::WidgetInfo::labeled(egui::WidgetType::TextEdit, true, INPUT_LABEL));

        if response.changed() {
            self.state.edit_input();
        }

        if submit_pressed {
            self.state.submit();
            response.request_focus();
        }
    }

    fn show_send_button(&mut self, ui: &mut egui::Ui) {
        let can_send = !self.state.input_text.trim().is_empty() && !self.state.closed;
        let fill = if can_send {
            self.theme.primary
        } else {
            self.theme.bg_tertiary
        };

        let button = egui::Button::new(RichText::new("➤").size(16.0).color(egui::Color32::WHITE))
            .min_size(Vec2::splat(40.0))
            .rounding(self.theme.button_rounding)
            .fill(fill);

        let response = ui.add_enabled(can_send, button);
        response.widget_info(|| egui::WidgetInfo::labeled(egui::WidgetType::Button, can_send, SEND_LABEL));

        if response.clicked() {
            self.state.submit();
        }

        response.on_hover_text("Send message (Enter)");
    }
}
