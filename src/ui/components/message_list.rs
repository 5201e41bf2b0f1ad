//! Message list component
//!
//! Renders the conversation as chat bubbles, user on the right and bot on
//! the left, and follows the newest entry.

use crate::messages::{Message, Role};
use crate::ui::state::ChatViewState;
use crate::ui::theme::Theme;
use egui::{self, Align, Color32, RichText};

/// Accessibility label of a rendered message
pub fn message_label(message: &Message) -> String {
    match message.role() {
        Role::User => format!("User message: {}", message.content()),
        Role::Bot => format!("Bot message: {}", message.content()),
    }
}

pub struct MessageList<'a> {
    state: &'a mut ChatViewState,
    theme: &'a Theme,
}

impl<'a> MessageList<'a> {
    pub fn new(state: &'a mut ChatViewState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }

    pub fn show(self, ui: &mut egui::Ui) {
        let scroll_to_latest = std::mem::take(&mut self.state.scroll_to_latest);
        let last = self.state.messages.len().saturating_sub(1);

        egui::ScrollArea::vertical()
            .id_salt("message_list")
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                ui.add_space(self.theme.spacing_sm);

                for (index, message) in self.state.messages.iter().enumerate() {
                    let response = self.show_message(ui, message);
                    if scroll_to_latest && index == last {
                        response.scroll_to_me(Some(Align::BOTTOM));
                    }
                    ui.add_space(self.theme.spacing_sm);
                }
            });
    }

    fn show_message(&self, ui: &mut egui::Ui, message: &Message) -> egui::Response {
        let is_user = message.is_user();
        let (bubble, text_color, align, author) = if is_user {
            (self.theme.user_bubble, Color32::WHITE, Align::RIGHT, "You")
        } else {
            (self.theme.bot_bubble, self.theme.text_primary, Align::LEFT, "FluentAI")
        };

        ui.with_layout(egui::Layout::top_down(align), |ui| {
            ui.label(RichText::new(author).size(11.0).color(self.theme.text_muted));

            let max_width = ui.available_width() * 0.75;
            egui::Frame::none()
                .fill(bubble)
                .rounding(self.theme.bubble_rounding)
                .inner_margin(egui::Margin::symmetric(12.0, 8.0))
                .show(ui, |ui| {
                    ui.set_max_width(max_width);
                    let response = ui.label(RichText::new(message.content()).color(text_color));
                    let label = message_label(message);
                    response.widget_info(|| {
                        egui::WidgetInfo::labeled(egui::WidgetType::Label, true, &label)
                    });
                });

            ui.label(
                RichText::new(message.timestamp().format("%H:%M").to_string())
                    .size(10.0)
                    .color(self.theme.text_muted),
            );
        })
        .response
    }
}
