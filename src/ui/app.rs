//! Main application struct and eframe integration

use crate::controller::ControllerHandle;
use crate::ui::components::{InputBar, MessageList};
use crate::ui::state::ChatViewState;
use crate::ui::theme::Theme;
use egui::{self, CentralPanel, RichText, TopBottomPanel};
use std::time::Duration;

/// Controller events arrive from another thread, so the UI polls
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct FluentApp {
    state: ChatViewState,
    theme: Theme,
}

impl FluentApp {
    pub fn new(cc: &eframe::CreationContext<'_>, handle: ControllerHandle) -> Self {
        let theme = Theme::dark();
        theme.apply(&cc.egui_ctx);
        Self::with_theme(handle, theme)
    }

    pub fn with_theme(handle: ControllerHandle, theme: Theme) -> Self {
        Self {
            state: ChatViewState::new(handle),
            theme,
        }
    }

    pub fn state(&self) -> &ChatViewState {
        &self.state
    }

    /// Poll events and draw one frame
    pub fn show(&mut self, ctx: &egui::Context) {
        self.state.poll_events();

        self.show_header(ctx);
        self.show_input_area(ctx);
        self.show_content(ctx);
    }

    fn show_header(&mut self, ctx: &egui::Context) {
        TopBottomPanel::top("header")
            .frame(egui::Frame::none().fill(self.theme.bg_secondary).inner_margin(12.0))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(
                        RichText::new("FluentAI")
                            .size(20.0)
                            .strong()
                            .color(self.theme.text_primary),
                    );

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        let status = if self.state.closed {
                            RichText::new("Disconnected").color(self.theme.text_muted)
                        } else if self.state.listening {
                            RichText::new("Listening").color(self.theme.listening)
                        } else {
                            RichText::new("Ready").color(self.theme.text_muted)
                        };
                        ui.label(status.size(12.0));
                    });
                });
            });
    }

    fn show_input_area(&mut self, ctx: &egui::Context) {
        TopBottomPanel::bottom("input_area")
            .frame(egui::Frame::none().fill(self.theme.bg_primary).inner_margin(self.theme.spacing_sm))
            .show(ctx, |ui| {
                InputBar::new(&mut self.state, &self.theme).show(ui);
            });
    }

    fn show_content(&mut self, ctx: &egui::Context) {
        CentralPanel::default()
            .frame(egui::Frame::none().fill(self.theme.bg_primary).inner_margin(self.theme.spacing_sm))
            .show(ctx, |ui| {
                MessageList::new(&mut self.state, &self.theme).show(ui);
            });
    }
}

impl eframe::App for FluentApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.show(ctx);
        ctx.request_repaint_after(POLL_INTERVAL);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.state.shutdown();
    }
}
