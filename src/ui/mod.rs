//! egui/eframe user interface for the chat window

mod app;
pub mod components;
mod state;
mod theme;

pub use app::FluentApp;
pub use state::ChatViewState;
pub use theme::Theme;
