//! FluentAI - chat assistant with typed and spoken input

use anyhow::{anyhow, Context, Result};
use eframe::egui;
use fluentai::ui::FluentApp;
use fluentai::{ChatConfig, ConversationController};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fluentai=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting FluentAI");

    let config = ChatConfig::discover().context("Failed to load configuration")?;
    let (controller, handle) =
        ConversationController::from_config(&config).context("Failed to set up the conversation")?;
    let controller_thread = controller.spawn()?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([480.0, 640.0])
            .with_min_inner_size([320.0, 400.0])
            .with_title("FluentAI"),
        ..Default::default()
    };

    let ui_handle = handle.clone();
    let result = eframe::run_native(
        "FluentAI",
        options,
        Box::new(move |cc| Ok(Box::new(FluentApp::new(cc, ui_handle)))),
    );

    // Covers the case where the window closed without on_exit
    let _ = handle.shutdown();
    drop(handle);
    if controller_thread.join().is_err() {
        error!("Conversation thread panicked");
    }

    result.map_err(|e| anyhow!("UI error: {}", e))?;
    info!("FluentAI stopped");
    Ok(())
}
