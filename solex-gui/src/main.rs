//! Solex GUI Application
//!
//! A desktop tool for exporting and unpacking Microsoft Dataverse solutions.

mod app;
mod ui;

use eframe::egui;

fn main() -> eframe::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("solex=debug".parse().unwrap())
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting Solex v{}", solex_core::VERSION);

    // Create tokio runtime for async operations
    let runtime = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    let _guard = runtime.enter();

    // Window configuration
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([960.0, 680.0])
            .with_min_inner_size([760.0, 520.0])
            .with_title("Solex - Dataverse Solution Exporter"),
        ..Default::default()
    };

    // Run the application
    eframe::run_native(
        "Solex",
        options,
        Box::new(|cc| Ok(Box::new(app::SolexApp::new(cc, runtime)))),
    )
}
