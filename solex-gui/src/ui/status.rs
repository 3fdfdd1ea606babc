//! Status bar at the bottom of the window.

use eframe::egui::{self, RichText};

use crate::app::SolexApp;
use crate::ui::colors;
use solex_core::FlowPhase;

/// Render the status bar.
pub fn render(app: &SolexApp, ui: &mut egui::Ui) {
    let muted = colors::muted(ui.visuals());

    ui.horizontal(|ui| {
        // Phase indicator
        let phase_color = match app.phase {
            FlowPhase::Done => colors::SUCCESS,
            FlowPhase::Failed => colors::ERROR,
            phase if phase.is_busy() => colors::WARNING,
            _ => muted,
        };
        ui.label(RichText::new(app.phase.to_string()).size(11.0).color(phase_color));
        ui.separator();

        // Status message
        if let Some((msg, _)) = &app.status_message {
            ui.label(RichText::new(msg).size(11.0).color(muted));
        }

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            // Export progress, two steps per solution
            if let Some((completed, total)) = app.progress {
                let fraction = if total > 0 {
                    completed as f32 / total as f32
                } else {
                    0.0
                };
                ui.add(
                    egui::ProgressBar::new(fraction)
                        .desired_width(180.0)
                        .text(format!("{}/{}", completed, total)),
                );
            } else if let Some(connection) = &app.connection {
                if connection.is_ready() {
                    ui.label(
                        RichText::new(connection.host())
                            .size(11.0)
                            .color(muted),
                    );
                }
            }
        });
    });
}
