//! Timestamped log pane.

use eframe::egui;

use crate::app::SolexApp;
use crate::ui::colors;

/// Render the log pane.
pub fn render(app: &mut SolexApp, ui: &mut egui::Ui) {
    let bg = colors::log_bg(ui.visuals());

    egui::Frame::none().fill(bg).inner_margin(6.0).show(ui, |ui| {
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &app.log_lines {
                    ui.label(egui::RichText::new(line).monospace().size(11.5));
                }
            });
    });
}
