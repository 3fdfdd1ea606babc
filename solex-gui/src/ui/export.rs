//! Export directory row and export button.

use eframe::egui;

use crate::app::SolexApp;

/// Render the export row.
pub fn render(app: &mut SolexApp, ui: &mut egui::Ui) {
    let busy = app.phase.is_busy();

    ui.horizontal(|ui| {
        ui.label("Export path:");

        let path_edit = egui::TextEdit::singleline(&mut app.export_dir_input)
            .hint_text("Directory for exported zip files")
            .desired_width(380.0);
        ui.add_enabled(!busy, path_edit);

        if ui.add_enabled(!busy, egui::Button::new("Browse...")).clicked() {
            app.open_folder_dialog();
        }

        let can_export = !busy && app.is_connected();
        if ui
            .add_enabled(can_export, egui::Button::new("Export & Unpack"))
            .clicked()
        {
            app.start_export();
        }
    });
}
