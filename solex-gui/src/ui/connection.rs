//! Server URL row and connect button.

use eframe::egui;

use crate::app::SolexApp;
use crate::ui::colors;

/// Render the connection row.
pub fn render(app: &mut SolexApp, ui: &mut egui::Ui) {
    let busy = app.phase.is_busy();

    ui.horizontal(|ui| {
        ui.label("Server URL:");

        let url_edit = egui::TextEdit::singleline(&mut app.server_url_input)
            .hint_text("https://<yourorg>.crm.dynamics.com")
            .desired_width(380.0);
        let response = ui.add_enabled(!busy, url_edit);

        let connect_clicked = ui
            .add_enabled(!busy, egui::Button::new("Connect"))
            .clicked();
        let enter_pressed =
            response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

        if app.is_connected() {
            ui.colored_label(colors::SUCCESS, "Connected");
        }

        if connect_clicked || (enter_pressed && !busy) {
            app.start_connect();
        }
    });
}
