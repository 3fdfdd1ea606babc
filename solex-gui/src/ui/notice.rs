//! Blocking notice dialog (validation, connection, and batch results).

use eframe::egui;

use crate::app::{NoticeKind, SolexApp};
use crate::ui::colors;

/// Render the notice dialog, if one is open.
pub fn render(app: &mut SolexApp, ctx: &egui::Context) {
    let Some(notice) = app.notice.clone() else {
        return;
    };

    let accent = match notice.kind {
        NoticeKind::Info => colors::SUCCESS,
        NoticeKind::Warning => colors::WARNING,
        NoticeKind::Error => colors::ERROR,
    };

    let mut dismissed = false;
    egui::Window::new(&notice.title)
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.set_max_width(380.0);
            ui.colored_label(accent, &notice.title);
            ui.add_space(4.0);
            ui.label(&notice.message);
            ui.add_space(8.0);
            ui.vertical_centered(|ui| {
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        });

    if dismissed {
        app.notice = None;
    }
}
