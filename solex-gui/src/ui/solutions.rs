//! Solution checklist with filter box and select-all checkbox.

use eframe::egui;
use egui_extras::{Column, TableBuilder};

use crate::app::SolexApp;
use crate::ui::colors;

/// Render the filter row and the solution table.
pub fn render(app: &mut SolexApp, ui: &mut egui::Ui) {
    let busy = app.phase.is_busy();
    let has_solutions = !app.selection.solutions().is_empty();

    ui.horizontal(|ui| {
        ui.label("Filter:");

        let filter_edit = egui::TextEdit::singleline(&mut app.filter_input)
            .hint_text("unique or friendly name")
            .desired_width(220.0);
        let response = ui.add_enabled(has_solutions && !busy, filter_edit);
        if response.changed() {
            let filter = app.filter_input.clone();
            app.selection.set_filter(filter);
        }

        let mut select_all = app.selection.is_select_all();
        if ui
            .add_enabled(
                has_solutions && !busy,
                egui::Checkbox::new(&mut select_all, "All solutions"),
            )
            .changed()
        {
            app.selection.set_select_all(select_all);
        }

        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            let muted = colors::muted(ui.visuals());
            let selected = app.selection.selected_unique_names().len();
            let total = app.selection.solutions().len();
            ui.label(
                egui::RichText::new(format!("{} of {} selected", selected, total))
                    .size(11.0)
                    .color(muted),
            );
        });
    });

    ui.separator();

    if !has_solutions {
        let muted = colors::muted(ui.visuals());
        ui.centered_and_justified(|ui| {
            ui.label(
                egui::RichText::new("Connect to an organization to list its unmanaged solutions.")
                    .color(muted),
            );
        });
        return;
    }

    // Per-item interaction is disabled while select-all is active or a batch
    // is running.
    let list_enabled = app.selection.list_enabled() && !busy;
    let items = app.selection.displayed();
    let mut toggled: Vec<String> = Vec::new();

    TableBuilder::new(ui)
        .striped(true)
        .column(Column::remainder())
        .column(Column::auto().at_least(80.0))
        .header(20.0, |mut header| {
            header.col(|ui| {
                ui.strong("Solution");
            });
            header.col(|ui| {
                ui.strong("Version");
            });
        })
        .body(|mut body| {
            for item in &items {
                body.row(20.0, |mut row| {
                    row.col(|ui| {
                        let mut checked = item.checked;
                        let checkbox = egui::Checkbox::new(&mut checked, item.display.clone());
                        if ui.add_enabled(list_enabled, checkbox).changed() {
                            toggled.push(item.display.clone());
                        }
                    });
                    row.col(|ui| {
                        ui.label(&item.version);
                    });
                });
            }
        });

    for display in toggled {
        app.selection.toggle(&display);
    }
}
