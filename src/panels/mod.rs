//! Side, top and bottom panels around the canvas. Each takes the app and
//! draws itself for one frame.

mod central_panel;
mod layers_panel;
mod tools_panel;

pub use central_panel::central_panel;
pub use layers_panel::layers_panel;
pub use tools_panel::tools_panel;

use crate::SketchApp;

pub fn tabs_bar(app: &mut SketchApp, ctx: &egui::Context) {
    egui::TopBottomPanel::top("tabs_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            let active = app.session().active_tab();
            let names: Vec<String> = app.session().tabs().iter().map(|t| t.name.clone()).collect();
            let mut close = None;
            for (index, name) in names.iter().enumerate() {
                let tab = ui.selectable_label(index == active, name);
                if tab.clicked() {
                    app.session_mut().set_active_tab(index);
                }
                tab.context_menu(|ui| {
                    if ui.button("Close tab").clicked() {
                        close = Some(index);
                        ui.close_menu();
                    }
                });
            }
            if let Some(index) = close {
                if !app.session_mut().close_tab(index) {
                    app.set_status("The last tab can't be closed");
                }
            }
            if ui.button("+").clicked() {
                let name = format!("Canvas {}", names.len() + 1);
                app.session_mut().add_tab(name);
            }
            ui.separator();
            if ui.button("Save").clicked() {
                app.save_session();
            }
        });
    });
}

pub fn status_bar(app: &mut SketchApp, ctx: &egui::Context) {
    egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            let layers = app.document().layers();
            ui.label(format!("{} layer(s), {} stroke(s)", layers.len(), layers.stroke_count()));
            if !app.status().is_empty() {
                ui.separator();
                ui.label(app.status());
            }
        });
    });
}
