use crate::SketchApp;

pub fn layers_panel(app: &mut SketchApp, ctx: &egui::Context) {
    egui::SidePanel::right("layers_panel")
        .resizable(true)
        .default_width(220.0)
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Layers");
                if ui.button("+").clicked() {
                    app.document_mut().layers_mut().add_layer(None);
                }
            });
            if let Some(page) = app.document().current_page() {
                let count = app.document().pdf().map_or(0, |pdf| pdf.page_count());
                ui.label(format!("PDF page {} of {count}", page + 1));
            }
            ui.separator();

            // Top of the list is the top of the stack.
            let overview = app.document().layers().get_overview();
            let count = overview.len();
            for (row, layer) in overview.into_iter().rev().enumerate() {
                let index = count - 1 - row;
                ui.horizontal(|ui| {
                    let mut visible = layer.visible;
                    if ui.checkbox(&mut visible, "").on_hover_text("Visible").changed() {
                        app.document_mut().layers_mut().set_visibility(&layer.id, visible);
                    }
                    let lock = if layer.locked { "🔒" } else { "🔓" };
                    if ui.small_button(lock).clicked() {
                        app.document_mut().layers_mut().set_locked(&layer.id, !layer.locked);
                    }
                    let label = format!("{} ({})", layer.name, layer.strokes.len());
                    if ui.selectable_label(layer.active, label).clicked() {
                        app.document_mut().layers_mut().set_active(&layer.id);
                    }
                    if ui.small_button("⏶").clicked() {
                        app.document_mut().layers_mut().move_layer(&layer.id, index + 1);
                    }
                    if index > 0 && ui.small_button("⏷").clicked() {
                        app.document_mut().layers_mut().move_layer(&layer.id, index - 1);
                    }
                    if ui.small_button("🗑").clicked() && !app.document_mut().layers_mut().remove_layer(&layer.id) {
                        app.set_status("The last layer can't be removed");
                    }
                });
            }
        });
}
