use crate::app::ToolKind;
use crate::render::LineStyle;
use crate::SketchApp;

pub fn tools_panel(app: &mut SketchApp, ctx: &egui::Context) {
    egui::SidePanel::left("tools_panel")
        .resizable(true)
        .default_width(200.0)
        .show(ctx, |ui| {
            ui.heading("Tools");
            for tool in ToolKind::ALL {
                if ui.selectable_label(app.tool() == tool, tool.name()).clicked() {
                    app.set_tool(tool);
                }
            }
            ui.separator();

            let pen = app.pen_mut();
            ui.horizontal(|ui| {
                ui.label("Colour");
                ui.color_edit_button_srgba(&mut pen.color);
            });
            ui.add(egui::Slider::new(&mut pen.width, 0.5..=40.0).text("Width"));
            egui::ComboBox::from_label("Style")
                .selected_text(format!("{:?}", pen.style))
                .show_ui(ui, |ui| {
                    for style in [LineStyle::Solid, LineStyle::Dashed, LineStyle::Dotted] {
                        ui.selectable_value(&mut pen.style, style, format!("{style:?}"));
                    }
                });
            ui.separator();

            shape_library(app, ui);
        });
}

fn shape_library(app: &mut SketchApp, ui: &mut egui::Ui) {
    ui.heading("Shapes");
    let Some(library) = app.library() else {
        ui.label("Library unavailable");
        return;
    };

    // (id, label, favourite) gathered up front so the app can be mutated below.
    let mut rows: Vec<(String, String, bool)> = Vec::new();
    for category in library.categories() {
        if let Ok(shapes) = library.shapes_in(&category.name) {
            rows.extend(shapes.iter().map(|e| {
                (
                    e.id.to_string(),
                    format!("{} / {} ({})", e.category, e.record.name, e.record.usage_count),
                    e.record.favorite,
                )
            }));
        }
    }

    ui.horizontal(|ui| {
        ui.text_edit_singleline(&mut app.shape_name);
        if ui.button("Save last").clicked() && !app.shape_name.trim().is_empty() {
            let name = app.shape_name.trim().to_string();
            app.save_last_stroke_as_shape(&name);
            app.shape_name.clear();
        }
    });

    egui::ScrollArea::vertical().show(ui, |ui| {
        for (id, label, favorite) in rows {
            ui.horizontal(|ui| {
                let star = if favorite { "★" } else { "☆" };
                if ui.small_button(star).clicked() {
                    app.toggle_favorite(&id);
                }
                if ui.selectable_label(false, label).double_clicked() {
                    app.place_shape(&id);
                }
            });
        }
    });
}
