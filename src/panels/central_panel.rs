use egui::{Pos2, Rect, Sense};

use crate::app::{Gesture, CANVAS_FALLBACK};
use crate::SketchApp;

pub fn central_panel(app: &mut SketchApp, ctx: &egui::Context) {
    egui::CentralPanel::default()
        .frame(egui::Frame::none())
        .show(ctx, |ui| {
            let canvas_rect = ui.available_rect_before_wrap();
            let response = ui.allocate_rect(canvas_rect, Sense::drag());
            let to_doc = |p: Pos2| Pos2::ZERO + (p - canvas_rect.min);

            let size = [
                canvas_rect.width().round().max(1.0) as usize,
                canvas_rect.height().round().max(1.0) as usize,
            ];
            let painter = ui.painter_at(canvas_rect);
            match app.canvas_texture(ctx, size) {
                Some(texture) => {
                    let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
                    painter.image(texture.id(), canvas_rect, uv, egui::Color32::WHITE);
                }
                None => {
                    painter.rect_filled(canvas_rect, 0.0, CANVAS_FALLBACK);
                }
            }

            if response.drag_started() {
                if let Some(pos) = response.interact_pointer_pos() {
                    app.gesture = Some(Gesture {
                        points: vec![to_doc(pos)],
                    });
                }
            }
            if response.dragged() {
                if let (Some(gesture), Some(pos)) = (app.gesture.as_mut(), response.interact_pointer_pos()) {
                    gesture.points.push(to_doc(pos));
                }
            }
            if response.drag_stopped() {
                app.finish_gesture();
            }

            // Preview of the stroke being dragged, drawn straight in screen space.
            if let Some(gesture) = &app.gesture {
                let points: Vec<Pos2> = gesture
                    .points
                    .iter()
                    .map(|p| canvas_rect.min + p.to_vec2())
                    .collect();
                painter.add(egui::Shape::line(
                    points,
                    egui::Stroke::new(1.0, egui::Color32::DARK_GRAY),
                ));
            }

            if ctx.input(|i| !i.raw.dropped_files.is_empty()) {
                let at = ctx
                    .input(|i| i.pointer.hover_pos())
                    .map(to_doc)
                    .unwrap_or(Pos2::new(20.0, 20.0));
                app.handle_dropped_files(ctx, at);
            }
        });
}
