use eframe::egui;
use egui::{Align2, Color32, FontId, Pos2, Rect, RichText, Sense, Stroke, TextureHandle, Vec2};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use hexpick::clipboard::{CopyFeedback, SystemClipboard};
use hexpick::color::{ColorField, ColorSample};
use hexpick::controller::{PickerController, PickerEvent};
use hexpick::error::LoadError;
use hexpick::history::{COLOR_KEY, HistoryChange, HistoryStore, IMAGE_KEY};
use hexpick::settings::AppSettings;
use hexpick::stage::StagePhase;
use hexpick::storage::{FileStore, KeyValueStore, MemoryStore};
use hexpick::{io, log_info, log_warn, t};

const PANEL_WIDTH: f32 = 270.0;
const SWATCH_SIZE: f32 = 28.0;
const THUMB_HEIGHT: f32 = 56.0;
const LIVE_PREVIEW_SIZE: f32 = 28.0;
const ACCENT: Color32 = Color32::from_rgb(66, 133, 244);

/// Clicks on history widgets, applied after the panel is drawn.
enum HistoryAction {
    SelectColor(String),
    DeleteColor(String),
    OpenImage(u64),
    DeleteImage(u64),
}

pub struct HexpickApp {
    settings: AppSettings,
    picker: PickerController<Box<dyn KeyValueStore>>,
    clipboard: SystemClipboard,
    copy_feedback: CopyFeedback,
    /// Pending alert message, shown in a modal window.
    alert: Option<String>,
    /// Stage texture and the stage generation it was uploaded for.
    texture: Option<(u64, TextureHandle)>,
    /// History thumbnails by timestamp; `None` marks an undecodable thumbnail.
    thumbnails: HashMap<u64, Option<TextureHandle>>,
    hover_pixel: Option<(u32, u32)>,
}

impl HexpickApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, settings: AppSettings) -> Self {
        let store = open_history_store(&settings);
        let history = HistoryStore::open(store);
        Self {
            settings,
            picker: PickerController::new(history),
            clipboard: SystemClipboard,
            copy_feedback: CopyFeedback::default(),
            alert: None,
            texture: None,
            thumbnails: HashMap::new(),
            hover_pixel: None,
        }
    }

    // ------------------------------------------------------------------------
    //  Loading
    // ------------------------------------------------------------------------

    fn open_dialog(&mut self) {
        if let Some(path) = io::pick_image_path() {
            self.open_path(&path);
        }
    }

    fn open_path(&mut self, path: &Path) {
        if let Err(e) = self.picker.open_path(path) {
            self.report_load_error(&e);
        }
    }

    fn open_dropped(&mut self, file: egui::DroppedFile) {
        if let Some(path) = &file.path {
            self.open_path(path);
        } else if let Some(bytes) = &file.bytes {
            if let Err(e) = self.picker.open_bytes(&file.name, None, bytes.to_vec()) {
                self.report_load_error(&e);
            }
        }
    }

    fn report_load_error(&mut self, err: &LoadError) {
        log_warn!("Load rejected: {}", err);
        self.alert = Some(t!(err.alert_key()));
    }

    fn handle_events(&mut self, events: Vec<PickerEvent>) {
        for event in events {
            match event {
                PickerEvent::Displayed {
                    name,
                    width,
                    height,
                } => {
                    log_info!("Shown '{}' at {}x{}", name, width, height);
                }
                PickerEvent::LoadFailed { error, .. } => self.report_load_error(&error),
                PickerEvent::HistoryChanged(change) => self.history_changed(change),
            }
        }
    }

    fn history_changed(&mut self, change: HistoryChange) {
        if change.images {
            let history = self.picker.history();
            self.thumbnails.retain(|ts, _| history.image(*ts).is_some());
        }
    }

    // ------------------------------------------------------------------------
    //  Textures
    // ------------------------------------------------------------------------

    fn stage_texture(&mut self, ctx: &egui::Context) -> Option<egui::TextureId> {
        let stage = self.picker.stage();
        let raster = stage.raster()?;
        let generation = stage.generation();
        if self.texture.as_ref().map(|(g, _)| *g) != Some(generation) {
            let image = egui::ColorImage::from_rgba_unmultiplied(
                [raster.width() as usize, raster.height() as usize],
                raster.as_raw(),
            );
            let handle = ctx.load_texture("stage", image, egui::TextureOptions::LINEAR);
            self.texture = Some((generation, handle));
        }
        self.texture.as_ref().map(|(_, h)| h.id())
    }

    fn sync_thumbnails(&mut self, ctx: &egui::Context) {
        for entry in self.picker.history().images() {
            if self.thumbnails.contains_key(&entry.timestamp) {
                continue;
            }
            let handle = match io::decode_thumbnail(&entry.thumbnail) {
                Ok(img) => {
                    let image = egui::ColorImage::from_rgba_unmultiplied(
                        [img.width() as usize, img.height() as usize],
                        img.as_raw(),
                    );
                    Some(ctx.load_texture(
                        format!("thumb-{}", entry.timestamp),
                        image,
                        egui::TextureOptions::LINEAR,
                    ))
                }
                Err(e) => {
                    log_warn!("Thumbnail of '{}' unreadable: {}", entry.name, e);
                    None
                }
            };
            self.thumbnails.insert(entry.timestamp, handle);
        }
    }

    // ------------------------------------------------------------------------
    //  Canvas
    // ------------------------------------------------------------------------

    fn canvas_ui(&mut self, ui: &mut egui::Ui) {
        let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::click_and_drag());
        let rect = response.rect;
        let margin = self.settings.viewport_margin;
        self.picker
            .set_viewport((rect.width() - margin).max(1.0), (rect.height() - margin).max(1.0));

        match self.picker.phase() {
            StagePhase::Empty => {
                let dragging_file = ui.input(|i| !i.raw.hovered_files.is_empty());
                draw_upload_area(&painter, rect.shrink(margin / 2.0), dragging_file);
                if response.clicked() {
                    self.open_dialog();
                }
            }
            StagePhase::Loading => {
                ui.put(
                    Rect::from_center_size(rect.center(), Vec2::splat(36.0)),
                    egui::Spinner::new().size(36.0),
                );
                let name = self.picker.loading_name().unwrap_or_default();
                painter.text(
                    rect.center() + Vec2::new(0.0, 40.0),
                    Align2::CENTER_TOP,
                    t!("status.loading", name = name),
                    FontId::proportional(14.0),
                    ui.visuals().weak_text_color(),
                );
                ui.ctx().request_repaint();
            }
            StagePhase::Displayed => self.stage_ui(ui, &response, &painter),
        }
    }

    fn stage_ui(&mut self, ui: &mut egui::Ui, response: &egui::Response, painter: &egui::Painter) {
        let Some(texture) = self.stage_texture(ui.ctx()) else {
            return;
        };
        let rect = response.rect;
        let (dw, dh) = self.picker.stage().display_size();
        let origin = rect.center() - Vec2::new(dw, dh) / 2.0;
        let origin = (origin.x, origin.y);

        let ((vx, vy), (vw, vh)) = self.picker.stage().visual_rect(origin);
        let image_rect = Rect::from_min_size(Pos2::new(vx, vy), Vec2::new(vw, vh));
        painter.image(
            texture,
            image_rect,
            Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
            Color32::WHITE,
        );

        // Middle-button pan follows the pointer even outside the canvas.
        let pointer = ui.input(|i| i.pointer.interact_pos());
        if response.hovered() && ui.input(|i| i.pointer.button_pressed(egui::PointerButton::Middle))
            && let Some(pos) = pointer
        {
            self.picker.begin_pan((pos.x, pos.y));
        }
        if self.picker.is_panning() {
            if let Some(pos) = pointer {
                self.picker.drag_to((pos.x, pos.y));
            }
            if !ui.input(|i| i.pointer.middle_down()) {
                self.picker.end_pan();
            }
        }

        let Some(pos) = response.hover_pos() else {
            self.picker.leave();
            self.hover_pixel = None;
            return;
        };
        ui.output_mut(|o| o.cursor_icon = egui::CursorIcon::Crosshair);
        let local = self.picker.stage().box_local((pos.x, pos.y), origin);

        let scroll = ui.input(|i| i.scroll_delta.y);
        if scroll != 0.0 {
            self.picker.wheel(scroll, local);
        }

        if response.clicked()
            && let Some(change) = self.picker.click(local.0, local.1)
        {
            self.history_changed(change);
        }

        self.hover_pixel = self.picker.stage().pixel_at(local.0, local.1);
        let hover = self.picker.hover(local.0, local.1).map(sample_color);

        // Crosshair
        let stroke = Stroke::new(1.0, Color32::from_white_alpha(160));
        painter.hline(rect.x_range(), pos.y, stroke);
        painter.vline(pos.x, rect.y_range(), stroke);

        if self.settings.live_preview
            && self.hover_pixel.is_some()
            && let Some(color) = hover
        {
            let swatch = Rect::from_min_size(pos + Vec2::splat(20.0), Vec2::splat(LIVE_PREVIEW_SIZE));
            painter.rect_filled(swatch, 4.0, color);
            painter.rect_stroke(swatch, 4.0, Stroke::new(2.0, Color32::WHITE));
        }
    }

    // ------------------------------------------------------------------------
    //  Side panel
    // ------------------------------------------------------------------------

    fn color_panel_ui(&mut self, ui: &mut egui::Ui, now: f64) {
        ui.heading(t!("panel.current_color"));
        ui.add_space(6.0);

        match self.picker.current().cloned() {
            Some(sample) => {
                let (swatch, _) =
                    ui.allocate_exact_size(Vec2::new(ui.available_width(), 48.0), Sense::hover());
                ui.painter().rect_filled(swatch, 6.0, sample_color(&sample));
                ui.add_space(6.0);
                let copied = self.copy_feedback.visible(now);
                for field in ColorField::ALL {
                    ui.horizontal(|ui| {
                        ui.label(RichText::new(field.label()).monospace().strong());
                        let value = field.value(&sample);
                        ui.add(
                            egui::TextEdit::singleline(&mut value.as_str())
                                .desired_width(130.0)
                                .font(egui::TextStyle::Monospace),
                        );
                        if ui.button(t!("button.copy")).clicked() {
                            self.copy(ui, field, now);
                        }
                        if copied == Some(field) {
                            ui.label(RichText::new(t!("notice.copied")).color(ACCENT));
                        }
                    });
                }
            }
            None => {
                ui.label(RichText::new(t!("panel.no_color")).weak());
            }
        }

        ui.separator();
        let mut action = None;
        self.color_history_ui(ui, &mut action);
        ui.separator();
        self.image_history_ui(ui, &mut action);

        match action {
            Some(HistoryAction::SelectColor(hex)) => {
                self.picker.select_history_color(&hex);
            }
            Some(HistoryAction::DeleteColor(hex)) => {
                let change = self.picker.delete_history_color(&hex);
                self.history_changed(change);
            }
            Some(HistoryAction::OpenImage(ts)) => {
                self.picker.open_history_image(ts);
            }
            Some(HistoryAction::DeleteImage(ts)) => {
                let change = self.picker.delete_history_image(ts);
                self.history_changed(change);
            }
            None => {}
        }
    }

    fn copy(&mut self, ui: &egui::Ui, field: ColorField, now: f64) {
        match self.picker.copy_field(field, &mut self.clipboard) {
            Ok(Some(_)) => self.copy_feedback.show(field, now),
            Ok(None) => {}
            Err(e) => {
                // egui forwards copied text to the platform itself.
                log_warn!("System clipboard failed, using egui output: {}", e);
                if let Some(sample) = self.picker.current() {
                    let text = field.value(sample);
                    ui.output_mut(|o| o.copied_text = text);
                    self.copy_feedback.show(field, now);
                }
            }
        }
    }

    fn color_history_ui(&self, ui: &mut egui::Ui, action: &mut Option<HistoryAction>) {
        ui.label(RichText::new(t!("panel.color_history")).strong());
        let colors = self.picker.history().colors();
        if colors.is_empty() {
            ui.label(RichText::new(t!("panel.empty_history")).weak());
            return;
        }
        ui.horizontal_wrapped(|ui| {
            for sample in colors {
                ui.vertical(|ui| {
                    let (rect, response) =
                        ui.allocate_exact_size(Vec2::splat(SWATCH_SIZE), Sense::click());
                    ui.painter().rect_filled(rect, 4.0, sample_color(sample));
                    if response.on_hover_text(sample.hex.as_str()).clicked() {
                        *action = Some(HistoryAction::SelectColor(sample.hex.clone()));
                    }
                    if ui
                        .small_button("×")
                        .on_hover_text(t!("tooltip.delete"))
                        .clicked()
                    {
                        *action = Some(HistoryAction::DeleteColor(sample.hex.clone()));
                    }
                });
            }
        });
    }

    fn image_history_ui(&self, ui: &mut egui::Ui, action: &mut Option<HistoryAction>) {
        ui.label(RichText::new(t!("panel.image_history")).strong());
        let images = self.picker.history().images();
        if images.is_empty() {
            ui.label(RichText::new(t!("panel.empty_history")).weak());
            return;
        }
        egui::ScrollArea::vertical().show(ui, |ui| {
            for entry in images {
                ui.horizontal(|ui| {
                    let texture = self.thumbnails.get(&entry.timestamp).and_then(Option::as_ref);
                    let width = texture.map_or(THUMB_HEIGHT, |t| {
                        let [w, h] = t.size();
                        THUMB_HEIGHT * w as f32 / h.max(1) as f32
                    });
                    let (rect, response) =
                        ui.allocate_exact_size(Vec2::new(width, THUMB_HEIGHT), Sense::click());
                    match texture {
                        Some(t) => ui.painter().image(
                            t.id(),
                            rect,
                            Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
                            Color32::WHITE,
                        ),
                        None => ui.painter().rect_filled(rect, 4.0, Color32::DARK_GRAY),
                    }
                    if response.on_hover_text(entry.name.as_str()).clicked() {
                        *action = Some(HistoryAction::OpenImage(entry.timestamp));
                    }
                    ui.vertical(|ui| {
                        ui.add(egui::Label::new(entry.name.as_str()).truncate(true));
                        if ui
                            .small_button("×")
                            .on_hover_text(t!("tooltip.delete"))
                            .clicked()
                        {
                            *action = Some(HistoryAction::DeleteImage(entry.timestamp));
                        }
                    });
                });
            }
        });
    }

    fn alert_ui(&mut self, ctx: &egui::Context) {
        let Some(message) = self.alert.clone() else {
            return;
        };
        let mut close = false;
        egui::Window::new(t!("alert.title"))
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label(message.as_str());
                ui.add_space(8.0);
                if ui.button(t!("alert.ok")).clicked() {
                    close = true;
                }
            });
        if close {
            self.alert = None;
        }
    }
}

impl eframe::App for HexpickApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let events = self.picker.poll();
        self.handle_events(events);

        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        if let Some(file) = dropped.into_iter().next() {
            self.open_dropped(file);
        }

        self.sync_thumbnails(ctx);
        let now = ctx.input(|i| i.time);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button(t!("button.open")).clicked() {
                    self.open_dialog();
                }
                let displayed = self.picker.phase() == StagePhase::Displayed;
                if ui
                    .add_enabled(displayed, egui::Button::new(t!("button.new_image")))
                    .clicked()
                {
                    self.picker.reset();
                    self.hover_pixel = None;
                }
            });
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if self.picker.phase() == StagePhase::Displayed {
                    let percent = (self.picker.stage().scale() * 100.0).round();
                    ui.label(t!("status.zoom", percent = percent));
                }
                if let Some((x, y)) = self.hover_pixel {
                    ui.separator();
                    ui.label(t!("status.pixel", x = x, y = y));
                }
            });
        });

        egui::SidePanel::right("colors")
            .resizable(false)
            .exact_width(PANEL_WIDTH)
            .show(ctx, |ui| self.color_panel_ui(ui, now));

        egui::CentralPanel::default().show(ctx, |ui| self.canvas_ui(ui));

        self.alert_ui(ctx);

        if let Some(left) = self.copy_feedback.remaining(now) {
            ctx.request_repaint_after(Duration::from_secs_f64(left));
        }
    }
}

/// File-backed history under the configured directory, or an in-memory store
/// when that directory cannot be used.
fn open_history_store(settings: &AppSettings) -> Box<dyn KeyValueStore> {
    let opened = settings
        .resolved_history_dir()
        .map(|dir| FileStore::open(dir).map(|s| s.with_keys([COLOR_KEY, IMAGE_KEY])));
    match opened {
        Some(Ok(store)) => {
            log_info!("History directory: {}", store.dir().display());
            Box::new(store)
        }
        Some(Err(e)) => {
            log_warn!("History directory unusable, keeping history in memory: {}", e);
            Box::new(MemoryStore::new())
        }
        None => {
            log_warn!("No configuration directory, keeping history in memory");
            Box::new(MemoryStore::new())
        }
    }
}

fn sample_color(sample: &ColorSample) -> Color32 {
    let [r, g, b] = sample.rgb;
    Color32::from_rgb(r, g, b)
}

fn draw_upload_area(painter: &egui::Painter, rect: Rect, highlighted: bool) {
    let stroke_color = if highlighted { ACCENT } else { Color32::GRAY };
    painter.rect_stroke(rect, 8.0, Stroke::new(2.0, stroke_color));
    painter.text(
        rect.center() - Vec2::new(0.0, 12.0),
        Align2::CENTER_CENTER,
        t!("upload.hint"),
        FontId::proportional(18.0),
        stroke_color,
    );
    painter.text(
        rect.center() + Vec2::new(0.0, 14.0),
        Align2::CENTER_CENTER,
        t!("upload.drop"),
        FontId::proportional(13.0),
        Color32::GRAY,
    );
}
