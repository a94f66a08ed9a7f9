use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};

use eframe::egui;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::engine::{EngineError, ImageEngine};
use crate::style::{self, ColorPalette, ThemeMode};

pub const APP_NAME: &str = "PixelPeek";

const MAX_RECENT: usize = 10;

/// Title shown in the window frame: just the application name, or the
/// application name plus the open file.
pub fn window_title(filename: Option<&str>) -> String {
    let base = format!("{} {}", APP_NAME, env!("CARGO_PKG_VERSION"));
    match filename {
        Some(name) => format!("{base}: {name}"),
        None => base,
    }
}

fn config_path(file: &str) -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("pixelpeek");
    path.push(file);
    path
}

#[derive(Serialize, Deserialize, Clone)]
struct RecentFile {
    path: PathBuf,
    timestamp: i64,
}

#[derive(Serialize, Deserialize, Default)]
struct RecentFiles {
    files: Vec<RecentFile>,
}

impl RecentFiles {
    fn load() -> Self {
        if let Ok(contents) = fs::read_to_string(config_path("recent_files.json")) {
            if let Ok(recent) = serde_json::from_str(&contents) {
                return recent;
            }
        }
        Self::default()
    }

    fn save(&self) {
        let path = config_path("recent_files.json");
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string_pretty(self) {
            let _ = fs::write(path, json);
        }
    }

    fn remember(&mut self, path: PathBuf) {
        self.files.retain(|f| f.path != path);
        let timestamp = chrono::Utc::now().timestamp();
        self.files.insert(0, RecentFile { path, timestamp });
        if self.files.len() > MAX_RECENT {
            self.files.truncate(MAX_RECENT);
        }
    }

    fn add_file(&mut self, path: PathBuf) {
        self.remember(path);
        self.save();
    }

    /// Paths for the Open Recent menu, most recent first, skipping files
    /// that no longer exist on disk.
    fn existing_paths(&self) -> Vec<PathBuf> {
        self.files
            .iter()
            .map(|f| f.path.clone())
            .filter(|p| p.exists())
            .collect()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq)]
pub enum ThemePreference {
    System,
    Light,
    Dark,
}

#[derive(Serialize, Deserialize)]
struct AppSettings {
    theme_preference: ThemePreference,
    show_toolbar: bool,
    show_info_bar: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme_preference: ThemePreference::System,
            show_toolbar: true,
            show_info_bar: true,
        }
    }
}

impl AppSettings {
    fn load() -> Self {
        if let Ok(contents) = fs::read_to_string(config_path("settings.json")) {
            if let Ok(settings) = serde_json::from_str(&contents) {
                return settings;
            }
        }
        Self::default()
    }

    fn save(&self) {
        let path = config_path("settings.json");
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string_pretty(self) {
            let _ = fs::write(path, json);
        }
    }
}

pub struct ViewerApp {
    engine: ImageEngine,
    texture: Option<egui::TextureHandle>,
    change_rx: Receiver<()>,
    theme_mode: ThemeMode,
    theme_preference: ThemePreference,
    recent_files: RecentFiles,
    show_toolbar: bool,
    show_info_bar: bool,
    show_about: bool,
    error_message: Option<String>,
}

impl ViewerApp {
    pub fn new(cc: &eframe::CreationContext<'_>, startup_file: Option<PathBuf>) -> Self {
        let settings = AppSettings::load();

        let system_theme = match cc.egui_ctx.theme() {
            egui::Theme::Dark => ThemeMode::Dark,
            egui::Theme::Light => ThemeMode::Light,
        };
        let initial_theme = match settings.theme_preference {
            ThemePreference::System => system_theme,
            ThemePreference::Light => ThemeMode::Light,
            ThemePreference::Dark => ThemeMode::Dark,
        };
        style::apply_theme(&cc.egui_ctx, initial_theme);

        let (tx, rx): (SyncSender<()>, Receiver<()>) = sync_channel(16);
        let mut engine = ImageEngine::new();
        engine.set_change_callback(Box::new(move || {
            let _ = tx.try_send(());
        }));

        let mut app = Self {
            engine,
            texture: None,
            change_rx: rx,
            theme_mode: initial_theme,
            theme_preference: settings.theme_preference,
            recent_files: RecentFiles::load(),
            show_toolbar: settings.show_toolbar,
            show_info_bar: settings.show_info_bar,
            show_about: false,
            error_message: None,
        };

        if let Some(path) = startup_file {
            info!("opening {} from the command line", path.display());
            app.open_path(path);
        }

        app
    }

    fn save_settings(&self) {
        AppSettings {
            theme_preference: self.theme_preference,
            show_toolbar: self.show_toolbar,
            show_info_bar: self.show_info_bar,
        }
        .save();
    }

    fn set_theme(&mut self, ctx: &egui::Context, preference: ThemePreference) {
        self.theme_preference = preference;
        self.theme_mode = match preference {
            ThemePreference::System => match ctx.theme() {
                egui::Theme::Dark => ThemeMode::Dark,
                egui::Theme::Light => ThemeMode::Light,
            },
            ThemePreference::Light => ThemeMode::Light,
            ThemePreference::Dark => ThemeMode::Dark,
        };
        style::apply_theme(ctx, self.theme_mode);
        self.save_settings();
    }

    fn report_error(&mut self, err: EngineError) {
        warn!("{err}");
        self.error_message = Some(err.to_string());
    }

    // --- Facade actions ---

    fn open_action(&mut self) {
        // Cancelling the picker is a silent no-op.
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("JPEG image", &["jpg", "jpeg"])
            .pick_file()
        {
            self.open_path(path);
        }
    }

    fn open_path(&mut self, path: PathBuf) {
        match self.engine.open(&path) {
            Ok(()) => self.recent_files.add_file(path),
            Err(err) => self.report_error(err),
        }
    }

    fn save_action(&mut self) {
        if let Err(err) = self.engine.save() {
            self.report_error(err);
        }
    }

    fn save_as_action(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("JPEG image", &["jpg", "jpeg"])
            .save_file()
        {
            match self.engine.save_as(&path) {
                Ok(()) => self.recent_files.add_file(path),
                Err(err) => self.report_error(err),
            }
        }
    }

    fn close_action(&mut self) {
        self.engine.close();
    }

    /// Runs once per frame after a change notification arrived: re-uploads
    /// the canvas texture from the engine and refreshes the window title.
    fn refresh_document_view(&mut self, ctx: &egui::Context) {
        self.texture = self.engine.image().map(|img| {
            let rgba = img.to_rgba8();
            let size = [rgba.width() as usize, rgba.height() as usize];
            let pixels = egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());
            ctx.load_texture("document", pixels, egui::TextureOptions::default())
        });

        let properties = self.engine.properties();
        let title = window_title(properties.as_ref().map(|p| p.filename.as_str()));
        ctx.send_viewport_cmd(egui::ViewportCommand::Title(title));
    }

    // --- Widgets ---

    fn top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            ui.add_space(4.0);
            egui::MenuBar::new().ui(ui, |ui| {
                let has_image = self.engine.has_image();

                ui.menu_button("File", |ui| {
                    if ui.button("Open...").clicked() {
                        self.open_action();
                        ui.close();
                    }

                    let recent = self.recent_files.existing_paths();
                    let mut recent_pick = None;
                    ui.menu_button("Open Recent", |ui| {
                        if recent.is_empty() {
                            ui.weak("No recent files");
                        }
                        for path in &recent {
                            let name = path
                                .file_name()
                                .and_then(|n| n.to_str())
                                .unwrap_or("Unknown");
                            if ui.button(name).clicked() {
                                recent_pick = Some(path.clone());
                                ui.close();
                            }
                        }
                    });
                    if let Some(path) = recent_pick {
                        self.open_path(path);
                        ui.close();
                    }

                    ui.separator();
                    if ui.add_enabled(has_image, egui::Button::new("Save")).clicked() {
                        self.save_action();
                        ui.close();
                    }
                    if ui
                        .add_enabled(has_image, egui::Button::new("Save as..."))
                        .clicked()
                    {
                        self.save_as_action();
                        ui.close();
                    }
                    if ui.add_enabled(has_image, egui::Button::new("Close")).clicked() {
                        self.close_action();
                        ui.close();
                    }
                    ui.separator();
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                        ui.close();
                    }
                });

                ui.menu_button("View", |ui| {
                    let toolbar_changed = ui.checkbox(&mut self.show_toolbar, "Show Toolbar").changed();
                    let info_changed = ui.checkbox(&mut self.show_info_bar, "Show Info Bar").changed();
                    if toolbar_changed || info_changed {
                        self.save_settings();
                    }

                    ui.separator();
                    ui.label("Theme:");
                    let system_clicked = ui
                        .selectable_label(matches!(self.theme_preference, ThemePreference::System), "System")
                        .clicked();
                    let light_clicked = ui
                        .selectable_label(matches!(self.theme_preference, ThemePreference::Light), "Light")
                        .clicked();
                    let dark_clicked = ui
                        .selectable_label(matches!(self.theme_preference, ThemePreference::Dark), "Dark")
                        .clicked();
                    if system_clicked {
                        self.set_theme(ctx, ThemePreference::System);
                        ui.close();
                    }
                    if light_clicked {
                        self.set_theme(ctx, ThemePreference::Light);
                        ui.close();
                    }
                    if dark_clicked {
                        self.set_theme(ctx, ThemePreference::Dark);
                        ui.close();
                    }
                });

                ui.menu_button("Help", |ui| {
                    if ui.button("About").clicked() {
                        self.show_about = true;
                        ui.close();
                    }
                });
            });
            ui.add_space(4.0);
        });
    }

    fn toolbar(&mut self, ctx: &egui::Context) {
        if !self.show_toolbar {
            return;
        }
        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.add_space(2.0);
            ui.horizontal(|ui| {
                if ui.button("Open").clicked() {
                    self.open_action();
                }
                if ui
                    .add_enabled(self.engine.has_image(), egui::Button::new("Save"))
                    .clicked()
                {
                    self.save_action();
                }
                if ui.button("Help").clicked() {
                    self.show_about = true;
                }
            });
            ui.add_space(2.0);
        });
    }

    fn info_bar(&mut self, ctx: &egui::Context) {
        if !self.show_info_bar {
            return;
        }
        let properties = self.engine.properties();
        let theme = self.theme_mode;
        egui::TopBottomPanel::bottom("info_bar").show(ctx, |ui| {
            ui.add_space(2.0);
            ui.horizontal(|ui| {
                let (filename, width, height, format, mode) = match &properties {
                    Some(p) => (
                        p.filename.clone(),
                        p.width.to_string(),
                        p.height.to_string(),
                        p.format.to_string(),
                        p.mode.to_string(),
                    ),
                    None => Default::default(),
                };
                style::info_field(ui, "Filename", &filename, 220.0, theme);
                style::info_field(ui, "Width", &width, 40.0, theme);
                style::info_field(ui, "Height", &height, 40.0, theme);
                style::info_field(ui, "Format", &format, 40.0, theme);
                style::info_field(ui, "Mode", &mode, 40.0, theme);
            });
            ui.add_space(2.0);
        });
    }

    fn canvas(&self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some(texture) = &self.texture {
                egui::ScrollArea::both()
                    .auto_shrink([false, false])
                    .show(ui, |ui| {
                        ui.image((texture.id(), texture.size_vec2()))
                            .on_hover_text(self.engine.properties_text());
                    });
            } else {
                ui.centered_and_justified(|ui| {
                    ui.weak("No image open");
                });
            }
        });
    }

    fn modal_colors(&self) -> (egui::Color32, egui::Color32, egui::Color32, egui::Color32) {
        if matches!(self.theme_mode, ThemeMode::Dark) {
            (
                ColorPalette::ZINC_800,
                ColorPalette::ZINC_700,
                ColorPalette::SLATE_100,
                egui::Color32::from_rgba_premultiplied(0, 0, 0, 200),
            )
        } else {
            (
                egui::Color32::WHITE,
                ColorPalette::GRAY_300,
                ColorPalette::GRAY_900,
                egui::Color32::from_rgba_premultiplied(0, 0, 0, 150),
            )
        }
    }

    fn render_error_modal(&mut self, ctx: &egui::Context) {
        let Some(message) = self.error_message.clone() else {
            return;
        };
        let (bg_color, border_color, text_color, overlay_color) = self.modal_colors();

        egui::Area::new(egui::Id::new("error_overlay"))
            .fixed_pos(egui::pos2(0.0, 0.0))
            .order(egui::Order::Foreground)
            .interactable(false)
            .show(ctx, |ui| {
                ui.painter().rect_filled(ctx.content_rect(), 0.0, overlay_color);
            });

        let mut dismissed = false;
        egui::Window::new("Error")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .order(egui::Order::Tooltip)
            .frame(
                egui::Frame::new()
                    .fill(bg_color)
                    .stroke(egui::Stroke::new(1.0, border_color))
                    .corner_radius(8.0)
                    .inner_margin(24.0),
            )
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.add_space(4.0);
                    ui.label(
                        egui::RichText::new("Something went wrong")
                            .size(16.0)
                            .color(ColorPalette::RED_400),
                    );
                    ui.add_space(8.0);
                    ui.label(egui::RichText::new(&message).size(13.0).color(text_color));
                    ui.add_space(16.0);
                    if style::primary_button(ui, "OK").clicked() {
                        dismissed = true;
                    }
                    ui.add_space(4.0);
                });
            });

        if dismissed {
            self.error_message = None;
        }
    }

    fn render_about_modal(&mut self, ctx: &egui::Context) {
        if !self.show_about {
            return;
        }
        let (bg_color, border_color, text_color, overlay_color) = self.modal_colors();

        egui::Area::new(egui::Id::new("about_overlay"))
            .fixed_pos(egui::pos2(0.0, 0.0))
            .order(egui::Order::Foreground)
            .interactable(false)
            .show(ctx, |ui| {
                ui.painter().rect_filled(ctx.content_rect(), 0.0, overlay_color);
            });

        let mut dismissed = false;
        egui::Window::new("About")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .order(egui::Order::Tooltip)
            .frame(
                egui::Frame::new()
                    .fill(bg_color)
                    .stroke(egui::Stroke::new(1.0, border_color))
                    .corner_radius(8.0)
                    .inner_margin(24.0),
            )
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.add_space(4.0);
                    ui.label(
                        egui::RichText::new(window_title(None))
                            .size(16.0)
                            .strong()
                            .color(text_color),
                    );
                    ui.add_space(8.0);
                    ui.label(
                        egui::RichText::new("A small desktop image viewer.")
                            .size(13.0)
                            .color(text_color),
                    );
                    ui.label(
                        egui::RichText::new("Decoding and encoding by the image crate.")
                            .size(13.0)
                            .color(text_color),
                    );
                    ui.add_space(16.0);
                    if style::primary_button(ui, "Close").clicked() {
                        dismissed = true;
                    }
                    ui.add_space(4.0);
                });
            });

        if dismissed {
            self.show_about = false;
        }
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if matches!(self.theme_preference, ThemePreference::System) {
            let system_theme = match ctx.theme() {
                egui::Theme::Dark => ThemeMode::Dark,
                egui::Theme::Light => ThemeMode::Light,
            };
            if self.theme_mode != system_theme {
                self.theme_mode = system_theme;
                style::apply_theme(ctx, self.theme_mode);
            }
        }

        let mut changed = false;
        while self.change_rx.try_recv().is_ok() {
            changed = true;
        }
        if changed {
            self.refresh_document_view(ctx);
        }

        self.render_error_modal(ctx);
        self.render_about_modal(ctx);

        self.top_bar(ctx);
        self.toolbar(ctx);
        self.info_bar(ctx);
        self.canvas(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_title_reflects_open_document() {
        let base = format!("{} {}", APP_NAME, env!("CARGO_PKG_VERSION"));
        assert_eq!(window_title(None), base);
        assert_eq!(window_title(Some("photo.jpg")), format!("{base}: photo.jpg"));
    }

    #[test]
    fn recent_files_dedupe_and_cap() {
        let mut recent = RecentFiles::default();
        for i in 0..(MAX_RECENT + 5) {
            recent.remember(PathBuf::from(format!("/tmp/img-{i}.png")));
        }
        recent.remember(PathBuf::from("/tmp/img-12.png"));

        assert_eq!(recent.files.len(), MAX_RECENT);
        assert_eq!(recent.files[0].path, PathBuf::from("/tmp/img-12.png"));
        let unique: std::collections::HashSet<_> =
            recent.files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(unique.len(), recent.files.len());
    }

    #[test]
    fn settings_round_trip_and_fallback() {
        let settings = AppSettings {
            theme_preference: ThemePreference::Dark,
            show_toolbar: false,
            show_info_bar: true,
        };
        let json = serde_json::to_string(&settings).unwrap();
        let back: AppSettings = serde_json::from_str(&json).unwrap();
        assert!(matches!(back.theme_preference, ThemePreference::Dark));
        assert!(!back.show_toolbar);
        assert!(back.show_info_bar);

        assert!(serde_json::from_str::<AppSettings>("{ not json").is_err());
        let defaults = AppSettings::default();
        assert!(matches!(defaults.theme_preference, ThemePreference::System));
        assert!(defaults.show_toolbar && defaults.show_info_bar);
    }
}
