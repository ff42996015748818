#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::path::PathBuf;
use std::sync::{mpsc, Arc};

use eframe::egui;

use metapho::config::Config;
use metapho::pipeline::{collect_images, Extractor};
use metapho::report::{Item, Report};

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let viewport = egui::ViewportBuilder::default()
        .with_inner_size([1000.0, 720.0])
        .with_min_inner_size([700.0, 450.0])
        .with_drag_and_drop(true);

    let options = eframe::NativeOptions {
        viewport,
        ..Default::default()
    };

    eframe::run_native(
        "Photo Metadata Viewer",
        options,
        Box::new(|cc| Ok(Box::new(App::new(cc)?))),
    )
}

// ── Messages sent from background tasks to the UI ───────────────────

enum BgMessage {
    /// Extraction finished for one image, tagged with the batch it was spawned in.
    Report(u64, PathBuf, Result<Report, String>),
}

/// Tracks in-flight extractions.
///
/// A settings change starts a new generation; results spawned under an older
/// one are dropped so they cannot overwrite fresh reports.
#[derive(Debug, Default)]
struct Batch {
    generation: u64,
    pending: usize,
}

impl Batch {
    /// Register one spawned task and return its generation.
    fn start(&mut self) -> u64 {
        self.pending += 1;
        self.generation
    }

    /// Forget every in-flight task.
    fn restart(&mut self) {
        self.generation += 1;
        self.pending = 0;
    }

    /// Record a finished task. Returns `false` for results of an older generation.
    fn finish(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        self.pending = self.pending.saturating_sub(1);
        true
    }

    fn is_idle(&self) -> bool {
        self.pending == 0
    }
}

// ── Per-image state shown in the UI ─────────────────────────────────

struct ImageEntry {
    path: PathBuf,
    /// `None` while extraction is running.
    report: Option<Result<Report, String>>,
    /// Texture handle for the preview thumbnail.
    texture: Option<egui::TextureHandle>,
    /// Set once a preview was attempted, so undecodable files are not retried every frame.
    preview_tried: bool,
}

#[derive(PartialEq, Clone, Copy)]
enum Tab {
    Metadata,
    Settings,
}

// ── Main application state ──────────────────────────────────────────

struct App {
    config: Config,
    config_path: Option<PathBuf>,
    extractor: Arc<Extractor>,
    images: Vec<ImageEntry>,
    selected: Option<usize>,
    tab: Tab,
    batch: Batch,
    status: String,
    rx: mpsc::Receiver<BgMessage>,
    tx: mpsc::Sender<BgMessage>,
    /// Tokio runtime for async tasks.
    rt: tokio::runtime::Runtime,
}

impl App {
    fn new(_cc: &eframe::CreationContext<'_>) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let config = Config::load(None).unwrap_or_else(|e| {
            log::warn!("{e:#}");
            Config::default()
        });
        let extractor = Arc::new(Extractor::from_config(&config));

        Ok(Self {
            config,
            config_path: None,
            extractor,
            images: Vec::new(),
            selected: None,
            tab: Tab::Metadata,
            batch: Batch::default(),
            status: "Ready: drop images or click Open".into(),
            rx,
            tx,
            rt: tokio::runtime::Runtime::new()?,
        })
    }

    fn add_paths(&mut self, paths: Vec<PathBuf>) {
        let collected = collect_images(&paths);
        let first_new = self.images.len();
        for path in collected {
            if self.images.iter().any(|e| e.path == path) {
                continue;
            }
            self.spawn_extraction(path.clone());
            self.images.push(ImageEntry {
                path,
                report: None,
                texture: None,
                preview_tried: false,
            });
        }
        if self.images.len() > first_new {
            self.selected = Some(first_new);
        }
        self.status = format!("{} image(s) loaded", self.images.len());
    }

    fn spawn_extraction(&mut self, path: PathBuf) {
        let extractor = Arc::clone(&self.extractor);
        let tx = self.tx.clone();
        let generation = self.batch.start();

        self.rt.spawn(async move {
            let result = extractor.extract(&path).await.map_err(|e| {
                log::error!("{}: {e}", path.display());
                e.to_string()
            });
            let _ = tx.send(BgMessage::Report(generation, path, result));
        });
    }

    /// Re-run extraction for every loaded image with the current settings.
    fn refresh_all(&mut self) {
        self.extractor = Arc::new(Extractor::from_config(&self.config));
        self.batch.restart();
        let paths: Vec<PathBuf> = self.images.iter().map(|e| e.path.clone()).collect();
        for entry in &mut self.images {
            entry.report = None;
        }
        for path in paths {
            self.spawn_extraction(path);
        }
    }

    fn open_files(&mut self) {
        if let Some(paths) = rfd::FileDialog::new()
            .add_filter("Images", &["jpg", "jpeg", "png", "webp", "tif", "tiff", "heic", "heif"])
            .pick_files()
        {
            self.add_paths(paths);
        }
    }

    fn open_folder(&mut self) {
        if let Some(dir) = rfd::FileDialog::new().pick_folder() {
            self.add_paths(vec![dir]);
        }
    }

    fn poll_messages(&mut self) {
        while let Ok(msg) = self.rx.try_recv() {
            match msg {
                BgMessage::Report(generation, path, result) => {
                    if !self.batch.finish(generation) {
                        log::debug!("Dropping stale report for {}", path.display());
                        continue;
                    }
                    if let Some(entry) = self.images.iter_mut().find(|e| e.path == path) {
                        entry.report = Some(result);
                    }
                    if self.batch.is_idle() {
                        let failed = self
                            .images
                            .iter()
                            .filter(|e| matches!(e.report, Some(Err(_))))
                            .count();
                        self.status = format!(
                            "Done: {} image(s), {failed} failed",
                            self.images.len()
                        );
                    }
                }
            }
        }
    }
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_messages();

        // Request repaint while extracting so we pick up messages
        if !self.batch.is_idle() {
            ctx.request_repaint();
        }

        // Handle dropped files
        let dropped: Vec<PathBuf> = ctx.input(|i| {
            i.raw.dropped_files.iter()
                .filter_map(|f| f.path.clone())
                .collect()
        });
        if !dropped.is_empty() {
            self.add_paths(dropped);
        }

        // ── Top bar ─────────────────────────────────────────────────
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Photo Metadata Viewer");
                ui.separator();

                if ui.selectable_label(self.tab == Tab::Metadata, "📷 Metadata").clicked() {
                    self.tab = Tab::Metadata;
                }
                if ui.selectable_label(self.tab == Tab::Settings, "⚙ Settings").clicked() {
                    self.tab = Tab::Settings;
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if !self.batch.is_idle() {
                        ui.spinner();
                    }
                    ui.label(&self.status);
                });
            });
        });

        match self.tab {
            Tab::Metadata => self.show_metadata_tab(ctx),
            Tab::Settings => self.show_settings_tab(ctx),
        }
    }
}

// ── Metadata tab ────────────────────────────────────────────────────

impl App {
    fn show_metadata_tab(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("toolbar").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                if ui.button("📂 Open Image").clicked() {
                    self.open_files();
                }
                if ui.button("📁 Open Folder").clicked() {
                    self.open_folder();
                }
                ui.separator();

                let report = self
                    .selected
                    .and_then(|i| self.images.get(i))
                    .and_then(|e| e.report.as_ref())
                    .and_then(|r| r.as_ref().ok());
                if ui.add_enabled(report.is_some(), egui::Button::new("📋 Copy as Text")).clicked() {
                    if let Some(report) = report {
                        ui.ctx().copy_text(report.to_text());
                    }
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.add_enabled(!self.images.is_empty(), egui::Button::new("🗑 Clear All")).clicked() {
                        self.images.clear();
                        self.selected = None;
                        self.status = "Ready: drop images or click Open".into();
                    }
                });
            });
            ui.add_space(4.0);
        });

        // ── Left panel: image list ──────────────────────────────────
        egui::SidePanel::left("image_list")
            .default_width(240.0)
            .min_width(160.0)
            .show(ctx, |ui| {
                ui.heading("Images");
                ui.separator();

                if self.images.is_empty() {
                    ui.centered_and_justified(|ui| {
                        ui.label(egui::RichText::new("Drop images here\nor click Open")
                            .size(16.0)
                            .color(egui::Color32::GRAY));
                    });
                    return;
                }

                egui::ScrollArea::vertical().show(ui, |ui| {
                    let mut new_selected = self.selected;
                    for (i, entry) in self.images.iter().enumerate() {
                        let filename = entry.path.file_name()
                            .map(|f| f.to_string_lossy().to_string())
                            .unwrap_or_else(|| entry.path.display().to_string());

                        let status_icon = match &entry.report {
                            Some(Ok(_)) => "✅ ",
                            Some(Err(_)) => "❌ ",
                            None => "⏳ ",
                        };

                        let label = format!("{status_icon}{filename}");
                        if ui.selectable_label(self.selected == Some(i), &label).clicked() {
                            new_selected = Some(i);
                        }
                    }
                    self.selected = new_selected;
                });
            });

        // ── Central panel: preview + report ─────────────────────────
        egui::CentralPanel::default().show(ctx, |ui| {
            let Some(entry) = self.selected.and_then(|i| self.images.get_mut(i)) else {
                ui.centered_and_justified(|ui| {
                    ui.label(egui::RichText::new("Select an image from the list")
                        .size(18.0)
                        .color(egui::Color32::GRAY));
                });
                return;
            };

            load_preview(ctx, entry);

            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    if let Some(ref tex) = entry.texture {
                        let size = tex.size_vec2();
                        let scale = (300.0 / size.y).min(1.0);
                        ui.image(egui::load::SizedTexture::new(tex.id(), size * scale));
                    }
                    ui.label(format!("Path: {}", entry.path.display()));
                    ui.add_space(8.0);
                    ui.separator();

                    match &entry.report {
                        Some(Ok(report)) => show_report(ui, report),
                        Some(Err(err)) => {
                            ui.colored_label(
                                egui::Color32::from_rgb(220, 50, 50),
                                format!("Error extracting metadata: {err}"),
                            );
                        }
                        None => {
                            ui.horizontal(|ui| {
                                ui.spinner();
                                ui.label("Reading metadata...");
                            });
                        }
                    }
                });
        });
    }
}

fn load_preview(ctx: &egui::Context, entry: &mut ImageEntry) {
    if entry.preview_tried {
        return;
    }
    entry.preview_tried = true;

    // Try loading directly with the image crate (JPEG, PNG, WebP, TIFF)
    let decoded = std::fs::read(&entry.path).ok().and_then(|bytes| {
        image::load_from_memory(&bytes).ok()
    }).or_else(|| {
        // Fallback: use macOS `sips` to convert HEIC to JPEG for preview
        #[cfg(target_os = "macos")]
        {
            let tmp = std::env::temp_dir().join("metapho_preview.jpg");
            let status = std::process::Command::new("sips")
                .args(["-s", "format", "jpeg", "-s", "formatOptions", "70"])
                .arg(&entry.path)
                .arg("--out")
                .arg(&tmp)
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .status();
            if status.is_ok_and(|s| s.success()) {
                if let Ok(bytes) = std::fs::read(&tmp) {
                    let _ = std::fs::remove_file(&tmp);
                    return image::load_from_memory(&bytes).ok();
                }
            }
        }
        None
    });

    match decoded {
        Some(img) => {
            let img = img.thumbnail(400, 400);
            let size = [img.width() as usize, img.height() as usize];
            let rgba = img.to_rgba8();
            let pixels = rgba.as_flat_samples();
            let color_image = egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_slice());
            entry.texture = Some(ctx.load_texture(
                entry.path.to_string_lossy(),
                color_image,
                egui::TextureOptions::LINEAR,
            ));
        }
        None => log::debug!("No preview for {}", entry.path.display()),
    }
}

fn show_report(ui: &mut egui::Ui, report: &Report) {
    for (i, section) in report.sections.iter().enumerate() {
        egui::CollapsingHeader::new(egui::RichText::new(section.title).strong().size(15.0))
            .id_salt(("section", i))
            .default_open(true)
            .show(ui, |ui| show_items(ui, &section.items, &[i]));
    }
}

fn show_items(ui: &mut egui::Ui, items: &[Item], path: &[usize]) {
    for (i, item) in items.iter().enumerate() {
        match item {
            Item::Field { name, value } => {
                ui.horizontal_wrapped(|ui| {
                    ui.label(egui::RichText::new(format!("{name}:")).strong());
                    ui.label(value);
                });
            }
            Item::Value { value } => {
                ui.label(format!("• {value}"));
            }
            Item::Group { name, items } => {
                let mut child = path.to_vec();
                child.push(i);
                egui::CollapsingHeader::new(egui::RichText::new(name).strong())
                    .id_salt(&child)
                    .default_open(true)
                    .show(ui, |ui| show_items(ui, items, &child));
            }
            Item::Link { name, label, url } => {
                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new(format!("{name}:")).strong());
                    ui.hyperlink_to(label, url);
                });
            }
            Item::Note { text } => {
                ui.label(egui::RichText::new(text).italics().color(egui::Color32::GRAY));
            }
        }
    }
}

// ── Settings tab ────────────────────────────────────────────────────

impl App {
    fn show_settings_tab(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.heading("Configuration");
                ui.add_space(8.0);

                // Config file path
                ui.horizontal(|ui| {
                    ui.label("Config file:");
                    if let Some(ref path) = self.config_path {
                        ui.label(path.display().to_string());
                    } else {
                        ui.label("(default)");
                    }
                    if ui.button("Load...").clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("JSON", &["json"])
                            .pick_file()
                        {
                            match Config::load(Some(&path)) {
                                Ok(c) => {
                                    self.config = c;
                                    self.config_path = Some(path);
                                    self.status = "Config loaded".into();
                                    self.refresh_all();
                                }
                                Err(e) => {
                                    self.status = format!("Failed to load config: {e}");
                                }
                            }
                        }
                    }
                    if ui.button("Save").clicked() {
                        let path = self.config_path.as_deref();
                        match self.config.save(path) {
                            Ok(()) => self.status = "Config saved".into(),
                            Err(e) => self.status = format!("Failed to save config: {e}"),
                        }
                    }
                });

                ui.add_space(16.0);
                ui.separator();

                // ── Reverse geocoding ───────────────────────────────
                ui.add_space(8.0);
                egui::CollapsingHeader::new(egui::RichText::new("Reverse Geocoding").strong())
                    .default_open(true)
                    .show(ui, |ui| {
                        let geocoder = &mut self.config.geocoder;
                        ui.checkbox(&mut geocoder.enabled, "Enabled");
                        ui.horizontal(|ui| {
                            ui.label("Endpoint:");
                            ui.text_edit_singleline(&mut geocoder.endpoint);
                        });
                        ui.horizontal(|ui| {
                            ui.label("User agent:");
                            ui.text_edit_singleline(&mut geocoder.user_agent);
                        });
                        ui.horizontal(|ui| {
                            ui.label("Language:");
                            ui.text_edit_singleline(&mut geocoder.language);
                        });
                        ui.horizontal(|ui| {
                            ui.label("Timeout (s):");
                            ui.add(egui::DragValue::new(&mut geocoder.timeout_secs).range(1..=120));
                        });
                    });

                ui.add_space(8.0);
                ui.heading("Sections");
                ui.add_space(4.0);
                ui.checkbox(&mut self.config.iptc.enabled, "Read IPTC data");
                ui.checkbox(&mut self.config.xmp.enabled, "Read XMP data");

                ui.add_space(16.0);
                if ui.button("↻ Apply and reload").clicked() {
                    self.refresh_all();
                    self.tab = Tab::Metadata;
                }
            });
        });
    }
}
