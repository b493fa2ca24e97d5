use std::path::{Path, PathBuf};
use std::sync::Arc;

use eframe::egui::{self, ColorImage, TextureHandle, TextureOptions};

use crate::catalog::{self, ModelEntry};
use crate::driver::SessionDriver;
use crate::erase::EraseBrush;
use crate::mapping::ChannelMapping;
use crate::onnx::OnnxLoader;
use crate::session::{SessionController, SessionStatus};
use crate::types::{GridShape, GridStats, SessionConfig, SpeedSetting};

/// Startup settings gathered from the command line.
pub struct Launch {
    pub config: SessionConfig,
    pub mapping: ChannelMapping,
    pub models_dir: PathBuf,
    pub labels: PathBuf,
    pub initial_model: Option<PathBuf>,
}

enum Catalog {
    Models(Vec<ModelEntry>),
    Failed,
}

/// Copy of the session state the panels need, taken once per frame so the
/// lock is not held while laying out widgets.
struct Snapshot {
    status: SessionStatus,
    running: bool,
    mapping: ChannelMapping,
    shape: GridShape,
    steps: u64,
    skipped: u64,
    discarded: u64,
    stats: GridStats,
    model: Option<PathBuf>,
}

pub struct NcaApp {
    driver: SessionDriver,
    catalog: Catalog,
    selected: Option<usize>,
    texture: Option<TextureHandle>,
    shown_frame: u64,
    speed: u8,
    preview: Option<ChannelMapping>,
}

impl NcaApp {
    pub fn new(cc: &eframe::CreationContext<'_>, launch: Launch) -> std::io::Result<Self> {
        let listed = catalog::ensure_models_dir(&launch.models_dir)
            .and_then(|()| catalog::discover(&launch.models_dir, Some(launch.labels.as_path())));
        let catalog = match listed {
            Ok(models) => Catalog::Models(models),
            Err(err) => {
                tracing::error!(%err, "error loading models list");
                Catalog::Failed
            }
        };

        let initial = launch.initial_model.or_else(|| match &catalog {
            Catalog::Models(models) => models.first().map(|model| model.path.clone()),
            Catalog::Failed => None,
        });
        let selected = match (&catalog, &initial) {
            (Catalog::Models(models), Some(path)) => models.iter().position(|m| &m.path == path),
            _ => None,
        };

        let mut session = SessionController::new(launch.config, Arc::new(OnnxLoader));
        session.set_mapping(launch.mapping);
        let speed = session.speed().0;

        let ctx = cc.egui_ctx.clone();
        let driver = SessionDriver::spawn(session, move || ctx.request_repaint())?;
        if let Some(path) = initial {
            if let Err(err) = driver.command(|session, _| session.load_model(path)) {
                tracing::debug!(%err, "initial model not started");
            }
        }

        Ok(Self {
            driver,
            catalog,
            selected,
            texture: None,
            shown_frame: 0,
            speed,
            preview: None,
        })
    }

    fn snapshot(&self) -> Snapshot {
        let session = self.driver.session();
        Snapshot {
            status: session.status().clone(),
            running: session.is_running(),
            mapping: session.mapping(),
            shape: session.config().shape,
            steps: session.steps(),
            skipped: session.skipped(),
            discarded: session.discarded(),
            stats: session.stats(),
            model: session.model_path().map(PathBuf::from),
        }
    }

    fn update_texture(&mut self, ctx: &egui::Context) {
        let session = self.driver.session();
        if session.grid().is_none() {
            self.texture = None;
            return;
        }
        if session.frame() == self.shown_frame && self.texture.is_some() {
            return;
        }
        self.shown_frame = session.frame();

        let shape = session.config().shape;
        let image = ColorImage::from_rgba_unmultiplied([shape.width, shape.height], session.pixels());
        drop(session);

        if let Some(texture) = &mut self.texture {
            texture.set(image, TextureOptions::NEAREST);
        } else {
            self.texture = Some(ctx.load_texture("nca-grid", image, TextureOptions::NEAREST));
        }
    }

    fn draw_controls(&mut self, ui: &mut egui::Ui, snapshot: &Snapshot) {
        ui.heading("Neural Cellular Automata");
        self.draw_model_picker(ui, snapshot.model.as_deref());

        ui.separator();
        let speed_label = format!("speed ({})", SpeedSetting(self.speed).label());
        let response = ui.add(
            egui::Slider::new(&mut self.speed, SpeedSetting::MIN..=SpeedSetting::MAX).text(speed_label),
        );
        if response.changed() {
            let speed = SpeedSetting(self.speed);
            self.driver.command(|session, now| session.set_speed(speed, now));
        }

        self.draw_mapping_menu(ui, snapshot.mapping);

        ui.horizontal(|ui| {
            let ready = snapshot.status == SessionStatus::Ready;
            let toggle = if snapshot.running { "Stop" } else { "Resume" };
            if ui.add_enabled(ready, egui::Button::new(toggle)).clicked() {
                self.driver.command(|session, now| {
                    if session.is_running() {
                        session.stop();
                    } else {
                        session.start(now);
                    }
                });
            }

            if ui
                .add_enabled(snapshot.model.is_some(), egui::Button::new("Restart"))
                .clicked()
            {
                if let Err(err) = self.driver.command(|session, now| session.restart(now)) {
                    tracing::error!(%err, "restart failed");
                }
            }
        });

        ui.separator();
        match &snapshot.status {
            SessionStatus::Empty => ui.label("No model loaded"),
            SessionStatus::Loading => ui.label("Loading model..."),
            SessionStatus::Ready if snapshot.running => ui.label("Running"),
            SessionStatus::Ready => ui.label("Stopped"),
            SessionStatus::Failed(reason) => ui.colored_label(
                egui::Color32::from_rgb(230, 100, 100),
                format!("Model offline: {reason}"),
            ),
        };
        if let Some(model) = &snapshot.model {
            ui.label(format!("Model: {}", model.display()));
        }
    }

    fn draw_model_picker(&mut self, ui: &mut egui::Ui, loaded: Option<&Path>) {
        let models = match &self.catalog {
            Catalog::Failed => {
                ui.add_enabled_ui(false, |ui| {
                    egui::ComboBox::from_label("model")
                        .selected_text("Error loading models")
                        .show_ui(ui, |_| {});
                });
                return;
            }
            Catalog::Models(models) if models.is_empty() => {
                ui.label("No models available");
                return;
            }
            Catalog::Models(models) => models,
        };

        let mut choice = self.selected;
        let current = picker_text(models, choice, loaded);
        egui::ComboBox::from_label("model")
            .selected_text(current)
            .show_ui(ui, |ui| {
                for (idx, model) in models.iter().enumerate() {
                    ui.selectable_value(&mut choice, Some(idx), model.title());
                }
            });

        if choice != self.selected {
            if let Some(model) = choice.and_then(|idx| models.get(idx)) {
                let path = model.path.clone();
                if let Err(err) = self.driver.command(|session, _| session.load_model(path)) {
                    tracing::debug!(%err, "selected model not started");
                }
            }
            self.selected = choice;
        }
    }

    fn draw_mapping_menu(&mut self, ui: &mut egui::Ui, committed: ChannelMapping) {
        let mut chosen = None;
        let mut hovered = None;
        egui::ComboBox::from_label("channels")
            .selected_text(committed.label())
            .show_ui(ui, |ui| {
                for mapping in ChannelMapping::all() {
                    let response = ui.selectable_label(mapping == committed, mapping.label());
                    if response.clicked() {
                        chosen = Some(mapping);
                    }
                    if response.hovered() {
                        hovered = Some(mapping);
                    }
                }
            });

        if let Some(mapping) = chosen {
            self.preview = None;
            self.driver.command(|session, _| session.set_mapping(mapping));
        } else if hovered != self.preview {
            self.preview = hovered;
            self.driver.command(|session, _| session.preview_mapping(hovered));
        }
    }

    fn draw_visuals(&mut self, ui: &mut egui::Ui, snapshot: &Snapshot) {
        ui.horizontal(|ui| {
            ui.label(format!("step: {}", snapshot.steps));
            ui.separator();
            ui.label(format!("mean: {:.4}", snapshot.stats.mean));
            ui.separator();
            ui.label(format!("max: {:.4}", snapshot.stats.max));
            ui.separator();
            ui.label(format!("min: {:.4}", snapshot.stats.min));
            ui.separator();
            ui.label(format!("skipped: {}", snapshot.skipped));
            ui.separator();
            ui.label(format!("discarded: {}", snapshot.discarded));
        });

        ui.separator();

        let Some(texture) = &self.texture else {
            return;
        };
        let image_size = texture.size_vec2();
        let available = ui.available_size();
        let scale = (available.x / image_size.x)
            .min(available.y / image_size.y)
            .clamp(1.0, 16.0);

        let (rect, response) = ui.allocate_exact_size(image_size * scale, egui::Sense::click_and_drag());
        ui.painter().image(
            texture.id(),
            rect,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );

        if !response.is_pointer_button_down_on() {
            return;
        }
        let Some(pos) = response.interact_pointer_pos() else {
            return;
        };
        let offset = pos - rect.min;
        if let Some((cx, cy)) = EraseBrush::cell_from_pointer(
            [offset.x, offset.y],
            [rect.width(), rect.height()],
            snapshot.shape,
        ) {
            self.driver.command(|session, _| session.erase_at(cx, cy));
        }
    }
}

/// Text of the closed model picker. A model loaded from outside the catalog
/// shows its file name.
fn picker_text(models: &[ModelEntry], selected: Option<usize>, loaded: Option<&Path>) -> String {
    if let Some(model) = selected.and_then(|idx| models.get(idx)) {
        return model.title();
    }
    match loaded {
        Some(path) => catalog::file_label(path),
        None => "Select a model".to_owned(),
    }
}

impl eframe::App for NcaApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.update_texture(ctx);
        let snapshot = self.snapshot();

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(290.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .auto_shrink([false, false])
                    .show(ui, |ui| {
                        self.draw_controls(ui, &snapshot);
                    });
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_visuals(ui, &snapshot);
        });
    }
}
