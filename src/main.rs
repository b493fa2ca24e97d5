mod app;
mod backend;
mod catalog;
mod driver;
mod engine;
mod erase;
mod grid;
mod mapping;
mod onnx;
mod session;
mod telemetry;
#[cfg(test)]
mod testing;
mod types;
mod worker;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::mapping::ChannelMapping;
use crate::types::{SeedConfig, SeedVariant, SessionConfig, SingleChannelStyle, SpeedSetting};

/// Live viewer for neural cellular automata models.
#[derive(Parser, Debug)]
#[command(name = "nca-viewer", version)]
struct Cli {
    /// Directory scanned for `.onnx` models.
    #[arg(long, default_value = "models")]
    models_dir: PathBuf,

    /// JSON object mapping model file names to emoji labels.
    #[arg(long, default_value = "models.json")]
    labels: PathBuf,

    /// Model to load at startup instead of the first one found.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Step speed, 0 (1/10x) to 6 (8x).
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(0..=6))]
    speed: u8,

    /// Channel mapping: rgba, r, g, b, a or c4..c15.
    #[arg(long, default_value = "rgba")]
    mapping: ChannelMapping,

    #[arg(long, value_enum, default_value_t = SeedVariant::Mirrored)]
    seed: SeedVariant,

    #[arg(long, default_value_t = 0.8)]
    seed_value: f32,

    /// Half-width of the seeded square at the center.
    #[arg(long, default_value_t = 0)]
    seed_radius: usize,

    /// How the r, g, b and a mappings are drawn.
    #[arg(long, value_enum, default_value_t = SingleChannelStyle::Grayscale)]
    single_channel: SingleChannelStyle,

    /// Erase brush radius in cells.
    #[arg(long, default_value_t = 5)]
    erase_radius: i32,

    /// Load the model but wait for Resume before stepping.
    #[arg(long)]
    no_autostart: bool,

    #[arg(long, default_value_t = 2000)]
    inference_timeout_ms: u64,

    /// Print the available models and exit.
    #[arg(long)]
    list_models: bool,
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            seed: SeedConfig {
                variant: self.seed,
                value: self.seed_value,
                radius: self.seed_radius,
            },
            speed: SpeedSetting(self.speed),
            single_channel: self.single_channel,
            erase_radius: self.erase_radius,
            autostart: !self.no_autostart,
            inference_timeout: Duration::from_millis(self.inference_timeout_ms),
            ..SessionConfig::default()
        }
    }
}

type AppResult = Result<Box<dyn eframe::App>, Box<dyn std::error::Error + Send + Sync>>;

fn main() -> eframe::Result<()> {
    if let Err(err) = telemetry::init_tracing("info") {
        eprintln!("{err}");
    }

    let cli = Cli::parse();

    if cli.list_models {
        match catalog::discover(&cli.models_dir, Some(cli.labels.as_path())) {
            Ok(models) => {
                println!("Available ONNX models:");
                for model in models {
                    println!("- {}", model.file_name());
                }
            }
            Err(err) => tracing::error!(%err, "could not list models"),
        }
        return Ok(());
    }

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([980.0, 720.0])
            .with_min_inner_size([640.0, 480.0]),
        ..Default::default()
    };

    let launch = app::Launch {
        config: cli.session_config(),
        mapping: cli.mapping,
        models_dir: cli.models_dir,
        labels: cli.labels,
        initial_model: cli.model,
    };

    eframe::run_native(
        "Neural Cellular Automata",
        options,
        Box::new(move |cc: &eframe::CreationContext<'_>| -> AppResult {
            Ok(Box::new(app::NcaApp::new(cc, launch)?))
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_map_onto_session_config() {
        let cli = Cli::parse_from([
            "nca-viewer",
            "--speed",
            "5",
            "--mapping",
            "c7",
            "--seed",
            "rgba-only",
            "--single-channel",
            "tinted",
            "--no-autostart",
        ]);
        let config = cli.session_config();
        assert_eq!(config.speed, SpeedSetting(5));
        assert_eq!(config.seed.variant, SeedVariant::RgbaOnly);
        assert_eq!(config.single_channel, SingleChannelStyle::Tinted);
        assert!(!config.autostart);
        assert_eq!(cli.mapping, ChannelMapping::cell(7).unwrap());
    }

    #[test]
    fn out_of_table_speed_is_rejected() {
        assert!(Cli::try_parse_from(["nca-viewer", "--speed", "9"]).is_err());
        assert!(Cli::try_parse_from(["nca-viewer", "--mapping", "c2"]).is_err());
    }
}
