//! Data Skyline - entities as a ring of buildings
//!
//! CLI commands:
//! - view: Open the native 3D viewer
//! - list: Print entity summaries
//! - layout: Print computed placements as JSON

mod animation;
mod camera;
mod color;
mod config;
mod layout;
mod logging;
mod model;
mod picking;
mod scene;
mod source;
mod viewer;
mod visual;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::model::Entity;

#[derive(Parser)]
#[command(name = "data_skyline")]
#[command(about = "Browse data entities as a 3D skyline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to skyline.yaml config
    #[arg(short, long, default_value = "skyline.yaml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch native 3D viewer
    View {
        /// Entity snapshot (JSON or YAML)
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Entity to aim the camera at on start
        #[arg(long)]
        focus: Option<String>,
    },

    /// List entities with record counts
    List {
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },

    /// Print the computed layout as JSON
    Layout {
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Include per-record sub-block placements
        #[arg(long)]
        blocks: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let settings = config::Settings::load();

    // Initialize logging first
    logging::init_logging(&settings.log_dir);
    tracing::info!("Data Skyline starting up");

    let cli = Cli::parse();
    tracing::debug!("CLI args parsed: config={:?}", cli.config);

    let config = if cli.config.exists() {
        tracing::info!("Loading config from {:?}", cli.config);
        config::Config::load(&cli.config)?
    } else {
        tracing::warn!("Config file not found: {:?}, using defaults", cli.config);
        config::Config::default()
    };

    match cli.command {
        Commands::View { snapshot, focus } => {
            let snapshot = snapshot.unwrap_or(settings.snapshot_path);
            viewer::run_viewer(config, snapshot, focus)?;
        }

        Commands::List { snapshot } => {
            let snapshot = snapshot.unwrap_or(settings.snapshot_path);
            let entities = source::load_snapshot(&snapshot)?;
            list_entities(&entities);
        }

        Commands::Layout { snapshot, blocks } => {
            let snapshot = snapshot.unwrap_or(settings.snapshot_path);
            let entities = source::load_snapshot(&snapshot)?;
            print_layout(&config, &entities, blocks)?;
        }
    }

    Ok(())
}

/// Print entity summaries
fn list_entities(entities: &[Entity]) {
    println!("Entities ({}):", entities.len());
    println!();

    for summary in entities.iter().map(Entity::summary) {
        let updated = if summary.last_updated.is_empty() {
            "never"
        } else {
            summary.last_updated.as_str()
        };
        println!("  - {} ({} records, updated {})", summary.name, summary.record_count, updated);
    }

    println!();
    println!("Total records: {}", model::total_records(entities));
}

/// Print placements, and optionally sub-blocks, as pretty JSON
fn print_layout(config: &config::Config, entities: &[Entity], with_blocks: bool) -> anyhow::Result<()> {
    let placements = layout::place(entities, &config.layout);

    let buildings: Vec<_> = entities
        .iter()
        .zip(&placements)
        .map(|(entity, placement)| -> anyhow::Result<serde_json::Value> {
            let mut building = serde_json::json!({
                "name": entity.name,
                "recordCount": entity.record_count,
                "placement": placement,
            });
            if with_blocks {
                building["blocks"] = serde_json::to_value(layout::sub_blocks(entity, placement, &config.layout))?;
            }
            Ok(building)
        })
        .collect::<anyhow::Result<_>>()?;

    let data = serde_json::json!({
        "generated": chrono::Local::now().to_rfc3339(),
        "footprint": layout::building_footprint(&config.layout),
        "buildings": buildings,
    });

    println!("{}", serde_json::to_string_pretty(&data)?);
    tracing::debug!("Printed layout for {} entities", entities.len());
    Ok(())
}
