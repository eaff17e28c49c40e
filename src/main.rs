pub mod config;
pub mod data;
pub mod error;
pub mod geometry;
pub mod html;
pub mod layer;
pub mod map;
pub mod processing;
pub mod render;
pub mod schema;
pub mod server;
pub mod source;
pub mod switcher;
pub mod types;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the spreadsheet with its geometry and write a static map
    Generate {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Merge the spreadsheet with its geometry and serve the map
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Generate { config } => {
            println!("Generating map with config: {:?}", config);
            let (app_config, merged) = load_and_merge(config).await?;

            let layers = layer::build_layers(
                &app_config.schema,
                Arc::new(merged.clone()),
                &app_config.popup,
                app_config.style.hover_highlight,
            );
            let switcher = switcher::LayerSwitcher::new(&app_config.switcher, &app_config.schema);
            render::write_outputs(&app_config, &merged, &layers, &switcher)?;

            println!("Generation complete!");
        }
        Commands::Serve { config } => {
            println!("Serving map with config: {:?}", config);
            let (app_config, merged) = load_and_merge(config).await?;

            let layers = layer::build_layers(
                &app_config.schema,
                Arc::new(merged),
                &app_config.popup,
                app_config.style.hover_highlight,
            );
            server::start_server(app_config, layers).await?;
        }
    }

    Ok(())
}

/// Phase one: read the sheet and resolve every included row's geometry.
/// Returns only after all rows have settled.
async fn load_and_merge(path: &Path) -> Result<(config::AppConfig, types::MergedCollection)> {
    let app_config = config::AppConfig::load_from_file(path)?;
    let client = reqwest::Client::new();

    let rows = data::load_rows(&app_config, &client).await?;
    let source = source::HttpSource::new(client, app_config.base_dir.clone());
    let merged =
        processing::merge_rows(&rows, &app_config.input, &app_config.schema, &source).await;

    if merged.is_empty() {
        tracing::warn!("No features were merged; the map will be empty");
    }
    Ok((app_config, merged))
}
