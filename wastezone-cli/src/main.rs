//! Command-line front end that analyses waste collection zones.

mod report;
mod request;

use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use reqwest::Client;
use wastezone_core::{
    AnalysisConfig, BuildingFootprintProvider, GriddedPopulationProvider, ProviderSet,
    RoutingDistanceProvider, ZoneAnalyzer,
};
use wastezone_provider_osrm as osrm;
use wastezone_provider_overpass as overpass;
use wastezone_provider_worldpop as worldpop;

use crate::request::RequestFile;

/// Estimate population, waste, collection fleet and revenue for drawn zones.
#[derive(Parser)]
#[command(name = "wastezone", version)]
struct Cli {
    /// TOML file overriding the default analysis parameters.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyse the zones listed in a request file.
    Analyze {
        /// Request file (TOML).
        request: PathBuf,

        /// Do not call any network provider; population comes from area density.
        #[arg(long)]
        offline: bool,

        /// Output format.
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,

        /// Base URL of a WorldPop stats mirror.
        #[arg(long)]
        worldpop_url: Option<String>,

        /// Base URL of an Overpass interpreter.
        #[arg(long)]
        overpass_url: Option<String>,

        /// Base URL of an OSRM instance.
        #[arg(long)]
        osrm_url: Option<String>,
    },

    /// Print the effective analysis parameters as TOML.
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// Provider endpoints chosen on the command line.
struct Endpoints {
    worldpop: Option<String>,
    overpass: Option<String>,
    osrm: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Config => {
            write!(io::stdout().lock(), "{}", toml::to_string_pretty(&config)?)?;
        }
        Command::Analyze {
            request: request_path,
            offline,
            format,
            worldpop_url,
            overpass_url,
            osrm_url,
        } => {
            let zones = RequestFile::load(&request_path)?.into_zones()?;
            let providers = if offline {
                ProviderSet::offline()
            } else {
                let client = Client::builder()
                    .user_agent(concat!("wastezone/", env!("CARGO_PKG_VERSION")))
                    .timeout(config.providers.timeout())
                    .build()?;
                online_providers(
                    &client,
                    Endpoints {
                        worldpop: worldpop_url,
                        overpass: overpass_url,
                        osrm: osrm_url,
                    },
                )
            };
            log::info!(
                "Analysing {} zone(s) with providers [{}]",
                zones.len(),
                providers.names().collect::<Vec<_>>().join(", ")
            );

            let analyzer = Arc::new(ZoneAnalyzer::new(providers, Arc::new(config))?);
            let handles: Vec<_> = zones
                .into_iter()
                .map(|(zone, request)| {
                    let worker = Arc::clone(&analyzer);
                    tokio::spawn(async move { worker.analyze(&zone, &request).await })
                })
                .collect();

            let mut analyses = Vec::with_capacity(handles.len());
            for handle in handles {
                analyses.push(handle.await.context("Analysis task failed")??);
            }

            let rendered = match format {
                Format::Json => {
                    let mut json = serde_json::to_string_pretty(&analyses)?;
                    json.push('\n');
                    json
                }
                Format::Text => report::render(&analyses)?,
            };
            io::stdout().lock().write_all(rendered.as_bytes())?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    let Some(path) = path else {
        return Ok(AnalysisConfig::default());
    };
    let config = AnalysisConfig::load(path)
        .with_context(|| format!("Cannot load configuration from {}", path.display()))?;
    log::debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

fn online_providers(client: &Client, endpoints: Endpoints) -> ProviderSet {
    let gridded: Arc<dyn GriddedPopulationProvider> = match endpoints.worldpop {
        Some(url) => Arc::new(worldpop::WorldPopProvider::new(client.clone()).with_base_url(url)),
        None => worldpop::provider(client.clone()),
    };
    let footprints: Arc<dyn BuildingFootprintProvider> = match endpoints.overpass {
        Some(url) => Arc::new(overpass::OverpassProvider::new(client.clone()).with_base_url(url)),
        None => overpass::provider(client.clone()),
    };
    let routing: Arc<dyn RoutingDistanceProvider> = match endpoints.osrm {
        Some(url) => Arc::new(osrm::OsrmProvider::new(client.clone()).with_base_url(url)),
        None => osrm::provider(client.clone()),
    };

    ProviderSet::offline()
        .with_gridded(gridded)
        .with_footprints(footprints)
        .with_routing(routing)
}
