//! Fetches every layer for one viewport from the public Overpass mirrors,
//! renders it and prints what came back.

use anyhow::{anyhow, Context};
use cityscape::{
    core::config::{PipelineConfig, PipelineProfile},
    rendering::RenderLayer,
    FetchCoordinator, LatLng, LayerKind, Point, Renderer, Theme, Viewport,
};
use clap::{Parser, ValueEnum};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Profile {
    Balanced,
    Conservative,
    Detailed,
}

#[derive(Debug, Parser)]
#[command(name = "cityscape", version, about = "Fetch and render a 2.5D city viewport")]
struct Args {
    /// Latitude of the viewport centre
    #[arg(long, default_value_t = 52.5163, allow_hyphen_values = true)]
    lat: f64,

    /// Longitude of the viewport centre
    #[arg(long, default_value_t = 13.3777, allow_hyphen_values = true)]
    lng: f64,

    #[arg(long, default_value_t = 16.5)]
    zoom: f64,

    #[arg(long, default_value_t = 1200.0)]
    width: f64,

    #[arg(long, default_value_t = 800.0)]
    height: f64,

    /// Extrusion strength in [0, 1]
    #[arg(long, default_value_t = 0.6)]
    tilt: f64,

    #[arg(long)]
    theme: Option<Theme>,

    /// JSON configuration file; missing fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Preset used when no configuration file is given
    #[arg(long, value_enum, default_value_t = Profile::Balanced)]
    profile: Profile,

    /// Comma-separated layers to fetch (default: all)
    #[arg(long, value_delimiter = ',')]
    layers: Vec<LayerKind>,
}

impl Args {
    fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => match self.profile {
                Profile::Balanced => PipelineProfile::Balanced,
                Profile::Conservative => PipelineProfile::Conservative,
                Profile::Detailed => PipelineProfile::Detailed,
            }
            .resolve(),
        };
        if let Some(theme) = self.theme {
            config.render.theme = theme;
        }
        if !self.layers.is_empty() {
            config.session.layers = self.layers.clone();
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.pipeline_config()?;
    let viewport = Viewport::from_center(
        LatLng::new(args.lat, args.lng),
        args.zoom,
        Point::new(args.width, args.height),
    )
    .context("invalid viewport")?
    .with_tilt(args.tilt);
    let bucket = viewport.zoom_bucket();
    log::info!(
        "viewport {} at zoom {} ({bucket}), tilt {}",
        viewport.bounds.to_query_filter(),
        viewport.zoom,
        viewport.tilt
    );

    let coordinator =
        FetchCoordinator::with_http(config.clone()).map_err(|err| anyhow!("{err}"))?;

    let mut features = Vec::new();
    for kind in &config.session.layers {
        let outcome = coordinator
            .fetch_or_fallback(*kind, &viewport.bounds, bucket)
            .await;
        println!(
            "{:<10} {:>6} features  {:?}",
            kind.to_string(),
            outcome.features.len(),
            outcome.source
        );
        features.extend(outcome.features.iter().cloned());
    }

    let renderer = Renderer::new(config.render.clone());
    let primitives = renderer.render(&features, &viewport);
    let mut per_layer: BTreeMap<RenderLayer, usize> = BTreeMap::new();
    for primitive in &primitives {
        *per_layer.entry(primitive.layer).or_default() += 1;
    }
    let extruded = primitives.iter().filter(|p| p.is_extruded()).count();

    println!();
    println!(
        "{} primitives ({} extruded), theme {}, background {}",
        primitives.len(),
        extruded,
        renderer.theme(),
        renderer.background()
    );
    for (layer, count) in per_layer {
        println!("  {:<10} {count:>6}", format!("{layer:?}"));
    }

    let stats = coordinator.stats();
    println!(
        "\nrequests {}, network {}, cache hits {}, skipped {}, failures {}",
        stats.requests, stats.network_calls, stats.cache_hits, stats.skipped, stats.failures
    );
    if let Some(endpoint) = coordinator.active_endpoint() {
        println!("active endpoint {endpoint}");
    }

    Ok(())
}
