//! districtd — the DistrictGrid daemon and plan tools.
//!
//! One binary around the DistrictGrid crates:
//! - `serve` loads every configured region and keeps the worker pool up
//! - `status` loads regions and prints the readiness report
//! - `merge`, `import`, `export`, `properties` run one task on the pool
//! - `crosswalk` moves a block assignment onto a successor region
//! - `layer-size` estimates a region's cache footprint
//! - `init` scaffolds a districts.toml
//!
//! # Usage
//!
//! ```text
//! districtd --config districts.toml serve
//! districtd --config districts.toml merge --region pa --plan plan.json --districts 18
//! ```

mod app;
mod files;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use district_core::units::{format_bytes, parse_duration};
use district_core::{Creator, DistrictsConfig, StaticMetadata};
use districtgrid_merge::{parse_crosswalk, reassign};
use districtgrid_scheduler::MergeRequest;
use districtgrid_topology::RegionTopology;

use crate::app::App;
use crate::files::{emit, format_rows, read_assignment, read_plan};

const DEFAULT_FILTER: &str = "info,districtd=debug,districtgrid=debug";

#[derive(Parser)]
#[command(name = "districtd", about = "DistrictGrid daemon", version)]
struct Cli {
    /// Path to districts.toml.
    #[arg(long, global = true, default_value = "districts.toml")]
    config: PathBuf,

    /// Log as JSON lines instead of text.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load every region and run until interrupted.
    Serve {
        /// How often to log readiness and pool state, e.g. "30s".
        #[arg(long, default_value = "30s")]
        report_every: String,
    },
    /// Load every region and print the readiness report.
    Status {
        /// Give up waiting after this long, e.g. "2m".
        #[arg(long, default_value = "60s")]
        wait: String,
    },
    /// Merge a plan into district outlines and totals (GeoJSON).
    Merge {
        #[arg(long)]
        region: String,
        /// JSON districts definition; every unit is unassigned without one.
        #[arg(long)]
        plan: Option<PathBuf>,
        #[arg(long)]
        districts: u32,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Build a plan from a `block,district` CSV.
    Import {
        #[arg(long)]
        region: String,
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Flatten a plan into `block,district` rows.
    Export {
        #[arg(long)]
        region: String,
        #[arg(long)]
        plan: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the feature properties of every topology object.
    Properties {
        #[arg(long)]
        region: String,
    },
    /// Move a block assignment onto a successor region and import it there.
    Crosswalk {
        /// The successor region.
        #[arg(long)]
        region: String,
        /// `block,district` CSV for the old region.
        #[arg(long)]
        assignment: PathBuf,
        /// Crosswalk file: new block followed by (old block, share) pairs.
        #[arg(long)]
        crosswalk: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Estimate a region's cache footprint from local files.
    LayerSize {
        #[arg(long)]
        topology: PathBuf,
        #[arg(long)]
        metadata: PathBuf,
    },
    /// Write a districts.toml serving one region.
    Init {
        #[arg(long)]
        region_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        s3_uri: String,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Init {
            region_id,
            name,
            s3_uri,
            force,
        } => init(&cli.config, &region_id, &name, &s3_uri, force),
        Command::LayerSize { topology, metadata } => layer_size(&topology, &metadata),
        command => {
            let app = App::from_config_file(&cli.config)?;
            let result = run(&app, command).await;
            app.shutdown().await;
            result
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(app: &App, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Serve { report_every } => serve(app, duration_arg(&report_every)?).await,
        Command::Status { wait } => status(app, duration_arg(&wait)?).await,
        Command::Merge {
            region,
            plan,
            districts,
            out,
        } => {
            let data = app.region_data(&region).await?;
            let definition = plan.as_deref().map(read_plan).transpose()?;
            let geojson = app
                .pool
                .merge(MergeRequest {
                    data,
                    definition,
                    number_of_districts: districts,
                    creator: Creator::default(),
                    chamber: None,
                })
                .await?
                .context("districts definition does not match the region's geography")?;
            emit(out.as_deref(), &serde_json::to_string(&geojson)?)
        }
        Command::Import { region, csv, out } => {
            let blocks = read_assignment(&csv)?;
            import(app, &region, blocks, out.as_deref()).await
        }
        Command::Export { region, plan, out } => {
            let data = app.region_data(&region).await?;
            let rows = app
                .pool
                .export_to_csv(&data.region, &data.metadata, read_plan(&plan)?)
                .await?
                .context("districts definition does not match the region's geography")?;
            emit(out.as_deref(), &format_rows(&rows)?)
        }
        Command::Properties { region } => {
            let data = app.region_data(&region).await?;
            let properties = app
                .pool
                .topology_properties(&data.region, &data.metadata, None)
                .await?;
            emit(None, &serde_json::to_string_pretty(&properties)?)
        }
        Command::Crosswalk {
            region,
            assignment,
            crosswalk,
            out,
        } => {
            let old = read_assignment(&assignment)?;
            let text = std::fs::read_to_string(&crosswalk)
                .with_context(|| format!("failed to read {}", crosswalk.display()))?;
            let crosswalk = parse_crosswalk(&text)?;
            let blocks = reassign(&old, &crosswalk);
            info!(
                old_blocks = old.len(),
                new_blocks = blocks.len(),
                "assignment moved through crosswalk"
            );
            import(app, &region, blocks, out.as_deref()).await
        }
        Command::Init { .. } | Command::LayerSize { .. } => Ok(()),
    }
}

async fn serve(app: &App, report_every: Duration) -> anyhow::Result<()> {
    info!(regions = app.regions.len(), "districtd starting");
    app.loader.start(&app.regions).await;
    info!("archived regions ready, active regions loading in the background");

    let mut ticker = tokio::time::interval(report_every);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let readiness = app.loader.readiness().await;
                let snapshot = app.pool.snapshot().await;
                info!(
                    healthy = readiness.healthy,
                    waiting = ?readiness.waiting(),
                    resident = ?snapshot.workers.iter().map(|w| format_bytes(w.resident)).collect::<Vec<_>>(),
                    "status"
                );
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for ctrl-c")?;
                info!("shutdown signal received");
                break;
            }
        }
    }
    info!("districtd stopped");
    Ok(())
}

async fn status(app: &App, wait: Duration) -> anyhow::Result<()> {
    app.loader.start(&app.regions).await;
    let deadline = tokio::time::Instant::now() + wait;
    let mut report = app.loader.readiness().await;
    while !report.healthy && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(250)).await;
        report = app.loader.readiness().await;
    }
    emit(None, &serde_json::to_string_pretty(&report)?)?;
    if !report.healthy {
        bail!("regions not loaded: {}", report.waiting().join(", "));
    }
    Ok(())
}

async fn import(
    app: &App,
    region: &str,
    blocks: std::collections::HashMap<String, u32>,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let data = app.region_data(region).await?;
    let import = app
        .pool
        .import_from_csv(&data.region, &data.metadata, blocks)
        .await?;
    if !import.report.is_clean() {
        warn!(
            region,
            unknown = import.report.unknown_block_ids.len(),
            unassigned = import.report.unassigned_units,
            "import is incomplete"
        );
    }
    emit(out, &serde_json::to_string(&import)?)
}

fn init(path: &Path, region_id: &str, name: &str, s3_uri: &str, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let config = DistrictsConfig::scaffold(region_id, name, s3_uri);
    std::fs::write(path, config.to_toml_string()?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), region = region_id, "wrote config");
    Ok(())
}

fn layer_size(topology: &Path, metadata: &Path) -> anyhow::Result<()> {
    let metadata: StaticMetadata = serde_json::from_str(
        &std::fs::read_to_string(metadata)
            .with_context(|| format!("failed to read {}", metadata.display()))?,
    )
    .context("invalid static metadata")?;
    let bytes = std::fs::read(topology)
        .with_context(|| format!("failed to read {}", topology.display()))?;
    let region = RegionTopology::from_slice("local", &bytes, &metadata)
        .context("failed to build topology")?;
    let size = region.estimated_size();
    info!(size = %format_bytes(size), "estimated layer size");
    emit(None, &size.to_string())
}

fn duration_arg(value: &str) -> anyhow::Result<Duration> {
    parse_duration(value).with_context(|| format!("invalid duration {value:?}"))
}
