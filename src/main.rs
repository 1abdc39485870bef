//! CLI entry point for inspecting SOC atlas data.
//!
//! Loads the catalog and main data file from a directory or URL, pulls in
//! deeper level files on demand and prints the derived views.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::Path;

use anyhow::{Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use soc_atlas::DataProvider;
use soc_atlas::analyzers::composition::{CompositionOptions, Measure};
use soc_atlas::analyzers::types::ColorBy;
use soc_atlas::config::Config;
use soc_atlas::hierarchy::ParentFallback;
use soc_atlas::infra::open_source;
use soc_atlas::loader::LevelState;
use soc_atlas::output::{
    append_records, composition_records, print_json, print_pretty, write_json,
};
use soc_atlas::queries::{QueryResult, compare_regions, region_composition, regions_by_type};
use soc_atlas::types::Year;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "soc_atlas")]
#[command(about = "Inspect SOC occupation hierarchy data", long_about = None)]
struct Cli {
    /// Directory or base URL holding the data documents (overrides SOC_DATA_BASE)
    #[arg(long, global = true)]
    data: Option<String>,

    /// Catalog file name (overrides SOC_CATALOG_FILE)
    #[arg(long, global = true)]
    catalog: Option<String>,

    /// Parent used when an ambiguous code's parent cannot be decided from the data
    #[arg(long, global = true, value_enum)]
    fallback: Option<ParentFallback>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the catalog, available levels and regions
    Catalog,
    /// Flatten one region's hierarchy into non-overlapping cells
    Compose {
        /// Region id, e.g. "national-us"
        #[arg(short, long)]
        region: String,

        /// Year to show (defaults to the catalog's dataset year)
        #[arg(short, long)]
        year: Option<Year>,

        /// Deepest level to show (1-5)
        #[arg(short, long, default_value_t = 2)]
        depth: u8,

        #[arg(short, long, value_enum, default_value_t = Measure::Employment)]
        measure: Measure,

        /// Major group ids to leave out
        #[arg(long = "hide", value_name = "GROUP_ID")]
        hidden_groups: Vec<String>,

        /// CSV file to append the cells to
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Colour-scale domains and group ranks for a year
    ColorStats {
        #[arg(short, long)]
        year: Option<Year>,

        #[arg(short, long, value_enum, default_value_t = ColorBy::Wage)]
        by: ColorBy,

        /// JSON file to write the full colour map to
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Compare two regions; the national region is used when no secondary is given
    Compare {
        #[arg(short, long)]
        primary: String,

        #[arg(short, long)]
        secondary: Option<String>,

        #[arg(short, long)]
        year: Option<Year>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/soc_atlas.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("soc_atlas.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(data) = cli.data {
        config.data_base = data;
    }
    if let Some(catalog) = cli.catalog {
        config.catalog_file = catalog;
    }
    if let Some(fallback) = cli.fallback {
        config.parent_fallback = fallback;
    }

    let source = open_source(&config.data_base, config.fetch_timeout)?;
    let provider = DataProvider::load(source, &config.catalog_file).await?;

    match cli.command {
        Commands::Catalog => show_catalog(&provider)?,
        Commands::Compose {
            region,
            year,
            depth,
            measure,
            hidden_groups,
            output,
        } => {
            let options = CompositionOptions {
                depth,
                measure,
                hidden_groups: hidden_groups.into_iter().collect::<HashSet<_>>(),
                fallback: config.parent_fallback,
            };
            compose(&provider, &region, year, options, output.as_deref()).await?;
        }
        Commands::ColorStats { year, by, output } => {
            color_stats(&provider, year, by, output.as_deref())?;
        }
        Commands::Compare {
            primary,
            secondary,
            year,
        } => compare(&provider, &primary, secondary.as_deref(), year)?,
    }

    provider.close();
    Ok(())
}

fn default_year(provider: &DataProvider) -> Result<Year> {
    match provider.catalog().default_dataset() {
        Some(entry) => Ok(entry.year),
        None => bail!("catalog lists no datasets"),
    }
}

fn show_catalog(provider: &DataProvider) -> Result<()> {
    let catalog = provider.catalog();
    for entry in &catalog.datasets {
        info!(
            country = %entry.country,
            year = entry.year,
            file = %entry.file,
            levels = ?entry.levels,
            "Dataset"
        );
    }
    info!(
        max_digit_level = provider.max_digit_level(),
        loaded_levels = ?provider.loaded_levels(),
        "Levels"
    );

    let snapshot = provider.snapshot();
    for (region_type, regions) in regions_by_type(&snapshot) {
        info!(region_type = %region_type, count = regions.len(), "Regions");
    }
    print_json(catalog)
}

#[tracing::instrument(skip(provider, options, output), fields(depth = options.depth))]
async fn compose(
    provider: &DataProvider,
    region: &str,
    year: Option<Year>,
    options: CompositionOptions,
    output: Option<&str>,
) -> Result<()> {
    let year = match year {
        Some(y) => y,
        None => default_year(provider)?,
    };

    let max_level = provider.max_digit_level();
    if options.depth > max_level {
        warn!(depth = options.depth, max_level, "Requested depth exceeds available levels");
    }
    for (depth, state) in provider.ensure_levels(options.depth.min(max_level)).await {
        if state != LevelState::Merged {
            warn!(depth, state = ?state, "Level unavailable, showing shallower data");
        }
    }

    let snapshot = provider.snapshot();
    match region_composition(&snapshot, region, year, &options) {
        QueryResult::Data(composition) => {
            info!(
                cells = composition.cells.len(),
                total = composition.total,
                "Composition computed"
            );
            print_json(&composition)?;
            if let Some(path) = output {
                let records = composition_records(region, year, &composition, Utc::now());
                append_records(path, &records)?;
                info!(path, rows = records.len(), "Composition appended");
            }
        }
        QueryResult::NoData => warn!(region, year, "No data for region"),
    }
    Ok(())
}

fn color_stats(
    provider: &DataProvider,
    year: Option<Year>,
    by: ColorBy,
    output: Option<&str>,
) -> Result<()> {
    let year = match year {
        Some(y) => y,
        None => default_year(provider)?,
    };
    let snapshot = provider.snapshot();
    let colors = soc_atlas::compute_color_stats(&snapshot, year);
    let domain = colors.domain(by);
    info!(
        year,
        by = ?by,
        min = domain.min,
        median = domain.median,
        max = domain.max,
        "Colour domain"
    );
    print_pretty(&domain);
    for group in &snapshot.major_groups {
        if let Some(rank) = colors.group_rank(&group.group_id, by) {
            info!(group = %group.group_id, name = %group.name, rank, "Group");
        }
    }
    match output {
        Some(path) => write_json(path, &colors),
        None => Ok(()),
    }
}

fn compare(
    provider: &DataProvider,
    primary: &str,
    secondary: Option<&str>,
    year: Option<Year>,
) -> Result<()> {
    let default_year = default_year(provider)?;
    let snapshot = provider.snapshot();
    match compare_regions(
        &snapshot,
        primary,
        secondary,
        year.unwrap_or(default_year),
        default_year,
    ) {
        QueryResult::Data(comparison) => {
            if comparison.secondary.is_none() {
                warn!("Benchmark region has no data");
            }
            print_json(&comparison.pairs())
        }
        QueryResult::NoData => {
            warn!(primary, "No data for region");
            Ok(())
        }
    }
}
