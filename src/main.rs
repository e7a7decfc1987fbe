use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use schedule_engine::models::{ist_now, operating_block};
use schedule_engine::table::write_matrix_csv;
use schedule_engine::{
    AggregationEngine, AggregationSummary, Alert, CsvBaselineStore, CycleOutcome, DisplayFormat,
    EngineConfig, FeedPayload, PlantDirectory, PlantScheduleMatrix, RevisionTracker,
};
use serde::Serialize;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sldc-monitor")]
#[command(about = "Reconcile the intraday SLDC schedule feed into a per-plant block matrix")]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate one feed payload and print the plant matrix.
    Aggregate {
        #[command(flatten)]
        input: InputArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "csv")]
        output: OutputFormat,

        /// Write the matrix table here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Run one refresh cycle: aggregate, compare with the stored baseline, rotate it.
    Cycle {
        #[command(flatten)]
        input: InputArgs,

        /// Baseline CSV, created on first run
        #[arg(long)]
        baseline: PathBuf,

        /// Current quarter-hour block (1-96); defaults to the block of the current IST time
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..=96))]
        block: Option<u16>,

        /// Output format for the alert report
        #[arg(short, long, value_enum, default_value = "summary")]
        output: OutputFormat,

        /// Also write the aggregated matrix table here
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Plant registry CSV (RLDC, SLDC Code, ENT %AGE)
    #[arg(long)]
    registry: PathBuf,

    /// CSV whose header lists the tracked plant columns
    #[arg(long)]
    columns: PathBuf,

    /// Optional display-format CSV with 96 rows of labels
    #[arg(long)]
    format: Option<PathBuf>,

    /// Feed payload JSON as saved by the fetcher
    #[arg(long)]
    feed: PathBuf,

    /// Engine configuration JSON (defaults to the built-in entity settings)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
    Summary,
}

struct Inputs {
    config: EngineConfig,
    directory: PlantDirectory,
    format: DisplayFormat,
    feed: FeedPayload,
}

#[derive(Serialize)]
struct CycleReport<'a> {
    revision: u32,
    block: usize,
    outcome: &'static str,
    alerts: &'a [Alert],
    summary: &'a AggregationSummary,
}

fn load_inputs(args: &InputArgs) -> Result<Inputs> {
    let config = match &args.config {
        Some(path) => EngineConfig::from_path(path)
            .with_context(|| format!("Failed to load engine config {:?}", path))?,
        None => EngineConfig::default(),
    };

    let directory = PlantDirectory::from_paths(&args.registry, &args.columns)
        .context("Failed to load plant directory")?;

    let format = match &args.format {
        Some(path) => DisplayFormat::from_path(path)
            .with_context(|| format!("Failed to load display format {:?}", path))?,
        None => DisplayFormat::default(),
    };

    let text = std::fs::read_to_string(&args.feed)
        .with_context(|| format!("Failed to read feed payload {:?}", args.feed))?;
    let feed = FeedPayload::from_json(&text)
        .with_context(|| format!("Unusable feed payload {:?}", args.feed))?;

    Ok(Inputs {
        config,
        directory,
        format,
        feed,
    })
}

fn write_matrix(matrix: &PlantScheduleMatrix, format: &DisplayFormat, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
            write_matrix_csv(file, matrix, format)?;
            info!("Wrote matrix to {:?}", path);
        }
        None => write_matrix_csv(io::stdout().lock(), matrix, format)?,
    }
    Ok(())
}

fn print_matrix_summary(matrix: &PlantScheduleMatrix, summary: &AggregationSummary, revision: Option<u32>) {
    println!("Schedule Summary");
    println!("================");
    match revision {
        Some(rev) => println!("Revision: {}", rev),
        None => println!("Revision: N/A"),
    }
    println!(
        "Records: {} aggregated of {} ({} excluded, {} unresolved, {} untracked, {} without share)",
        summary.aggregated,
        summary.records,
        summary.excluded,
        summary.unresolved,
        summary.untracked,
        summary.no_share
    );
    println!();
    println!("Energy by plant (MWh):");
    for plant in matrix.columns() {
        // 15-minute blocks
        println!("  {}: {:.2}", plant, matrix.total(plant) / 4.0);
    }
}

fn run_aggregate(input: &InputArgs, output: OutputFormat, out: Option<&Path>) -> Result<()> {
    let inputs = load_inputs(input)?;
    let engine = AggregationEngine::new(&inputs.config)?;
    let (matrix, summary) = engine.aggregate_with_summary(&inputs.feed, &inputs.directory);

    match output {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "revision": inputs.feed.revision(),
                "summary": summary,
                "matrix": matrix,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
            if out.is_some() {
                write_matrix(&matrix, &inputs.format, out)?;
            }
        }
        OutputFormat::Csv => write_matrix(&matrix, &inputs.format, out)?,
        OutputFormat::Summary => {
            print_matrix_summary(&matrix, &summary, inputs.feed.revision());
            if out.is_some() {
                write_matrix(&matrix, &inputs.format, out)?;
            }
        }
    }
    Ok(())
}

fn run_cycle(
    input: &InputArgs,
    baseline: &Path,
    block: Option<u16>,
    output: OutputFormat,
    out: Option<&Path>,
) -> Result<()> {
    let inputs = load_inputs(input)?;
    let revision = inputs
        .feed
        .revision()
        .context("Feed payload carries no FullSchdRevisionNo")?;
    let block = match block {
        Some(b) => b as usize,
        None => operating_block(ist_now().time()),
    };

    let engine = AggregationEngine::new(&inputs.config)?;
    let (matrix, summary) = engine.aggregate_with_summary(&inputs.feed, &inputs.directory);
    if out.is_some() {
        write_matrix(&matrix, &inputs.format, out)?;
    }

    let mut tracker = RevisionTracker::resume(CsvBaselineStore::new(baseline), &inputs.config);
    let outcome = tracker
        .observe(revision, &matrix, block)
        .with_context(|| format!("Failed to store baseline {:?}", baseline))?;

    let label = match &outcome {
        CycleOutcome::Duplicate => "duplicate",
        CycleOutcome::Baselined => "baselined",
        CycleOutcome::BaselineDiscarded => "baseline_discarded",
        CycleOutcome::Compared(_) => "compared",
    };
    let report = CycleReport {
        revision,
        block,
        outcome: label,
        alerts: outcome.alerts(),
        summary: &summary,
    };

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    match output {
        OutputFormat::Json => writeln!(handle, "{}", serde_json::to_string_pretty(&report)?)?,
        OutputFormat::Csv => {
            writeln!(handle, "Plant,Slot,TimeSlot,Old,New,Delta")?;
            for alert in report.alerts {
                writeln!(
                    handle,
                    "{},{},{},{:.2},{:.2},{:.2}",
                    alert.plant,
                    alert.slot,
                    alert.slot_label(),
                    alert.old_value,
                    alert.new_value,
                    alert.delta
                )?;
            }
        }
        OutputFormat::Summary => {
            writeln!(handle, "Revision {} | Operating block {} | {}", revision, block, label)?;
            if report.alerts.is_empty() {
                writeln!(handle, "No schedule changes at or above threshold")?;
            }
            for alert in report.alerts {
                writeln!(
                    handle,
                    "  {} block {} ({}): {:.2} -> {:.2} MW ({:+.2})",
                    alert.plant,
                    alert.slot,
                    alert.slot_label(),
                    alert.old_value,
                    alert.new_value,
                    alert.delta
                )?;
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Aggregate { input, output, out } => run_aggregate(&input, output, out.as_deref()),
        Commands::Cycle {
            input,
            baseline,
            block,
            output,
            out,
        } => run_cycle(&input, &baseline, block, output, out.as_deref()),
    }
}
