use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use istep::config::ProtocolFile;
use istep::generator::Variant;
use istep::host::TraceSample;
use istep::trace::write_trace_csv;
use plotters::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Ticks to run when neither the file nor the command line sets a count
const MAX_TICKS: usize = 10_000_000;

/// Run a stimulus protocol and plot the commanded output
#[derive(Parser)]
#[command(name = "plot-protocol")]
#[command(version)]
struct Args {
    /// Output SVG path
    output: PathBuf,

    /// Protocol file (JSON)
    #[arg(short, long, conflicts_with = "variant")]
    protocol: Option<PathBuf>,

    /// Run a variant's defaults instead of a protocol file
    #[arg(long, value_parser = parse_variant)]
    variant: Option<Variant>,

    /// Override the host quantum in microseconds
    #[arg(long)]
    quantum_us: Option<u64>,

    /// Fixed number of ticks to run
    #[arg(long)]
    ticks: Option<usize>,

    /// Parameter override as name=value, by key or host label (repeatable)
    #[arg(long = "set", value_name = "NAME=VALUE")]
    overrides: Vec<String>,

    /// Constant observed voltage fed to the input channel (V)
    #[arg(long, default_value_t = -0.065, allow_negative_numbers = true)]
    vin: f64,

    /// Also write the recorded trace as CSV
    #[arg(long)]
    csv: Option<PathBuf>,
}

fn parse_variant(s: &str) -> Result<Variant, String> {
    s.parse().map_err(|e: istep::ConfigError| e.to_string())
}

fn load_protocol(args: &Args) -> Result<ProtocolFile> {
    let mut file = match (&args.protocol, args.variant) {
        (Some(path), _) => ProtocolFile::load(path)
            .with_context(|| format!("loading protocol {}", path.display()))?,
        (None, Some(variant)) => ProtocolFile::for_variant(variant),
        (None, None) => bail!("either --protocol or --variant is required"),
    };

    if let Some(quantum_us) = args.quantum_us {
        if quantum_us == 0 {
            bail!("quantum must be positive");
        }
        file.quantum_us = quantum_us;
    }
    if args.ticks.is_some() {
        file.ticks = args.ticks;
    }
    for assignment in &args.overrides {
        file.apply_assignment(assignment)
            .with_context(|| format!("applying --set {}", assignment))?;
    }
    Ok(file)
}

fn create_plot(path: &Path, title: &str, trace: &[TraceSample]) -> Result<()> {
    let root = SVGBackend::new(path, (1000, 400)).into_drawing_area();
    root.fill(&WHITE)?;

    let max_time = trace.last().map_or(1.0, |s| s.time).max(f64::EPSILON);
    let (mut lo, mut hi) = trace
        .iter()
        .fold((0.0f64, 0.0f64), |(lo, hi), s| (lo.min(s.output), hi.max(s.output)));
    if hi - lo <= f64::EPSILON {
        lo -= 1.0;
        hi += 1.0;
    }
    let margin = (hi - lo) * 0.1;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(0f64..max_time, (lo - margin)..(hi + margin))?;

    chart
        .configure_mesh()
        .x_desc("Time (s)")
        .y_desc("Iout")
        .x_labels(10)
        .y_labels(10)
        .y_label_formatter(&|v| format!("{:.2e}", v))
        .draw()?;

    chart.draw_series(LineSeries::new(
        trace.iter().map(|s| (s.time, s.output)),
        BLUE.stroke_width(2),
    ))?;

    // Mark phase transitions
    let mut last_phase = None;
    for sample in trace {
        if last_phase.is_some() && sample.phase != last_phase {
            chart.draw_series(std::iter::once(plotters::element::Cross::new(
                (sample.time, sample.output),
                4,
                BLACK.filled(),
            )))?;
        }
        last_phase = sample.phase;
    }

    root.present()?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let file = load_protocol(&args)?;
    let mut scheduler = file.scheduler()?;
    let params = *scheduler.module().parameters();

    info!(
        variant = file.variant.name(),
        quantum_us = file.quantum_us,
        "running protocol"
    );
    println!("Protocol: {}", file.variant.name());
    for descriptor in file.variant.descriptors() {
        if let Some(value) = params.get(descriptor.id) {
            println!("  {:<28} {}", descriptor.label, value);
        }
    }

    let vin = args.vin;
    let trace = match file.ticks {
        Some(ticks) => scheduler.run(ticks, |_| vin),
        None => scheduler.run_until_complete(MAX_TICKS, |_| vin),
    };
    if trace.is_empty() {
        bail!("protocol produced no samples");
    }
    println!(
        "  Ran {} ticks ({:.3}s), complete: {}",
        trace.len(),
        scheduler.elapsed(),
        scheduler.module().is_complete()
    );

    if let Some(csv) = &args.csv {
        write_trace_csv(csv, &trace)
            .with_context(|| format!("writing trace {}", csv.display()))?;
        println!("  Trace: {}", csv.display());
    }

    let title = format!(
        "{}: period={}s, cycles={}, offset={}pA",
        file.variant.name(),
        params.period,
        params.cycles,
        params.offset
    );
    create_plot(&args.output, &title, &trace)
        .with_context(|| format!("plotting {}", args.output.display()))?;
    println!("Output: {}", args.output.display());

    Ok(())
}
