/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use playout_analyzer::report::{
    write_decisions_jsonl, write_simulation_summary, write_trace_jsonl, write_trace_report,
};
use playout_analyzer::arrival::{DEFAULT_MEAN, DEFAULT_UNIFORM_RANGE, DEFAULT_VARIANCE};
use playout_analyzer::trace::bucket_trace;
use playout_analyzer::{
    simulate, AnalyzerConfig, ArrivalDistribution, SequenceAnalyzer, TraceReader,
};

/// Playout analyzer
///
/// Replays capture traces into per-window diagnostics, or evaluates the
/// adaptive playout-delay estimator against synthetic arrivals.
#[derive(Parser, Debug)]
#[clap(name = "playout-analyzer", version)]
struct Opt {
    /// JSON configuration file; flags override individual values
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Analyze a captured event trace
    Trace(TraceArgs),

    /// Simulate playout over synthetic flight times
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
struct TraceArgs {
    /// Capture file, one `timestamp_us,KIND[,payload]` record per line
    #[clap(value_parser)]
    capture: PathBuf,

    #[clap(long)]
    bucket_width_ms: Option<i64>,

    /// Distance between reported bucket keys in microseconds
    #[clap(long)]
    step_us: Option<i64>,

    #[clap(long)]
    gap_threshold_ms: Option<i64>,

    /// Insert a separator before keys divisible by this many microseconds
    #[clap(long)]
    separator_every_us: Option<i64>,

    /// Emit JSON lines instead of text rows
    #[clap(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum DistributionKind {
    Normal,
    Uniform,
    Constant,
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// Number of synthetic packets
    #[clap(long)]
    samples: Option<usize>,

    #[clap(long)]
    alpha: Option<f64>,

    #[clap(long)]
    beta: Option<f64>,

    #[clap(long)]
    initial_delay: Option<f64>,

    /// Arrival distribution; inferred from the parameter flags when omitted
    #[clap(long, value_enum)]
    distribution: Option<DistributionKind>,

    /// Mean flight time (normal), or the constant value
    #[clap(long)]
    mean: Option<f64>,

    /// Flight-time variance (normal)
    #[clap(long)]
    variance: Option<f64>,

    /// Lower bound (uniform)
    #[clap(long)]
    low: Option<f64>,

    /// Upper bound (uniform)
    #[clap(long)]
    high: Option<f64>,

    #[clap(long)]
    seed: Option<u64>,

    /// Write the per-sample arrival/playout series as JSON lines
    #[clap(long)]
    series: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let opt = Opt::parse();
    let mut config = match &opt.config {
        Some(path) => AnalyzerConfig::from_json_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => AnalyzerConfig::default(),
    };

    match opt.mode {
        Mode::Trace(args) => run_trace(&mut config, args),
        Mode::Simulate(args) => run_simulation(&mut config, args),
    }
}

fn run_trace(config: &mut AnalyzerConfig, args: TraceArgs) -> anyhow::Result<()> {
    let trace = &mut config.trace;
    if let Some(width) = args.bucket_width_ms {
        trace.bucket_width_ms = width;
    }
    if let Some(step) = args.step_us {
        trace.report_step_us = step;
    }
    if let Some(threshold) = args.gap_threshold_ms {
        trace.gap_threshold_ms = threshold;
    }
    if args.separator_every_us.is_some() {
        trace.separator_every_us = args.separator_every_us;
    }

    let mut analyzer = SequenceAnalyzer::new(trace)?;
    let reader = TraceReader::open(&args.capture)
        .with_context(|| format!("opening {}", args.capture.display()))?;
    let (buckets, summary) = bucket_trace(trace, reader)?;
    log::info!(
        "Read {} events from {} lines of {}",
        summary.accepted,
        summary.lines,
        args.capture.display()
    );

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let records = analyzer.records(&buckets);
    if args.json {
        write_trace_jsonl(&mut out, records)?;
    } else {
        write_trace_report(&mut out, records)?;
    }
    out.flush()?;
    Ok(())
}

fn run_simulation(config: &mut AnalyzerConfig, args: SimulateArgs) -> anyhow::Result<()> {
    let simulation = &mut config.simulation;
    if let Some(samples) = args.samples {
        simulation.sample_count = samples;
    }
    if let Some(alpha) = args.alpha {
        simulation.estimator.alpha = alpha;
    }
    if let Some(beta) = args.beta {
        simulation.estimator.beta = beta;
    }
    if let Some(initial_delay) = args.initial_delay {
        simulation.estimator.initial_delay = initial_delay;
    }
    simulation.distribution = distribution_from_args(simulation.distribution, &args)?;
    if args.seed.is_some() {
        simulation.seed = args.seed;
    }

    let report = simulate(simulation)?;

    if let Some(path) = &args.series {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut out = BufWriter::new(file);
        write_decisions_jsonl(&mut out, &report.decisions)?;
        out.flush()?;
        log::info!("Wrote {} samples to {}", report.decisions.len(), path.display());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_simulation_summary(&mut out, &report.statistics)?;
    Ok(())
}

fn kind_of(distribution: &ArrivalDistribution) -> DistributionKind {
    match distribution {
        ArrivalDistribution::Normal { .. } => DistributionKind::Normal,
        ArrivalDistribution::Uniform { .. } => DistributionKind::Uniform,
        ArrivalDistribution::Constant { .. } => DistributionKind::Constant,
    }
}

/// Merge the distribution flags into the configured distribution.
///
/// Without `--distribution` the kind follows the parameter flags given, then
/// the configured kind. Unset parameters keep their configured values.
fn distribution_from_args(
    current: ArrivalDistribution,
    args: &SimulateArgs,
) -> anyhow::Result<ArrivalDistribution> {
    let uniform_flags = args.low.is_some() || args.high.is_some();
    let kind = match args.distribution {
        Some(kind) => kind,
        None if uniform_flags => DistributionKind::Uniform,
        None if args.variance.is_some() => DistributionKind::Normal,
        None => kind_of(&current),
    };

    let distribution = match kind {
        DistributionKind::Normal => {
            if uniform_flags {
                anyhow::bail!("--low/--high only apply to the uniform distribution");
            }
            let (mean, variance) = match current {
                ArrivalDistribution::Normal { mean, variance } => (mean, variance),
                ArrivalDistribution::Constant { value } => (value, DEFAULT_VARIANCE),
                ArrivalDistribution::Uniform { .. } => (DEFAULT_MEAN, DEFAULT_VARIANCE),
            };
            ArrivalDistribution::Normal {
                mean: args.mean.unwrap_or(mean),
                variance: args.variance.unwrap_or(variance),
            }
        }
        DistributionKind::Uniform => {
            if args.mean.is_some() || args.variance.is_some() {
                anyhow::bail!("--mean/--variance do not apply to the uniform distribution");
            }
            let (low, high) = match current {
                ArrivalDistribution::Uniform { low, high } => (low, high),
                _ => DEFAULT_UNIFORM_RANGE,
            };
            ArrivalDistribution::Uniform {
                low: args.low.unwrap_or(low),
                high: args.high.unwrap_or(high),
            }
        }
        DistributionKind::Constant => {
            if uniform_flags || args.variance.is_some() {
                anyhow::bail!("only --mean applies to the constant distribution");
            }
            let value = match current {
                ArrivalDistribution::Constant { value } => value,
                ArrivalDistribution::Normal { mean, .. } => mean,
                ArrivalDistribution::Uniform { .. } => DEFAULT_MEAN,
            };
            ArrivalDistribution::Constant {
                value: args.mean.unwrap_or(value),
            }
        }
    };
    Ok(distribution)
}
