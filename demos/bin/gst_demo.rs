//! Gate set tomography demo driver.
//!
//! ```text
//! gst-demo simulate --noise depolarizing:0.05 --shots 50000 -o table.json
//! gst-demo fit -i table.json -o report.json
//! gst-demo run --noise amplitude_damping:0.1 --shots 100000
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use qgst_core::unitary::{hadamard, s_gate};
use qgst_core::{GateSet, GateSetBasis, ProbabilityTable};
use qgst_demos::noise::NoiseChannel;
use qgst_demos::synthetic::SyntheticExperiment;
use qgst_demos::{
    print_gate_set, print_header, print_info, print_result, print_section, print_success,
    print_warning,
};
use qgst_fit::{FitConfig, FitReport, GatesetTomographyFitter, GaugeMethod};
use tracing_subscriber::EnvFilter;

/// qgst - gate set tomography on synthetic data
#[derive(Parser)]
#[command(name = "gst-demo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a probability table from a noisy gate set
    Simulate {
        #[command(flatten)]
        data: DataArgs,

        /// Output file (JSON); prints to stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fit a gate set to a probability table
    Fit {
        /// Input table (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Gate set basis the table was recorded with
        #[arg(short, long, value_enum, default_value = "standard")]
        basis: BasisChoice,

        #[command(flatten)]
        fit: FitArgs,
    },

    /// Simulate and fit in one go, comparing the estimate with the truth
    Run {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        fit: FitArgs,
    },
}

#[derive(clap::Args)]
struct DataArgs {
    /// Gate set basis
    #[arg(short, long, value_enum, default_value = "standard")]
    basis: BasisChoice,

    /// Noise channel as name:value (repeatable)
    #[arg(short, long = "noise")]
    noise: Vec<NoiseChannel>,

    /// Shots per experiment; exact probabilities if omitted
    #[arg(short, long)]
    shots: Option<u64>,

    /// Sampling seed
    #[arg(long, default_value = "0")]
    seed: u64,
}

#[derive(clap::Args)]
struct FitArgs {
    /// Configuration file (YAML)
    #[arg(short, long, env = "QGST_CONFIG")]
    config: Option<PathBuf>,

    /// Gauge minimizer, overriding the configuration
    #[arg(long)]
    gauge_method: Option<GaugeMethod>,

    /// Write the report as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the fitted matrices
    #[arg(long)]
    show: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum BasisChoice {
    /// Id, X_Rot_90, Y_Rot_90
    Standard,
    /// Standard plus Hadamard and phase gates
    Extended,
}

impl BasisChoice {
    fn build(self) -> Result<GateSetBasis> {
        let basis = GateSetBasis::standard()?;
        Ok(match self {
            BasisChoice::Standard => basis,
            BasisChoice::Extended => basis
                .with_unitary_gate("H", &hadamard())?
                .with_unitary_gate("S", &s_gate())?,
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Simulate { data, output } => simulate(&data, output.as_deref()),
        Commands::Fit { input, basis, fit } => fit_file(&input, basis, &fit),
        Commands::Run { data, fit } => run(&data, &fit),
    };

    // Handle errors
    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}

fn experiment(data: &DataArgs) -> Result<SyntheticExperiment> {
    let mut experiment = SyntheticExperiment::new(data.basis.build()?).with_seed(data.seed);
    for channel in &data.noise {
        experiment = experiment.with_noise(*channel)?;
    }
    if let Some(shots) = data.shots {
        experiment = experiment.with_shots(shots);
    }
    Ok(experiment)
}

fn simulate(data: &DataArgs, output: Option<&Path>) -> Result<()> {
    let table = experiment(data)?.table()?;
    let json = serde_json::to_string_pretty(&table)?;

    match output {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("Failed to write table to {}", path.display()))?;
            eprintln!(
                "{} Wrote {} probabilities to {}",
                style("✓").green().bold(),
                table.len(),
                style(path.display()).green()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn fit_file(input: &Path, basis: BasisChoice, args: &FitArgs) -> Result<()> {
    let contents = fs::read_to_string(input)
        .with_context(|| format!("Failed to read table from {}", input.display()))?;
    let table: ProbabilityTable = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse table in {}", input.display()))?;

    print_header("Gate Set Tomography Fit");
    print_result("Input", input.display());
    print_result("Experiments", table.len());

    let basis = basis.build()?;
    let report = fit(basis.clone(), table, args)?;
    if args.show {
        print_section("Estimate");
        print_gate_set(&report.gate_set, basis.pauli());
    }
    Ok(())
}

fn run(data: &DataArgs, args: &FitArgs) -> Result<()> {
    let experiment = experiment(data)?;
    let truth = experiment.truth()?;

    print_header("Gate Set Tomography Demo");
    let noise: Vec<String> = experiment.noise().iter().map(ToString::to_string).collect();
    print_result(
        "Noise",
        if noise.is_empty() {
            "none".to_string()
        } else {
            noise.join(", ")
        },
    );
    print_result(
        "Shots",
        data.shots
            .map_or_else(|| "exact".to_string(), |s| s.to_string()),
    );

    let basis = experiment.basis().clone();
    let report = fit(basis.clone(), experiment.table()?, args)?;

    print_section("Comparison with truth");
    compare(&report.gate_set, &truth)?;
    if args.show {
        print_section("Truth");
        print_gate_set(&truth, basis.pauli());
        print_section("Estimate");
        print_gate_set(&report.gate_set, basis.pauli());
    }
    Ok(())
}

fn fit(basis: GateSetBasis, table: ProbabilityTable, args: &FitArgs) -> Result<FitReport> {
    let mut config = FitConfig::load(args.config.as_deref())?;
    if let Some(method) = args.gauge_method {
        config.gauge.method = method;
    }
    print_info(&format!(
        "Gauge: {}, constrained fit: {} outer x {} inner iterations",
        config.gauge.method, config.mle.max_outer_iterations, config.mle.max_inner_iterations
    ));

    let fitter = GatesetTomographyFitter::new(basis, table, config)?;

    print_section("Linear inversion");
    let raw = fitter.linear_inversion()?;
    print_result("Gram condition", format!("{:.3e}", raw.condition));

    let report = fitter.fit()?;

    print_section("Gauge optimization");
    if let Some(gauge) = &report.gauge {
        print_result("Distance", format!("{:.3e}", gauge.distance));
        print_result("Iterations", gauge.iterations);
        print_result("Termination", gauge.termination);
    }

    print_section("Constrained fit");
    print_result("Objective", format!("{:.3e}", report.mle.objective));
    print_result("Max violation", format!("{:.3e}", report.mle.max_violation));
    print_result(
        "Iterations",
        format!(
            "{} outer, {} inner",
            report.mle.outer_iterations, report.mle.inner_iterations
        ),
    );
    print_result("Termination", report.mle.termination);
    print_result("Tr(rho)", format!("{:.6}", report.gate_set.rho_trace()));

    for warning in &report.warnings {
        print_warning(&warning.to_string());
    }

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        print_result("Report", style(path.display()).green());
    }

    println!();
    print_success("Fit complete");
    Ok(report)
}

fn compare(estimate: &GateSet, truth: &GateSet) -> Result<()> {
    for (label, distance) in estimate.gate_distances(truth)? {
        print_result(&format!("‖{label} − truth‖²"), format!("{distance:.3e}"));
    }
    Ok(())
}
