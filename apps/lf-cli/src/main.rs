use clap::{Parser, Subcommand};
use std::cell::Cell;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

use lf_app::{
    AppError, AppResult, BusyIndicator, CalculationMode, OrchestratorOptions, project_service,
    query,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lf-cli")]
#[command(about = "lcaflow CLI - calculation setups and matrix LCA", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate workspace file syntax and references
    Validate {
        /// Path to the workspace file (.yaml, .yml or .json)
        workspace: PathBuf,
    },
    /// List calculation setups in a workspace
    Setups {
        /// Path to the workspace file
        workspace: PathBuf,
    },
    /// Show the functional units and methods of a setup
    Show {
        /// Path to the workspace file
        workspace: PathBuf,
        /// Calculation setup name
        setup: String,
    },
    /// Calculate a setup
    Calc {
        /// Path to the workspace file
        workspace: PathBuf,
        /// Calculation setup name
        setup: String,
        /// Calculation mode: simple or scenario
        #[arg(long, default_value = "simple")]
        mode: String,
        /// Scenario dataset name (scenario mode)
        #[arg(long)]
        scenario: Option<String>,
        /// Number of top process contributions to print
        #[arg(long, default_value_t = 5)]
        top: usize,
    },
    /// Run the Monte-Carlo companion of a setup (first functional unit)
    MonteCarlo {
        /// Path to the workspace file
        workspace: PathBuf,
        /// Calculation setup name
        setup: String,
        /// Number of iterations
        #[arg(long, default_value_t = 100)]
        iterations: usize,
        /// Random seed
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Remove method references the catalog does not know
    Reconcile {
        /// Path to the workspace file
        workspace: PathBuf,
        /// Only reconcile this setup
        #[arg(long)]
        setup: Option<String>,
        /// Write the reconciled setups back to the workspace file
        #[arg(long)]
        write: bool,
    },
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { workspace } => cmd_validate(&workspace),
        Commands::Setups { workspace } => cmd_setups(&workspace),
        Commands::Show { workspace, setup } => cmd_show(&workspace, &setup),
        Commands::Calc {
            workspace,
            setup,
            mode,
            scenario,
            top,
        } => cmd_calc(&workspace, &setup, &mode, scenario.as_deref(), top),
        Commands::MonteCarlo {
            workspace,
            setup,
            iterations,
            seed,
        } => cmd_monte_carlo(&workspace, &setup, iterations, seed),
        Commands::Reconcile {
            workspace,
            setup,
            write,
        } => cmd_reconcile(&workspace, setup.as_deref(), write),
    }
}

/// Prints a status line while a calculation runs.
struct StatusLine {
    started: Cell<Option<Instant>>,
}

impl StatusLine {
    fn new() -> Self {
        Self {
            started: Cell::new(None),
        }
    }
}

impl BusyIndicator for StatusLine {
    fn set_busy(&self) {
        self.started.set(Some(Instant::now()));
        print!("\rCalculating...");
        let _ = io::stdout().flush();
    }

    fn clear_busy(&self) {
        print!("\r{}\r", " ".repeat(40));
        if let Some(t) = self.started.take() {
            println!("Calculated in {:.3} s", t.elapsed().as_secs_f64());
        }
        let _ = io::stdout().flush();
    }
}

fn cmd_validate(path: &Path) -> AppResult<()> {
    println!("Validating workspace: {}", path.display());
    let workspace = project_service::load_workspace(path)?;
    let warnings = project_service::validate_workspace(&workspace)?;
    for w in &warnings {
        println!("  warning: {w}");
    }
    println!("✓ Workspace is valid ({} warnings)", warnings.len());
    Ok(())
}

fn cmd_setups(path: &Path) -> AppResult<()> {
    let workspace = project_service::load_workspace(path)?;
    let setups = project_service::list_setups(&workspace);

    if setups.is_empty() {
        println!("No calculation setups in workspace");
    } else {
        println!("Calculation setups:");
        for s in setups {
            println!(
                "  {} ({} functional units, {} methods)",
                s.name, s.func_unit_count, s.method_count
            );
        }
    }
    Ok(())
}

fn cmd_show(path: &Path, setup: &str) -> AppResult<()> {
    let workspace = project_service::load_workspace(path)?;
    let session = project_service::open_session(&workspace)?;
    session.select(setup)?;

    println!("Calculation setup: {setup}");
    println!("Functional units:");
    for row in session.functional_units().rows() {
        println!(
            "  {:>10.4} {:<6} {:<24} {:<32} {:<8} {}",
            row.amount, row.unit, row.product, row.activity, row.location, row.key
        );
    }
    for fu in session.functional_units().unresolved() {
        println!("  (unresolved) {} {}", fu.key, fu.amount);
    }
    println!("Methods:");
    for row in session.methods().rows() {
        println!("  {:<48} {:<16} {} CFs", row.name, row.unit, row.cf_count);
    }
    Ok(())
}

fn cmd_calc(
    path: &Path,
    setup: &str,
    mode: &str,
    scenario: Option<&str>,
    top: usize,
) -> AppResult<()> {
    let workspace = project_service::load_workspace(path)?;
    let data = match scenario {
        Some(name) => Some(
            workspace
                .scenario(name)
                .cloned()
                .ok_or_else(|| AppError::ScenarioNotFound(name.to_string()))?,
        ),
        None => None,
    };
    let mode = CalculationMode::from_name(mode, data)?;

    let session = project_service::open_session(&workspace)?;
    let orchestrator = session
        .orchestrator(OrchestratorOptions::default())
        .with_busy_indicator(Rc::new(StatusLine::new()));
    let output = orchestrator.run(setup, &mode)?;

    let table = query::score_table(&output)?;
    println!("Scores:");
    for (m, method) in table.methods.iter().enumerate() {
        println!("  [{m}] {method}");
    }
    for row in &table.rows {
        let scores: Vec<String> = row.scores.iter().map(|s| format!("{s:.6e}")).collect();
        match &row.scenario {
            Some(scenario) => println!(
                "  {scenario:<16} {} x{}  {}",
                row.key,
                row.amount,
                scores.join("  ")
            ),
            None => println!("  {} x{}  {}", row.key, row.amount, scores.join("  ")),
        }
    }

    if top > 0 && !table.methods.is_empty() {
        println!("Top {top} process contributions (first functional unit, first method):");
        for c in query::top_contributions(&output, 0, 0, 0, top)? {
            println!("  {:<32} {:>14.6e} {:>7.2}%", c.key, c.score, c.share * 100.0);
        }
    }
    Ok(())
}

fn cmd_monte_carlo(path: &Path, setup: &str, iterations: usize, seed: u64) -> AppResult<()> {
    let workspace = project_service::load_workspace(path)?;
    let session = project_service::open_session(&workspace)?;
    let orchestrator = session
        .orchestrator(OrchestratorOptions {
            monte_carlo_iterations: iterations,
            seed,
        })
        .with_busy_indicator(Rc::new(StatusLine::new()));
    let output = orchestrator.run(setup, &CalculationMode::Simple)?;

    let demand = output.monte_carlo.demand();
    println!(
        "Monte-Carlo: {} x{} ({} iterations, seed {})",
        demand.key, demand.amount, iterations, seed
    );
    let result = orchestrator.run_monte_carlo(&output.monte_carlo)?;
    for s in query::summarize_monte_carlo(&result) {
        println!(
            "  {:<48} mean={:.6e} sd={:.6e} 95%=[{:.6e}, {:.6e}]",
            s.method.to_string(),
            s.mean,
            s.std_dev,
            s.p2_5,
            s.p97_5
        );
    }
    Ok(())
}

fn cmd_reconcile(path: &Path, setup: Option<&str>, write: bool) -> AppResult<()> {
    let mut workspace = project_service::load_workspace(path)?;
    let session = project_service::open_session(&workspace)?;
    let removed = session.methods().reconcile(setup)?;
    println!("Removed {removed} stale method references");

    if write {
        project_service::store_setups(&mut workspace, session.store());
        project_service::save_workspace(path, &workspace)?;
        println!("✓ Wrote {}", path.display());
    }
    Ok(())
}
