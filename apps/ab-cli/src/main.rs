mod scenario;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ab_train::{SimRecord, run_train};
use ab_valves::{BUILTIN_NAMES, ValveRegistry};
use clap::{Parser, Subcommand};
use scenario::{CliResult, Scenario};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ab-cli")]
#[command(about = "Air brake CLI - train brake pneumatics simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in valve types and their layout
    Valves,
    /// Run a scenario file
    Run {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
        /// Print the whole record as JSON instead of CSV
        #[arg(long)]
        json: bool,
        /// Override the time step (seconds)
        #[arg(long)]
        dt: Option<f64>,
        /// Override the end time (seconds)
        #[arg(long)]
        t_end: Option<f64>,
    },
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Valves => cmd_valves(),
        Commands::Run {
            scenario_path,
            json,
            dt,
            t_end,
        } => cmd_run(&scenario_path, json, dt, t_end),
    }
}

fn cmd_valves() -> CliResult<()> {
    let mut registry = ValveRegistry::new();
    for name in BUILTIN_NAMES {
        let cfg = registry.get(name)?;
        println!("{}", cfg.name());
        for (i, tank) in cfg.tanks().iter().enumerate() {
            let kind = if tank.is_conduit() { "conduit" } else { "reservoir" };
            println!(
                "  tank {:>2}  {:<14} {:<9} {:>9.5} m3",
                i,
                tank.name,
                kind,
                tank.volume_m3()
            );
        }
        for (i, piston) in cfg.pistons().iter().enumerate() {
            let states: Vec<&str> = piston.states.iter().map(|s| s.name.as_str()).collect();
            println!(
                "  piston {}  {} vs {}: {}",
                i,
                cfg.tanks()[piston.up_tank].name,
                cfg.tanks()[piston.down_tank].name,
                states.join(" / ")
            );
        }
        if !cfg.retainers().is_empty() {
            let names: Vec<&str> = cfg.retainers().iter().map(|r| r.name.as_str()).collect();
            println!("  retainer  {}", names.join(" / "));
        }
    }
    Ok(())
}

fn cmd_run(path: &Path, json: bool, dt: Option<f64>, t_end: Option<f64>) -> CliResult<()> {
    let scenario = Scenario::load(path)?;
    let mut opts = scenario.sim_options();
    if let Some(dt) = dt {
        opts.dt = dt;
    }
    if let Some(t_end) = t_end {
        opts.t_end = t_end;
    }

    let (mut train, controller) = scenario.build()?.into_parts();
    let record = run_train(&mut train, &opts, controller)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &record)?;
        writeln!(out)?;
    } else {
        write_csv(&mut out, &record)?;
    }
    Ok(())
}

/// One row per recorded time and unit.
fn write_csv(out: &mut impl Write, record: &SimRecord) -> io::Result<()> {
    writeln!(
        out,
        "time_s,unit,valve,state,pipe_psig,aux_psig,cyl_psig,brake_force,main_res_psig,equalizing_res_psig"
    )?;
    for (t, frame) in record.t.iter().zip(&record.frames) {
        for (i, g) in frame.iter().enumerate() {
            writeln!(
                out,
                "{:.3},{},{},{},{:.3},{:.3},{:.3},{:.3},{},{}",
                t,
                i,
                g.valve,
                g.state,
                g.pipe_psig,
                g.aux_psig,
                g.cyl_psig,
                g.brake_force,
                opt(g.main_res_psig),
                opt(g.equalizing_res_psig)
            )?;
        }
    }
    Ok(())
}

fn opt(v: Option<f64>) -> String {
    v.map(|v| format!("{:.3}", v)).unwrap_or_default()
}
