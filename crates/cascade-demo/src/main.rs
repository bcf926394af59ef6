//! Runs the labelled cascade-rc scenarios and prints what each observes.

mod scenarios;

use anyhow::{bail, Result};
use cascade_rc::{Registry, RegistryConfig};
use clap::Parser;
use scenarios::SCENARIOS;
use std::io::Write;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "cascade-demo", version, about)]
struct Cli {
    /// Run only this scenario (1-based)
    #[arg(short, long)]
    scenario: Option<usize>,

    /// List scenarios and exit
    #[arg(long)]
    list: bool,

    /// Log every registry operation to stderr
    #[arg(short, long)]
    verbose: bool,

    #[arg(long, default_value_t = cascade_rc::DEFAULT_INITIAL_CAPACITY)]
    initial_capacity: usize,

    #[arg(long, default_value_t = cascade_rc::DEFAULT_GROWTH_FACTOR)]
    growth_factor: usize,

    #[arg(long, default_value_t = cascade_rc::DEFAULT_INITIAL_CAPACITY)]
    dependency_capacity: usize,
}

impl Cli {
    fn registry_config(&self) -> RegistryConfig {
        RegistryConfig::new()
            .with_initial_capacity(self.initial_capacity)
            .with_growth_factor(self.growth_factor)
            .with_dependency_capacity(self.dependency_capacity)
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "trace" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.list {
        for (i, scenario) in SCENARIOS.iter().enumerate() {
            println!("{:>2}  {:<10} {}", i + 1, scenario.name, scenario.summary);
        }
        return Ok(());
    }

    let config = cli.registry_config();
    let selected: Vec<_> = match cli.scenario {
        Some(n) if (1..=SCENARIOS.len()).contains(&n) => vec![&SCENARIOS[n - 1]],
        Some(n) => bail!("no scenario {n}, expected 1..={}", SCENARIOS.len()),
        None => SCENARIOS.iter().collect(),
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for (i, scenario) in selected.into_iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        writeln!(out, "{}:", scenario.name)?;

        let mut registry = Registry::with_config(config)?;
        (scenario.run)(&mut registry, &mut out)?;
        tracing::debug!(scenario = scenario.name, ?registry, "scenario finished");
    }
    Ok(())
}
