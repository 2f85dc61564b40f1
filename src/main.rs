//! CLI entry point for hybrid-sim
//!
//! Provides a command-line interface for:
//! - Checking a session file without opening any link
//! - Driving a displacement history through a configured site
//!
//! # Usage
//!
//! Check a session:
//! ```bash
//! hybrid-sim check --config session.toml
//! ```
//!
//! Run 100 steps against site 1:
//! ```bash
//! hybrid-sim run --config session.toml --site 1 --steps 100 --amplitude 0.5 --period 40
//! ```

// Global allocator (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hybrid_sim::control::{Confirm, InitDecision, InitPrompt, XpcTargetFactory};
use hybrid_sim::core::Tag;
use hybrid_sim::registry::Registry;
use hybrid_sim::{logging, run_sinusoid, SessionConfig, Sinusoid};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "hybrid-sim")]
#[command(about = "Experimental control for hybrid simulation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a session file without opening any link
    Check {
        /// Session file (TOML)
        #[arg(long)]
        config: PathBuf,
    },

    /// Build the session and drive a sinusoidal displacement history
    Run {
        /// Session file (TOML)
        #[arg(long)]
        config: PathBuf,

        /// Tag of the site to drive
        #[arg(long)]
        site: Tag,

        /// Number of analysis steps
        #[arg(long, default_value_t = 100)]
        steps: usize,

        /// Peak displacement
        #[arg(long, default_value_t = 1.0)]
        amplitude: f64,

        /// Steps per cycle
        #[arg(long, default_value_t = 40)]
        period: usize,

        /// Ask on the console before starting a real-time target
        #[arg(long)]
        interactive: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config } => check(&config),
        Commands::Run {
            config,
            site,
            steps,
            amplitude,
            period,
            interactive,
        } => run(
            &config,
            site,
            Sinusoid {
                steps,
                amplitude,
                period,
            },
            interactive,
        ),
    }
}

fn load(path: &Path) -> Result<SessionConfig> {
    let config = SessionConfig::load(path).with_context(|| format!("loading {}", path.display()))?;
    logging::init(&config.logging).context("initializing logging")?;
    config.validate().with_context(|| format!("validating {}", path.display()))?;
    Ok(config)
}

fn check(path: &Path) -> Result<()> {
    let config = load(path)?;
    let registry = Registry::with_builtin_factories();
    registry.check(&config.session)?;

    println!("Session OK: {}", path.display());
    println!("  filters:  {}", config.session.filters.len());
    println!("  controls: {}", config.session.controls.len());
    println!("  sites:    {}", config.session.sites.len());
    Ok(())
}

fn run(path: &Path, site_tag: Tag, history: Sinusoid, interactive: bool) -> Result<()> {
    let config = load(path)?;

    let mut registry = Registry::with_builtin_factories();
    if interactive {
        registry.register_factory(Box::new(XpcTargetFactory::with_confirm(console_confirm())));
    }
    registry.load(&config.session).context("creating session")?;

    let site = registry
        .site(site_tag)
        .with_context(|| format!("site {site_tag} is not defined in {}", path.display()))?;
    info!(site = site_tag, "session ready");
    println!("{}", site.lock());

    let summary = run_sinusoid(&site, &history).with_context(|| format!("driving site {site_tag}"))?;

    println!("Completed {} steps", summary.records.len());
    println!("  peak force: {:.6}", summary.peak_force());
    if let Some(last) = summary.records.last() {
        println!("  final displacement: {:?}", last.disp);
        println!("  final force:        {:?}", last.force);
    }

    drop(site);
    registry.clear();
    Ok(())
}

/// Confirmation callback reading answers from standard input.
fn console_confirm() -> Confirm {
    Arc::new(|prompt: &InitPrompt| {
        let question = match prompt {
            InitPrompt::ZeroOffsets => "Press Enter to start the application, or 'c' to cancel: ",
            InitPrompt::InitialReadings { .. } => {
                "Press Enter to continue, 'r' to repeat the measurement, or 'c' to cancel: "
            }
        };
        println!("{prompt}");
        print!("{question}");
        let _ = io::stdout().flush();

        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return InitDecision::Cancel;
        }
        match answer.trim().to_lowercase().as_str() {
            "c" | "cancel" => InitDecision::Cancel,
            "r" | "repeat" => InitDecision::Repeat,
            _ => InitDecision::Proceed,
        }
    })
}
