//! Process Plugin Inspector
//!
//! Loads every class unit of a plugin archive (or exploded class directory)
//! through an isolated loading context with the configured namespace rewrite,
//! and reports the resulting supertypes and rewrite counts.
//!
//! # Usage
//!
//! ```bash
//! plugin-inspector dsf-process-ping-2.0.0.jar
//! plugin-inspector --from org/camunda/bpm --to org/operaton/bpm --json target/classes
//! plugin-inspector -c config/process-plugins.yaml -vv plugin.jar
//! ```

// CLI tools are expected to print to stdout/stderr
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod inspect;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use process_plugins::{ClassSource, NamespaceRewriter, ProcessPluginsConfig};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::inspect::Report;

/// Process Plugin Inspector
#[derive(Parser, Debug)]
#[command(name = "plugin-inspector")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Plugin archive or class directory
    #[arg(value_name = "PLUGIN")]
    plugin: PathBuf,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Namespace to rewrite (overrides config)
    #[arg(long)]
    from: Option<String>,

    /// Replacement namespace (overrides config)
    #[arg(long)]
    to: Option<String>,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(ref path) = cli.config
        && !Path::new(path).is_file()
    {
        anyhow::bail!("config file does not exist: {}", path.display());
    }

    let mut config = ProcessPluginsConfig::load(cli.config.as_deref())?;
    if let Some(from) = cli.from {
        config.namespace_rewrite.from = from;
    }
    if let Some(to) = cli.to {
        config.namespace_rewrite.to = to;
    }

    let rewriter = Arc::new(NamespaceRewriter::new(
        &config.namespace_rewrite.from,
        &config.namespace_rewrite.to,
    )?);
    let source = inspect::open_source(&cli.plugin)?;
    tracing::info!(source = %source.describe(), "Inspecting plugin");

    let report = inspect::inspect(source, rewriter);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(if report.failures.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_report(report: &Report) {
    println!("Source:    {}", report.source);
    println!("Rewrite:   {} -> {}", report.from, report.to);
    println!();

    for class in &report.classes {
        let marker = if class.rewrites.total() > 0 { "*" } else { " " };
        println!(
            "{marker} {:<60} extends {}",
            class.name,
            class.super_name.as_deref().unwrap_or("-")
        );
        if class.rewrites.total() > 0 {
            let r = &class.rewrites;
            println!(
                "    supertypes={} signatures={} fields={} methods={} instructions={} constants={} call_sites={}",
                r.supertypes,
                r.signatures,
                r.fields,
                r.methods,
                r.instructions,
                r.constants,
                r.call_sites
            );
        }
    }

    for failure in &report.failures {
        eprintln!("! {}: {}", failure.entry, failure.error);
    }

    println!();
    println!(
        "{} classes loaded, {} rewritten ({} references), {} failed",
        report.classes.len(),
        report.rewritten_classes(),
        report.total_rewrites(),
        report.failures.len()
    );
}
