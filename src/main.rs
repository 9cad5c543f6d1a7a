//! midi-corpus
//!
//! Builds a composer-indexed feature corpus from `<base>/<composer>/*.mid`.
//!
//! Usage:
//!   midi-corpus [OPTIONS]
//!
//! Options:
//!   --config <path>       Config file (default: <config dir>/midi-corpus/config.toml)
//!   --base-dir <path>     Override the corpus base directory
//!   --composers <a,b,c>   Override the composer list
//!   --workers <n>         Override the worker count
//!   --output <path>       Override the output file
//!   --save-config         Write the effective config back to the config file
//!   --verbose             Extra debug output

use std::path::PathBuf;

use midi_corpus_lib::config::{default_config_path, Config};
use midi_corpus_lib::RunReport;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let verbose = args.iter().any(|a| a == "--verbose");
    let save_config = args.iter().any(|a| a == "--save-config");

    // Init logging
    let log_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level)
    ).init();

    let config_path = flag_value(&args, "--config")
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);
    let mut config = Config::load_or_default(&config_path);

    if let Some(base) = flag_value(&args, "--base-dir") {
        config.base_directory = PathBuf::from(base);
    }
    if let Some(list) = flag_value(&args, "--composers") {
        config.composers = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(workers) = flag_value(&args, "--workers") {
        match workers.parse::<usize>() {
            Ok(n) => config.workers = Some(n),
            Err(_) => {
                eprintln!("Invalid --workers value: {}", workers);
                std::process::exit(2);
            }
        }
    }
    if let Some(output) = flag_value(&args, "--output") {
        config.output_path = PathBuf::from(output);
    }

    if save_config {
        match config.save(&config_path) {
            Ok(()) => println!("Saved config to {}", config_path.display()),
            Err(e) => eprintln!("Failed to save config: {:#}", e),
        }
    }

    match midi_corpus_lib::run(&config) {
        Ok(report) => print_summary(&report),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn print_summary(report: &RunReport) {
    println!("\n=== Final processed files per composer ===\n");
    for totals in &report.totals {
        println!(
            "  {}: {} total files ({} valid, {} errors)",
            totals.composer, totals.total, totals.valid, totals.errors
        );
    }

    // Composers that were configured but produced nothing
    for (composer, count) in &report.scan.counts {
        if *count == 0 {
            println!("  {}: 0 files", composer);
        }
    }

    if !report.ambiguities.is_empty() {
        println!("\n  {} merge ambiguities:", report.ambiguities.len());
        for ambiguity in &report.ambiguities {
            println!("    -> {}", ambiguity);
        }
    }

    println!("\n  Corpus written to {}", report.output_path.display());
}
