//! Deletion gate simulator
//!
//! `contend` races the confirmer against competing writers on an in-memory
//! store; `check` runs the admission check against a JSON manifest.

mod contend;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use contend::{run_contention, ContendConfig};
use dgate_core::{
    check_deletion_confirmed, telemetry::init_tracing, DeletionConfirmer, GateConfig, LogFormat,
    ManagedResource,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

fn cli() -> Command {
    Command::new("dgate-sim")
        .version(dgate_core::VERSION)
        .about("Deletion gate simulator")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Gate configuration file (TOML)"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("contend")
                .about("Confirm deletion while competing writers modify the object")
                .arg(
                    Arg::new("writers")
                        .long("writers")
                        .default_value("4")
                        .value_parser(value_parser!(usize))
                        .help("Number of competing writers"),
                )
                .arg(
                    Arg::new("rounds")
                        .long("rounds")
                        .default_value("20")
                        .value_parser(value_parser!(u32))
                        .help("Modifications per writer"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("timeout-ms")
                        .long("timeout-ms")
                        .default_value("10000")
                        .value_parser(value_parser!(u64))
                        .help("Deadline for the confirmation"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Check whether a manifest's deletion is confirmed")
                .arg(
                    Arg::new("manifest")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Path to a JSON resource manifest"),
                ),
        )
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<GateConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => GateConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => GateConfig::default(),
    };
    if matches.get_flag("json") {
        config.logging.format = LogFormat::Json;
    }
    Ok(config)
}

async fn contend(config: &GateConfig, args: &ArgMatches) -> anyhow::Result<bool> {
    let confirmer = DeletionConfirmer::from_config(config)?;
    let defaults = ContendConfig::default();
    let sim = ContendConfig {
        seed: args.get_one::<u64>("seed").copied().unwrap_or(defaults.seed),
        writers: args
            .get_one::<usize>("writers")
            .copied()
            .unwrap_or(defaults.writers),
        rounds: args
            .get_one::<u32>("rounds")
            .copied()
            .unwrap_or(defaults.rounds),
        timeout: args
            .get_one::<u64>("timeout-ms")
            .map_or(defaults.timeout, |ms| Duration::from_millis(*ms)),
        ..defaults
    };

    let report = run_contention(sim, &confirmer).await;
    println!("{}", report.generate_text());
    Ok(report.passed())
}

fn check(args: &ArgMatches) -> anyhow::Result<bool> {
    let path = args
        .get_one::<PathBuf>("manifest")
        .context("manifest path is required")?;
    let input = std::fs::read_to_string(path)
        .with_context(|| format!("reading manifest {}", path.display()))?;
    let resource: ManagedResource = serde_json::from_str(&input)
        .with_context(|| format!("parsing manifest {}", path.display()))?;

    match check_deletion_confirmed(&resource) {
        Ok(()) => {
            println!("{}: deletion confirmed", resource.key);
            Ok(true)
        }
        Err(err) => {
            println!("{err}");
            Ok(false)
        }
    }
}

async fn run() -> anyhow::Result<bool> {
    let matches = cli().get_matches();
    let config = load_config(&matches)?;
    init_tracing(&config.logging)?;

    match matches.subcommand() {
        Some(("contend", args)) => contend(&config, args).await,
        Some(("check", args)) => check(args),
        _ => anyhow::bail!("a subcommand is required"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let matches = cli()
            .try_get_matches_from(["dgate-sim", "contend", "--writers", "2", "--json"])
            .unwrap();
        let config = load_config(&matches).unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);

        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "contend");
        assert_eq!(args.get_one::<usize>("writers"), Some(&2));
        assert_eq!(args.get_one::<u32>("rounds"), Some(&20));
    }

    #[test]
    fn check_requires_manifest() {
        assert!(cli().try_get_matches_from(["dgate-sim", "check"]).is_err());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let matches = cli()
            .try_get_matches_from(["dgate-sim", "--config", "/nonexistent.toml", "contend"])
            .unwrap();
        let err = load_config(&matches).unwrap_err();
        assert!(err.to_string().contains("/nonexistent.toml"));
    }
}
