//! glrunner CLI - register and unregister GitLab CI runners

use clap::{Parser, Subcommand};
use colored::Colorize;
use glrunner_client::{
    Lifecycle, RegisterOutcome, RunnerService, TransportOptions, UnregisterReport,
    UnregisterStatus,
};
use glrunner_core::{Config, RequestOptions, RunnerError, TokenStore};
use serde_json::Value;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "glrunner")]
#[command(about = "Register and unregister GitLab CI runners", long_about = None)]
struct Cli {
    /// Config file (TOML)
    #[arg(long, global = true, env = "GLRUNNER_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding auth-token-<name> files
    #[arg(long, global = true, env = "GLRUNNER_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// HTTP proxy for API calls (e.g., http://proxy.example.org:3128)
    #[arg(long, global = true, env = "GLRUNNER_PROXY")]
    proxy: Option<String>,

    /// PEM file of a trusted certificate authority
    #[arg(long, global = true, env = "GLRUNNER_CA_FILE")]
    ca_file: Option<PathBuf>,

    /// Skip TLS certificate verification
    #[arg(long, global = true)]
    insecure: bool,

    /// Report what would happen without contacting GitLab
    #[arg(long, global = true)]
    noop: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a runner and store its auth token
    Register {
        /// GitLab base URL (e.g., https://gitlab.com)
        #[arg(long, env = "GLRUNNER_URL")]
        url: Option<String>,

        /// Registration token from the GitLab project, group or instance
        #[arg(long, env = "GLRUNNER_REGISTRATION_TOKEN", hide_env_values = true)]
        registration_token: String,

        /// Runner name, used to find the stored token later
        #[arg(long)]
        name: String,

        /// Extra runner attribute sent with the registration (repeatable)
        #[arg(long = "option", value_name = "KEY=VALUE", value_parser = parse_option)]
        options: Vec<(String, Value)>,
    },

    /// Unregister a runner using its stored auth token
    Unregister {
        /// GitLab base URL (e.g., https://gitlab.com)
        #[arg(long, env = "GLRUNNER_URL")]
        url: Option<String>,

        /// Runner name used at registration
        #[arg(long)]
        name: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        if cli.json {
            let error_json = serde_json::json!({ "code": e.code(), "message": e.to_string() });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&error_json).unwrap_or_default()
            );
        } else {
            eprintln!("{} {}", "Error:".red(), e);
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> glrunner_core::Result<()> {
    let config = load_config(cli)?;
    let transport = TransportOptions::from_config(&config);
    let lifecycle = Lifecycle::new(
        RunnerService::new(),
        TokenStore::new(config.runner.config_dir.clone()),
    )
    .noop(config.runner.noop);

    match &cli.command {
        Commands::Register {
            url,
            registration_token,
            name,
            options,
        } => {
            let url = resolve_url(url.as_deref(), &config)?;
            let extra = options
                .iter()
                .fold(RequestOptions::new(), |acc, (key, value)| {
                    acc.with(key.clone(), value.clone())
                });
            let outcome =
                lifecycle.register_to_file(&url, registration_token, name, extra, &transport)?;
            print_register(&outcome, cli.json)
        }
        Commands::Unregister { url, name } => {
            let url = resolve_url(url.as_deref(), &config)?;
            let report = lifecycle.unregister_from_file(&url, name, &transport)?;
            print_unregister(&report, cli.json)
        }
    }
}

/// Config file values, overridden by flags and environment.
fn load_config(cli: &Cli) -> glrunner_core::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(dir) = &cli.config_dir {
        config.runner.config_dir = dir.clone();
    }
    if let Some(proxy) = &cli.proxy {
        config.transport.proxy = Some(proxy.clone());
    }
    if let Some(ca_file) = &cli.ca_file {
        config.transport.ca_file = Some(ca_file.clone());
    }
    config.transport.ssl_insecure |= cli.insecure;
    config.runner.noop |= cli.noop;

    Ok(config)
}

fn resolve_url(flag: Option<&str>, config: &Config) -> glrunner_core::Result<String> {
    flag.map(str::to_string)
        .or_else(|| config.gitlab.url.clone())
        .ok_or_else(|| RunnerError::InvalidEndpoint {
            url: String::new(),
            reason: "no GitLab URL given (use --url or [gitlab] url in the config file)"
                .to_string(),
        })
}

/// Parse `key=value`; the value is JSON when it parses as JSON, else a string.
fn parse_option(s: &str) -> Result<(String, Value), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty option name in '{}'", s));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

fn print_register(outcome: &RegisterOutcome, json: bool) -> glrunner_core::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    match outcome {
        RegisterOutcome::Registered { path, .. } => {
            eprintln!("{}: token stored in {}", "Registered".green(), path.display());
        }
        RegisterOutcome::Existing { path, .. } => {
            eprintln!("{}: token already in {}", "Existing".blue(), path.display());
        }
        RegisterOutcome::Noop { .. } => {
            eprintln!("{}: not registering in noop mode", "Noop".yellow());
        }
        RegisterOutcome::Skipped { message } => {
            eprintln!("{}: {}", "Skipped".yellow(), message);
        }
    }
    if let Some(token) = outcome.token() {
        println!("{}", token.as_str());
    }
    Ok(())
}

fn print_unregister(report: &UnregisterReport, json: bool) -> glrunner_core::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let label = match report.status {
        UnregisterStatus::Unregistered => "Unregistered".green(),
        UnregisterStatus::NoToken | UnregisterStatus::Noop => "Skipped".blue(),
        UnregisterStatus::SkippedMissingCaFile
        | UnregisterStatus::AlreadyGone
        | UnregisterStatus::Failed => "Warning".yellow(),
    };
    println!("{}: {}", label, report.message);
    if report.token_removed {
        println!("{}: {}", "Removed".blue(), report.token_file.display());
    }
    Ok(())
}
