// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result, anyhow};
use config::Config;
use fleetdash_app::{Dashboard, Tier};
use fleetdash_testkit::FixtureBackend;
use runtime::{ApiRuntime, DemoRuntime};
use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

const LOG_ENV: &str = "FLEETDASH_LOG";

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `fleetdash --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    if let Some(log_path) = config.log_path() {
        init_logging(&log_path)?;
    }

    if options.demo {
        let context = fleetdash_testkit::global_admin(Tier::Premium);
        if options.check_only {
            return Ok(());
        }
        info!("starting with demo fixtures");
        let mut dashboard = Dashboard::mount(Arc::new(context), config.start_path());
        let mut runtime = DemoRuntime::new(FixtureBackend::default());
        return fleetdash_tui::run_app(&mut dashboard, &mut runtime);
    }

    let context = config.viewer_context()?;
    let token = config.token();
    let client = fleetdash_api::Client::new(config.base_url(), token.as_deref(), config.timeout()?)
        .with_context(|| {
            format!(
                "invalid [server] config in {}; fix base_url/timeout values",
                options.config_path.display()
            )
        })?;

    if options.check_only {
        client.ping()?;
        println!("ok: {} reachable", client.base_url());
        return Ok(());
    }

    info!(
        base_url = client.base_url(),
        tier = context.tier.as_str(),
        authenticated = client.has_token(),
        "starting dashboard"
    );
    let mut dashboard = Dashboard::mount(Arc::new(context), config.start_path());
    let mut runtime = ApiRuntime::new(client);
    fleetdash_tui::run_app(&mut dashboard, &mut runtime)
}

/// The terminal belongs to the UI, so logs only ever go to a file.
fn init_logging(path: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {} -- check [log].path", path.display()))?;
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .with_env_var(LOG_ENV)
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|error| anyhow!("initialize logging: {error}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("fleetdash");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --demo                   Launch against built-in fixture data");
    println!("  --check                  Validate config and reach the server, then exit");
    println!("  --help                   Show this help");
}
