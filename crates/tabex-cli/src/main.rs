// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result, anyhow};
use config::Config;
use logging::LogTarget;
use runtime::ApiRuntime;
use std::env;
use std::path::PathBuf;
use tabex_api::Client;
use tabex_app::AppState;
use tracing::info;

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
            "load config {}; run `tabex --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let base_url = options
        .api_url
        .clone()
        .or_else(|| config.api_base_url())
        .ok_or_else(|| {
            anyhow!(
                "no API base URL configured -- set [api] base_url in {}, TABEX_API_URL, or pass --api-url",
                options.config_path.display()
            )
        })?;
    let client = Client::new(&base_url, config.api_timeout()?)?;

    if options.check_only {
        logging::init(config.log_level(), LogTarget::Stderr)?;
        let count = client
            .ping()
            .with_context(|| format!("check API at {}", client.base_url()))?;
        println!("ok: {} answered with {count} tables", client.base_url());
        return Ok(());
    }

    let log_file = config.log_file()?;
    logging::init(config.log_level(), LogTarget::File(&log_file))?;
    info!(
        base_url = client.base_url(),
        config = %options.config_path.display(),
        "starting tabex"
    );

    let mut state = AppState::default();
    let mut runtime = ApiRuntime::new(client);
    tabex_tui::run_app(&mut state, &mut runtime, config.page_size())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    api_url: Option<String>,
    print_config_path: bool,
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
        api_url: None,
        print_config_path: false,
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
            "--api-url" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--api-url requires a URL"))?;
                options.api_url = Some(value.as_ref().to_owned());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
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
    println!("tabex: browse and edit database tables over a REST API");
    println!("  --config <path>          Use a specific config path");
    println!("  --api-url <url>          Override [api] base_url");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --check                  Validate config and reach the API");
    println!("  --help                   Show this help");
}
