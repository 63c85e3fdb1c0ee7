// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "TABEX_LOG";

pub enum LogTarget<'a> {
    /// The TUI owns the terminal, so a running session logs to a file.
    File(&'a Path),
    Stderr,
}

pub fn init(level: &str, target: LogTarget<'_>) -> Result<()> {
    let filter = build_filter(level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(false)
        .compact();

    let installed = match target {
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| {
                    format!(
                        "open log file {} -- set [log].file to a writable path",
                        path.display()
                    )
                })?;
            builder
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .try_init()
        }
        LogTarget::Stderr => builder.with_writer(std::io::stderr).try_init(),
    };
    installed.map_err(|error| anyhow!("install log subscriber: {error}"))
}

/// `TABEX_LOG` takes precedence over the configured level.
fn build_filter(level: &str) -> Result<EnvFilter> {
    let directives = std::env::var(LOG_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| level.to_owned());
    EnvFilter::try_new(&directives).with_context(|| {
        format!("invalid log level {directives:?} -- use error, warn, info, debug, or trace")
    })
}

#[cfg(test)]
mod tests {
    use super::{LOG_ENV, build_filter};

    #[test]
    fn configured_level_builds_filter() {
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var(LOG_ENV);
        }
        let filter = build_filter("debug").expect("debug is a valid level");
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn invalid_level_explains_choices() {
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var(LOG_ENV);
        }
        let error = build_filter("tabex=loud").expect_err("unknown level should fail");
        assert!(format!("{error:#}").contains("use error, warn, info, debug, or trace"));
    }
}
