//! Logging configuration and initialization.
//!
//! This module provides structured logging with:
//! - Multiple presets (production, verbose, debug, trace, quiet)
//! - Per-target level overrides via CLI flags
//! - JSON output format for log aggregation
//! - Environment variable fallback (RUST_LOG)
//!
//! Logs go to stderr; stdout carries the conversation.

use std::collections::HashMap;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: '{}'. Use 'text' or 'json'.", s)),
        }
    }
}

/// Logging preset levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogPreset {
    /// Production: connection lifecycle problems and protocol warnings only
    #[default]
    Production,
    /// Verbose: connects, disconnects and submissions
    Verbose,
    /// Debug: detailed info for troubleshooting, frame folding stays quiet
    Debug,
    /// Trace: everything including every folded frame
    Trace,
    /// Quiet: errors only
    Quiet,
}

impl LogPreset {
    fn directives(self) -> &'static [&'static str] {
        match self {
            LogPreset::Production => &["atlas=warn", "tokio_tungstenite=error"],
            LogPreset::Verbose => &["atlas=info", "tokio_tungstenite=warn"],
            LogPreset::Debug => &["atlas=debug", "atlas::stream=info", "tokio_tungstenite=info"],
            LogPreset::Trace => &["atlas=trace", "tokio_tungstenite=trace"],
            LogPreset::Quiet => &["atlas=error", "tokio_tungstenite=error"],
        }
    }
}

/// Logging configuration built from CLI arguments.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub preset: LogPreset,
    /// Per-target level overrides (e.g., "atlas::transport" -> DEBUG)
    pub overrides: HashMap<String, Level>,
    pub format: LogFormat,
}

impl LogConfig {
    /// Create a new LogConfig from CLI arguments.
    pub fn from_cli(
        verbose: bool,
        debug: bool,
        trace: bool,
        quiet: bool,
        log_overrides: Vec<String>,
        format: LogFormat,
    ) -> Self {
        // Quietest flag wins, then the most detailed one.
        let preset = if quiet {
            LogPreset::Quiet
        } else if trace {
            LogPreset::Trace
        } else if debug {
            LogPreset::Debug
        } else if verbose {
            LogPreset::Verbose
        } else {
            LogPreset::Production
        };

        // Each flag holds one or more comma-separated "target=level" pairs.
        let overrides = log_overrides
            .iter()
            .flat_map(|flag| flag.split(','))
            .filter_map(|pair| {
                let (target, level) = pair.split_once('=')?;
                let level = level.trim().parse::<Level>().ok()?;
                Some((qualify_target(target.trim()), level))
            })
            .collect();

        Self {
            preset,
            overrides,
            format,
        }
    }

    /// Filter directives for the preset followed by the overrides.
    pub fn directives(&self) -> Vec<String> {
        let mut directives: Vec<String> =
            self.preset.directives().iter().map(|d| d.to_string()).collect();
        // Later directives for the same target take precedence.
        let mut overrides: Vec<_> = self.overrides.iter().collect();
        overrides.sort();
        for (target, level) in overrides {
            directives.push(format!("{}={}", target, level.as_str().to_lowercase()));
        }
        directives
    }

    /// Build an EnvFilter; RUST_LOG wins when set.
    pub fn build_filter(&self) -> EnvFilter {
        if let Ok(env_filter) = EnvFilter::try_from_default_env() {
            return env_filter;
        }
        EnvFilter::try_new(self.directives().join(",")).unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}

/// "transport" -> "atlas::transport"; dependency targets pass through.
fn qualify_target(target: &str) -> String {
    let passthrough = |prefix: &str| {
        target == prefix || target.strip_prefix(prefix).is_some_and(|rest| rest.starts_with("::"))
    };
    if passthrough("atlas") || passthrough("tokio_tungstenite") {
        target.to_string()
    } else {
        format!("atlas::{}", target)
    }
}

/// Initialize the tracing subscriber with the given configuration.
pub fn init(config: &LogConfig) {
    let filter = config.build_filter();

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false)
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_span_events(FmtSpan::CLOSE)
                )
                .init();
        }
    }
}
