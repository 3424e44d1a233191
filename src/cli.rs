//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for
//! subcommands (run, init, validate, health), and their associated
//! argument structs. Every `run` flag has an environment variable
//! equivalent for container deployments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "shadowtraffic",
    version,
    about = "Mirror live HTTP traffic to shadow hosts",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        shadowtraffic init                      Create a starter config\n  \
        shadowtraffic run                       Start with ./shadowtraffic.yaml\n  \
        shadowtraffic run -c shadow.yaml        Start with a specific config"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Forward traffic upstream and mirror matching requests to shadow hosts
    Run(Box<RunArgs>),

    /// Generate a starter config file
    Init(InitArgs),

    /// Validate a config file without starting
    Validate(ValidateArgs),

    /// Check health of a running instance
    Health(HealthArgs),
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        shadowtraffic run                                  Auto-detect config\n  \
        shadowtraffic run -c shadow.yaml                   Specific config file\n  \
        shadowtraffic run -c shadow.yaml -p 8080 --pretty  Local dev mode\n  \
        shadowtraffic run --fallback-config /etc/shadow.yaml  Fall back to a baked-in config\n\n\
        Pool sizes, shadow timeouts and the origin header are read once at startup;\n\
        everything else in the shadow section is reloaded while running.")]
pub struct RunArgs {
    /// Config file with the upstream and shadow settings (.yaml, .json, .toml)
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Config file loaded when the primary one is missing or invalid
    #[arg(long, env = "FALLBACK_CONFIG_FILE")]
    pub fallback_config: Option<PathBuf>,

    /// Listen port
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Listen address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    // -- Logging --
    /// Log level
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,

    // -- Observability --
    /// Sentry DSN (enables error tracking)
    #[cfg(feature = "sentry-integration")]
    #[arg(long, env = "SENTRY_DSN", help_heading = "Observability")]
    pub sentry_dsn: Option<String>,

    /// Sentry environment tag
    #[cfg(feature = "sentry-integration")]
    #[arg(long, env = "SENTRY_ENVIRONMENT", help_heading = "Observability")]
    pub sentry_environment: Option<String>,

    // -- Tuning --
    /// Timeout for the forwarded (non-shadow) request in milliseconds,
    /// overriding `upstream.timeout`. Shadow calls use `readTimeoutMs`.
    #[arg(long, env = "REQUEST_TIMEOUT_MS", help_heading = "Tuning")]
    pub timeout: Option<u64>,

    /// Largest request body buffered for shadowing or forwarding, in bytes.
    /// Shadowed requests above it are rejected with 413.
    #[arg(
        long,
        env = "MAX_BODY_SIZE",
        default_value_t = 1_048_576,
        help_heading = "Tuning"
    )]
    pub max_body: usize,

    /// Seconds between checks for config edits; a changed file swaps the
    /// shadow rules, hosts and sampling without a restart
    #[arg(
        long,
        env = "POLL_INTERVAL_SECS",
        default_value_t = 30,
        help_heading = "Tuning"
    )]
    pub poll_interval: u64,
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        shadowtraffic init                          Quick start config (yaml)\n  \
        shadowtraffic init --full                   Every option, documented\n  \
        shadowtraffic init -f toml -o shadow.toml   TOML format")]
pub struct InitArgs {
    /// Output format
    #[arg(short, long, default_value = "yaml")]
    pub format: ConfigFormat,

    /// Output file path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Include every option with its default
    #[arg(long)]
    pub full: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Config file to validate
    #[arg(default_value = "shadowtraffic.yaml")]
    pub config: PathBuf,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ValidateFormat,
}

#[derive(Args)]
pub struct HealthArgs {
    /// URL of the running instance
    #[arg(default_value = "http://localhost:3000")]
    pub url: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Toml => "toml",
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ValidateFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(argv: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Some(Commands::Run(args)) => *args,
            _ => panic!("expected run subcommand"),
        }
    }

    #[test]
    fn run_defaults() {
        let args = run_args(&["shadowtraffic", "run"]);
        assert_eq!(args.max_body, 1_048_576);
        assert!(args.config.is_none());
        assert!(args.fallback_config.is_none());
        assert!(args.timeout.is_none());
    }

    #[test]
    fn run_accepts_primary_and_fallback_configs() {
        let args = run_args(&[
            "shadowtraffic",
            "run",
            "-c",
            "shadow.yaml",
            "--fallback-config",
            "/etc/shadowtraffic/shadow.yaml",
            "--max-body",
            "2048",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("shadow.yaml")));
        assert_eq!(
            args.fallback_config,
            Some(PathBuf::from("/etc/shadowtraffic/shadow.yaml"))
        );
        assert_eq!(args.max_body, 2048);
    }

    #[test]
    fn pretty_and_json_conflict() {
        assert!(Cli::try_parse_from(["shadowtraffic", "run", "--pretty", "--json"]).is_err());
    }
}
