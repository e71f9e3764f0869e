//! Common processing logic shared between the indexer commands.

use camino::Utf8PathBuf;
use clap::Args;
use clap::ValueEnum;
use theme_indexer::Result;
use theme_indexer::config::Config;
use theme_indexer::index::Collector;

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Info, warning, and error messages
    Info,
    /// Debug and above messages
    Debug,
    /// All messages including trace
    Trace,
}

/// Common arguments shared between the indexing commands
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// GitHub personal access token
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN")]
    pub github_token: Option<String>,

    /// Path to configuration file [default: indexer.config.json]
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none", global = true)]
    pub log_level: LogLevel,
}

pub struct Common {
    pub collector: Collector,
}

impl Common {
    /// Create a new Common processor with logger, config, and collector
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be loaded or the collector
    /// cannot be initialized
    pub fn new(args: &CommonArgs) -> Result<Self> {
        Self::init_logging(args.log_level);

        let (config, warnings) = Config::load(args.config.as_ref())?;

        // Print warnings if any
        if !warnings.is_empty() {
            eprintln!("\n⚠️  Configuration validation warnings:");
            for warning in &warnings {
                eprintln!("   {warning}");
            }
            eprintln!();
        }

        let token = args.github_token.as_deref().map(str::trim).filter(|t| !t.is_empty());
        if token.is_none() {
            eprintln!("⚠️  GITHUB_TOKEN is not set, API quota is low");
        }

        // When logging is enabled the progress bar would interleave with
        // log lines, so it only shows up with logging off
        let show_progress = args.log_level == LogLevel::None;

        let collector = Collector::new(config, token, None, show_progress)?;

        Ok(Self { collector })
    }

    /// Initialize logger based on log level
    fn init_logging(log_level: LogLevel) {
        if log_level == LogLevel::None {
            return;
        }

        let level = match log_level {
            LogLevel::None => return, // Already checked above, but being explicit
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };

        let env = env_logger::Env::default().filter_or("RUST_LOG", level);

        env_logger::Builder::from_env(env)
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(matches!(log_level, LogLevel::Debug) || matches!(log_level, LogLevel::Trace))
            .init();
    }
}
