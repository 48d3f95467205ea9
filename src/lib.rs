//! Salary benchmarking analytics.
//!
//! The library holds the analytics engine and its SQLite reference store
//! ([`analytics`]), configuration ([`config`]) and the CLI front-end that the
//! `salary-analytics` binary drives through [`parse_cli`] and
//! [`run_with_parsed`].

pub mod analytics;
pub mod config;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::analytics::{
    AnalyticsEngine, AnalyticsError, Granularity, NamedFilter, QueryContext, SqliteStore,
};
use crate::config::{AppConfig, ConfigError};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug, Clone)]
#[command(
    name = "salary-analytics",
    version,
    about = "Salary distribution, summary, trend and role reports over a star-schema database"
)]
pub struct Cli {
    /// SQLite database path (overrides the config file)
    #[arg(long, global = true, value_name = "PATH", env = "SALARY_ANALYTICS_DB")]
    pub db: Option<PathBuf>,

    /// Config file path (default: $XDG_CONFIG_HOME/salary-analytics/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Salary histogram with an adaptive bucket count
    Distribution {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Count, average, quartiles and a target percentile
    Summary {
        #[command(flatten)]
        filter: FilterArgs,
        /// Target percentile, 1..=99
        #[arg(long)]
        percentile: Option<i32>,
    },
    /// Average salary per period, oldest first
    Timeseries {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, value_enum)]
        granularity: Option<GranularityArg>,
        /// Number of most recent periods to return
        #[arg(long)]
        periods: Option<i32>,
    },
    /// Per-role averages for roles with enough records
    Roles {
        #[command(flatten)]
        filter: FilterArgs,
        /// Minimum records a role needs to be listed
        #[arg(long)]
        min_records: Option<i64>,
    },
    /// Raw salary fact rows
    Facts {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, default_value_t = analytics::validate::MAX_FACT_LIMIT)]
        limit: u32,
    },
    /// Create the star schema in the database if missing
    InitDb,
}

/// Filter flags shared by every report command.
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Industry field name
    #[arg(long)]
    pub industry: Option<String>,
    /// Standard job-role title
    #[arg(long)]
    pub role: Option<String>,
    /// Hierarchy level name
    #[arg(long)]
    pub level: Option<String>,
    /// Federal district name
    #[arg(long)]
    pub district: Option<String>,
    /// Oblast name
    #[arg(long)]
    pub oblast: Option<String>,
    /// City name
    #[arg(long)]
    pub city: Option<String>,
    /// Inclusive start date (YYYY-MM-DD)
    #[arg(long)]
    pub since: Option<NaiveDate>,
    /// Inclusive end date (YYYY-MM-DD)
    #[arg(long)]
    pub until: Option<NaiveDate>,
    /// Abort the query after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl FilterArgs {
    pub fn to_filter(&self) -> NamedFilter {
        NamedFilter {
            industry_field_name: self.industry.clone(),
            standard_job_role_title: self.role.clone(),
            hierarchy_level_name: self.level.clone(),
            district_name: self.district.clone(),
            oblast_name: self.oblast.clone(),
            city_name: self.city.clone(),
            date_start: self.since,
            date_end: self.until,
        }
    }

    pub fn context(&self) -> QueryContext {
        match self.timeout_ms {
            Some(ms) => QueryContext::with_timeout(Duration::from_millis(ms)),
            None => QueryContext::background(),
        }
    }
}

/// CLI mirror of [`Granularity`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum GranularityArg {
    Month,
    Quarter,
    Year,
}

impl From<GranularityArg> for Granularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::Month => Granularity::Month,
            GranularityArg::Quarter => Granularity::Quarter,
            GranularityArg::Year => Granularity::Year,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Structured CLI failure, printed as a JSON error object on stderr.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CliError {
    pub code: i32,
    pub kind: &'static str,
    pub message: String,
    pub hint: Option<String>,
    pub retryable: bool,
}

pub type CliResult<T = ()> = std::result::Result<T, CliError>;

impl CliError {
    fn new(code: i32, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            kind,
            message: message.into(),
            hint: None,
            retryable: false,
        }
    }

    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    /// `{"error": {...}}` envelope written to stderr.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "error": self })
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl std::error::Error for CliError {}

impl From<AnalyticsError> for CliError {
    fn from(err: AnalyticsError) -> Self {
        let base = |code| CliError::new(code, err.kind(), err.to_string());
        match &err {
            AnalyticsError::InvalidArgument { param, .. } => {
                base(2).with_hint(format!("check the value of '{param}'"))
            }
            AnalyticsError::InvalidFilter { param, .. } => {
                base(2).with_hint(format!("'{param}' must name an existing dimension value"))
            }
            AnalyticsError::BackendUnavailable(_) => base(3)
                .with_hint("check --db or run `salary-analytics init-db`")
                .retryable(),
            AnalyticsError::Cancelled => base(4).retryable(),
            AnalyticsError::DeadlineExceeded => {
                base(4).with_hint("raise --timeout-ms").retryable()
            }
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::new(1, "config", err.to_string())
            .with_hint("fix or remove the config file, or pass --config")
    }
}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(1, "io", format!("{err:#}"))
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Parsed arguments, ready to run.
#[derive(Debug, Clone)]
pub struct ParsedCli {
    pub cli: Cli,
}

/// Parse raw process arguments. `--help` and `--version` print and exit.
pub fn parse_cli(args: Vec<String>) -> CliResult<ParsedCli> {
    match Cli::try_parse_from(args) {
        Ok(cli) => Ok(ParsedCli { cli }),
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp
            | clap::error::ErrorKind::DisplayVersion
            | clap::error::ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => err.exit(),
            _ => Err(
                CliError::new(2, "usage", err.to_string().trim_end().to_string())
                    .with_hint("run `salary-analytics --help`"),
            ),
        },
    }
}

/// Load config, set up logging, run one command and print its JSON result.
pub fn run_with_parsed(parsed: ParsedCli) -> CliResult {
    let cli = parsed.cli;
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    init_logging(cli.verbose, config.log_filter.as_deref());

    let db_path = config.resolve_database_path(cli.db.as_deref())?;
    debug!(db = %db_path.display(), "using database");

    if let Commands::InitDb = cli.command {
        return init_db(&db_path, cli.pretty);
    }

    let store = Arc::new(open_existing(&db_path)?);
    let engine = AnalyticsEngine::new(store.clone(), store)
        .with_options(config.reports.engine_options());
    let reports = &config.reports;

    match &cli.command {
        Commands::Distribution { filter } => {
            let result = engine.distribution(&filter.context(), &filter.to_filter())?;
            print_json(&result, cli.pretty)
        }
        Commands::Summary { filter, percentile } => {
            let result = engine.summary(
                &filter.context(),
                &filter.to_filter(),
                percentile.unwrap_or(reports.target_percentile),
            )?;
            print_json(&result, cli.pretty)
        }
        Commands::Timeseries {
            filter,
            granularity,
            periods,
        } => {
            let result = engine.time_series(
                &filter.context(),
                &filter.to_filter(),
                granularity.map(Granularity::from).unwrap_or(reports.granularity),
                periods.unwrap_or(reports.periods),
            )?;
            print_json(&result, cli.pretty)
        }
        Commands::Roles {
            filter,
            min_records,
        } => {
            let result = engine.public_roles(
                &filter.context(),
                &filter.to_filter(),
                min_records.unwrap_or(reports.min_record_count),
            )?;
            print_json(&result, cli.pretty)
        }
        Commands::Facts { filter, limit } => {
            let result = engine.facts(&filter.context(), &filter.to_filter(), *limit)?;
            print_json(&result, cli.pretty)
        }
        Commands::InitDb => Ok(()),
    }
}

fn init_db(path: &Path, pretty: bool) -> CliResult {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let store = SqliteStore::open(path)?;
    store.init_schema()?;
    info!(db = %path.display(), "schema initialized");
    print_json(
        &serde_json::json!({ "initialized": true, "database": path }),
        pretty,
    )
}

/// Open a database that must already exist; never creates an empty file.
fn open_existing(path: &Path) -> CliResult<SqliteStore> {
    if !path.exists() {
        return Err(CliError::new(
            3,
            "backend_unavailable",
            format!("database not found: {}", path.display()),
        )
        .with_hint("run `salary-analytics init-db` or pass --db"));
    }
    Ok(SqliteStore::open(path)?)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> CliResult {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("serializing result")?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{text}").context("writing result")?;
    Ok(())
}

/// `RUST_LOG` wins, then `-v` flags, then the config's `log_filter`.
fn init_logging(verbose: u8, config_filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directive = match verbose {
            0 => config_filter.unwrap_or("warn").to_string(),
            1 => "salary_analytics=info".to_string(),
            _ => "salary_analytics=debug".to_string(),
        };
        EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"))
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;

    use clap::CommandFactory;

    use super::*;

    fn parse(args: &[&str]) -> CliResult<ParsedCli> {
        parse_cli(args.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn filter_flags_map_to_named_filter() {
        let parsed = parse(&[
            "salary-analytics",
            "summary",
            "--city",
            "Moscow",
            "--role",
            "Software Engineer",
            "--since",
            "2024-01-01",
            "--percentile",
            "75",
        ])
        .unwrap();
        let Commands::Summary { filter, percentile } = parsed.cli.command else {
            panic!("expected summary");
        };
        assert_eq!(percentile, Some(75));
        let named = filter.to_filter();
        assert_eq!(named.city_name.as_deref(), Some("Moscow"));
        assert_eq!(
            named.standard_job_role_title.as_deref(),
            Some("Software Engineer")
        );
        assert_eq!(named.date_start, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert!(named.date_end.is_none());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let parsed = parse(&[
            "salary-analytics",
            "roles",
            "--db",
            "x.db",
            "--pretty",
            "-vv",
        ])
        .unwrap();
        assert_eq!(parsed.cli.db, Some(PathBuf::from("x.db")));
        assert!(parsed.cli.pretty);
        assert_eq!(parsed.cli.verbose, 2);
    }

    #[test]
    fn db_flag_falls_back_to_env() {
        let cmd = Cli::command();
        let db = cmd
            .get_arguments()
            .find(|arg| arg.get_id() == "db")
            .expect("db arg");
        assert_eq!(db.get_env(), Some(OsStr::new("SALARY_ANALYTICS_DB")));
    }

    #[test]
    fn bad_date_is_usage_error() {
        let err =
            parse(&["salary-analytics", "distribution", "--since", "01/02/2024"]).unwrap_err();
        assert_eq!(err.code, 2);
        assert_eq!(err.kind, "usage");
    }

    #[test]
    fn granularity_arg_converts() {
        let parsed =
            parse(&["salary-analytics", "timeseries", "--granularity", "quarter"]).unwrap();
        let Commands::Timeseries { granularity, .. } = parsed.cli.command else {
            panic!("expected timeseries");
        };
        assert_eq!(granularity.map(Granularity::from), Some(Granularity::Quarter));
    }

    #[test]
    fn analytics_errors_map_to_exit_codes() {
        let caller: CliError = AnalyticsError::invalid_argument("periods", "bad").into();
        assert_eq!(caller.code, 2);
        assert!(!caller.retryable);

        let filter: CliError =
            AnalyticsError::invalid_filter("industryFieldName", "unknown").into();
        assert_eq!((filter.code, filter.kind), (2, "invalid_filter"));

        let backend: CliError = AnalyticsError::BackendUnavailable("down".into()).into();
        assert_eq!(backend.code, 3);
        assert!(backend.retryable);

        let deadline: CliError = AnalyticsError::DeadlineExceeded.into();
        assert_eq!(deadline.code, 4);
    }

    #[test]
    fn error_envelope_shape() {
        let err: CliError = AnalyticsError::Cancelled.into();
        let json = err.to_json();
        assert_eq!(json["error"]["kind"], "cancelled");
        assert_eq!(json["error"]["code"], 4);
        assert!(json["error"]["hint"].is_null());
    }
}
