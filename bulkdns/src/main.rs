//! bulkdns CLI Application
//!
//! Reads a file with one domain name per line and asks the configured
//! resolvers for the nameservers of each domain. This binary is a thin
//! interface over the bulkdns-lib library.

mod ui;

use bulkdns_lib::{
    discover_resolvers, domain_lines, load_env_config, open_domain_file, parse_timeout_string,
    BulkDnsError, ConfigManager, Dispatcher, EnvConfig, FileConfig, Protocol, ResolveConfig,
    EXIT_FAILURE,
};
use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use std::process;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for bulkdns
#[derive(Parser, Debug)]
#[command(name = "bulkdns")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Look up the NS records of many domains at once")]
#[command(
    long_about = "Look up the NS records of many domains at once.\n\nDomains are read from FILE, one per line, and spread round-robin over the resolvers found in /etc/resolv.conf (or given with --resolver)."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// File with one domain name per line
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Number of concurrent queries [default: 1]
    #[arg(
        short = 'c',
        long = "concurrent",
        visible_alias = "concurrency",
        value_name = "N",
        help_heading = "Performance"
    )]
    pub concurrent: Option<usize>,

    /// Per-query timeout, e.g. 500ms, 5s, 1m [default: 5s]
    #[arg(
        short = 't',
        long = "timeout",
        value_name = "DURATION",
        help_heading = "Performance"
    )]
    pub timeout: Option<String>,

    /// Resolver to use instead of discovery (repeatable)
    #[arg(short = 'r', long = "resolver", value_name = "ADDR", action = clap::ArgAction::Append, help_heading = "Resolvers")]
    pub resolvers: Vec<String>,

    /// Read resolvers from this file instead of /etc/resolv.conf
    #[arg(long = "resolv-conf", value_name = "PATH", help_heading = "Resolvers")]
    pub resolv_conf: Option<String>,

    /// Query resolvers over TCP
    #[arg(long = "tcp", help_heading = "Resolvers")]
    pub tcp: bool,

    /// Output one JSON object per line
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Debug-level logging on stderr
    #[arg(short = 'd', long = "debug", help_heading = "Configuration")]
    pub debug: bool,

    /// Print resolvers, each query as it starts, and a summary
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

/// Everything a run needs beyond the library config.
#[derive(Debug, Clone)]
struct RunSettings {
    resolve: ResolveConfig,
    json: bool,
}

#[tokio::main]
async fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version are not failures
            let code = if e.use_stderr() { EXIT_FAILURE } else { 0 };
            let _ = e.print();
            process::exit(code);
        }
    };

    if let Err(e) = validate_args(&args) {
        ui::print_error(&BulkDnsError::config(e));
        process::exit(EXIT_FAILURE);
    }

    init_tracing(args.debug);

    match run(args).await {
        Ok(0) => {}
        Ok(code) => process::exit(code),
        Err(e) => {
            ui::print_error(&e);
            process::exit(e.exit_code());
        }
    }
}

/// Install the stderr log subscriber.
///
/// `--debug` forces debug level; otherwise `RUST_LOG` applies, falling back
/// to warnings only.
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Validate command line arguments
fn validate_args(args: &Args) -> Result<(), String> {
    if args.file.trim().is_empty() {
        return Err("A domain list file is required".to_string());
    }

    if args.concurrent == Some(0) {
        return Err("Concurrency must be at least 1".to_string());
    }

    if let Some(timeout) = &args.timeout {
        if parse_timeout_string(timeout).is_none() {
            return Err(format!(
                "Invalid timeout '{}'. Use format like '500ms', '5s', '1m'",
                timeout
            ));
        }
    }

    if args.resolvers.iter().any(|r| r.trim().is_empty()) {
        return Err("--resolver needs an address".to_string());
    }

    Ok(())
}

/// Resolve every domain of the input file and print the outcomes.
///
/// Returns the process exit code once all dispatched queries have
/// reported. Startup failures are returned as errors before any query is
/// sent.
async fn run(args: Args) -> Result<i32, BulkDnsError> {
    let settings = build_config(&args)?;
    let output = ui::Output::new(settings.json, args.verbose);

    let pool = discover_resolvers(&settings.resolve)?;
    for resolver in pool.endpoints() {
        output.found_resolver(resolver);
    }

    let reader = open_domain_file(&args.file).await?;

    tracing::debug!(
        resolvers = pool.len(),
        concurrency = settings.resolve.concurrency,
        protocol = %settings.resolve.protocol,
        timeout_ms = settings.resolve.timeout.as_millis() as u64,
        "starting bulk resolution"
    );

    let dispatcher = Dispatcher::from_config(&settings.resolve, pool);
    let (tx, rx) = mpsc::channel(settings.resolve.concurrency.saturating_mul(2).max(16));
    let started = Instant::now();

    let (report, stats) = tokio::join!(
        dispatcher.dispatch(domain_lines(reader), tx),
        output.drain(rx)
    );

    if args.verbose {
        ui::print_summary(&stats, &report, started.elapsed());
    }

    match report.input_error {
        Some(e) => {
            ui::print_error(&e);
            Ok(EXIT_FAILURE)
        }
        None => Ok(0),
    }
}

/// Build the run configuration with proper precedence.
///
/// Precedence (highest to lowest):
/// 1. CLI arguments
/// 2. Environment variables (BULKDNS_*)
/// 3. Local config file (./bulkdns.toml or ./.bulkdns.toml)
/// 4. Global config file (~/.bulkdns.toml)
/// 5. XDG config file (~/.config/bulkdns/config.toml)
/// 6. Built-in defaults
fn build_config(args: &Args) -> Result<RunSettings, BulkDnsError> {
    let mut settings = RunSettings {
        resolve: ResolveConfig::default(),
        json: false,
    };

    let config_manager = ConfigManager::new(args.verbose);
    let env_config = load_env_config();

    // Step 1: explicit file from --config or BULKDNS_CONFIG, else discovery
    let explicit = args.config.as_ref().or(env_config.config.as_ref());
    let file_config = match explicit {
        Some(path) => {
            tracing::debug!(path = %path, "using explicit config file");
            config_manager.load_file(path)?
        }
        None => config_manager.discover_and_load()?,
    };
    settings = merge_file_config(settings, file_config)?;

    // Step 2: environment variables
    settings = apply_environment_config(settings, &env_config);

    // Step 3: CLI arguments
    settings = apply_cli_args(settings, args)?;

    Ok(settings)
}

/// Merge FileConfig into the run settings
fn merge_file_config(
    mut settings: RunSettings,
    file_config: FileConfig,
) -> Result<RunSettings, BulkDnsError> {
    if let Some(defaults) = file_config.defaults {
        if let Some(concurrency) = defaults.concurrency {
            settings.resolve = settings.resolve.with_concurrency(concurrency);
        }
        if let Some(timeout) = defaults.timeout.as_deref().and_then(parse_timeout_string) {
            settings.resolve = settings.resolve.with_timeout(timeout);
        }
        if let Some(protocol) = defaults.protocol {
            settings.resolve = settings.resolve.with_protocol(protocol.parse()?);
        }
        if let Some(json) = defaults.json {
            settings.json = json;
        }
    }

    if let Some(resolvers) = file_config.resolvers {
        if let Some(servers) = resolvers.servers {
            settings.resolve = settings.resolve.with_resolvers(servers);
        }
        if let Some(path) = resolvers.resolv_conf {
            settings.resolve = settings.resolve.with_resolv_conf(path);
        }
    }

    Ok(settings)
}

/// Apply BULKDNS_* environment variables
fn apply_environment_config(mut settings: RunSettings, env_config: &EnvConfig) -> RunSettings {
    if let Some(concurrency) = env_config.concurrency {
        settings.resolve = settings.resolve.with_concurrency(concurrency);
    }
    if let Some(timeout) = env_config.timeout.as_deref().and_then(parse_timeout_string) {
        settings.resolve = settings.resolve.with_timeout(timeout);
    }
    if let Some(protocol) = env_config.protocol {
        settings.resolve = settings.resolve.with_protocol(protocol);
    }
    if let Some(resolvers) = &env_config.resolvers {
        settings.resolve = settings.resolve.with_resolvers(resolvers.clone());
    }
    if let Some(path) = &env_config.resolv_conf {
        settings.resolve = settings.resolve.with_resolv_conf(path.clone());
    }
    if let Some(json) = env_config.json {
        settings.json = json;
    }

    settings
}

/// Apply CLI arguments to the settings (highest precedence).
///
/// Boolean flags only ever switch a feature on, so an absent flag never
/// overrides a value from the environment or a config file.
fn apply_cli_args(mut settings: RunSettings, args: &Args) -> Result<RunSettings, BulkDnsError> {
    if let Some(concurrency) = args.concurrent {
        settings.resolve = settings.resolve.with_concurrency(concurrency);
    }
    if let Some(timeout) = &args.timeout {
        let timeout = parse_timeout_string(timeout)
            .ok_or_else(|| BulkDnsError::config(format!("Invalid timeout '{}'", timeout)))?;
        settings.resolve = settings.resolve.with_timeout(timeout);
    }
    if args.tcp {
        settings.resolve = settings.resolve.with_protocol(Protocol::Tcp);
    }
    if !args.resolvers.is_empty() {
        settings.resolve = settings.resolve.with_resolvers(args.resolvers.clone());
    }
    if let Some(path) = &args.resolv_conf {
        settings.resolve = settings.resolve.with_resolv_conf(path);
        // An explicit resolv.conf on the command line beats resolver lists
        // from lower layers.
        if args.resolvers.is_empty() {
            settings.resolve.resolvers = None;
        }
    }
    if args.json {
        settings.json = true;
    }

    Ok(settings)
}
