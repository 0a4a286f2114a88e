use clap::Parser;
use std::time::Duration;

use dirprobe::config::{CliConfig, RotationPolicy, ScanConfig};
use dirprobe::error::Result;
use dirprobe::logging;
use dirprobe::output::{self, OutputFormat, ScanReport};
use dirprobe::progress::ProgressReporter;
use dirprobe::session::{ScanResult, ScanSession};
use dirprobe::source::WordlistSource;
use dirprobe::wordlist;

#[derive(Parser, Debug)]
#[command(
    name = "dirprobe",
    version,
    about = "Concurrent HTTP path discovery against a target URL"
)]
struct Cli {
    /// Target base URL (http or https)
    target: String,

    /// Wordlist file, one candidate path per line
    wordlist: String,

    /// Number of concurrent workers (default: CPU core count)
    #[arg(short = 'c', long)]
    concurrency: Option<usize>,

    /// Timeout in seconds for each request
    #[arg(short = 't', long)]
    timeout: Option<u64>,

    /// Skip TLS certificate verification
    #[arg(short = 'k', long)]
    insecure: bool,

    /// Comma-delimited status codes to report (e.g. 200,301,403)
    #[arg(long, value_delimiter = ',', value_name = "CODES")]
    accept: Option<Vec<u16>>,

    /// Comma-delimited status codes to always suppress
    #[arg(long, value_delimiter = ',', value_name = "CODES")]
    exclude: Option<Vec<u16>>,

    /// Suppress responses with bodies larger than this many bytes
    #[arg(long, value_name = "BYTES")]
    max_length: Option<u64>,

    /// Maximum probe attempts per candidate on transport failure
    #[arg(short = 'r', long, value_name = "COUNT")]
    retries: Option<u32>,

    /// Requests-per-second ceiling across all workers
    #[arg(long, value_name = "RPS")]
    rate_limit: Option<f64>,

    /// User-agent to add to the identity pool (repeatable)
    #[arg(long, action = clap::ArgAction::Append, value_name = "AGENT")]
    user_agent: Option<Vec<String>>,

    /// How identities are picked from the pool per request
    #[arg(long, value_enum, value_name = "POLICY")]
    rotation: Option<RotationPolicy>,

    /// Suppress a (status, length) signature seen more than this many times
    #[arg(long, value_name = "COUNT")]
    soft_404_threshold: Option<usize>,

    /// Follow redirects up to this depth (default: record without following)
    #[arg(long, value_name = "DEPTH")]
    follow_redirects: Option<usize>,

    /// Regex pattern for wordlist entries to skip (repeatable)
    #[arg(long, action = clap::ArgAction::Append, value_name = "REGEX")]
    exclude_pattern: Option<Vec<String>>,

    /// Output format (text, json)
    #[arg(short = 'f', long, value_name = "FORMAT")]
    format: Option<String>,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Suppress all output except reported paths
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Path to a TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<String>,

    /// Ignore configuration files entirely
    #[arg(long)]
    no_config: bool,
}

impl Cli {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            concurrency: self.concurrency,
            timeout: self.timeout,
            skip_tls_verification: self.insecure,
            accepted_status_codes: self.accept.clone(),
            excluded_status_codes: self.exclude.clone(),
            max_content_length: self.max_length,
            retry_ceiling: self.retries,
            rate_limit_rps: self.rate_limit,
            user_agents: self.user_agent.clone(),
            rotation_policy: self.rotation,
            soft_404_threshold: self.soft_404_threshold,
            redirect_depth: self.follow_redirects,
            output_format: self.format.clone(),
            verbose: self.verbose,
            no_config: self.no_config,
            config_file: self.config.clone(),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run(&cli).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    }
}

async fn run(cli: &Cli) -> Result<i32> {
    let config = load_and_merge_config(cli)?;

    // Config-file verbosity counts too; the CLI flag wins in the merge
    logging::init_logger(config.verbose.unwrap_or(false), cli.quiet);
    logging::log_config_info(&config, &cli.target);

    let format: OutputFormat = config
        .output_format
        .as_deref()
        .unwrap_or("text")
        .parse()?;

    let exclude = config.compile_exclude_patterns()?;
    let workers = config.worker_count();

    let session = ScanSession::new(&cli.target, config)?;
    let tracker = session.tracker();
    let cancel = session.cancel_handle();

    let candidates = wordlist::load(&cli.wordlist, &exclude)?;
    if candidates.is_empty() {
        eprintln!("Wordlist '{}' produced no candidates", cli.wordlist);
        return Ok(0);
    }
    let total = candidates.len();

    // First Ctrl-C drains gracefully, a second one aborts
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling scan, finalizing in-flight probes...");
            cancel.cancel();
            if tokio::signal::ctrl_c().await.is_ok() {
                std::process::exit(130);
            }
        }
    });

    let show_progress = !cli.no_progress
        && !cli.quiet
        && format == OutputFormat::Text
        && atty::is(atty::Stream::Stderr);
    let mut progress = ProgressReporter::new(show_progress);
    progress.start_scan(total);

    let (tx, mut rx) = tokio::sync::mpsc::channel::<ScanResult>((workers * 2).max(4));

    let collect_for_report = format == OutputFormat::Json;
    let printer_tracker = tracker.clone();
    let printer = tokio::spawn(async move {
        let mut collected = Vec::new();
        let mut ticker = tokio::time::interval(Duration::from_millis(150));
        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(result) => {
                        if collect_for_report {
                            collected.push(result);
                        } else {
                            progress.println(&output::format_result(&result));
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => progress.update(&printer_tracker.snapshot()),
            }
        }
        progress.finish(&printer_tracker.snapshot());
        collected
    });

    let snapshot = session.run(WordlistSource::new(candidates), tx).await?;
    let results = printer.await.unwrap_or_default();

    logging::log_scan_complete(&snapshot);

    match format {
        OutputFormat::Json => {
            let report = ScanReport::new(cli.target.clone(), snapshot.clone(), results);
            println!("{}", report.to_json()?);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                println!("{}", output::format_summary(&snapshot));
            }
        }
    }

    Ok(if snapshot.failed > 0 { 1 } else { 0 })
}

fn load_and_merge_config(cli: &Cli) -> Result<ScanConfig> {
    let cli_config = cli.to_cli_config();

    let mut config = if cli_config.no_config {
        ScanConfig::default()
    } else if let Some(ref config_file) = cli_config.config_file {
        ScanConfig::load_from_file(config_file)?
    } else {
        ScanConfig::load_from_standard_locations()
    };

    config.merge_with_cli(&cli_config);
    if let Some(ref patterns) = cli.exclude_pattern {
        config.exclude_patterns = Some(patterns.clone());
    }
    config.validate()?;
    Ok(config)
}
