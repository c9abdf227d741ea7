//! CLI entry point for `buildstat`.

use std::path::PathBuf;
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use buildstat::aggregate::{ResultAggregator, Scope, Summary};
use buildstat::cache::{ArchiveCache, HttpSource};
use buildstat::config::Config;
use buildstat::model::month::MonthKey;
use buildstat::parser::MailArchive;
use buildstat::pipeline::{self, SubjectPolicy};

#[derive(Parser)]
#[command(name = "buildstat", version, about = "Build-report mailing-list statistics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Cache directory (overrides the config file)
    #[arg(long, global = true, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Oldest month to process, e.g. 2023-January
    #[arg(long, global = true, value_name = "MONTH")]
    from: Option<String>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Download or verify every archive up to the current month
    Fetch,
    /// Aggregate build results and print counts and lists
    Report {
        /// Restrict to a year
        #[arg(long)]
        year: Option<i32>,
        /// Restrict to a month number (1-12) across years
        #[arg(long)]
        month: Option<u32>,
        /// Only recognized architecture builds
        #[arg(long)]
        recognized: bool,
        /// Skip malformed build subjects instead of failing the month
        #[arg(long)]
        lenient: bool,
        #[arg(long)]
        json: bool,
    },
    /// List subjects that could not be classified for one month
    Unknowns {
        /// Month label, e.g. 2023-November
        month: String,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = buildstat::config::load_config();
    if let Some(dir) = cli.cache_dir.clone() {
        config.general.cache_dir = Some(dir);
    }
    if let Some(from) = cli.from.clone() {
        config.archive.first_month = from;
    }

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Fetch => cmd_fetch(&config),
        Commands::Report {
            year,
            month,
            recognized,
            lenient,
            json,
        } => {
            let mut scope = Scope::from_filters(year, month);
            if recognized {
                scope = scope.recognized_only();
            }
            let policy = if lenient {
                SubjectPolicy::Lenient
            } else {
                SubjectPolicy::Strict
            };
            cmd_report(&config, &scope, policy, json)
        }
        Commands::Unknowns { month } => cmd_unknowns(&config, &month),
        Commands::Completions { shell } => cmd_completions(shell),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_path = buildstat::config::log_file_path(config);
    let log_dir = buildstat::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_name = log_path.file_name().unwrap_or_default();
        let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn open_cache(config: &Config) -> anyhow::Result<ArchiveCache> {
    let source = HttpSource::new(&config.archive.user_agent, config.archive.timeout())?;
    let cache = ArchiveCache::open(
        buildstat::config::cache_dir(config),
        &config.archive.base_url,
        source,
    )?;
    Ok(cache)
}

/// Months from the configured first month through the current month.
fn months_to_process(config: &Config) -> anyhow::Result<Vec<MonthKey>> {
    let first = config.archive.first_month()?;
    Ok(MonthKey::range(first, MonthKey::current()))
}

fn download_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .expect("valid template")
            .progress_chars("#>-"),
    );
    pb
}

/// Make sure every archive is cached and verified.
fn cmd_fetch(config: &Config) -> anyhow::Result<()> {
    use humansize::{format_size, BINARY};

    let mut cache = open_cache(config)?;
    let start = Instant::now();
    let mut failed = 0usize;

    for month in months_to_process(config)? {
        let pb = download_bar();
        pb.set_message(month.label());
        let progress = |have: u64, total: Option<u64>| {
            match total {
                Some(total) => pb.set_length(total),
                None => pb.set_length(have),
            }
            pb.set_position(have);
            true
        };
        let result = cache.ensure_fresh_with_progress(month, Some(&progress));
        pb.finish_and_clear();

        match result {
            Ok(path) => {
                let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                println!("  {:<20} {}", month.label(), format_size(size, BINARY));
            }
            Err(e) if e.is_per_month() => {
                eprintln!("  {:<20} {e}", month.label());
                failed += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    println!();
    println!("  {:<20} {}", "Cache", cache.root().display());
    println!("  {:<20} {}", "Archives", cache.manifest().len());
    println!("  {:<20} {:.2?}", "Elapsed", start.elapsed());
    if failed > 0 {
        anyhow::bail!("{failed} month(s) could not be fetched");
    }
    Ok(())
}

/// Build the aggregate and print a summary.
fn cmd_report(
    config: &Config,
    scope: &Scope,
    policy: SubjectPolicy,
    json: bool,
) -> anyhow::Result<()> {
    let mut cache = open_cache(config)?;
    let mut aggregator = ResultAggregator::new();
    let months = months_to_process(config)?;

    let failures = pipeline::run(&mut cache, &mut aggregator, &months, policy, None)?;
    for (month, e) in &failures {
        eprintln!("  {:<20} skipped: {e}", month.label());
    }

    let summary = aggregator.summary(scope);
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary_table(&summary);
    }
    Ok(())
}

fn print_summary_table(summary: &Summary) {
    println!();
    match (summary.months.first(), summary.months.last()) {
        (Some(first), Some(last)) => println!("  {:<20} {} to {}", "Months", first, last),
        _ => println!("  {:<20} none", "Months"),
    }
    println!("  {:<20} {}", "Builds", summary.builds);
    println!("  {:<20} {}", "Passed", summary.passes);
    println!("  {:<20} {}", "Failed", summary.fails);
    println!("  {:<20} {}", "Hosts", summary.hosts.join(", "));
    println!("  {:<20} {}", "Architectures", summary.architectures.join(", "));
    for failures in &summary.failures {
        println!();
        println!("  Failures in {}:", failures.month);
        println!("    {:<18} {}", "Hosts", failures.hosts.join(", "));
        println!("    {:<18} {}", "Buildsets", failures.buildsets.join(", "));
        if !failures.never_passed.is_empty() {
            println!("    {:<18} {}", "Never passed", failures.never_passed.join(", "));
        }
    }
    if !summary.buildsets.is_empty() {
        println!();
        println!("  Buildsets:");
        for buildset in &summary.buildsets {
            println!("    {buildset}");
        }
    }
    println!();
}

/// Print the unclassified subjects of one cached month.
fn cmd_unknowns(config: &Config, label: &str) -> anyhow::Result<()> {
    let month = MonthKey::parse(label)?;
    let mut cache = open_cache(config)?;
    let path = cache.ensure_fresh(month)?;
    let archive = MailArchive::parse(&path)?;

    println!("{month}:");
    println!("{archive}");
    if archive.has_unclassifiable() {
        println!();
        for subject in archive.list_unclassifiable() {
            println!("  {subject}");
        }
    }
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "buildstat", &mut std::io::stdout());
    Ok(())
}
