//! CLI entry point for `listindex`.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use listindex::config::{self, Config};
use listindex::index::{
    discover_archives, IndexController, IndexOptions, RunSummary, TantivyStorage,
};

#[derive(Parser)]
#[command(
    name = "listindex",
    version,
    about = "Index mailing-list MBOX archives for full-text search",
    long_about = "Index mailing-list MBOX archives for full-text search.\n\n\
Archive files must be named <list>-<YYYYMM> or <list>-<YYYY>. Re-running over \
the same files only adds messages that were not indexed yet.",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Archive files to index, in order
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path prefix shared by all segment directories
    #[arg(short, long, value_name = "PATH")]
    prefix: Option<PathBuf>,

    /// Stemming language, as ISO code or English name (en, english)
    #[arg(short, long, value_name = "LANG")]
    lang: Option<String>,

    /// Stemming language of one list, overriding --lang (repeatable)
    #[arg(long = "list-lang", value_name = "LIST=LANG", value_parser = parse_list_lang)]
    list_langs: Vec<(String, String)>,

    /// Also index the archives found under DIR/<list>/
    #[arg(long, value_name = "DIR")]
    mbox_dir: Option<PathBuf>,

    /// Restrict --mbox-dir discovery to these lists (repeatable)
    #[arg(long = "list", value_name = "LIST", requires = "mbox_dir")]
    lists: Vec<String>,

    /// Flush after this many pending documents, checked between files
    #[arg(short = 'i', long, value_name = "N")]
    flush_interval: Option<u64>,

    /// Rebuild every bucket from scratch instead of resuming
    #[arg(long)]
    force: bool,

    /// Configuration file (defaults to $LISTINDEX_CONFIG or the user config dir)
    #[arg(long, value_name = "PATH", env = "LISTINDEX_CONFIG")]
    config: Option<PathBuf>,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Do not show a progress bar
    #[arg(long)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => return cmd_completions(shell),
        Some(Commands::Manpage) => return cmd_manpage(),
        None => {}
    }

    let mut config = config::load_config(cli.config.as_deref());

    let log_level = match cli.verbose {
        0 => config.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    setup_logging(&log_level, &config);

    let mut files = cli.files.clone();
    if let Some(dir) = &cli.mbox_dir {
        files.extend(discover_archives(dir, &cli.lists)?);
    }
    if files.is_empty() {
        anyhow::bail!("no archive files given (see --help)");
    }

    if let Some(prefix) = cli.prefix {
        config.storage.path_prefix = prefix;
    }
    if let Some(lang) = cli.lang {
        config.indexing.language = lang;
    }
    config.indexing.languages.extend(cli.list_langs);
    if let Some(interval) = cli.flush_interval {
        config.indexing.flush_interval = interval;
    }
    if cli.force {
        config.indexing.force = true;
    }

    let summary = cmd_index(&files, &config, !cli.no_progress)?;
    if cli.json {
        print_summary_json(&summary)?;
    }
    Ok(())
}

/// Parse `LIST=LANG`.
fn parse_list_lang(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((list, lang)) if !list.trim().is_empty() && !lang.trim().is_empty() => {
            Ok((list.trim().to_string(), lang.trim().to_string()))
        }
        _ => Err(format!("expected LIST=LANG, got '{s}'")),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::log_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "listindex.log");
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

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "listindex", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Index the archive files and print the summary table.
fn cmd_index(files: &[PathBuf], config: &Config, show_progress: bool) -> anyhow::Result<RunSummary> {
    let options = IndexOptions::from_config(config);
    if let Some(parent) = config.storage.path_prefix.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let storage = TantivyStorage::new(
        &config.storage.path_prefix,
        options.language.clone(),
        config.storage.writer_memory,
    );

    let start = Instant::now();
    let mut controller = IndexController::new(storage, options)?;

    let pb = if show_progress {
        ProgressBar::new(0)
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )?
            .progress_chars("#>-"),
    );
    let current = RefCell::new(PathBuf::new());
    let report = |path: &Path, read: u64, total: u64| {
        let mut current = current.borrow_mut();
        if current.as_path() != path {
            *current = path.to_path_buf();
            pb.reset();
            pb.set_length(total);
            pb.set_message(display_name(path));
        }
        pb.set_position(read);
    };

    let summary = controller.run(files, Some(&report))?;
    pb.finish_and_clear();

    print_summary_table(&summary, start.elapsed());
    Ok(summary)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Print the run summary as an aligned table on stderr.
fn print_summary_table(summary: &RunSummary, elapsed: Duration) {
    use humansize::{format_size, BINARY};

    eprintln!();
    eprintln!("  {:<20} {}", "Files indexed:", summary.files);
    if summary.failed_files > 0 {
        eprintln!("  {:<20} {}", "Files abandoned:", summary.failed_files);
    }
    eprintln!(
        "  {:<20} {}",
        "Data read:",
        format_size(summary.bytes_read, BINARY)
    );
    eprintln!("  {:<20} {}", "Messages:", summary.messages);
    eprintln!("  {:<20} {}", "Documents added:", summary.documents);
    eprintln!("  {:<20} {}", "Already indexed:", summary.resumed_skips);
    eprintln!("  {:<20} {}", "Duplicates:", summary.duplicates);
    eprintln!("  {:<20} {}", "Spam removed:", summary.spam);
    if summary.missing_ids > 0 {
        eprintln!("  {:<20} {}", "Empty Message-Id:", summary.missing_ids);
    }
    if summary.corrected_dates > 0 {
        eprintln!("  {:<20} {}", "Dates corrected:", summary.corrected_dates);
    }
    if summary.parse_failures > 0 {
        eprintln!("  {:<20} {}", "Parse failures:", summary.parse_failures);
    }
    eprintln!("  {:<20} {:.2?}", "Elapsed:", elapsed);
    eprintln!();
}

/// Print the run summary as JSON on stdout.
fn print_summary_json(summary: &RunSummary) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}
