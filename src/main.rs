use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::Parser;
use miette::{Context, IntoDiagnostic, Result};
use tally_core::TallyConfig;
use tally_difflens::ignore::StatsIgnore;
use tally_gitpulse::aggregate::CommitAggregator;
use tally_gitpulse::mining::{discover_repositories, GitRepository};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "tally",
    version,
    about = "Per-author contribution statistics from git history",
    long_about = "Walks every git repository under a directory, keeps the commits made by the\n\
                   given author emails, and writes a JSON report of commits per month, day,\n\
                   hour and weekday, plus lines added and deleted per language.\n\n\
                   Examples:\n  \
                     tally --path ~/src --author me@example.com --output .\n  \
                     tally -p ~/src -a me@work.com -a me@home.org -o /tmp --compact\n  \
                     tally -p ~/src -o . --config team.toml --ignore-file .gitstatsignore"
)]
struct Cli {
    /// Directory whose subdirectories are git repositories
    #[arg(long, short)]
    path: Option<PathBuf>,

    /// Author email to include in statistics (repeatable)
    #[arg(long = "author", short = 'a', value_name = "EMAIL")]
    authors: Vec<String>,

    /// Directory to write the report into
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Path to configuration file (default: .tally.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// File of path patterns to leave out of line counts
    #[arg(
        long,
        long_help = "File of path patterns to leave out of line counts.\n\n\
                       One pattern per line; blank lines and lines starting with '#' are skipped.\n\
                       '*' matches within a single path segment and a leading '/' anchors the\n\
                       pattern at the repository root."
    )]
    ignore_file: Option<PathBuf>,

    /// Write single-line JSON instead of indented JSON
    #[arg(long)]
    compact: bool,

    /// Enable verbose output
    #[arg(long, short)]
    verbose: bool,
}

/// Options after merging CLI flags over the config file.
struct Settings {
    path: PathBuf,
    authors: Vec<String>,
    report_path: PathBuf,
    ignore_file: Option<PathBuf>,
    pretty: bool,
    verbose: bool,
}

impl Settings {
    fn resolve(cli: Cli, config: TallyConfig) -> Result<Self> {
        let mut authors = cli.authors;
        for author in config.analysis.authors {
            if !authors.contains(&author) {
                authors.push(author);
            }
        }

        if authors.is_empty() {
            miette::bail!("missing argument: --author");
        }
        let Some(output) = cli.output else {
            miette::bail!("missing argument: --output");
        };
        let Some(path) = cli.path else {
            miette::bail!("missing argument: --path");
        };

        Ok(Self {
            path,
            authors,
            report_path: output.join(&config.output.file_name),
            ignore_file: cli.ignore_file.or(config.analysis.ignore_file),
            pretty: config.output.pretty && !cli.compact,
            verbose: cli.verbose,
        })
    }
}

fn load_config(path: Option<&Path>) -> Result<TallyConfig> {
    let config = match path {
        Some(path) => TallyConfig::from_file(path)
            .wrap_err(format!("loading config {}", path.display()))?,
        None => {
            let default_path = Path::new(".tally.toml");
            if default_path.exists() {
                TallyConfig::from_file(default_path)?
            } else {
                TallyConfig::default()
            }
        }
    };
    Ok(config)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn spinner(message: &str) -> Result<Option<indicatif::ProgressBar>> {
    if !std::io::stderr().is_terminal() {
        return Ok(None);
    }
    let pb = indicatif::ProgressBar::new_spinner();
    pb.set_style(
        indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
            .into_diagnostic()?,
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Ok(Some(pb))
}

fn run(settings: &Settings) -> Result<()> {
    let ignore = match &settings.ignore_file {
        Some(path) => StatsIgnore::from_file(path)
            .wrap_err(format!("loading ignore file {}", path.display()))?,
        None => StatsIgnore::default(),
    };
    if settings.verbose {
        eprintln!("Authors: {}", settings.authors.join(", "));
        if !ignore.is_empty() {
            eprintln!("Ignore patterns: {} loaded", ignore.patterns().len());
        }
    }

    let mut aggregator = CommitAggregator::new(settings.authors.iter().cloned())?.with_ignore(ignore);

    let repos = discover_repositories(&settings.path)
        .wrap_err(format!("searching {}", settings.path.display()))?;
    tracing::debug!(count = repos.len(), path = %settings.path.display(), "discovered repositories");
    if repos.is_empty() {
        eprintln!(
            "warning: no git repositories found under {}",
            settings.path.display()
        );
    }

    for repo_path in &repos {
        let name = repo_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| repo_path.display().to_string());

        let pb = spinner(&format!("Analyzing {name}..."))?;
        let result = GitRepository::open(repo_path).and_then(|repo| aggregator.parse_repo(&repo));
        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }

        match result {
            Ok(summary) => eprintln!(
                "Analyzed {name}: {} of {} commits matched ({} ms).",
                summary.commits_matched, summary.commits_walked, summary.elapsed_ms
            ),
            Err(e) => eprintln!("warning: skipping {name}: {e}"),
        }
    }

    let report = aggregator.report();
    let json = report.to_json(settings.pretty)?;
    std::fs::write(&settings.report_path, json)
        .into_diagnostic()
        .wrap_err(format!("writing {}", settings.report_path.display()))?;

    eprintln!(
        "{} commits across {} repositories written to {}",
        report.commits_total,
        report.analysis_metadata.repositories_analyzed,
        settings.report_path.display()
    );

    Ok(())
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let settings = Settings::resolve(cli, config)?;
    run(&settings)
}
