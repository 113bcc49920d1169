use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use newsblob::config::Config;
use newsblob::feed::{ParseOrchestrator, ParseOutcome};
use newsblob::filter::{Anchor, FilterSet, RegionFilter, TextFilter};
use newsblob::model::Article;
use newsblob::source::{Source, SourceLocks};

/// Name of the persisted filter file next to the config file.
const FILTER_FILE: &str = "filters.txt";

#[derive(Parser, Debug)]
#[command(name = "newsblob", about = "Parse cached news feed blobs and query them")]
struct Args {
    /// Config file (default: ~/.config/newsblob/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a feed blob and print the merged article list
    Parse(ParseArgs),
    /// List the known sources and their cache files
    Sources {
        /// Cache directory to check (default: from config)
        #[arg(long, value_name = "DIR")]
        cache_dir: Option<PathBuf>,
    },
}

#[derive(ClapArgs, Debug)]
struct ParseArgs {
    /// Blob file to parse
    file: PathBuf,

    /// Source to lock while parsing (default: derived from the file name)
    #[arg(long)]
    source: Option<Source>,

    /// Exclude articles mentioning this phrase (repeatable)
    #[arg(long = "filter", value_name = "PHRASE")]
    filters: Vec<String>,

    /// Match --filter phrases at the start of words
    #[arg(long, conflicts_with = "at_end")]
    at_start: bool,

    /// Match --filter phrases at the end of words
    #[arg(long)]
    at_end: bool,

    /// Keep only articles mentioning the --filter phrases
    #[arg(long)]
    inverse: bool,

    /// Keep only articles of these regions (repeatable)
    #[arg(long = "region", value_name = "ID")]
    regions: Vec<u16>,

    /// Persist the --filter phrases
    #[arg(long, conflicts_with = "inverse")]
    save_filters: bool,

    /// Print one JSON object per article
    #[arg(long)]
    json: bool,

    /// Report parse progress on stderr
    #[arg(long)]
    progress: bool,

    /// Print at most this many articles
    #[arg(long)]
    limit: Option<usize>,
}

/// One output line of `parse --json`.
#[derive(Serialize)]
struct ArticleSummary<'a> {
    external_id: &'a str,
    #[serde(rename = "type")]
    kind: Option<&'static str>,
    date: Option<DateTime<Utc>>,
    live: bool,
    title: Option<&'a str>,
    topline: Option<&'a str>,
    regions: Vec<u16>,
    stream: Option<&'a str>,
}

impl<'a> From<&'a Article> for ArticleSummary<'a> {
    fn from(article: &'a Article) -> Self {
        Self {
            external_id: &article.external_id,
            kind: article.article_type.map(|t| t.wire_name()),
            date: article.date,
            live: article.is_live(),
            title: article.title.as_deref(),
            topline: article.topline.as_deref(),
            regions: article.regions.iter().copied().collect(),
            stream: article.best_stream().map(|(_, url)| url),
        }
    }
}

fn config_path(args: &Args) -> Option<PathBuf> {
    args.config.clone().or_else(Config::default_path)
}

fn filter_file(config_path: Option<&Path>) -> Option<PathBuf> {
    Some(config_path?.parent()?.join(FILTER_FILE))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config_path = config_path(&args);
    let config = match &config_path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config '{}'", path.display()))?,
        None => Config::default(),
    };

    match args.command {
        Command::Sources { cache_dir } => list_sources(cache_dir.or(config.cache_dir)),
        Command::Parse(parse) => run_parse(parse, &config, config_path.as_deref()).await,
    }
}

fn list_sources(cache_dir: Option<PathBuf>) -> Result<()> {
    let mut out = std::io::stdout().lock();
    for source in Source::ALL {
        match &cache_dir {
            Some(dir) => {
                let path = source.cache_path(dir);
                let state = if path.is_file() { "cached" } else { "missing" };
                writeln!(out, "{:<14}{:<22}{}", source.name(), source.file_name(), state)?;
            }
            None => writeln!(out, "{:<14}{}", source.name(), source.file_name())?,
        }
    }
    Ok(())
}

/// Builds the filters for one `parse` run: config filters, the filter file
/// and the command line. With `--save-filters` the filter file is rewritten
/// with its own phrases plus the new ones; config filters stay out of it.
fn build_filters(args: &ParseArgs, config: &Config, filter_path: Option<&Path>) -> Result<FilterSet> {
    let anchor = if args.at_start {
        Anchor::AtStart
    } else if args.at_end {
        Anchor::AtEnd
    } else {
        Anchor::Anywhere
    };

    let mut persisted = match filter_path {
        Some(path) => FilterSet::load(path)?,
        None => FilterSet::new(),
    };
    for phrase in &args.filters {
        let filter = TextFilter::new(phrase, anchor)
            .with_context(|| format!("Invalid filter phrase '{phrase}'"))?
            .inverse(args.inverse)
            .temporary(!args.save_filters);
        persisted.add(filter);
    }

    if args.save_filters {
        let path = filter_path.context("No config directory to save filters in")?;
        let written = persisted.save(path)?;
        eprintln!("Saved {} filters to {}", written, path.display());
    }

    let mut filters = config.filter_set();
    for filter in persisted.filters() {
        filters.add(filter.clone());
    }
    if !args.regions.is_empty() {
        filters.add(RegionFilter::new(args.regions.iter().copied()));
    }
    Ok(filters)
}

async fn run_parse(args: ParseArgs, config: &Config, config_path: Option<&Path>) -> Result<()> {
    let filter_path = filter_file(config_path);
    let filters = build_filters(&args, config, filter_path.as_deref())?;

    let source = args.source.or_else(|| {
        args.file
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(Source::from_file_name)
    });

    let options = config.parse_options()?;
    let orchestrator = ParseOrchestrator::new(options)
        .with_locks(Arc::new(SourceLocks::new(config.lock_retry_delay())))
        .with_progress_interval(config.progress_interval());

    let task = orchestrator.parse_file(source, &args.file);
    let show_progress = args.progress;
    let outcome = task
        .wait_with_progress(|fraction| {
            if show_progress {
                eprint!("\rParsing... {:>3.0}%", fraction * 100.0);
                if fraction >= 1.0 {
                    eprintln!();
                }
            }
        })
        .await;

    let blob = match outcome {
        ParseOutcome::Parsed(blob) => blob,
        ParseOutcome::Busy => anyhow::bail!("Source is being parsed by someone else, try again later"),
        ParseOutcome::Cancelled => anyhow::bail!("Parse was cancelled"),
        ParseOutcome::Failed(e) => {
            return Err(e).with_context(|| format!("Failed to parse '{}'", args.file.display()))
        }
    };

    let all = blob.all_news();
    let shown = filters.apply(all.iter().copied());
    tracing::info!(
        total = all.len(),
        shown = shown.len(),
        filters = filters.len(),
        "Applied filters"
    );

    let limit = args.limit.unwrap_or(usize::MAX);
    let mut out = std::io::stdout().lock();
    for article in shown.into_iter().take(limit) {
        if args.json {
            serde_json::to_writer(&mut out, &ArticleSummary::from(article))?;
            writeln!(out)?;
        } else {
            print_article(&mut out, article)?;
        }
    }
    Ok(())
}

fn print_article(out: &mut impl Write, article: &Article) -> std::io::Result<()> {
    let when = match article.date {
        Some(date) => date.format("%Y-%m-%d %H:%M").to_string(),
        None if article.is_live() => "LIVE".to_string(),
        None => "-".to_string(),
    };
    let kind = article.article_type.map(|t| t.wire_name()).unwrap_or("weather");
    writeln!(
        out,
        "{:<16} {:<8} {}",
        when,
        kind,
        article.title.as_deref().unwrap_or("(untitled)")
    )?;
    if let Some(topline) = &article.topline {
        writeln!(out, "{:<16} {:<8} {}", "", "", topline)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_args(argv: &[&str]) -> ParseArgs {
        let args = Args::try_parse_from(argv).unwrap();
        match args.command {
            Command::Parse(parse) => parse,
            other => panic!("Expected parse command, got {:?}", other),
        }
    }

    #[test]
    fn test_save_filters_keeps_config_filters_out_of_the_file() {
        let dir = std::env::temp_dir().join("newsblob_main_save_filters");
        std::fs::remove_dir_all(&dir).ok();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(FILTER_FILE);
        std::fs::write(&path, "^alt\n").unwrap();

        let config = Config::from_toml("filters = [\"wahl\"]\n").unwrap();
        let args = parse_args(&["newsblob", "parse", "blob.json", "--filter", "Neu", "--at-end", "--save-filters"]);
        let filters = build_filters(&args, &config, Some(&path)).unwrap();

        let mut active: Vec<&str> = filters.text_filters().map(TextFilter::phrase).collect();
        active.sort_unstable();
        assert_eq!(active, vec!["alt", "neu", "wahl"]);

        let saved = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = saved.lines().filter(|l| !l.starts_with('#')).collect();
        assert_eq!(lines, vec!["^alt", "$neu"]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_cli_filters_not_saved_by_default() {
        let dir = std::env::temp_dir().join("newsblob_main_temporary_filters");
        std::fs::remove_dir_all(&dir).ok();
        let path = dir.join(FILTER_FILE);

        let args = parse_args(&["newsblob", "parse", "blob.json", "--filter", "heute", "--region", "7"]);
        let filters = build_filters(&args, &Config::default(), Some(&path)).unwrap();
        assert_eq!(filters.len(), 2);
        assert!(filters.text_filters().all(TextFilter::is_temporary));
        assert!(!path.exists());
    }
}
