use std::future::Future;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use codeseek_core::{CodeseekConfig, OutputFormat, SearchResult};
use codeseek_index::{IndexStats, IndexStore, IngestOptions, IngestReport, OllamaEmbedder};

#[derive(Parser)]
#[command(
    name = "codeseek",
    version,
    about = "Local semantic code search",
    long_about = "Codeseek splits source files into overlapping line windows, embeds each\n\
                   window through a local Ollama model, and answers natural-language queries\n\
                   by cosine similarity over the saved index.\n\n\
                   Examples:\n  \
                     codeseek init                        Create a .codeseek.toml config file\n  \
                     codeseek index                       Index the configured workspace\n  \
                     codeseek search 'token refresh'      Find the closest chunks\n  \
                     codeseek stats --format json         Show index statistics"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: .codeseek.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable listing (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  Markdown with fenced snippets"
    )]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Build the embedding index for a directory
    #[command(long_about = "Build the embedding index for a directory.\n\n\
        Walks the directory, splits every matching file into overlapping line\n\
        windows, embeds each window, and saves the index. The previous index is\n\
        replaced unless --append is given.\n\n\
        Examples:\n  codeseek index\n  codeseek index src --append")]
    Index {
        /// Directory to index (default: workspace.root from config)
        path: Option<PathBuf>,

        /// Add to the saved index instead of replacing it
        #[arg(long)]
        append: bool,

        /// Record failing files and keep going instead of stopping at the first one
        #[arg(long)]
        keep_going: bool,
    },
    /// Search the index with a natural-language query
    #[command(long_about = "Search the index with a natural-language query.\n\n\
        The query is embedded with the configured model and compared against\n\
        every stored chunk. Run `codeseek index` first.\n\n\
        Examples:\n  codeseek search 'database connection pool'\n  codeseek search 'retry logic' --limit 3 --format json")]
    Search {
        /// Search query
        query: String,

        /// Maximum results to return (default: 10)
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Show document, chunk, and dimension counts for the saved index
    Stats,
    /// Create a default .codeseek.toml configuration file
    #[command(long_about = "Create a default .codeseek.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .codeseek.toml already exists.")]
    Init,
}

const CONFIG_FILE: &str = ".codeseek.toml";

const DEFAULT_CONFIG: &str = r#"# Codeseek Configuration

[embedding]
# base_url = "http://localhost:11434"
# model = "nomic-embed-text"
# timeout_secs = 30
# max_retries = 0
# retry_backoff_ms = 500

[index]
# path = ".codeseek/index.json"
# window = 50
# overlap = 5
# fail_fast = true

[workspace]
# root = "."
# extensions = [".go", ".py", ".js", ".ts", ".java", ".cpp", ".c", ".h", ".php", ".rs"]
# exclude = ["*.git*", "node_modules", "*.log", "*.tmp"]

[logging]
# level = "info"
"#;

fn load_config(explicit: Option<&Path>) -> Result<CodeseekConfig> {
    match explicit {
        Some(path) => Ok(CodeseekConfig::from_file(path)?),
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                Ok(CodeseekConfig::from_file(default_path)?)
            } else {
                Ok(CodeseekConfig::default())
            }
        }
    }
}

fn init_tracing(config: &CodeseekConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn spinner(message: &str) -> Option<indicatif::ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = indicatif::ProgressBar::new_spinner();
    if let Ok(style) = indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Some(pb)
}

fn print_results(results: &[SearchResult], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(results).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            if results.is_empty() {
                println!("No results found.");
            } else {
                println!("# Search Results\n");
                for (i, r) in results.iter().enumerate() {
                    let lang = r
                        .path
                        .extension()
                        .and_then(|e| e.to_str())
                        .unwrap_or("text");
                    println!(
                        "## {}. `{}:{}-{}` (score: {:.4})\n\n```{lang}\n{}\n```\n",
                        i + 1,
                        r.path.display(),
                        r.start_line,
                        r.end_line,
                        r.score,
                        r.content,
                    );
                }
            }
        }
        OutputFormat::Text => {
            if results.is_empty() {
                println!("No results found.");
            } else {
                for (i, r) in results.iter().enumerate() {
                    println!(
                        "{}. {}:{}-{} (score: {:.4})",
                        i + 1,
                        r.path.display(),
                        r.start_line,
                        r.end_line,
                        r.score,
                    );
                    // Show a snippet preview (first 3 lines)
                    let preview: String = r
                        .content
                        .lines()
                        .take(3)
                        .map(|l| format!("   {l}"))
                        .collect::<Vec<_>>()
                        .join("\n");
                    println!("{preview}\n");
                }
            }
        }
    }
    Ok(())
}

fn print_stats(stats: &IndexStats, index_path: &Path, format: OutputFormat) -> Result<()> {
    let dims = stats
        .dimensions
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(stats).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("# Index Statistics\n");
            println!("| | |\n|---|---|");
            println!("| Path | `{}` |", index_path.display());
            println!("| Documents | {} |", stats.total_documents);
            println!("| Chunks | {} |", stats.total_chunks);
            println!("| Dimensions | {dims} |");
        }
        OutputFormat::Text => {
            println!("Index:      {}", index_path.display());
            println!("Documents:  {}", stats.total_documents);
            println!("Chunks:     {}", stats.total_chunks);
            println!("Dimensions: {dims}");
        }
    }

    if stats.dimensions.len() > 1 {
        eprintln!(
            "warning: the index mixes vector dimensions; re-run `codeseek index` without --append"
        );
    }
    Ok(())
}

fn print_failures(report: &IngestReport) {
    for (path, error) in report.failures() {
        eprintln!("  failed: {}: {error}", path.display());
    }
}

async fn run_index(
    config: &CodeseekConfig,
    root: &Path,
    append: bool,
    keep_going: bool,
) -> Result<()> {
    let index_path = &config.index.path;
    let store = IndexStore::new();
    if append && index_path.exists() {
        store.load(index_path)?;
    } else {
        store.reset();
    }

    let embedder = OllamaEmbedder::with_config(&config.embedding)?;
    let mut options = IngestOptions::from_config(config)?;
    if keep_going {
        options.fail_fast = false;
    }

    let cancel = CancellationToken::new();
    let pb = spinner(&format!("Indexing {} ...", root.display()));

    let ingest = store.ingest(
        root,
        &config.workspace.extensions,
        &embedder,
        &options,
        &cancel,
    );
    let result = cancel_on_signal(ingest, tokio::signal::ctrl_c(), &cancel).await;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let report = result?;
    store.save(index_path)?;

    eprintln!(
        "Indexed {} chunks from {} files ({} skipped, {} failed) into {}",
        report.total_chunks(),
        report.indexed().count(),
        report.skipped(),
        report.failures().count(),
        index_path.display(),
    );
    if !report.is_complete() {
        print_failures(&report);
    }
    Ok(())
}

/// Drive `work` to completion, cancelling `cancel` if `signal` fires first.
///
/// A signal listener that fails to install is logged and otherwise ignored.
async fn cancel_on_signal<W, S>(work: W, signal: S, cancel: &CancellationToken) -> W::Output
where
    W: Future,
    S: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(work);

    tokio::select! {
        output = &mut work => return output,
        signal = signal => match signal {
            Ok(()) => {
                tracing::info!("interrupted, cancelling");
                cancel.cancel();
            }
            Err(e) => tracing::warn!("failed to listen for Ctrl-C: {e}"),
        },
    }

    work.await
}

async fn run_search(
    config: &CodeseekConfig,
    query: &str,
    limit: usize,
    format: OutputFormat,
) -> Result<()> {
    let store = IndexStore::open(&config.index.path)?;
    let embedder = OllamaEmbedder::with_config(&config.embedding)?;
    let results = store.search_text(&embedder, query, limit).await?;
    print_results(&results, format)
}

#[tokio::main]
async fn main() -> Result<()> {
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
    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config, cli.verbose);

    tracing::debug!(format = %cli.format, index = %config.index.path.display(), "starting");

    match cli.command {
        Command::Index {
            ref path,
            append,
            keep_going,
        } => {
            let root = path.as_ref().unwrap_or(&config.workspace.root);
            run_index(&config, root, append, keep_going).await?;
        }
        Command::Search { ref query, limit } => {
            run_search(&config, query, limit, cli.format).await?;
        }
        Command::Stats => {
            let store = IndexStore::open(&config.index.path)?;
            let stats = store.stats()?;
            print_stats(&stats, &config.index.path, cli.format)?;
        }
        Command::Init => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failed_signal_listener_does_not_cancel() {
        let cancel = CancellationToken::new();
        let signal = std::future::ready(Err(std::io::Error::other("no signal handler")));

        let output = cancel_on_signal(
            async {
                tokio::task::yield_now().await;
                42
            },
            signal,
            &cancel,
        )
        .await;

        assert_eq!(output, 42);
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn signal_cancels_token_and_work_still_finishes() {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let output = cancel_on_signal(
            async move {
                token.cancelled().await;
                "stopped"
            },
            std::future::ready(Ok(())),
            &cancel,
        )
        .await;

        assert_eq!(output, "stopped");
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn finished_work_wins_over_pending_signal() {
        let cancel = CancellationToken::new();
        let output = cancel_on_signal(async { 7 }, std::future::pending(), &cancel).await;
        assert_eq!(output, 7);
        assert!(!cancel.is_cancelled());
    }
}
