use anyhow::{Context as AnyhowContext, Result};
use chemsearch_index::{export_filename, export_sdf, IndexHandle, MoleculeIndex};
use chemsearch_indexer::{ledger_path, JobLedger, RebuildOrchestrator};
use chemsearch_search::{Criteria, FilterSet, SearchRequest, SearchService};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use config::{AppConfig, Overrides};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod config;
mod report;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.trim_end_matches('\n').as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    print_stdout(&serde_json::to_string_pretty(value)?)
}

#[derive(Parser)]
#[command(name = "chemsearch")]
#[command(about = "Substructure and similarity search over a chemical structure archive", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Archive directory (overrides CHEMSEARCH_ARCHIVE_DIR)
    #[arg(long, global = true)]
    archive: Option<PathBuf>,

    /// TOML configuration file (overrides CHEMSEARCH_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON on stdout (implies --quiet)
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Rescan the archive and publish a new molecule index
    Rebuild(RebuildArgs),

    /// Show progress of the most recent rebuild
    Status,

    /// Mark every pending rebuild as cleared
    #[command(name = "clear-rebuilds")]
    ClearRebuilds,

    /// List past rebuilds, newest first
    History(HistoryArgs),

    /// Browse indexed molecules
    List(ListArgs),

    /// Show one molecule by identity key
    Show(ShowArgs),

    /// Run a substructure or similarity search
    Search(SearchArgs),

    /// Write every valid molecule to an SD file
    Export(ExportArgs),

    /// List saved queries, or run one by name
    Queries(QueriesArgs),
}

#[derive(Args)]
struct RebuildArgs {
    /// User label recorded on the rebuild
    #[arg(long)]
    user: Option<String>,
}

#[derive(Args)]
struct HistoryArgs {
    /// Maximum number of rebuilds to show
    #[arg(long, default_value_t = 20)]
    limit: usize,
}

#[derive(Args, Clone, Default)]
struct CriteriaArgs {
    /// Sort order: newest, oldest or alphabetical
    #[arg(long)]
    sort: Option<String>,

    /// Page number, starting at 1
    #[arg(long)]
    page: Option<usize>,

    /// Filter as ATTR=VALUE (category, user); repeatable
    #[arg(long = "filter", value_name = "ATTR=VALUE")]
    filters: Vec<String>,
}

impl CriteriaArgs {
    fn to_criteria(&self) -> Result<Criteria> {
        let mut criteria = Criteria {
            sort: self.sort.clone(),
            page: self.page,
            ..Criteria::default()
        };
        for filter in &self.filters {
            let (attr, value) = filter
                .split_once('=')
                .with_context(|| format!("Filter '{filter}' is not ATTR=VALUE"))?;
            criteria
                .filters
                .insert(attr.trim().to_string(), value.trim().to_string());
        }
        Ok(criteria)
    }

    /// Layer these arguments over saved criteria.
    fn merge_into(&self, base: &Criteria) -> Result<Criteria> {
        let own = self.to_criteria()?;
        let mut merged = base.clone();
        if own.sort.is_some() {
            merged.sort = own.sort;
        }
        if own.page.is_some() {
            merged.page = own.page;
        }
        merged.filters.extend(own.filters);
        Ok(merged)
    }
}

#[derive(Args)]
struct ListArgs {
    #[command(flatten)]
    criteria: CriteriaArgs,

    /// List structure files that failed to parse instead
    #[arg(long)]
    invalid: bool,
}

#[derive(Args)]
struct ShowArgs {
    /// Identity key of the molecule
    key: String,
}

#[derive(Args)]
struct SearchArgs {
    /// SMILES structure or SMARTS pattern
    query: String,

    /// similarity or substructure
    #[arg(long = "type", value_name = "SEARCH_TYPE")]
    search_type: String,

    /// smiles (default) or smarts
    #[arg(long, default_value = "smiles")]
    query_type: String,

    #[command(flatten)]
    criteria: CriteriaArgs,
}

#[derive(Args)]
struct ExportArgs {
    /// Output file; `-` writes to stdout. Defaults to export_<date>.sdf
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct QueriesArgs {
    /// Saved query to run
    name: Option<String>,

    #[command(flatten)]
    criteria: CriteriaArgs,
}

pub async fn main_entry() -> Result<()> {
    let mut cli = Cli::parse();
    if cli.json {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = AppConfig::load(&Overrides {
        archive_dir: cli.archive.clone(),
        config: cli.config.clone(),
    })?;
    log::debug!("Using archive {}", config.archive.root.display());

    let json = cli.json;
    match cli.command {
        Commands::Rebuild(args) => run_rebuild(&config, args, json).await?,
        Commands::Status => run_status(&config, json).await?,
        Commands::ClearRebuilds => run_clear_rebuilds(&config, json).await?,
        Commands::History(args) => run_history(&config, args, json).await?,
        Commands::List(args) => run_list(&config, args, json).await?,
        Commands::Show(args) => run_show(&config, args, json).await?,
        Commands::Search(args) => run_search(&config, args, json).await?,
        Commands::Export(args) => run_export(&config, args, json).await?,
        Commands::Queries(args) => run_queries(&config, args, json).await?,
    }

    Ok(())
}

async fn orchestrator(config: &AppConfig) -> Result<RebuildOrchestrator> {
    let ledger = JobLedger::open(ledger_path(&config.archive.root))
        .await
        .context("Failed to open rebuild ledger")?;
    Ok(RebuildOrchestrator::new(
        config.archive.clone(),
        ledger,
        IndexHandle::default(),
    ))
}

async fn published_index(config: &AppConfig) -> Result<Arc<MoleculeIndex>> {
    orchestrator(config)
        .await?
        .restore()
        .await
        .context("Failed to load molecule index")?
        .context("No molecule index yet; run `chemsearch rebuild` first")
}

fn search_service(config: &AppConfig) -> SearchService {
    SearchService::new(
        FilterSet::for_archive(config.archive.ownership),
        config.per_page,
    )
}

async fn run_rebuild(config: &AppConfig, args: RebuildArgs, json: bool) -> Result<()> {
    let orchestrator = orchestrator(config).await?;
    if let Some(running) = orchestrator.ledger().most_recent_pending() {
        log::warn!(
            "Rebuild {} is still pending: {}",
            running.id(),
            running.progress_message()
        );
    }
    let outcome = orchestrator
        .rebuild(args.user)
        .await
        .context("Rebuild failed")?;
    if json {
        print_json(&outcome)
    } else {
        print_stdout(&report::render_outcome(&outcome))
    }
}

async fn run_status(config: &AppConfig, json: bool) -> Result<()> {
    let status = orchestrator(config).await?.ledger().build_status();
    if json {
        print_json(&status)
    } else {
        print_stdout(&report::render_status(&status))
    }
}

async fn run_clear_rebuilds(config: &AppConfig, json: bool) -> Result<()> {
    let cleared = orchestrator(config).await?.clear_rebuilds().await?;
    if json {
        print_json(&serde_json::json!({ "cleared": cleared }))
    } else {
        print_stdout(&format!("Cleared {} pending rebuilds", cleared.len()))
    }
}

async fn run_history(config: &AppConfig, args: HistoryArgs, json: bool) -> Result<()> {
    let mut jobs = orchestrator(config).await?.ledger().history();
    jobs.truncate(args.limit);
    if json {
        print_json(&jobs)
    } else {
        print_stdout(&report::render_history(&jobs))
    }
}

async fn run_list(config: &AppConfig, args: ListArgs, json: bool) -> Result<()> {
    let index = published_index(config).await?;
    if args.invalid {
        return if json {
            print_json(index.invalid())
        } else {
            print_stdout(&report::render_invalid(index.invalid(), &config.archive.root))
        };
    }
    let criteria = args.criteria.to_criteria()?;
    let page = search_service(config).browse(&index, &criteria)?;
    if json {
        print_json(&page)
    } else {
        print_stdout(&report::render_page(&page))
    }
}

async fn run_show(config: &AppConfig, args: ShowArgs, json: bool) -> Result<()> {
    let index = published_index(config).await?;
    let lookup = index.lookup(args.key.trim())?;
    let files = folder_files(lookup.record.path()).await;
    if json {
        print_json(&serde_json::json!({
            "molecule": lookup.record,
            "duplicates": lookup.duplicates,
            "warning": lookup.duplicate_warning(),
            "files": files,
        }))
    } else {
        print_stdout(&report::render_molecule(&lookup, &files, &config.archive.root))
    }
}

async fn run_search(config: &AppConfig, args: SearchArgs, json: bool) -> Result<()> {
    let criteria = args.criteria.to_criteria()?;
    let request = SearchRequest::parse(&args.query, &args.query_type, &args.search_type, criteria)?;
    let index = published_index(config).await?;
    let page = search_service(config).search(&index, &request)?;
    if json {
        print_json(&page)
    } else {
        print_stdout(&report::render_page(&page))
    }
}

async fn run_export(config: &AppConfig, args: ExportArgs, json: bool) -> Result<()> {
    let index = published_index(config).await?;
    let sdf = export_sdf(&index)?;
    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from(export_filename(Utc::now())));
    if out == Path::new("-") {
        return print_stdout(&sdf);
    }
    tokio::fs::write(&out, sdf)
        .await
        .with_context(|| format!("Failed to write {}", out.display()))?;
    log::info!("Exported {} molecules to {}", index.len(), out.display());
    if json {
        print_json(&serde_json::json!({ "path": out, "molecules": index.len() }))
    } else {
        print_stdout(&format!(
            "Exported {} molecules to {}",
            index.len(),
            out.display()
        ))
    }
}

async fn run_queries(config: &AppConfig, args: QueriesArgs, json: bool) -> Result<()> {
    let Some(name) = args.name else {
        return if json {
            print_json(&config.queries)
        } else {
            print_stdout(&report::render_queries(&config.queries))
        };
    };
    let saved = config
        .query(&name)
        .with_context(|| format!("No saved query named '{name}'"))?;
    let mut request = saved.request.clone();
    request.criteria = args.criteria.merge_into(&request.criteria)?;
    request.validate()?;

    let index = published_index(config).await?;
    let page = search_service(config).search(&index, &request)?;
    if json {
        print_json(&page)
    } else {
        print_stdout(&report::render_page(&page))
    }
}

/// Non-hidden files next to a structure file, by name.
async fn folder_files(path: &Path) -> Vec<String> {
    let Some(dir) = path.parent() else {
        return Vec::new();
    };
    let mut names = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) => {
            log::warn!("Failed to list {}: {err}", dir.display());
            return names;
        }
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_file = entry.file_type().await.is_ok_and(|kind| kind.is_file());
        if is_file && !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    names
}
