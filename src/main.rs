use anyhow::{Context, Result};
use book_finder::config::{
    default_config_path, find_config_file, get_config, load_config, save_config, Config,
    LoggingConfig,
};
use book_finder::models::BookRecord;
use book_finder::query::{InfiniteQuery, QueryFetcher};
use book_finder::sources::SourceRegistry;
use book_finder::store::{WriteForm, WriteStore};
use book_finder::ui::{self, Spinner, Status};
use book_finder::utils::PageCache;
use book_finder::view::{ListState, ResultsView, SearchResultsList, SearchResultsProps};
use book_finder::viewport::VisibilityTracker;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Book Finder - find the book you are writing about
#[derive(Parser, Debug)]
#[command(name = "book-finder")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Search books with infinite scrolling and pick one for your write form", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (-v debug, -vv trace)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, short, value_enum, global = true, default_value_t = OutputFormat::Auto)]
    output: OutputFormat,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bypass the on-disk page cache
    #[arg(long, global = true, default_value_t = false)]
    no_cache: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (table if TTY, JSON otherwise)
    Auto,
    /// Table format (human-readable)
    Table,
    /// JSON format (machine-readable)
    Json,
    /// Plain text format
    Plain,
}

impl OutputFormat {
    fn resolve(self) -> Self {
        match self {
            OutputFormat::Auto if std::io::stdout().is_terminal() => OutputFormat::Table,
            OutputFormat::Auto => OutputFormat::Json,
            other => other,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search once, optionally scrolling and picking a result
    #[command(alias = "s")]
    Search {
        /// Book title or keywords
        query: String,

        /// Source id (see `sources`); defaults to search.default_source
        #[arg(long, short)]
        source: Option<String>,

        /// Records per page
        #[arg(long)]
        page_size: Option<usize>,

        /// Scroll to the end of the list this many times
        #[arg(long, default_value_t = 0)]
        scroll: usize,

        /// Pick the result at this position (1-based)
        #[arg(long, conflicts_with = "manual")]
        select: Option<usize>,

        /// Use the query as the title when nothing is found
        #[arg(long)]
        manual: bool,

        /// Draft file the selection is written to
        #[arg(long)]
        draft: Option<PathBuf>,
    },

    /// Browse results interactively
    #[command(alias = "b")]
    Browse {
        /// Book title or keywords
        query: String,

        /// Source id (see `sources`); defaults to search.default_source
        #[arg(long, short)]
        source: Option<String>,

        /// Records per page
        #[arg(long)]
        page_size: Option<usize>,

        /// Draft file the selection is written to
        #[arg(long)]
        draft: Option<PathBuf>,
    },

    /// List available book sources
    Sources,

    /// Manage the page cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Show cache location and size
    Stats,
    /// Delete all cached pages
    Clear,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Write a configuration file with default values
    Init {
        /// Where to write it (default: user config directory)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_logging(cli: &Cli, logging: &LoggingConfig) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("book_finder={}", level)));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.is_json() {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn resolve_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => match find_config_file() {
            Some(found) => load_config(&found)
                .with_context(|| format!("Failed to load config from {}", found.display())),
            None => Ok(get_config()),
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_deref())?;
    init_logging(&cli, &config.logging);

    if let Some(path) = cli.config.clone().or_else(find_config_file) {
        tracing::debug!("Using config file: {}", path.display());
    }

    let format = cli.output.resolve();

    match &cli.command {
        Commands::Search {
            query,
            source,
            page_size,
            scroll,
            select,
            manual,
            draft,
        } => {
            let options = SearchOptions {
                source: source.as_deref(),
                page_size: *page_size,
                draft: draft.as_deref(),
                no_cache: cli.no_cache,
            };
            run_search(&config, query, &options, *scroll, *select, *manual, format).await
        }
        Commands::Browse {
            query,
            source,
            page_size,
            draft,
        } => {
            let options = SearchOptions {
                source: source.as_deref(),
                page_size: *page_size,
                draft: draft.as_deref(),
                no_cache: cli.no_cache,
            };
            run_browse(&config, query, &options).await
        }
        Commands::Sources => list_sources(&config, format),
        Commands::Cache { action } => run_cache(&config, action, format),
        Commands::Config { action } => run_config(action),
    }
}

struct SearchOptions<'a> {
    source: Option<&'a str>,
    page_size: Option<usize>,
    draft: Option<&'a Path>,
    no_cache: bool,
}

/// A mounted results list together with the collaborators the CLI inspects
struct Mounted {
    list: SearchResultsList<InfiniteQuery>,
    store: WriteStore,
    tracker: VisibilityTracker,
    closed: Arc<AtomicBool>,
    source_id: String,
}

impl Mounted {
    /// Simulate the user scrolling to the end of the list. Returns false
    /// when there is nothing further to load.
    async fn scroll_to_end(&mut self) -> bool {
        self.list.render();
        let Some(sentinel) = self.list.sentinel() else {
            return false;
        };
        if !self.tracker.is_observed(sentinel) {
            return false;
        }
        if self.list.on_sentinel_visible(sentinel) {
            self.list.wait_for_update().await;
        }
        true
    }

    fn total(&self) -> Option<usize> {
        self.list.fetcher().pages().last().and_then(|page| page.total)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn build_fetcher(config: &Config, options: &SearchOptions<'_>) -> Result<(InfiniteQuery, String)> {
    let registry = SourceRegistry::from_config(config)?;
    let source_id = options
        .source
        .unwrap_or(config.search.default_source.as_str())
        .to_string();
    let source = registry.get_required(&source_id)?;

    let mut fetcher = InfiniteQuery::new(source)
        .page_size(options.page_size.unwrap_or(config.search.page_size))
        .max_sessions(config.search.max_cached_sessions);

    if !options.no_cache && config.cache.enabled {
        let cache = PageCache::from_config(config.cache.clone());
        match cache.initialize() {
            Ok(()) => fetcher = fetcher.with_cache(cache),
            Err(e) => tracing::warn!("Page cache unavailable: {}", e),
        }
    }

    Ok((fetcher, source_id))
}

fn mount(config: &Config, query: &str, options: &SearchOptions<'_>) -> Result<Mounted> {
    let (fetcher, source_id) = build_fetcher(config, options)?;

    let store = match options.draft {
        Some(path) => WriteStore::open_draft(path)
            .with_context(|| format!("Failed to open draft {}", path.display()))?,
        None => WriteStore::new(),
    };
    let tracker = VisibilityTracker::new();
    let closed = Arc::new(AtomicBool::new(false));

    let selection_store = store.clone();
    let close_flag = Arc::clone(&closed);
    let props = SearchResultsProps::new(query)
        .on_change(move |book| selection_store.select_book(book))
        .handle_close(move || close_flag.store(true, Ordering::SeqCst));

    let list = SearchResultsList::mount(
        props,
        fetcher,
        Arc::new(store.clone()),
        Arc::new(tracker.clone()),
    );

    Ok(Mounted {
        list,
        store,
        tracker,
        closed,
        source_id,
    })
}

async fn wait_with_spinner(mounted: &mut Mounted, show: bool) {
    let spinner = if show {
        Spinner::new(&format!("Searching {}...", mounted.source_id))
    } else {
        Spinner::hidden()
    };
    mounted.list.wait_for_update().await;
    match mounted.list.fetcher().last_error() {
        Some(e) => spinner.finish_with_error(&format!("Search failed: {}", e)),
        None => spinner.clear(),
    }
}

fn save_draft(store: &WriteStore, draft: Option<&Path>) -> Result<()> {
    if let Some(path) = draft {
        store
            .save_draft(path)
            .with_context(|| format!("Failed to save draft {}", path.display()))?;
    }
    Ok(())
}

async fn run_search(
    config: &Config,
    query: &str,
    options: &SearchOptions<'_>,
    scroll: usize,
    select: Option<usize>,
    manual: bool,
    format: OutputFormat,
) -> Result<()> {
    let mut mounted = mount(config, query, options)?;
    wait_with_spinner(&mut mounted, format == OutputFormat::Table && ui::is_terminal()).await;

    for _ in 0..scroll {
        if !mounted.scroll_to_end().await {
            break;
        }
    }

    if let Some(position) = select {
        let index = position
            .checked_sub(1)
            .context("Positions start at 1")?;
        mounted.list.select(index)?;
    }
    if manual {
        mounted.list.enter_title_manually()?;
    }

    save_draft(&mounted.store, options.draft)?;
    output_search(&mut mounted, format)
}

#[derive(Serialize)]
struct SearchOutput<'a> {
    query: &'a str,
    source: &'a str,
    state: &'static str,
    books: Vec<&'a BookRecord>,
    has_more: bool,
    total: Option<usize>,
    error: Option<String>,
    closed: bool,
    form: WriteForm,
}

fn output_search(mounted: &mut Mounted, format: OutputFormat) -> Result<()> {
    let total = mounted.total();
    let closed = mounted.is_closed();
    let form = mounted.store.snapshot();
    let has_more = mounted.list.fetcher().has_next_page();
    let error = mounted
        .list
        .fetcher()
        .last_error()
        .map(|e| e.to_string());
    let state = match mounted.list.state() {
        ListState::EmptyAfterLoad => "empty",
        ListState::LoadingOrHasResults => "results",
    };
    let query = mounted.list.query().to_string();
    let source_id = mounted.source_id.clone();

    let view = mounted.list.render();

    match format {
        OutputFormat::Json => {
            let books = match &view {
                ResultsView::List(list) => list.items.clone(),
                ResultsView::Empty(_) => Vec::new(),
            };
            let output = SearchOutput {
                query: &query,
                source: &source_id,
                state,
                books,
                has_more,
                total,
                error,
                closed,
                form,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => match &view {
            ResultsView::List(list) => {
                for (index, book) in list.items.iter().enumerate() {
                    println!("{}. {}", index + 1, book.title);
                    println!("   {}", ui::format_book_details(book));
                }
                if has_more {
                    println!("(more results)");
                }
            }
            ResultsView::Empty(empty) => {
                if let Some(error) = &error {
                    eprintln!("Search failed: {}", error);
                }
                println!("{}", empty.message);
                println!("{}", empty.button_label);
            }
        },
        OutputFormat::Table => {
            if let Some(error) = &error {
                ui::print_status(Status::Error, &format!("Search failed: {}", error));
            }
            match &view {
                ResultsView::List(list) => print_book_table(&list.items, has_more),
                ResultsView::Empty(_) => ui::print_results_view(&view, total),
            }
            print_form_summary(&form, closed);
        }
        OutputFormat::Auto => unreachable!("resolved before output"),
    }

    Ok(())
}

fn print_book_table(books: &[&BookRecord], has_more: bool) {
    use comfy_table::{Attribute, Cell, Table};

    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["#", "Title", "Authors", "Publisher", "Year"]);

    for (index, book) in books.iter().enumerate() {
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(ui::truncate_with_ellipsis(&book.title, 50)).add_attribute(Attribute::Bold),
            Cell::new(ui::truncate_with_ellipsis(&book.author_line(), 30)),
            Cell::new(book.publisher.as_deref().unwrap_or_default()),
            Cell::new(book.year().unwrap_or_default()),
        ]);
    }
    println!("{table}");

    if has_more {
        ui::print_status(Status::Info, "More results available (use --scroll)");
    }
}

fn print_form_summary(form: &WriteForm, closed: bool) {
    if let Some(book) = &form.book {
        ui::print_status(Status::Success, &format!("Selected: {}", book.title));
    } else if closed && !form.title.is_empty() {
        ui::print_status(Status::Success, &format!("Title set to: {}", form.title));
    }
}

/// One line of input in the interactive browser
#[derive(Debug, Clone, PartialEq, Eq)]
enum BrowseCommand {
    /// Load the next page
    More,
    /// Enter on the empty state, where there is nothing to load
    Idle,
    Manual,
    Search(String),
    /// Zero-based index of the chosen row
    Select(usize),
    Quit,
    Unknown(String),
}

impl BrowseCommand {
    fn parse(line: &str, listed: bool) -> Self {
        match line.trim() {
            "q" | "quit" => BrowseCommand::Quit,
            "" | "n" if listed => BrowseCommand::More,
            "" => BrowseCommand::Idle,
            "m" => BrowseCommand::Manual,
            text if text.starts_with('/') => match text.trim_start_matches('/').trim() {
                "" => BrowseCommand::Unknown(text.to_string()),
                next => BrowseCommand::Search(next.to_string()),
            },
            text => match text.parse::<usize>() {
                Ok(position) if position >= 1 => BrowseCommand::Select(position - 1),
                _ => BrowseCommand::Unknown(text.to_string()),
            },
        }
    }
}

async fn run_browse(config: &Config, query: &str, options: &SearchOptions<'_>) -> Result<()> {
    let mut mounted = mount(config, query, options)?;
    wait_with_spinner(&mut mounted, ui::is_terminal()).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let total = mounted.total();
        let view = mounted.list.render();
        ui::print_results_view(&view, total);
        let listed = !view.is_empty_state();

        println!();
        if listed {
            println!("[Enter/n] more  [number] select  [/text] new search  [q] quit");
        } else {
            println!("[m] enter title manually  [/text] new search  [q] quit");
        }

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match BrowseCommand::parse(&line, listed) {
            BrowseCommand::Quit => break,
            BrowseCommand::More => {
                if !mounted.scroll_to_end().await {
                    ui::print_status(Status::Info, "No more results");
                }
            }
            BrowseCommand::Idle => {
                ui::print_status(Status::Info, "No results; [m] uses the query as the title")
            }
            BrowseCommand::Manual => match mounted.list.enter_title_manually() {
                Ok(()) => {
                    ui::print_status(
                        Status::Success,
                        &format!("Title set to: {}", mounted.store.snapshot().title),
                    );
                }
                Err(e) => ui::print_status(Status::Warning, &e.to_string()),
            },
            BrowseCommand::Search(next) => {
                ui::print_status(Status::Search, &format!("Searching for \"{}\"", next));
                mounted.list.set_query(&next);
                wait_with_spinner(&mut mounted, ui::is_terminal()).await;
            }
            BrowseCommand::Select(index) => match mounted.list.select(index) {
                Ok(()) => {
                    if let Some(book) = mounted.store.selected_book() {
                        ui::print_status(Status::Success, &format!("Selected: {}", book.title));
                    }
                    break;
                }
                Err(e) => ui::print_status(Status::Warning, &e.to_string()),
            },
            BrowseCommand::Unknown(text) => {
                ui::print_status(Status::Warning, &format!("Unknown command: {}", text))
            }
        }

        if mounted.is_closed() {
            break;
        }
    }

    save_draft(&mounted.store, options.draft)
}

fn list_sources(config: &Config, format: OutputFormat) -> Result<()> {
    let registry = SourceRegistry::from_config(config)?;
    let default = config.search.default_source.as_str();

    match format {
        OutputFormat::Json => {
            let sources: Vec<_> = registry
                .all()
                .map(|s| {
                    serde_json::json!({
                        "id": s.id(),
                        "name": s.name(),
                        "default": s.id() == default,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&sources)?);
        }
        OutputFormat::Plain => {
            for source in registry.all() {
                println!("{}\t{}", source.id(), source.name());
            }
        }
        _ => {
            use comfy_table::{Cell, Table};
            let mut table = Table::new();
            table.load_preset(comfy_table::presets::UTF8_FULL);
            table.set_header(vec!["ID", "Name", "Default"]);
            for source in registry.all() {
                table.add_row(vec![
                    Cell::new(source.id()),
                    Cell::new(source.name()),
                    Cell::new(if source.id() == default { "✓" } else { "" }),
                ]);
            }
            println!("{table}");
        }
    }

    Ok(())
}

fn run_cache(config: &Config, action: &CacheAction, format: OutputFormat) -> Result<()> {
    let cache = PageCache::from_config(config.cache.clone());

    match action {
        CacheAction::Stats => {
            let stats = cache.stats();
            if format == OutputFormat::Json {
                let json = serde_json::json!({
                    "enabled": stats.enabled,
                    "cache_dir": stats.cache_dir,
                    "page_count": stats.page_count,
                    "size_kb": stats.size_kb,
                    "ttl_seconds": stats.ttl.as_secs(),
                });
                println!("{}", serde_json::to_string_pretty(&json)?);
            } else {
                ui::print_section("Page cache");
                println!("Enabled:   {}", stats.enabled);
                println!("Directory: {}", stats.cache_dir.display());
                println!("Pages:     {}", ui::format_number(stats.page_count));
                println!("Size:      {} KB", ui::format_number(stats.size_kb as usize));
                println!("TTL:       {}s", stats.ttl.as_secs());
            }
        }
        CacheAction::Clear => {
            cache.clear_all().context("Failed to clear cache")?;
            ui::print_status(Status::Success, "Cache cleared");
        }
    }

    Ok(())
}

fn run_config(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Init { path, force } => {
            let path = path
                .clone()
                .or_else(default_config_path)
                .context("No config directory on this platform; pass a path")?;

            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }

            let mut config = Config::default();
            // Keys from the environment stay in the environment
            config.api_keys.kakao = None;
            save_config(&config, &path)?;
            ui::print_status(
                Status::Success,
                &format!("Wrote configuration to {}", path.display()),
            );
        }
    }

    Ok(())
}
