use clap::{ArgGroup, Parser, Subcommand};
use slotcache::cache::{CalendarCache, FileStorage};
use slotcache::cli::{self, Command, Context, OutputMode, parse_filter};
use slotcache::config::{AppConfig, load_config};
use slotcache::logger;
use slotcache::request::{CalendarDataRequest, CalendarView, parse_date};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "slotcache", version, about = "Calendar data cache CLI", long_about = None)]
#[command(group(ArgGroup::new("output").args(["json", "plain"])))]
struct Cli {
    #[arg(long, help = "Path to a config file (TOML). If omitted, the usual locations are searched.")]
    config: Option<PathBuf>,
    #[arg(long, help = "Override the calendar API endpoint (takes precedence over config/env)")]
    endpoint: Option<String>,
    #[arg(long, help = "Override the directory holding the persisted cache")]
    storage_dir: Option<PathBuf>,
    #[arg(long, help = "Emit machine-readable JSON")]
    json: bool,
    #[arg(long, help = "Emit plain, tab-separated output")]
    plain: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Fetch calendar data for a date range, from cache when fresh")]
    Fetch {
        #[arg(long, help = "First day of the range (YYYY-MM-DD)")]
        start: String,
        #[arg(long, help = "Last day of the range (YYYY-MM-DD); defaults to --start")]
        end: Option<String>,
        #[arg(long, default_value = "day", help = "Calendar view: day|week|month")]
        view: String,
        #[arg(long, help = "Only this barber's appointments")]
        barber: Option<String>,
        #[arg(long, help = "Only this location's appointments")]
        location: Option<String>,
        #[arg(long, help = "Include appointment details")]
        details: bool,
        #[arg(long = "filter", help = "Extra key=value query filter; repeatable")]
        filters: Vec<String>,
        #[arg(long, help = "Also load the neighbouring ranges into the cache")]
        prefetch: bool,
    },
    #[command(about = "Show which rows of a day column a viewport renders")]
    Window {
        #[arg(help = "JSON file with an array of appointments")]
        appointments: PathBuf,
        #[arg(long, help = "Day to lay out (YYYY-MM-DD)")]
        date: String,
        #[arg(long, default_value_t = 0.0, help = "Scroll offset in pixels")]
        scroll_top: f64,
        #[arg(long, default_value_t = 600.0, help = "Viewport height in pixels")]
        height: f64,
        #[arg(long, default_value_t = 3, help = "Extra rows rendered above and below")]
        overscan: usize,
        #[arg(long, default_value_t = 30, help = "Slot length in minutes")]
        slot_minutes: u32,
    },
    #[command(about = "Print cache statistics")]
    Stats,
    #[command(about = "List cached keys, most recently used first")]
    Keys,
    #[command(about = "Remove every cached entry")]
    Clear,
    #[command(about = "Remove expired entries")]
    Purge,
    #[command(about = "Remove entries whose range overlaps the given dates")]
    Invalidate {
        #[arg(long, help = "First affected day (YYYY-MM-DD)")]
        start: String,
        #[arg(long, help = "Last affected day (YYYY-MM-DD); defaults to --start")]
        end: Option<String>,
    },
}

fn to_command(cmd: Commands) -> Result<Command, Box<dyn std::error::Error>> {
    Ok(match cmd {
        Commands::Fetch { start, end, view, barber, location, details, filters, prefetch } => {
            let start_date = parse_date(&start)?;
            let end_date = match end {
                Some(e) => parse_date(&e)?,
                None => start_date,
            };
            let view: CalendarView = view.parse()?;
            let mut request =
                CalendarDataRequest::new(start_date, end_date, view).with_details(details);
            if let Some(b) = barber {
                request = request.with_barber(b);
            }
            if let Some(l) = location {
                request = request.with_location(l);
            }
            for f in &filters {
                let (k, v) = parse_filter(f)?;
                request = request.with_filter(k, v);
            }
            Command::Fetch { request, prefetch }
        }
        Commands::Window { appointments, date, scroll_top, height, overscan, slot_minutes } => {
            Command::Window {
                appointments,
                date: parse_date(&date)?,
                scroll_top,
                height,
                overscan,
                slot_minutes,
            }
        }
        Commands::Stats => Command::Stats,
        Commands::Keys => Command::Keys,
        Commands::Clear => Command::Clear,
        Commands::Purge => Command::Purge,
        Commands::Invalidate { start, end } => {
            let start = parse_date(&start)?;
            let end = match end {
                Some(e) => parse_date(&e)?,
                None => start,
            };
            Command::Invalidate { start, end }
        }
    })
}

fn init_logging(cfg: &AppConfig) {
    let res = match &cfg.log_dir {
        Some(dir) => logger::configure_logging(Some(dir.as_path()), cfg.log_level.as_deref(), None),
        None => logger::init_console(cfg.log_level.as_deref().or(Some("warn"))),
    };
    if let Err(e) = res {
        eprintln!("warning: logging disabled: {e}");
    }
}

fn build_context(cfg: &AppConfig) -> Result<Context, Box<dyn std::error::Error>> {
    // The CLI is a separate process per invocation; the cache is only useful persisted.
    let mut cache_cfg = cfg.cache.clone();
    cache_cfg.persistence = true;
    let storage = FileStorage::open(cfg.storage_dir_or_default())?;
    let cache = CalendarCache::with_storage(cache_cfg, Arc::new(storage))?;
    let loader = build_loader(cfg, &cache)?;
    Ok(Context { cache, loader })
}

#[cfg(feature = "http")]
fn build_loader(
    cfg: &AppConfig,
    cache: &CalendarCache,
) -> Result<Option<slotcache::LazyLoadManager>, Box<dyn std::error::Error>> {
    let Some(endpoint) = cfg.api_endpoint.as_deref() else {
        return Ok(None);
    };
    let source = slotcache::loader::HttpSource::new(endpoint, cfg.loader.request_timeout())?;
    let loader =
        slotcache::LazyLoadManager::new(Arc::new(source), cache.clone(), cfg.loader.clone())?;
    Ok(Some(loader))
}

#[cfg(not(feature = "http"))]
fn build_loader(
    cfg: &AppConfig,
    _cache: &CalendarCache,
) -> Result<Option<slotcache::LazyLoadManager>, Box<dyn std::error::Error>> {
    if cfg.api_endpoint.is_some() {
        log::warn!("api_endpoint ignored: built without the `http` feature");
    }
    Ok(None)
}

async fn real_main(args: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut cfg = load_config(args.config.as_deref())?;
    if let Some(endpoint) = args.endpoint {
        cfg.api_endpoint = Some(endpoint);
    }
    if let Some(dir) = args.storage_dir {
        cfg.storage_dir = Some(dir);
    }
    init_logging(&cfg);

    let mode = if args.json {
        OutputMode::Json
    } else if args.plain {
        OutputMode::Plain
    } else {
        OutputMode::Human
    };
    let cmd = to_command(args.command)?;
    let ctx = build_context(&cfg)?;
    cli::run(&ctx, cmd, mode).await
}

#[tokio::main]
async fn main() {
    if let Err(e) = real_main(Cli::parse()).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
