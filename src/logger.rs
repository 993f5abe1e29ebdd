//! log4rs setup. Library code only uses the `log` facade; binaries and
//! embedding applications pick one of these initializers.
//!
//! Targets routed to their own files:
//! - `slotcache::metrics`: cache evictions and purges
//! - `slotcache::requests`: source calls, retries and failures

use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;

#[must_use]
pub fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(
    base: &Path,
    name: &str,
    keep: u32,
) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", base.join(format!("{name}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{name}.log")), Box::new(policy))?)
}

/// Configure file logging for the process.
/// - dir: base directory for logs; if None, current directory.
/// - level: off|error|warn|info|debug|trace
/// - retention: number of rolled files to keep (default 7)
///
/// # Errors
/// Returns an error if the directory or appenders cannot be created, or a
/// logger is already installed.
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let base = dir
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    std::fs::create_dir_all(&base)?;
    let keep = u32::try_from(retention.unwrap_or(7)).unwrap_or(u32::MAX);
    let lvl = parse_level(level);

    let config = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "app", keep)?)))
        .appender(Appender::builder().build("metrics", Box::new(rolling(&base, "metrics", keep)?)))
        .appender(Appender::builder().build("requests", Box::new(rolling(&base, "requests", keep)?)))
        .logger(Logger::builder().appender("metrics").additive(false).build("slotcache::metrics", lvl))
        .logger(
            Logger::builder().appender("requests").additive(false).build("slotcache::requests", lvl),
        )
        .build(Root::builder().appender("app").build(lvl))?;
    log4rs::init_config(config)?;
    Ok(())
}

/// Log to stderr only; used by the CLI when no log directory is configured.
///
/// # Errors
/// Returns an error if a logger is already installed.
pub fn init_console(level: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("[{l}] {t} - {m}{n}")))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(parse_level(level)))?;
    log4rs::init_config(config)?;
    Ok(())
}

/// Configure logging from environment variables if present:
/// - SLOTCACHE_LOG_DIR
/// - SLOTCACHE_LOG_LEVEL
/// - SLOTCACHE_LOG_RETENTION
///
/// # Errors
/// See [`configure_logging`].
pub fn configure_from_env() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::var("SLOTCACHE_LOG_DIR").ok().map(PathBuf::from);
    let level = std::env::var("SLOTCACHE_LOG_LEVEL").ok();
    let retention =
        std::env::var("SLOTCACHE_LOG_RETENTION").ok().and_then(|s| s.parse::<usize>().ok());
    configure_logging(dir.as_deref(), level.as_deref(), retention)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parsing_defaults_to_info() {
        assert_eq!(parse_level(None), LevelFilter::Info);
        assert_eq!(parse_level(Some("DEBUG")), LevelFilter::Debug);
        assert_eq!(parse_level(Some("verbose")), LevelFilter::Info);
    }
}
