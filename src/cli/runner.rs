use crate::cache::CalendarCache;
use crate::errors::CalendarError;
use crate::loader::LazyLoadManager;
use crate::types::Priority;
use crate::virtual_scroll::{Appointment, SlotGrid, VirtualList, build_day_items};
use serde_json::Value;
use std::io::Write;

use super::command::Command;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputMode {
    Human,
    Plain,
    Json,
}

/// What commands run against. `loader` is `None` when no endpoint is configured.
pub struct Context {
    pub cache: CalendarCache,
    pub loader: Option<LazyLoadManager>,
}

/// Runs `cmd`, printing to stdout.
///
/// # Errors
/// Propagates command failures.
pub async fn run(
    ctx: &Context,
    cmd: Command,
    mode: OutputMode,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut out = std::io::stdout();
    run_to(ctx, cmd, mode, &mut out).await
}

/// Runs `cmd`, printing to `out`.
///
/// # Errors
/// Propagates command failures.
pub async fn run_to<W: Write>(
    ctx: &Context,
    cmd: Command,
    mode: OutputMode,
    out: &mut W,
) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        Command::Fetch { request, prefetch } => {
            request.validate()?;
            // The loader answers from the cache itself; one lookup per fetch.
            let value = match &ctx.loader {
                Some(loader) => loader.queue_request(&request, Priority::High).await?,
                None => ctx.cache.get::<Value>(&request).ok_or_else(|| {
                    CalendarError::Config("not cached and no api_endpoint configured".into())
                })?,
            };
            if prefetch {
                if let Some(loader) = &ctx.loader {
                    loader.prefetch(&request);
                    loader.wait_idle().await;
                }
            }
            match mode {
                OutputMode::Human => writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?,
                OutputMode::Plain | OutputMode::Json => writeln!(out, "{value}")?,
            }
            Ok(())
        }
        Command::Window { appointments, date, scroll_top, height, overscan, slot_minutes } => {
            let raw = std::fs::read_to_string(&appointments)
                .map_err(|e| CalendarError::Io(format!("{}: {e}", appointments.display())))?;
            let appts: Vec<Appointment> = serde_json::from_str(&raw)?;
            let grid = SlotGrid { slot_minutes: slot_minutes.max(1), ..SlotGrid::default() };
            let list = VirtualList::new(build_day_items(date, &appts, &grid));
            let range = list.window(scroll_top, height, overscan);
            let rows = list.positioned(&range);
            match mode {
                OutputMode::Json => {
                    let json = serde_json::json!({ "range": range, "items": rows });
                    writeln!(out, "{json}")?;
                }
                OutputMode::Plain => {
                    for row in &rows {
                        writeln!(out, "{}\t{}\t{}", row.item.index, row.top, row.item.id)?;
                    }
                }
                OutputMode::Human => {
                    writeln!(
                        out,
                        "rendering {}..{} of {} rows (total height {}px)",
                        range.start,
                        range.end,
                        list.len(),
                        range.total_height
                    )?;
                    for row in &rows {
                        writeln!(
                            out,
                            "{:>4} top={:<8} h={:<6} {:?} {}",
                            row.item.index, row.top, row.item.height, row.item.kind, row.item.id
                        )?;
                    }
                }
            }
            Ok(())
        }
        Command::Stats => {
            let stats = ctx.cache.stats();
            match mode {
                OutputMode::Json => writeln!(out, "{}", serde_json::to_string(&stats)?)?,
                OutputMode::Plain => writeln!(
                    out,
                    "entries={} bytes={} hits={} misses={} evictions={}",
                    stats.entries,
                    stats.total_bytes,
                    stats.counters.hits,
                    stats.counters.misses,
                    stats.counters.evictions
                )?,
                OutputMode::Human => writeln!(out, "{}", serde_json::to_string_pretty(&stats)?)?,
            }
            if let Some(loader) = &ctx.loader {
                let ls = loader.stats();
                match mode {
                    OutputMode::Json => writeln!(out, "{}", serde_json::to_string(&ls)?)?,
                    _ => writeln!(
                        out,
                        "loader completed={} failed={} retries={} deduplicated={}",
                        ls.completed, ls.failed, ls.retries, ls.deduplicated
                    )?,
                }
            }
            Ok(())
        }
        Command::Keys => {
            let keys = ctx.cache.keys();
            match mode {
                OutputMode::Json => writeln!(out, "{}", serde_json::to_string(&keys)?)?,
                _ => {
                    for k in keys {
                        writeln!(out, "{k}")?;
                    }
                }
            }
            Ok(())
        }
        Command::Clear => {
            let n = ctx.cache.len();
            ctx.cache.clear();
            report_count(out, mode, "cleared", n)
        }
        Command::Purge => {
            let n = ctx.cache.purge_expired();
            report_count(out, mode, "purged", n)
        }
        Command::Invalidate { start, end } => {
            let n = ctx.cache.invalidate_overlapping(start, end);
            report_count(out, mode, "invalidated", n)
        }
    }
}

fn report_count<W: Write>(
    out: &mut W,
    mode: OutputMode,
    action: &str,
    n: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    match mode {
        OutputMode::Json => writeln!(out, "{}", serde_json::json!({ "action": action, "count": n }))?,
        OutputMode::Plain => writeln!(out, "{action} {n}")?,
        OutputMode::Human => writeln!(out, "{action} {n} entries")?,
    }
    Ok(())
}
