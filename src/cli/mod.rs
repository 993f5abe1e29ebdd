mod command;
mod runner;
mod util;

pub use command::Command;
pub use runner::{Context, OutputMode, run, run_to};
pub use util::parse_filter;
