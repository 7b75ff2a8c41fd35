//! CLI domain: parse, route, output, and presentation only.
//! Queue behavior lives in the engine; routes stay thin.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::{exit_code, map_error};
pub use parse::{Cli, Commands, FilterArgs};
pub use presentation::{
    format_config, format_dispatch_json, format_dispatch_text, format_listing_json,
    format_listing_text, format_record_text, QueueListing,
};
pub use route::{load_config, run, RunContext};
