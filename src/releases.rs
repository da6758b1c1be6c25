pub mod calendar;
pub mod site_check;
pub mod watcher;

/// Release times are published in New Zealand time.
pub const DEFAULT_TZ: &str = "Pacific/Auckland";
