//! Spreadwatch core crate.
//!
//! A small dashboard over the JSON documents produced by an external spread
//! scanner: a fixed-interval poller holds the latest snapshot in memory, and
//! an HTTP layer renders it as a tabbed HTML table with a last-update stamp
//! and a cosmetic scanner-status indicator.

mod dashboard;
mod observability;
mod poller;
mod spreads;

pub use dashboard::{
    build_tab_snapshot, dashboard_router, demo_snapshot, render_dashboard_html, render_table_body,
    DashboardQuery, TabSnapshot, DASHBOARD_HEADERS, PAGE_REFRESH_MS,
};
pub use observability::{
    init_logging, log_app_bind, log_app_start, log_source_selected, logging_config_from_env,
    LogFormat, LoggingConfig, LoggingInitError,
};
pub use poller::{
    apply_poll_outcome, poll_once_with, FetchError, InMemorySpreadSource, PollerConfig,
    PollingSpreadSource, SharedSpreadState, SpreadSnapshot, SpreadSource,
};
pub use spreads::{
    Price, ScannerStatus, SpreadDocument, SpreadRecord, DEFAULT_TAB, MAX_DISPLAY_SPREAD_PCT,
};
