// Library surface: the session engine, its ports and adapters.
// The TUI in main.rs only drives what is exported here.
pub mod app_dirs;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod prefs;
pub mod runtime;
pub mod scores;
pub mod session;
pub mod tier;
pub mod time_series;
pub mod util;
