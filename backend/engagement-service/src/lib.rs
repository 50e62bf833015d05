/// Engagement Service Library
///
/// The content engagement and view-analytics subsystem for the Haven
/// content/community platform. Owns likes, deduplicated view events,
/// playback sessions, and the denormalized counters on content records,
/// and fans counter deltas out to live websocket subscribers.
///
/// # Modules
///
/// - `handlers`: HTTP request handlers for the engagement endpoints
/// - `models`: Row types and engagement vocabulary
/// - `services`: Like engine, view dedup engine, playback state machine,
///   counter cache
/// - `db`: sqlx repositories; all uniqueness guards live here
/// - `ws`: fan-out registry and websocket feed
/// - `middleware`: bearer-token identity extraction
/// - `workers`: background cache reconciliation
/// - `error`: Error types and HTTP mapping
/// - `config`: Configuration management
/// - `metrics`: Prometheus counters
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;
pub mod workers;
pub mod ws;

pub use config::Config;
pub use error::{AppError, Result};
