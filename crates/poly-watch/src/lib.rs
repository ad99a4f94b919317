//! Real-time monitoring client for the Polymarket trading bots.
//!
//! Connects to the engine's WebSocket endpoint with a bearer token and
//! folds the event stream (snapshots, per-bot state updates, trades,
//! opportunities, scan activity) into a bounded in-memory model for a
//! dashboard to display.
//!
//! ## Modules
//!
//! - `config`: TOML/env/CLI configuration and stream URL derivation
//! - `auth`: session credential boundary
//! - `events`: wire event types and frame decoding
//! - `state`: the shared monitor store and event projection
//! - `stream`: connection lifecycle, heartbeat, reconnection
//! - `types`: bot identity and state records

pub mod auth;
pub mod config;
pub mod events;
pub mod state;
pub mod stream;
pub mod types;

pub use auth::{CredentialStore, MemoryCredentialStore};
pub use config::WatchConfig;
pub use events::{decode_frame, DecodedFrame, StreamEvent};
pub use state::{
    BotPanel, MonitorSnapshot, MonitorState, OPPORTUNITY_CAP, PRICE_HISTORY_CAP, SCAN_HISTORY_CAP,
    TRADE_FEED_CAP,
};
pub use stream::{StreamClient, StreamError, AUTH_FAILURE_CLOSE_CODE};
pub use types::{
    BotName, BotState, BotStatus, OpportunityRecord, PricePoint, ScanActivityRecord, ScanSummary,
    TradeEntry,
};
