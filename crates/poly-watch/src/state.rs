//! Canonical in-memory model of the monitored bots.
//!
//! `MonitorState` is the single store the stream session writes into and
//! the rendering boundary reads from. There is exactly one writer (the
//! session loop applies events in receipt order); readers take cheap
//! clones through the accessors or a full `MonitorSnapshot`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::events::StreamEvent;
use crate::types::{
    BotName, BotState, OpportunityRecord, PricePoint, ScanActivityRecord, TradeEntry,
};

/// Cap on the combined trade feed.
pub const TRADE_FEED_CAP: usize = 100;
/// Cap on the scan-activity history.
pub const SCAN_HISTORY_CAP: usize = 50;
/// Cap on each bot's opportunities list.
pub const OPPORTUNITY_CAP: usize = 50;
/// Cap on each bot's price history.
pub const PRICE_HISTORY_CAP: usize = 100;

/// Shared monitor store.
///
/// Per-bot records live in `DashMap`s and the shared feeds behind
/// `parking_lot` locks, so readers on other tasks never block the
/// session loop for long. All buffers insert at the head and evict
/// from the tail, keeping newest-first order within their cap.
#[derive(Debug)]
pub struct MonitorState {
    connected: AtomicBool,
    scan_feed_bot: BotName,
    bots: DashMap<BotName, BotState>,
    opportunities: DashMap<BotName, VecDeque<OpportunityRecord>>,
    price_history: DashMap<BotName, VecDeque<PricePoint>>,
    trade_feed: RwLock<VecDeque<TradeEntry>>,
    scan_history: RwLock<VecDeque<ScanActivityRecord>>,
}

impl MonitorState {
    /// Create a store with every bot at the documented default state
    /// (stopped, zero cash, empty lists).
    ///
    /// `scan_feed_bot` designates the one bot whose scan activity is
    /// accepted into the shared history.
    pub fn new(scan_feed_bot: BotName) -> Self {
        let bots = DashMap::new();
        let opportunities = DashMap::new();
        let price_history = DashMap::new();
        for bot in BotName::ALL {
            bots.insert(bot, BotState::default());
            opportunities.insert(bot, VecDeque::new());
            price_history.insert(bot, VecDeque::new());
        }

        Self {
            connected: AtomicBool::new(false),
            scan_feed_bot,
            bots,
            opportunities,
            price_history,
            trade_feed: RwLock::new(VecDeque::new()),
            scan_history: RwLock::new(VecDeque::new()),
        }
    }

    /// Flip the connectivity indicator.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    /// Current connectivity indicator.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Apply one decoded event to the model.
    ///
    /// Events are folded in strict receipt order; the caller is the
    /// single session loop, so no cross-event reordering can occur.
    pub fn apply(&self, event: StreamEvent) {
        match event {
            StreamEvent::InitialState {
                gabagool,
                clipper,
                sniper,
                synth_arb,
            } => {
                self.bots
                    .insert(BotName::Gabagool, gabagool.unwrap_or_default());
                self.bots
                    .insert(BotName::Clipper, clipper.unwrap_or_default());
                self.bots.insert(BotName::Sniper, sniper.unwrap_or_default());
                self.bots
                    .insert(BotName::SynthArb, synth_arb.unwrap_or_default());
                debug!("applied initial snapshot");
            }

            StreamEvent::StateUpdate { bot, data, .. } => {
                // Whole-record replacement, never a field merge.
                self.bots.insert(bot, data);
            }

            StreamEvent::Trade {
                bot,
                timestamp,
                data,
            } => {
                let timestamp = effective_timestamp(timestamp, &data);
                let mut feed = self.trade_feed.write();
                push_capped(
                    &mut feed,
                    TradeEntry {
                        bot,
                        timestamp,
                        details: data,
                    },
                    TRADE_FEED_CAP,
                );
            }

            StreamEvent::Opportunity {
                bot,
                timestamp,
                data,
            } => {
                let mut list = self.opportunities.entry(bot).or_default();
                push_capped(
                    &mut list,
                    OpportunityRecord {
                        timestamp,
                        details: data,
                    },
                    OPPORTUNITY_CAP,
                );
            }

            StreamEvent::ScanActivity { bot, data, .. } => {
                if bot != self.scan_feed_bot {
                    debug!(bot = %bot, "dropping scan activity for non-designated bot");
                    return;
                }
                let mut history = self.scan_history.write();
                push_capped(
                    &mut history,
                    ScanActivityRecord {
                        received_at: Utc::now(),
                        summary: data,
                    },
                    SCAN_HISTORY_CAP,
                );
            }

            StreamEvent::PriceUpdate {
                bot,
                timestamp,
                data,
            } => {
                let mut history = self.price_history.entry(bot).or_default();
                push_capped(
                    &mut history,
                    PricePoint {
                        timestamp,
                        prices: data,
                    },
                    PRICE_HISTORY_CAP,
                );
            }

            // Unknown kinds are filtered out during frame decoding; an
            // event reaching here anyway is still a no-op.
            StreamEvent::Unknown => {
                warn!("ignoring unknown event kind");
            }
        }
    }

    /// Current state record for one bot.
    pub fn bot_state(&self, bot: BotName) -> BotState {
        self.bots.get(&bot).map(|s| s.clone()).unwrap_or_default()
    }

    /// Combined trade feed, newest first.
    pub fn trade_feed(&self) -> Vec<TradeEntry> {
        self.trade_feed.read().iter().cloned().collect()
    }

    /// Scan-activity history, newest first.
    pub fn scan_history(&self) -> Vec<ScanActivityRecord> {
        self.scan_history.read().iter().cloned().collect()
    }

    /// One bot's opportunities list, newest first.
    pub fn opportunities(&self, bot: BotName) -> Vec<OpportunityRecord> {
        self.opportunities
            .get(&bot)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// One bot's price history, newest first.
    pub fn price_history(&self, bot: BotName) -> Vec<PricePoint> {
        self.price_history
            .get(&bot)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Aggregate everything into one serializable snapshot for the
    /// rendering boundary.
    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            generated_at: Utc::now(),
            connected: self.is_connected(),
            bots: BotName::ALL
                .into_iter()
                .map(|bot| BotPanel {
                    name: bot,
                    state: self.bot_state(bot),
                    opportunities: self.opportunities(bot),
                    price_history: self.price_history(bot),
                })
                .collect(),
            trade_feed: self.trade_feed(),
            scan_history: self.scan_history(),
        }
    }
}

/// Everything the rendering boundary needs, in one JSON-friendly value.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub generated_at: DateTime<Utc>,
    pub connected: bool,
    pub bots: Vec<BotPanel>,
    pub trade_feed: Vec<TradeEntry>,
    pub scan_history: Vec<ScanActivityRecord>,
}

/// Per-bot section of the snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct BotPanel {
    pub name: BotName,
    pub state: BotState,
    pub opportunities: Vec<OpportunityRecord>,
    pub price_history: Vec<PricePoint>,
}

/// Head insert with tail eviction.
fn push_capped<T>(buffer: &mut VecDeque<T>, entry: T, cap: usize) {
    buffer.push_front(entry);
    buffer.truncate(cap);
}

/// Top-level event timestamp, falling back to a `timestamp` field
/// embedded in the payload.
fn effective_timestamp(timestamp: Option<String>, data: &Map<String, Value>) -> Option<String> {
    timestamp.or_else(|| {
        data.get("timestamp")
            .and_then(Value::as_str)
            .map(str::to_string)
    })
}
