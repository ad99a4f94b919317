//! Shared types for the bot monitoring client.
//!
//! CRITICAL: All cash and valuation figures use `rust_decimal::Decimal`.
//! NEVER use f64 for financial values.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The monitored trading strategies.
///
/// The set is fixed: the engine runs exactly these four bots and the
/// wire protocol identifies them by their snake_case names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotName {
    Gabagool,
    Clipper,
    Sniper,
    SynthArb,
}

impl BotName {
    /// All monitored bots, in display order.
    pub const ALL: [BotName; 4] = [
        BotName::Gabagool,
        BotName::Clipper,
        BotName::Sniper,
        BotName::SynthArb,
    ];

    /// Returns the wire name used in the `bot` field of stream events.
    pub fn as_str(&self) -> &'static str {
        match self {
            BotName::Gabagool => "gabagool",
            BotName::Clipper => "clipper",
            BotName::Sniper => "sniper",
            BotName::SynthArb => "synth_arb",
        }
    }
}

impl std::fmt::Display for BotName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BotName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gabagool" => Ok(BotName::Gabagool),
            "clipper" => Ok(BotName::Clipper),
            "sniper" => Ok(BotName::Sniper),
            "synth_arb" => Ok(BotName::SynthArb),
            other => Err(format!("unknown bot name: {other}")),
        }
    }
}

/// Operational status reported by a bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotStatus {
    Running,
    #[default]
    Stopped,
    Error,
    Disconnected,
    /// Catch-all for statuses this client does not model (the synth-arb
    /// engine reports "unknown" before its first state publish).
    #[serde(other)]
    Unknown,
}

impl BotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotStatus::Running => "running",
            BotStatus::Stopped => "stopped",
            BotStatus::Error => "error",
            BotStatus::Disconnected => "disconnected",
            BotStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for BotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Full state record for one bot.
///
/// Records are replaced wholesale when a snapshot or state update names
/// the bot — a field the server omits resets to its default rather than
/// retaining the previous value. The field set is the union of what the
/// per-bot engines publish; bots that do not report a field leave it at
/// the default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotState {
    pub status: BotStatus,
    pub cash: Decimal,
    pub positions_value: Decimal,
    pub total_exposure: Decimal,
    pub total_value: Decimal,
    pub realized_pnl: Decimal,
    /// Currently open positions. Shapes differ per bot, so entries stay
    /// as raw JSON objects for display.
    #[serde(alias = "active_positions", alias = "positions")]
    pub open_positions: Vec<serde_json::Value>,
    /// Recent trades as reported by the bot itself (already capped
    /// server-side; distinct from the combined client-side trade feed).
    pub recent_trades: Vec<serde_json::Value>,
    pub scan_count: u64,
    pub markets_scanned: u64,
}

/// One entry in the combined trade feed.
///
/// The trade payload is kept as-is and flattened next to the bot tag
/// and effective timestamp, matching what the rendering layer displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEntry {
    pub bot: BotName,
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// One entry in a bot's opportunities list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityRecord {
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

/// Scan counters broadcast by the sniper bot after each scan pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSummary {
    pub scan_number: u64,
    pub leagues_checked: u64,
    pub games_found: u64,
    pub markets_searched: u64,
    pub opportunities_evaluated: u64,
    pub opportunities_taken: u64,
    pub opportunities_skipped: u64,
}

/// One entry in the scan-activity history.
///
/// Stamped with the client's receipt time, not a server-provided time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanActivityRecord {
    pub received_at: chrono::DateTime<chrono::Utc>,
    #[serde(flatten)]
    pub summary: ScanSummary,
}

/// One entry in a bot's price history (chart feed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub prices: serde_json::Map<String, serde_json::Value>,
}
