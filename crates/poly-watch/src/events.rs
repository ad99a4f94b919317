//! Wire events received on the monitoring stream.
//!
//! Every JSON frame carries a `type` discriminant; `StreamEvent` is the
//! tagged decoding of the kinds the engine broadcasts. Dispatch is
//! exhaustive over the enum rather than a chain of field probes, so a
//! new kind is a compile-time concern.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::types::{BotName, BotState, ScanSummary};

/// A decoded stream event, keyed by the `type` field of the frame.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Full per-bot snapshot sent by the server right after connecting.
    /// Bots absent from the payload fall back to the default state.
    InitialState {
        #[serde(default)]
        gabagool: Option<BotState>,
        #[serde(default)]
        clipper: Option<BotState>,
        #[serde(default)]
        sniper: Option<BotState>,
        #[serde(default)]
        synth_arb: Option<BotState>,
    },

    /// Wholesale replacement of one bot's state record.
    StateUpdate {
        bot: BotName,
        #[serde(default)]
        timestamp: Option<String>,
        data: BotState,
    },

    /// One executed trade, appended to the combined trade feed.
    Trade {
        bot: BotName,
        #[serde(default)]
        timestamp: Option<String>,
        data: Map<String, Value>,
    },

    /// One evaluated opportunity, appended to the bot's own list.
    Opportunity {
        bot: BotName,
        #[serde(default)]
        timestamp: Option<String>,
        data: Map<String, Value>,
    },

    /// Scan-pass counters, appended to the scan-activity history.
    ScanActivity {
        bot: BotName,
        #[serde(default)]
        timestamp: Option<String>,
        data: ScanSummary,
    },

    /// Per-bot price series tick for charts.
    PriceUpdate {
        bot: BotName,
        #[serde(default)]
        timestamp: Option<String>,
        data: Map<String, Value>,
    },

    /// Any `type` value this client does not model. Ignored after a
    /// diagnostic log entry.
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    /// Returns the event kind for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::InitialState { .. } => "initial_state",
            StreamEvent::StateUpdate { .. } => "state_update",
            StreamEvent::Trade { .. } => "trade",
            StreamEvent::Opportunity { .. } => "opportunity",
            StreamEvent::ScanActivity { .. } => "scan_activity",
            StreamEvent::PriceUpdate { .. } => "price_update",
            StreamEvent::Unknown => "unknown",
        }
    }
}

/// Outcome of decoding one inbound text frame.
#[derive(Debug)]
pub enum DecodedFrame {
    /// A structured event to hand to the projector.
    Event(StreamEvent),
    /// Non-JSON text such as the server's `"pong"` heartbeat reply.
    /// Harmless, dropped without logging.
    Control,
    /// A well-formed frame with a `type` this client does not model.
    /// Carries the discriminant for the diagnostic log entry.
    Unknown(String),
    /// JSON that does not decode as an event. Dropped, but worth a
    /// diagnostic log entry.
    Malformed(serde_json::Error),
}

/// Decode one inbound text frame.
pub fn decode_frame(text: &str) -> DecodedFrame {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => return DecodedFrame::Control,
    };

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string);

    match serde_json::from_value::<StreamEvent>(value) {
        Ok(StreamEvent::Unknown) => {
            DecodedFrame::Unknown(kind.unwrap_or_else(|| "<missing>".to_string()))
        }
        Ok(event) => DecodedFrame::Event(event),
        Err(e) => DecodedFrame::Malformed(e),
    }
}
