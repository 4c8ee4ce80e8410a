use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1.0 for long, -1.0 for short
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// Aggressor side of a trade print. Anything other than "buy"/"sell" lands in `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A single recent trade. Malformed fields degrade to defaults instead of failing the frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradePrint {
    #[serde(default, deserialize_with = "lenient_price")]
    pub price: f64,
    /// Missing or unparseable sizes deserialize to `None` and are dropped by the aggregator
    #[serde(default, deserialize_with = "lenient_number")]
    pub size: Option<f64>,
    #[serde(default, deserialize_with = "lenient_side")]
    pub side: TradeSide,
}

impl TradePrint {
    pub fn new(price: f64, size: f64, side: TradeSide) -> Self {
        Self {
            price,
            size: Some(size),
            side,
        }
    }
}

/// One resting price level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: f64,
    pub size: f64,
}

impl BookLevel {
    pub fn new(price: f64, size: f64) -> Self {
        Self { price, size }
    }
}

/// Order book snapshot. Exchange payloads carry levels as `[price, size, ...]` arrays
/// (numbers or numeric strings); entries that can't be read are skipped at parse time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBook {
    #[serde(default, deserialize_with = "lenient_levels")]
    pub bids: Vec<BookLevel>,
    #[serde(default, deserialize_with = "lenient_levels")]
    pub asks: Vec<BookLevel>,
}

impl OrderBook {
    pub fn new(bids: Vec<BookLevel>, asks: Vec<BookLevel>) -> Self {
        Self { bids, asks }
    }

    pub fn is_two_sided(&self) -> bool {
        !self.bids.is_empty() && !self.asks.is_empty()
    }
}

/// OHLCV candle used by the volatility filter and higher-timeframe bias
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

/// Everything the core needs about one instrument for one evaluation cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub instrument: String,
    pub price: f64,
    #[serde(default)]
    pub order_book: OrderBook,
    #[serde(default, deserialize_with = "lenient_trades")]
    pub trades: Vec<TradePrint>,
    pub captured_at: DateTime<Utc>,
    /// Recent candles on the trading timeframe (optional)
    #[serde(default)]
    pub candles: Vec<Candle>,
    /// Higher-timeframe candles (optional)
    #[serde(default)]
    pub htf_candles: Vec<Candle>,
}

/// Crowd positioning ratios (0..1)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LongShortRatio {
    pub long_ratio: f64,
    pub short_ratio: f64,
}

/// External market-context inputs. Every field is optional; a missing input contributes zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MacroInputs {
    #[serde(default)]
    pub open_interest_change: Option<f64>,
    #[serde(default)]
    pub price_change: Option<f64>,
    #[serde(default)]
    pub long_short: Option<LongShortRatio>,
    #[serde(default)]
    pub liquidations_total: Option<f64>,
    #[serde(default)]
    pub max_pain: Option<f64>,
    #[serde(default)]
    pub etf_net_flow: Option<f64>,
}

/// Inputs supplied by collaborators alongside the snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketContext {
    #[serde(default)]
    pub macro_inputs: MacroInputs,
    /// Recent realized win rate in percent, from the statistics collaborator
    #[serde(default)]
    pub win_rate: Option<f64>,
    /// Closed-trade P&L reported since the previous frame, fed to the capital guard in order
    #[serde(default)]
    pub outcomes: Vec<f64>,
}

/// Trading session (UTC windows by default)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Session {
    Asia,
    London,
    NewYork,
}

impl std::fmt::Display for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Session::Asia => write!(f, "Asia"),
            Session::London => write!(f, "London"),
            Session::NewYork => write!(f, "New York"),
        }
    }
}

/// High-probability time-of-day window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KillZone {
    AsiaRange,
    LondonOpen,
    NewYorkOpen,
}

impl std::fmt::Display for KillZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KillZone::AsiaRange => write!(f, "Asia Range"),
            KillZone::LondonOpen => write!(f, "London Open"),
            KillZone::NewYorkOpen => write!(f, "New York Open"),
        }
    }
}

/// Context flags attached to an emitted signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalTags {
    pub session: Session,
    pub kill_zone: Option<KillZone>,
    pub break_retest: bool,
    pub stop_hunt: bool,
    pub consolidation: bool,
    pub false_breakout: bool,
}

/// Annotated trade recommendation. Built only by the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub id: Uuid,
    pub instrument: String,
    pub direction: Direction,
    pub captured_at: DateTime<Utc>,
    pub price: f64,
    pub entry_low: f64,
    pub entry_high: f64,
    pub stop_loss: f64,
    pub take_profit_1: f64,
    pub take_profit_2: f64,
    pub risk_pct: f64,
    pub score: f64,
    pub delta: f64,
    pub macro_score: f64,
    pub tags: SignalTags,
}

/// Read a JSON number or numeric string as f64
pub(crate) fn number_from_value(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_from_value(&value))
}

fn lenient_price<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(number_from_value(&value).unwrap_or_default())
}

fn lenient_side<'de, D>(deserializer: D) -> Result<TradeSide, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value.as_str() {
        Some("buy") => TradeSide::Buy,
        Some("sell") => TradeSide::Sell,
        _ => TradeSide::Unknown,
    })
}

fn lenient_trades<'de, D>(deserializer: D) -> Result<Vec<TradePrint>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    let total = raw.len();

    let trades: Vec<TradePrint> = raw
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect();

    if trades.len() < total {
        tracing::debug!("Dropped {} malformed trade prints", total - trades.len());
    }

    Ok(trades)
}

fn lenient_levels<'de, D>(deserializer: D) -> Result<Vec<BookLevel>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<Value>::deserialize(deserializer)?;
    let total = raw.len();

    let levels: Vec<BookLevel> = raw
        .iter()
        .filter_map(|entry| {
            let (price, size) = match entry {
                Value::Array(items) if items.len() >= 2 => (&items[0], &items[1]),
                Value::Object(map) => (map.get("price")?, map.get("size")?),
                _ => return None,
            };
            Some(BookLevel::new(number_from_value(price)?, number_from_value(size)?))
        })
        .collect();

    if levels.len() < total {
        tracing::debug!("Dropped {} malformed book levels", total - levels.len());
    }

    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_levels_skip_malformed() {
        let json = r#"{
            "bids": [[100.0, 10.0], ["99.5", "4", 1], [99.0], "junk", [98.0, null]],
            "asks": [{"price": 100.6, "size": 8.0}, [101.0, "abc"]]
        }"#;
        let book: OrderBook = serde_json::from_str(json).unwrap();
        assert_eq!(book.bids, vec![BookLevel::new(100.0, 10.0), BookLevel::new(99.5, 4.0)]);
        assert_eq!(book.asks, vec![BookLevel::new(100.6, 8.0)]);
    }

    #[test]
    fn test_trade_side_defaults_to_unknown() {
        let trades: Vec<TradePrint> = serde_json::from_str(
            r#"[
                {"price": 1.0, "size": 2.0, "side": "buy"},
                {"price": 1.0, "size": "3", "side": "SELL"},
                {"price": 1.0, "size": 1.0},
                {"price": 1.0, "side": "sell"}
            ]"#,
        )
        .unwrap();
        assert_eq!(trades[0].side, TradeSide::Buy);
        assert_eq!(trades[1].side, TradeSide::Unknown);
        assert_eq!(trades[1].size, Some(3.0));
        assert_eq!(trades[2].side, TradeSide::Unknown);
        assert_eq!(trades[3].size, None);
    }

    #[test]
    fn test_malformed_trade_fields_keep_the_frame() {
        let snapshot: MarketSnapshot = serde_json::from_str(
            r#"{
                "instrument": "BTCUSDT",
                "price": 100.0,
                "captured_at": "2025-03-04T08:00:00Z",
                "trades": [
                    {"price": null, "size": 2.0, "side": "buy"},
                    {"price": "abc", "size": 1.0, "side": null},
                    {"price": 100.1, "size": 4.0, "side": 7},
                    {"price": "100.2", "size": 3.0, "side": "sell"},
                    "junk",
                    42
                ]
            }"#,
        )
        .unwrap();

        let trades = &snapshot.trades;
        assert_eq!(trades.len(), 4);
        assert_eq!(trades[0].price, 0.0);
        assert_eq!(trades[0].side, TradeSide::Buy);
        assert_eq!(trades[1].side, TradeSide::Unknown);
        assert_eq!(trades[2].side, TradeSide::Unknown);
        assert_eq!(trades[3].price, 100.2);
        assert_eq!(trades[3].side, TradeSide::Sell);
    }

    #[test]
    fn test_null_trade_list_is_empty() {
        let snapshot: MarketSnapshot = serde_json::from_str(
            r#"{"instrument": "X", "price": 1.0, "captured_at": "2025-03-04T08:00:00Z", "trades": null}"#,
        )
        .unwrap();
        assert!(snapshot.trades.is_empty());
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Long.to_string(), "LONG");
        assert_eq!(Direction::Short.sign(), -1.0);
    }
}
