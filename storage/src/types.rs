use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

use crate::error::StorageError;

/// Signal rule family an order subscribes to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RuleType {
    /// Price against a single EMA
    #[serde(rename = "EMA")]
    Ema,
    /// Fast/slow EMA crossover (12/26)
    #[serde(rename = "CDC")]
    Cdc,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Ema => "EMA",
            RuleType::Cdc => "CDC",
        }
    }
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RuleType {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EMA" => Ok(RuleType::Ema),
            "CDC" => Ok(RuleType::Cdc),
            other => Err(StorageError::InvalidParameters(format!(
                "unknown rule type '{}'",
                other
            ))),
        }
    }
}

/// Directional position attributed to an instrument/rule pair
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Position {
    Long,
    Short,
}

impl Position {
    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Long => "Long",
            Position::Short => "Short",
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Key of a position record: `{symbol}/{timeframe}/{ruleType}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionKey {
    pub symbol: String,
    pub timeframe: String,
    pub rule_type: RuleType,
}

impl PositionKey {
    pub fn new(symbol: impl Into<String>, timeframe: impl Into<String>, rule_type: RuleType) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            rule_type,
        }
    }

    /// Storage key string
    pub fn as_key(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for PositionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.symbol, self.timeframe, self.rule_type)
    }
}

impl FromStr for PositionKey {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Symbols and timeframes never contain '/', so split from the right
        let mut parts = s.rsplitn(3, '/');
        let rule = parts.next();
        let timeframe = parts.next();
        let symbol = parts.next();

        match (symbol, timeframe, rule) {
            (Some(symbol), Some(timeframe), Some(rule)) if !symbol.is_empty() && !timeframe.is_empty() => {
                Ok(PositionKey::new(symbol, timeframe, rule.parse()?))
            }
            _ => Err(StorageError::InvalidParameters(format!(
                "malformed position key '{}'",
                s
            ))),
        }
    }
}

/// Persisted position state for one key
///
/// Field names match the JSON already written by deployed instances:
/// `{"symbol":"BTCUSDT","types":"EMA","position":"Long","ema":15}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PositionRecord {
    pub symbol: String,

    #[serde(rename = "types", default, skip_serializing_if = "Option::is_none")]
    pub rule_type: Option<RuleType>,

    #[serde(
        default,
        deserialize_with = "empty_position_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub position: Option<Position>,

    #[serde(rename = "ema", default, skip_serializing_if = "Option::is_none")]
    pub ema_period: Option<u32>,
}

impl PositionRecord {
    /// Fresh record for a never-evaluated key
    pub fn fresh(symbol: impl Into<String>, rule_type: RuleType, ema_period: Option<u32>) -> Self {
        Self {
            symbol: symbol.into(),
            rule_type: Some(rule_type),
            position: None,
            ema_period,
        }
    }

    /// Copy of this record holding a new position
    pub fn with_position(&self, position: Position) -> Self {
        Self {
            position: Some(position),
            ..self.clone()
        }
    }
}

// Older writers stored `"position":""` for "no position yet"
fn empty_position_as_none<'de, D>(deserializer: D) -> Result<Option<Position>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some("Long") => Ok(Some(Position::Long)),
        Some("Short") => Ok(Some(Position::Short)),
        Some(other) => Err(serde::de::Error::unknown_variant(other, &["Long", "Short"])),
    }
}

/// One active (symbol, timeframe, rule) combination from the order catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ActiveRule {
    pub symbol: String,
    #[serde(default)]
    pub ema_period: Option<u32>,
    pub timeframe: String,
    pub rule_type: RuleType,
}

/// Order reference fanned out to the execution queue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderRef {
    #[serde(rename = "orderID")]
    pub order_id: String,
    pub symbol: String,
    pub quantity: i64,
    pub leverage: i64,
    #[serde(rename = "emaPeriod", default, skip_serializing_if = "Option::is_none")]
    pub ema_period: Option<u32>,
    #[serde(rename = "userID")]
    pub user_id: String,
}

/// Row of the order catalog, as configured for the static catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogOrder {
    pub order_id: String,
    pub symbol: String,
    pub quantity: i64,
    #[serde(default = "default_leverage")]
    pub leverage: i64,
    pub timeframe: String,
    pub rule_type: RuleType,
    #[serde(default)]
    pub ema_period: Option<u32>,
    pub user_id: String,
}

fn default_leverage() -> i64 {
    1
}

impl CatalogOrder {
    pub fn active_rule(&self) -> ActiveRule {
        ActiveRule {
            symbol: self.symbol.clone(),
            ema_period: self.ema_period,
            timeframe: self.timeframe.clone(),
            rule_type: self.rule_type,
        }
    }

    pub fn order_ref(&self) -> OrderRef {
        OrderRef {
            order_id: self.order_id.clone(),
            symbol: self.symbol.clone(),
            quantity: self.quantity,
            leverage: self.leverage,
            ema_period: self.ema_period,
            user_id: self.user_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_key_format() {
        let key = PositionKey::new("BTCUSDT", "5m", RuleType::Ema);
        assert_eq!(key.as_key(), "BTCUSDT/5m/EMA");

        let parsed: PositionKey = "ETHUSDT/4h/CDC".parse().unwrap();
        assert_eq!(parsed, PositionKey::new("ETHUSDT", "4h", RuleType::Cdc));

        assert!("BTCUSDT/5m".parse::<PositionKey>().is_err());
        assert!("BTCUSDT/5m/RSI".parse::<PositionKey>().is_err());
    }

    #[test]
    fn test_record_layout() {
        let record = PositionRecord::fresh("BTCUSDT", RuleType::Ema, Some(15));
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"symbol":"BTCUSDT","types":"EMA","ema":15}"#);

        let held = record.with_position(Position::Short);
        let json = serde_json::to_string(&held).unwrap();
        assert_eq!(
            json,
            r#"{"symbol":"BTCUSDT","types":"EMA","position":"Short","ema":15}"#
        );
    }

    #[test]
    fn test_record_reads_legacy_values() {
        assert!(serde_json::from_str::<PositionRecord>(r#"{"symbol":"BTCUSDT","position":"Flat"}"#).is_err());

        let record: PositionRecord =
            serde_json::from_str(r#"{"symbol":"BTCUSDT","position":""}"#).unwrap();
        assert_eq!(record.position, None);
        assert_eq!(record.rule_type, None);

        let record: PositionRecord =
            serde_json::from_str(r#"{"symbol":"BTCUSDT","types":"CDC","position":"Long","extra":1}"#)
                .unwrap();
        assert_eq!(record.position, Some(Position::Long));
        assert_eq!(record.rule_type, Some(RuleType::Cdc));
    }

    #[test]
    fn test_rule_type_parse() {
        assert_eq!("ema".parse::<RuleType>().unwrap(), RuleType::Ema);
        assert_eq!(" CDC ".parse::<RuleType>().unwrap(), RuleType::Cdc);
        assert!("macd".parse::<RuleType>().is_err());
    }

    #[test]
    fn test_order_ref_json() {
        let order = OrderRef {
            order_id: "o-1".to_string(),
            symbol: "BTCUSDT".to_string(),
            quantity: 2,
            leverage: 10,
            ema_period: Some(15),
            user_id: "u-9".to_string(),
        };
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["orderID"], "o-1");
        assert_eq!(json["emaPeriod"], 15);
        assert_eq!(json["userID"], "u-9");
    }
}
