use serde::{Deserialize, Serialize};
use std::fmt;

use sg_storage::{Position, PositionKey, RuleType};

use crate::rules::SignalRule;

/// Direction computed for one unit on one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    Long,
    Short,
    /// No actionable direction this tick
    Neutral,
}

impl Signal {
    /// Position this signal points to, if any
    pub fn position(&self) -> Option<Position> {
        match self {
            Signal::Long => Some(Position::Long),
            Signal::Short => Some(Position::Short),
            Signal::Neutral => None,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Long => write!(f, "Long"),
            Signal::Short => write!(f, "Short"),
            Signal::Neutral => write!(f, "Neutral"),
        }
    }
}

/// One (symbol, timeframe, rule) combination evaluated per tick
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EvaluationUnit {
    pub symbol: String,
    pub timeframe: String,
    pub rule: SignalRule,
}

impl EvaluationUnit {
    pub fn new(symbol: impl Into<String>, timeframe: impl Into<String>, rule: SignalRule) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            rule,
        }
    }

    pub fn rule_type(&self) -> RuleType {
        self.rule.rule_type()
    }

    /// Position store key; the EMA period is not part of it
    pub fn key(&self) -> PositionKey {
        PositionKey::new(&self.symbol, &self.timeframe, self.rule_type())
    }

    /// Notification text, e.g. `EMA Short/BTCUSDT (5m)`
    pub fn headline(&self, position: Position) -> String {
        format!(
            "{} {}/{} ({})",
            self.rule_type(),
            position,
            self.symbol,
            self.timeframe
        )
    }
}

impl fmt::Display for EvaluationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.symbol, self.timeframe, self.rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headline() {
        let unit = EvaluationUnit::new("BTCUSDT", "5m", SignalRule::Ema { period: 15 });
        assert_eq!(unit.headline(Position::Short), "EMA Short/BTCUSDT (5m)");

        let unit = EvaluationUnit::new("ETHUSDT", "4h", SignalRule::Cdc);
        assert_eq!(unit.headline(Position::Long), "CDC Long/ETHUSDT (4h)");
    }

    #[test]
    fn test_key_ignores_period() {
        let a = EvaluationUnit::new("BTCUSDT", "5m", SignalRule::Ema { period: 15 });
        let b = EvaluationUnit::new("BTCUSDT", "5m", SignalRule::Ema { period: 50 });
        assert_ne!(a, b);
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key().as_key(), "BTCUSDT/5m/EMA");
    }

    #[test]
    fn test_signal_position() {
        assert_eq!(Signal::Long.position(), Some(Position::Long));
        assert_eq!(Signal::Short.position(), Some(Position::Short));
        assert_eq!(Signal::Neutral.position(), None);
    }
}
