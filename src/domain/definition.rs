//! Strategy definition: the JSON contract written by the strategy builder.
//!
//! A definition owns the entry/exit rule groups plus risk and cost blocks:
//!
//! ```json
//! {
//!   "name": "RSI mean reversion",
//!   "rules": { "entry": { "all": [...] }, "exit": { "any": [...] } },
//!   "risk": {
//!     "positionSizing": { "type": "fixedQuote", "amount": 25 },
//!     "stopLoss": { "type": "percent", "value": 2 },
//!     "takeProfit": { "type": "percent", "value": 4 }
//!   },
//!   "costs": { "feeBps": 10, "slippageBps": 5 }
//! }
//! ```
//!
//! The engine never mutates a definition. [`StrategyDefinition::params`]
//! folds the optional blocks into a fully defaulted [`SimParams`], which is
//! the only shape the simulator and forward evaluator consume.

use serde::{Deserialize, Serialize};

use crate::domain::error::StratlabError;
use crate::domain::indicator::DEFAULT_RSI_LENGTH;
use crate::domain::rule::{Rule, RuleSets};

/// Quote-currency amount committed per entry when no sizing block is given.
pub const DEFAULT_FIXED_QUOTE: f64 = 25.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub rules: RuleSets,
    #[serde(default)]
    pub risk: RiskParams,
    #[serde(default)]
    pub costs: CostParams,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskParams {
    #[serde(rename = "positionSizing", default, skip_serializing_if = "Option::is_none")]
    pub position_sizing: Option<PositionSizing>,
    #[serde(rename = "stopLoss", default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<PercentRule>,
    #[serde(rename = "takeProfit", default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<PercentRule>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionSizing {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

/// Stop-loss / take-profit block. Only `type: "percent"` is recognized;
/// a value of 0 disables the trigger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PercentRule {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostParams {
    #[serde(rename = "feeBps", default, skip_serializing_if = "Option::is_none")]
    pub fee_bps: Option<f64>,
    #[serde(rename = "slippageBps", default, skip_serializing_if = "Option::is_none")]
    pub slippage_bps: Option<f64>,
}

/// Fully defaulted, validated simulation parameters derived from a
/// definition. Rates are fractions (bps / 10000), percents stay percents.
#[derive(Debug, Clone, PartialEq)]
pub struct SimParams {
    pub rsi_length: usize,
    pub fixed_quote: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub fee_rate: f64,
    pub slip_rate: f64,
}

impl StrategyDefinition {
    /// Parse a definition out of a raw JSON value, as received in request
    /// bodies or read back from storage.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, StratlabError> {
        if !value.is_object() {
            return Err(StratlabError::Definition {
                reason: "definition must be a JSON object".into(),
            });
        }
        serde_json::from_value(value.clone()).map_err(|e| StratlabError::Definition {
            reason: e.to_string(),
        })
    }

    pub fn from_json(json: &str) -> Result<Self, StratlabError> {
        serde_json::from_str(json).map_err(|e| StratlabError::Definition {
            reason: e.to_string(),
        })
    }

    pub fn entry_rules(&self) -> &[Rule] {
        &self.rules.entry.all
    }

    pub fn exit_rules(&self) -> &[Rule] {
        &self.rules.exit.any
    }

    /// The RSI period for this strategy: taken from the first RSI rule
    /// (entry rules first, then exit), defaulting to 14. One period per
    /// strategy; every rule evaluates against the same series.
    pub fn rsi_length(&self) -> usize {
        self.rules
            .iter_all()
            .find(|r| r.is_rsi())
            .map(|r| r.effective_length())
            .unwrap_or(DEFAULT_RSI_LENGTH)
    }

    /// Normalize into [`SimParams`], applying the documented defaults and
    /// clamps. A sizing block with a non-positive amount is rejected
    /// rather than silently replaced.
    pub fn params(&self) -> Result<SimParams, StratlabError> {
        let fixed_quote = match &self.risk.position_sizing {
            Some(sizing) if sizing.kind == "fixedQuote" => match sizing.amount {
                Some(amount) if amount > 0.0 => amount,
                Some(amount) => {
                    return Err(StratlabError::Definition {
                        reason: format!("positionSizing.amount must be positive, got {amount}"),
                    });
                }
                None => DEFAULT_FIXED_QUOTE,
            },
            _ => DEFAULT_FIXED_QUOTE,
        };

        let stop_loss_pct = percent_or_zero(&self.risk.stop_loss);
        let take_profit_pct = percent_or_zero(&self.risk.take_profit);

        let fee_rate = self.costs.fee_bps.unwrap_or(0.0).max(0.0) / 10_000.0;
        let slip_rate = self.costs.slippage_bps.unwrap_or(0.0).max(0.0) / 10_000.0;

        Ok(SimParams {
            rsi_length: self.rsi_length(),
            fixed_quote,
            stop_loss_pct,
            take_profit_pct,
            fee_rate,
            slip_rate,
        })
    }
}

fn percent_or_zero(block: &Option<PercentRule>) -> f64 {
    match block {
        Some(rule) if rule.kind == "percent" => rule.value.unwrap_or(0.0).max(0.0),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn builder_definition() -> serde_json::Value {
        json!({
            "name": "RSI mean reversion",
            "rules": {
                "entry": { "all": [
                    { "type": "indicator", "name": "RSI", "length": 14, "source": "close", "op": "<", "value": 30 }
                ]},
                "exit": { "any": [
                    { "type": "indicator", "name": "RSI", "length": 14, "source": "close", "op": ">", "value": 70 }
                ]}
            },
            "risk": {
                "positionSizing": { "type": "fixedQuote", "amount": 25 },
                "stopLoss": { "type": "percent", "value": 2.0 },
                "takeProfit": { "type": "percent", "value": 4.0 }
            },
            "costs": { "feeBps": 10, "slippageBps": 5 }
        })
    }

    #[test]
    fn parses_builder_template() {
        let def = StrategyDefinition::from_value(&builder_definition()).unwrap();
        assert_eq!(def.name.as_deref(), Some("RSI mean reversion"));
        assert_eq!(def.entry_rules().len(), 1);
        assert_eq!(def.exit_rules().len(), 1);

        let params = def.params().unwrap();
        assert_eq!(params.rsi_length, 14);
        assert!((params.fixed_quote - 25.0).abs() < f64::EPSILON);
        assert!((params.stop_loss_pct - 2.0).abs() < f64::EPSILON);
        assert!((params.take_profit_pct - 4.0).abs() < f64::EPSILON);
        assert!((params.fee_rate - 0.001).abs() < 1e-12);
        assert!((params.slip_rate - 0.0005).abs() < 1e-12);
    }

    #[test]
    fn empty_definition_gets_defaults() {
        let def = StrategyDefinition::from_value(&json!({})).unwrap();
        let params = def.params().unwrap();
        assert_eq!(params.rsi_length, 14);
        assert!((params.fixed_quote - DEFAULT_FIXED_QUOTE).abs() < f64::EPSILON);
        assert_eq!(params.stop_loss_pct, 0.0);
        assert_eq!(params.take_profit_pct, 0.0);
        assert_eq!(params.fee_rate, 0.0);
        assert_eq!(params.slip_rate, 0.0);
    }

    #[test]
    fn non_object_definition_is_rejected() {
        assert!(StrategyDefinition::from_value(&json!("not an object")).is_err());
        assert!(StrategyDefinition::from_value(&json!(42)).is_err());
        assert!(StrategyDefinition::from_value(&json!(null)).is_err());
    }

    #[test]
    fn non_positive_amount_is_rejected() {
        let def = StrategyDefinition::from_value(&json!({
            "risk": { "positionSizing": { "type": "fixedQuote", "amount": 0.0 } }
        }))
        .unwrap();
        assert!(def.params().is_err());

        let def = StrategyDefinition::from_value(&json!({
            "risk": { "positionSizing": { "type": "fixedQuote", "amount": -10.0 } }
        }))
        .unwrap();
        assert!(def.params().is_err());
    }

    #[test]
    fn unrecognized_sizing_type_falls_back_to_default() {
        let def = StrategyDefinition::from_value(&json!({
            "risk": { "positionSizing": { "type": "percentEquity", "amount": 50.0 } }
        }))
        .unwrap();
        let params = def.params().unwrap();
        assert!((params.fixed_quote - DEFAULT_FIXED_QUOTE).abs() < f64::EPSILON);
    }

    #[test]
    fn negative_costs_clamp_to_zero() {
        let def = StrategyDefinition::from_value(&json!({
            "costs": { "feeBps": -10, "slippageBps": -5 },
            "risk": { "stopLoss": { "type": "percent", "value": -3.0 } }
        }))
        .unwrap();
        let params = def.params().unwrap();
        assert_eq!(params.fee_rate, 0.0);
        assert_eq!(params.slip_rate, 0.0);
        assert_eq!(params.stop_loss_pct, 0.0);
    }

    #[test]
    fn rsi_length_from_first_rsi_rule() {
        let def = StrategyDefinition::from_value(&json!({
            "rules": {
                "entry": { "all": [
                    { "type": "price", "name": "close", "op": ">", "value": 0 },
                    { "type": "indicator", "name": "RSI", "length": 7, "op": "<", "value": 30 }
                ]},
                "exit": { "any": [
                    { "type": "indicator", "name": "RSI", "length": 21, "op": ">", "value": 70 }
                ]}
            }
        }))
        .unwrap();
        // entry rules are scanned before exit rules
        assert_eq!(def.rsi_length(), 7);
    }

    #[test]
    fn rsi_length_falls_back_to_exit_rules() {
        let def = StrategyDefinition::from_value(&json!({
            "rules": { "exit": { "any": [
                { "type": "indicator", "name": "RSI", "length": 21, "op": ">", "value": 70 }
            ]}}
        }))
        .unwrap();
        assert_eq!(def.rsi_length(), 21);
    }

    #[test]
    fn definition_round_trips_through_json() {
        let def = StrategyDefinition::from_value(&builder_definition()).unwrap();
        let json = serde_json::to_string(&def).unwrap();
        let back = StrategyDefinition::from_json(&json).unwrap();
        assert_eq!(back.params().unwrap(), def.params().unwrap());
    }
}
