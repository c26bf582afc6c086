use crate::portfolio::PortfolioId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One entry of `GET /portfolio-history`.
///
/// Portfolios that did not exist on `date` are simply missing from
/// `portfolios`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioHistoryDay {
    pub date: NaiveDate,
    #[serde(default)]
    pub portfolios: Vec<PortfolioSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub id: PortfolioId,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub realized_gain: Option<f64>,
}

impl PortfolioSnapshot {
    pub fn value(&self) -> f64 {
        self.value.unwrap_or(0.0)
    }

    pub fn cost(&self) -> f64 {
        self.cost.unwrap_or(0.0)
    }

    pub fn realized(&self) -> f64 {
        self.realized_gain.filter(|v| v.is_finite()).unwrap_or(0.0)
    }

    /// `value - cost`, 0 when either side is missing or the difference is
    /// not a number.
    pub fn unrealized(&self) -> f64 {
        match (self.value, self.cost) {
            (Some(value), Some(cost)) if !(value - cost).is_nan() => value - cost,
            _ => 0.0,
        }
    }
}

impl PortfolioHistoryDay {
    pub fn snapshot(&self, id: &PortfolioId) -> Option<&PortfolioSnapshot> {
        self.portfolios.iter().find(|s| &s.id == id)
    }
}
