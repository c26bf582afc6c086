//! Portfolio-wide totals and overall performance.

use crate::portfolio::Portfolio;

/// Field-wise sums over a set of portfolios.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub total_value: f64,
    pub total_cost: f64,
    pub total_unrealized_gain_loss: f64,
    pub total_realized_gain_loss: f64,
    pub total_gain_loss: f64,
}

impl Totals {
    pub fn from_portfolios(portfolios: &[Portfolio]) -> Totals {
        portfolios.iter().fold(Totals::default(), |acc, p| Totals {
            total_value: acc.total_value + p.total_value,
            total_cost: acc.total_cost + p.total_cost,
            total_unrealized_gain_loss: acc.total_unrealized_gain_loss
                + p.total_unrealized_gain_loss,
            total_realized_gain_loss: acc.total_realized_gain_loss + p.total_realized_gain_loss,
            total_gain_loss: acc.total_gain_loss + p.total_gain_loss,
        })
    }

    /// Combined realized and unrealized gain, as reported by the backend.
    pub fn gain(&self) -> f64 {
        self.total_gain_loss
    }

    /// `((value / (cost + realized)) - 1) * 100`.
    ///
    /// `None` when the cost basis is zero, negative or not finite: there is
    /// no meaningful percentage to show in that case.
    pub fn performance(&self) -> Option<f64> {
        let basis = self.total_cost + self.total_realized_gain_loss;
        if !basis.is_finite() || basis <= 0.0 {
            return None;
        }
        let pct = (self.total_value / basis - 1.0) * 100.0;
        pct.is_finite().then_some(pct)
    }

    /// Performance rounded to two decimals, `"-"` when undefined.
    pub fn performance_label(&self) -> String {
        self.performance()
            .map(|p| format!("{p:.2}"))
            .unwrap_or_else(|| "-".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::sample;

    #[test]
    fn single_portfolio_performance() {
        let totals = Totals::from_portfolios(&[sample("1", "A", 150.0, 100.0, 0.0)]);
        assert_eq!(totals.performance_label(), "50.00");
    }

    #[test]
    fn sums_are_order_independent() {
        let a = sample("1", "A", 120.5, 100.0, 3.0);
        let b = sample("2", "B", 80.25, 90.0, -1.5);
        let c = sample("3", "C", 10.0, 5.0, 0.0);
        let forward = Totals::from_portfolios(&[a.clone(), b.clone(), c.clone()]);
        let backward = Totals::from_portfolios(&[c, b, a]);
        assert_eq!(forward.total_value, 210.75);
        assert_eq!(forward.total_cost, 195.0);
        assert_eq!(forward.total_value, backward.total_value);
        assert_eq!(forward.total_cost, backward.total_cost);
        assert_eq!(forward.total_realized_gain_loss, 1.5);
    }

    #[test]
    fn realized_gain_widens_the_basis() {
        // 220 / (100 + 10) - 1 = 100%
        let totals = Totals::from_portfolios(&[sample("1", "A", 220.0, 100.0, 10.0)]);
        assert_eq!(totals.performance_label(), "100.00");
        assert_eq!(totals.gain(), 130.0);
    }

    #[test]
    fn undefined_performance() {
        assert_eq!(Totals::from_portfolios(&[]).performance(), None);
        let zero = Totals::from_portfolios(&[sample("1", "A", 50.0, 0.0, 0.0)]);
        assert_eq!(zero.performance(), None);
        let negative = Totals::from_portfolios(&[sample("1", "A", 50.0, 10.0, -20.0)]);
        assert_eq!(negative.performance(), None);
        assert_eq!(negative.performance_label(), "-");
    }

    #[test]
    fn loss_is_negative() {
        let totals = Totals::from_portfolios(&[sample("1", "A", 75.0, 100.0, 0.0)]);
        assert_eq!(totals.performance_label(), "-25.00");
    }
}
