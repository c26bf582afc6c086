use crate::error::ValidationError;
use crate::format::{format_currency, format_percent};
use crate::summary::Totals;
use piechart::{Chart, Color};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Backend identifier of a portfolio.
///
/// Accepts both JSON strings and integers so the client does not depend on
/// how the backend stores its keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PortfolioId(String);

impl PortfolioId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for PortfolioId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => PortfolioId(s),
            RawId::Number(n) => PortfolioId(n.to_string()),
        })
    }
}

impl fmt::Display for PortfolioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PortfolioId {
    fn from(s: &str) -> Self {
        PortfolioId(s.to_string())
    }
}

/// A portfolio as returned by `/portfolio` and `/portfolio-summary`.
///
/// The totals are computed server-side; the list endpoint may omit them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: PortfolioId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub exclude_from_overview: bool,
    #[serde(default, alias = "archived")]
    pub is_archived: bool,
    #[serde(rename = "totalValue", default)]
    pub total_value: f64,
    #[serde(rename = "totalCost", default)]
    pub total_cost: f64,
    #[serde(rename = "totalUnrealizedGainLoss", default)]
    pub total_unrealized_gain_loss: f64,
    #[serde(rename = "totalRealizedGainLoss", default)]
    pub total_realized_gain_loss: f64,
    #[serde(rename = "totalGainLoss", default)]
    pub total_gain_loss: f64,
}

impl Portfolio {
    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    /// Performance of this portfolio alone, same formula as the overview.
    pub fn performance(&self) -> Option<f64> {
        Totals::from_portfolios(std::slice::from_ref(self)).performance()
    }
}

/// Body of `POST /portfolio` and `PUT /portfolio/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub exclude_from_overview: bool,
}

impl PortfolioDraft {
    pub fn new(name: impl Into<String>) -> Self {
        PortfolioDraft {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Draft pre-filled from an existing record, for editing.
    pub fn from_portfolio(portfolio: &Portfolio) -> Self {
        PortfolioDraft {
            name: portfolio.name.clone(),
            description: portfolio.description().to_string(),
            exclude_from_overview: portfolio.exclude_from_overview,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::NameRequired);
        }
        Ok(())
    }
}

// Print the portfolios as a table, optionally with a TOTAL row
pub fn print_portfolios(portfolios: &[Portfolio], currency: &str, include_sum: bool) {
    use comfy_table::{
        presets::UTF8_FULL, Attribute, Cell, CellAlignment, Color as TColor, ContentArrangement,
        Table,
    };

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);

    table.set_header(vec![
        Cell::new("ID").add_attribute(Attribute::Bold),
        Cell::new("Name").add_attribute(Attribute::Bold),
        Cell::new("Value").add_attribute(Attribute::Bold),
        Cell::new("Cost").add_attribute(Attribute::Bold),
        Cell::new("Unrealized").add_attribute(Attribute::Bold),
        Cell::new("Realized").add_attribute(Attribute::Bold),
        Cell::new("Total Gain").add_attribute(Attribute::Bold),
        Cell::new("Perf").add_attribute(Attribute::Bold),
    ]);

    let money = |v: f64| {
        let c = if v >= 0.0 { TColor::Green } else { TColor::Red };
        Cell::new(format_currency(v, currency))
            .set_alignment(CellAlignment::Right)
            .fg(c)
    };
    let pct = |v: Option<f64>| {
        let c = match v {
            Some(v) if v < 0.0 => TColor::Red,
            Some(_) => TColor::Green,
            None => TColor::White,
        };
        Cell::new(format_percent(v))
            .set_alignment(CellAlignment::Right)
            .fg(c)
    };

    for portfolio in portfolios {
        let mut name = portfolio.name.clone();
        if portfolio.is_archived {
            name.push_str(" [archived]");
        }
        if portfolio.exclude_from_overview {
            name.push_str(" [excluded]");
        }
        table.add_row(vec![
            Cell::new(portfolio.id.as_str()),
            Cell::new(name),
            Cell::new(format_currency(portfolio.total_value, currency))
                .set_alignment(CellAlignment::Right),
            Cell::new(format_currency(portfolio.total_cost, currency))
                .set_alignment(CellAlignment::Right),
            money(portfolio.total_unrealized_gain_loss),
            money(portfolio.total_realized_gain_loss),
            money(portfolio.total_gain_loss),
            pct(portfolio.performance()),
        ]);
    }

    if include_sum {
        let totals = Totals::from_portfolios(portfolios);
        table.add_row(vec![
            Cell::new(""),
            Cell::new("TOTAL").add_attribute(Attribute::Bold),
            Cell::new(format_currency(totals.total_value, currency))
                .set_alignment(CellAlignment::Right)
                .add_attribute(Attribute::Bold),
            Cell::new(format_currency(totals.total_cost, currency))
                .set_alignment(CellAlignment::Right)
                .add_attribute(Attribute::Bold),
            money(totals.total_unrealized_gain_loss).add_attribute(Attribute::Bold),
            money(totals.total_realized_gain_loss).add_attribute(Attribute::Bold),
            money(totals.gain()).add_attribute(Attribute::Bold),
            pct(totals.performance()).add_attribute(Attribute::Bold),
        ]);
    }

    println!("{table}");
}

/// Pie chart of each portfolio's share of the total value.
pub fn draw_pie_chart(portfolios: &[Portfolio]) {
    let colors = [
        Color::Red,
        Color::Green,
        Color::Blue,
        Color::Yellow,
        Color::Cyan,
        Color::White,
        Color::Purple,
        Color::Black,
    ];

    let data: Vec<piechart::Data> = portfolios
        .iter()
        .filter(|p| p.total_value > 0.0)
        .enumerate()
        .map(|(i, p)| piechart::Data {
            label: p.name.clone(),
            value: p.total_value as f32,
            color: Some(colors[i % colors.len()].into()),
            fill: '•',
        })
        .collect();

    if data.is_empty() {
        return;
    }

    Chart::new()
        .legend(true)
        .radius(9)
        .aspect_ratio(3)
        .draw(&data);
}

#[cfg(test)]
pub(crate) fn sample(id: &str, name: &str, value: f64, cost: f64, realized: f64) -> Portfolio {
    Portfolio {
        id: PortfolioId::from(id),
        name: name.to_string(),
        description: None,
        exclude_from_overview: false,
        is_archived: false,
        total_value: value,
        total_cost: cost,
        total_unrealized_gain_loss: value - cost,
        total_realized_gain_loss: realized,
        total_gain_loss: value - cost + realized,
    }
}
