//! Shaping of portfolio history into chart rows, and the set of lines the
//! overview chart draws.
//!
//! Rows carry explicit `Option`s and per-portfolio map entries rather than
//! zero-filled fields: a day on which a portfolio did not exist has no entry
//! for it, and the chart draws no point there. Display names are only
//! attached in [`ChartRow::to_keyed_record`].

use crate::format::format_date;
use crate::history::PortfolioHistoryDay;
use crate::portfolio::{Portfolio, PortfolioId};
use chrono::NaiveDate;
use ratatui::style::Color;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Series colours. Indices 0 and 1 belong to the total value and total cost
/// lines; portfolio `i` uses `i + 2`, wrapping around.
pub const PALETTE: [Color; 7] = [
    Color::Rgb(0x88, 0x84, 0xd8),
    Color::Rgb(0x82, 0xca, 0x9d),
    Color::Rgb(0xff, 0xc6, 0x58),
    Color::Rgb(0xff, 0x73, 0x00),
    Color::Rgb(0x00, 0x88, 0xfe),
    Color::Rgb(0x00, 0xc4, 0x9f),
    Color::Rgb(0xff, 0xbb, 0x28),
];

const REALIZED_COLOR: Color = Color::Rgb(0x4c, 0xaf, 0x50);
const UNREALIZED_COLOR: Color = Color::Rgb(0x21, 0x96, 0xf3);
const TOTAL_GAIN_COLOR: Color = Color::Rgb(0x9c, 0x27, 0xb0);

pub fn portfolio_color(index: usize) -> Color {
    PALETTE[(index + 2) % PALETTE.len()]
}

/// Sums over all snapshots of one day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayTotals {
    pub total_value: f64,
    pub total_cost: f64,
    pub realized_gain: f64,
    pub unrealized_gain: f64,
    pub total_gain: f64,
}

/// One portfolio on one day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub value: f64,
    pub cost: f64,
    pub realized: f64,
    pub unrealized: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartRow {
    pub date: NaiveDate,
    pub label: String,
    /// `None` when no portfolio existed on this day.
    pub totals: Option<DayTotals>,
    pub series: BTreeMap<PortfolioId, SeriesPoint>,
}

impl ChartRow {
    /// Flat record keyed by display name (`"<name> Value"`, ...), as
    /// consumed by generic multi-series chart renderers. Absent data is
    /// omitted rather than written as zero.
    ///
    /// Two portfolios with the same name write to the same keys; the later
    /// one in `portfolios` wins.
    pub fn to_keyed_record(&self, portfolios: &[Portfolio]) -> Map<String, Value> {
        let mut record = Map::new();
        record.insert("date".to_string(), json!(self.label));

        if let Some(t) = &self.totals {
            record.insert("totalValue".to_string(), json!(t.total_value));
            record.insert("totalCost".to_string(), json!(t.total_cost));
            record.insert("realizedGain".to_string(), json!(t.realized_gain));
            record.insert("unrealizedGain".to_string(), json!(t.unrealized_gain));
            record.insert("totalGain".to_string(), json!(t.total_gain));
        }

        for portfolio in portfolios {
            if let Some(point) = self.series.get(&portfolio.id) {
                let name = &portfolio.name;
                record.insert(format!("{name} Value"), json!(point.value));
                record.insert(format!("{name} Cost"), json!(point.cost));
                record.insert(format!("{name} Realized"), json!(point.realized));
                record.insert(format!("{name} Unrealized"), json!(point.unrealized));
            }
        }

        record
    }
}

/// One row per history day, in input order.
///
/// Only portfolios present in `portfolios` get a series entry; snapshots of
/// unknown ids still count towards the day totals.
pub fn shape_chart_rows(
    history: &[PortfolioHistoryDay],
    portfolios: &[Portfolio],
    date_format: &str,
) -> Vec<ChartRow> {
    history
        .iter()
        .map(|day| {
            let totals = (!day.portfolios.is_empty()).then(|| {
                let total_value = day.portfolios.iter().map(|s| s.value()).sum();
                let total_cost = day.portfolios.iter().map(|s| s.cost()).sum();
                let realized_gain: f64 = day.portfolios.iter().map(|s| s.realized()).sum();
                let unrealized_gain: f64 = day.portfolios.iter().map(|s| s.unrealized()).sum();
                DayTotals {
                    total_value,
                    total_cost,
                    realized_gain,
                    unrealized_gain,
                    total_gain: realized_gain + unrealized_gain,
                }
            });

            let series = portfolios
                .iter()
                .filter_map(|p| {
                    day.snapshot(&p.id).map(|s| {
                        (
                            p.id.clone(),
                            SeriesPoint {
                                value: s.value(),
                                cost: s.cost(),
                                realized: s.realized(),
                                unrealized: s.unrealized(),
                            },
                        )
                    })
                })
                .collect();

            ChartRow {
                date: day.date,
                label: format_date(day.date, date_format),
                totals,
                series,
            }
        })
        .collect()
}

/// A togglable family of series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Value,
    Cost,
    RealizedGain,
    UnrealizedGain,
    TotalGain,
}

impl Metric {
    pub fn all() -> [Metric; 5] {
        [
            Metric::Value,
            Metric::Cost,
            Metric::RealizedGain,
            Metric::UnrealizedGain,
            Metric::TotalGain,
        ]
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::Value => "Value",
            Metric::Cost => "Cost",
            Metric::RealizedGain => "Realized Gain",
            Metric::UnrealizedGain => "Unrealized Gain",
            Metric::TotalGain => "Total Gain",
        }
    }

    /// Dashboard key that toggles this metric.
    pub fn key(self) -> char {
        match self {
            Metric::Value => 'v',
            Metric::Cost => 'c',
            Metric::RealizedGain => 'r',
            Metric::UnrealizedGain => 'u',
            Metric::TotalGain => 'g',
        }
    }

    pub fn from_key(c: char) -> Option<Metric> {
        Metric::all().into_iter().find(|m| m.key() == c)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SeriesKey {
    TotalValue,
    TotalCost,
    RealizedGain,
    UnrealizedGain,
    TotalGain,
    PortfolioValue(PortfolioId),
    PortfolioCost(PortfolioId),
}

impl SeriesKey {
    pub fn value_in(&self, row: &ChartRow) -> Option<f64> {
        match self {
            SeriesKey::TotalValue => row.totals.map(|t| t.total_value),
            SeriesKey::TotalCost => row.totals.map(|t| t.total_cost),
            SeriesKey::RealizedGain => row.totals.map(|t| t.realized_gain),
            SeriesKey::UnrealizedGain => row.totals.map(|t| t.unrealized_gain),
            SeriesKey::TotalGain => row.totals.map(|t| t.total_gain),
            SeriesKey::PortfolioValue(id) => row.series.get(id).map(|p| p.value),
            SeriesKey::PortfolioCost(id) => row.series.get(id).map(|p| p.cost),
        }
    }
}

/// How a single chart line is drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct LineSpec {
    pub key: SeriesKey,
    pub name: String,
    pub color: Color,
    pub stroke_width: u16,
    pub dashed: bool,
    pub opacity: f32,
}

/// Which metric families the overview chart shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricVisibility {
    pub value: bool,
    pub cost: bool,
    pub realized_gain: bool,
    pub unrealized_gain: bool,
    pub total_gain: bool,
}

impl Default for MetricVisibility {
    fn default() -> Self {
        MetricVisibility {
            value: true,
            cost: true,
            realized_gain: false,
            unrealized_gain: false,
            total_gain: false,
        }
    }
}

impl MetricVisibility {
    pub fn is_visible(&self, metric: Metric) -> bool {
        match metric {
            Metric::Value => self.value,
            Metric::Cost => self.cost,
            Metric::RealizedGain => self.realized_gain,
            Metric::UnrealizedGain => self.unrealized_gain,
            Metric::TotalGain => self.total_gain,
        }
    }

    pub fn toggle(&mut self, metric: Metric) {
        let flag = match metric {
            Metric::Value => &mut self.value,
            Metric::Cost => &mut self.cost,
            Metric::RealizedGain => &mut self.realized_gain,
            Metric::UnrealizedGain => &mut self.unrealized_gain,
            Metric::TotalGain => &mut self.total_gain,
        };
        *flag = !*flag;
    }

    /// Lines to draw: the totals first, then a value/cost pair per portfolio.
    pub fn visible_lines(&self, portfolios: &[Portfolio]) -> Vec<LineSpec> {
        let mut lines = Vec::new();

        if self.value {
            lines.push(LineSpec {
                key: SeriesKey::TotalValue,
                name: "Total Value".to_string(),
                color: PALETTE[0],
                stroke_width: 2,
                dashed: false,
                opacity: 1.0,
            });
        }
        if self.cost {
            lines.push(LineSpec {
                key: SeriesKey::TotalCost,
                name: "Total Cost".to_string(),
                color: PALETTE[1],
                stroke_width: 2,
                dashed: true,
                opacity: 1.0,
            });
        }
        if self.realized_gain {
            lines.push(LineSpec {
                key: SeriesKey::RealizedGain,
                name: "Realized Gain".to_string(),
                color: REALIZED_COLOR,
                stroke_width: 2,
                dashed: false,
                opacity: 1.0,
            });
        }
        if self.unrealized_gain {
            lines.push(LineSpec {
                key: SeriesKey::UnrealizedGain,
                name: "Unrealized Gain".to_string(),
                color: UNREALIZED_COLOR,
                stroke_width: 2,
                dashed: false,
                opacity: 1.0,
            });
        }
        if self.total_gain {
            lines.push(LineSpec {
                key: SeriesKey::TotalGain,
                name: "Total Gain".to_string(),
                color: TOTAL_GAIN_COLOR,
                stroke_width: 2,
                dashed: false,
                opacity: 1.0,
            });
        }

        for (i, portfolio) in portfolios.iter().enumerate() {
            let color = portfolio_color(i);
            if self.value {
                lines.push(LineSpec {
                    key: SeriesKey::PortfolioValue(portfolio.id.clone()),
                    name: format!("{} Value", portfolio.name),
                    color,
                    stroke_width: 1,
                    dashed: false,
                    opacity: 0.7,
                });
            }
            if self.cost {
                lines.push(LineSpec {
                    key: SeriesKey::PortfolioCost(portfolio.id.clone()),
                    name: format!("{} Cost", portfolio.name),
                    color,
                    stroke_width: 1,
                    dashed: true,
                    opacity: 0.5,
                });
            }
        }

        lines
    }
}

/// `(row index, value)` for every row where `key` has data.
pub fn series_points(rows: &[ChartRow], key: &SeriesKey) -> Vec<(f64, f64)> {
    rows.iter()
        .enumerate()
        .filter_map(|(i, row)| key.value_in(row).map(|y| (i as f64, y)))
        .collect()
}

/// Min and max over all points of the given lines, `None` if there are none.
pub fn value_bounds(rows: &[ChartRow], lines: &[LineSpec]) -> Option<(f64, f64)> {
    lines
        .iter()
        .flat_map(|line| rows.iter().filter_map(|row| line.key.value_in(row)))
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::DEFAULT_DATE_FORMAT;
    use crate::history::PortfolioSnapshot;
    use crate::portfolio::sample;

    fn day(date: &str, snapshots: Vec<PortfolioSnapshot>) -> PortfolioHistoryDay {
        PortfolioHistoryDay {
            date: date.parse().unwrap(),
            portfolios: snapshots,
        }
    }

    fn snap(id: &str, value: f64, cost: f64, realized: Option<f64>) -> PortfolioSnapshot {
        PortfolioSnapshot {
            id: PortfolioId::from(id),
            value: Some(value),
            cost: Some(cost),
            realized_gain: realized,
        }
    }

    #[test]
    fn empty_day_has_only_a_date() {
        let rows = shape_chart_rows(&[day("2024-01-01", vec![])], &[], DEFAULT_DATE_FORMAT);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].totals.is_none());
        assert!(rows[0].series.is_empty());

        let record = rows[0].to_keyed_record(&[]);
        assert_eq!(record.len(), 1);
        assert_eq!(record["date"], json!("2024-01-01"));
    }

    #[test]
    fn named_fields_for_present_portfolio() {
        let portfolios = vec![sample("1", "Fund A", 0.0, 0.0, 0.0)];
        let history = vec![day("2024-01-02", vec![snap("1", 120.0, 100.0, Some(5.0))])];
        let rows = shape_chart_rows(&history, &portfolios, DEFAULT_DATE_FORMAT);

        let record = rows[0].to_keyed_record(&portfolios);
        assert_eq!(record["Fund A Value"], json!(120.0));
        assert_eq!(record["Fund A Cost"], json!(100.0));
        assert_eq!(record["Fund A Realized"], json!(5.0));
        assert_eq!(record["Fund A Unrealized"], json!(20.0));
        assert_eq!(record["totalGain"], json!(25.0));
    }

    #[test]
    fn totals_sum_every_snapshot() {
        let portfolios = vec![sample("1", "A", 0.0, 0.0, 0.0)];
        let history = vec![day(
            "2024-01-03",
            vec![
                snap("1", 120.0, 100.0, Some(5.0)),
                snap("9", 30.0, 40.0, None),
            ],
        )];
        let rows = shape_chart_rows(&history, &portfolios, DEFAULT_DATE_FORMAT);
        let totals = rows[0].totals.unwrap();
        assert_eq!(totals.total_value, 150.0);
        assert_eq!(totals.total_cost, 140.0);
        assert_eq!(totals.realized_gain, 5.0);
        assert_eq!(totals.unrealized_gain, 10.0);
        assert_eq!(totals.total_gain, 15.0);
        // id 9 is not a known portfolio
        assert_eq!(rows[0].series.len(), 1);
    }

    #[test]
    fn portfolio_missing_on_a_day_leaves_a_gap() {
        let portfolios = vec![sample("1", "A", 0.0, 0.0, 0.0), sample("2", "B", 0.0, 0.0, 0.0)];
        let history = vec![
            day("2024-01-01", vec![snap("1", 10.0, 10.0, None)]),
            day(
                "2024-01-02",
                vec![snap("1", 11.0, 10.0, None), snap("2", 5.0, 5.0, None)],
            ),
        ];
        let rows = shape_chart_rows(&history, &portfolios, DEFAULT_DATE_FORMAT);
        assert!(!rows[0].to_keyed_record(&portfolios).contains_key("B Value"));

        let points = series_points(&rows, &SeriesKey::PortfolioValue(PortfolioId::from("2")));
        assert_eq!(points, vec![(1.0, 5.0)]);
        let totals = series_points(&rows, &SeriesKey::TotalValue);
        assert_eq!(totals, vec![(0.0, 10.0), (1.0, 16.0)]);
    }

    #[test]
    fn palette_reserves_two_slots_and_cycles() {
        assert_eq!(portfolio_color(0), PALETTE[2]);
        assert_eq!(portfolio_color(4), PALETTE[6]);
        assert_eq!(portfolio_color(5), PALETTE[0]);
    }

    #[test]
    fn default_visibility_shows_value_and_cost() {
        let portfolios = vec![sample("1", "A", 0.0, 0.0, 0.0), sample("2", "B", 0.0, 0.0, 0.0)];
        let lines = MetricVisibility::default().visible_lines(&portfolios);
        let names: Vec<&str> = lines.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Total Value", "Total Cost", "A Value", "A Cost", "B Value", "B Cost"]
        );
        assert!(lines[1].dashed);
        assert_eq!(lines[4].color, portfolio_color(1));
    }

    #[test]
    fn toggle_twice_is_identity() {
        let portfolios = vec![sample("1", "A", 0.0, 0.0, 0.0)];
        for metric in Metric::all() {
            let mut visibility = MetricVisibility::default();
            let before = visibility.visible_lines(&portfolios);
            visibility.toggle(metric);
            assert_ne!(visibility.visible_lines(&portfolios), before);
            visibility.toggle(metric);
            assert_eq!(visibility.visible_lines(&portfolios), before);
        }
    }

    #[test]
    fn gain_lines_have_no_per_portfolio_pair() {
        let mut visibility = MetricVisibility {
            value: false,
            cost: false,
            ..Default::default()
        };
        visibility.toggle(Metric::TotalGain);
        let lines = visibility.visible_lines(&[sample("1", "A", 0.0, 0.0, 0.0)]);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].key, SeriesKey::TotalGain);
    }

    #[test]
    fn metric_keys_round_trip() {
        for metric in Metric::all() {
            assert_eq!(Metric::from_key(metric.key()), Some(metric));
        }
        assert_eq!(Metric::from_key('x'), None);
    }

    #[test]
    fn bounds_cover_visible_lines() {
        let portfolios = vec![sample("1", "A", 0.0, 0.0, 0.0)];
        let history = vec![
            day("2024-01-01", vec![snap("1", 10.0, 8.0, None)]),
            day("2024-01-02", vec![snap("1", 14.0, 9.0, None)]),
        ];
        let rows = shape_chart_rows(&history, &portfolios, DEFAULT_DATE_FORMAT);
        let lines = MetricVisibility::default().visible_lines(&portfolios);
        assert_eq!(value_bounds(&rows, &lines), Some((8.0, 14.0)));
        assert_eq!(value_bounds(&rows, &[]), None);
    }
}
