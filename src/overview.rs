use crate::api::PortfolioApi;
use crate::chart::{shape_chart_rows, ChartRow};
use crate::error::ApiError;
use crate::format::{format_currency, format_percent};
use crate::history::PortfolioHistoryDay;
use crate::portfolio::{draw_pie_chart, print_portfolios, Portfolio};
use crate::summary::Totals;
use colored::Colorize;

/// Everything the overview page renders, fetched together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverviewData {
    pub portfolios: Vec<Portfolio>,
    pub history: Vec<PortfolioHistoryDay>,
}

impl OverviewData {
    /// No portfolios at all; the caller shows the empty state instead of
    /// aggregating.
    pub fn is_empty(&self) -> bool {
        self.portfolios.is_empty()
    }

    pub fn totals(&self) -> Totals {
        Totals::from_portfolios(&self.portfolios)
    }

    /// Chart rows in chronological order.
    pub fn chart_rows(&self, date_format: &str) -> Vec<ChartRow> {
        let mut rows = shape_chart_rows(&self.history, &self.portfolios, date_format);
        rows.sort_by_key(|row| row.date);
        rows
    }
}

/// Fetches the summary and the history concurrently. Both must succeed.
pub async fn load_overview<A: PortfolioApi + ?Sized>(api: &A) -> Result<OverviewData, ApiError> {
    let (portfolios, history) =
        futures::try_join!(api.portfolio_summary(), api.portfolio_history())?;
    tracing::debug!(
        portfolios = portfolios.len(),
        days = history.len(),
        "loaded overview"
    );
    Ok(OverviewData {
        portfolios,
        history,
    })
}

pub fn print_overview(data: &OverviewData, currency: &str) {
    if data.is_empty() {
        println!("No portfolios yet. Create one with `portfolio_dash create <NAME>`.");
        return;
    }

    let totals = data.totals();
    let performance = totals.performance();
    let perf = format_percent(performance);
    let perf = match performance {
        Some(p) if p < 0.0 => perf.red(),
        Some(_) => perf.green(),
        None => perf.normal(),
    };
    let gain = format_currency(totals.gain(), currency);
    let gain = if totals.gain() < 0.0 { gain.red() } else { gain.green() };

    println!(
        "{} {}   {} {}   {} {}",
        "Total value:".bold(),
        format_currency(totals.total_value, currency),
        "Gain:".bold(),
        gain,
        "Performance:".bold(),
        perf
    );
    print_portfolios(&data.portfolios, currency, true);
    draw_pie_chart(&data.portfolios);
}

pub fn print_history(data: &OverviewData, currency: &str, date_format: &str) {
    use comfy_table::{presets::UTF8_FULL, Attribute, Cell, CellAlignment, ContentArrangement, Table};

    let rows = data.chart_rows(date_format);
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec![
        Cell::new("Date").add_attribute(Attribute::Bold),
        Cell::new("Value").add_attribute(Attribute::Bold),
        Cell::new("Cost").add_attribute(Attribute::Bold),
        Cell::new("Total Gain").add_attribute(Attribute::Bold),
    ];
    header.extend(
        data.portfolios
            .iter()
            .map(|p| Cell::new(&p.name).add_attribute(Attribute::Bold)),
    );
    table.set_header(header);

    let money = |v: Option<f64>| {
        Cell::new(
            v.map(|v| format_currency(v, currency))
                .unwrap_or_else(|| "-".to_string()),
        )
        .set_alignment(CellAlignment::Right)
    };

    for row in &rows {
        let mut cells = vec![
            Cell::new(&row.label),
            money(row.totals.map(|t| t.total_value)),
            money(row.totals.map(|t| t.total_cost)),
            money(row.totals.map(|t| t.total_gain)),
        ];
        cells.extend(
            data.portfolios
                .iter()
                .map(|p| money(row.series.get(&p.id).map(|s| s.value))),
        );
        table.add_row(cells);
    }

    println!("{table}");
}

/// Name-keyed rows as a JSON array, for feeding external chart tools.
pub fn history_json(data: &OverviewData, date_format: &str) -> serde_json::Value {
    serde_json::Value::Array(
        data.chart_rows(date_format)
            .iter()
            .map(|row| serde_json::Value::Object(row.to_keyed_record(&data.portfolios)))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::DEFAULT_DATE_FORMAT;
    use crate::history::PortfolioSnapshot;
    use crate::manager::tests::FakeApi;
    use crate::portfolio::{sample, PortfolioId};

    fn history() -> Vec<PortfolioHistoryDay> {
        vec![
            PortfolioHistoryDay {
                date: "2024-02-02".parse().unwrap(),
                portfolios: vec![PortfolioSnapshot {
                    id: PortfolioId::from("1"),
                    value: Some(120.0),
                    cost: Some(100.0),
                    realized_gain: Some(5.0),
                }],
            },
            PortfolioHistoryDay {
                date: "2024-02-01".parse().unwrap(),
                portfolios: vec![],
            },
        ]
    }

    #[tokio::test]
    async fn loads_both_datasets() {
        let api = FakeApi::with(vec![sample("1", "Fund A", 150.0, 100.0, 0.0)]);
        *api.history.lock().unwrap() = history();
        let data = load_overview(&api).await.unwrap();
        assert_eq!(data.portfolios.len(), 1);
        assert_eq!(data.history.len(), 2);
        assert_eq!(data.totals().performance_label(), "50.00");
    }

    #[tokio::test]
    async fn either_failure_fails_the_load() {
        let api = FakeApi::with(vec![sample("1", "Fund A", 150.0, 100.0, 0.0)]);
        *api.fail_history.lock().unwrap() = true;
        assert!(matches!(
            load_overview(&api).await,
            Err(ApiError::Network(_))
        ));

        let api = FakeApi::with(vec![]);
        api.set_failing(true);
        assert!(load_overview(&api).await.is_err());
    }

    #[test]
    fn rows_are_chronological() {
        let data = OverviewData {
            portfolios: vec![sample("1", "Fund A", 150.0, 100.0, 0.0)],
            history: history(),
        };
        let rows = data.chart_rows(DEFAULT_DATE_FORMAT);
        assert_eq!(rows[0].label, "2024-02-01");
        assert_eq!(rows[1].label, "2024-02-02");
    }

    #[test]
    fn json_export_omits_absent_fields() {
        let data = OverviewData {
            portfolios: vec![sample("1", "Fund A", 150.0, 100.0, 0.0)],
            history: history(),
        };
        let json = history_json(&data, DEFAULT_DATE_FORMAT);
        assert_eq!(json[0], serde_json::json!({"date": "2024-02-01"}));
        assert_eq!(json[1]["Fund A Unrealized"], serde_json::json!(20.0));
    }

    #[test]
    fn empty_overview() {
        assert!(OverviewData::default().is_empty());
    }
}
