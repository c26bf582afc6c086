use chrono::NaiveDate;
use std::fmt::Write;

/// Default label format for history dates. Sorts lexically in date order.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

pub fn format_currency(value: f64, currency: &str) -> String {
    let magnitude = value.abs();

    if currency == "JPY" {
        let digits = format!("{magnitude:.0}");
        let sign = sign_of(value, &digits);
        return format!("{sign}¥{}", group_thousands(&digits));
    }

    let formatted_number = format_with_commas(magnitude);
    let sign = sign_of(value, &formatted_number);
    match currency {
        "USD" | "CAD" | "AUD" | "HKD" | "SGD" => format!("{sign}${formatted_number}"),
        "EUR" => format!("{sign}{formatted_number} €"),
        "GBP" => format!("{sign}£{formatted_number}"),
        _ => format!("{sign}{formatted_number} {currency}"),
    }
}

pub fn format_with_commas(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (integer_part, decimal_part) = formatted.split_once('.').unwrap_or((&formatted, "00"));
    let sign = sign_of(value, &formatted);
    format!("{sign}{}.{decimal_part}", group_thousands(integer_part))
}

/// Minus sign only when the rounded digits are not all zero.
fn sign_of(value: f64, rounded: &str) -> &'static str {
    if value < 0.0 && rounded.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `Some(12.345)` -> `"12.35%"`, `None` -> `"-"`.
pub fn format_percent(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.2}%"))
        .unwrap_or_else(|| "-".to_string())
}

/// Formats a history date. A malformed `fmt` falls back to ISO format
/// instead of panicking inside chrono's `Display`.
pub fn format_date(date: NaiveDate, fmt: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", date.format(fmt)).is_err() {
        return date.format(DEFAULT_DATE_FORMAT).to_string();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commas_are_grouped_by_thousands() {
        assert_eq!(format_with_commas(0.5), "0.50");
        assert_eq!(format_with_commas(999.999), "1,000.00");
        assert_eq!(format_with_commas(1234567.891), "1,234,567.89");
        assert_eq!(format_with_commas(-123456.0), "-123,456.00");
    }

    #[test]
    fn currency_symbols() {
        assert_eq!(format_currency(1500.0, "USD"), "$1,500.00");
        assert_eq!(format_currency(12.5, "EUR"), "12.50 €");
        assert_eq!(format_currency(-20.0, "GBP"), "-£20.00");
        assert_eq!(format_currency(1234567.4, "JPY"), "¥1,234,567");
        assert_eq!(format_currency(10.0, "CHF"), "10.00 CHF");
    }

    #[test]
    fn values_rounding_to_zero_have_no_sign() {
        assert_eq!(format_currency(-0.001, "USD"), "$0.00");
        assert_eq!(format_currency(-0.004, "EUR"), "0.00 €");
        assert_eq!(format_currency(-0.4, "JPY"), "¥0");
        assert_eq!(format_with_commas(-0.001), "0.00");
        assert_eq!(format_currency(-0.006, "USD"), "-$0.01");
    }

    #[test]
    fn percent_placeholder() {
        assert_eq!(format_percent(Some(50.0)), "50.00%");
        assert_eq!(format_percent(None), "-");
    }

    #[test]
    fn date_formats() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(format_date(date, DEFAULT_DATE_FORMAT), "2024-03-09");
        assert_eq!(format_date(date, "%d.%m.%Y"), "09.03.2024");
        assert_eq!(format_date(date, "%Q"), "2024-03-09");
    }
}
