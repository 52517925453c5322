//! Broker fill types and the lenient date/time parsing used by imports.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "Buy",
            Side::Sell => "Sell",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "Buy" | "B" | "buy" => Some(Side::Buy),
            "Sell" | "S" | "sell" => Some(Side::Sell),
            _ => None,
        }
    }

    /// The side that closes a position opened with this side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// A single broker fill, as parsed from an import file.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub side: Side,
    pub qty: i64,
    pub price: f64,
    pub time: NaiveTime,
    pub date: NaiveDate,
}

impl Fill {
    /// Signed quantity: positive for buys, negative for sells.
    pub fn signed_qty(&self) -> i64 {
        match self.side {
            Side::Buy => self.qty,
            Side::Sell => -self.qty,
        }
    }
}

// %y before %Y: chrono's %Y greedily accepts a 2-digit year, which would
// turn 07/15/24 into year 0024. %y consumes exactly two digits, so 4-digit
// years still fall through to the %Y formats.
const TIME_FORMATS: &[&str] = &["%m/%d/%y %H:%M:%S", "%m/%d/%Y %H:%M:%S", "%Y-%m-%d %H:%M:%S"];
const DATE_FORMATS: &[&str] = &["%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d"];

/// Extract the time-of-day from a broker fill timestamp.
///
/// Tries full datetime formats first, then a bare time in the second
/// whitespace-separated token.
pub fn parse_fill_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    for fmt in TIME_FORMATS {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.time());
        }
    }
    let token = raw.split_whitespace().nth(1).unwrap_or(raw);
    NaiveTime::parse_from_str(token, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(token, "%H:%M"))
        .ok()
}

/// Extract the trading date from a broker date column.
pub fn parse_fill_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim().split_whitespace().next()?;
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_us_datetime() {
        let t = parse_fill_time("07/15/2024 09:31:05").unwrap();
        assert_eq!(t, NaiveTime::from_hms_opt(9, 31, 5).unwrap());
    }

    #[test]
    fn parses_iso_datetime() {
        let t = parse_fill_time("2024-07-15 14:02:00").unwrap();
        assert_eq!(t, NaiveTime::from_hms_opt(14, 2, 0).unwrap());
    }

    #[test]
    fn parses_short_year_datetime() {
        let t = parse_fill_time("07/15/24 09:31:05").unwrap();
        assert_eq!(t, NaiveTime::from_hms_opt(9, 31, 5).unwrap());
    }

    #[test]
    fn falls_back_to_second_token() {
        let t = parse_fill_time("15.07.2024 10:30:00").unwrap();
        assert_eq!(t, NaiveTime::from_hms_opt(10, 30, 0).unwrap());
    }

    #[test]
    fn rejects_garbage_time() {
        assert!(parse_fill_time("not a time").is_none());
    }

    #[test]
    fn parses_dates_in_all_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 7, 15).unwrap();
        assert_eq!(parse_fill_date("07/15/2024"), Some(expected));
        assert_eq!(parse_fill_date("2024-07-15"), Some(expected));
        assert_eq!(parse_fill_date("07/15/24"), Some(expected));
        assert_eq!(parse_fill_date("07/15/2024 09:31:05"), Some(expected));
    }

    #[test]
    fn side_parse_and_signed_qty() {
        assert_eq!(Side::parse(" Buy "), Some(Side::Buy));
        assert_eq!(Side::parse("Sell"), Some(Side::Sell));
        assert_eq!(Side::parse("Hold"), None);

        let f = Fill {
            side: Side::Sell,
            qty: 3,
            price: 5000.0,
            time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            date: NaiveDate::from_ymd_opt(2024, 7, 15).unwrap(),
        };
        assert_eq!(f.signed_qty(), -3);
        assert_eq!(f.side.opposite(), Side::Buy);
    }
}
