//! Fill import: parses broker CSV exports and writes reconstructed trades
//! through the journal port.

use crate::domain::error::JournalError;
use crate::domain::fill::{parse_fill_date, parse_fill_time, Fill, Side};
use crate::domain::journal::NewTrade;
use crate::domain::reconstruct::reconstruct_trades;
use crate::ports::journal_port::JournalPort;

const REQUIRED_COLUMNS: [&str; 5] = ["B/S", "avgPrice", "filledQty", "Fill Time", "Date"];

/// Result of importing one trading day.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ImportedDay {
    pub date: String,
    pub day_id: i64,
    pub trade_count: usize,
    pub total_pnl: f64,
}

/// Parses a broker fill export. Rows with malformed values are skipped;
/// structural problems (missing columns, nothing parseable) are errors.
pub fn parse_fills_csv(data: &[u8]) -> Result<Vec<Fill>, JournalError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers = rdr
        .headers()
        .map_err(|e| JournalError::Import {
            reason: format!("unreadable CSV header: {e}"),
        })?
        .clone();
    if headers.is_empty() {
        return Err(JournalError::Import {
            reason: "file is empty".into(),
        });
    }

    let col = |name: &str| headers.iter().position(|h| h == name);
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| col(c).is_none())
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(JournalError::Import {
            reason: format!("missing required columns: {}", missing.join(", ")),
        });
    }
    // All five verified present above.
    let idx = |name: &str| col(name).unwrap_or_default();
    let side_col = idx("B/S");
    let price_col = idx("avgPrice");
    let qty_col = idx("filledQty");
    let time_col = idx("Fill Time");
    let date_col = idx("Date");

    let mut fills = Vec::new();
    for record in rdr.records() {
        let Ok(record) = record else { continue };

        let Some(side) = record.get(side_col).and_then(Side::parse) else {
            continue;
        };
        // Prices may carry thousands separators in some exports.
        let Some(price) = record
            .get(price_col)
            .map(|p| p.replace(',', ""))
            .and_then(|p| p.parse::<f64>().ok())
        else {
            continue;
        };
        let Some(qty) = record
            .get(qty_col)
            .and_then(|q| q.parse::<f64>().ok())
            .map(|q| q as i64)
            .filter(|q| *q > 0)
        else {
            continue;
        };
        let Some(time) = record.get(time_col).and_then(parse_fill_time) else {
            continue;
        };
        let Some(date) = record.get(date_col).and_then(parse_fill_date) else {
            continue;
        };

        fills.push(Fill {
            side,
            qty,
            price,
            time,
            date,
        });
    }

    if fills.is_empty() {
        return Err(JournalError::Import {
            reason: "no valid fills found in file".into(),
        });
    }
    Ok(fills)
}

/// Parses the upload, reconstructs round-trip trades, and replaces any
/// previously imported data for the affected days.
pub fn import_file(
    journal: &dyn JournalPort,
    filename: &str,
    data: &[u8],
    portfolio_id: Option<i64>,
    dollars_per_point: f64,
) -> Result<Vec<ImportedDay>, JournalError> {
    let lower = filename.to_lowercase();
    if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
        return Err(JournalError::Import {
            reason: "Excel files are not supported; export fills as CSV".into(),
        });
    }
    if !lower.ends_with(".csv") {
        return Err(JournalError::Import {
            reason: format!("unsupported file type: {filename}"),
        });
    }

    let fills = parse_fills_csv(data)?;
    let days = reconstruct_trades(fills, dollars_per_point);

    let mut imported = Vec::new();
    for day in days {
        let date = day.date.format("%Y-%m-%d").to_string();

        // Re-importing a day replaces it wholesale.
        if let Some(existing) = journal.find_day(&date, portfolio_id)? {
            journal.delete_day(existing)?;
        }
        let day_id = journal.upsert_day(&date, portfolio_id)?;

        let mut total_pnl = 0.0;
        for trade in &day.trades {
            let trade_id = journal.insert_trade(
                day_id,
                &NewTrade {
                    trade_num: trade.trade_num,
                    direction: trade.direction.as_str().to_string(),
                    qty: trade.qty,
                    avg_entry: trade.avg_entry,
                    avg_exit: trade.avg_exit,
                    pnl: trade.pnl,
                    entry_time: trade.entry_time.format("%H:%M:%S").to_string(),
                    exit_time: trade.exit_time.format("%H:%M:%S").to_string(),
                    is_open: trade.open,
                },
            )?;
            for fill in &trade.fills {
                journal.insert_fill(
                    trade_id,
                    &fill.time.format("%H:%M:%S").to_string(),
                    fill.side.as_str(),
                    fill.qty,
                    fill.price,
                )?;
            }
            total_pnl += trade.pnl;
        }

        imported.push(ImportedDay {
            date,
            day_id,
            trade_count: day.trades.len(),
            total_pnl: (total_pnl * 100.0).round() / 100.0,
        });
    }

    Ok(imported)
}
