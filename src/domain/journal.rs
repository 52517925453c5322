//! Journal record types shared between the persistence port and the web
//! adapter.

use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Portfolio {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub color: String,
    pub created_at: String,
}

/// Portfolio with aggregate day/trade counts for the portfolios page.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSummary {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub color: String,
    pub created_at: String,
    pub day_count: i64,
    pub trade_count: i64,
    pub total_pnl: Option<f64>,
}

/// One row in the trading-day list.
#[derive(Debug, Clone, Serialize)]
pub struct DaySummary {
    pub id: i64,
    pub date: String,
    pub imported_at: String,
    pub portfolio_id: Option<i64>,
    pub portfolio_name: Option<String>,
    pub portfolio_color: Option<String>,
    pub trade_count: i64,
    pub total_pnl: Option<f64>,
    pub wins: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Day {
    pub id: i64,
    pub date: String,
    pub imported_at: String,
    pub portfolio_id: Option<i64>,
    pub portfolio_name: Option<String>,
    pub portfolio_color: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FillRecord {
    pub id: i64,
    pub trade_id: i64,
    pub fill_time: String,
    pub side: String,
    pub qty: i64,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TradeImage {
    pub id: i64,
    pub trade_id: i64,
    pub filename: String,
    pub caption: String,
    pub uploaded_at: String,
}

/// A journal trade with its fills, tags, and images attached.
#[derive(Debug, Clone, Serialize)]
pub struct TradeRecord {
    pub id: i64,
    pub day_id: i64,
    pub trade_num: i64,
    pub direction: String,
    pub qty: i64,
    pub avg_entry: f64,
    pub avg_exit: f64,
    pub pnl: f64,
    pub entry_time: String,
    pub exit_time: String,
    pub is_open: bool,
    pub notes: String,
    pub fills: Vec<FillRecord>,
    /// group_id -> selected tags, ordered by group for stable rendering.
    pub tags: BTreeMap<String, Vec<String>>,
    pub images: Vec<TradeImage>,
    // Set when loaded via get_trade (joined against the day).
    pub date: Option<String>,
    pub portfolio_id: Option<i64>,
    pub portfolio_name: Option<String>,
    pub portfolio_color: Option<String>,
}

/// Fields for inserting a journal trade row.
#[derive(Debug, Clone)]
pub struct NewTrade {
    pub trade_num: i64,
    pub direction: String,
    pub qty: i64,
    pub avg_entry: f64,
    pub avg_exit: f64,
    pub pnl: f64,
    pub entry_time: String,
    pub exit_time: String,
    pub is_open: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DayFilter {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub portfolio_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct LiveFilter {
    pub status: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

/// Fields for creating a live trade row.
#[derive(Debug, Clone)]
pub struct NewLiveTrade {
    pub portfolio_id: Option<i64>,
    pub direction: String,
    pub instrument: String,
    pub entry_price: f64,
    pub entry_time: String,
    pub total_qty: i64,
    pub mode: String,
    pub notes: String,
    pub tags_json: String,
}

/// Partial update of a live trade; `None` fields are untouched.
#[derive(Debug, Clone, Default)]
pub struct LiveTradeUpdate {
    pub status: Option<String>,
    pub notes: Option<String>,
    pub tags_json: Option<String>,
    pub closed_at: Option<Option<String>>,
    pub realized_pnl: Option<f64>,
    pub journal_trade_id: Option<Option<i64>>,
}
