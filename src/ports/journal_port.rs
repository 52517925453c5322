//! Persistence port trait: every storage operation the application needs.

use std::collections::HashMap;

use crate::domain::analytics::Analytics;
use crate::domain::error::JournalError;
use crate::domain::journal::{
    Day, DayFilter, DaySummary, FillRecord, LiveFilter, LiveTradeUpdate, NewLiveTrade, NewTrade,
    Portfolio, PortfolioSummary, TradeImage, TradeRecord,
};
use crate::domain::live::{LiveExecution, LiveLevel, LiveTrade};

pub trait JournalPort {
    // Portfolios
    fn list_portfolios(&self) -> Result<Vec<PortfolioSummary>, JournalError>;
    fn get_portfolio(&self, id: i64) -> Result<Option<Portfolio>, JournalError>;
    fn create_portfolio(
        &self,
        name: &str,
        description: &str,
        color: &str,
    ) -> Result<i64, JournalError>;
    fn update_portfolio(
        &self,
        id: i64,
        name: &str,
        description: &str,
        color: &str,
    ) -> Result<(), JournalError>;
    fn delete_portfolio(&self, id: i64) -> Result<(), JournalError>;

    // Trading days
    fn list_days(&self, filter: &DayFilter) -> Result<Vec<DaySummary>, JournalError>;
    fn get_day(&self, id: i64) -> Result<Option<Day>, JournalError>;
    /// First matching day for a date, regardless of portfolio.
    fn get_day_by_date(&self, date: &str) -> Result<Option<Day>, JournalError>;
    fn find_day(&self, date: &str, portfolio_id: Option<i64>) -> Result<Option<i64>, JournalError>;
    fn upsert_day(&self, date: &str, portfolio_id: Option<i64>) -> Result<i64, JournalError>;
    fn delete_day(&self, id: i64) -> Result<(), JournalError>;

    // Trades and fills
    fn trades_for_day(&self, day_id: i64) -> Result<Vec<TradeRecord>, JournalError>;
    fn get_trade(&self, id: i64) -> Result<Option<TradeRecord>, JournalError>;
    fn insert_trade(&self, day_id: i64, trade: &NewTrade) -> Result<i64, JournalError>;
    fn insert_fill(
        &self,
        trade_id: i64,
        fill_time: &str,
        side: &str,
        qty: i64,
        price: f64,
    ) -> Result<(), JournalError>;
    fn fills_for_trade(&self, trade_id: i64) -> Result<Vec<FillRecord>, JournalError>;
    fn update_trade_notes(&self, trade_id: i64, notes: &str) -> Result<(), JournalError>;
    fn set_trade_tags(
        &self,
        trade_id: i64,
        group_id: &str,
        tags: &[String],
    ) -> Result<(), JournalError>;
    fn next_trade_num(&self, day_id: i64) -> Result<i64, JournalError>;

    // Trade images
    fn add_trade_image(
        &self,
        trade_id: i64,
        filename: &str,
        caption: &str,
    ) -> Result<i64, JournalError>;
    fn trade_images(&self, trade_id: i64) -> Result<Vec<TradeImage>, JournalError>;
    fn update_image_caption(&self, image_id: i64, caption: &str) -> Result<(), JournalError>;
    /// Deletes the row and returns the stored filename, if any.
    fn delete_trade_image(&self, image_id: i64) -> Result<Option<String>, JournalError>;

    // Tag configuration overrides
    fn tag_overrides(&self) -> Result<Option<HashMap<String, Vec<String>>>, JournalError>;
    fn save_tag_override(&self, group_id: &str, tags: &[String]) -> Result<(), JournalError>;
    fn reset_tag_override(&self, group_id: &str) -> Result<(), JournalError>;

    // App configuration (key-value)
    fn get_setting(&self, key: &str) -> Result<Option<String>, JournalError>;
    fn set_setting(&self, key: &str, value: &str) -> Result<(), JournalError>;
    fn all_settings(&self) -> Result<HashMap<String, String>, JournalError>;

    // Live trades
    fn create_live_trade(&self, trade: &NewLiveTrade) -> Result<i64, JournalError>;
    fn get_live_trade(&self, id: i64) -> Result<Option<LiveTrade>, JournalError>;
    fn list_live_trades(&self, filter: &LiveFilter) -> Result<Vec<LiveTrade>, JournalError>;
    fn update_live_trade(&self, id: i64, update: &LiveTradeUpdate) -> Result<(), JournalError>;
    fn delete_live_trade(&self, id: i64) -> Result<(), JournalError>;
    fn set_live_levels(&self, live_id: i64, levels: &[LiveLevel]) -> Result<(), JournalError>;
    fn add_live_execution(
        &self,
        live_id: i64,
        execution: &LiveExecution,
    ) -> Result<i64, JournalError>;
    fn delete_live_execution(&self, exec_id: i64) -> Result<(), JournalError>;

    // Analytics
    fn analytics(&self, portfolio_id: Option<i64>) -> Result<Analytics, JournalError>;

    // Backup / restore
    fn dump_sql(&self) -> Result<String, JournalError>;
    fn restore_sql(&self, sql: &str) -> Result<(), JournalError>;
}
