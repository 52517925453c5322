//! HTML templates using Askama.
//!
//! Handlers flatten domain records into the small view structs here so the
//! templates stay free of formatting logic.

use askama::Template;
use askama_web::WebTemplate;

use crate::domain::analytics::Analytics;
use crate::domain::instrument::InstrumentSpec;
use crate::domain::journal::{Day, DaySummary, PortfolioSummary, TradeRecord};
use crate::domain::live::{LiveCalc, LiveTrade};
use crate::domain::tags::TagGroup;

pub fn fmt_money(v: f64) -> String {
    if v < 0.0 {
        format!("-${:.2}", v.abs())
    } else {
        format!("${v:.2}")
    }
}

pub fn pnl_class(v: f64) -> &'static str {
    if v > 0.0 {
        "pnl-pos"
    } else if v < 0.0 {
        "pnl-neg"
    } else {
        "pnl-flat"
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub message: String,
    pub status: u16,
}

pub struct DayRow {
    pub id: i64,
    pub date: String,
    pub portfolio: String,
    pub portfolio_color: String,
    pub trade_count: i64,
    pub pnl: String,
    pub pnl_class: &'static str,
    pub wins: i64,
}

impl From<&DaySummary> for DayRow {
    fn from(d: &DaySummary) -> Self {
        let pnl = d.total_pnl.unwrap_or(0.0);
        Self {
            id: d.id,
            date: d.date.clone(),
            portfolio: d.portfolio_name.clone().unwrap_or_default(),
            portfolio_color: d.portfolio_color.clone().unwrap_or_default(),
            trade_count: d.trade_count,
            pnl: fmt_money(pnl),
            pnl_class: pnl_class(pnl),
            wins: d.wins.unwrap_or(0),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub theme: String,
    pub days: Vec<DayRow>,
    pub portfolios: Vec<PortfolioSummary>,
    pub date_from: String,
    pub date_to: String,
    pub preset: String,
    pub portfolio_id: String,
}

pub struct TradeRow {
    pub id: i64,
    pub trade_num: i64,
    pub direction: String,
    pub qty: i64,
    pub avg_entry: String,
    pub avg_exit: String,
    pub entry_time: String,
    pub exit_time: String,
    pub pnl: String,
    pub pnl_class: &'static str,
    pub is_open: bool,
    pub fill_count: usize,
    pub tag_count: usize,
    pub image_count: usize,
}

impl From<&TradeRecord> for TradeRow {
    fn from(t: &TradeRecord) -> Self {
        Self {
            id: t.id,
            trade_num: t.trade_num,
            direction: t.direction.clone(),
            qty: t.qty,
            avg_entry: format!("{:.2}", t.avg_entry),
            avg_exit: format!("{:.2}", t.avg_exit),
            entry_time: t.entry_time.clone(),
            exit_time: t.exit_time.clone(),
            pnl: fmt_money(t.pnl),
            pnl_class: pnl_class(t.pnl),
            is_open: t.is_open,
            fill_count: t.fills.len(),
            tag_count: t.tags.values().map(Vec::len).sum(),
            image_count: t.images.len(),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "day.html")]
pub struct DayTemplate {
    pub theme: String,
    pub day: Day,
    pub trades: Vec<TradeRow>,
    pub total_pnl: String,
    pub total_pnl_class: &'static str,
}

pub struct TagChoice {
    pub name: String,
    pub selected: bool,
}

pub struct TagGroupView {
    pub id: &'static str,
    pub label: &'static str,
    pub dot: &'static str,
    pub multi: bool,
    pub choices: Vec<TagChoice>,
}

/// Tag groups with selection state for one trade.
pub fn tag_group_views(
    groups: &[TagGroup],
    selected: &std::collections::BTreeMap<String, Vec<String>>,
) -> Vec<TagGroupView> {
    groups
        .iter()
        .map(|g| {
            let picked = selected.get(g.id);
            TagGroupView {
                id: g.id,
                label: g.label,
                dot: g.dot,
                multi: g.multi,
                choices: g
                    .tags
                    .iter()
                    .map(|t| TagChoice {
                        name: t.clone(),
                        selected: picked.is_some_and(|p| p.contains(t)),
                    })
                    .collect(),
            }
        })
        .collect()
}

#[derive(Template, WebTemplate)]
#[template(path = "trade.html")]
pub struct TradeTemplate {
    pub theme: String,
    pub trade: TradeRecord,
    pub date: String,
    pub pnl: String,
    pub pnl_class: &'static str,
    pub tag_groups: Vec<TagGroupView>,
    pub tags_json: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "analytics.html")]
pub struct AnalyticsTemplate {
    pub theme: String,
    pub data: Analytics,
    pub data_json: String,
    pub portfolios: Vec<PortfolioSummary>,
    pub portfolio_id: String,
    pub total_pnl: String,
    pub total_pnl_class: &'static str,
    pub win_rate: String,
    pub streak_history: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "portfolios.html")]
pub struct PortfoliosTemplate {
    pub theme: String,
    pub portfolios: Vec<PortfolioSummary>,
}

pub struct InstrumentRow {
    pub symbol: String,
    pub dollars_per_point: f64,
    pub dollars_per_tick: f64,
    pub ticks_per_point: i64,
}

impl InstrumentRow {
    pub fn new(symbol: &str, spec: &InstrumentSpec) -> Self {
        Self {
            symbol: symbol.to_string(),
            dollars_per_point: spec.dollars_per_point,
            dollars_per_tick: spec.dollars_per_tick,
            ticks_per_point: spec.ticks_per_point,
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "settings.html")]
pub struct SettingsTemplate {
    pub theme: String,
    pub tag_groups: Vec<TagGroup>,
    pub trade_defaults: Vec<(String, String)>,
    pub instruments: Vec<InstrumentRow>,
}

pub struct LiveRow {
    pub id: i64,
    pub direction: String,
    pub instrument: String,
    pub entry_price: String,
    pub entry_time: String,
    pub total_qty: i64,
    pub mode: String,
    pub status: String,
    pub created_at: String,
    pub remaining_qty: i64,
    pub realized: String,
    pub realized_class: &'static str,
    pub current_risk: String,
    pub potential_reward: String,
}

impl LiveRow {
    pub fn new(trade: &LiveTrade, calc: &LiveCalc) -> Self {
        Self {
            id: trade.id,
            direction: trade.direction.clone(),
            instrument: trade.instrument.clone(),
            entry_price: format!("{:.2}", trade.entry_price),
            entry_time: trade.entry_time.clone(),
            total_qty: trade.total_qty,
            mode: trade.mode.clone(),
            status: trade.status.clone(),
            created_at: trade.created_at.clone(),
            remaining_qty: calc.remaining_qty,
            realized: fmt_money(calc.realized_pnl),
            realized_class: pnl_class(calc.realized_pnl),
            current_risk: fmt_money(calc.current_risk),
            potential_reward: fmt_money(calc.potential_reward),
        }
    }
}

pub struct ClosedLiveRow {
    pub id: i64,
    pub direction: String,
    pub instrument: String,
    pub entry_price: String,
    pub total_qty: i64,
    pub closed_at: String,
    pub realized: String,
    pub realized_class: &'static str,
    pub pushed: bool,
}

impl From<&LiveTrade> for ClosedLiveRow {
    fn from(t: &LiveTrade) -> Self {
        Self {
            id: t.id,
            direction: t.direction.clone(),
            instrument: t.instrument.clone(),
            entry_price: format!("{:.2}", t.entry_price),
            total_qty: t.total_qty,
            closed_at: t.closed_at.clone().unwrap_or_default(),
            realized: fmt_money(t.realized_pnl),
            realized_class: pnl_class(t.realized_pnl),
            pushed: t.journal_trade_id.is_some(),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "live_ticket.html")]
pub struct LiveTicketTemplate {
    pub theme: String,
    pub open_trades: Vec<LiveRow>,
    pub closed_trades: Vec<ClosedLiveRow>,
    pub tags_json: String,
    pub trade_defaults_json: String,
    pub instrument_config_json: String,
    pub active_range: String,
    pub date_from: String,
    pub date_to: String,
}
