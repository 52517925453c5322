//! Page handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{Duration, Local};

use crate::domain::instrument::{instrument_config, trade_defaults, InstrumentSpec};
use crate::domain::journal::{DayFilter, LiveFilter};
use crate::domain::live::recalculate;
use crate::domain::tags::merge_tag_overrides;

use super::templates::{self, fmt_money, pnl_class};
use super::{AppState, WebError};

const DEFAULT_THEME: &str = "mint";

fn theme(state: &AppState) -> Result<String, WebError> {
    Ok(state
        .journal
        .get_setting("theme")?
        .unwrap_or_else(|| DEFAULT_THEME.to_string()))
}

fn today() -> chrono::NaiveDate {
    Local::now().date_naive()
}

#[derive(Debug, serde::Deserialize)]
pub struct IndexQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub preset: Option<String>,
    pub portfolio: Option<String>,
}

fn parse_portfolio(raw: &Option<String>) -> Option<i64> {
    raw.as_deref().filter(|s| !s.is_empty())?.parse().ok()
}

pub async fn index(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IndexQuery>,
) -> Result<Response, WebError> {
    let today = today();
    let date_from = query
        .from
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| (today - Duration::days(30)).format("%Y-%m-%d").to_string());
    let date_to = query
        .to
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| today.format("%Y-%m-%d").to_string());
    let portfolio_id = parse_portfolio(&query.portfolio);

    let days = state.journal.list_days(&DayFilter {
        date_from: Some(date_from.clone()),
        date_to: Some(date_to.clone()),
        portfolio_id,
    })?;
    let portfolios = state.journal.list_portfolios()?;

    let template = templates::IndexTemplate {
        theme: theme(&state)?,
        days: days.iter().map(Into::into).collect(),
        portfolios,
        date_from,
        date_to,
        preset: query.preset.unwrap_or_else(|| "30d".to_string()),
        portfolio_id: portfolio_id.map(|p| p.to_string()).unwrap_or_default(),
    };
    Ok(template.into_response())
}

/// `/day/{key}` accepts either a numeric day id or a `YYYY-MM-DD` date. A
/// date resolves to the first matching day and redirects to its id.
pub async fn day_view(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Response, WebError> {
    let day = match key.parse::<i64>() {
        Ok(id) => state
            .journal
            .get_day(id)?
            .ok_or_else(|| WebError::not_found(format!("Day #{id} not found")))?,
        Err(_) => {
            let day = state
                .journal
                .get_day_by_date(&key)?
                .ok_or_else(|| WebError::not_found(format!("No data for {key}")))?;
            return Ok(Redirect::to(&format!("/day/{}", day.id)).into_response());
        }
    };

    let trades = state.journal.trades_for_day(day.id)?;
    let total: f64 = trades.iter().map(|t| t.pnl).sum();

    let template = templates::DayTemplate {
        theme: theme(&state)?,
        day,
        trades: trades.iter().map(Into::into).collect(),
        total_pnl: fmt_money(total),
        total_pnl_class: pnl_class(total),
    };
    Ok(template.into_response())
}

pub async fn trade_view(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Response, WebError> {
    let trade = state
        .journal
        .get_trade(id)?
        .ok_or_else(|| WebError::not_found(format!("Trade #{id} not found")))?;

    let groups = merge_tag_overrides(state.journal.tag_overrides()?);
    let template = templates::TradeTemplate {
        theme: theme(&state)?,
        date: trade.date.clone().unwrap_or_default(),
        pnl: fmt_money(trade.pnl),
        pnl_class: pnl_class(trade.pnl),
        tag_groups: templates::tag_group_views(&groups, &trade.tags),
        tags_json: serde_json::to_string(&groups).unwrap_or_else(|_| "[]".to_string()),
        trade,
    };
    Ok(template.into_response())
}

#[derive(Debug, serde::Deserialize)]
pub struct AnalyticsQuery {
    pub portfolio: Option<String>,
}

pub async fn analytics_view(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Response, WebError> {
    let portfolio_id = parse_portfolio(&query.portfolio);
    let data = state.journal.analytics(portfolio_id)?;
    let portfolios = state.journal.list_portfolios()?;

    let total = data.overall.total_trades;
    let win_rate = if total > 0 {
        format!("{:.1}%", 100.0 * data.overall.wins as f64 / total as f64)
    } else {
        "0.0%".to_string()
    };

    let template = templates::AnalyticsTemplate {
        theme: theme(&state)?,
        data_json: serde_json::to_string(&data).unwrap_or_else(|_| "{}".to_string()),
        portfolios,
        portfolio_id: portfolio_id.map(|p| p.to_string()).unwrap_or_default(),
        total_pnl: fmt_money(data.overall.total_pnl),
        total_pnl_class: pnl_class(data.overall.total_pnl),
        win_rate,
        streak_history: data.streaks.history.iter().collect(),
        data,
    };
    Ok(template.into_response())
}

pub async fn portfolios_view(State(state): State<Arc<AppState>>) -> Result<Response, WebError> {
    let template = templates::PortfoliosTemplate {
        theme: theme(&state)?,
        portfolios: state.journal.list_portfolios()?,
    };
    Ok(template.into_response())
}

pub async fn settings_view(State(state): State<Arc<AppState>>) -> Result<Response, WebError> {
    let settings = state.journal.all_settings()?;
    let tag_groups = merge_tag_overrides(state.journal.tag_overrides()?);

    let defaults = trade_defaults(&settings);
    let mut trade_default_rows: Vec<(String, String)> = Vec::new();
    for &(key, _) in crate::domain::instrument::TRADE_DEFAULT_KEYS {
        if let Some(v) = defaults.get(key) {
            trade_default_rows.push((key.to_string(), v.clone()));
        }
    }

    let config = instrument_config(&settings);
    let instruments = crate::domain::instrument::INSTRUMENTS
        .iter()
        .filter_map(|&sym| config.get(sym).map(|spec| (sym, spec)))
        .map(|(sym, spec): (&str, &InstrumentSpec)| templates::InstrumentRow::new(sym, spec))
        .collect();

    let template = templates::SettingsTemplate {
        theme: theme(&state)?,
        tag_groups,
        trade_defaults: trade_default_rows,
        instruments,
    };
    Ok(template.into_response())
}

#[derive(Debug, serde::Deserialize)]
pub struct LiveQuery {
    pub range: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

pub async fn live_view(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LiveQuery>,
) -> Result<Response, WebError> {
    let today = today();
    let iso = |d: chrono::NaiveDate| d.format("%Y-%m-%d").to_string();

    let range = query.range.unwrap_or_else(|| "today".to_string());
    let custom_from = query.from.unwrap_or_default();
    let custom_to = query.to.unwrap_or_default();
    let (date_from, date_to) = match range.as_str() {
        "yesterday" => {
            let yd = today - Duration::days(1);
            (iso(yd), iso(yd))
        }
        "week" => (iso(today - Duration::days(7)), iso(today)),
        "month" => (iso(today - Duration::days(30)), iso(today)),
        "custom" if !custom_from.is_empty() && !custom_to.is_empty() => {
            (custom_from.clone(), custom_to.clone())
        }
        _ => (iso(today), iso(today)),
    };

    let filter = |status: &str| LiveFilter {
        status: Some(status.to_string()),
        date_from: Some(date_from.clone()),
        date_to: Some(date_to.clone()),
    };
    let open = state.journal.list_live_trades(&filter("open"))?;
    let closed = state.journal.list_live_trades(&filter("closed"))?;

    let settings = state.journal.all_settings()?;
    let open_trades = open
        .iter()
        .map(|t| {
            let spec = crate::domain::instrument::spec_for(&settings, &t.instrument);
            templates::LiveRow::new(t, &recalculate(t, &spec))
        })
        .collect();

    let groups = merge_tag_overrides(state.journal.tag_overrides()?);
    let template = templates::LiveTicketTemplate {
        theme: theme(&state)?,
        open_trades,
        closed_trades: closed.iter().map(Into::into).collect(),
        tags_json: serde_json::to_string(&groups).unwrap_or_else(|_| "[]".to_string()),
        trade_defaults_json: serde_json::to_string(&trade_defaults(&settings))
            .unwrap_or_else(|_| "{}".to_string()),
        instrument_config_json: serde_json::to_string(&instrument_config(&settings))
            .unwrap_or_else(|_| "{}".to_string()),
        active_range: range,
        date_from,
        date_to,
    };
    Ok(template.into_response())
}

pub async fn not_found() -> Response {
    WebError::new(StatusCode::NOT_FOUND, "Page not found").into_response()
}
