//! JSON API handlers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Local;
use serde_json::{json, Value};

use crate::adapters::import::import_file;
use crate::domain::instrument::{
    default_points, spec_for, trade_defaults, INSTRUMENTS, TRADE_DEFAULT_KEYS,
};
use crate::domain::journal::{LiveTradeUpdate, NewLiveTrade, NewTrade};
use crate::domain::live::{compute_plan, execution_pnl, recalculate, LiveExecution, LiveMode};
use crate::domain::reconstruct::{Direction, DEFAULT_POINT_VALUE};
use crate::domain::tags::{default_tag_groups, merge_tag_overrides};
use crate::ports::journal_port::JournalPort;

use super::handlers::AnalyticsQuery;
use super::{ApiError, AppState};

const ALLOWED_IMAGE_EXTS: [&str; 5] = [".jpg", ".jpeg", ".png", ".gif", ".webp"];
const DEFAULT_THEME: &str = "mint";

fn ok() -> Json<Value> {
    Json(json!({ "ok": true }))
}

// ── Import ──────────────────────────────────────────────────────────────

pub async fn import_fills(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut filename = None;
    let mut data = None;
    let mut portfolio_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                filename = field.file_name().map(str::to_string);
                data = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::bad_request(e.to_string()))?,
                );
            }
            "portfolio_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.to_string()))?;
                if !text.is_empty() {
                    portfolio_id = text.parse::<i64>().ok();
                }
            }
            _ => {}
        }
    }

    let data = data.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    let filename = filename
        .filter(|f| !f.is_empty())
        .ok_or_else(|| ApiError::bad_request("Empty filename"))?;

    let point_value = state
        .config
        .get_double("journal", "point_value", DEFAULT_POINT_VALUE);
    let days = import_file(
        state.journal.as_ref(),
        &filename,
        &data,
        portfolio_id,
        point_value,
    )?;
    Ok(Json(json!({ "days": days })))
}

// ── Trading days ────────────────────────────────────────────────────────

pub async fn delete_day(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    if state.journal.get_day(id)?.is_none() {
        return Err(ApiError::not_found("Day not found"));
    }
    state.journal.delete_day(id)?;
    Ok(Json(json!({ "ok": true, "deleted": id })))
}

// ── Trades ──────────────────────────────────────────────────────────────

#[derive(Debug, serde::Deserialize)]
pub struct TagsBody {
    pub group_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub async fn save_tags(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<TagsBody>,
) -> Result<Json<Value>, ApiError> {
    let group_id = body
        .group_id
        .filter(|g| !g.is_empty())
        .ok_or_else(|| ApiError::bad_request("group_id required"))?;
    state.journal.set_trade_tags(id, &group_id, &body.tags)?;
    Ok(ok())
}

#[derive(Debug, serde::Deserialize)]
pub struct NotesBody {
    #[serde(default)]
    pub notes: String,
}

pub async fn save_notes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<NotesBody>,
) -> Result<Json<Value>, ApiError> {
    state.journal.update_trade_notes(id, &body.notes)?;
    Ok(ok())
}

// ── Images ──────────────────────────────────────────────────────────────

pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    Path(trade_id): Path<i64>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut filename = None;
    let mut data = None;
    let mut caption = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        match field.name().unwrap_or_default() {
            "image" => {
                filename = field.file_name().map(str::to_string);
                data = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::bad_request(e.to_string()))?,
                );
            }
            "caption" => {
                caption = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(e.to_string()))?;
            }
            _ => {}
        }
    }

    let data = data.ok_or_else(|| ApiError::bad_request("No image file"))?;
    let original = filename.unwrap_or_default();
    let ext = original
        .rfind('.')
        .map(|i| original[i..].to_lowercase())
        .unwrap_or_default();
    if !ALLOWED_IMAGE_EXTS.contains(&ext.as_str()) {
        return Err(ApiError::unprocessable(format!(
            "File type {ext} not allowed. Use JPG, PNG, GIF or WebP."
        )));
    }

    let unique = format!(
        "trade_{trade_id}_{}{ext}",
        &uuid::Uuid::new_v4().simple().to_string()[..8]
    );
    std::fs::create_dir_all(&state.images_dir)
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    std::fs::write(state.images_dir.join(&unique), &data)
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let image_id = state.journal.add_trade_image(trade_id, &unique, &caption)?;
    Ok(Json(json!({
        "ok": true,
        "id": image_id,
        "url": format!("/images/{unique}"),
        "caption": caption,
    })))
}

#[derive(Debug, serde::Deserialize)]
pub struct CaptionBody {
    #[serde(default)]
    pub caption: String,
}

pub async fn update_caption(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<CaptionBody>,
) -> Result<Json<Value>, ApiError> {
    state.journal.update_image_caption(id, &body.caption)?;
    Ok(ok())
}

pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    if let Some(filename) = state.journal.delete_trade_image(id)? {
        let path = state.images_dir.join(filename);
        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
    }
    Ok(ok())
}

// ── Portfolios ──────────────────────────────────────────────────────────

#[derive(Debug, serde::Deserialize)]
pub struct PortfolioBody {
    pub name: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_color")]
    pub color: String,
}

fn default_color() -> String {
    "#4fffb0".to_string()
}

pub async fn create_portfolio(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PortfolioBody>,
) -> Result<Json<Value>, ApiError> {
    let name = body.name.as_deref().unwrap_or("").trim().to_string();
    if name.is_empty() {
        return Err(ApiError::bad_request("Portfolio name is required"));
    }
    let id = state
        .journal
        .create_portfolio(&name, &body.description, &body.color)
        .map_err(|e| ApiError::unprocessable(e.to_string()))?;
    Ok(Json(json!({ "ok": true, "id": id })))
}

pub async fn update_portfolio(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<PortfolioBody>,
) -> Result<Json<Value>, ApiError> {
    let name = body.name.as_deref().unwrap_or("").trim().to_string();
    if name.is_empty() {
        return Err(ApiError::bad_request("Portfolio name is required"));
    }
    state
        .journal
        .update_portfolio(id, &name, &body.description, &body.color)?;
    Ok(ok())
}

pub async fn delete_portfolio(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state.journal.delete_portfolio(id)?;
    Ok(ok())
}

pub async fn list_portfolios(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(serde_json::to_value(state.journal.list_portfolios()?).unwrap_or(Value::Null)))
}

// ── Settings ────────────────────────────────────────────────────────────

#[derive(Debug, serde::Deserialize)]
pub struct ThemeBody {
    pub theme: Option<String>,
}

pub async fn save_theme(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ThemeBody>,
) -> Result<Json<Value>, ApiError> {
    let theme = body.theme.unwrap_or_else(|| DEFAULT_THEME.to_string());
    state.journal.set_setting("theme", &theme)?;
    Ok(ok())
}

pub async fn get_theme(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let theme = state
        .journal
        .get_setting("theme")?
        .unwrap_or_else(|| DEFAULT_THEME.to_string());
    Ok(Json(json!({ "theme": theme })))
}

pub async fn get_tag_config(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let groups = merge_tag_overrides(state.journal.tag_overrides()?);
    Ok(Json(serde_json::to_value(groups).unwrap_or(Value::Null)))
}

#[derive(Debug, serde::Deserialize)]
pub struct TagConfigBody {
    pub tags: Option<Value>,
}

pub async fn save_tag_config(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<String>,
    Json(body): Json<TagConfigBody>,
) -> Result<Json<Value>, ApiError> {
    let Some(Value::Array(raw)) = body.tags else {
        return Err(ApiError::bad_request("tags must be a list"));
    };
    let tags: Vec<String> = raw
        .iter()
        .filter_map(|v| v.as_str())
        .map(str::to_string)
        .filter(|t| !t.trim().is_empty())
        .collect();
    state.journal.save_tag_override(&group_id, &tags)?;
    Ok(Json(json!({ "ok": true, "group_id": group_id, "tags": tags })))
}

pub async fn reset_tag_config(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.journal.reset_tag_override(&group_id)?;
    let tags: Vec<String> = default_tag_groups()
        .into_iter()
        .find(|g| g.id == group_id)
        .map(|g| g.tags)
        .unwrap_or_default();
    Ok(Json(json!({ "ok": true, "tags": tags })))
}

pub async fn save_trade_defaults(
    State(state): State<Arc<AppState>>,
    Json(body): Json<HashMap<String, Value>>,
) -> Result<Json<Value>, ApiError> {
    for &(key, _) in TRADE_DEFAULT_KEYS {
        if let Some(v) = body.get(key) {
            state.journal.set_setting(&format!("td_{key}"), &value_string(v))?;
        }
    }
    Ok(ok())
}

pub async fn save_instrument_config(
    State(state): State<Arc<AppState>>,
    Json(body): Json<HashMap<String, HashMap<String, Value>>>,
) -> Result<Json<Value>, ApiError> {
    for &sym in INSTRUMENTS {
        let Some(cfg) = body.get(sym) else { continue };
        for (field, suffix) in [
            ("dollars_per_point", "dpp"),
            ("dollars_per_tick", "dpt"),
            ("ticks_per_point", "tpp"),
        ] {
            if let Some(v) = cfg.get(field) {
                state
                    .journal
                    .set_setting(&format!("inst_{sym}_{suffix}"), &value_string(v))?;
            }
        }
    }
    Ok(ok())
}

fn value_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ── Analytics ───────────────────────────────────────────────────────────

pub async fn analytics(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<Value>, ApiError> {
    let portfolio_id = query
        .portfolio
        .as_deref()
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse().ok());
    let data = state.journal.analytics(portfolio_id)?;
    Ok(Json(serde_json::to_value(data).unwrap_or(Value::Null)))
}

// ── Database admin ──────────────────────────────────────────────────────

pub async fn db_export(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let sql = state.journal.dump_sql()?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=tradejournal_backup.sql",
            ),
        ],
        sql,
    )
        .into_response())
}

pub async fn db_import(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut filename = None;
    let mut data = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        if field.name() == Some("file") {
            filename = field.file_name().map(str::to_string);
            data = Some(
                field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(e.to_string()))?,
            );
        }
    }

    let data = data.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    if !filename.unwrap_or_default().ends_with(".sql") {
        return Err(ApiError::unprocessable("Please upload a .sql file"));
    }
    let sql = String::from_utf8(data.to_vec())
        .map_err(|_| ApiError::unprocessable("File is not valid UTF-8"))?;

    state.journal.restore_sql(&sql)?;
    Ok(Json(json!({ "ok": true, "message": "Database restored successfully." })))
}

// ── Live trades ─────────────────────────────────────────────────────────

#[derive(Debug, serde::Deserialize)]
pub struct CreateLiveBody {
    pub direction: Option<String>,
    pub instrument: Option<String>,
    pub entry_price: Option<f64>,
    pub entry_time: Option<String>,
    pub total_qty: Option<i64>,
    pub mode: Option<String>,
    pub portfolio_id: Option<i64>,
    #[serde(default)]
    pub notes: String,
    pub tags: Option<Value>,
}

pub async fn create_live_trade(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateLiveBody>,
) -> Result<Json<Value>, ApiError> {
    let required = |name: &str| ApiError::bad_request(format!("{name} is required"));
    let direction = body.direction.ok_or_else(|| required("direction"))?;
    let instrument = body.instrument.ok_or_else(|| required("instrument"))?;
    let entry_price = body.entry_price.ok_or_else(|| required("entry_price"))?;
    let entry_time = body.entry_time.ok_or_else(|| required("entry_time"))?;
    let total_qty = body.total_qty.ok_or_else(|| required("total_qty"))?;
    let mode = body.mode.ok_or_else(|| required("mode"))?;

    let tags_json = body
        .tags
        .map(|t| t.to_string())
        .unwrap_or_else(|| "{}".to_string());

    let live_id = state.journal.create_live_trade(&NewLiveTrade {
        portfolio_id: body.portfolio_id,
        direction: direction.clone(),
        instrument: instrument.clone(),
        entry_price,
        entry_time,
        total_qty,
        mode: mode.clone(),
        notes: body.notes,
        tags_json,
    })?;

    // Store the default stop/TP plan alongside the trade.
    let settings = state.journal.all_settings()?;
    let spec = spec_for(&settings, &instrument);
    let defaults = trade_defaults(&settings);
    let dir = Direction::parse(&direction).unwrap_or(Direction::Long);
    let live_mode = LiveMode::parse(&mode).unwrap_or(LiveMode::Full);
    let (stop_points, tp_points) = match live_mode {
        LiveMode::Full => (
            default_points(&defaults, "full_stop_points"),
            vec![default_points(&defaults, "full_tp_points")],
        ),
        LiveMode::Partials => (
            default_points(&defaults, "partial_stop_points"),
            vec![
                default_points(&defaults, "partial_tp1_points"),
                default_points(&defaults, "partial_tp2_points"),
                default_points(&defaults, "partial_tp3_points"),
            ],
        ),
    };
    let levels = compute_plan(dir, &spec, entry_price, total_qty, live_mode, stop_points, &tp_points);
    state.journal.set_live_levels(live_id, &levels)?;

    Ok(Json(json!({ "ok": true, "id": live_id })))
}

#[derive(Debug, serde::Deserialize)]
pub struct UpdateLiveBody {
    pub notes: Option<String>,
    pub status: Option<String>,
    pub tags_json: Option<String>,
    pub tags: Option<Value>,
}

pub async fn update_live_trade(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateLiveBody>,
) -> Result<Json<Value>, ApiError> {
    let tags_json = body.tags.map(|t| t.to_string()).or(body.tags_json);
    state.journal.update_live_trade(
        id,
        &LiveTradeUpdate {
            status: body.status,
            notes: body.notes,
            tags_json,
            ..Default::default()
        },
    )?;
    Ok(ok())
}

pub async fn delete_live_trade(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    state.journal.delete_live_trade(id)?;
    Ok(ok())
}

#[derive(Debug, serde::Deserialize)]
pub struct LevelsBody {
    #[serde(default)]
    pub levels: Vec<crate::domain::live::LiveLevel>,
}

pub async fn update_live_levels(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<LevelsBody>,
) -> Result<Json<Value>, ApiError> {
    state.journal.set_live_levels(id, &body.levels)?;
    let trade = state
        .journal
        .get_live_trade(id)?
        .ok_or_else(|| ApiError::not_found("Trade not found"))?;
    let settings = state.journal.all_settings()?;
    let calc = recalculate(&trade, &spec_for(&settings, &trade.instrument));
    Ok(Json(json!({ "ok": true, "calc": calc })))
}

#[derive(Debug, serde::Deserialize)]
pub struct ExecuteBody {
    pub exec_type: Option<String>,
    pub portion: Option<i64>,
    pub qty: Option<i64>,
    pub price: Option<f64>,
    pub exec_time: Option<String>,
}

pub async fn live_execute(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<ExecuteBody>,
) -> Result<Json<Value>, ApiError> {
    let required = |name: &str| ApiError::bad_request(format!("{name} is required"));
    let exec_type = body.exec_type.ok_or_else(|| required("exec_type"))?;
    let portion = body.portion.ok_or_else(|| required("portion"))?;
    let qty = body.qty.ok_or_else(|| required("qty"))?;
    let price = body.price.ok_or_else(|| required("price"))?;
    let exec_time = body.exec_time.ok_or_else(|| required("exec_time"))?;

    let trade = state
        .journal
        .get_live_trade(id)?
        .ok_or_else(|| ApiError::not_found("Trade not found"))?;

    let settings = state.journal.all_settings()?;
    let spec = spec_for(&settings, &trade.instrument);
    let pnl = execution_pnl(trade.direction(), &spec, trade.entry_price, price, qty);

    let exec_id = state.journal.add_live_execution(
        id,
        &LiveExecution {
            id: 0,
            exec_type,
            portion,
            qty,
            price,
            exec_time,
            pnl,
        },
    )?;

    let trade = state
        .journal
        .get_live_trade(id)?
        .ok_or_else(|| ApiError::not_found("Trade not found"))?;
    let calc = recalculate(&trade, &spec);

    Ok(Json(json!({ "ok": true, "exec_id": exec_id, "pnl": pnl, "calc": calc })))
}

pub async fn live_push(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let trade = state
        .journal
        .get_live_trade(id)?
        .ok_or_else(|| ApiError::not_found("Trade not found"))?;
    if trade.journal_trade_id.is_some() {
        return Err(ApiError::unprocessable("Already pushed to journal"));
    }

    let settings = state.journal.all_settings()?;
    let journal_trade_id = push_live_to_journal(state.journal.as_ref(), &trade, &settings)?;
    Ok(Json(json!({ "ok": true, "journal_trade_id": journal_trade_id })))
}

/// Writes a live trade into the journal as a reconstructed trade and marks
/// it closed. The trade does not need to be fully exited; the user decides
/// when to push.
fn push_live_to_journal(
    journal: &dyn JournalPort,
    trade: &crate::domain::live::LiveTrade,
    settings: &HashMap<String, String>,
) -> Result<i64, ApiError> {
    let spec = spec_for(settings, &trade.instrument);
    let calc = recalculate(trade, &spec);

    let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
    let day_id = match journal.find_day(&today, trade.portfolio_id)? {
        Some(id) => id,
        None => journal.upsert_day(&today, trade.portfolio_id)?,
    };
    let trade_num = journal.next_trade_num(day_id)?;

    // Value-weighted average exit over executions; entry price if none.
    let exit_qty: i64 = trade.executions.iter().map(|e| e.qty).sum();
    let avg_exit = if exit_qty > 0 {
        let exit_val: f64 = trade.executions.iter().map(|e| e.price * e.qty as f64).sum();
        (exit_val / exit_qty as f64 * 10_000.0).round() / 10_000.0
    } else {
        trade.entry_price
    };
    let exit_time = trade
        .executions
        .last()
        .map(|e| e.exec_time.clone())
        .unwrap_or_else(|| trade.entry_time.clone());

    let trade_id = journal.insert_trade(
        day_id,
        &NewTrade {
            trade_num,
            direction: trade.direction.clone(),
            qty: trade.total_qty,
            avg_entry: trade.entry_price,
            avg_exit,
            pnl: calc.realized_pnl,
            entry_time: trade.entry_time.clone(),
            exit_time,
            is_open: calc.remaining_qty > 0,
        },
    )?;

    if let Ok(Value::Object(tags)) = serde_json::from_str::<Value>(&trade.tags_json) {
        for (group_id, list) in tags {
            let tags: Vec<String> = list
                .as_array()
                .map(|a| {
                    a.iter()
                        .filter_map(|v| v.as_str())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            journal.set_trade_tags(trade_id, &group_id, &tags)?;
        }
    }
    if !trade.notes.is_empty() {
        journal.update_trade_notes(trade_id, &trade.notes)?;
    }

    // Entry is one fill; each execution is a fill on the opposite side.
    let dir = trade.direction();
    let entry_side = match dir {
        Direction::Long => "Buy",
        Direction::Short => "Sell",
    };
    let exit_side = match dir {
        Direction::Long => "Sell",
        Direction::Short => "Buy",
    };
    journal.insert_fill(
        trade_id,
        &trade.entry_time,
        entry_side,
        trade.total_qty,
        trade.entry_price,
    )?;
    for e in &trade.executions {
        journal.insert_fill(trade_id, &e.exec_time, exit_side, e.qty, e.price)?;
    }

    journal.update_live_trade(
        trade.id,
        &LiveTradeUpdate {
            status: Some("closed".to_string()),
            closed_at: Some(Some(today)),
            realized_pnl: Some(calc.realized_pnl),
            journal_trade_id: Some(Some(trade_id)),
            ..Default::default()
        },
    )?;

    Ok(trade_id)
}

pub async fn delete_execution(
    State(state): State<Arc<AppState>>,
    Path((id, exec_id)): Path<(i64, i64)>,
) -> Result<Json<Value>, ApiError> {
    state.journal.delete_live_execution(exec_id)?;

    let trade = state
        .journal
        .get_live_trade(id)?
        .ok_or_else(|| ApiError::not_found("Trade not found"))?;
    let settings = state.journal.all_settings()?;
    let calc = recalculate(&trade, &spec_for(&settings, &trade.instrument));

    // Removing an exit can reopen a closed trade.
    if trade.status == "closed" && !calc.is_closed {
        state.journal.update_live_trade(
            id,
            &LiveTradeUpdate {
                status: Some("open".to_string()),
                closed_at: Some(None),
                journal_trade_id: Some(None),
                ..Default::default()
            },
        )?;
    }
    Ok(Json(json!({ "ok": true, "calc": calc })))
}

pub async fn live_recalc(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, ApiError> {
    let trade = state
        .journal
        .get_live_trade(id)?
        .ok_or_else(|| ApiError::not_found("Trade not found"))?;
    let settings = state.journal.all_settings()?;
    let calc = recalculate(&trade, &spec_for(&settings, &trade.instrument));
    Ok(Json(serde_json::to_value(calc).unwrap_or(Value::Null)))
}
