//! Live order-ticket engine: stop/TP plan computation and the running
//! risk/P&L recalculation for open live trades.

use serde::{Deserialize, Serialize};

use crate::domain::instrument::InstrumentSpec;
use crate::domain::reconstruct::{round2, Direction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveMode {
    Full,
    Partials,
}

impl LiveMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LiveMode::Full => "full",
            LiveMode::Partials => "partials",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "full" => Some(LiveMode::Full),
            "partials" => Some(LiveMode::Partials),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelType {
    Stop,
    Tp,
}

impl LevelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LevelType::Stop => "stop",
            LevelType::Tp => "tp",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "stop" => Some(LevelType::Stop),
            "tp" => Some(LevelType::Tp),
            _ => None,
        }
    }
}

/// A stop or take-profit level attached to a live trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveLevel {
    pub level_type: LevelType,
    pub portion: i64,
    pub qty: i64,
    pub price: f64,
    #[serde(default)]
    pub risk_dollars: f64,
    #[serde(default)]
    pub reward_dollars: f64,
}

/// A recorded exit against a live trade (stop hit, TP hit, or manual).
#[derive(Debug, Clone, Serialize)]
pub struct LiveExecution {
    pub id: i64,
    pub exec_type: String,
    pub portion: i64,
    pub qty: i64,
    pub price: f64,
    pub exec_time: String,
    pub pnl: f64,
}

/// A live trade with its levels and execution log, as loaded from storage.
#[derive(Debug, Clone, Serialize)]
pub struct LiveTrade {
    pub id: i64,
    pub portfolio_id: Option<i64>,
    pub portfolio_name: Option<String>,
    pub portfolio_color: Option<String>,
    pub status: String,
    pub direction: String,
    pub instrument: String,
    pub entry_price: f64,
    pub entry_time: String,
    pub total_qty: i64,
    pub mode: String,
    pub notes: String,
    pub tags_json: String,
    pub created_at: String,
    pub closed_at: Option<String>,
    pub realized_pnl: f64,
    pub journal_trade_id: Option<i64>,
    pub levels: Vec<LiveLevel>,
    pub executions: Vec<LiveExecution>,
}

impl LiveTrade {
    pub fn direction(&self) -> Direction {
        Direction::parse(&self.direction).unwrap_or(Direction::Long)
    }

    pub fn mode(&self) -> LiveMode {
        LiveMode::parse(&self.mode).unwrap_or(LiveMode::Full)
    }
}

/// Compute stop/TP levels with risk/reward dollars for a new live trade.
pub fn compute_plan(
    direction: Direction,
    spec: &InstrumentSpec,
    entry_price: f64,
    total_qty: i64,
    mode: LiveMode,
    stop_points: f64,
    tp_points: &[f64],
) -> Vec<LiveLevel> {
    let dpp = spec.dollars_per_point;
    let is_long = direction == Direction::Long;
    let mut levels = Vec::new();

    let stop_price = |dist: f64| if is_long { entry_price - dist } else { entry_price + dist };
    let tp_price = |dist: f64| if is_long { entry_price + dist } else { entry_price - dist };

    match mode {
        LiveMode::Full => {
            let sp = stop_price(stop_points);
            let tp = tp_price(*tp_points.first().unwrap_or(&stop_points));

            levels.push(LiveLevel {
                level_type: LevelType::Stop,
                portion: 1,
                qty: total_qty,
                price: round2(sp),
                risk_dollars: round2((entry_price - sp).abs() * total_qty as f64 * dpp),
                reward_dollars: 0.0,
            });
            levels.push(LiveLevel {
                level_type: LevelType::Tp,
                portion: 1,
                qty: total_qty,
                price: round2(tp),
                risk_dollars: 0.0,
                reward_dollars: round2((tp - entry_price).abs() * total_qty as f64 * dpp),
            });
        }
        LiveMode::Partials => {
            // Divide qty into 3 portions as evenly as possible, remainder to
            // the earliest portions.
            let base = total_qty / 3;
            let remainder = total_qty % 3;
            let qtys: Vec<i64> = (0..3)
                .map(|i| base + if (i as i64) < remainder { 1 } else { 0 })
                .collect();

            for (i, &qty) in qtys.iter().enumerate() {
                let sp = stop_price(stop_points);
                levels.push(LiveLevel {
                    level_type: LevelType::Stop,
                    portion: i as i64 + 1,
                    qty,
                    price: round2(sp),
                    risk_dollars: round2((entry_price - sp).abs() * qty as f64 * dpp),
                    reward_dollars: 0.0,
                });

                let dist = tp_points.get(i).copied().unwrap_or(stop_points);
                let tp = tp_price(dist);
                levels.push(LiveLevel {
                    level_type: LevelType::Tp,
                    portion: i as i64 + 1,
                    qty,
                    price: round2(tp),
                    risk_dollars: 0.0,
                    reward_dollars: round2((tp - entry_price).abs() * qty as f64 * dpp),
                });
            }
        }
    }

    levels
}

/// P&L in dollars for a single execution against the entry price.
pub fn execution_pnl(
    direction: Direction,
    spec: &InstrumentSpec,
    entry_price: f64,
    exec_price: f64,
    qty: i64,
) -> f64 {
    let per_point = match direction {
        Direction::Long => exec_price - entry_price,
        Direction::Short => entry_price - exec_price,
    };
    round2(per_point * qty as f64 * spec.dollars_per_point)
}

/// Remaining-risk breakdown for one still-open portion.
#[derive(Debug, Clone, Serialize)]
pub struct PortionDetail {
    pub portion: i64,
    pub qty: i64,
    pub stop_price: f64,
    pub tp_price: Option<f64>,
    /// Negative = risk, positive = locked profit (stop trailed past entry).
    pub stop_pnl: f64,
    pub tp_pnl: f64,
}

/// Full recalculated state of a live trade.
#[derive(Debug, Clone, Serialize)]
pub struct LiveCalc {
    pub remaining_qty: i64,
    pub exited_qty: i64,
    pub realized_pnl: f64,
    pub current_risk: f64,
    pub potential_reward: f64,
    pub initial_risk: f64,
    /// Negative = net loss if every remaining stop is hit, positive = net
    /// profit even if stopped everywhere.
    pub net_stop_exposure: f64,
    pub active_portions: Vec<PortionDetail>,
    pub portion_details: Vec<PortionDetail>,
    pub is_closed: bool,
}

/// Recompute remaining qty, current risk, potential reward, and realized
/// P&L for a live trade from its levels and execution log.
///
/// A stop on the losing side of entry contributes risk; a stop on the
/// winning side (trailed past entry) contributes locked profit. Net worst
/// case is the sum over remaining portions plus P&L already banked.
pub fn recalculate(trade: &LiveTrade, spec: &InstrumentSpec) -> LiveCalc {
    let dpp = spec.dollars_per_point;
    let is_long = trade.direction() == Direction::Long;
    let entry = trade.entry_price;

    let exited_qty: i64 = trade.executions.iter().map(|e| e.qty).sum();
    let realized_pnl: f64 = trade.executions.iter().map(|e| e.pnl).sum();
    let remaining_qty = trade.total_qty - exited_qty;

    let initial_risk: f64 = trade
        .levels
        .iter()
        .filter(|lv| lv.level_type == LevelType::Stop)
        .map(|lv| (entry - lv.price).abs() * lv.qty as f64 * dpp)
        .sum();

    if remaining_qty <= 0 {
        return LiveCalc {
            remaining_qty: 0,
            exited_qty,
            realized_pnl: round2(realized_pnl),
            current_risk: 0.0,
            potential_reward: 0.0,
            initial_risk: round2(initial_risk),
            net_stop_exposure: 0.0,
            active_portions: Vec::new(),
            portion_details: Vec::new(),
            is_closed: true,
        };
    }

    let stop_pnl_at = |price: f64, qty: i64| {
        if is_long {
            (price - entry) * qty as f64 * dpp
        } else {
            (entry - price) * qty as f64 * dpp
        }
    };

    let mut portion_details: Vec<PortionDetail> = Vec::new();
    let current_risk;
    let net_stop_exposure;
    let mut total_reward = 0.0;

    match trade.mode() {
        LiveMode::Partials => {
            let mut total_stop_risk = 0.0;

            for p in 1..=3i64 {
                let stop_lv = trade
                    .levels
                    .iter()
                    .find(|lv| lv.level_type == LevelType::Stop && lv.portion == p);
                let Some(stop_lv) = stop_lv else { continue };

                let exited: i64 = trade
                    .executions
                    .iter()
                    .filter(|e| e.portion == p)
                    .map(|e| e.qty)
                    .sum();
                let rem = stop_lv.qty - exited;
                if rem <= 0 {
                    continue;
                }

                let stop_pnl = stop_pnl_at(stop_lv.price, rem);
                total_stop_risk += stop_pnl;

                let tp_lv = trade
                    .levels
                    .iter()
                    .find(|lv| lv.level_type == LevelType::Tp && lv.portion == p);
                let tp_pnl = tp_lv.map(|lv| stop_pnl_at(lv.price, rem)).unwrap_or(0.0);
                total_reward += tp_pnl.max(0.0);

                portion_details.push(PortionDetail {
                    portion: p,
                    qty: rem,
                    stop_price: stop_lv.price,
                    tp_price: tp_lv.map(|lv| lv.price),
                    stop_pnl: round2(stop_pnl),
                    tp_pnl: round2(tp_pnl),
                });
            }

            let worst_case = total_stop_risk + realized_pnl;
            current_risk = if worst_case < 0.0 { worst_case.abs() } else { 0.0 };
            net_stop_exposure = round2(worst_case);
        }
        LiveMode::Full => {
            let stop_lv = trade.levels.iter().find(|lv| lv.level_type == LevelType::Stop);
            let tp_lv = trade.levels.iter().find(|lv| lv.level_type == LevelType::Tp);

            match stop_lv {
                Some(lv) => {
                    let worst_case = stop_pnl_at(lv.price, remaining_qty) + realized_pnl;
                    current_risk = if worst_case < 0.0 { worst_case.abs() } else { 0.0 };
                    net_stop_exposure = round2(worst_case);
                }
                None => {
                    current_risk = 0.0;
                    net_stop_exposure = 0.0;
                }
            }

            if let Some(lv) = tp_lv {
                total_reward = stop_pnl_at(lv.price, remaining_qty).max(0.0);
            }
        }
    }

    let active_portions = portion_details.clone();

    LiveCalc {
        remaining_qty,
        exited_qty,
        realized_pnl: round2(realized_pnl),
        current_risk: round2(current_risk),
        potential_reward: round2(total_reward),
        initial_risk: round2(initial_risk),
        net_stop_exposure,
        active_portions,
        portion_details,
        is_closed: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn mes() -> InstrumentSpec {
        InstrumentSpec {
            dollars_per_point: 5.0,
            dollars_per_tick: 1.25,
            ticks_per_point: 4,
        }
    }

    fn live(direction: &str, mode: &str, entry: f64, qty: i64) -> LiveTrade {
        LiveTrade {
            id: 1,
            portfolio_id: None,
            portfolio_name: None,
            portfolio_color: None,
            status: "open".to_string(),
            direction: direction.to_string(),
            instrument: "MES".to_string(),
            entry_price: entry,
            entry_time: "09:30".to_string(),
            total_qty: qty,
            mode: mode.to_string(),
            notes: String::new(),
            tags_json: "{}".to_string(),
            created_at: "2024-07-15 09:30:00".to_string(),
            closed_at: None,
            realized_pnl: 0.0,
            journal_trade_id: None,
            levels: Vec::new(),
            executions: Vec::new(),
        }
    }

    fn exec(portion: i64, qty: i64, price: f64, pnl: f64) -> LiveExecution {
        LiveExecution {
            id: 0,
            exec_type: "tp_hit".to_string(),
            portion,
            qty,
            price,
            exec_time: "10:00".to_string(),
            pnl,
        }
    }

    #[test]
    fn full_plan_long() {
        let levels = compute_plan(Direction::Long, &mes(), 5000.0, 2, LiveMode::Full, 20.0, &[20.0]);
        assert_eq!(levels.len(), 2);
        let stop = &levels[0];
        assert_eq!(stop.level_type, LevelType::Stop);
        assert_relative_eq!(stop.price, 4980.0);
        assert_relative_eq!(stop.risk_dollars, 200.0);
        let tp = &levels[1];
        assert_relative_eq!(tp.price, 5020.0);
        assert_relative_eq!(tp.reward_dollars, 200.0);
    }

    #[test]
    fn full_plan_short_flips_sides() {
        let levels = compute_plan(Direction::Short, &mes(), 5000.0, 1, LiveMode::Full, 10.0, &[15.0]);
        assert_relative_eq!(levels[0].price, 5010.0);
        assert_relative_eq!(levels[1].price, 4985.0);
    }

    #[test]
    fn partials_plan_distributes_remainder_to_early_portions() {
        let levels = compute_plan(
            Direction::Long,
            &mes(),
            5000.0,
            7,
            LiveMode::Partials,
            20.0,
            &[5.0, 10.0, 20.0],
        );
        assert_eq!(levels.len(), 6);
        let stop_qtys: Vec<i64> = levels
            .iter()
            .filter(|lv| lv.level_type == LevelType::Stop)
            .map(|lv| lv.qty)
            .collect();
        assert_eq!(stop_qtys, [3, 2, 2]);

        let tps: Vec<f64> = levels
            .iter()
            .filter(|lv| lv.level_type == LevelType::Tp)
            .map(|lv| lv.price)
            .collect();
        assert_eq!(tps, [5005.0, 5010.0, 5020.0]);
    }

    #[test]
    fn execution_pnl_signs() {
        assert_relative_eq!(execution_pnl(Direction::Long, &mes(), 5000.0, 5010.0, 2), 100.0);
        assert_relative_eq!(execution_pnl(Direction::Short, &mes(), 5000.0, 5010.0, 2), -100.0);
    }

    #[test]
    fn recalculate_untouched_full_trade() {
        let mut t = live("Long", "full", 5000.0, 2);
        t.levels = compute_plan(Direction::Long, &mes(), 5000.0, 2, LiveMode::Full, 20.0, &[20.0]);

        let calc = recalculate(&t, &mes());
        assert_eq!(calc.remaining_qty, 2);
        assert_relative_eq!(calc.initial_risk, 200.0);
        assert_relative_eq!(calc.current_risk, 200.0);
        assert_relative_eq!(calc.potential_reward, 200.0);
        assert_relative_eq!(calc.net_stop_exposure, -200.0);
        assert!(!calc.is_closed);
    }

    #[test]
    fn trailing_stop_past_entry_locks_profit() {
        let mut t = live("Long", "full", 5000.0, 2);
        t.levels = vec![LiveLevel {
            level_type: LevelType::Stop,
            portion: 1,
            qty: 2,
            price: 5004.0, // stop raised above entry
            risk_dollars: 0.0,
            reward_dollars: 0.0,
        }];

        let calc = recalculate(&t, &mes());
        assert_relative_eq!(calc.current_risk, 0.0);
        assert_relative_eq!(calc.net_stop_exposure, 40.0);
    }

    #[test]
    fn partials_recalc_with_one_exit() {
        let mut t = live("Long", "partials", 5000.0, 3);
        t.levels = compute_plan(
            Direction::Long,
            &mes(),
            5000.0,
            3,
            LiveMode::Partials,
            20.0,
            &[5.0, 10.0, 20.0],
        );
        // Portion 1 took profit at +5 points: 1 * 5pts * $5 = $25
        t.executions = vec![exec(1, 1, 5005.0, 25.0)];

        let calc = recalculate(&t, &mes());
        assert_eq!(calc.exited_qty, 1);
        assert_eq!(calc.remaining_qty, 2);
        assert_relative_eq!(calc.realized_pnl, 25.0);
        // Two portions remain, each risking 20pts * $5 = $100; banked $25.
        assert_relative_eq!(calc.net_stop_exposure, -175.0);
        assert_relative_eq!(calc.current_risk, 175.0);
        assert_eq!(calc.portion_details.len(), 2);
        assert_eq!(calc.active_portions.len(), 2);
    }

    #[test]
    fn fully_exited_trade_is_closed() {
        let mut t = live("Short", "full", 5000.0, 1);
        t.levels = compute_plan(Direction::Short, &mes(), 5000.0, 1, LiveMode::Full, 20.0, &[20.0]);
        t.executions = vec![exec(1, 1, 4990.0, 50.0)];

        let calc = recalculate(&t, &mes());
        assert!(calc.is_closed);
        assert_eq!(calc.remaining_qty, 0);
        assert_relative_eq!(calc.realized_pnl, 50.0);
        assert_relative_eq!(calc.current_risk, 0.0);
        assert_relative_eq!(calc.potential_reward, 0.0);
    }

    #[test]
    fn full_trade_without_stop_has_no_exposure() {
        let t = live("Long", "full", 5000.0, 2);
        let calc = recalculate(&t, &mes());
        assert_relative_eq!(calc.current_risk, 0.0);
        assert_relative_eq!(calc.net_stop_exposure, 0.0);
    }
}
