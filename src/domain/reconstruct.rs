//! FIFO trade reconstruction: grouping raw broker fills into round-trip trades.
//!
//! Fills are grouped by date and walked in time order while tracking the net
//! position. Every time the position returns to flat, the accumulated fills
//! form one round-trip trade. A day ending with a non-flat position yields a
//! trailing open trade.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};

use crate::domain::fill::{Fill, Side};

/// Default dollars-per-point applied to reconstructed P&L (MES multiplier).
pub const DEFAULT_POINT_VALUE: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "Long",
            Direction::Short => "Short",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Long" => Some(Direction::Long),
            "Short" => Some(Direction::Short),
            _ => None,
        }
    }
}

/// One reconstructed round-trip trade with its contributing fills.
#[derive(Debug, Clone)]
pub struct ReconstructedTrade {
    pub trade_num: i64,
    pub direction: Direction,
    pub qty: i64,
    pub avg_entry: f64,
    pub avg_exit: f64,
    pub pnl: f64,
    pub entry_time: NaiveTime,
    pub exit_time: NaiveTime,
    pub fills: Vec<Fill>,
    pub open: bool,
}

/// All trades reconstructed for one trading date.
#[derive(Debug, Clone)]
pub struct DayTrades {
    pub date: NaiveDate,
    pub trades: Vec<ReconstructedTrade>,
}

/// Group fills by date and reconstruct round-trip trades per date.
pub fn reconstruct_trades(fills: Vec<Fill>, dollars_per_point: f64) -> Vec<DayTrades> {
    let mut by_date: BTreeMap<NaiveDate, Vec<Fill>> = BTreeMap::new();
    for f in fills {
        by_date.entry(f.date).or_default().push(f);
    }

    by_date
        .into_iter()
        .map(|(date, mut day_fills)| {
            day_fills.sort_by_key(|f| f.time);
            DayTrades {
                date,
                trades: build_round_trips(day_fills, dollars_per_point),
            }
        })
        .collect()
}

fn build_round_trips(fills: Vec<Fill>, dollars_per_point: f64) -> Vec<ReconstructedTrade> {
    let mut position: i64 = 0;
    let mut current: Vec<Fill> = Vec::new();
    let mut trades: Vec<ReconstructedTrade> = Vec::new();

    for f in fills {
        position += f.signed_qty();
        current.push(f);
        if position == 0 {
            let num = trades.len() as i64 + 1;
            trades.push(compute_stats(std::mem::take(&mut current), num, dollars_per_point));
        }
    }

    // Trailing fills form an unclosed position
    if !current.is_empty() {
        let num = trades.len() as i64 + 1;
        trades.push(compute_stats(current, num, dollars_per_point));
    }

    trades
}

fn compute_stats(fills: Vec<Fill>, trade_num: i64, dollars_per_point: f64) -> ReconstructedTrade {
    let mut buy_qty = 0i64;
    let mut buy_val = 0f64;
    let mut sell_qty = 0i64;
    let mut sell_val = 0f64;

    for f in &fills {
        match f.side {
            Side::Buy => {
                buy_qty += f.qty;
                buy_val += f.qty as f64 * f.price;
            }
            Side::Sell => {
                sell_qty += f.qty;
                sell_val += f.qty as f64 * f.price;
            }
        }
    }

    let is_short = fills[0].side == Side::Sell;
    let qty = buy_qty.max(sell_qty);

    // Partial/unclosed positions have no exit side yet; its average is 0.
    let avg_entry = if is_short {
        if sell_qty > 0 { sell_val / sell_qty as f64 } else { 0.0 }
    } else if buy_qty > 0 {
        buy_val / buy_qty as f64
    } else {
        0.0
    };
    let avg_exit = if is_short {
        if buy_qty > 0 { buy_val / buy_qty as f64 } else { 0.0 }
    } else if sell_qty > 0 {
        sell_val / sell_qty as f64
    } else {
        0.0
    };

    let open = (is_short && buy_qty == 0) || (!is_short && sell_qty == 0);
    let pnl = if open {
        0.0
    } else {
        let per_point = if is_short {
            avg_entry - avg_exit
        } else {
            avg_exit - avg_entry
        };
        round2(per_point * qty as f64 * dollars_per_point)
    };

    ReconstructedTrade {
        trade_num,
        direction: if is_short { Direction::Short } else { Direction::Long },
        qty,
        avg_entry: round4(avg_entry),
        avg_exit: round4(avg_exit),
        pnl,
        entry_time: fills[0].time,
        exit_time: fills[fills.len() - 1].time,
        fills,
        open,
    }
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub(crate) fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn fill(side: Side, qty: i64, price: f64, hms: (u32, u32, u32)) -> Fill {
        Fill {
            side,
            qty,
            price,
            time: NaiveTime::from_hms_opt(hms.0, hms.1, hms.2).unwrap(),
            date: NaiveDate::from_ymd_opt(2024, 7, 15).unwrap(),
        }
    }

    #[test]
    fn single_long_round_trip() {
        let fills = vec![
            fill(Side::Buy, 2, 5000.0, (9, 30, 0)),
            fill(Side::Sell, 2, 5010.0, (9, 45, 0)),
        ];
        let days = reconstruct_trades(fills, DEFAULT_POINT_VALUE);
        assert_eq!(days.len(), 1);
        let t = &days[0].trades[0];
        assert_eq!(t.direction, Direction::Long);
        assert_eq!(t.qty, 2);
        assert!(!t.open);
        assert_relative_eq!(t.avg_entry, 5000.0);
        assert_relative_eq!(t.avg_exit, 5010.0);
        // 10 points * 2 contracts * $5/point
        assert_relative_eq!(t.pnl, 100.0);
    }

    #[test]
    fn short_trade_pnl_sign() {
        let fills = vec![
            fill(Side::Sell, 1, 5020.0, (10, 0, 0)),
            fill(Side::Buy, 1, 5025.0, (10, 5, 0)),
        ];
        let days = reconstruct_trades(fills, DEFAULT_POINT_VALUE);
        let t = &days[0].trades[0];
        assert_eq!(t.direction, Direction::Short);
        assert_relative_eq!(t.pnl, -25.0);
    }

    #[test]
    fn scale_in_uses_weighted_entry() {
        let fills = vec![
            fill(Side::Buy, 1, 5000.0, (9, 30, 0)),
            fill(Side::Buy, 1, 5002.0, (9, 31, 0)),
            fill(Side::Sell, 2, 5005.0, (9, 40, 0)),
        ];
        let days = reconstruct_trades(fills, DEFAULT_POINT_VALUE);
        let t = &days[0].trades[0];
        assert_eq!(t.qty, 2);
        assert_relative_eq!(t.avg_entry, 5001.0);
        // 4 points * 2 * $5
        assert_relative_eq!(t.pnl, 40.0);
    }

    #[test]
    fn position_flat_splits_trades() {
        let fills = vec![
            fill(Side::Buy, 1, 5000.0, (9, 30, 0)),
            fill(Side::Sell, 1, 5001.0, (9, 35, 0)),
            fill(Side::Sell, 2, 5010.0, (11, 0, 0)),
            fill(Side::Buy, 2, 5008.0, (11, 30, 0)),
        ];
        let days = reconstruct_trades(fills, DEFAULT_POINT_VALUE);
        let trades = &days[0].trades;
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].trade_num, 1);
        assert_eq!(trades[0].direction, Direction::Long);
        assert_eq!(trades[1].trade_num, 2);
        assert_eq!(trades[1].direction, Direction::Short);
        assert_relative_eq!(trades[1].pnl, 20.0);
    }

    #[test]
    fn position_with_no_exit_side_is_open_with_zero_pnl() {
        let fills = vec![fill(Side::Buy, 3, 5000.0, (9, 30, 0))];
        let days = reconstruct_trades(fills, DEFAULT_POINT_VALUE);
        let t = &days[0].trades[0];
        assert!(t.open);
        assert_relative_eq!(t.pnl, 0.0);
        assert_eq!(t.qty, 3);
        assert_relative_eq!(t.avg_exit, 0.0);
    }

    #[test]
    fn partially_exited_position_is_closed_over_full_qty() {
        // A trailing position with any exit fill counts as closed; P&L
        // spans the full quantity against the exit-side average.
        let fills = vec![
            fill(Side::Buy, 3, 5000.0, (9, 30, 0)),
            fill(Side::Sell, 1, 5004.0, (9, 40, 0)),
        ];
        let days = reconstruct_trades(fills, DEFAULT_POINT_VALUE);
        let t = &days[0].trades[0];
        assert!(!t.open);
        assert_eq!(t.qty, 3);
        assert_relative_eq!(t.avg_exit, 5004.0);
        // 4 points * 3 contracts * $5/point
        assert_relative_eq!(t.pnl, 60.0);
    }

    #[test]
    fn fills_out_of_order_are_sorted_by_time() {
        let fills = vec![
            fill(Side::Sell, 1, 5010.0, (9, 45, 0)),
            fill(Side::Buy, 1, 5000.0, (9, 30, 0)),
        ];
        let days = reconstruct_trades(fills, DEFAULT_POINT_VALUE);
        let t = &days[0].trades[0];
        assert_eq!(t.direction, Direction::Long);
        assert_relative_eq!(t.pnl, 50.0);
    }

    #[test]
    fn fills_span_multiple_dates() {
        let mut fills = vec![
            fill(Side::Buy, 1, 5000.0, (9, 30, 0)),
            fill(Side::Sell, 1, 5002.0, (9, 40, 0)),
        ];
        let mut next_day = vec![
            fill(Side::Sell, 1, 5010.0, (10, 0, 0)),
            fill(Side::Buy, 1, 5005.0, (10, 30, 0)),
        ];
        for f in &mut next_day {
            f.date = NaiveDate::from_ymd_opt(2024, 7, 16).unwrap();
        }
        fills.extend(next_day);

        let days = reconstruct_trades(fills, DEFAULT_POINT_VALUE);
        assert_eq!(days.len(), 2);
        assert!(days[0].date < days[1].date);
        assert_eq!(days[0].trades.len(), 1);
        assert_eq!(days[1].trades.len(), 1);
    }

    proptest! {
        /// Every fill ends up in exactly one trade, and every trade except
        /// possibly the last per day is flat (buys == sells).
        #[test]
        fn fills_partition_into_trades(sides in proptest::collection::vec(any::<bool>(), 1..40)) {
            let fills: Vec<Fill> = sides
                .iter()
                .enumerate()
                .map(|(i, &buy)| fill(
                    if buy { Side::Buy } else { Side::Sell },
                    1,
                    5000.0 + i as f64,
                    (9, (i / 60) as u32, (i % 60) as u32),
                ))
                .collect();
            let total = fills.len();

            let days = reconstruct_trades(fills, DEFAULT_POINT_VALUE);
            let trades = &days[0].trades;

            let carried: usize = trades.iter().map(|t| t.fills.len()).sum();
            prop_assert_eq!(carried, total);

            for t in trades.iter().take(trades.len().saturating_sub(1)) {
                let net: i64 = t.fills.iter().map(|f| f.signed_qty()).sum();
                prop_assert_eq!(net, 0);
                prop_assert!(!t.open);
            }
        }
    }
}
