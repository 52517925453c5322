//! Analytics payloads and the win/loss streak computation.

use serde::Serialize;

/// Per-tag performance aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct TagStat {
    pub group_id: String,
    pub tag: String,
    pub total: i64,
    pub wins: i64,
    pub avg_pnl: f64,
    pub total_pnl: f64,
    pub win_rate: f64,
}

/// Performance by entry hour.
#[derive(Debug, Clone, Serialize)]
pub struct TimeStat {
    pub hour: i64,
    pub total: i64,
    pub avg_pnl: f64,
    pub wins: i64,
}

/// Per-day P&L series point.
#[derive(Debug, Clone, Serialize)]
pub struct DailyStat {
    pub date: String,
    pub trades: i64,
    pub pnl: f64,
    pub wins: i64,
}

/// Whole-journal summary numbers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OverallStats {
    pub total_trades: i64,
    pub total_pnl: f64,
    pub avg_pnl: f64,
    pub wins: i64,
    pub best_trade: f64,
    pub worst_trade: f64,
}

/// Performance by day of week (0 = Sunday, SQLite `%w`).
#[derive(Debug, Clone, Serialize)]
pub struct DowStat {
    pub dow: i64,
    pub total: i64,
    pub total_pnl: f64,
    pub avg_pnl: f64,
    pub wins: i64,
}

/// Win/loss streak summary over the ordered trade history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Streaks {
    pub current: i64,
    pub current_type: Option<char>,
    pub best_win: i64,
    pub worst_loss: i64,
    /// Last 20 results for the sparkline: 'W', 'L', or 'B' (breakeven).
    pub history: Vec<char>,
}

impl Default for Streaks {
    fn default() -> Self {
        Streaks {
            current: 0,
            current_type: None,
            best_win: 0,
            worst_loss: 0,
            history: Vec::new(),
        }
    }
}

/// Full analytics payload for the dashboard and the JSON API.
#[derive(Debug, Clone, Serialize)]
pub struct Analytics {
    pub tag_stats: Vec<TagStat>,
    pub time_stats: Vec<TimeStat>,
    pub daily: Vec<DailyStat>,
    pub overall: OverallStats,
    pub dow_stats: Vec<DowStat>,
    pub streaks: Streaks,
}

/// Compute current, best-win, and worst-loss streaks from the P&L sequence
/// of trades ordered by date and entry time.
pub fn compute_streaks(pnls: &[f64]) -> Streaks {
    if pnls.is_empty() {
        return Streaks::default();
    }

    let results: Vec<char> = pnls
        .iter()
        .map(|&p| {
            if p > 0.0 {
                'W'
            } else if p < 0.0 {
                'L'
            } else {
                'B'
            }
        })
        .collect();

    let cur_type = *results.last().unwrap();
    let cur_count = results.iter().rev().take_while(|&&r| r == cur_type).count() as i64;

    let mut best_win = 0i64;
    let mut worst_loss = 0i64;
    let mut run = 0i64;
    let mut run_type = results[0];
    for &r in &results {
        if r == run_type {
            run += 1;
        } else {
            match run_type {
                'W' => best_win = best_win.max(run),
                'L' => worst_loss = worst_loss.max(run),
                _ => {}
            }
            run_type = r;
            run = 1;
        }
    }
    match run_type {
        'W' => best_win = best_win.max(run),
        'L' => worst_loss = worst_loss.max(run),
        _ => {}
    }

    let history: Vec<char> = results
        .iter()
        .skip(results.len().saturating_sub(20))
        .copied()
        .collect();

    Streaks {
        current: if cur_type == 'B' { 0 } else { cur_count },
        current_type: Some(cur_type),
        best_win,
        worst_loss,
        history,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_history() {
        let s = compute_streaks(&[]);
        assert_eq!(s, Streaks::default());
    }

    #[test]
    fn current_win_streak() {
        let s = compute_streaks(&[-10.0, 20.0, 30.0, 5.0]);
        assert_eq!(s.current, 3);
        assert_eq!(s.current_type, Some('W'));
        assert_eq!(s.best_win, 3);
        assert_eq!(s.worst_loss, 1);
    }

    #[test]
    fn breakeven_trades_reset_current_streak() {
        let s = compute_streaks(&[10.0, 10.0, 0.0]);
        assert_eq!(s.current, 0);
        assert_eq!(s.current_type, Some('B'));
        assert_eq!(s.best_win, 2);
    }

    #[test]
    fn best_and_worst_runs_across_sequence() {
        let pnls = [1.0, 1.0, -1.0, -1.0, -1.0, 1.0, -1.0];
        let s = compute_streaks(&pnls);
        assert_eq!(s.best_win, 2);
        assert_eq!(s.worst_loss, 3);
        assert_eq!(s.current, 1);
        assert_eq!(s.current_type, Some('L'));
    }

    #[test]
    fn history_keeps_last_twenty() {
        let pnls: Vec<f64> = (0..25).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let s = compute_streaks(&pnls);
        assert_eq!(s.history.len(), 20);
        assert_eq!(*s.history.last().unwrap(), 'W');
    }
}
