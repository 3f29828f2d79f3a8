//! Aggregates derived from the decision ledger.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use optra_models::decision::{DailyPnl, DecisionRecord, PerformanceSummary};

/// Actions counted as executed trades.
const TRADE_ACTIONS: [&str; 4] = ["buy", "sell", "options_trade", "close_position"];

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Tolerate naive timestamps from older ledgers.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Records whose timestamp falls within the last `window_days` full days.
/// The cutoff is midnight, so "1 day" means today plus yesterday's tail.
pub fn filter_window(records: &[DecisionRecord], window_days: u32) -> Vec<DecisionRecord> {
    let midnight = Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or_else(Utc::now);
    let cutoff = midnight - Duration::days(window_days as i64);
    records
        .iter()
        .filter(|r| parse_timestamp(&r.timestamp).map(|dt| dt >= cutoff).unwrap_or(false))
        .cloned()
        .collect()
}

/// Summarize performance over the given records (pre-filtered by caller).
pub fn summarize(records: &[DecisionRecord]) -> PerformanceSummary {
    let mut actions: BTreeMap<String, usize> = BTreeMap::new();
    let mut trades_executed = 0;
    for record in records {
        *actions.entry(record.action.clone()).or_insert(0) += 1;
        if TRADE_ACTIONS.contains(&record.action.as_str()) {
            trades_executed += 1;
        }
    }

    let values: Vec<f64> = records.iter().filter_map(|r| r.portfolio_value).collect();
    let starting = values.first().copied();
    let current = values.last().copied();
    let net_pnl = match (starting, current) {
        (Some(s), Some(c)) => Some(c - s),
        _ => None,
    };
    let portfolio_change_pct = match (starting, current) {
        (Some(s), Some(c)) if s != 0.0 => Some((c - s) / s * 100.0),
        (Some(_), Some(_)) => Some(0.0),
        _ => None,
    };

    // Fraction of value-to-value steps that went up. Crude, but cheap to
    // compute from what the ledger already carries.
    let win_rate = if values.len() >= 2 {
        let ups = values.windows(2).filter(|w| w[1] > w[0]).count();
        Some(ups as f64 / (values.len() - 1) as f64)
    } else {
        None
    };

    PerformanceSummary {
        total_decisions: records.len(),
        actions,
        trades_executed,
        first_decision_at: records.first().map(|r| r.timestamp.clone()),
        last_decision_at: records.last().map(|r| r.timestamp.clone()),
        starting_portfolio_value: starting,
        current_portfolio_value: current,
        net_pnl,
        portfolio_change_pct,
        win_rate,
    }
}

struct DayBucket {
    date: String,
    first_ts: DateTime<Utc>,
    last_ts: DateTime<Utc>,
    start_value: f64,
    end_value: f64,
    decisions: usize,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Per-day portfolio value change, newest day first, at most `limit` days.
/// Records without a portfolio value or a parseable timestamp are skipped.
pub fn daily_pnl(records: &[DecisionRecord], limit: usize) -> Vec<DailyPnl> {
    let mut buckets: BTreeMap<String, DayBucket> = BTreeMap::new();

    for record in records {
        let Some(value) = record.portfolio_value else {
            continue;
        };
        let Some(dt) = parse_timestamp(&record.timestamp) else {
            continue;
        };
        let date = dt.date_naive().to_string();
        let bucket = buckets.entry(date.clone()).or_insert_with(|| DayBucket {
            date,
            first_ts: dt,
            last_ts: dt,
            start_value: value,
            end_value: value,
            decisions: 0,
        });
        if dt < bucket.first_ts {
            bucket.first_ts = dt;
            bucket.start_value = value;
        }
        if dt > bucket.last_ts {
            bucket.last_ts = dt;
            bucket.end_value = value;
        }
        bucket.decisions += 1;
    }

    // BTreeMap iterates dates ascending; reverse for newest-first.
    buckets
        .into_values()
        .rev()
        .take(limit.max(1))
        .map(|bucket| {
            let pnl = round2(bucket.end_value - bucket.start_value);
            let pnl_percent = if bucket.start_value != 0.0 {
                round2((bucket.end_value - bucket.start_value) / bucket.start_value * 100.0)
            } else {
                0.0
            };
            DailyPnl {
                date: bucket.date,
                start_value: bucket.start_value,
                end_value: bucket.end_value,
                pnl,
                pnl_percent,
                decisions: bucket.decisions,
            }
        })
        .collect()
}
