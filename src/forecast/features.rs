//! Feature engineering for the demand model.
//!
//! Builds model-ready rows from raw session records, both for training
//! (aggregated per site and hour) and for inference (per future hour, from a
//! trailing 7-day lookback).

use chrono::{DateTime, Datelike, DurationRound, Timelike, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::HistoricalSessionRecord;

/// Model feature columns, in the exact order rows are laid out. The order is
/// persisted with the trained artifact so inference can never drift.
pub const FEATURE_COLUMNS: [&str; 7] = [
    "hour_of_day",
    "day_of_week",
    "is_weekend",
    "temperature",
    "site_encoded",
    "historical_avg_kwh",
    "historical_session_count",
];

/// Trailing window for the rolling training features, in hourly rows.
pub const ROLLING_WINDOW_HOURS: usize = 24 * 7;

/// Lookback for inference-time historical features, in days.
pub const LOOKBACK_DAYS: i64 = 7;

/// Sentinel encoding for a site the model was never trained on. Distinct
/// from every trained slot so an unknown site degrades visibly instead of
/// borrowing another site's profile.
pub const UNSEEN_SITE_ENCODING: f64 = -1.0;

/// Per-(site, hour) training target row.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyAggregate {
    pub site_id: String,
    pub time_slot: DateTime<Utc>,
    pub total_kwh: f64,
    pub session_count: f64,
}

/// Label encoding of site identifiers, fit on the training set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteEncoder {
    classes: Vec<String>,
}

impl SiteEncoder {
    pub fn fit<'a>(sites: impl IntoIterator<Item = &'a str>) -> Self {
        let classes = sites
            .into_iter()
            .map(str::to_owned)
            .sorted()
            .dedup()
            .collect();
        Self { classes }
    }

    /// `None` for a site outside the training set; callers decide whether to
    /// degrade to [`UNSEEN_SITE_ENCODING`] or reject.
    pub fn encode(&self, site_id: &str) -> Option<f64> {
        self.classes
            .iter()
            .position(|c| c == site_id)
            .map(|i| i as f64)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}

pub struct FeatureBuilder;

impl FeatureBuilder {
    /// Sum delivered energy and count sessions per (site, floor-hour).
    /// Output is ordered site-first then chronologically, which the rolling
    /// features below rely on. Unmetered records are skipped.
    pub fn aggregate_hourly(records: &[HistoricalSessionRecord]) -> Vec<HourlyAggregate> {
        let mut buckets: BTreeMap<(String, DateTime<Utc>), (f64, u32)> = BTreeMap::new();
        for record in records {
            let Some(energy) = record.energy_delivered_kwh else {
                continue;
            };
            let slot = floor_hour(record.start_time);
            let entry = buckets.entry((record.site_id.clone(), slot)).or_insert((0.0, 0));
            entry.0 += energy;
            entry.1 += 1;
        }
        buckets
            .into_iter()
            .map(|((site_id, time_slot), (total_kwh, count))| HourlyAggregate {
                site_id,
                time_slot,
                total_kwh,
                session_count: count as f64,
            })
            .collect()
    }

    /// Training design matrix and targets. Rolling means run over each
    /// site's hourly rows with a trailing window of [`ROLLING_WINDOW_HOURS`]
    /// and a minimum of one sample (the first row averages only itself).
    pub fn training_matrix(
        aggregates: &[HourlyAggregate],
        encoder: &SiteEncoder,
    ) -> (Vec<Vec<f64>>, Vec<f64>) {
        let mut x = Vec::with_capacity(aggregates.len());
        let mut y = Vec::with_capacity(aggregates.len());
        let mut block_start = 0usize;
        for i in 0..aggregates.len() {
            if aggregates[i].site_id != aggregates[block_start].site_id {
                block_start = i;
            }
            let window_len = (i - block_start + 1).min(ROLLING_WINDOW_HOURS);
            let window = &aggregates[i + 1 - window_len..=i];
            let n = window.len() as f64;
            let rolling_kwh = window.iter().map(|a| a.total_kwh).sum::<f64>() / n;
            let rolling_sessions = window.iter().map(|a| a.session_count).sum::<f64>() / n;

            let row = &aggregates[i];
            let encoded = encoder
                .encode(&row.site_id)
                .unwrap_or(UNSEEN_SITE_ENCODING);
            x.push(feature_row(
                row.time_slot,
                encoded,
                rolling_kwh,
                rolling_sessions,
            ));
            y.push(row.total_kwh);
        }
        (x, y)
    }

    /// Inference row for one target hour. Historical features come from the
    /// metered lookback records inside `[target - 7d, target)`: mean energy
    /// per session and sessions per day. A cold site (no records in range)
    /// gets zeros.
    pub fn inference_row(
        target: DateTime<Utc>,
        site_encoding: f64,
        lookback: &[HistoricalSessionRecord],
    ) -> Vec<f64> {
        let from = target - chrono::Duration::days(LOOKBACK_DAYS);
        let recent: Vec<f64> = lookback
            .iter()
            .filter(|r| r.start_time >= from && r.start_time < target)
            .filter_map(|r| r.energy_delivered_kwh)
            .collect();
        let (avg_kwh, sessions_per_day) = if recent.is_empty() {
            (0.0, 0.0)
        } else {
            (
                recent.iter().sum::<f64>() / recent.len() as f64,
                recent.len() as f64 / LOOKBACK_DAYS as f64,
            )
        };
        feature_row(target, site_encoding, avg_kwh, sessions_per_day)
    }
}

fn feature_row(
    slot: DateTime<Utc>,
    site_encoded: f64,
    historical_avg_kwh: f64,
    historical_session_count: f64,
) -> Vec<f64> {
    let day_of_week = slot.weekday().num_days_from_monday();
    vec![
        slot.hour() as f64,
        day_of_week as f64,
        if day_of_week >= 5 { 1.0 } else { 0.0 },
        temperature_proxy(slot),
        site_encoded,
        historical_avg_kwh,
        historical_session_count,
    ]
}

pub fn floor_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    t.duration_trunc(chrono::Duration::hours(1)).unwrap_or(t)
}

/// Synthetic seasonal-plus-diurnal temperature proxy: per-month base level
/// plus a sine swing peaking mid-afternoon. Stands in for a weather feed.
pub fn temperature_proxy(t: DateTime<Utc>) -> f64 {
    let month_base = match t.month() {
        1 => 0.0,
        2 => -2.0,
        3 => 3.0,
        4 => 8.0,
        5 => 14.0,
        6 => 18.0,
        7 => 20.0,
        8 => 19.0,
        9 => 14.0,
        10 => 8.0,
        11 => 3.0,
        _ => 1.0,
    };
    let diurnal = ((t.hour() as f64 - 6.0) * std::f64::consts::PI / 12.0).sin() * 5.0;
    month_base + diurnal
}
