//! Deterministic synthetic charging histories.
//!
//! Produces realistic completed-session records (demand-weighted start
//! hours, weekday/weekend volumes, vehicle-class energy math) so training
//! and demos can run without a live fleet. Seeded: same inputs, same data.

use chrono::{DateTime, Datelike, Duration, Utc};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;

use crate::domain::HistoricalSessionRecord;

/// Relative charging demand per start hour: commute peak in the morning,
/// the strongest peak at end of workday.
const HOURLY_DEMAND_WEIGHTS: [f64; 24] = [
    0.1, 0.05, 0.05, 0.05, 0.05, 0.1, // night
    0.3, 0.8, 1.2, 0.9, 0.6, 0.5, // morning
    0.7, 0.6, 0.5, 0.6, 0.8, 1.5, // afternoon
    1.3, 0.9, 0.6, 0.4, 0.3, 0.2, // evening
];

/// (battery capacity kWh, consumption Wh/km) per vehicle class.
const VEHICLE_CLASSES: [(f64, f64); 5] = [
    (50.0, 150.0),
    (64.0, 170.0),
    (75.0, 180.0),
    (82.0, 200.0),
    (100.0, 220.0),
];

const TRIP_DISTANCES_KM: [f64; 6] = [10.0, 30.0, 50.0, 80.0, 120.0, 200.0];
const TRIP_WEIGHTS: [f64; 6] = [30.0, 25.0, 20.0, 15.0, 7.0, 3.0];

const WEEKDAY_SESSIONS_PER_SITE: f64 = 30.0;
const WEEKEND_SESSIONS_PER_SITE: f64 = 20.0;

pub struct SyntheticSessionGenerator {
    rng: StdRng,
}

impl SyntheticSessionGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generate `days` days of completed sessions per site, ending at `end`.
    pub fn generate(
        &mut self,
        site_ids: &[&str],
        days: u32,
        end: DateTime<Utc>,
    ) -> Vec<HistoricalSessionRecord> {
        let hour_weights = WeightedIndex::new(HOURLY_DEMAND_WEIGHTS).unwrap();
        let trip_weights = WeightedIndex::new(TRIP_WEIGHTS).unwrap();
        let delivery_noise = Normal::new(1.0, 0.03).unwrap();

        let first_day = end - Duration::days(days as i64);
        let mut records = Vec::new();
        for day in 0..days as i64 {
            let date = first_day + Duration::days(day);
            let weekend = date.weekday().num_days_from_monday() >= 5;
            let base = if weekend {
                WEEKEND_SESSIONS_PER_SITE
            } else {
                WEEKDAY_SESSIONS_PER_SITE
            };
            for site_id in site_ids {
                let count = (base * self.rng.gen_range(0.8..1.2)).round() as usize;
                for _ in 0..count {
                    let hour = hour_weights.sample(&mut self.rng) as i64;
                    let minute = self.rng.gen_range(0..60i64);
                    let start_time = date + Duration::hours(hour) + Duration::minutes(minute);

                    let (capacity_kwh, consumption_wh_per_km) =
                        VEHICLE_CLASSES[self.rng.gen_range(0..VEHICLE_CLASSES.len())];
                    let soc_percent = self.rng.gen_range(20.0..60.0);
                    let distance_km = (TRIP_DISTANCES_KM[trip_weights.sample(&mut self.rng)]
                        + self.rng.gen_range(-5.0..5.0))
                    .max(5.0);

                    // Same energy math the planner uses, plus metering noise.
                    let needed = distance_km * consumption_wh_per_km / 1000.0 * 1.2;
                    let current = capacity_kwh * soc_percent / 100.0;
                    let extra = (needed - current).max(0.0);
                    let delivered = (extra * delivery_noise.sample(&mut self.rng)).max(0.0);

                    records.push(HistoricalSessionRecord {
                        site_id: site_id.to_string(),
                        start_time,
                        energy_delivered_kwh: Some(delivered),
                    });
                }
            }
        }
        records
    }
}
