//! Aggregation and rollup calculations over stored samples

use crate::types::{AggregateSummary, AggregatedBucket, Interval, WeatherSample};
use chrono::{DateTime, Datelike, Duration, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use std::collections::BTreeMap;

/// Running min/max/sum accumulator for a single metric
#[derive(Debug, Clone)]
pub struct Accumulator {
    sum: f64,
    min: f64,
    max: f64,
    count: u64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            count: 0,
        }
    }

    pub fn add(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.count += 1;
    }

    pub fn avg(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Accumulates every aggregated metric of a group of samples
#[derive(Debug, Clone, Default)]
pub struct SampleAccumulator {
    first: Option<DateTime<Utc>>,
    count: u64,
    temperature: Accumulator,
    pressure: Accumulator,
    humidity: Accumulator,
    cloud_cover: Accumulator,
    wind_speed: Accumulator,
}

impl SampleAccumulator {
    pub fn add(&mut self, sample: &WeatherSample) {
        self.first = Some(match self.first {
            Some(first) => first.min(sample.timestamp),
            None => sample.timestamp,
        });
        self.count += 1;
        self.temperature.add(sample.temperature);
        self.pressure.add(sample.pressure);
        self.humidity.add(sample.humidity);
        self.cloud_cover.add(sample.cloud_cover);
        self.wind_speed.add(sample.wind_speed);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Build a bucket; `None` when nothing was accumulated
    pub fn to_bucket(&self, interval: Interval) -> Option<AggregatedBucket> {
        Some(AggregatedBucket {
            timestamp: self.first?,
            avg_temperature: self.temperature.avg().unwrap_or_default(),
            min_temperature: self.temperature.min().unwrap_or_default(),
            max_temperature: self.temperature.max().unwrap_or_default(),
            avg_pressure: self.pressure.avg().unwrap_or_default(),
            avg_humidity: self.humidity.avg().unwrap_or_default(),
            avg_cloud_cover: self.cloud_cover.avg().unwrap_or_default(),
            avg_wind_speed: self.wind_speed.avg().unwrap_or_default(),
            count: self.count,
            interval,
        })
    }

    /// Flat summary; all zeros with `records_count == 0` when empty
    pub fn to_summary(&self) -> AggregateSummary {
        AggregateSummary {
            avg_temperature: self.temperature.avg().unwrap_or_default(),
            min_temperature: self.temperature.min().unwrap_or_default(),
            max_temperature: self.temperature.max().unwrap_or_default(),
            avg_pressure: self.pressure.avg().unwrap_or_default(),
            avg_humidity: self.humidity.avg().unwrap_or_default(),
            avg_cloud_cover: self.cloud_cover.avg().unwrap_or_default(),
            avg_wind_speed: self.wind_speed.avg().unwrap_or_default(),
            records_count: self.count,
        }
    }
}

/// Calendar-aligned (UTC) start of the bucket containing `timestamp`.
///
/// Weeks start on Monday.
pub fn bucket_start(timestamp: DateTime<Utc>, interval: Interval) -> DateTime<Utc> {
    let naive = timestamp.naive_utc();
    let date = naive.date();

    let aligned: Option<NaiveDateTime> = match interval {
        Interval::Minute => NaiveTime::from_hms_opt(naive.hour(), naive.minute(), 0)
            .map(|time| date.and_time(time)),
        Interval::Hour => {
            NaiveTime::from_hms_opt(naive.hour(), 0, 0).map(|time| date.and_time(time))
        }
        Interval::Day => Some(date.and_time(NaiveTime::MIN)),
        Interval::Week => {
            let offset = i64::from(date.weekday().num_days_from_monday());
            Some((date - Duration::days(offset)).and_time(NaiveTime::MIN))
        }
        Interval::Month => date.with_day(1).map(|d| d.and_time(NaiveTime::MIN)),
    };

    Utc.from_utc_datetime(&aligned.unwrap_or(naive))
}

/// Group samples into calendar buckets, ascending by bucket start
pub fn bucket_samples(samples: &[WeatherSample], interval: Interval) -> Vec<AggregatedBucket> {
    let mut buckets: BTreeMap<DateTime<Utc>, SampleAccumulator> = BTreeMap::new();

    for sample in samples {
        buckets
            .entry(bucket_start(sample.timestamp, interval))
            .or_default()
            .add(sample);
    }

    buckets
        .values()
        .filter_map(|acc| acc.to_bucket(interval))
        .collect()
}

/// Summarize all samples into one flat record
pub fn summarize(samples: &[WeatherSample]) -> AggregateSummary {
    let mut acc = SampleAccumulator::default();
    for sample in samples {
        acc.add(sample);
    }
    acc.to_summary()
}
