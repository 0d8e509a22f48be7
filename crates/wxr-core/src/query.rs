//! Query, filter, ordering and paging types shared by the stores

use crate::types::{WeatherReport, WeatherSample};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

/// Inclusive time range `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    /// Apply this order to an ascending comparison
    pub fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

impl FromStr for SortOrder {
    type Err = InvalidOrder;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Ok(SortOrder::Asc),
            "DESC" => Ok(SortOrder::Desc),
            _ => Err(InvalidOrder(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Invalid ordering: {0}")]
pub struct InvalidOrder(pub String);

/// Sample fields a range query may be sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum SampleSortField {
    #[default]
    Timestamp,
    Temperature,
    Pressure,
    Humidity,
    WindSpeed,
}

impl SampleSortField {
    pub fn column(&self) -> &'static str {
        match self {
            SampleSortField::Timestamp => "observed_at",
            SampleSortField::Temperature => "temperature",
            SampleSortField::Pressure => "pressure",
            SampleSortField::Humidity => "humidity",
            SampleSortField::WindSpeed => "wind_speed",
        }
    }

    pub fn compare(&self, a: &WeatherSample, b: &WeatherSample) -> Ordering {
        match self {
            SampleSortField::Timestamp => a.timestamp.cmp(&b.timestamp),
            SampleSortField::Temperature => a.temperature.total_cmp(&b.temperature),
            SampleSortField::Pressure => a.pressure.total_cmp(&b.pressure),
            SampleSortField::Humidity => a.humidity.total_cmp(&b.humidity),
            SampleSortField::WindSpeed => a.wind_speed.total_cmp(&b.wind_speed),
        }
    }
}

impl FromStr for SampleSortField {
    type Err = InvalidOrder;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "timestamp" => Ok(SampleSortField::Timestamp),
            "temperature" => Ok(SampleSortField::Temperature),
            "pressure" => Ok(SampleSortField::Pressure),
            "humidity" => Ok(SampleSortField::Humidity),
            "windSpeed" => Ok(SampleSortField::WindSpeed),
            _ => Err(InvalidOrder(s.to_string())),
        }
    }
}

/// Paginated, sorted range scan over samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleQuery {
    pub range: TimeRange,
    pub limit: Option<u32>,
    pub offset: u32,
    pub sort_field: SampleSortField,
    pub sort_order: SortOrder,
}

impl SampleQuery {
    /// Newest first, unbounded
    pub fn new(range: TimeRange) -> Self {
        Self {
            range,
            limit: None,
            offset: 0,
            sort_field: SampleSortField::default(),
            sort_order: SortOrder::default(),
        }
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn sort(mut self, field: SampleSortField, order: SortOrder) -> Self {
        self.sort_field = field;
        self.sort_order = order;
        self
    }
}

/// `gte`/`lte` predicate on a timestamp column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<DateTime<Utc>>,
}

impl DateFilter {
    pub fn matches(&self, value: DateTime<Utc>) -> bool {
        self.gte.map_or(true, |gte| value >= gte) && self.lte.map_or(true, |lte| value <= lte)
    }
}

/// Report filter tree.
///
/// Every populated field of a node must hold; `and` children must all hold and
/// at least one `or` child must hold when `or` is non-empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFilter {
    #[serde(default, rename = "AND", skip_serializing_if = "Vec::is_empty")]
    pub and: Vec<ReportFilter>,
    #[serde(default, rename = "OR", skip_serializing_if = "Vec::is_empty")]
    pub or: Vec<ReportFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl ReportFilter {
    pub fn owned_by(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn title_contains(text: impl Into<String>) -> Self {
        Self {
            title_contains: Some(text.into()),
            ..Self::default()
        }
    }

    /// Combine two filters so both must hold
    pub fn and(self, other: ReportFilter) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        Self {
            and: vec![self, other],
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn matches(&self, report: &WeatherReport) -> bool {
        if let Some(text) = &self.title_contains {
            if !report
                .title
                .to_lowercase()
                .contains(&text.to_lowercase())
            {
                return false;
            }
        }
        if let Some(user_id) = &self.user_id {
            if report.user_id.as_ref() != Some(user_id) {
                return false;
            }
        }
        let date_checks = [
            (self.start_time, report.start_time),
            (self.end_time, report.end_time),
            (self.created_at, report.created_at),
        ];
        if date_checks
            .iter()
            .any(|(filter, value)| filter.is_some_and(|f| !f.matches(*value)))
        {
            return false;
        }
        if !self.and.iter().all(|child| child.matches(report)) {
            return false;
        }
        self.or.is_empty() || self.or.iter().any(|child| child.matches(report))
    }
}

/// Report fields usable in `orderBy` tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportSortField {
    Title,
    StartTime,
    EndTime,
    CreatedAt,
    UpdatedAt,
    AvgTemperature,
    DataPointsCount,
}

impl ReportSortField {
    pub fn column(&self) -> &'static str {
        match self {
            ReportSortField::Title => "title",
            ReportSortField::StartTime => "start_time",
            ReportSortField::EndTime => "end_time",
            ReportSortField::CreatedAt => "created_at",
            ReportSortField::UpdatedAt => "updated_at",
            ReportSortField::AvgTemperature => "avg_temperature",
            ReportSortField::DataPointsCount => "data_points_count",
        }
    }

    pub fn compare(&self, a: &WeatherReport, b: &WeatherReport) -> Ordering {
        match self {
            // case-insensitive, like the MySQL collation
            ReportSortField::Title => a
                .title
                .chars()
                .flat_map(char::to_lowercase)
                .cmp(b.title.chars().flat_map(char::to_lowercase)),
            ReportSortField::StartTime => a.start_time.cmp(&b.start_time),
            ReportSortField::EndTime => a.end_time.cmp(&b.end_time),
            ReportSortField::CreatedAt => a.created_at.cmp(&b.created_at),
            ReportSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            ReportSortField::AvgTemperature => match (a.avg_temperature, b.avg_temperature) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (x, y) => x.is_some().cmp(&y.is_some()),
            },
            ReportSortField::DataPointsCount => a.data_points_count.cmp(&b.data_points_count),
        }
    }
}

impl FromStr for ReportSortField {
    type Err = InvalidOrder;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "title" => Ok(ReportSortField::Title),
            "startTime" => Ok(ReportSortField::StartTime),
            "endTime" => Ok(ReportSortField::EndTime),
            "createdAt" => Ok(ReportSortField::CreatedAt),
            "updatedAt" => Ok(ReportSortField::UpdatedAt),
            "avgTemperature" => Ok(ReportSortField::AvgTemperature),
            "dataPointsCount" => Ok(ReportSortField::DataPointsCount),
            _ => Err(InvalidOrder(s.to_string())),
        }
    }
}

/// Ordered list of sort keys, parsed from `{field}_{ASC|DESC}` tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOrder(Vec<(ReportSortField, SortOrder)>);

impl ReportOrder {
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> Result<Self, InvalidOrder> {
        if tokens.is_empty() {
            return Ok(Self::default());
        }

        let keys = tokens
            .iter()
            .map(|token| {
                let token = token.as_ref().trim();
                let (field, order) = token
                    .rsplit_once('_')
                    .ok_or_else(|| InvalidOrder(token.to_string()))?;
                let field = field
                    .parse::<ReportSortField>()
                    .map_err(|_| InvalidOrder(token.to_string()))?;
                let order = order
                    .parse::<SortOrder>()
                    .map_err(|_| InvalidOrder(token.to_string()))?;
                Ok((field, order))
            })
            .collect::<Result<Vec<_>, InvalidOrder>>()?;

        Ok(Self(keys))
    }

    pub fn keys(&self) -> &[(ReportSortField, SortOrder)] {
        &self.0
    }

    pub fn compare(&self, a: &WeatherReport, b: &WeatherReport) -> Ordering {
        self.0
            .iter()
            .map(|(field, order)| order.apply(field.compare(a, b)))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl Default for ReportOrder {
    /// Newest first
    fn default() -> Self {
        Self(vec![(ReportSortField::CreatedAt, SortOrder::Desc)])
    }
}

/// Resolved page window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub first: u32,
    pub skip: u32,
}

impl Page {
    pub fn new(first: u32, skip: u32) -> Self {
        Self { first, skip }
    }

    /// Slice an already ordered collection
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.skip as usize)
            .take(self.first as usize)
            .collect()
    }
}
