//! MySQL query operations and store trait implementations

use crate::schema::{ReportRow, SampleRow};
use crate::{DbClient, DbResult};
use chrono::{DateTime, Utc};
use sqlx::{MySql, QueryBuilder};
use tracing::{debug, instrument};
use wxr_core::{
    CodeStore, OneTimeCode, Page, ReportFilter, ReportOrder, ReportStore, SampleQuery,
    SampleStore, StoreResult, TimeRange, WeatherReport, WeatherSample, SAMPLE_GRANULARITY,
};

const SAMPLE_COLUMNS: &str = "observed_at, temperature, pressure, humidity, cloud_cover, \
     wind_speed, wind_direction, visibility, weather_condition, rain_amount, provider, \
     location_name, latitude, longitude";

const REPORT_COLUMNS: &str = "id, title, start_time, end_time, avg_temperature, avg_pressure, \
     avg_humidity, avg_cloud_cover, avg_wind_speed, data_points_count, user_id, created_at, \
     updated_at";

/// Sorted, paginated sample range scan
pub fn sample_query_sql(query: &SampleQuery) -> QueryBuilder<'static, MySql> {
    let mut qb = QueryBuilder::new(format!("SELECT {SAMPLE_COLUMNS} FROM weather_samples"));
    push_range(&mut qb, &query.range);
    qb.push(format!(
        " ORDER BY {} {}",
        query.sort_field.column(),
        query.sort_order.as_sql()
    ));
    qb.push(" LIMIT ")
        .push_bind(query.limit.map_or(u64::MAX, u64::from))
        .push(" OFFSET ")
        .push_bind(u64::from(query.offset));
    qb
}

/// Filtered, ordered, paginated report listing
pub fn report_list_sql(
    filter: &ReportFilter,
    order: &ReportOrder,
    page: Page,
) -> QueryBuilder<'static, MySql> {
    let mut qb = QueryBuilder::new(format!("SELECT {REPORT_COLUMNS} FROM weather_reports WHERE "));
    push_filter(&mut qb, filter);

    qb.push(" ORDER BY ");
    for (i, (field, direction)) in order.keys().iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(field.column()).push(" ").push(direction.as_sql());
    }

    qb.push(" LIMIT ")
        .push_bind(u64::from(page.first))
        .push(" OFFSET ")
        .push_bind(u64::from(page.skip));
    qb
}

pub fn report_count_sql(filter: &ReportFilter) -> QueryBuilder<'static, MySql> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM weather_reports WHERE ");
    push_filter(&mut qb, filter);
    qb
}

fn push_range(qb: &mut QueryBuilder<'static, MySql>, range: &TimeRange) {
    qb.push(" WHERE observed_at >= ")
        .push_bind(range.start.naive_utc())
        .push(" AND observed_at <= ")
        .push_bind(range.end.naive_utc());
}

/// Render a filter node as a parenthesized boolean expression
fn push_filter(qb: &mut QueryBuilder<'static, MySql>, filter: &ReportFilter) {
    let mut clauses = 0usize;
    let mut next_clause = |qb: &mut QueryBuilder<'static, MySql>| {
        if clauses > 0 {
            qb.push(" AND ");
        }
        clauses += 1;
    };

    qb.push("(");

    if let Some(text) = &filter.title_contains {
        next_clause(qb);
        qb.push("LOWER(title) LIKE ").push_bind(like_pattern(text));
    }

    if let Some(user_id) = &filter.user_id {
        next_clause(qb);
        qb.push("user_id = ").push_bind(user_id.clone());
    }

    let date_filters = [
        ("start_time", filter.start_time),
        ("end_time", filter.end_time),
        ("created_at", filter.created_at),
    ];
    for (column, date_filter) in date_filters {
        let Some(date_filter) = date_filter else {
            continue;
        };
        if let Some(gte) = date_filter.gte {
            next_clause(qb);
            qb.push(column).push(" >= ").push_bind(gte.naive_utc());
        }
        if let Some(lte) = date_filter.lte {
            next_clause(qb);
            qb.push(column).push(" <= ").push_bind(lte.naive_utc());
        }
    }

    for child in &filter.and {
        next_clause(qb);
        push_filter(qb, child);
    }

    if !filter.or.is_empty() {
        next_clause(qb);
        qb.push("(");
        for (i, child) in filter.or.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            push_filter(qb, child);
        }
        qb.push(")");
    }

    if clauses == 0 {
        qb.push("1 = 1");
    }
    qb.push(")");
}

/// Case-insensitive substring pattern with LIKE wildcards escaped
fn like_pattern(text: &str) -> String {
    let escaped = text
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

impl DbClient {
    /// Append a weather sample
    #[instrument(skip(self, sample), fields(observed_at = %sample.timestamp))]
    pub async fn insert_sample_record(&self, sample: &WeatherSample) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO weather_samples (
                observed_at, temperature, pressure, humidity, cloud_cover,
                wind_speed, wind_direction, visibility, weather_condition, rain_amount,
                provider, location_name, latitude, longitude, granularity, received_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(sample.timestamp.naive_utc())
        .bind(sample.temperature)
        .bind(sample.pressure)
        .bind(sample.humidity)
        .bind(sample.cloud_cover)
        .bind(sample.wind_speed)
        .bind(sample.wind_direction)
        .bind(sample.visibility)
        .bind(&sample.weather_condition)
        .bind(sample.rain_amount)
        .bind(&sample.source.provider)
        .bind(&sample.source.location.name)
        .bind(sample.source.location.latitude)
        .bind(sample.source.location.longitude)
        .bind(SAMPLE_GRANULARITY)
        .bind(Utc::now().naive_utc())
        .execute(self.pool())
        .await?;

        debug!("Inserted weather sample for {}", sample.timestamp);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn fetch_samples(&self, query: &SampleQuery) -> DbResult<Vec<WeatherSample>> {
        let rows = sample_query_sql(query)
            .build_query_as::<SampleRow>()
            .fetch_all(self.pool())
            .await?;

        debug!("Retrieved {} weather samples", rows.len());
        Ok(rows.into_iter().map(WeatherSample::from).collect())
    }

    #[instrument(skip(self))]
    pub async fn count_samples_between(&self, range: &TimeRange) -> DbResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM weather_samples WHERE observed_at >= ? AND observed_at <= ?",
        )
        .bind(range.start.naive_utc())
        .bind(range.end.naive_utc())
        .fetch_one(self.pool())
        .await?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    #[instrument(skip(self))]
    pub async fn fetch_samples_between(&self, range: &TimeRange) -> DbResult<Vec<WeatherSample>> {
        let rows = sqlx::query_as::<_, SampleRow>(&format!(
            "SELECT {SAMPLE_COLUMNS} FROM weather_samples \
             WHERE observed_at >= ? AND observed_at <= ? ORDER BY observed_at ASC"
        ))
        .bind(range.start.naive_utc())
        .bind(range.end.naive_utc())
        .fetch_all(self.pool())
        .await?;

        debug!(
            "Retrieved {} samples between {} and {}",
            rows.len(),
            range.start,
            range.end
        );
        Ok(rows.into_iter().map(WeatherSample::from).collect())
    }

    #[instrument(skip(self, report), fields(id = %report.id))]
    pub async fn insert_report_record(&self, report: &WeatherReport) -> DbResult<()> {
        sqlx::query(&format!(
            "INSERT INTO weather_reports ({REPORT_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&report.id)
        .bind(&report.title)
        .bind(report.start_time.naive_utc())
        .bind(report.end_time.naive_utc())
        .bind(report.avg_temperature)
        .bind(report.avg_pressure)
        .bind(report.avg_humidity)
        .bind(report.avg_cloud_cover)
        .bind(report.avg_wind_speed)
        .bind(i64::try_from(report.data_points_count).unwrap_or(i64::MAX))
        .bind(&report.user_id)
        .bind(report.created_at.naive_utc())
        .bind(report.updated_at.naive_utc())
        .execute(self.pool())
        .await?;

        debug!("Inserted weather report {}", report.id);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn fetch_report(&self, id: &str) -> DbResult<Option<WeatherReport>> {
        let row = sqlx::query_as::<_, ReportRow>(&format!(
            "SELECT {REPORT_COLUMNS} FROM weather_reports WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(WeatherReport::from))
    }

    #[instrument(skip(self))]
    pub async fn fetch_reports(
        &self,
        filter: &ReportFilter,
        order: &ReportOrder,
        page: Page,
    ) -> DbResult<Vec<WeatherReport>> {
        let rows = report_list_sql(filter, order, page)
            .build_query_as::<ReportRow>()
            .fetch_all(self.pool())
            .await?;

        Ok(rows.into_iter().map(WeatherReport::from).collect())
    }

    #[instrument(skip(self))]
    pub async fn count_reports_matching(&self, filter: &ReportFilter) -> DbResult<u64> {
        let count: i64 = report_count_sql(filter)
            .build_query_scalar::<i64>()
            .fetch_one(self.pool())
            .await?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    #[instrument(skip(self, code))]
    pub async fn insert_code_record(&self, code: &OneTimeCode) -> DbResult<()> {
        sqlx::query("INSERT INTO one_time_codes (email, code, created_at) VALUES (?, ?, ?)")
            .bind(&code.email)
            .bind(&code.code)
            .bind(code.created_at.naive_utc())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Delete one-time codes created before `cutoff`
    #[instrument(skip(self))]
    pub async fn delete_codes_before(&self, cutoff: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM one_time_codes WHERE created_at < ?")
            .bind(cutoff.naive_utc())
            .execute(self.pool())
            .await?;

        let deleted = result.rows_affected();
        debug!("Deleted {} one-time codes created before {}", deleted, cutoff);
        Ok(deleted)
    }
}

#[async_trait::async_trait]
impl SampleStore for DbClient {
    async fn insert_sample(&self, sample: &WeatherSample) -> StoreResult<()> {
        Ok(self.insert_sample_record(sample).await?)
    }

    async fn query_samples(&self, query: &SampleQuery) -> StoreResult<Vec<WeatherSample>> {
        Ok(self.fetch_samples(query).await?)
    }

    async fn count_samples(&self, range: &TimeRange) -> StoreResult<u64> {
        Ok(self.count_samples_between(range).await?)
    }

    async fn samples_in_range(&self, range: &TimeRange) -> StoreResult<Vec<WeatherSample>> {
        Ok(self.fetch_samples_between(range).await?)
    }
}

#[async_trait::async_trait]
impl ReportStore for DbClient {
    async fn insert_report(&self, report: &WeatherReport) -> StoreResult<()> {
        Ok(self.insert_report_record(report).await?)
    }

    async fn get_report(&self, id: &str) -> StoreResult<Option<WeatherReport>> {
        Ok(self.fetch_report(id).await?)
    }

    async fn list_reports(
        &self,
        filter: &ReportFilter,
        order: &ReportOrder,
        page: Page,
    ) -> StoreResult<Vec<WeatherReport>> {
        Ok(self.fetch_reports(filter, order, page).await?)
    }

    async fn count_reports(&self, filter: &ReportFilter) -> StoreResult<u64> {
        Ok(self.count_reports_matching(filter).await?)
    }
}

#[async_trait::async_trait]
impl CodeStore for DbClient {
    async fn insert_code(&self, code: &OneTimeCode) -> StoreResult<()> {
        Ok(self.insert_code_record(code).await?)
    }

    async fn delete_codes_created_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        Ok(self.delete_codes_before(cutoff).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use wxr_core::{DateFilter, SampleSortField, SortOrder};

    #[test]
    fn test_empty_filter_sql() {
        let qb = report_count_sql(&ReportFilter::default());
        insta::assert_snapshot!(qb.sql(), @"SELECT COUNT(*) FROM weather_reports WHERE (1 = 1)");
    }

    #[test]
    fn test_filter_tree_sql() {
        let gte = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let filter = ReportFilter {
            title_contains: Some("Storm".into()),
            or: vec![
                ReportFilter {
                    created_at: Some(DateFilter {
                        gte: Some(gte),
                        lte: None,
                    }),
                    ..ReportFilter::default()
                },
                ReportFilter::owned_by("u1"),
            ],
            ..ReportFilter::default()
        };

        let qb = report_count_sql(&filter);
        insta::assert_snapshot!(qb.sql(), @"SELECT COUNT(*) FROM weather_reports WHERE (LOWER(title) LIKE ? AND ((created_at >= ?) OR (user_id = ?)))");
    }

    #[test]
    fn test_list_sql_orders_and_pages() {
        let order = ReportOrder::parse(&["startTime_ASC", "title_DESC"]).unwrap();
        let qb = report_list_sql(&ReportFilter::default(), &order, Page::new(10, 20));
        assert!(qb
            .sql()
            .ends_with("WHERE (1 = 1) ORDER BY start_time ASC, title DESC LIMIT ? OFFSET ?"));
    }

    #[test]
    fn test_sample_query_sql() {
        let now = Utc::now();
        let query = SampleQuery::new(TimeRange::new(now, now))
            .limit(5)
            .sort(SampleSortField::Temperature, SortOrder::Asc);

        let qb = sample_query_sql(&query);
        assert!(qb.sql().ends_with(
            "FROM weather_samples WHERE observed_at >= ? AND observed_at <= ? ORDER BY temperature ASC LIMIT ? OFFSET ?"
        ));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("Storm"), "%storm%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }
}
