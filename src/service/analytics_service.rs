use std::sync::Arc;

use chrono::{DateTime, Duration, Months, NaiveTime, Utc};
use uuid::Uuid;

use super::{clock::Clock, error::ServiceError};
use crate::{
    db::{AnalyticsExt, DBClient},
    models::analyticsmodel::{AnalyticsFigures, AnalyticsPeriod, AnalyticsSnapshot},
};

pub const DEFAULT_HISTORY_LIMIT: i64 = 12;
const MAX_HISTORY_LIMIT: i64 = 366;
const DASHBOARD_NEW_CUSTOMER_DAYS: i64 = 30;

/// Start of the window used for the `customers.new` figure: midnight of the
/// current day, stepped back by one period.
pub fn period_start(period: AnalyticsPeriod, now: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();

    match period {
        AnalyticsPeriod::Daily => midnight - Duration::days(1),
        AnalyticsPeriod::Weekly => midnight - Duration::days(7),
        AnalyticsPeriod::Monthly => midnight
            .checked_sub_months(Months::new(1))
            .unwrap_or(midnight - Duration::days(30)),
        AnalyticsPeriod::Yearly => midnight
            .checked_sub_months(Months::new(12))
            .unwrap_or(midnight - Duration::days(365)),
    }
}

pub struct AnalyticsService {
    db: DBClient,
    clock: Arc<dyn Clock>,
}

impl AnalyticsService {
    pub fn new(db: DBClient, clock: Arc<dyn Clock>) -> Self {
        AnalyticsService { db, clock }
    }

    /// Computes and stores today's snapshot for `period`. One per day.
    pub async fn generate(
        &self,
        business_id: Uuid,
        period: AnalyticsPeriod,
    ) -> Result<AnalyticsSnapshot, ServiceError> {
        let now = self.clock.now();
        let figures = self
            .db
            .compute_figures(business_id, period_start(period, now))
            .await?;

        let snapshot = self
            .db
            .save_snapshot(business_id, period, now.date_naive(), &figures)
            .await
            .map_err(|e| {
                let duplicate = e
                    .as_database_error()
                    .map_or(false, |db_err| db_err.is_unique_violation());
                if duplicate {
                    ServiceError::Validation(format!(
                        "A {} snapshot already exists for today",
                        period.to_str()
                    ))
                } else {
                    ServiceError::from(e)
                }
            })?;

        tracing::info!(
            "analytics snapshot {} generated for business {} ({})",
            snapshot.id,
            business_id,
            period.to_str()
        );

        Ok(snapshot)
    }

    /// Live figures. Not linearizable with concurrent ledger writes.
    pub async fn dashboard(&self, business_id: Uuid) -> Result<AnalyticsFigures, ServiceError> {
        let since = self.clock.now() - Duration::days(DASHBOARD_NEW_CUSTOMER_DAYS);
        Ok(self.db.compute_figures(business_id, since).await?)
    }

    pub async fn history(
        &self,
        business_id: Uuid,
        period: Option<AnalyticsPeriod>,
        limit: Option<i64>,
    ) -> Result<Vec<AnalyticsSnapshot>, ServiceError> {
        let period = period.unwrap_or(AnalyticsPeriod::Monthly);
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);

        Ok(self
            .db
            .get_snapshots(business_id, Some(period), limit)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 30, 0).unwrap()
    }

    #[test]
    fn daily_and_weekly_windows_start_at_midnight() {
        let now = at(2025, 3, 10, 15);
        assert_eq!(period_start(AnalyticsPeriod::Daily, now), Utc.with_ymd_and_hms(2025, 3, 9, 0, 0, 0).unwrap());
        assert_eq!(period_start(AnalyticsPeriod::Weekly, now), Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap());
    }

    #[test]
    fn monthly_window_follows_the_calendar() {
        let now = at(2025, 3, 31, 8);
        // February has no 31st; chrono clamps to the last day.
        assert_eq!(
            period_start(AnalyticsPeriod::Monthly, now),
            Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn yearly_window_handles_leap_day() {
        let now = at(2024, 2, 29, 23);
        assert_eq!(
            period_start(AnalyticsPeriod::Yearly, now),
            Utc.with_ymd_and_hms(2023, 2, 28, 0, 0, 0).unwrap()
        );
    }
}
