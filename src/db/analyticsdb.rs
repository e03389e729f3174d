use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::analyticsmodel::{
    AnalyticsFigures, AnalyticsPeriod, AnalyticsSnapshot, CampaignCounts, CustomerCounts,
    Financials, ReferralCounts, RewardCounts, SharingCounts,
};

#[async_trait]
pub trait AnalyticsExt {
    /// All-time totals for the business; only `customers.new` is windowed,
    /// counting customers created at or after `new_since`.
    async fn compute_figures(
        &self,
        business_id: Uuid,
        new_since: DateTime<Utc>,
    ) -> Result<AnalyticsFigures, sqlx::Error>;

    async fn save_snapshot(
        &self,
        business_id: Uuid,
        period: AnalyticsPeriod,
        snapshot_date: NaiveDate,
        figures: &AnalyticsFigures,
    ) -> Result<AnalyticsSnapshot, sqlx::Error>;

    async fn get_snapshots(
        &self,
        business_id: Uuid,
        period: Option<AnalyticsPeriod>,
        limit: i64,
    ) -> Result<Vec<AnalyticsSnapshot>, sqlx::Error>;
}

#[async_trait]
impl AnalyticsExt for DBClient {
    async fn compute_figures(
        &self,
        business_id: Uuid,
        new_since: DateTime<Utc>,
    ) -> Result<AnalyticsFigures, sqlx::Error> {
        let (total, pending, clicked, converted, rewarded, expired, rejected) =
            sqlx::query_as::<_, (i64, i64, i64, i64, i64, i64, i64)>(
                r#"
                SELECT
                    COUNT(*),
                    COUNT(*) FILTER (WHERE status = 'pending'),
                    COUNT(*) FILTER (WHERE status = 'clicked'),
                    COUNT(*) FILTER (WHERE status = 'converted'),
                    COUNT(*) FILTER (WHERE status = 'rewarded'),
                    COUNT(*) FILTER (WHERE status = 'expired'),
                    COUNT(*) FILTER (WHERE status = 'rejected')
                FROM referrals
                WHERE business_id = $1
                "#,
            )
            .bind(business_id)
            .fetch_one(&self.pool)
            .await?;

        let referrals = ReferralCounts {
            total,
            pending,
            clicked,
            converted,
            rewarded,
            expired,
            rejected,
        };

        let (active, ended, total_referrals) = sqlx::query_as::<_, (i64, i64, i64)>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'active' AND active = TRUE),
                COUNT(*) FILTER (WHERE status = 'ended'),
                COALESCE(SUM(total_referrals), 0)::BIGINT
            FROM campaigns
            WHERE business_id = $1
            "#,
        )
        .bind(business_id)
        .fetch_one(&self.pool)
        .await?;

        let campaigns = CampaignCounts {
            active,
            ended,
            total_referrals,
            conversion_rate: referrals.conversion_rate(),
        };

        let (total, new, active, referred) = sqlx::query_as::<_, (i64, i64, i64, i64)>(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE created_at >= $2),
                COUNT(*) FILTER (WHERE active = TRUE),
                COUNT(*) FILTER (WHERE source = 'referral')
            FROM customers
            WHERE business_id = $1
            "#,
        )
        .bind(business_id)
        .bind(new_since)
        .fetch_one(&self.pool)
        .await?;

        let customers = CustomerCounts {
            total,
            new,
            active,
            referred,
        };

        let (total, issued, claimed, expired, total_value, claimed_value) =
            sqlx::query_as::<_, (i64, i64, i64, i64, f64, f64)>(
                r#"
                SELECT
                    COUNT(*),
                    COUNT(*) FILTER (WHERE status = 'issued'),
                    COUNT(*) FILTER (WHERE status = 'claimed'),
                    COUNT(*) FILTER (WHERE status = 'expired'),
                    COALESCE(SUM(value), 0)::FLOAT8,
                    COALESCE(SUM(value) FILTER (WHERE status = 'claimed'), 0)::FLOAT8
                FROM rewards
                WHERE business_id = $1
                "#,
            )
            .bind(business_id)
            .fetch_one(&self.pool)
            .await?;

        let rewards = RewardCounts {
            total,
            issued,
            claimed,
            expired,
            total_value,
        };

        let sharing: SharingCounts = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT sharing_method::text, COUNT(*)
            FROM referrals
            WHERE business_id = $1
            GROUP BY sharing_method
            "#,
        )
        .bind(business_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .collect();

        Ok(AnalyticsFigures {
            referrals,
            campaigns,
            customers,
            rewards,
            sharing,
            financials: Financials {
                rewards_cost: claimed_value,
            },
        })
    }

    async fn save_snapshot(
        &self,
        business_id: Uuid,
        period: AnalyticsPeriod,
        snapshot_date: NaiveDate,
        figures: &AnalyticsFigures,
    ) -> Result<AnalyticsSnapshot, sqlx::Error> {
        sqlx::query_as::<_, AnalyticsSnapshot>(
            r#"
            INSERT INTO analytics_snapshots (
                business_id, period, snapshot_date, referrals, campaigns, customers,
                rewards, sharing, financials
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(business_id)
        .bind(period)
        .bind(snapshot_date)
        .bind(Json(&figures.referrals))
        .bind(Json(&figures.campaigns))
        .bind(Json(&figures.customers))
        .bind(Json(&figures.rewards))
        .bind(Json(&figures.sharing))
        .bind(Json(&figures.financials))
        .fetch_one(&self.pool)
        .await
    }

    async fn get_snapshots(
        &self,
        business_id: Uuid,
        period: Option<AnalyticsPeriod>,
        limit: i64,
    ) -> Result<Vec<AnalyticsSnapshot>, sqlx::Error> {
        sqlx::query_as::<_, AnalyticsSnapshot>(
            r#"
            SELECT * FROM analytics_snapshots
            WHERE business_id = $1 AND ($2::analytics_period IS NULL OR period = $2)
            ORDER BY snapshot_date DESC, created_at DESC
            LIMIT $3
            "#,
        )
        .bind(business_id)
        .bind(period)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}
