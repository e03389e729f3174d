use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::analyticsmodel::AnalyticsPeriod;

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct GenerateAnalyticsDto {
    pub period: Option<AnalyticsPeriod>,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct AnalyticsHistoryQueryDto {
    pub period: Option<AnalyticsPeriod>,
    #[validate(range(min = 1, max = 366))]
    pub limit: Option<i64>,
}
