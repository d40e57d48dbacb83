use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::analysis::model::{HealthCondition, HealthPrediction, NutritionData};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveScanRequest {
    #[serde(default)]
    pub food_name: Option<String>,
    #[validate(nested)]
    pub nutrition_data: NutritionData,
    pub condition: HealthCondition,
    pub prediction: HealthPrediction,
}

#[derive(Debug, Deserialize)]
pub struct ScanListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub condition: Option<HealthCondition>,
}
fn default_limit() -> i64 {
    20
}

impl ScanListQuery {
    pub const MAX_LIMIT: i64 = 100;

    pub fn bounds(&self) -> (i64, i64) {
        (self.limit.clamp(1, Self::MAX_LIMIT), self.offset.max(0))
    }
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub scans_today: i64,
    pub safe_scans: i64,
    pub risky_scans: i64,
    pub total_scans: i64,
    pub safe_percentage: u32,
    pub nutrient_averages: Vec<NutrientAverage>,
}

/// Mean of one nutrition label field across a user's scans, rounded.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NutrientAverage {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Access token for clients that cannot set headers (EventSource).
    pub token: Option<String>,
}
