//! Stored form of scan records.
//!
//! Nutrition documents carry a `schemaVersion`. Version 1 documents named
//! total sugars `sugar`; they are upgraded in memory when read.

use anyhow::Context;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::analysis::model::{HealthCondition, HealthPrediction, NutritionData};

pub const NUTRITION_SCHEMA_VERSION: u64 = 2;
const VERSION_KEY: &str = "schemaVersion";

pub fn encode_nutrition(nutrition: &NutritionData) -> anyhow::Result<Value> {
    let mut doc = serde_json::to_value(nutrition).context("encode nutrition")?;
    if let Value::Object(map) = &mut doc {
        map.insert(VERSION_KEY.into(), NUTRITION_SCHEMA_VERSION.into());
    }
    Ok(doc)
}

fn upgrade_v1(map: &mut Map<String, Value>) {
    if !map.contains_key("totalSugars") {
        let sugar = map.remove("sugar").unwrap_or(Value::from(0.0));
        map.insert("totalSugars".into(), sugar);
    }
    map.remove("sugar");
}

pub fn decode_nutrition(mut doc: Value) -> anyhow::Result<NutritionData> {
    let Value::Object(map) = &mut doc else {
        anyhow::bail!("nutrition document is not an object");
    };
    let version = map
        .remove(VERSION_KEY)
        .and_then(|v| v.as_u64())
        .unwrap_or(1);
    if version < 2 {
        upgrade_v1(map);
    }
    if version > NUTRITION_SCHEMA_VERSION {
        tracing::warn!(version, "nutrition document from a newer schema");
    }
    serde_json::from_value(doc).context("decode nutrition")
}

#[derive(Debug, Clone, FromRow)]
pub struct ScanRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub food_name: Option<String>,
    pub nutrition: Value,
    pub condition: String,
    pub prediction: Json<HealthPrediction>,
    pub created_at: OffsetDateTime,
}

/// A saved scan as returned to its owner.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub food_name: Option<String>,
    pub nutrition_data: NutritionData,
    pub condition: HealthCondition,
    pub prediction: HealthPrediction,
}

impl TryFrom<ScanRow> for ScanRecord {
    type Error = anyhow::Error;

    fn try_from(row: ScanRow) -> anyhow::Result<Self> {
        let condition = row
            .condition
            .parse::<HealthCondition>()
            .map_err(anyhow::Error::msg)?;
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            timestamp: row.created_at,
            food_name: row.food_name,
            nutrition_data: decode_nutrition(row.nutrition).with_context(|| format!("scan {}", row.id))?,
            condition,
            prediction: row.prediction.0,
        })
    }
}

/// Rows that no longer decode are logged and left out.
pub fn decode_rows(rows: Vec<ScanRow>) -> Vec<ScanRecord> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id;
            ScanRecord::try_from(row)
                .map_err(|e| tracing::warn!(scan_id = %id, error = %e, "skipping undecodable scan"))
                .ok()
        })
        .collect()
}
