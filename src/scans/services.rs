use std::collections::BTreeMap;

use serde_json::{json, Value};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{NutrientAverage, ScanStats},
    record::{decode_rows, ScanRecord},
    repo::{self, ScanCounts},
};
use crate::{
    analysis::{
        model::{default_daily_tips, HealthCondition, NutritionData, Verdict},
        prompt::{ScanSample, VerdictCounts},
        services::request_daily_tips,
    },
    audit::{self, AuditAction, AuditSeverity, NewAuditEntry},
    profile::{model::UserProfile, repo::update_tips},
    state::AppState,
};

pub const UNNAMED_FOOD: &str = "Unnamed Food";
pub const NUTRIENT_AVERAGE_LIMIT: usize = 6;
const TIP_SAMPLE_SIZE: usize = 5;

/// Condition a scan is filed under. Scans judged for both conditions are
/// filed as diabetes.
pub fn stored_condition(condition: HealthCondition) -> HealthCondition {
    match condition {
        HealthCondition::Both => HealthCondition::Diabetes,
        other => other,
    }
}

pub fn food_name_or_default(name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => UNNAMED_FOOD.to_string(),
    }
}

pub fn start_of_day_utc(now: OffsetDateTime) -> OffsetDateTime {
    now.replace_time(time::Time::MIDNIGHT)
}

/// Whole-number share of safe scans, 0 when there are none.
pub fn safe_percentage(safe: i64, total: i64) -> u32 {
    if total <= 0 {
        return 0;
    }
    ((safe as f64 / total as f64) * 100.0).round() as u32
}

impl ScanStats {
    pub fn new(c: ScanCounts, nutrient_averages: Vec<NutrientAverage>) -> Self {
        Self {
            scans_today: c.today,
            safe_scans: c.safe,
            risky_scans: c.risky,
            total_scans: c.total,
            safe_percentage: safe_percentage(c.safe, c.total),
            nutrient_averages,
        }
    }
}

/// Averages every numeric label field over `labels`, largest first, keeping
/// the top [`NUTRIENT_AVERAGE_LIMIT`]. Fields a label leaves out do not count
/// towards that field's mean.
pub fn nutrient_averages(labels: &[NutritionData]) -> Vec<NutrientAverage> {
    let mut sums: BTreeMap<String, (f64, u32)> = BTreeMap::new();
    for label in labels {
        let Ok(Value::Object(fields)) = serde_json::to_value(label) else {
            continue;
        };
        for (name, value) in fields {
            if let Some(v) = value.as_f64() {
                let entry = sums.entry(name).or_insert((0.0, 0));
                entry.0 += v;
                entry.1 += 1;
            }
        }
    }

    let mut averages: Vec<NutrientAverage> = sums
        .into_iter()
        .map(|(name, (total, count))| NutrientAverage {
            name,
            value: (total / f64::from(count)).round() as i64,
        })
        .collect();
    averages.sort_by(|a, b| b.value.cmp(&a.value));
    averages.truncate(NUTRIENT_AVERAGE_LIMIT);
    averages
}

pub fn tally(records: &[ScanRecord]) -> VerdictCounts {
    records.iter().fold(VerdictCounts::default(), |mut acc, r| {
        match r.prediction.prediction {
            Verdict::Safe => acc.safe += 1,
            Verdict::Risky => acc.risky += 1,
        }
        acc
    })
}

/// Regenerates the user's tips from today's scans. Runs detached after a
/// save, so every failure ends here as a log line.
#[instrument(skip(state, profile))]
pub async fn generate_daily_tips(state: AppState, user_id: Uuid, profile: UserProfile) {
    let since = start_of_day_utc(OffsetDateTime::now_utc());
    let today: Vec<ScanRecord> = match repo::list_since(&state.db, user_id, since).await {
        Ok(rows) => decode_rows(rows),
        Err(e) => {
            warn!(error = %e, "loading today's scans failed");
            Vec::new()
        }
    };

    let counts = tally(&today);
    let samples: Vec<ScanSample> = today
        .iter()
        .take(TIP_SAMPLE_SIZE)
        .map(|r| ScanSample {
            food_name: food_name_or_default(r.food_name.as_deref()),
            prediction: r.prediction.clone(),
        })
        .collect();

    let generated = request_daily_tips(
        state.llm.as_ref(),
        &state.config.llm,
        &profile,
        today.len() as i64,
        counts,
        &samples,
    )
    .await;
    let source = if generated.is_some() { "model" } else { "default" };
    if generated.is_none() {
        audit::record(
            &state.db,
            NewAuditEntry::new(user_id, AuditAction::SystemWarning, "Daily tips fell back to defaults")
                .severity(AuditSeverity::Warning)
                .details(json!({ "scansToday": today.len() })),
        )
        .await;
    }
    let tips = generated.unwrap_or_else(default_daily_tips);

    if let Err(e) = update_tips(&state.db, user_id, &tips).await {
        warn!(error = %e, "saving daily tips failed");
        audit::record(
            &state.db,
            NewAuditEntry::new(user_id, AuditAction::TipGenerated, "Daily tip generation failed").failed(&e),
        )
        .await;
        return;
    }

    audit::record(
        &state.db,
        NewAuditEntry::new(user_id, AuditAction::TipGenerated, "Daily tips generated").details(json!({
            "source": source,
            "scansToday": today.len(),
            "safe": counts.safe,
            "risky": counts.risky,
        })),
    )
    .await;
    info!(source, "daily tips updated");
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn both_is_filed_as_diabetes() {
        assert_eq!(stored_condition(HealthCondition::Both), HealthCondition::Diabetes);
        assert_eq!(stored_condition(HealthCondition::Hypertension), HealthCondition::Hypertension);
    }

    #[test]
    fn blank_food_names_get_a_placeholder() {
        assert_eq!(food_name_or_default(None), "Unnamed Food");
        assert_eq!(food_name_or_default(Some("   ")), "Unnamed Food");
        assert_eq!(food_name_or_default(Some(" Oat bar ")), "Oat bar");
    }

    #[test]
    fn safe_share_is_rounded_and_zero_safe() {
        assert_eq!(safe_percentage(0, 0), 0);
        assert_eq!(safe_percentage(1, 3), 33);
        assert_eq!(safe_percentage(2, 3), 67);
        assert_eq!(safe_percentage(4, 4), 100);
    }

    #[test]
    fn day_starts_at_utc_midnight() {
        let now = datetime!(2024-03-10 17:45:12 UTC);
        assert_eq!(start_of_day_utc(now), datetime!(2024-03-10 00:00:00 UTC));
    }

    #[test]
    fn stats_come_from_counts() {
        let stats = ScanStats::new(
            ScanCounts {
                total: 10,
                today: 2,
                safe: 7,
                risky: 3,
            },
            Vec::new(),
        );
        assert_eq!(stats.safe_percentage, 70);
        assert_eq!(stats.scans_today, 2);
        let body = serde_json::to_value(&stats).unwrap();
        assert_eq!(body["nutrientAverages"], json!([]));
    }

    fn label(calories: f64, sodium: f64, added_sugars: Option<f64>) -> NutritionData {
        NutritionData {
            calories,
            carbohydrates: 20.0,
            protein: 4.0,
            fat: 3.0,
            sodium,
            fiber: 1.0,
            total_sugars: 2.0,
            added_sugars,
            saturated_fat: None,
            trans_fat: None,
            potassium: None,
            cholesterol: None,
            serving_size: Some("1 bar".into()),
            servings_per_container: None,
        }
    }

    #[test]
    fn nutrient_averages_are_rounded_sorted_and_capped() {
        let labels = [label(100.0, 300.0, Some(5.0)), label(151.0, 500.0, None)];
        let averages = nutrient_averages(&labels);

        assert_eq!(averages.len(), NUTRIENT_AVERAGE_LIMIT);
        let pairs: Vec<(&str, i64)> = averages.iter().map(|a| (a.name.as_str(), a.value)).collect();
        assert_eq!(
            pairs,
            vec![
                ("sodium", 400),
                ("calories", 126),
                ("carbohydrates", 20),
                ("addedSugars", 5),
                ("protein", 4),
                ("fat", 3),
            ]
        );
        assert!(averages.iter().all(|a| a.name != "servingSize"));
    }

    #[test]
    fn nutrient_averages_of_nothing_are_empty() {
        assert!(nutrient_averages(&[]).is_empty());
    }
}
