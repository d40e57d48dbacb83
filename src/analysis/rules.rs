//! Threshold rules for the deterministic Safe/Risky decision.
//!
//! This table is the only place nutrient limits live. The fallback evaluator
//! runs it directly and the model prompt prints the same limits, so the two
//! paths always judge against identical numbers.

use super::model::{HealthCondition, HealthPrediction, HealthTip, NutritionData, Verdict};

/// Sodium at or above 20% of the daily value for one serving.
pub const SODIUM_PER_SERVING_MG: f64 = 460.0;
pub const MEAL_CARBS_G: f64 = 60.0;
pub const SNACK_CARBS_G: f64 = 30.0;
pub const ADDED_SUGARS_G: f64 = 10.0;
pub const SATURATED_FAT_PCT: f64 = 10.0;
/// One third of the 1500 mg daily ceiling recommended with hypertension.
pub const HYPERTENSION_MEAL_SODIUM_MG: f64 = 1500.0 / 3.0;

const KCAL_PER_G_FAT: f64 = 9.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Any,
    Diabetes,
    Hypertension,
}

impl Scope {
    fn covers(&self, condition: HealthCondition) -> bool {
        match self {
            Scope::Any => true,
            Scope::Diabetes => condition.includes_diabetes(),
            Scope::Hypertension => condition.includes_hypertension(),
        }
    }
}

pub struct Rule {
    pub name: &'static str,
    /// Human-readable limit, printed into the model prompt.
    pub limit: &'static str,
    pub scope: Scope,
    check: fn(&NutritionData) -> Option<String>,
}

impl Rule {
    pub fn applies_to(&self, condition: HealthCondition) -> bool {
        self.scope.covers(condition)
    }

    pub fn check(&self, nutrition: &NutritionData) -> Option<String> {
        (self.check)(nutrition)
    }
}

pub static RULES: &[Rule] = &[
    Rule {
        name: "sodium_per_serving",
        limit: "sodium at or above 460 mg per serving (20% DV)",
        scope: Scope::Any,
        check: sodium_per_serving,
    },
    Rule {
        name: "meal_carbohydrates",
        limit: "carbohydrates above 60 g per meal",
        scope: Scope::Diabetes,
        check: meal_carbohydrates,
    },
    Rule {
        name: "snack_carbohydrates",
        limit: "carbohydrates above 30 g for a snack-sized serving",
        scope: Scope::Diabetes,
        check: snack_carbohydrates,
    },
    Rule {
        name: "added_sugars",
        limit: "added sugars above 10 g per serving",
        scope: Scope::Any,
        check: added_sugars,
    },
    Rule {
        name: "saturated_fat_share",
        limit: "saturated fat above 10% of calories",
        scope: Scope::Any,
        check: saturated_fat_share,
    },
    Rule {
        name: "hypertension_meal_sodium",
        limit: "sodium above 500 mg per meal (one third of 1500 mg daily)",
        scope: Scope::Hypertension,
        check: hypertension_meal_sodium,
    },
];

pub fn rules_for(condition: HealthCondition) -> impl Iterator<Item = &'static Rule> {
    RULES.iter().filter(move |r| r.applies_to(condition))
}

fn sodium_per_serving(n: &NutritionData) -> Option<String> {
    (n.sodium >= SODIUM_PER_SERVING_MG).then(|| {
        format!(
            "High sodium content ({}mg) exceeds 20% DV per serving",
            n.sodium
        )
    })
}

fn meal_carbohydrates(n: &NutritionData) -> Option<String> {
    (n.carbohydrates > MEAL_CARBS_G).then(|| {
        format!(
            "Carbohydrate content ({}g) exceeds recommended meal range of 30-60g",
            n.carbohydrates
        )
    })
}

fn snack_carbohydrates(n: &NutritionData) -> Option<String> {
    let is_snack = n
        .serving_size
        .as_deref()
        .is_some_and(|s| s.to_lowercase().contains("snack"));
    // The meal rule already covers anything above 60 g.
    (is_snack && n.carbohydrates > SNACK_CARBS_G && n.carbohydrates <= MEAL_CARBS_G).then(|| {
        format!(
            "Carbohydrate content ({}g) exceeds recommended snack range of 15-30g",
            n.carbohydrates
        )
    })
}

fn added_sugars(n: &NutritionData) -> Option<String> {
    let sugars = n.added_sugars?;
    (sugars > ADDED_SUGARS_G).then(|| {
        format!("High added sugars ({sugars}g) exceeds 10g per serving threshold")
    })
}

fn saturated_fat_share(n: &NutritionData) -> Option<String> {
    if n.calories <= 0.0 {
        return None;
    }
    let sat = n.saturated_fat.filter(|g| *g > 0.0)?;
    let pct = sat * KCAL_PER_G_FAT / n.calories * 100.0;
    (pct > SATURATED_FAT_PCT).then(|| format!("Saturated fat ({sat}g) exceeds 10% of calories"))
}

fn hypertension_meal_sodium(n: &NutritionData) -> Option<String> {
    (n.sodium > HYPERTENSION_MEAL_SODIUM_MG).then(|| {
        format!(
            "Sodium content ({}mg) exceeds recommended per-meal limit for hypertension",
            n.sodium
        )
    })
}

/// Deterministic Safe/Risky decision used whenever the model path fails.
pub fn evaluate(nutrition: &NutritionData, condition: HealthCondition) -> HealthPrediction {
    let mut reasons: Vec<String> = rules_for(condition)
        .filter_map(|rule| rule.check(nutrition))
        .collect();
    let is_risky = !reasons.is_empty();

    if let Some(potassium) = nutrition.potassium.filter(|k| *k > 0.0) {
        reasons.push(format!(
            "Contains {potassium}mg potassium (beneficial for blood pressure control if no kidney issues)"
        ));
    }

    if is_risky {
        return HealthPrediction {
            prediction: Verdict::Risky,
            reasoning: reasons.join(". "),
            health_tip: vec![
                HealthTip::new("Choose lower-sodium alternatives when available."),
                // Only a plain diabetes profile gets the carbohydrate tip.
                HealthTip::new(if condition == HealthCondition::Diabetes {
                    "Monitor total carbohydrates carefully."
                } else {
                    "Watch portion sizes."
                }),
                HealthTip::new("Consider splitting portions for better nutrient management."),
                HealthTip::new("Balance with fiber-rich vegetables when possible."),
                HealthTip::new("Track daily totals of key nutrients (sodium, carbs, sugars)."),
            ],
        };
    }

    let notes = if reasons.is_empty() {
        "all nutrient levels acceptable".to_string()
    } else {
        reasons.join(". ")
    };
    HealthPrediction {
        prediction: Verdict::Safe,
        reasoning: format!("Within recommended limits: {notes}"),
        health_tip: vec![
            HealthTip::new("Continue monitoring portion sizes."),
            HealthTip::new("Maintain balanced nutrient intake across meals."),
            HealthTip::new("Include variety in your diet for complete nutrition."),
            HealthTip::new("Stay hydrated throughout the day."),
            HealthTip::new("Regular physical activity supports healthy metabolism."),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::model::TIP_COUNT;

    fn label() -> NutritionData {
        NutritionData {
            calories: 200.0,
            carbohydrates: 20.0,
            protein: 5.0,
            fat: 4.0,
            sodium: 100.0,
            fiber: 3.0,
            total_sugars: 4.0,
            added_sugars: None,
            saturated_fat: None,
            trans_fat: None,
            potassium: None,
            cholesterol: None,
            serving_size: None,
            servings_per_container: None,
        }
    }

    #[test]
    fn sodium_at_threshold_is_risky_for_every_condition() {
        for condition in [
            HealthCondition::Diabetes,
            HealthCondition::Hypertension,
            HealthCondition::Both,
        ] {
            for sodium in [460.0, 461.0, 2300.0, 10_000.0] {
                let mut n = label();
                n.sodium = sodium;
                let p = evaluate(&n, condition);
                assert_eq!(p.prediction, Verdict::Risky, "{condition:?} {sodium}");
                assert!(p.reasoning.contains(&format!("High sodium content ({sodium}mg)")));
            }
        }
    }

    #[test]
    fn zero_calories_skips_saturated_fat_rule() {
        let mut n = label();
        n.calories = 0.0;
        n.saturated_fat = Some(50.0);
        let p = evaluate(&n, HealthCondition::Diabetes);
        assert_eq!(p.prediction, Verdict::Safe);
        assert!(!p.reasoning.contains("Saturated fat"));
    }

    #[test]
    fn saturated_fat_share_over_ten_percent_is_risky() {
        let mut n = label();
        n.calories = 100.0;
        n.saturated_fat = Some(2.0); // 18 kcal = 18%
        let p = evaluate(&n, HealthCondition::Hypertension);
        assert_eq!(p.prediction, Verdict::Risky);
        assert!(p.reasoning.contains("Saturated fat (2g) exceeds 10% of calories"));
    }

    #[test]
    fn diabetes_carbohydrate_boundary() {
        let mut n = label();
        n.carbohydrates = 61.0;
        assert_eq!(evaluate(&n, HealthCondition::Diabetes).prediction, Verdict::Risky);

        n.carbohydrates = 60.0;
        let p = evaluate(&n, HealthCondition::Diabetes);
        assert_eq!(p.prediction, Verdict::Safe);
        assert_eq!(p.reasoning, "Within recommended limits: all nutrient levels acceptable");
    }

    #[test]
    fn carbohydrates_do_not_matter_for_hypertension_only() {
        let mut n = label();
        n.carbohydrates = 90.0;
        assert_eq!(evaluate(&n, HealthCondition::Hypertension).prediction, Verdict::Safe);
    }

    #[test]
    fn snack_serving_uses_lower_carbohydrate_limit() {
        let mut n = label();
        n.carbohydrates = 35.0;
        n.serving_size = Some("1 Snack Bar (40g)".into());
        let p = evaluate(&n, HealthCondition::Both);
        assert_eq!(p.prediction, Verdict::Risky);
        assert!(p.reasoning.contains("snack range of 15-30g"));
    }

    #[test]
    fn meal_and_snack_rules_never_both_fire() {
        let mut n = label();
        n.carbohydrates = 80.0;
        n.serving_size = Some("snack".into());
        let p = evaluate(&n, HealthCondition::Diabetes);
        assert!(p.reasoning.contains("meal range"));
        assert!(!p.reasoning.contains("snack range"));
    }

    #[test]
    fn hypertension_has_per_meal_sodium_ceiling() {
        let mut n = label();
        n.sodium = 455.0;
        assert_eq!(evaluate(&n, HealthCondition::Hypertension).prediction, Verdict::Safe);
        assert_eq!(evaluate(&n, HealthCondition::Diabetes).prediction, Verdict::Safe);

        n.sodium = 520.0;
        let p = evaluate(&n, HealthCondition::Hypertension);
        assert!(p.reasoning.contains("per-meal limit for hypertension"));
        let p = evaluate(&n, HealthCondition::Diabetes);
        assert!(!p.reasoning.contains("per-meal limit for hypertension"));
    }

    #[test]
    fn potassium_is_noted_but_never_decisive() {
        let mut n = label();
        n.potassium = Some(400.0);
        let p = evaluate(&n, HealthCondition::Hypertension);
        assert_eq!(p.prediction, Verdict::Safe);
        assert!(p.reasoning.starts_with("Within recommended limits: Contains 400mg potassium"));
    }

    #[test]
    fn tips_are_fixed_length_and_condition_aware() {
        let mut n = label();
        n.added_sugars = Some(12.0);
        let diabetic = evaluate(&n, HealthCondition::Diabetes);
        let hyper = evaluate(&n, HealthCondition::Hypertension);
        assert_eq!(diabetic.health_tip.len(), TIP_COUNT);
        assert_eq!(diabetic.health_tip[1].content, "Monitor total carbohydrates carefully.");
        assert_eq!(hyper.health_tip[1].content, "Watch portion sizes.");
        let both = evaluate(&n, HealthCondition::Both);
        assert_eq!(both.health_tip[1].content, "Watch portion sizes.");
        assert!(evaluate(&label(), HealthCondition::Both).validate_shape().is_ok());
    }

    #[test]
    fn reasons_are_joined_in_table_order() {
        let mut n = label();
        n.sodium = 600.0;
        n.added_sugars = Some(15.0);
        let p = evaluate(&n, HealthCondition::Hypertension);
        let sodium_at = p.reasoning.find("High sodium").unwrap();
        let sugar_at = p.reasoning.find("High added sugars").unwrap();
        let meal_at = p.reasoning.find("per-meal limit").unwrap();
        assert!(sodium_at < sugar_at && sugar_at < meal_at);
    }

    #[test]
    fn rules_for_filters_by_condition() {
        let names: Vec<_> = rules_for(HealthCondition::Hypertension).map(|r| r.name).collect();
        assert!(names.contains(&"hypertension_meal_sodium"));
        assert!(!names.contains(&"meal_carbohydrates"));
        assert_eq!(rules_for(HealthCondition::Both).count(), RULES.len());
    }
}
