use serde::{Deserialize, Serialize};
use validator::Validate;

/// Every stored prediction carries exactly this many tips.
pub const TIP_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthCondition {
    Diabetes,
    Hypertension,
    Both,
}

impl HealthCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthCondition::Diabetes => "diabetes",
            HealthCondition::Hypertension => "hypertension",
            HealthCondition::Both => "both",
        }
    }

    pub fn includes_diabetes(&self) -> bool {
        matches!(self, HealthCondition::Diabetes | HealthCondition::Both)
    }

    pub fn includes_hypertension(&self) -> bool {
        matches!(self, HealthCondition::Hypertension | HealthCondition::Both)
    }
}

impl std::str::FromStr for HealthCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "diabetes" => Ok(HealthCondition::Diabetes),
            "hypertension" => Ok(HealthCondition::Hypertension),
            "both" => Ok(HealthCondition::Both),
            other => Err(format!("unknown condition: {other}")),
        }
    }
}

/// Values copied off a nutrition facts label. Mass in grams, sodium,
/// potassium and cholesterol in milligrams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NutritionData {
    #[validate(range(min = 0.0, max = 5000.0))]
    pub calories: f64,
    #[validate(range(min = 0.0, max = 500.0))]
    pub carbohydrates: f64,
    #[validate(range(min = 0.0, max = 200.0))]
    pub protein: f64,
    #[validate(range(min = 0.0, max = 200.0))]
    pub fat: f64,
    #[validate(range(min = 0.0, max = 10000.0))]
    pub sodium: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub fiber: f64,
    #[validate(range(min = 0.0, max = 500.0))]
    pub total_sugars: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 500.0))]
    pub added_sugars: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 200.0))]
    pub saturated_fat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 50.0))]
    pub trans_fat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 20000.0))]
    pub potassium: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 2000.0))]
    pub cholesterol: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serving_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0))]
    pub servings_per_container: Option<f64>,
}

/// Body of an analyze call: the label values plus what to judge them against.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeFoodRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub nutrition: NutritionData,
    pub condition: HealthCondition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food_name: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Verdict {
    Safe,
    Risky,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Safe => "Safe",
            Verdict::Risky => "Risky",
        }
    }

    pub fn is_risky(&self) -> bool {
        matches!(self, Verdict::Risky)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthTip {
    pub content: String,
}

impl HealthTip {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthPrediction {
    pub prediction: Verdict,
    pub reasoning: String,
    pub health_tip: Vec<HealthTip>,
}

impl HealthPrediction {
    /// Checks the shape every persisted prediction must have.
    pub fn validate_shape(&self) -> Result<(), String> {
        if self.health_tip.len() != TIP_COUNT {
            return Err(format!(
                "healthTip must contain exactly {TIP_COUNT} entries, got {}",
                self.health_tip.len()
            ));
        }
        if self.health_tip.iter().any(|t| t.content.trim().is_empty()) {
            return Err("healthTip entries must not be empty".into());
        }
        Ok(())
    }
}

fn tips(items: [&str; TIP_COUNT]) -> Vec<HealthTip> {
    items.into_iter().map(HealthTip::new).collect()
}

/// Canned tips attached when model output had to be guessed or lacked tips.
pub fn default_health_tips(risky: bool) -> Vec<HealthTip> {
    if risky {
        tips([
            "Choose lower-sodium or lower-sugar alternatives.",
            "Avoid processed foods with hidden sodium.",
            "Stay hydrated to help regulate blood pressure.",
            "Pair carbs with protein or fiber to slow absorption.",
            "Monitor portion sizes for better control.",
        ])
    } else {
        tips([
            "Maintain balanced meals across the day.",
            "Stay consistent with meal timing.",
            "Include vegetables for fiber and nutrients.",
            "Keep salt and sugar within daily limits.",
            "Stay hydrated and active regularly.",
        ])
    }
}

/// Tips written on sign-up and whenever daily tip generation falls through.
pub fn default_daily_tips() -> Vec<HealthTip> {
    tips([
        "Choose lower-sodium options when possible.",
        "Prefer whole foods and add vegetables to meals.",
        "Watch portion sizes and consider splitting large portions.",
        "Limit added sugars and sugary drinks.",
        "Balance carbs with protein and fiber to slow absorption.",
    ])
}

/// Truncates or pads `tips` to exactly [`TIP_COUNT`] using `fallback`.
pub fn normalize_tips(mut tips: Vec<HealthTip>, fallback: Vec<HealthTip>) -> Vec<HealthTip> {
    tips.retain(|t| !t.content.trim().is_empty());
    tips.truncate(TIP_COUNT);
    for tip in fallback {
        if tips.len() == TIP_COUNT {
            break;
        }
        if !tips.contains(&tip) {
            tips.push(tip);
        }
    }
    tips
}
