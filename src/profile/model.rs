use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::analysis::model::HealthCondition;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtherConditions {
    pub kidney_disease: bool,
    pub heart_disease: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DiabetesStatus {
    /// mg/dL
    #[validate(range(min = 0.0, max = 1000.0))]
    pub blood_sugar: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct BloodPressure {
    #[validate(range(min = 50.0, max = 300.0))]
    pub systolic: f64,
    #[validate(range(min = 30.0, max = 200.0))]
    pub diastolic: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HypertensionStatus {
    #[validate(nested)]
    pub blood_pressure: BloodPressure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiabetesMedication {
    None,
    Metformin,
    Sulfonylureas,
    #[serde(rename = "DPP-4 inhibitors")]
    Dpp4Inhibitors,
    #[serde(rename = "SGLT2 inhibitors")]
    Sglt2Inhibitors,
    #[serde(rename = "GLP-1 receptor agonists")]
    Glp1ReceptorAgonists,
    #[serde(rename = "Insulin - Short-acting")]
    InsulinShortActing,
    #[serde(rename = "Insulin - Long-acting")]
    InsulinLongActing,
    #[serde(rename = "Insulin - Both")]
    InsulinBoth,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HypertensionMedication {
    None,
    #[serde(rename = "ACE inhibitors")]
    AceInhibitors,
    #[serde(rename = "ARBs")]
    Arbs,
    #[serde(rename = "Beta blockers")]
    BetaBlockers,
    #[serde(rename = "Calcium channel blockers")]
    CalciumChannelBlockers,
    Diuretics,
    #[serde(rename = "Alpha blockers")]
    AlphaBlockers,
    Vasodilators,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Medications<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medications: Option<Vec<T>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentManagement {
    pub diabetes_medication: Medications<DiabetesMedication>,
    pub hypertension_medication: Medications<HypertensionMedication>,
}

impl Default for TreatmentManagement {
    fn default() -> Self {
        Self {
            diabetes_medication: Medications {
                medications: Some(Vec::new()),
            },
            hypertension_medication: Medications {
                medications: Some(Vec::new()),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BiologicalSex {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityLevel {
    Sedentary,
    #[serde(rename = "Lightly Active")]
    LightlyActive,
    Moderate,
    #[serde(rename = "Very Active")]
    VeryActive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Demographics {
    pub biological_sex: BiologicalSex,
    #[validate(range(min = 18, max = 120))]
    pub age: u32,
    #[validate(range(min = 50.0, max = 250.0))]
    pub height_cm: f64,
    #[validate(range(min = 20.0, max = 300.0))]
    pub weight_kg: f64,
    pub activity_level: ActivityLevel,
}

impl Default for Demographics {
    fn default() -> Self {
        Self {
            biological_sex: BiologicalSex::Male,
            age: 18,
            height_cm: 170.0,
            weight_kg: 70.0,
            activity_level: ActivityLevel::Sedentary,
        }
    }
}

impl Demographics {
    pub fn bmi(&self) -> Option<f64> {
        let height_m = self.height_cm / 100.0;
        (height_m > 0.0 && self.weight_kg > 0.0).then(|| self.weight_kg / (height_m * height_m))
    }
}

/// The health profile document kept on each user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[validate(length(min = 2))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    pub primary_condition: HealthCondition,
    pub other_conditions: OtherConditions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub diabetes_status: Option<DiabetesStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(nested)]
    pub hypertension_status: Option<HypertensionStatus>,
    pub treatment_management: TreatmentManagement,
    #[validate(nested)]
    pub demographics: Demographics,
}

impl UserProfile {
    /// Profile written at sign-up. Condition-specific readings are left empty
    /// so the completeness gate asks the user for them.
    pub fn initial(name: &str, email: &str, condition: Option<HealthCondition>) -> Self {
        Self {
            name: name.trim().to_string(),
            email: email.to_string(),
            primary_condition: condition.unwrap_or(HealthCondition::Diabetes),
            other_conditions: OtherConditions::default(),
            diabetes_status: None,
            hypertension_status: None,
            treatment_management: TreatmentManagement::default(),
            demographics: Demographics::default(),
        }
    }

    pub fn diabetes_medications(&self) -> &[DiabetesMedication] {
        self.treatment_management
            .diabetes_medication
            .medications
            .as_deref()
            .unwrap_or_default()
    }

    pub fn hypertension_medications(&self) -> &[HypertensionMedication] {
        self.treatment_management
            .hypertension_medication
            .medications
            .as_deref()
            .unwrap_or_default()
    }
}

/// Display name of a serde-renamed enum value.
pub fn display_label<T: Serialize>(med: &T) -> String {
    serde_json::to_value(med)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profile_round_trips_with_camel_case_keys() {
        let doc = json!({
            "name": "Ada Lovelace",
            "email": "ada@example.com",
            "primaryCondition": "both",
            "otherConditions": { "kidneyDisease": false, "heartDisease": true },
            "diabetesStatus": { "bloodSugar": 110.0 },
            "hypertensionStatus": { "bloodPressure": { "systolic": 135.0, "diastolic": 85.0 } },
            "treatmentManagement": {
                "diabetesMedication": { "medications": ["Metformin", "GLP-1 receptor agonists"] },
                "hypertensionMedication": { "medications": ["ACE inhibitors"] }
            },
            "demographics": {
                "biologicalSex": "Female", "age": 36, "heightCm": 165.0,
                "weightKg": 60.5, "activityLevel": "Lightly Active"
            }
        });
        let profile: UserProfile = serde_json::from_value(doc.clone()).unwrap();
        assert!(profile.validate().is_ok());
        assert_eq!(
            profile.diabetes_medications(),
            &[DiabetesMedication::Metformin, DiabetesMedication::Glp1ReceptorAgonists]
        );
        assert_eq!(serde_json::to_value(&profile).unwrap(), doc);
    }

    #[test]
    fn initial_profile_has_no_condition_readings() {
        let p = UserProfile::initial("  Kyle Test ", "kyle@example.com", None);
        assert_eq!(p.name, "Kyle Test");
        assert_eq!(p.primary_condition, HealthCondition::Diabetes);
        assert!(p.diabetes_status.is_none());
        assert!(p.hypertension_status.is_none());
        assert_eq!(p.demographics, Demographics::default());
        assert!(p.validate().is_ok());
    }

    #[test]
    fn bmi_uses_metres() {
        let d = Demographics {
            height_cm: 200.0,
            weight_kg: 80.0,
            ..Demographics::default()
        };
        assert_eq!(d.bmi(), Some(20.0));
    }

    #[test]
    fn display_labels_use_display_names() {
        assert_eq!(display_label(&HypertensionMedication::BetaBlockers), "Beta blockers");
        assert_eq!(display_label(&DiabetesMedication::InsulinBoth), "Insulin - Both");
    }

    #[test]
    fn out_of_range_blood_pressure_is_rejected() {
        let mut p = UserProfile::initial("Bob", "bob@example.com", Some(HealthCondition::Hypertension));
        p.hypertension_status = Some(HypertensionStatus {
            blood_pressure: BloodPressure {
                systolic: 20.0,
                diastolic: 80.0,
            },
        });
        assert!(p.validate().is_err());
    }
}
