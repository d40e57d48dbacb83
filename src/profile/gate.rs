//! Completeness check run before any analysis.

use serde_json::Value;
use validator::Validate;

use super::model::UserProfile;
use crate::{error::field_paths, error::AppError};

const REQUIRED_KEYS: &[&str] = &[
    "name",
    "email",
    "primaryCondition",
    "otherConditions",
    "treatmentManagement",
    "demographics",
];

/// Parses and validates a stored profile document. On failure returns the
/// list of fields the user still has to fill in.
pub fn check_profile(doc: &Value) -> Result<UserProfile, Vec<String>> {
    let Some(obj) = doc.as_object() else {
        return Err(vec!["profile".into()]);
    };

    let missing: Vec<String> = REQUIRED_KEYS
        .iter()
        .filter(|k| obj.get(**k).map_or(true, Value::is_null))
        .map(|k| k.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(missing);
    }

    let profile: UserProfile = serde_json::from_value(doc.clone()).map_err(|e| vec![e.to_string()])?;

    let mut problems = match profile.validate() {
        Ok(()) => Vec::new(),
        Err(errs) => field_paths(&errs),
    };
    if profile.primary_condition.includes_diabetes() && profile.diabetes_status.is_none() {
        problems.push("diabetesStatus".into());
    }
    if profile.primary_condition.includes_hypertension() && profile.hypertension_status.is_none() {
        problems.push("hypertensionStatus".into());
    }

    if problems.is_empty() {
        Ok(profile)
    } else {
        Err(problems)
    }
}

/// Gate used by the analyze path.
pub fn require_complete(doc: &Value) -> Result<UserProfile, AppError> {
    check_profile(doc).map_err(|missing| AppError::ProfileIncomplete { missing })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::model::HealthCondition;
    use crate::profile::model::{BloodPressure, HypertensionStatus};
    use serde_json::json;

    fn stored(profile: &UserProfile) -> Value {
        serde_json::to_value(profile).unwrap()
    }

    #[test]
    fn fresh_hypertension_signup_is_incomplete() {
        let p = UserProfile::initial("Nina", "nina@example.com", Some(HealthCondition::Hypertension));
        let missing = check_profile(&stored(&p)).unwrap_err();
        assert_eq!(missing, vec!["hypertensionStatus"]);
    }

    #[test]
    fn both_requires_both_readings() {
        let mut p = UserProfile::initial("Nina", "nina@example.com", Some(HealthCondition::Both));
        p.hypertension_status = Some(HypertensionStatus {
            blood_pressure: BloodPressure {
                systolic: 128.0,
                diastolic: 82.0,
            },
        });
        assert_eq!(check_profile(&stored(&p)).unwrap_err(), vec!["diabetesStatus"]);
    }

    #[test]
    fn complete_profile_passes() {
        let mut p = UserProfile::initial("Nina", "nina@example.com", Some(HealthCondition::Hypertension));
        p.hypertension_status = Some(HypertensionStatus {
            blood_pressure: BloodPressure {
                systolic: 128.0,
                diastolic: 82.0,
            },
        });
        let parsed = check_profile(&stored(&p)).unwrap();
        assert_eq!(parsed, p);
    }

    #[test]
    fn missing_sections_are_listed() {
        let missing = check_profile(&json!({ "name": "Al", "email": "al@example.com" })).unwrap_err();
        assert_eq!(
            missing,
            vec!["primaryCondition", "otherConditions", "treatmentManagement", "demographics"]
        );
        assert_eq!(check_profile(&json!({})).unwrap_err().len(), REQUIRED_KEYS.len());
        assert_eq!(check_profile(&Value::Null).unwrap_err(), vec!["profile"]);
    }

    #[test]
    fn invalid_values_block_analysis() {
        let mut p = UserProfile::initial("N", "not-an-email", Some(HealthCondition::Diabetes));
        p.diabetes_status = None;
        let err = require_complete(&stored(&p)).unwrap_err();
        match err {
            AppError::ProfileIncomplete { missing } => {
                assert!(missing.contains(&"diabetesStatus".to_string()));
                assert!(missing.len() >= 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
