use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use super::client::{ChatMessage, GenerateRequest, LlmClient};
use super::model::{AnalyzeFoodRequest, HealthPrediction, HealthTip, TIP_COUNT};
use super::prompt::{build_prompt, build_tips_prompt, ScanSample, VerdictCounts, SYSTEM_PROMPT};
use super::response::{parse_prediction, parse_tips, payload_text};
use super::rules;
use crate::config::LlmConfig;
use crate::error::AppError;
use crate::profile::{gate::require_complete, model::UserProfile};

fn analysis_request(settings: &LlmConfig, request: &AnalyzeFoodRequest, profile: &UserProfile) -> GenerateRequest {
    let prompt = build_prompt(request, profile);
    let profile_json = serde_json::to_value(profile).unwrap_or(Value::Null);
    GenerateRequest {
        model: settings.model.clone(),
        prompt: prompt.clone(),
        metadata: json!({ "userProfile": profile_json }),
        messages: vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(prompt),
            ChatMessage::user(format!("USER_PROFILE_JSON: {profile_json}")),
        ],
        stream: false,
    }
}

/// Judges one label for one user. Never fails: transport errors, error
/// statuses, timeouts and non-JSON bodies all fall back to the rule table.
#[instrument(skip_all, fields(condition = request.condition.as_str()))]
pub async fn analyze_food(
    llm: &dyn LlmClient,
    settings: &LlmConfig,
    request: &AnalyzeFoodRequest,
    profile: &UserProfile,
) -> HealthPrediction {
    let body = analysis_request(settings, request, profile);
    let fallback = || rules::evaluate(&request.nutrition, request.condition);

    let raw = match tokio::time::timeout(settings.timeout, llm.generate(&body, settings.timeout)).await {
        Ok(Ok(raw)) => raw,
        Ok(Err(e)) => {
            warn!(error = %e, "model call failed; using rule evaluator");
            return fallback();
        }
        Err(_) => {
            warn!(timeout_ms = settings.timeout.as_millis() as u64, "model call timed out; using rule evaluator");
            return fallback();
        }
    };

    match serde_json::from_str::<Value>(&raw) {
        Ok(envelope) => {
            let output = payload_text(&envelope).unwrap_or_default();
            debug!(chars = output.len(), "model output received");
            parse_prediction(&output)
        }
        Err(e) => {
            warn!(error = %e, "model body is not JSON; using rule evaluator");
            fallback()
        }
    }
}

/// Runs the completeness gate on the stored profile document, then analyzes.
/// The model is never contacted for an incomplete profile.
pub async fn analyze_for_profile(
    llm: &dyn LlmClient,
    settings: &LlmConfig,
    request: &AnalyzeFoodRequest,
    profile_doc: &Value,
) -> Result<HealthPrediction, AppError> {
    let profile = require_complete(profile_doc)?;
    Ok(analyze_food(llm, settings, request, &profile).await)
}

/// Asks the model for five personalised tips. `None` means the caller should
/// fall back to the default daily tips.
#[instrument(skip_all, fields(scans_today = scans_today))]
pub async fn request_daily_tips(
    llm: &dyn LlmClient,
    settings: &LlmConfig,
    profile: &UserProfile,
    scans_today: i64,
    counts: VerdictCounts,
    samples: &[ScanSample],
) -> Option<Vec<HealthTip>> {
    let prompt = build_tips_prompt(profile, scans_today, counts, samples);
    let body = GenerateRequest {
        model: settings.model.clone(),
        prompt: prompt.clone(),
        metadata: json!({
            "counts": { "safe": counts.safe, "risky": counts.risky },
            "todaysScansLength": scans_today,
        }),
        messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)],
        stream: false,
    };

    let raw = match tokio::time::timeout(settings.tips_timeout, llm.generate(&body, settings.tips_timeout)).await {
        Ok(Ok(raw)) => raw,
        Ok(Err(e)) => {
            warn!(error = %e, "daily tips request failed");
            return None;
        }
        Err(_) => {
            warn!("daily tips request timed out");
            return None;
        }
    };

    match parse_tips(&raw) {
        Some(tips) if tips.len() == TIP_COUNT => Some(tips),
        other => {
            warn!(got = other.map_or(0, |t| t.len()), "model did not return 5 tips");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::model::{HealthCondition, NutritionData, Verdict};
    use crate::profile::model::{BloodPressure, HypertensionStatus};
    use axum::async_trait;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };
    use std::time::Duration;

    enum Reply {
        Body(String),
        Fail,
        Hang,
    }

    struct FakeLlm {
        reply: Reply,
        calls: AtomicUsize,
        last: Mutex<Option<GenerateRequest>>,
    }

    impl FakeLlm {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl LlmClient for FakeLlm {
        async fn generate(&self, request: &GenerateRequest, _timeout: Duration) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(request.clone());
            match &self.reply {
                Reply::Body(body) => Ok(body.clone()),
                Reply::Fail => anyhow::bail!("connection refused"),
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(String::new())
                }
            }
        }
    }

    fn settings(timeout: Duration) -> LlmConfig {
        LlmConfig {
            timeout,
            tips_timeout: timeout,
            ..LlmConfig::default()
        }
    }

    fn salty_soup() -> AnalyzeFoodRequest {
        AnalyzeFoodRequest {
            nutrition: NutritionData {
                calories: 180.0,
                carbohydrates: 22.0,
                protein: 6.0,
                fat: 5.0,
                sodium: 890.0,
                fiber: 2.0,
                total_sugars: 3.0,
                added_sugars: None,
                saturated_fat: None,
                trans_fat: None,
                potassium: None,
                cholesterol: None,
                serving_size: Some("1 cup".into()),
                servings_per_container: Some(2.0),
            },
            condition: HealthCondition::Hypertension,
            food_name: Some("Tomato soup".into()),
        }
    }

    fn complete_profile() -> UserProfile {
        let mut p = UserProfile::initial("Mara", "mara@example.com", Some(HealthCondition::Hypertension));
        p.hypertension_status = Some(HypertensionStatus {
            blood_pressure: BloodPressure {
                systolic: 138.0,
                diastolic: 88.0,
            },
        });
        p
    }

    #[tokio::test]
    async fn model_verdict_is_used_when_parsable() {
        let body = json!({
            "response": "```json\n{\"prediction\":\"Safe\",\"reasoning\":\"fine in moderation\"}\n```"
        })
        .to_string();
        let llm = FakeLlm::new(Reply::Body(body));
        let p = analyze_food(llm.as_ref(), &settings(Duration::from_secs(1)), &salty_soup(), &complete_profile()).await;
        assert_eq!(p.prediction, Verdict::Safe);
        assert_eq!(p.reasoning, "fine in moderation");
        assert_eq!(p.health_tip.len(), TIP_COUNT);

        let sent = llm.last.lock().unwrap().clone().unwrap();
        assert_eq!(sent.messages.len(), 3);
        assert_eq!(sent.messages[0].role, "system");
        assert!(sent.messages[2].content.starts_with("USER_PROFILE_JSON: "));
        assert_eq!(sent.metadata["userProfile"]["name"], "Mara");
        assert!(!sent.stream);
    }

    #[tokio::test]
    async fn transport_failure_uses_rule_evaluator() {
        let llm = FakeLlm::new(Reply::Fail);
        let request = salty_soup();
        let p = analyze_food(llm.as_ref(), &settings(Duration::from_secs(1)), &request, &complete_profile()).await;
        assert_eq!(p, rules::evaluate(&request.nutrition, request.condition));
        assert_eq!(p.prediction, Verdict::Risky);
    }

    #[tokio::test]
    async fn non_json_body_uses_rule_evaluator() {
        let llm = FakeLlm::new(Reply::Body("<html>bad gateway</html>".into()));
        let p = analyze_food(llm.as_ref(), &settings(Duration::from_secs(1)), &salty_soup(), &complete_profile()).await;
        assert!(p.reasoning.contains("High sodium content (890mg)"));
    }

    #[tokio::test]
    async fn timed_out_model_still_yields_valid_prediction() {
        let llm = FakeLlm::new(Reply::Hang);
        let started = tokio::time::Instant::now();
        let p = analyze_food(llm.as_ref(), &settings(Duration::from_millis(50)), &salty_soup(), &complete_profile()).await;
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(p.validate_shape().is_ok());
        assert_eq!(p.prediction, Verdict::Risky);
    }

    #[tokio::test]
    async fn incomplete_profile_never_reaches_the_model() {
        let llm = FakeLlm::new(Reply::Body("{}".into()));
        let no_bp = UserProfile::initial("Mara", "mara@example.com", Some(HealthCondition::Hypertension));
        let doc = serde_json::to_value(&no_bp).unwrap();

        let err = analyze_for_profile(llm.as_ref(), &settings(Duration::from_secs(1)), &salty_soup(), &doc)
            .await
            .unwrap_err();
        match err {
            AppError::ProfileIncomplete { missing } => assert_eq!(missing, vec!["hypertensionStatus"]),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn daily_tips_need_exactly_five() {
        let five = json!({
            "response": "[{\"content\":\"a\"},{\"content\":\"b\"},{\"content\":\"c\"},{\"content\":\"d\"},{\"content\":\"e\"}]"
        })
        .to_string();
        let llm = FakeLlm::new(Reply::Body(five));
        let tips = request_daily_tips(
            llm.as_ref(),
            &settings(Duration::from_secs(1)),
            &complete_profile(),
            2,
            VerdictCounts { safe: 1, risky: 1 },
            &[],
        )
        .await
        .unwrap();
        assert_eq!(tips[0].content, "a");

        let two = FakeLlm::new(Reply::Body("[\"only\", \"two\"]".into()));
        let none = request_daily_tips(
            two.as_ref(),
            &settings(Duration::from_secs(1)),
            &complete_profile(),
            0,
            VerdictCounts::default(),
            &[],
        )
        .await;
        assert!(none.is_none());

        let sent = two.last.lock().unwrap().clone().unwrap();
        assert_eq!(sent.metadata["todaysScansLength"], 0);
    }
}
