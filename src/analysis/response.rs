use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::extract::{extract_json, parse_lenient, Strategy};
use super::model::{
    default_health_tips, normalize_tips, HealthPrediction, HealthTip, Verdict, TIP_COUNT,
};

lazy_static! {
    static ref RISKY_WORDS_RE: Regex =
        Regex::new(r"(?i)risky|not recommended|avoid|high sodium|high sugar|high carbohydrate")
            .unwrap();
}

/// Locates the generated text inside an endpoint response body. Keys are
/// tried in the order different backends (Ollama, OpenAI-style, ...) use them.
pub fn payload_text(body: &Value) -> Option<String> {
    let candidates = [
        body.get("response"),
        body.get("text"),
        body.pointer("/output/0/content"),
        body.pointer("/result/content"),
        body.pointer("/choices/0/message/content"),
        body.pointer("/choices/0/text"),
        Some(body),
    ];
    candidates
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .find(|s| !s.is_empty())
        .map(str::to_owned)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPrediction {
    prediction: Verdict,
    reasoning: String,
    #[serde(default)]
    health_tip: Option<Vec<HealthTip>>,
}

fn validate_prediction(value: Value) -> Result<HealthPrediction, serde_json::Error> {
    let raw: RawPrediction = serde_json::from_value(value)?;
    let defaults = default_health_tips(raw.prediction.is_risky());
    let health_tip = match raw.health_tip {
        Some(tips) => normalize_tips(tips, defaults),
        None => defaults,
    };
    Ok(HealthPrediction {
        prediction: raw.prediction,
        reasoning: raw.reasoning,
        health_tip,
    })
}

/// Guesses a verdict from wording alone.
pub fn keyword_fallback(output: &str) -> HealthPrediction {
    let risky = RISKY_WORDS_RE.is_match(output);
    let trimmed = output.trim();
    let reasoning = if trimmed.is_empty() {
        "The analysis service returned no explanation.".to_string()
    } else {
        trimmed.to_string()
    };
    HealthPrediction {
        prediction: if risky { Verdict::Risky } else { Verdict::Safe },
        reasoning,
        health_tip: default_health_tips(risky),
    }
}

/// Turns model text into a prediction. Never fails: anything that does not
/// extract and validate goes through [`keyword_fallback`].
pub fn parse_prediction(output: &str) -> HealthPrediction {
    let Some((strategy, value)) = extract_json(output) else {
        warn!("no JSON found in model output; using keyword fallback");
        return keyword_fallback(output);
    };
    match validate_prediction(value) {
        Ok(prediction) => {
            debug!(strategy = strategy.name(), verdict = prediction.prediction.as_str(), "model output parsed");
            prediction
        }
        Err(e) => {
            warn!(error = %e, strategy = strategy.name(), "model output failed validation; using keyword fallback");
            keyword_fallback(output)
        }
    }
}

fn tips_from_array(value: &Value) -> Option<Vec<HealthTip>> {
    let items = value.as_array()?;
    let tips: Vec<HealthTip> = items
        .iter()
        .map(|item| match item {
            Value::String(s) => HealthTip::new(s.clone()),
            other => match other.get("content").and_then(Value::as_str) {
                Some(content) => HealthTip::new(content),
                None => HealthTip::new(other.to_string()),
            },
        })
        .take(TIP_COUNT)
        .collect();
    Some(tips)
}

fn tips_from_text(text: &str) -> Option<Vec<HealthTip>> {
    let trimmed = text.trim();
    if trimmed.starts_with('[') {
        if let Some(tips) = parse_lenient(trimmed).as_ref().and_then(tips_from_array) {
            return Some(tips);
        }
    }
    [Strategy::FencedBlock, Strategy::FirstArray]
        .iter()
        .filter_map(|s| s.extract(text))
        .filter_map(parse_lenient)
        .find_map(|v| tips_from_array(&v))
}

/// Extracts up to [`TIP_COUNT`] tips from a raw daily-tips response body,
/// which may be an endpoint wrapper or bare model text.
pub fn parse_tips(raw: &str) -> Option<Vec<HealthTip>> {
    if let Ok(body) = serde_json::from_str::<Value>(raw) {
        if let Some(tips) = tips_from_array(&body) {
            return Some(tips);
        }
        let wrapped = [
            body.get("response"),
            body.get("text"),
            body.pointer("/output/0/content"),
            body.pointer("/result/content"),
            body.pointer("/choices/0/message/content"),
            body.pointer("/choices/0/text"),
        ];
        if let Some(tips) = wrapped
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .find_map(tips_from_text)
        {
            return Some(tips);
        }
    }
    tips_from_text(raw)
}
