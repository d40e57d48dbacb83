use super::model::{AnalyzeFoodRequest, HealthPrediction};
use super::rules::rules_for;
use crate::profile::model::{display_label, UserProfile};

pub const SYSTEM_PROMPT: &str = "You are a nutrition and health expert.";

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

fn opt<T: std::fmt::Display>(value: Option<T>, missing: &str) -> String {
    value.map_or_else(|| missing.to_string(), |v| v.to_string())
}

fn labels<T: serde::Serialize>(meds: &[T]) -> String {
    let joined = meds.iter().map(display_label).collect::<Vec<_>>().join(", ");
    if joined.is_empty() {
        "None".into()
    } else {
        joined
    }
}

fn bmi_text(profile: &UserProfile) -> String {
    profile
        .demographics
        .bmi()
        .map_or_else(|| "unknown".into(), |b| format!("{b:.1}"))
}

fn push_line(out: &mut String, line: &str) {
    out.push_str(line);
    out.push('\n');
}

fn write_profile(out: &mut String, profile: &UserProfile) {
    let d = &profile.demographics;
    push_line(out, "### USER PROFILE");
    push_line(out, "Demographics:");
    push_line(out, &format!("- Name: {}", profile.name));
    push_line(out, &format!("- Age: {} years", d.age));
    push_line(out, &format!("- Sex: {}", display_label(&d.biological_sex)));
    push_line(out, &format!("- Height: {} cm", d.height_cm));
    push_line(out, &format!("- Weight: {} kg", d.weight_kg));
    push_line(out, &format!("- BMI: {}", bmi_text(profile)));
    push_line(out, &format!("- Activity Level: {}", display_label(&d.activity_level)));
    out.push('\n');
    push_line(out, "Medical Conditions:");
    push_line(out, &format!("- Primary Condition: {}", profile.primary_condition.as_str()));
    push_line(out, "- Other Conditions:");
    push_line(out, &format!("  - Kidney Disease: {}", yes_no(profile.other_conditions.kidney_disease)));
    push_line(out, &format!("  - Heart Disease: {}", yes_no(profile.other_conditions.heart_disease)));

    if profile.primary_condition.includes_diabetes() {
        let sugar = profile.diabetes_status.as_ref().map(|s| s.blood_sugar);
        out.push('\n');
        push_line(out, "Diabetes Management:");
        push_line(out, &format!("- Blood Sugar Level: {} mg/dL", opt(sugar, "unknown")));
        push_line(out, &format!("- Medications: {}", labels(profile.diabetes_medications())));
    }
    if profile.primary_condition.includes_hypertension() {
        let bp = profile.hypertension_status.as_ref().map(|s| &s.blood_pressure);
        out.push('\n');
        push_line(out, "Hypertension Management:");
        push_line(
            out,
            &format!(
                "- Blood Pressure: {}/{} mmHg",
                opt(bp.map(|b| b.systolic), "unknown"),
                opt(bp.map(|b| b.diastolic), "unknown")
            ),
        );
        push_line(out, &format!("- Medications: {}", labels(profile.hypertension_medications())));
    }
}

/// Prompt asking the model for a Safe/Risky verdict on one label.
pub fn build_prompt(request: &AnalyzeFoodRequest, profile: &UserProfile) -> String {
    let n = &request.nutrition;
    let mut out = String::from(
        "You are a nutrition and health expert.\n\
         Analyze if the following food is \"Safe\" or \"Risky\" for the user based on their full medical profile.\n\n",
    );
    write_profile(&mut out, profile);

    out.push('\n');
    push_line(&mut out, "### FOOD NUTRITION");
    push_line(&mut out, &format!("- Food Name: {}", request.food_name.as_deref().unwrap_or("Unnamed Food")));
    push_line(&mut out, &format!("- Calories: {} kcal", n.calories));
    push_line(&mut out, &format!("- Carbohydrates: {} g", n.carbohydrates));
    push_line(&mut out, &format!("- Protein: {} g", n.protein));
    push_line(&mut out, &format!("- Fat: {} g", n.fat));
    push_line(&mut out, &format!("- Sodium: {} mg", n.sodium));
    push_line(&mut out, &format!("- Fiber: {} g", n.fiber));
    push_line(&mut out, &format!("- Total Sugars: {} g", n.total_sugars));
    push_line(&mut out, &format!("- Added Sugars: {} g", opt(n.added_sugars, "unknown")));
    push_line(&mut out, &format!("- Saturated Fat: {} g", opt(n.saturated_fat, "unknown")));
    push_line(&mut out, &format!("- Trans Fat: {} g", opt(n.trans_fat, "unknown")));
    push_line(&mut out, &format!("- Potassium: {} mg", opt(n.potassium, "unknown")));
    push_line(&mut out, &format!("- Cholesterol: {} mg", opt(n.cholesterol, "unknown")));
    push_line(&mut out, &format!("- Serving Size: {}", opt(n.serving_size.as_deref(), "unspecified")));
    push_line(
        &mut out,
        &format!(
            "- Servings / Container: {}",
            opt(n.servings_per_container, "unspecified")
        ),
    );

    out.push('\n');
    push_line(&mut out, &format!("### REFERENCE LIMITS ({})", request.condition.as_str()));
    for rule in rules_for(request.condition) {
        push_line(&mut out, &format!("- Risky when {}", rule.limit));
    }

    out.push_str(
        "\n### TASK\n\
         Determine if this food is **Safe** or **Risky** for this user.\n\
         Base your decision on:\n\
         1. Nutritional content vs medical conditions and the reference limits above\n\
         2. Patient's current health metrics (BP, blood sugar)\n\
         3. Overall health status (BMI, activity level)\n\
         4. Medication interactions if relevant\n\n\
         Respond **strictly in JSON** format like this:\n\n\
         {\n  \"prediction\": \"Safe\" | \"Risky\",\n  \"reasoning\": \"How this food impacts the user's condition.\",\n  \
         \"healthTip\": [{\"content\": \"tip\"}, {\"content\": \"tip\"}, {\"content\": \"tip\"}, {\"content\": \"tip\"}, {\"content\": \"tip\"}]\n}\n",
    );
    out
}

/// One line of today's scan summary fed into the tips prompt.
#[derive(Debug, Clone)]
pub struct ScanSample {
    pub food_name: String,
    pub prediction: HealthPrediction,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerdictCounts {
    pub safe: i64,
    pub risky: i64,
}

/// Prompt asking for five personalised one-sentence tips.
pub fn build_tips_prompt(
    profile: &UserProfile,
    scans_today: i64,
    counts: VerdictCounts,
    samples: &[ScanSample],
) -> String {
    let mut out = String::from(
        "You are a practical, evidence-based nutrition and behavior-change coach.\n\n\
         Provide exactly 5 short (one-sentence) actionable health tips for this user based on their profile \
         and today's food scans. Respond strictly with a JSON array of 5 objects in the form \
         [{\"content\":\"...\"}, ...].\n\n",
    );
    write_profile(&mut out, profile);

    out.push('\n');
    push_line(&mut out, "### TODAY'S SCANS SUMMARY");
    push_line(&mut out, &format!("Total scans: {scans_today}"));
    push_line(&mut out, &format!("- Safe: {}", counts.safe));
    push_line(&mut out, &format!("- Risky: {}", counts.risky));
    if samples.is_empty() {
        push_line(&mut out, "- (no scans)");
    }
    for s in samples.iter().take(5) {
        let reasoning: String = s.prediction.reasoning.chars().take(120).collect();
        push_line(
            &mut out,
            &format!(
                "- {}: {} ({})",
                s.food_name,
                s.prediction.prediction.as_str(),
                reasoning
            ),
        );
    }

    out.push_str(
        "\n### TASK\n\
         Create 5 concise, actionable tips the user can apply today to reduce risk and improve dietary choices. \
         Each tip should be personalized to the profile and today's scan summary.\n\n\
         Respond strictly as JSON: [{\"content\":\"tip 1\"}, {\"content\":\"tip 2\"}, {\"content\":\"tip 3\"}, \
         {\"content\":\"tip 4\"}, {\"content\":\"tip 5\"}]\n",
    );
    out
}
