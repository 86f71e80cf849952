use rand::Rng;
use shared::{
    domain::{Category, RiskTier, ScoreMode},
    protocol::{AdviceBundle, PredictionResult},
};

use crate::registry::{self, FormValues};

pub const MODERATE_THRESHOLD: f64 = 0.3;
pub const HIGH_THRESHOLD: f64 = 0.6;

pub fn tier_for(raw_score: f64) -> RiskTier {
    let score = sanitize(raw_score);
    if score < MODERATE_THRESHOLD {
        RiskTier::Low
    } else if score < HIGH_THRESHOLD {
        RiskTier::Moderate
    } else {
        RiskTier::High
    }
}

pub fn percentage_for(raw_score: f64) -> f64 {
    (sanitize(raw_score) * 100.0).clamp(0.0, 100.0)
}

fn sanitize(raw_score: f64) -> f64 {
    if raw_score.is_finite() {
        raw_score
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy)]
enum Threshold {
    AtLeast(f64),
    Above(f64),
}

impl Threshold {
    fn fires(self, value: f64) -> bool {
        match self {
            Threshold::AtLeast(limit) => value >= limit,
            Threshold::Above(limit) => value > limit,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RiskRule {
    key: &'static str,
    threshold: Threshold,
    note: &'static str,
}

const HEART_RULES: &[RiskRule] = &[
    RiskRule {
        key: "systolicBP",
        threshold: Threshold::AtLeast(140.0),
        note: "High blood pressure detected",
    },
    RiskRule {
        key: "totalCholesterol",
        threshold: Threshold::Above(200.0),
        note: "Elevated cholesterol levels",
    },
    RiskRule {
        key: "age",
        threshold: Threshold::Above(60.0),
        note: "Age is a risk factor",
    },
];

const DIABETES_RULES: &[RiskRule] = &[
    RiskRule {
        key: "fastingBloodSugar",
        threshold: Threshold::AtLeast(126.0),
        note: "High fasting blood sugar",
    },
    RiskRule {
        key: "hba1c",
        threshold: Threshold::AtLeast(6.5),
        note: "Elevated HbA1c levels",
    },
];

const LIVER_RULES: &[RiskRule] = &[
    RiskRule {
        key: "alt",
        threshold: Threshold::Above(56.0),
        note: "Elevated ALT levels",
    },
    RiskRule {
        key: "ast",
        threshold: Threshold::Above(40.0),
        note: "Elevated AST levels",
    },
];

fn rules_for(category: Category) -> &'static [RiskRule] {
    match category {
        Category::Heart => HEART_RULES,
        Category::Diabetes => DIABETES_RULES,
        Category::Liver => LIVER_RULES,
    }
}

/// Every rule is checked on its own, in declaration order. A value that does
/// not parse fires nothing.
pub fn risk_factor_notes(category: Category, values: &FormValues) -> Vec<String> {
    rules_for(category)
        .iter()
        .filter(|rule| {
            registry::numeric_value(category, values, rule.key)
                .is_some_and(|value| rule.threshold.fires(value))
        })
        .map(|rule| rule.note.to_string())
        .collect()
}

struct AdviceText {
    lifestyle: &'static [&'static str],
    monitoring: &'static [&'static str],
    consultation: &'static [&'static str],
}

const HEART_ADVICE: [AdviceText; 3] = [
    AdviceText {
        lifestyle: &[
            "Maintain a heart-healthy Mediterranean diet",
            "Aim for 150 minutes of moderate exercise weekly",
            "Practice stress management techniques",
        ],
        monitoring: &[
            "Annual blood pressure checkups",
            "Regular cholesterol screening",
            "Track physical activity levels",
        ],
        consultation: &[
            "Schedule routine check-ups with primary care physician",
            "Discuss family history during next visit",
        ],
    },
    AdviceText {
        lifestyle: &[
            "Reduce sodium intake to under 2300mg daily",
            "Increase cardiovascular exercise frequency",
            "Consider smoking cessation if applicable",
        ],
        monitoring: &[
            "Monthly blood pressure monitoring",
            "Keep detailed food and exercise diary",
            "Regular heart rate monitoring",
        ],
        consultation: &[
            "Schedule consultation with cardiologist",
            "Consider stress test evaluation",
            "Discuss preventive medications",
        ],
    },
    AdviceText {
        lifestyle: &[
            "Immediate lifestyle modifications needed",
            "Strict adherence to heart-healthy diet",
            "Supervised exercise program recommended",
        ],
        monitoring: &[
            "Daily blood pressure monitoring",
            "Weekly weight tracking",
            "Symptom journal maintenance",
        ],
        consultation: &[
            "Urgent cardiovascular evaluation needed",
            "Comprehensive heart health assessment",
            "Regular cardiology follow-ups",
        ],
    },
];

const DIABETES_ADVICE: [AdviceText; 3] = [
    AdviceText {
        lifestyle: &[
            "Maintain balanced diet with whole grains",
            "Regular physical activity",
            "Healthy weight maintenance",
        ],
        monitoring: &[
            "Annual blood sugar screening",
            "Regular weight checks",
            "Track dietary habits",
        ],
        consultation: &[
            "Routine check-ups with primary care",
            "Discuss family history of diabetes",
        ],
    },
    AdviceText {
        lifestyle: &[
            "Reduce refined carbohydrate intake",
            "Increase fiber-rich foods",
            "Daily 30-minute exercise routine",
        ],
        monitoring: &[
            "Regular blood glucose testing",
            "Quarterly A1C checks",
            "Food diary maintenance",
        ],
        consultation: &[
            "Endocrinologist consultation recommended",
            "Diabetes prevention program participation",
            "Nutritionist consultation",
        ],
    },
    AdviceText {
        lifestyle: &[
            "Strict glycemic index diet adherence",
            "Structured exercise program",
            "Weight management essential",
        ],
        monitoring: &[
            "Daily blood glucose monitoring",
            "Regular A1C testing",
            "Careful foot examination",
        ],
        consultation: &[
            "Immediate endocrinologist evaluation",
            "Diabetes management planning",
            "Regular specialist follow-up",
        ],
    },
];

const LIVER_ADVICE: [AdviceText; 3] = [
    AdviceText {
        lifestyle: &[
            "Maintain alcohol-free or minimal consumption",
            "Balanced diet with lean proteins",
            "Regular physical activity",
        ],
        monitoring: &[
            "Annual liver function tests",
            "Regular health check-ups",
            "Monitor weight changes",
        ],
        consultation: &[
            "Routine medical check-ups",
            "Discuss liver health during visits",
        ],
    },
    AdviceText {
        lifestyle: &[
            "Complete alcohol abstinence recommended",
            "Low-fat, liver-friendly diet",
            "Gentle exercise routine",
        ],
        monitoring: &[
            "Regular liver function monitoring",
            "Track symptoms and changes",
            "Medication review",
        ],
        consultation: &[
            "Hepatologist consultation needed",
            "Liver ultrasound consideration",
            "Detailed health assessment",
        ],
    },
    AdviceText {
        lifestyle: &[
            "Strict liver-protective diet",
            "Avoid all alcohol consumption",
            "Modified exercise under guidance",
        ],
        monitoring: &[
            "Frequent liver function testing",
            "Regular imaging studies",
            "Careful symptom tracking",
        ],
        consultation: &[
            "Immediate liver specialist evaluation",
            "Comprehensive liver assessment",
            "Regular specialist monitoring",
        ],
    },
];

fn to_strings(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|line| line.to_string()).collect()
}

pub fn advice_for(category: Category, tier: RiskTier) -> AdviceBundle {
    let table = match category {
        Category::Heart => &HEART_ADVICE,
        Category::Diabetes => &DIABETES_ADVICE,
        Category::Liver => &LIVER_ADVICE,
    };
    let text = match tier {
        RiskTier::Low => &table[0],
        RiskTier::Moderate => &table[1],
        RiskTier::High => &table[2],
    };
    AdviceBundle {
        lifestyle: to_strings(text.lifestyle),
        monitoring: to_strings(text.monitoring),
        consultation: to_strings(text.consultation),
    }
}

fn build(
    category: Category,
    values: &FormValues,
    raw_score: f64,
    risk_tier: RiskTier,
    percentage: f64,
) -> PredictionResult {
    PredictionResult {
        category,
        risk_tier,
        percentage,
        risk_factor_notes: risk_factor_notes(category, values),
        raw_score,
        advice: advice_for(category, risk_tier),
    }
}

pub fn present(raw_score: f64, category: Category, values: &FormValues) -> PredictionResult {
    build(
        category,
        values,
        raw_score,
        tier_for(raw_score),
        percentage_for(raw_score),
    )
}

pub fn present_random_draw<R: Rng>(
    raw_score: f64,
    category: Category,
    values: &FormValues,
    rng: &mut R,
) -> PredictionResult {
    let tier = RiskTier::ALL[rng.random_range(0..RiskTier::ALL.len())];
    let (floor, width) = match tier {
        RiskTier::Low => (0.0, 30.0),
        RiskTier::Moderate => (30.0, 30.0),
        RiskTier::High => (60.0, 40.0),
    };
    let percentage = floor + rng.random::<f64>() * width;
    build(category, values, raw_score, tier, percentage)
}

pub fn present_with_mode<R: Rng>(
    mode: ScoreMode,
    raw_score: f64,
    category: Category,
    values: &FormValues,
    rng: &mut R,
) -> PredictionResult {
    match mode {
        ScoreMode::Model => present(raw_score, category, values),
        ScoreMode::RandomDraw => present_random_draw(raw_score, category, values, rng),
    }
}

#[cfg(test)]
#[path = "tests/presenter_tests.rs"]
mod tests;
