use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shared::domain::Category;

pub const GENDER_OPTIONS: &[&str] = &["male", "female", "other"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Decimal,
    Choice(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub unit: Option<&'static str>,
    pub valid_range: Option<(f64, f64)>,
    pub required: bool,
    pub kind: FieldKind,
}

impl FieldSpec {
    const fn integer(
        key: &'static str,
        label: &'static str,
        unit: &'static str,
        min: f64,
        max: f64,
    ) -> Self {
        Self {
            key,
            label,
            unit: Some(unit),
            valid_range: Some((min, max)),
            required: true,
            kind: FieldKind::Integer,
        }
    }

    const fn decimal(
        key: &'static str,
        label: &'static str,
        unit: &'static str,
        min: f64,
        max: f64,
    ) -> Self {
        Self {
            key,
            label,
            unit: Some(unit),
            valid_range: Some((min, max)),
            required: true,
            kind: FieldKind::Decimal,
        }
    }

    const fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn parse(&self, raw: &str) -> Option<f64> {
        match self.kind {
            FieldKind::Integer => parse_leading_number(raw, false),
            FieldKind::Decimal => parse_leading_number(raw, true),
            FieldKind::Choice(_) => None,
        }
    }

    pub fn in_range(&self, value: f64) -> bool {
        match self.valid_range {
            Some((min, max)) => value >= min && value <= max,
            None => true,
        }
    }
}

pub const COMMON_FIELDS: &[FieldSpec] = &[
    FieldSpec::integer("age", "Age", "years", 18.0, 100.0),
    FieldSpec {
        key: "gender",
        label: "Gender",
        unit: None,
        valid_range: None,
        required: false,
        kind: FieldKind::Choice(GENDER_OPTIONS),
    },
    FieldSpec::integer("weight", "Weight", "kg", 40.0, 150.0),
    FieldSpec::integer("height", "Height", "cm", 140.0, 200.0),
];

const HEART_FIELDS: &[FieldSpec] = &[
    FieldSpec::integer("systolicBP", "Systolic Blood Pressure", "mmHg", 90.0, 200.0),
    FieldSpec::integer("diastolicBP", "Diastolic Blood Pressure", "mmHg", 60.0, 120.0),
    FieldSpec::integer("totalCholesterol", "Total Cholesterol", "mg/dL", 100.0, 300.0),
    FieldSpec::integer("hdlCholesterol", "HDL Cholesterol", "mg/dL", 20.0, 100.0),
    FieldSpec::integer("ldlCholesterol", "LDL Cholesterol", "mg/dL", 50.0, 190.0),
    FieldSpec::integer("restingHeartRate", "Resting Heart Rate", "bpm", 40.0, 120.0),
];

const DIABETES_FIELDS: &[FieldSpec] = &[
    FieldSpec::integer("fastingBloodSugar", "Fasting Blood Sugar", "mg/dL", 70.0, 200.0),
    FieldSpec::decimal("hba1c", "HbA1c", "%", 4.0, 14.0),
    FieldSpec::integer("randomBloodSugar", "Random Blood Sugar", "mg/dL", 70.0, 300.0),
];

const LIVER_FIELDS: &[FieldSpec] = &[
    FieldSpec::integer("alt", "ALT", "U/L", 7.0, 200.0),
    FieldSpec::integer("ast", "AST", "U/L", 10.0, 200.0),
    FieldSpec::decimal("albumin", "Albumin", "g/dL", 3.0, 5.0),
    FieldSpec::decimal("bilirubin", "Total Bilirubin", "mg/dL", 0.3, 2.0),
    FieldSpec::integer("alcoholConsumption", "Alcohol Consumption", "units/week", 0.0, 100.0)
        .optional(),
];

fn specific_fields(category: Category) -> &'static [FieldSpec] {
    match category {
        Category::Heart => HEART_FIELDS,
        Category::Diabetes => DIABETES_FIELDS,
        Category::Liver => LIVER_FIELDS,
    }
}

pub fn fields_for(category: Category) -> Vec<&'static FieldSpec> {
    COMMON_FIELDS
        .iter()
        .chain(specific_fields(category).iter())
        .collect()
}

pub fn field(category: Category, key: &str) -> Option<&'static FieldSpec> {
    COMMON_FIELDS
        .iter()
        .chain(specific_fields(category).iter())
        .find(|spec| spec.key == key)
}

fn vector_tail(category: Category) -> &'static [&'static str] {
    match category {
        Category::Heart => &[
            "systolicBP",
            "diastolicBP",
            "totalCholesterol",
            "hdlCholesterol",
            "ldlCholesterol",
            "restingHeartRate",
        ],
        Category::Diabetes => &["fastingBloodSugar", "hba1c", "randomBloodSugar"],
        Category::Liver => &["alt", "ast", "albumin", "bilirubin"],
    }
}

pub fn arity(category: Category) -> usize {
    2 + vector_tail(category).len()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormValues(BTreeMap<String, String>);

impl FormValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns `true` when the stored value changed.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        let value = value.into();
        if self.0.get(&key) == Some(&value) {
            return false;
        }
        self.0.insert(key, value);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for FormValues
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

pub fn numeric_value(category: Category, values: &FormValues, key: &str) -> Option<f64> {
    let spec = field(category, key)?;
    spec.parse(values.get(key)?)
}

fn value_or_zero(category: Category, values: &FormValues, key: &str) -> f64 {
    numeric_value(category, values, key).unwrap_or(0.0)
}

pub fn body_mass_index(category: Category, values: &FormValues) -> f64 {
    let weight = numeric_value(category, values, "weight").unwrap_or(f64::NAN);
    let height_m = numeric_value(category, values, "height").unwrap_or(f64::NAN) / 100.0;
    let bmi = weight / (height_m * height_m);
    if bmi.is_finite() {
        bmi
    } else {
        0.0
    }
}

pub fn to_feature_vector(category: Category, values: &FormValues) -> Vec<f64> {
    let mut features = Vec::with_capacity(arity(category));
    features.push(value_or_zero(category, values, "age"));
    features.push(body_mass_index(category, values));
    features.extend(
        vector_tail(category)
            .iter()
            .map(|key| value_or_zero(category, values, key)),
    );
    features
}

pub fn out_of_range(category: Category, values: &FormValues) -> Vec<&'static str> {
    fields_for(category)
        .into_iter()
        .filter(|spec| {
            values
                .get(spec.key)
                .and_then(|raw| spec.parse(raw))
                .is_some_and(|value| !spec.in_range(value))
        })
        .map(|spec| spec.key)
        .collect()
}

fn parse_leading_number(raw: &str, allow_fraction: bool) -> Option<f64> {
    let text = raw.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut has_digits = end > int_start;

    if allow_fraction && bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start {
            has_digits = true;
            end = frac_end;
        }
    }

    if !has_digits {
        return None;
    }
    if allow_fraction && matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_start = end + 1;
        if matches!(bytes.get(exp_start), Some(b'+' | b'-')) {
            exp_start += 1;
        }
        let mut exp_end = exp_start;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_start {
            end = exp_end;
        }
    }
    text[..end].parse::<f64>().ok()
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
