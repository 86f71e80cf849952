use super::*;

fn heart_values() -> FormValues {
    [
        ("age", "54"),
        ("gender", "female"),
        ("weight", "72"),
        ("height", "165"),
        ("systolicBP", "128"),
        ("diastolicBP", "84"),
        ("totalCholesterol", "190"),
        ("hdlCholesterol", "55"),
        ("ldlCholesterol", "110"),
        ("restingHeartRate", "68"),
    ]
    .into_iter()
    .collect()
}

#[test]
fn common_fields_come_first_for_every_category() {
    for category in Category::ALL {
        let fields = fields_for(category);
        let keys: Vec<_> = fields.iter().map(|spec| spec.key).collect();
        assert_eq!(&keys[..4], &["age", "gender", "weight", "height"]);

        let mut deduped = keys.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), keys.len(), "duplicate keys for {category}");

        assert_eq!(fields_for(category), fields, "order must be stable");
    }
}

#[test]
fn category_specific_fields_follow_in_declaration_order() {
    let keys: Vec<_> = fields_for(Category::Diabetes)
        .iter()
        .map(|spec| spec.key)
        .collect();
    assert_eq!(
        &keys[4..],
        &["fastingBloodSugar", "hba1c", "randomBloodSugar"]
    );

    let liver = fields_for(Category::Liver);
    assert_eq!(liver.len(), 9);
    assert_eq!(liver.last().map(|spec| spec.key), Some("alcoholConsumption"));
}

#[test]
fn feature_vector_arity_is_fixed_per_category() {
    assert_eq!(arity(Category::Heart), 8);
    assert_eq!(arity(Category::Diabetes), 5);
    assert_eq!(arity(Category::Liver), 6);

    for category in Category::ALL {
        assert_eq!(
            to_feature_vector(category, &FormValues::new()).len(),
            arity(category)
        );
    }
}

#[test]
fn in_range_heart_values_encode_without_zero_coercion() {
    let values = heart_values();
    let features = to_feature_vector(Category::Heart, &values);

    assert_eq!(features.len(), 8);
    assert!(features.iter().all(|value| *value != 0.0));
    assert_eq!(features[0], 54.0);
    assert_eq!(&features[2..], &[128.0, 84.0, 190.0, 55.0, 110.0, 68.0]);
    assert!(out_of_range(Category::Heart, &values).is_empty());
}

#[test]
fn in_range_diabetes_values_encode_without_zero_coercion() {
    let values: FormValues = [
        ("age", "47"),
        ("weight", "90"),
        ("height", "180"),
        ("fastingBloodSugar", "132"),
        ("hba1c", "6.8"),
        ("randomBloodSugar", "210"),
    ]
    .into_iter()
    .collect();
    let features = to_feature_vector(Category::Diabetes, &values);

    assert_eq!(features.len(), arity(Category::Diabetes));
    assert!(features.iter().all(|value| *value != 0.0));
    assert!((features[1] - 90.0 / 3.24).abs() < 1e-9);
    assert_eq!(&features[2..], &[132.0, 6.8, 210.0]);
    assert!(out_of_range(Category::Diabetes, &values).is_empty());
}

#[test]
fn in_range_liver_values_encode_without_zero_coercion() {
    let values: FormValues = [
        ("age", "61"),
        ("gender", "male"),
        ("weight", "78"),
        ("height", "172"),
        ("alt", "64"),
        ("ast", "45"),
        ("albumin", "3.9"),
        ("bilirubin", "1.1"),
        ("alcoholConsumption", "14"),
    ]
    .into_iter()
    .collect();
    let features = to_feature_vector(Category::Liver, &values);

    assert_eq!(features.len(), arity(Category::Liver));
    assert!(features.iter().all(|value| *value != 0.0));
    assert_eq!(features[0], 61.0);
    assert_eq!(&features[2..], &[64.0, 45.0, 3.9, 1.1]);
    assert!(out_of_range(Category::Liver, &values).is_empty());
}

#[test]
fn bmi_replaces_weight_and_height_at_index_one() {
    let values: FormValues = [("weight", "80"), ("height", "200")].into_iter().collect();
    let features = to_feature_vector(Category::Diabetes, &values);
    assert!((features[1] - 20.0).abs() < 1e-9);
    assert_eq!(features, vec![0.0, features[1], 0.0, 0.0, 0.0]);
}

#[test]
fn bmi_falls_back_to_zero_when_height_is_missing_or_zero() {
    let missing: FormValues = [("weight", "80")].into_iter().collect();
    assert_eq!(body_mass_index(Category::Heart, &missing), 0.0);

    let zero: FormValues = [("weight", "80"), ("height", "0")].into_iter().collect();
    assert_eq!(body_mass_index(Category::Heart, &zero), 0.0);
}

#[test]
fn empty_and_malformed_values_encode_as_zero() {
    let mut values = heart_values();
    values.set("systolicBP", "");
    values.set("hdlCholesterol", "n/a");

    let first = to_feature_vector(Category::Heart, &values);
    let second = to_feature_vector(Category::Heart, &values);
    assert_eq!(first, second);
    assert_eq!(first[2], 0.0);
    assert_eq!(first[5], 0.0);
    assert_eq!(first[3], 84.0);
}

#[test]
fn integer_fields_read_leading_digits_only() {
    let spec = field(Category::Heart, "systolicBP").expect("field");
    assert_eq!(spec.parse("150abc"), Some(150.0));
    assert_eq!(spec.parse("  12.9"), Some(12.0));
    assert_eq!(spec.parse("-7"), Some(-7.0));
    assert_eq!(spec.parse("abc"), None);
    assert_eq!(spec.parse("-"), None);
}

#[test]
fn decimal_fields_keep_the_fraction() {
    let spec = field(Category::Diabetes, "hba1c").expect("field");
    assert_eq!(spec.parse("6.7%"), Some(6.7));
    assert_eq!(spec.parse(".5"), Some(0.5));
    assert_eq!(spec.parse("7."), Some(7.0));
    assert_eq!(spec.parse(""), None);
}

#[test]
fn decimal_fields_read_exponents_and_integer_fields_stop_at_them() {
    let decimal = field(Category::Liver, "bilirubin").expect("field");
    assert_eq!(decimal.parse("1e3"), Some(1000.0));
    assert_eq!(decimal.parse("2.5E-1"), Some(0.25));
    assert_eq!(decimal.parse("1.5e+2 mg"), Some(150.0));
    assert_eq!(decimal.parse("1e"), Some(1.0));
    assert_eq!(decimal.parse("1e+x"), Some(1.0));
    assert_eq!(decimal.parse("e3"), None);

    let integer = field(Category::Liver, "alt").expect("field");
    assert_eq!(integer.parse("1e3"), Some(1.0));
}

#[test]
fn choice_fields_have_no_numeric_value() {
    let spec = field(Category::Liver, "gender").expect("field");
    assert_eq!(spec.kind, FieldKind::Choice(GENDER_OPTIONS));
    assert_eq!(spec.parse("male"), None);
    assert!(!spec.required);
}

#[test]
fn fields_from_other_categories_are_not_visible() {
    assert!(field(Category::Heart, "alt").is_none());
    assert!(field(Category::Liver, "alt").is_some());
    let values: FormValues = [("alt", "80")].into_iter().collect();
    assert_eq!(numeric_value(Category::Heart, &values, "alt"), None);
}

#[test]
fn out_of_range_reports_parsable_values_only() {
    let values: FormValues = [("age", "130"), ("weight", "heavy"), ("alt", "5")]
        .into_iter()
        .collect();
    assert_eq!(out_of_range(Category::Liver, &values), vec!["age", "alt"]);
}

#[test]
fn form_values_set_reports_changes() {
    let mut values = FormValues::new();
    assert!(values.set("age", "40"));
    assert!(!values.set("age", "40"));
    assert!(values.set("age", "41"));
    assert_eq!(values.get("age"), Some("41"));
    assert_eq!(values.len(), 1);
}
