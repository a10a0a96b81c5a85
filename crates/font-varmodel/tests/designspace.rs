use std::path::PathBuf;

use font_varmodel::{
    DesignSpace, Diagnostic, DiagnosticKind, Error, Location, Payload, SourceInstancer,
};
use pretty_assertions::assert_eq;
use serde_json::json;

const FAMILY: &str = r#"{
    "axes": [
        {"name": "Weight", "minValue": 100, "defaultValue": 400, "maxValue": 900},
        {"name": "Width", "minValue": 75, "defaultValue": 100, "maxValue": 125},
        {"name": "Italic", "values": [0, 1], "defaultValue": 0}
    ],
    "sources": [
        {"name": "Regular", "location": {}, "value": {"advance": 500, "kern": [10, -20]}},
        {"name": "Black", "location": {"Weight": 900}, "value": {"advance": 600, "kern": [20, -40]}},
        {"name": "Condensed", "location": {"Width": 75}, "value": {"advance": 400, "kern": [10, -20]}},
        {"name": "Italic", "location": {"Italic": 1}, "value": {"advance": 480, "kern": [8, -16]}},
        {"name": "Black Italic", "location": {"Italic": 1, "Weight": 900}, "value": {"kern": [16, -32], "advance": 580}}
    ]
}"#;

fn loc(pairs: &[(&str, f64)]) -> Location {
    pairs.iter().map(|(axis, value)| (axis.to_string(), *value)).collect()
}

fn field(payload: &Payload, key: &str) -> Payload {
    payload.get(key).cloned().unwrap_or_else(|| panic!("missing field {key} in {payload:?}"))
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn family() -> SourceInstancer {
    init_logging();
    SourceInstancer::new(&DesignSpace::from_json(FAMILY).unwrap()).unwrap()
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data").join(name)
}

#[test]
fn default_location_returns_default_source() {
    let result = family().instantiate(&Location::new()).unwrap();
    assert!(result.errors.is_empty());
    assert_eq!(field(&result.instance, "advance"), Payload::Number(500.0));
    assert_eq!(field(&result.instance, "kern"), Payload::from(vec![10.0, -20.0]));
}

#[test]
fn masters_are_reproduced() {
    let instancer = family();
    let cases = [
        (loc(&[("Weight", 900.0)]), 600.0),
        (loc(&[("Width", 75.0)]), 400.0),
        (loc(&[("Italic", 1.0)]), 480.0),
        (loc(&[("Italic", 1.0), ("Weight", 900.0)]), 580.0),
    ];
    for (location, advance) in cases {
        let result = instancer.instantiate(&location).unwrap();
        assert!(result.errors.is_empty(), "{location:?}: {:?}", result.errors);
        assert_eq!(field(&result.instance, "advance"), Payload::Number(advance), "{location:?}");
    }
}

#[test]
fn buckets_interpolate_independently() {
    let instancer = family();

    let upright = instancer.instantiate(&loc(&[("Weight", 650.0)])).unwrap();
    assert_eq!(field(&upright.instance, "advance"), Payload::Number(550.0));
    assert_eq!(field(&upright.instance, "kern"), Payload::from(vec![15.0, -30.0]));

    let italic = instancer.instantiate(&loc(&[("Weight", 650.0), ("Italic", 1.0)])).unwrap();
    assert_eq!(field(&italic.instance, "advance"), Payload::Number(530.0));
    assert_eq!(field(&italic.instance, "kern"), Payload::from(vec![12.0, -24.0]));

    // no condensed italic source: width has no effect in the italic bucket
    let italic = instancer.instantiate(&loc(&[("Width", 75.0), ("Italic", 1.0)])).unwrap();
    assert!(italic.errors.is_empty());
    assert_eq!(field(&italic.instance, "advance"), Payload::Number(480.0));
}

#[test]
fn source_contributions_partition_unity() {
    let instancer = family();

    let result = instancer.source_contributions(&loc(&[("Weight", 650.0)])).unwrap();
    assert_eq!(result.instance, vec![0.5, 0.5, 0.0, 0.0, 0.0]);

    let result = instancer.source_contributions(&loc(&[("Weight", 650.0), ("Width", 87.5)])).unwrap();
    let total: f64 = result.instance.iter().sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert_eq!(&result.instance[3..], &[0.0, 0.0]);
}

#[test]
fn results_serialize_without_empty_errors() {
    let result = family().instantiate(&loc(&[("Weight", 650.0)])).unwrap();
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({"instance": {"advance": 550.0, "kern": [15.0, -30.0]}})
    );
}

#[test]
fn broken_and_missing_buckets_produce_diagnostics() {
    init_logging();
    let ds = DesignSpace::from_json(
        r#"{
            "axes": [
                {"name": "Weight", "minValue": 400, "defaultValue": 400, "maxValue": 700},
                {"name": "Italic", "values": [0, 1], "defaultValue": 0},
                {"name": "Serif", "values": [0, 1], "defaultValue": 0}
            ],
            "sources": [
                {"location": {}, "value": 10},
                {"location": {"Weight": 700}, "value": 20},
                {"location": {"Weight": 700, "Italic": 1}, "value": 30}
            ]
        }"#,
    )
    .unwrap();
    let instancer = SourceInstancer::new(&ds).unwrap();

    let result = instancer.instantiate(&loc(&[("Italic", 1.0)])).unwrap();
    assert_eq!(result.instance, Payload::Number(30.0));
    assert_eq!(
        result.errors,
        vec![Diagnostic::model_error(
            "Italic=1, Serif=0: locations must contain default (missing base source)"
        )]
    );

    let result = instancer.instantiate(&loc(&[("Weight", 550.0), ("Serif", 1.0)])).unwrap();
    assert_eq!(result.instance, Payload::Number(15.0));
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, DiagnosticKind::ModelWarning);
    assert_eq!(
        serde_json::to_value(&result.errors).unwrap(),
        json!([{"type": "model-warning", "message": "there are no sources for Italic=0, Serif=1"}])
    );
}

#[test]
fn cross_axis_document_from_file() {
    init_logging();
    let ds = DesignSpace::load(fixture("diagonal.json")).unwrap();
    assert_eq!(ds.mappings.len(), 4);
    let instancer = SourceInstancer::new(&ds).unwrap();

    let location = instancer.source_location(&loc(&[("Diagonal", 12.5)])).unwrap();
    assert_eq!(location, loc(&[("Diagonal", 12.5), ("Horizontal", 0.0), ("Vertical", 16.5)]));

    let result = instancer.instantiate(&loc(&[("Diagonal", 50.0)])).unwrap();
    assert_eq!(result.instance, serde_json::from_value::<Payload>(json!({"x": 50.0, "y": 50.0})).unwrap());

    let result = instancer.instantiate(&loc(&[("Diagonal", 12.5)])).unwrap();
    let y = field(&result.instance, "y").as_number().unwrap();
    assert!((y - 16.5).abs() < 1e-9);
}

#[test]
fn missing_document_is_an_io_error() {
    let err = DesignSpace::load(fixture("does-not-exist.json")).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
    assert!(err.to_string().contains("does-not-exist.json"));
}
