use isomc_core::errors::{ErrorInfo, IsoError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("block", 3)
        .with_context("reason", "example")
}

#[test]
fn numerical_error_surface() {
    let err = IsoError::Numerical(sample_info("N001", "singular normal equations"));
    assert_eq!(err.info().code, "N001");
    assert!(err.info().context.contains_key("block"));
    assert!(err.to_string().starts_with("numerical error"));
}

#[test]
fn data_shape_error_surface() {
    let err = IsoError::DataShape(sample_info("D001", "detector out of range"));
    assert_eq!(err.info().code, "D001");
    assert_eq!(err.info().context.get("block").map(String::as_str), Some("3"));
}

#[test]
fn insufficient_ensemble_error_surface() {
    let err = IsoError::InsufficientEnsemble(sample_info("E001", "no usable records"));
    assert_eq!(err.info().code, "E001");
}

#[test]
fn hint_is_rendered() {
    let err = IsoError::Config(
        ErrorInfo::new("C001", "burn-in too large").with_hint("lower burn_in"),
    );
    let rendered = err.to_string();
    assert!(rendered.contains("hint: lower burn_in"));
    assert!(rendered.contains("code: C001"));
}

#[test]
fn errors_serialize_with_family_tag() {
    let err = IsoError::method("M001", "unknown species");
    let json = serde_json::to_value(&err).expect("serialize");
    assert_eq!(json["family"], "Method");
    assert_eq!(json["detail"]["code"], "M001");
    let back: IsoError = serde_json::from_value(json).expect("deserialize");
    assert_eq!(back, err);
}
