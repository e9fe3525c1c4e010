use isomc_core::{AnalysisMethod, IsoError, IsotopeSpecies, IsotopicRatio, RatioPairTable};

fn lead_species() -> Vec<IsotopeSpecies> {
    ["204Pb", "207Pb", "206Pb", "208Pb"]
        .into_iter()
        .map(IsotopeSpecies::new)
        .collect()
}

#[test]
fn pair_table_resolves_both_directions() {
    let ratios = vec![IsotopicRatio::new(0, 3), IsotopicRatio::new(1, 3)];
    let table = RatioPairTable::build(&ratios);

    let forward = table.lookup(&IsotopicRatio::new(1, 3)).expect("forward");
    assert_eq!(forward.index, 1);
    assert!(!forward.inverted);

    let backward = table.lookup(&IsotopicRatio::new(3, 1)).expect("backward");
    assert_eq!(backward.index, 1);
    assert!(backward.inverted);

    assert_eq!(
        table.partner(&IsotopicRatio::new(3, 0)),
        Some(IsotopicRatio::new(0, 3))
    );
    assert!(table.lookup(&IsotopicRatio::new(0, 1)).is_none());
    assert_eq!(table.len(), 2);
}

#[test]
fn direct_ratios_must_use_reference() {
    let err = AnalysisMethod::new(
        lead_species(),
        vec![IsotopicRatio::new(0, 2)],
        Vec::new(),
        vec!["L2".into()],
    )
    .unwrap_err();
    assert!(matches!(err, IsoError::Method(_)));
    assert_eq!(err.info().code, "direct-ratio-not-referenced");
    assert_eq!(
        err.info().context.get("ratio").map(String::as_str),
        Some("204Pb/206Pb")
    );
}

#[test]
fn unknown_species_is_rejected() {
    let err = AnalysisMethod::new(
        lead_species(),
        Vec::new(),
        vec![IsotopicRatio::new(0, 9)],
        Vec::new(),
    )
    .unwrap_err();
    assert_eq!(err.info().code, "unknown-species");
}

#[test]
fn method_registers_direct_and_derived_pairs() {
    let method = AnalysisMethod::new(
        lead_species(),
        vec![
            IsotopicRatio::new(0, 3),
            IsotopicRatio::new(1, 3),
            IsotopicRatio::new(2, 3),
        ],
        vec![IsotopicRatio::new(1, 2), IsotopicRatio::new(3, 2)],
        vec!["H1".into(), "L2".into()],
    )
    .expect("valid method");

    assert_eq!(method.reference_species(), 3);
    let derived = method
        .pairs()
        .lookup(&IsotopicRatio::new(2, 1))
        .expect("inverse of derived ratio");
    assert_eq!(derived.index, 3);
    assert!(derived.inverted);
    assert_eq!(IsotopicRatio::new(1, 2).label(method.species()), "207Pb/206Pb");
}

#[test]
fn method_survives_serde_with_rebuilt_pairs() {
    let method = AnalysisMethod::with_direct_ratios(lead_species(), vec!["PM".into()])
        .expect("valid method");
    let json = serde_json::to_string(&method).expect("serialize");
    let back: AnalysisMethod = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, method);
    assert!(back.pairs().lookup(&IsotopicRatio::new(3, 0)).is_some());
}

#[test]
fn inverted_derived_ratio_is_not_a_duplicate() {
    let method = AnalysisMethod::new(
        lead_species(),
        vec![IsotopicRatio::new(0, 3), IsotopicRatio::new(1, 3)],
        vec![IsotopicRatio::new(3, 1)],
        Vec::new(),
    )
    .unwrap();
    assert_eq!(method.pairs().duplicates(), 0);
    let lookup = method.pairs().lookup(&IsotopicRatio::new(3, 1)).unwrap();
    assert_eq!(lookup.index, 1);
    assert!(lookup.inverted);

    let repeated = RatioPairTable::build(&[
        IsotopicRatio::new(0, 3),
        IsotopicRatio::new(3, 0),
        IsotopicRatio::new(0, 3),
    ]);
    assert_eq!(repeated.duplicates(), 1);
    assert_eq!(repeated.len(), 1);
}
