//! End-to-end integration tests.

use clade_shift::output::{format_report, to_json};
use clade_shift::tree::{TreeBuilder, TreeModel};
use clade_shift::{
    analyze, CladeShift, Config, Error, Method, Pooling, Rate, State, Taxon,
};

/// Root over 20 absent tips and 10 cherries of (absent, present).
///
/// Every present tip differs from its absent cherry and root, so it lands in
/// the change bucket. Present tips carry large body sizes.
fn cherries_fixture(branch_length: Option<f64>) -> (TreeModel, Vec<Taxon>) {
    let mut builder = TreeBuilder::new();
    let mut taxa = Vec::new();
    let mut root_children = Vec::new();

    for i in 0..20 {
        let label = format!("free{i}");
        root_children.push(builder.add_tip(label.clone(), branch_length));
        taxa.push(Taxon::new(label, 1.0 + 0.1 * i as f64, State::Absent));
    }
    for i in 0..10 {
        let absent = format!("pair{i}a");
        let present = format!("pair{i}p");
        let a = builder.add_tip(absent.clone(), branch_length);
        let p = builder.add_tip(present.clone(), branch_length);
        root_children.push(builder.add_internal(&[a, p], branch_length));
        taxa.push(Taxon::new(absent, 2.5 + 0.1 * i as f64, State::Absent));
        taxa.push(Taxon::new(present, 50.0 + i as f64, State::Present));
    }
    builder.add_internal(&root_children, None);

    (builder.build().unwrap(), taxa)
}

/// Basic smoke test that the API works.
#[test]
fn smoke_test() {
    let (tree, taxa) = cherries_fixture(None);
    let report = CladeShift::quick().run(&tree, &taxa).unwrap();

    assert!(report.test.p_value >= 0.0);
    assert!(report.test.p_value <= 1.0);
    assert_eq!(
        report.bundle.num_normal() + report.bundle.num_change(),
        tree.num_tips()
    );
}

/// Present tips at changes are much larger, so the shift is detected.
#[test]
fn detects_shift_at_changes() {
    let (tree, taxa) = cherries_fixture(None);
    let report = CladeShift::new().seed(3).run(&tree, &taxa).unwrap();

    assert_eq!(report.bundle.num_change(), 10);
    assert_eq!(report.bundle.node_changes.len(), 10);
    assert!(report
        .bundle
        .change_labels
        .iter()
        .all(|label| label.ends_with('p')));
    assert!(report.test.observed < 0.0);
    assert!(report.test.p_value < 0.05, "p = {}", report.test.p_value);
    assert!(!report.test.expvar.contains(report.test.observed));
}

/// Test builder API.
#[test]
fn builder_api() {
    let shift = CladeShift::new()
        .method(Method::BranchLength(Rate::Fixed(0.5)))
        .replicates(300)
        .rarefaction(true)
        .rarefaction_draws(4)
        .seed(9)
        .pooling(Pooling::CladeSummary)
        .log_transform(false);

    let config = shift.config();
    assert_eq!(config.method, Method::BranchLength(Rate::Fixed(0.5)));
    assert_eq!(config.replicates, 300);
    assert!(config.rarefaction);
    assert_eq!(config.rarefaction_draws, 4);
    assert_eq!(config.seed, 9);
    assert_eq!(config.pooling, Pooling::CladeSummary);
    assert!(!config.log_transform);
}

/// Test convenience function.
#[test]
fn convenience_function() {
    let (tree, taxa) = cherries_fixture(Some(1.0));
    let report = analyze(&tree, &taxa, Method::Topology).unwrap();
    assert_eq!(report.test.replicates, 1_000);
    assert_eq!(report.method, Method::Topology);
}

#[test]
fn branch_length_method_end_to_end() {
    let (tree, taxa) = cherries_fixture(Some(1.0));
    let report = CladeShift::quick()
        .method(Method::BranchLength(Rate::MaximumLikelihood))
        .run(&tree, &taxa)
        .unwrap();

    let reconstruction = report.reconstruction.as_ref().unwrap();
    assert!(reconstruction.rate > 0.0);
    assert!(reconstruction.log_likelihood < 0.0);
    assert_eq!(report.node_states[tree.root()], State::Absent);
    assert_eq!(report.bundle.num_change(), 10);
}

#[test]
fn branch_length_method_requires_lengths() {
    let (tree, taxa) = cherries_fixture(None);
    let result = CladeShift::quick()
        .method(Method::BranchLength(Rate::Fixed(1.0)))
        .run(&tree, &taxa);
    assert!(matches!(result, Err(Error::MissingBranchLength { .. })));

    // Topology ignores lengths
    assert!(CladeShift::quick().run(&tree, &taxa).is_ok());
}

#[test]
fn label_mismatch_reports_both_sides() {
    let (tree, mut taxa) = cherries_fixture(None);
    taxa.retain(|t| t.label != "free3");
    taxa.push(Taxon::new("stranger", 1.0, State::Absent));

    match CladeShift::quick().run(&tree, &taxa) {
        Err(Error::LabelMismatch {
            missing_in_data,
            missing_in_tree,
        }) => {
            assert_eq!(missing_in_data, vec!["free3".to_string()]);
            assert_eq!(missing_in_tree, vec!["stranger".to_string()]);
        }
        other => panic!("expected LabelMismatch, got {other:?}"),
    }
}

#[test]
fn same_seed_same_report() {
    let (tree, taxa) = cherries_fixture(None);
    let shift = CladeShift::quick().seed(1234).rarefaction(true);
    let a = shift.run(&tree, &taxa).unwrap();
    let b = shift.run(&tree, &taxa).unwrap();

    assert_eq!(a.test, b.test);
    assert_eq!(a.bundle, b.bundle);
    assert_eq!(a.distribution, b.distribution);
}

#[test]
fn rarefaction_full_size_reproduces_p_value() {
    let (tree, taxa) = cherries_fixture(None);
    let report = CladeShift::quick()
        .rarefaction(true)
        .run(&tree, &taxa)
        .unwrap();

    let curve = report.test.rarefaction.as_ref().unwrap();
    assert_eq!(curve.len(), report.test.subset_size);
    let full = curve.last().unwrap();
    assert!(full.p_values.iter().all(|&p| p == report.test.p_value));

    // Small subsets carry less evidence than the full one
    assert!(curve[0].median_p_value >= full.median_p_value);
}

#[test]
fn clade_summary_pooling_end_to_end() {
    let (tree, taxa) = cherries_fixture(None);
    let report = CladeShift::quick()
        .pooling(Pooling::CladeSummary)
        .run(&tree, &taxa)
        .unwrap();

    // One clade: one normal summary and one change summary
    assert_eq!(report.distribution.len(), 2);
    assert_eq!(report.subset_indices, vec![1]);
}

#[test]
fn with_config_matches_builder() {
    let (tree, taxa) = cherries_fixture(None);
    let config = Config {
        replicates: 150,
        seed: 77,
        ..Config::default()
    };
    let a = CladeShift::with_config(config).run(&tree, &taxa).unwrap();
    let b = CladeShift::new()
        .replicates(150)
        .seed(77)
        .run(&tree, &taxa)
        .unwrap();
    assert_eq!(a.test, b.test);
}

#[test]
fn report_outputs() {
    let (tree, taxa) = cherries_fixture(None);
    let report = CladeShift::quick().run(&tree, &taxa).unwrap();

    let json = to_json(&report).unwrap();
    assert!(json.contains("\"normal.val\""));
    assert!(json.contains("\"p_value\""));

    let text = format_report(&report);
    assert!(text.contains("clade-shift"));
    assert!(text.contains("Method: topology"));
}
