use std::path::PathBuf;

use cfgdiff_core::{
    parse, ConflictKind, ConflictPolicy, Config, ConfigError, Format, Node, PatchError,
    PatchMode, Status,
};
use pretty_assertions::assert_eq;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn inline(format: Format, text: &str) -> Config {
    let content = parse(format, text).expect("inline content should parse");
    Config::from_content(format, content)
}

fn loaded(format: Format, path: &str) -> Config {
    let mut config = Config::new(format, fixture(path));
    config.load().expect("fixture should load");
    config
}

fn value_at(config: &Config, keys: &[&str]) -> Option<String> {
    config
        .content()
        .and_then(|content| content.as_tree())
        .and_then(|tree| tree.get_path(keys))
        .and_then(Node::text)
}

const OLD: &str = "LOG = [ SYSTEM = \"file\", DEBUG_LEVEL = 2 ]\nPORT = 2633\n";
const NEW: &str = "LOG = [ SYSTEM = \"file\", DEBUG_LEVEL = 3 ]\nPORT = 2634\n";
const CUSTOM: &str = "LOG = [ SYSTEM = \"file\", DEBUG_LEVEL = 5 ]\nPORT = 2633\n";

fn release_operations() -> Vec<cfgdiff_core::EditOperation> {
    let old = inline(Format::OneConf, OLD);
    let new = inline(Format::OneConf, NEW);
    old.diff(&new).expect("diff").expect("releases differ")
}

#[test]
fn skip_mode_reports_the_customized_value_and_patches_the_rest() {
    let operations = release_operations();
    let mut target = inline(Format::OneConf, CUSTOM);
    let policy = ConflictPolicy::new().with(PatchMode::Skip);

    let report = target.patch(&operations, &policy).expect("skip never fails on conflicts");

    let skipped: Vec<_> = report.skipped().collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].path.to_string(), "LOG/DEBUG_LEVEL");
    assert_eq!(
        skipped[0].conflict.as_ref().map(PatchError::kind),
        Some(ConflictKind::ValueNotFound)
    );
    assert_eq!(value_at(&target, &["LOG", "DEBUG_LEVEL"]).as_deref(), Some("5"));
    assert_eq!(value_at(&target, &["PORT"]).as_deref(), Some("2634"));
    assert!(matches!(
        report.check(),
        Err(PatchError::ValueNotFound { .. })
    ));
}

#[test]
fn default_mode_overrides_the_customized_value() {
    let operations = release_operations();
    let mut target = inline(Format::OneConf, CUSTOM);

    let report = target
        .patch(&operations, &ConflictPolicy::new())
        .expect("default mode resolves conflicts");

    assert_eq!(report.skipped().count(), 0);
    assert_eq!(value_at(&target, &["LOG", "DEBUG_LEVEL"]).as_deref(), Some("3"));
}

#[test]
fn force_mode_marks_resolved_conflicts() {
    let operations = release_operations();
    let mut target = inline(Format::OneConf, CUSTOM);
    let policy = ConflictPolicy::new().with(PatchMode::Force);

    let report = target.patch(&operations, &policy).expect("force");

    let forced: Vec<_> = report
        .entries
        .iter()
        .filter(|entry| entry.mode == Some(PatchMode::Force))
        .collect();
    assert_eq!(forced.len(), 1);
    assert_eq!(forced[0].status, Status::Applied);
    assert_eq!(value_at(&target, &["LOG", "DEBUG_LEVEL"]).as_deref(), Some("3"));
}

#[test]
fn dummy_mode_reports_without_touching_the_target() {
    let operations = release_operations();
    let policy = ConflictPolicy::new().with(PatchMode::Skip);

    let mut real = inline(Format::OneConf, CUSTOM);
    let expected = real.patch(&operations, &policy).expect("real run");

    let mut target = inline(Format::OneConf, CUSTOM);
    let before = target.render().expect("render");
    let report = target
        .patch(&operations, &policy.clone().with(PatchMode::Dummy))
        .expect("dummy run");

    assert_eq!(report, expected);
    assert_eq!(target.render().expect("render"), before);
}

#[test]
fn kind_mismatch_fails_unless_replacing() {
    let old = inline(Format::Yaml, "a:\n  x: 1\n");
    let new = inline(Format::Yaml, "a:\n  x: 2\n");
    let operations = old.diff(&new).expect("diff").expect("changes");

    for policy in [
        ConflictPolicy::new(),
        ConflictPolicy::new().with(PatchMode::Skip),
        ConflictPolicy::new().with(PatchMode::Force),
    ] {
        let mut target = inline(Format::Yaml, "a: [1, 2]\n");
        let err = target
            .patch(&operations, &policy)
            .expect_err("a list cannot take a map key");
        assert!(
            matches!(err, ConfigError::Patch(PatchError::ExpectedHash { .. })),
            "{policy}: {err}"
        );
    }

    let mut target = inline(Format::Yaml, "a: [1, 2]\n");
    let report = target
        .patch(&operations, &ConflictPolicy::new().with(PatchMode::Replace))
        .expect("replace reshapes the target");
    assert_eq!(report.entries[0].mode, Some(PatchMode::Replace));
    assert_eq!(value_at(&target, &["a", "x"]).as_deref(), Some("2"));
}

#[test]
fn replace_swaps_a_reshaped_list_wholesale() {
    let old = inline(Format::YamlStrict, "hosts:\n  - a\n  - b\n");
    let new = inline(Format::YamlStrict, "hosts: all\n");
    let operations = old.diff(&new).expect("diff").expect("changes");

    let mut target = inline(Format::YamlStrict, "hosts:\n  - a\n  - c\n");
    let report = target
        .patch(&operations, &ConflictPolicy::new().with(PatchMode::Replace))
        .expect("replace");
    assert!(report.changed());
    assert_eq!(value_at(&target, &["hosts"]).as_deref(), Some("all"));
}

#[test]
fn applying_the_same_patch_twice_changes_nothing_more() {
    let old = loaded(Format::OneConf, "fixtures/one/oned.conf-5.4");
    let new = loaded(Format::OneConf, "fixtures/one/oned.conf-5.8");
    let operations = old.diff(&new).expect("diff").expect("releases differ");

    let mut target = loaded(Format::OneConf, "fixtures/one/oned.conf-5.4");
    let first = target
        .patch(&operations, &ConflictPolicy::new())
        .expect("first run");
    assert!(first.changed());

    let rendered = target.render().expect("render");
    let second = target
        .patch(&operations, &ConflictPolicy::new())
        .expect("second run");
    assert!(!second.changed());
    assert_eq!(target.render().expect("render"), rendered);
}

#[test]
fn deleting_an_absent_key_is_quiet_unless_skipping() {
    let old = inline(Format::Shell, "A=1\nB=2\n");
    let new = inline(Format::Shell, "A=1\n");
    let operations = old.diff(&new).expect("diff").expect("changes");

    let mut target = inline(Format::Shell, "A=1\n");
    let report = target
        .patch(&operations, &ConflictPolicy::new())
        .expect("default");
    assert_eq!(report.entries[0].status, Status::Unchanged);

    let report = target
        .patch(&operations, &ConflictPolicy::new().with(PatchMode::Skip))
        .expect("skip");
    assert_eq!(
        report.first_conflict().map(PatchError::kind),
        Some(ConflictKind::PathNotFound)
    );
}

#[test]
fn inserting_over_different_data_is_unexpected() {
    let old = inline(Format::Shell, "A=1\n");
    let new = inline(Format::Shell, "A=1\nB=2\n");
    let operations = old.diff(&new).expect("diff").expect("changes");

    let mut target = inline(Format::Shell, "A=1\nB=7\n");
    let report = target
        .patch(&operations, &ConflictPolicy::new().with(PatchMode::Skip))
        .expect("skip");
    assert_eq!(
        report.first_conflict().map(PatchError::kind),
        Some(ConflictKind::UnexpectedData)
    );
    assert_eq!(value_at(&target, &["B"]).as_deref(), Some("7"));

    target
        .patch(&operations, &ConflictPolicy::new().with(PatchMode::Replace))
        .expect("replace");
    assert_eq!(value_at(&target, &["B"]).as_deref(), Some("2"));
}

#[test]
fn ambiguous_predicates_are_invalid_multiple() {
    let old = inline(
        Format::OneConf,
        "VM_MAD = [ NAME = \"kvm\", ARGS = \"a\" ]\nVM_MAD = [ NAME = \"lxd\", ARGS = \"b\" ]\n",
    );
    let new = inline(
        Format::OneConf,
        "VM_MAD = [ NAME = \"kvm\", ARGS = \"c\" ]\nVM_MAD = [ NAME = \"lxd\", ARGS = \"b\" ]\n",
    );
    let operations = old.diff(&new).expect("diff").expect("changes");

    let mut target = inline(
        Format::OneConf,
        "VM_MAD = [ NAME = \"kvm\", ARGS = \"a\" ]\nVM_MAD = [ NAME = \"kvm\", ARGS = \"z\" ]\n",
    );
    let report = target
        .patch(&operations, &ConflictPolicy::new().with(PatchMode::Skip))
        .expect("skip");
    assert_eq!(
        report.first_conflict().map(PatchError::kind),
        Some(ConflictKind::InvalidMultiple)
    );
}

#[test]
fn patch_turns_each_release_into_the_next() {
    let cases = [
        (Format::OneConf, "fixtures/one/oned.conf-5.4", "fixtures/one/oned.conf-5.6"),
        (Format::OneConf, "fixtures/one/oned.conf-5.6", "fixtures/one/oned.conf-5.8"),
        (Format::OneConf, "fixtures/one/oned.conf-5.4", "fixtures/one/oned.conf-5.8"),
        (Format::OneConf, "fixtures/one/oned.conf-5.8", "fixtures/one/oned.conf-5.4"),
        (Format::Shell, "fixtures/shell/kvmrc-5.4", "fixtures/shell/kvmrc-5.8"),
        (Format::Shell, "fixtures/shell/kvmrc-5.8", "fixtures/shell/kvmrc-5.4"),
        (Format::Yaml, "fixtures/yaml/sunstone-5.4.yaml", "fixtures/yaml/sunstone-5.8.yaml"),
        (Format::Yaml, "fixtures/yaml/sunstone-5.8.yaml", "fixtures/yaml/sunstone-5.4.yaml"),
        (Format::YamlStrict, "fixtures/yaml/sunstone-5.4.yaml", "fixtures/yaml/sunstone-5.8.yaml"),
        (Format::Text, "fixtures/text/motd-5.4", "fixtures/text/motd-5.8"),
    ];
    for (format, from, to) in cases {
        let old = loaded(format, from);
        let new = loaded(format, to);
        let operations = old.diff(&new).expect("diff").expect("releases differ");

        let mut target = loaded(format, from);
        target
            .patch(&operations, &ConflictPolicy::new().with(PatchMode::Skip))
            .and_then(|report| report.check().map_err(ConfigError::from))
            .unwrap_or_else(|err| panic!("{from} -> {to}: {err}"));
        assert!(target.similar(&new), "{from} -> {to} did not converge");
    }
}

#[test]
fn a_skipped_operation_leaves_a_reshaped_parent_untouched() {
    let original = "a: x\nk: 1\n";
    let mut target = inline(Format::Yaml, original);
    let operations = vec![cfgdiff_core::EditOperation::set(
        cfgdiff_core::Path::from_keys(&["a", "b", "c"]),
        Node::scalar("v"),
        Some(Node::scalar("old")),
    )];
    let policy = ConflictPolicy::new()
        .with(PatchMode::Skip)
        .with(PatchMode::Replace);

    let report = target.patch(&operations, &policy).expect("skip keeps going");

    assert_eq!(report.skipped().count(), 1);
    assert!(target.same(&inline(Format::Yaml, original)));
    assert_eq!(value_at(&target, &["a"]).as_deref(), Some("x"));
}

#[test]
fn strict_yaml_reorders_patch_back_to_the_same_tree() {
    let original = "a: 1\nb: 2\nc: 3\n";
    let cases = [
        (original, "c: 3\na: 1\nb: 2\n"),
        (original, "b: 2\nc: 3\na: 1\n"),
        (original, "c: 3\nb: 2\na: 1\n"),
        (original, "z: 0\nc: 3\na: 1\n"),
        ("x:\n  p: 1\n  q: 2\ny: 3\n", "y: 3\nx:\n  q: 2\n  p: 5\n"),
        ("l: [a, b, c]\nk: v\n", "k: v\nl: [c, a, b]\n"),
    ];
    for (from, to) in cases {
        let old = inline(Format::YamlStrict, from);
        let new = inline(Format::YamlStrict, to);
        assert!(!old.same(&new), "{from:?} and {to:?} should differ");
        let operations = old.diff(&new).expect("diff").expect("trees differ");

        let mut target = old.clone();
        let report = target
            .patch(&operations, &ConflictPolicy::new())
            .expect("patch applies");
        assert!(report.first_conflict().is_none(), "{from:?} -> {to:?}: {report:?}");
        assert!(target.same(&new), "{from:?} -> {to:?} did not reproduce the order");
    }
}

#[test]
fn strict_yaml_releases_patch_to_the_same_tree_both_ways() {
    let releases = [
        ("fixtures/yaml/sunstone-5.4.yaml", "fixtures/yaml/sunstone-5.8.yaml"),
        ("fixtures/yaml/sunstone-5.8.yaml", "fixtures/yaml/sunstone-5.4.yaml"),
    ];
    for (from, to) in releases {
        let old = loaded(Format::YamlStrict, from);
        let new = loaded(Format::YamlStrict, to);
        let operations = old.diff(&new).expect("diff").expect("releases differ");

        let mut target = loaded(Format::YamlStrict, from);
        target
            .patch(&operations, &ConflictPolicy::new().with(PatchMode::Skip))
            .and_then(|report| report.check().map_err(ConfigError::from))
            .unwrap_or_else(|err| panic!("{from} -> {to}: {err}"));
        assert!(target.same(&new), "{from} -> {to} is only similar");
    }
}
