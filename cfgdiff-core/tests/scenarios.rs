use std::fs;
use std::path::PathBuf;

use cfgdiff_core::{ConflictKind, ConflictPolicy, Config, Format, Node, PatchError, PatchMode};
use pretty_assertions::assert_eq;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn loaded(format: Format, path: &str) -> Config {
    let mut config = Config::new(format, fixture(path));
    config.load().expect("fixture should load");
    config
}

/// Diff `from` against `to` and replay the changes onto `custom`.
fn upgrade(format: Format, from: &str, to: &str, custom: &str, policy: &ConflictPolicy) -> Config {
    let old = loaded(format, from);
    let new = loaded(format, to);
    let operations = old.diff(&new).expect("diff").expect("releases differ");
    let mut target = loaded(format, custom);
    target.patch(&operations, policy).expect("patch");
    target
}

#[test]
fn customized_oned_conf_keeps_local_changes() {
    let upgraded = upgrade(
        Format::OneConf,
        "fixtures/one/oned.conf-5.4",
        "fixtures/one/oned.conf-5.8",
        "fixtures/one/oned.conf-custom",
        &ConflictPolicy::new(),
    );
    let expected = fs::read_to_string(fixture("fixtures/one/oned.conf-expected"))
        .expect("expected output should be readable");
    assert_eq!(upgraded.render().expect("render"), expected);
}

#[test]
fn customized_kvmrc_gets_new_variables_in_place() {
    let upgraded = upgrade(
        Format::Shell,
        "fixtures/shell/kvmrc-5.4",
        "fixtures/shell/kvmrc-5.8",
        "fixtures/shell/kvmrc-custom",
        &ConflictPolicy::new().with(PatchMode::Skip),
    );
    let expected = fs::read_to_string(fixture("fixtures/shell/kvmrc-expected"))
        .expect("expected output should be readable");
    assert_eq!(upgraded.render().expect("render"), expected);
}

#[test]
fn chained_upgrade_matches_a_direct_one() {
    let mut chained = loaded(Format::OneConf, "fixtures/one/oned.conf-custom");
    for (from, to) in [
        ("fixtures/one/oned.conf-5.4", "fixtures/one/oned.conf-5.6"),
        ("fixtures/one/oned.conf-5.6", "fixtures/one/oned.conf-5.8"),
    ] {
        let operations = loaded(Format::OneConf, from)
            .diff(&loaded(Format::OneConf, to))
            .expect("diff")
            .expect("releases differ");
        chained
            .patch(&operations, &ConflictPolicy::new())
            .expect("patch");
    }

    let direct = upgrade(
        Format::OneConf,
        "fixtures/one/oned.conf-5.4",
        "fixtures/one/oned.conf-5.8",
        "fixtures/one/oned.conf-custom",
        &ConflictPolicy::new(),
    );
    assert!(chained.similar(&direct));
}

#[test]
fn list_insert_without_its_predecessor_falls_back_to_the_end() {
    let upgraded = upgrade(
        Format::Yaml,
        "fixtures/yaml/sunstone-5.4.yaml",
        "fixtures/yaml/sunstone-5.8.yaml",
        "fixtures/yaml/sunstone-custom.yaml",
        &ConflictPolicy::new(),
    );
    let tree = upgraded
        .content()
        .and_then(|content| content.as_tree())
        .expect("tree");

    let routes: Vec<String> = tree
        .get(":routes")
        .and_then(Node::as_list)
        .map(|list| list.items.iter().filter_map(Node::text).collect())
        .expect("routes");
    assert_eq!(routes, vec!["oneflow", "support"]);
    assert_eq!(tree.get(":host").and_then(Node::text).as_deref(), Some("0.0.0.0"));
    assert_eq!(tree.get(":sessions").and_then(Node::text).as_deref(), Some("memcache"));
    assert_eq!(
        tree.get(":memcache_host").and_then(Node::text).as_deref(),
        Some("localhost")
    );
}

#[test]
fn list_insert_without_its_predecessor_is_skipped_on_request() {
    let old = loaded(Format::Yaml, "fixtures/yaml/sunstone-5.4.yaml");
    let new = loaded(Format::Yaml, "fixtures/yaml/sunstone-5.8.yaml");
    let operations = old.diff(&new).expect("diff").expect("releases differ");

    let mut target = loaded(Format::Yaml, "fixtures/yaml/sunstone-custom.yaml");
    let report = target
        .patch(&operations, &ConflictPolicy::new().with(PatchMode::Skip))
        .expect("skip");
    let skipped: Vec<_> = report.skipped().collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].path.to_string(), ":routes[2]");
    assert_eq!(
        skipped[0].conflict.as_ref().map(PatchError::kind),
        Some(ConflictKind::PathNotFound)
    );

    let mut forced = loaded(Format::Yaml, "fixtures/yaml/sunstone-custom.yaml");
    let err = forced
        .patch(&operations, &ConflictPolicy::new().with(PatchMode::Force))
        .expect_err("force cannot place the element");
    assert!(err.to_string().contains(":routes[2]"), "{err}");
}

#[test]
fn text_hunks_apply_to_a_shifted_file() {
    let upgraded = upgrade(
        Format::Text,
        "fixtures/text/motd-5.4",
        "fixtures/text/motd-5.8",
        "fixtures/text/motd-custom",
        &ConflictPolicy::new(),
    );
    let text = upgraded.render().expect("render");
    assert!(text.starts_with("ACME Corp private cloud\n"));
    assert!(text.contains("https://docs.example.org/5.8"));
    assert!(!text.contains("https://docs.example.org/5.4"));
}

#[test]
fn saved_upgrade_reloads_to_the_same_tree() {
    let upgraded = upgrade(
        Format::OneConf,
        "fixtures/one/oned.conf-5.4",
        "fixtures/one/oned.conf-5.8",
        "fixtures/one/oned.conf-custom",
        &ConflictPolicy::new(),
    );
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let out = dir.path().join("oned.conf");
    upgraded.save_to(&out).expect("save");

    let mut reloaded = Config::new(Format::OneConf, &out);
    reloaded.load().expect("reload");
    assert!(reloaded.similar(&upgraded));
}
