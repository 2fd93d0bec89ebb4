use std::fs;
use std::path::PathBuf;

use cfgdiff_core::{parse, parse_file, same, write, write_file, Format, LoadError, ParseError};

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

#[test]
fn untouched_files_are_written_back_verbatim() {
    let cases = [
        (Format::OneConf, "fixtures/one/oned.conf-5.4"),
        (Format::OneConf, "fixtures/one/oned.conf-custom"),
        (Format::Shell, "fixtures/shell/kvmrc-5.8"),
        (Format::Shell, "fixtures/shell/kvmrc-custom"),
        (Format::Text, "fixtures/text/motd-custom"),
    ];
    for (format, name) in cases {
        let path = fixture(name);
        let source = fs::read_to_string(&path).expect("fixture should be readable");
        let content = parse_file(format, &path).expect("parse should succeed");
        let written = write(format, &content).expect("write should succeed");
        assert_eq!(written, source, "{name} should render unchanged");
    }
}

#[test]
fn yaml_survives_write_and_reparse() {
    for format in [Format::Yaml, Format::YamlStrict] {
        let first = parse_file(format, &fixture("fixtures/yaml/sunstone-5.8.yaml"))
            .expect("initial parse should succeed");
        let written = write(format, &first).expect("write should succeed");
        let second = parse(format, &written).expect("re-parse should succeed");
        assert!(
            same(
                first.as_tree().expect("tree"),
                second.as_tree().expect("tree")
            ),
            "{format} tree changed across a write"
        );
    }
}

#[test]
fn write_file_creates_parent_directories() {
    let source_path = fixture("fixtures/shell/kvmrc-5.4");
    let out_dir = tempfile::tempdir().expect("tempdir should be created");
    let out_path = out_dir.path().join("etc").join("vmm").join("kvmrc");

    let content = parse_file(Format::Shell, &source_path).expect("parse should succeed");
    write_file(Format::Shell, &content, &out_path).expect("write_file should succeed");

    assert_eq!(
        fs::read_to_string(&out_path).expect("output should exist"),
        fs::read_to_string(&source_path).expect("fixture should be readable")
    );
}

#[test]
fn empty_file_is_an_empty_tree() {
    let content = parse_file(Format::OneConf, &fixture("fixtures/one/empty"))
        .expect("empty file should parse");
    let tree = content.as_tree().expect("tree");
    assert!(tree.as_map().is_some_and(|map| map.is_empty()));
    assert_eq!(write(Format::OneConf, &content).expect("write"), "");
}

#[test]
fn invalid_files_report_their_path() {
    let cases = [
        (Format::OneConf, "fixtures/invalid/oned.conf-unclosed"),
        (Format::Shell, "fixtures/invalid/kvmrc-garbage"),
        (Format::Yaml, "fixtures/invalid/broken.yaml"),
    ];
    for (format, name) in cases {
        let path = fixture(name);
        let err = parse_file(format, &path).expect_err("invalid input should fail");
        assert!(matches!(err, LoadError::Parse { .. }), "{name}: {err}");
        assert_eq!(err.path(), path.as_path());
        let file_name = name.rsplit('/').next().unwrap_or(name);
        assert!(err.to_string().contains(file_name), "{err}");
    }
}

#[test]
fn missing_file_is_an_io_error() {
    let err = parse_file(Format::Shell, &fixture("fixtures/shell/does-not-exist"))
        .expect_err("missing file should fail");
    assert!(matches!(err, LoadError::Io { .. }));
}

#[test]
fn syntax_errors_carry_a_line_number() {
    let err = parse(Format::OneConf, "PORT = 2633\nLOG = [ SYSTEM = \"file\"\n")
        .expect_err("unterminated block");
    assert!(matches!(err, ParseError::Syntax { .. }), "{err}");
}
