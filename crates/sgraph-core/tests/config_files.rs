#![forbid(unsafe_code)]
#![cfg(feature = "viewer-config")]

//! Loading viewer configuration from disk.

use std::io::Write;

use sgraph_core::{ViewerConfig, ViewerConfigError};
use sgraph_harness::SceneFixture;

fn write_config(text: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn file_config_drives_viewer() {
    let file = write_config(
        "verify_invariants = true\nrefresh_on_attach = false\nmax_dispatch_depth = 8\n",
    );
    let config = ViewerConfig::from_toml_file(file.path()).unwrap();
    assert_eq!(
        config,
        ViewerConfig::default()
            .with_verify_invariants(true)
            .with_refresh_on_attach(false)
            .with_max_dispatch_depth(8)
    );

    let mut fixture = SceneFixture::with_config(config).unwrap();
    fixture.viewer.activate().unwrap();
    let root = fixture.root();
    let (_, part) = fixture.attach_content(root, "a").unwrap();
    assert_eq!(fixture.viewer.part(part).unwrap().refresh_count(), 0);
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ViewerConfig::from_toml_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ViewerConfigError::Io(_)));
}

#[test]
fn malformed_file_is_toml_error() {
    let file = write_config("max_dispatch_depth = \"deep\"\n");
    let err = ViewerConfig::from_toml_file(file.path()).unwrap_err();
    assert!(matches!(err, ViewerConfigError::Toml(_)));
    assert!(err.to_string().starts_with("TOML parse error"));
}

#[test]
fn invalid_file_is_validation_error() {
    let file = write_config("max_dispatch_depth = 0\n");
    let err = ViewerConfig::from_toml_file(file.path()).unwrap_err();
    assert!(matches!(err, ViewerConfigError::Validation(ref errors) if errors.len() == 1));
}
