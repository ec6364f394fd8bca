//! Contract tests for the capture manifest JSON shape

use tempfile::TempDir;
use wmig::io::manifest::{build_manifest, manifest_path, read_manifest, write_manifest};
use wmig::models::MANIFEST_VERSION;

#[test]
fn test_manifest_json_field_names_are_stable() {
    let manifest = build_manifest("WKS-0042", vec!["/ui:DOMAIN\\alice".to_string()]);
    let json = serde_json::to_value(&manifest).unwrap();

    assert_eq!(json.get("version").unwrap(), MANIFEST_VERSION);
    assert!(json.get("generatedAt").is_some());
    assert_eq!(json.get("sourceComputer").unwrap(), "WKS-0042");
    assert!(json.get("identities").unwrap().is_array());
}

#[test]
fn test_manifest_round_trip_preserves_identity_order() {
    let tmp = TempDir::new().unwrap();
    let store = tmp.path().join("store");

    let identities = vec!["/ui:DOMAIN\\alice".to_string(), "/all".to_string()];
    let manifest = build_manifest("WKS-0042", identities.clone());
    write_manifest(&store, &manifest).unwrap();

    let loaded = read_manifest(&store).unwrap();
    assert_eq!(loaded.identities, identities);
    assert_eq!(loaded.source_computer, "WKS-0042");
    assert_eq!(loaded.version, MANIFEST_VERSION);
}

#[test]
fn test_new_capture_overwrites_previous_manifest() {
    let tmp = TempDir::new().unwrap();
    let store = tmp.path().join("store");

    write_manifest(&store, &build_manifest("WKS-1", vec!["/all".to_string()])).unwrap();
    write_manifest(
        &store,
        &build_manifest("WKS-1", vec!["/ui:DOMAIN\\bob".to_string()]),
    )
    .unwrap();

    let loaded = read_manifest(&store).unwrap();
    assert_eq!(loaded.identities, ["/ui:DOMAIN\\bob"]);
}

#[test]
fn test_malformed_manifest_is_reported() {
    let tmp = TempDir::new().unwrap();
    let store = tmp.path().join("store");
    std::fs::create_dir_all(&store).unwrap();
    std::fs::write(manifest_path(&store), b"[1,2,3]").unwrap();

    let err = read_manifest(&store).unwrap_err();
    assert!(matches!(err, wmig::Error::Malformed(_)), "got {err:?}");
}

#[test]
fn test_future_manifest_version_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let store = tmp.path().join("store");
    std::fs::create_dir_all(&store).unwrap();
    let raw = format!(
        r#"{{"version": {}, "generatedAt": "x", "sourceComputer": "y", "identities": []}}"#,
        MANIFEST_VERSION + 1
    );
    std::fs::write(manifest_path(&store), raw).unwrap();

    let err = read_manifest(&store).unwrap_err();
    assert!(matches!(err, wmig::Error::Malformed(_)), "got {err:?}");
}
