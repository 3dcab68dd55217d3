//! End-to-end test of the gui2tree binary: detection JSON in, layout
//! tree JSON out.

use std::process::Command;

#[test]
fn test_contact_rows_fixture_becomes_one_list() {
    let fixture = concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/contact_rows.json"
    );
    let output = Command::new(env!("CARGO_BIN_EXE_gui2tree"))
        .arg(fixture)
        .output()
        .expect("failed to run gui2tree");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let tree: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let nodes = tree.as_array().unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0]["class"], "List");
    assert_eq!(nodes[0]["list_class"], "multi");
    assert_eq!(nodes[0]["list_alignment"], "v");
    let items = nodes[0]["list_items"].as_array().unwrap();
    assert_eq!(items.len(), 3);
    for item in items {
        assert_eq!(item.as_array().unwrap().len(), 2);
    }
    assert_eq!(items[0][1]["text_content"], "Alice Appleseed");
}

#[test]
fn test_missing_file_reports_an_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_gui2tree"))
        .arg("no_such_detection.json")
        .output()
        .expect("failed to run gui2tree");
    assert!(!output.status.success());
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("not found"),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}
