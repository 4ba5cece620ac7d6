//! Model discovery and import-graph resolution tests

use std::fs;
use std::path::PathBuf;

use fom_core::manager::{FomManager, ManagerError};
use serde_json::json;
use tempfile::TempDir;

fn write_document(dir: &TempDir, relative: &str, document: &serde_json::Value) -> PathBuf {
    let path = dir.path().join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, serde_json::to_string_pretty(document).unwrap()).unwrap();
    path
}

mod discovery_tests {
    use super::*;

    #[test]
    fn test_find_foms_bare_files_and_directories() {
        let dir = TempDir::new().unwrap();
        write_document(&dir, "morphology.json", &json!({"fom_name": "morphology"}));
        write_document(&dir, "axon/axon.json", &json!({"fom_name": "axon"}));

        let foms = FomManager::find_foms(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(foms.len(), 2);
        assert!(foms["morphology"].ends_with("morphology.json"));
        assert!(foms["axon"].ends_with("axon/axon.json"));
    }

    #[test]
    fn test_find_foms_yaml_documents() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("shared.yaml"), "fom_name: shared\n").unwrap();

        let foms = FomManager::find_foms(&[dir.path().to_path_buf()]).unwrap();
        assert!(foms.contains_key("shared"));
    }

    #[test]
    fn test_find_foms_missing_name_is_fatal() {
        let dir = TempDir::new().unwrap();
        write_document(&dir, "anonymous.json", &json!({"formats": {}}));

        let err = FomManager::find_foms(&[dir.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, ManagerError::MissingFomName { .. }));
    }

    #[test]
    fn test_find_foms_first_found_wins() {
        // The same fom_name on two search paths: the earlier path's document
        // keeps the mapping, the later one is silently shadowed.
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_document(&first, "shared.json", &json!({"fom_name": "shared", "formats": {"A": "a"}}));
        write_document(&second, "shared.json", &json!({"fom_name": "shared", "formats": {"B": "b"}}));

        let foms = FomManager::find_foms(&[
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ])
        .unwrap();
        assert_eq!(foms["shared"], first.path().join("shared.json"));
    }

    #[test]
    fn test_find_foms_skips_missing_search_path() {
        let dir = TempDir::new().unwrap();
        write_document(&dir, "m.json", &json!({"fom_name": "m"}));

        let foms = FomManager::find_foms(&[
            PathBuf::from("/nonexistent/foms"),
            dir.path().to_path_buf(),
        ])
        .unwrap();
        assert!(foms.contains_key("m"));
    }
}

mod loading_tests {
    use super::*;

    fn manager_with_base_and_child(dir: &TempDir) -> FomManager {
        write_document(
            dir,
            "base.json",
            &json!({
                "fom_name": "base",
                "formats": {"NIFTI": "nii"},
                "attribute_definitions": {"side": {"values": ["left", "right"]}},
                "patterns": {"raw": [["data/<subject>/raw", "NIFTI"]]}
            }),
        );
        write_document(
            dir,
            "child.json",
            &json!({
                "fom_name": "child",
                "fom_import": ["base"],
                "patterns": {"seg": [["data/<subject>/seg", "NIFTI"]]}
            }),
        );
        FomManager::new(vec![dir.path().to_path_buf()]).unwrap()
    }

    #[test]
    fn test_load_foms_resolves_transitive_imports() {
        let dir = TempDir::new().unwrap();
        let manager = manager_with_base_and_child(&dir);

        let model = manager.load_foms(&["child"]).unwrap();
        assert_eq!(model.fom_names, ["child", "base"]);
        // Dependency rules come first in the flat list.
        assert_eq!(model.rules().len(), 2);
        assert_eq!(model.rules()[0].attributes["fom_name"], "base");
        assert_eq!(model.rules()[1].attributes["fom_name"], "child");
    }

    #[test]
    fn test_load_foms_unknown_name() {
        let dir = TempDir::new().unwrap();
        let manager = FomManager::new(vec![dir.path().to_path_buf()]).unwrap();
        let err = manager.load_foms(&["missing"]).unwrap_err();
        assert!(matches!(err, ManagerError::UnknownFom(name) if name == "missing"));
    }

    #[test]
    fn test_loaded_model_merges_schemas() {
        let dir = TempDir::new().unwrap();
        let manager = manager_with_base_and_child(&dir);
        let model = manager.load_foms(&["child"]).unwrap();
        assert!(model.attribute_definitions["side"].has_declared_values);
        assert_eq!(model.format_extension("NIFTI"), Some("nii"));
    }
}

mod read_definition_tests {
    use super::*;

    #[test]
    fn test_sections_deep_merge_child_wins_on_scalars() {
        let dir = TempDir::new().unwrap();
        write_document(
            &dir,
            "base.json",
            &json!({
                "fom_name": "base",
                "formats": {"NIFTI": "nii", "GIS": "ima"}
            }),
        );
        write_document(
            &dir,
            "child.json",
            &json!({
                "fom_name": "child",
                "fom_import": ["base"],
                "formats": {"NIFTI": "nii.gz"}
            }),
        );
        let manager = FomManager::new(vec![dir.path().to_path_buf()]).unwrap();

        let merged = manager.read_definition("child").unwrap();
        assert_eq!(merged["fom_name"], "child");
        assert_eq!(merged["formats"]["NIFTI"], "nii.gz");
        assert_eq!(merged["formats"]["GIS"], "ima");
        assert!(merged.get("fom_import").is_none());
    }

    #[test]
    fn test_rules_concatenate_ancestors_first() {
        let dir = TempDir::new().unwrap();
        write_document(
            &dir,
            "base.json",
            &json!({"fom_name": "base", "rules": [["base_rule", "A"]]}),
        );
        write_document(
            &dir,
            "child.json",
            &json!({
                "fom_name": "child",
                "fom_import": ["base"],
                "rules": [["child_rule", "A"]]
            }),
        );
        let manager = FomManager::new(vec![dir.path().to_path_buf()]).unwrap();

        let merged = manager.read_definition("child").unwrap();
        let rules = merged["rules"].as_array().unwrap();
        assert_eq!(rules[0][0], "base_rule");
        assert_eq!(rules[1][0], "child_rule");
    }

    #[test]
    fn test_shape_mismatch_is_fatal() {
        let dir = TempDir::new().unwrap();
        write_document(
            &dir,
            "base.json",
            &json!({"fom_name": "base", "patterns": {"t1": {"raw": [["x", "A"]]}}}),
        );
        write_document(
            &dir,
            "child.json",
            &json!({
                "fom_name": "child",
                "fom_import": ["base"],
                "patterns": {"t1": "not_a_mapping"}
            }),
        );
        let manager = FomManager::new(vec![dir.path().to_path_buf()]).unwrap();

        let err = manager.read_definition("child").unwrap_err();
        assert!(matches!(err, ManagerError::MergeConflict { key } if key == "t1"));
    }
}
