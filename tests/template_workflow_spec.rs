use convert_skeleton_json::runtime::Scene;
use convert_skeleton_json::session::Session;
use convert_skeleton_json::templates::TemplateStore;
use convert_skeleton_json::Error;
use std::fs;
use tempfile::TempDir;

const ORIENTATION: &str = r#"[{"name": "Head", "axis": "x", "angle": 90}]"#;
const CREATION: &str = r#"[
    {"name": "ik_hand_root", "parent_root": true, "head": [0, 0, 0], "tail": [0, 0.5, 0]},
    {"name": "ik_hand_l", "source_bone": "Head", "parent_bone": "ik_hand_root", "tail": [0, 0, 0.1]}
]"#;
const SCENE: &str = r#"{"object": [
    {"type": "Armature", "name": "rig", "bone": [
        {"name": "neck", "head": [0, 0, 0.8], "tail": [0, 0, 1]},
        {"name": "Head", "parent": "neck", "head": [0, 0, 1], "tail": [0, 0, 1.2], "useConnect": true}
    ]}
]}"#;

fn setup() -> (TempDir, Session) {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let store = TemplateStore::new(temp.path().join("templates"));
    let mut session = Session::with_store(store);
    let name = session.create_template("Game Rig").expect("Failed to create template");
    let folder = session.store().template_path(&name).expect("Failed to resolve template");
    fs::write(folder.join("orientation.json"), ORIENTATION).expect("Failed to write orientation");
    fs::write(folder.join("creation.json"), CREATION).expect("Failed to write creation");
    (temp, session)
}

mod archives {
    use super::*;

    #[test]
    fn export_then_import_restores_the_rules() {
        let (temp, mut session) = setup();
        let exported = session
            .export_template(&temp.path().join("Shared Rig.ZIP"))
            .expect("Failed to export");
        assert_eq!(exported.file_name().and_then(|it| it.to_str()), Some("Shared Rig.ZIP"));

        let imported = session.import_template(&exported).expect("Failed to import");
        assert_eq!(imported, "shared_rig");
        assert_eq!(session.selected_template(), "shared_rig");

        let store = session.store();
        assert_eq!(
            store.load_orientation_rules("shared_rig").unwrap(),
            store.load_orientation_rules("game_rig").unwrap()
        );
        assert_eq!(
            store.load_creation_rules("shared_rig").unwrap(),
            store.load_creation_rules("game_rig").unwrap()
        );
    }

    #[test]
    fn export_appends_zip_extension() {
        let (temp, session) = setup();
        let exported = session
            .export_template(&temp.path().join("bundle.tar"))
            .expect("Failed to export");
        assert_eq!(exported, temp.path().join("bundle.tar.zip"));
        assert!(exported.is_file());
    }

    #[test]
    fn export_of_unknown_template_fails() {
        let (temp, session) = setup();
        let err = session
            .store()
            .export_archive("ghost", &temp.path().join("ghost.zip"))
            .unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound(_)));
    }

    #[test]
    fn import_of_garbage_is_an_archive_error() {
        let (temp, mut session) = setup();
        let path = temp.path().join("broken.zip");
        fs::write(&path, b"not a zip").unwrap();
        let err = session.import_template(&path).unwrap_err();
        assert!(matches!(err, Error::Archive { .. }));
    }
}

mod conversion {
    use super::*;

    #[test]
    fn converts_selected_skeleton() {
        let (_temp, mut session) = setup();
        let mut scene = Scene::load(SCENE.as_bytes()).unwrap();
        session.set_source_skeleton("rig");

        let report = session.convert(&mut scene).expect("Failed to convert");
        assert_eq!(report.template, "game_rig");
        assert_eq!(report.reoriented, 1);
        assert_eq!(report.created, vec!["ik_hand_root".to_string(), "ik_hand_l".to_string()]);

        let rig = scene.armature("rig").unwrap();
        let head = rig.bone_named("Head").unwrap();
        assert!((head.tail.y + 0.2).abs() < 1.0e-5);
        assert!((head.tail.z - 1.0).abs() < 1.0e-5);

        let ik_hand = rig.get_bone_by_name("ik_hand_l").unwrap();
        assert_eq!(rig.parent_name(ik_hand), Some("ik_hand_root"));
        assert_eq!(rig.bones()[ik_hand].head, head.head);
        assert!(rig.bones()[ik_hand].use_connect);
    }

    #[test]
    fn unknown_skeleton_is_reported() {
        let (_temp, mut session) = setup();
        let mut scene = Scene::load(SCENE.as_bytes()).unwrap();
        session.set_source_skeleton("Armature");
        let err = session.convert(&mut scene).unwrap_err();
        assert!(matches!(err, Error::SkeletonNotFound(_)));
    }
}
