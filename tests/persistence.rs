use std::fs;
use std::io;
use std::path::Path;

use egui::{Color32, Pos2};
use sketchdeck::render::LineStyle;
use sketchdeck::session::{Recovery, Session, SessionError, SessionManager, TEMP_PREFIX};
use sketchdeck::stroke::{LineStroke, StrokeAttrs};
use sketchdeck::AppConfig;

fn manager(base: &Path) -> SessionManager {
    SessionManager::new(&AppConfig::with_base_dir(base))
}

fn temp_files(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(TEMP_PREFIX))
        .collect()
}

fn session_with_line() -> Session {
    let mut session = Session::new();
    session.active_document_mut().layers_mut().add_stroke_to_active(
        LineStroke::new(
            Pos2::new(0.0, 0.0),
            Pos2::new(50.0, 50.0),
            StrokeAttrs::new(Color32::RED, 2.0, LineStyle::Solid),
        )
        .into(),
    );
    session
}

#[test]
fn test_interrupted_save_keeps_previous_file() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(dir.path());
    let target = manager.sessions_dir().join("drawing.sdm");

    let first = Session::new();
    manager.save(&first, &target).unwrap();
    let before = fs::read(&target).unwrap();

    let result = manager.save_with(&session_with_line(), &target, |_| {
        Err(io::Error::other("simulated crash before replace"))
    });
    assert!(matches!(result, Err(SessionError::Io(_))));
    assert_eq!(fs::read(&target).unwrap(), before);
    assert!(temp_files(manager.sessions_dir()).is_empty());
    assert!(!manager.is_saving());

    assert_eq!(manager.load(&target).unwrap(), first);
}

#[test]
fn test_interrupted_first_save_leaves_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(dir.path());
    let target = manager.sessions_dir().join("new.sdm");

    let result = manager.save_with(&session_with_line(), &target, |_| Err(io::Error::other("crash")));
    assert!(result.is_err());
    assert!(!target.exists());
    assert!(temp_files(manager.sessions_dir()).is_empty());
}

#[test]
fn test_corrupt_autosave_is_moved_aside() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(dir.path());
    fs::create_dir_all(manager.sessions_dir()).unwrap();
    fs::write(manager.autosave_path(), b"{\"version\": \"1.1\", \"tabs\": [").unwrap();

    let warning = match manager.recover_auto_save() {
        Recovery::Corrupt { backup, warning } => {
            let backup = backup.expect("corrupt file should be renamed");
            assert!(backup.exists());
            let name = backup.file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.starts_with("auto_save.sdm.corrupt_"), "{name}");
            warning
        }
        other => panic!("expected corrupt recovery, got {other:?}"),
    };
    assert!(!warning.is_empty());
    assert!(!manager.autosave_path().exists());

    // A second start finds nothing to recover.
    assert!(matches!(manager.recover_auto_save(), Recovery::None));
}

#[test]
fn test_autosave_with_unknown_stroke_counts_as_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(dir.path());
    fs::create_dir_all(manager.sessions_dir()).unwrap();
    let text = r#"{"version": "1.1", "tabs": [{"name": "t", "layers": {"order": ["a"], "active_layer": "a",
        "layers": [{"id": "a", "name": "A", "strokes": [{"type": "hexagon"}]}]}}]}"#;
    fs::write(manager.autosave_path(), text).unwrap();

    assert!(matches!(manager.recover_auto_save(), Recovery::Corrupt { .. }));
    assert!(!manager.autosave_path().exists());
}

#[test]
fn test_autosave_restores_session() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(dir.path());
    let session = session_with_line();
    manager.auto_save(&session).unwrap();

    match manager.recover_auto_save() {
        Recovery::Loaded(restored) => assert_eq!(restored, session),
        other => panic!("expected a loaded session, got {other:?}"),
    }
}
