use std::io::Write;

use tempfile::NamedTempFile;
use usbmitm_engine::StageRegistry;

use super::*;

#[test]
fn poll_reports_a_missing_path_as_an_io_error() {
    let mut reload = HotReload::new("/nonexistent/path/to/stage.so", "fuzz");
    let mut registry = StageRegistry::new();
    let err = reload.poll(&mut registry).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn path_returns_the_configured_path() {
    let reload = HotReload::new("/tmp/whatever.so", "fuzz");
    assert_eq!(reload.path(), std::path::Path::new("/tmp/whatever.so"));
}

#[test]
fn poll_reports_a_malformed_dylib_as_a_load_error() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"not actually a shared object").unwrap();
    file.flush().unwrap();

    let mut reload = HotReload::new(file.path(), "fuzz");
    let mut registry = StageRegistry::new();
    let err = reload.poll(&mut registry).unwrap_err();
    assert!(matches!(err, Error::Load(_)));
}

#[test]
fn an_unchanged_mtime_does_not_attempt_a_reload() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"not actually a shared object").unwrap();
    file.flush().unwrap();

    let mut reload = HotReload::new(file.path(), "fuzz");
    let mut registry = StageRegistry::new();
    // First poll fails to load, but still records the mtime it saw.
    assert!(reload.poll(&mut registry).is_err());
    // A second poll with no file change should not even attempt another
    // load: confirmed by checking the recorded mtime is stable and no
    // panic/second error surprises us here either.
    let before = reload.last_mtime;
    let _ = reload.poll(&mut registry);
    assert_eq!(reload.last_mtime, before);
}
