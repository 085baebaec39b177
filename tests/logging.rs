//! Logging facility behaviour through the public API.

use documentor::logging::{LogSettings, LoggingManager};

#[test]
fn file_rotates_past_five_mib() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("logs").join("app.log");
    let logger = LoggingManager::new()
        .initialize(&LogSettings::new("RotationTest", &path).console(false))
        .unwrap();

    let line = "x".repeat(1024 * 1024);
    for _ in 0..6 {
        logger.info(&line);
    }

    let primary = std::fs::metadata(&path).unwrap().len();
    assert!(primary <= 5 * 1024 * 1024, "primary file is {} bytes", primary);
    assert!(tmp.path().join("logs").join("app.log.1").exists());
    assert!(!tmp.path().join("logs").join("app.log.6").exists());
}

#[test]
fn second_initialization_reuses_the_first_logger() {
    let tmp = tempfile::TempDir::new().unwrap();
    let manager = LoggingManager::new();
    assert!(manager.get_logger().is_err());

    let first = manager
        .initialize(&LogSettings::new("First", tmp.path().join("first.log")).console(false))
        .unwrap();
    let second = manager
        .initialize(&LogSettings::new("Second", tmp.path().join("second.log")).console(false))
        .unwrap();

    assert_eq!(second.name(), "First");
    assert_eq!(second.file_path(), first.file_path());
    assert!(!tmp.path().join("second.log").exists());
    assert_eq!(manager.get_logger().unwrap().name(), "First");
}

#[test]
fn rotation_settings_are_honoured() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("small.log");
    let logger = LoggingManager::new()
        .initialize(
            &LogSettings::new("SmallTest", &path)
                .console(false)
                .rotation(256, 2),
        )
        .unwrap();

    for i in 0..20 {
        logger.info(format!("entry {} {}", i, "y".repeat(100)));
    }

    assert!(std::fs::metadata(&path).unwrap().len() <= 256);
    assert!(tmp.path().join("small.log.2").exists());
    assert!(!tmp.path().join("small.log.3").exists());
    let newest = std::fs::read_to_string(&path).unwrap();
    assert!(newest.contains("entry 19"));
}
