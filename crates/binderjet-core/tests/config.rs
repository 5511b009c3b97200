use binderjet_core::config::{ConfigError, PrinterConfig};
use binderjet_core::jetdrive::{ControllerKind, TriggerSource};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

#[test]
fn test_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("printer.json");

    let mut config = PrinterConfig::default();
    config.jetdrive.port = Some("/dev/ttyUSB0".into());
    config.jetdrive.controller = ControllerKind::Standard;
    config.jetdrive.settings.frequency_hz = 2500;
    config.jetdrive.settings.source = TriggerSource::Internal;
    config.jetdrive.settings.waveform.dwell_v = 35;
    config.pressure.port = Some("/dev/ttyUSB1".into());
    config.save(&path).unwrap();

    let loaded = PrinterConfig::load(&path).unwrap();
    assert_eq!(loaded, config);

    let jet = loaded.jetdrive.controller();
    assert_eq!(jet.settings().frequency_hz, 2500);
    assert_eq!(jet.waveform().dwell_v, 35);
    assert!(!jet.profile().is_dream());
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("printer.json");

    assert!(matches!(
        PrinterConfig::load(&path),
        Err(ConfigError::Io { .. })
    ));
    assert_eq!(
        PrinterConfig::load_or_default(&path).unwrap(),
        PrinterConfig::default()
    );
}

#[test]
fn test_malformed_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("printer.json");
    std::fs::write(&path, "{ \"jetdrive\": { \"baud_rate\": \"fast\" } }").unwrap();

    let err = PrinterConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().starts_with("Failed to parse"));
}
