use super::*;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_config_loads_defaults() {
    let config = LoopConfig::load_with(None, None).expect("Should load default config");

    assert_eq!(config.execution.scheduling, SchedulingHint::SharedPool);
    assert!(!config.output.keep_order);
}

#[test]
fn test_custom_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("custom.toml");
    fs::write(
        &path,
        r#"
[execution]
batch_size = 7
timeout_ms = 1500
scheduling = "dedicated"
"#,
    )
    .unwrap();

    let config = LoopConfig::load_with(path.to_str(), None).unwrap();
    assert_eq!(config.execution.batch_size, 7);
    assert_eq!(config.execution.timeout_ms, Some(1500));
    assert_eq!(config.execution.scheduling, SchedulingHint::Dedicated);
}

#[test]
fn test_missing_custom_config_is_an_error() {
    let result = LoopConfig::load_with(Some("definitely/not/here.toml"), None);
    assert!(result.is_err());
}

#[test]
fn test_cli_overrides_win_and_none_is_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("custom.toml");
    fs::write(&path, "[execution]\nbatch_size = 7\ntimeout_ms = 900\n").unwrap();

    let overrides = ConfigOverrides {
        execution: ExecutionOverrides {
            batch_size: Some(2),
            ..Default::default()
        },
        output: OutputOverrides {
            keep_order: Some(true),
        },
    };

    let config = LoopConfig::load_with(path.to_str(), Some(&overrides)).unwrap();
    assert_eq!(config.execution.batch_size, 2);
    assert_eq!(config.execution.timeout_ms, Some(900));
    assert!(config.output.keep_order);
}

#[test]
fn test_execution_options_from_config() {
    let config = LoopConfig {
        execution: ExecutionConfig {
            batch_size: 0,
            timeout_ms: Some(250),
            scheduling: SchedulingHint::Blocking,
        },
        output: OutputConfig::default(),
    };

    let options = config.execution_options(CancellationToken::new()).unwrap();
    assert_eq!(options.batch_size(), crate::parallel::default_batch_size());
    assert_eq!(options.timeout(), Some(Duration::from_millis(250)));
    assert_eq!(options.scheduling(), SchedulingHint::Blocking);
}

#[test]
fn test_zero_timeout_rejected() {
    let config = LoopConfig {
        execution: ExecutionConfig {
            timeout_ms: Some(0),
            ..Default::default()
        },
        ..Default::default()
    };

    assert!(matches!(
        config.execution_options(CancellationToken::new()),
        Err(LoopError::InvalidTimeout)
    ));
}
