//! Tests for settings loading. Tests that touch the process environment are
//! serialized.

use super::*;
use serial_test::serial;
use std::io::Write;

const QUEUE_VARS: [&str; 5] = [
    "MNS_WORKER__QUEUE__ENDPOINT",
    "MNS_WORKER__QUEUE__ACCESS_KEY",
    "MNS_WORKER__QUEUE__SECRET_KEY",
    "MNS_WORKER__QUEUE__QUEUE_NAME",
    "MNS_WORKER__QUEUE__BASE64",
];

const OTHER_VARS: [&str; 3] = [
    "MNS_WORKER__WORKER__WAIT_SECONDS",
    "MNS_WORKER__HANDLER__COMMAND",
    "MNS_WORKER__LOGGING__LEVEL",
];

fn clear_env() {
    for var in QUEUE_VARS.iter().chain(OTHER_VARS.iter()) {
        std::env::remove_var(var);
    }
}

fn write_config(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("Failed to create temp config file");
    file.write_all(contents.as_bytes())
        .expect("Failed to write temp config file");
    file
}

const TOML_CONFIG: &str = r#"
[queue]
endpoint = "https://123456.mns.cn-hangzhou.aliyuncs.com"
access_key = "file-access"
secret_key = "file-secret"
queue_name = "jobs"
base64 = true

[worker]
wait_seconds = 20

[handler]
command = ["/usr/local/bin/process-job", "--verbose"]

[logging]
level = "debug"
json = true
"#;

#[test]
#[serial]
fn test_defaults_without_sources() {
    clear_env();

    let settings = WorkerSettings::load(None).unwrap();

    assert!(settings.queue.endpoint.is_empty());
    assert!(!settings.queue.base64);
    assert_eq!(settings.worker.wait_seconds, None);
    assert!(settings.handler.command.is_empty());
    assert_eq!(settings.logging.level, "info");
    assert!(!settings.logging.json);
    assert!(settings.queue.validate().is_err());
}

#[test]
#[serial]
fn test_load_toml_file() {
    clear_env();
    let file = write_config(".toml", TOML_CONFIG);

    let settings = WorkerSettings::load(Some(file.path())).unwrap();

    assert_eq!(settings.queue.access_key, "file-access");
    assert_eq!(settings.queue.secret_key.expose(), "file-secret");
    assert_eq!(settings.queue.queue_name, "jobs");
    assert!(settings.queue.base64);
    assert_eq!(settings.worker.wait_seconds, Some(20));
    assert_eq!(
        settings.handler.command,
        vec!["/usr/local/bin/process-job", "--verbose"]
    );
    assert_eq!(settings.logging.level, "debug");
    assert!(settings.logging.json);
    assert!(settings.queue.validate().is_ok());
}

#[test]
#[serial]
fn test_load_yaml_file() {
    clear_env();
    let file = write_config(
        ".yaml",
        "queue:\n  endpoint: https://mns.example.com\n  access_key: a\n  secret_key: s\n  queue_name: jobs\n",
    );

    let settings = WorkerSettings::load(Some(file.path())).unwrap();

    assert_eq!(settings.queue.endpoint, "https://mns.example.com");
    assert_eq!(settings.queue.queue_name, "jobs");
}

#[test]
#[serial]
fn test_missing_file_is_reported() {
    clear_env();

    let result = WorkerSettings::load(Some(Path::new("/nonexistent/mns-worker.toml")));

    assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    clear_env();
    let file = write_config(".toml", TOML_CONFIG);
    std::env::set_var("MNS_WORKER__QUEUE__SECRET_KEY", "env-secret");
    std::env::set_var("MNS_WORKER__QUEUE__BASE64", "false");
    std::env::set_var("MNS_WORKER__WORKER__WAIT_SECONDS", "5");

    let settings = WorkerSettings::load(Some(file.path()));
    clear_env();
    let settings = settings.unwrap();

    assert_eq!(settings.queue.secret_key.expose(), "env-secret");
    assert_eq!(settings.queue.access_key, "file-access");
    assert!(!settings.queue.base64);
    assert_eq!(settings.worker.wait_seconds, Some(5));
}

#[test]
#[serial]
fn test_environment_only() {
    clear_env();
    std::env::set_var("MNS_WORKER__QUEUE__ENDPOINT", "https://mns.example.com");
    std::env::set_var("MNS_WORKER__QUEUE__ACCESS_KEY", "env-access");
    std::env::set_var("MNS_WORKER__QUEUE__SECRET_KEY", "env-secret");
    std::env::set_var("MNS_WORKER__QUEUE__QUEUE_NAME", "jobs");
    std::env::set_var("MNS_WORKER__HANDLER__COMMAND", "/bin/handle --fast");

    let settings = WorkerSettings::load(None);
    clear_env();
    let settings = settings.unwrap();

    assert!(settings.queue.validate().is_ok());
    assert_eq!(settings.handler.command, vec!["/bin/handle", "--fast"]);
}

#[test]
#[serial]
fn test_numeric_looking_credentials_load_verbatim() {
    clear_env();
    std::env::set_var("MNS_WORKER__QUEUE__ACCESS_KEY", "00123");
    std::env::set_var("MNS_WORKER__QUEUE__SECRET_KEY", "1e3");
    std::env::set_var("MNS_WORKER__QUEUE__QUEUE_NAME", "007");
    std::env::set_var("MNS_WORKER__QUEUE__BASE64", "true");
    std::env::set_var("MNS_WORKER__WORKER__WAIT_SECONDS", "10");

    let settings = WorkerSettings::load(None);
    clear_env();
    let settings = settings.unwrap();

    assert_eq!(settings.queue.access_key, "00123");
    assert_eq!(settings.queue.secret_key.expose(), "1e3");
    assert_eq!(settings.queue.queue_name, "007");
    assert!(settings.queue.base64);
    assert_eq!(settings.worker.wait_seconds, Some(10));
}

#[test]
fn test_wait_seconds_precedence() {
    let mut settings = WorkerSettings::default();
    assert_eq!(settings.wait_seconds(None).unwrap(), None);

    settings.worker.wait_seconds = Some(20);
    assert_eq!(settings.wait_seconds(None).unwrap().map(|w| w.as_secs()), Some(20));
    assert_eq!(settings.wait_seconds(Some(3)).unwrap().map(|w| w.as_secs()), Some(3));

    assert!(matches!(
        settings.wait_seconds(Some(31)),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn test_handler_command_precedence() {
    let mut settings = WorkerSettings::default();
    assert!(matches!(
        settings.handler_command(Vec::new()),
        Err(ConfigError::MissingRequired { .. })
    ));

    settings.handler.command = vec!["configured".to_string()];
    assert_eq!(settings.handler_command(Vec::new()).unwrap(), vec!["configured"]);
    assert_eq!(
        settings
            .handler_command(vec!["override".to_string(), "-x".to_string()])
            .unwrap(),
        vec!["override", "-x"]
    );
}

#[test]
fn test_debug_output_hides_secret() {
    let mut settings = WorkerSettings::default();
    settings.queue.secret_key = "super-secret".into();

    assert!(!format!("{:?}", settings).contains("super-secret"));
}
