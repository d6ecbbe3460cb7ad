//! Locating and loading `tom-cadence.toml`.

mod support;

use std::io::Write;
use std::path::PathBuf;

use tempfile::NamedTempFile;

use tom_cadence::config::{AppConfig, ConfigError, CONFIG_ENV_VAR};
use tom_cadence::facility::{FacilityError, FacilityGateway};

fn config_file(body: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", body).unwrap();
    file
}

#[test]
fn test_env_var_selects_file() {
    let file = config_file("[runner]\nmax_concurrent_groups = 7\n");
    let path = file.path().to_string_lossy().into_owned();
    support::with_scoped_env(&[(CONFIG_ENV_VAR, Some(path.as_str()))], || {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.runner.settings.max_concurrent_groups, 7);
    });
}

#[test]
fn test_explicit_path_wins_over_env() {
    let from_env = config_file("[runner]\nmax_concurrent_groups = 7\n");
    let explicit = config_file("[runner]\nmax_concurrent_groups = 2\n");
    let env_path = from_env.path().to_string_lossy().into_owned();
    support::with_scoped_env(&[(CONFIG_ENV_VAR, Some(env_path.as_str()))], || {
        let config = AppConfig::load(Some(explicit.path())).unwrap();
        assert_eq!(config.runner.settings.max_concurrent_groups, 2);
    });
}

#[test]
fn test_env_var_pointing_nowhere_is_error() {
    support::with_scoped_env(
        &[(CONFIG_ENV_VAR, Some("/nonexistent/tom-cadence.toml"))],
        || {
            let err = AppConfig::load(None).unwrap_err();
            match err {
                ConfigError::Read { path, .. } => {
                    assert_eq!(path, PathBuf::from("/nonexistent/tom-cadence.toml"))
                }
                other => panic!("unexpected error: {}", other),
            }
        },
    );
}

#[test]
fn test_blank_env_var_is_ignored() {
    support::with_scoped_env(&[(CONFIG_ENV_VAR, Some("  "))], || {
        let config = AppConfig::load(None).unwrap();
        config.validate().unwrap();
    });
}

#[test]
fn test_zero_concurrency_is_invalid() {
    let file = config_file("[runner]\nmax_concurrent_groups = 0\n");
    let config = AppConfig::from_file(file.path()).unwrap();
    assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_unknown_repository_type_is_invalid() {
    let file = config_file("[repository]\ntype = \"postgres\"\n");
    let config = AppConfig::from_file(file.path()).unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("Unknown repository type"));
}

#[tokio::test]
async fn test_required_window_fields_reach_facility() {
    let config: AppConfig = toml::from_str(
        "[[facilities]]\nname = \"LCO\"\nwindow_start_keyword = \"start\"\n",
    )
    .unwrap();
    let registry = config.facility_registry();
    let facility = registry.get("LCO").unwrap();

    let mut params = support::request_params();
    assert!(facility.submit(&params).await.is_ok());
    params.remove("start");
    let err = facility.submit(&params).await.unwrap_err();
    assert!(matches!(err, FacilityError::Rejected { .. }));
}
