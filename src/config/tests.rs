use super::*;
use serial_test::serial;
use std::env;

fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, value) in vars {
        unsafe { env::set_var(key, value) };
    }

    let result = f();

    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, _) in vars {
        unsafe { env::remove_var(key) };
    }

    result
}

fn clear_recon_env() {
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    unsafe {
        env::remove_var("RECON_CACHE_CAPACITY");
        env::remove_var("RECON_CACHE_TTL_SECS");
        env::remove_var("RECON_MAX_PARALLELISM");
        env::remove_var("RECON_FEDERATION_TIMEOUT_MS");
        env::remove_var("RECON_TIMEOUT_POLICY");
        env::remove_var("RECON_DEFAULT_LANGUAGES");
        env::remove_var("RECON_SCORE_DIGITS");
        env::remove_var("RECON_FILTER_SECONDARIES");
    }
}

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.cache_capacity, 1024);
    assert_eq!(config.cache_ttl, Duration::from_secs(3600));
    assert_eq!(config.max_parallelism, 8);
    assert_eq!(config.federation_timeout, Duration::from_millis(10_000));
    assert_eq!(config.timeout_policy, TimeoutPolicy::Partial);
    assert_eq!(config.default_languages, vec!["en".to_string()]);
    assert_eq!(config.score_digits, 2);
    assert!(!config.filter_secondaries);
}

#[test]
#[serial]
fn test_from_env_with_defaults() {
    clear_recon_env();

    let config = Config::from_env().expect("should parse with defaults");

    assert_eq!(config.cache_capacity, 1024);
    assert_eq!(config.timeout_policy, TimeoutPolicy::Partial);
}

#[test]
#[serial]
fn test_from_env_overrides() {
    clear_recon_env();

    with_env_vars(
        &[
            ("RECON_CACHE_CAPACITY", "0"),
            ("RECON_CACHE_TTL_SECS", "60"),
            ("RECON_MAX_PARALLELISM", "3"),
            ("RECON_FEDERATION_TIMEOUT_MS", "2500"),
            ("RECON_TIMEOUT_POLICY", "fail"),
            ("RECON_DEFAULT_LANGUAGES", "de, fr"),
            ("RECON_SCORE_DIGITS", "4"),
            ("RECON_FILTER_SECONDARIES", "true"),
        ],
        || {
            let config = Config::from_env().expect("should parse");

            assert_eq!(config.cache_capacity, 0);
            assert_eq!(config.cache_ttl, Duration::from_secs(60));
            assert_eq!(config.max_parallelism, 3);
            assert_eq!(config.federation_timeout, Duration::from_millis(2500));
            assert_eq!(config.timeout_policy, TimeoutPolicy::Fail);
            assert_eq!(config.default_languages, vec!["de", "fr"]);
            assert_eq!(config.score_digits, 4);
            assert!(config.filter_secondaries);
        },
    );
}

#[test]
#[serial]
fn test_from_env_rejects_garbage_number() {
    clear_recon_env();

    with_env_vars(&[("RECON_CACHE_CAPACITY", "lots")], || {
        let error = Config::from_env().expect_err("should reject");
        assert!(matches!(
            error,
            ConfigError::InvalidNumber {
                name: "RECON_CACHE_CAPACITY",
                ..
            }
        ));
    });
}

#[test]
#[serial]
fn test_from_env_rejects_unknown_policy() {
    clear_recon_env();

    with_env_vars(&[("RECON_TIMEOUT_POLICY", "sometimes")], || {
        let error = Config::from_env().expect_err("should reject");
        assert!(matches!(error, ConfigError::InvalidTimeoutPolicy { .. }));
    });
}

#[test]
#[serial]
fn test_from_env_rejects_zero_parallelism() {
    clear_recon_env();

    with_env_vars(&[("RECON_MAX_PARALLELISM", "0")], || {
        let error = Config::from_env().expect_err("should reject");
        assert!(matches!(error, ConfigError::ZeroParallelism { .. }));
    });
}

#[test]
#[serial]
fn test_from_env_rejects_excessive_score_digits() {
    clear_recon_env();

    with_env_vars(&[("RECON_SCORE_DIGITS", "9")], || {
        let error = Config::from_env().expect_err("should reject");
        assert!(matches!(
            error,
            ConfigError::ScoreDigitsOutOfRange { value: 9 }
        ));
    });
}

#[test]
#[serial]
fn test_empty_language_list_keeps_default() {
    clear_recon_env();

    with_env_vars(&[("RECON_DEFAULT_LANGUAGES", " , ,")], || {
        let config = Config::from_env().expect("should parse");
        assert_eq!(config.default_languages, vec!["en"]);
    });
}

#[test]
fn test_validate_checks_ranges() {
    let mut config = Config::default();
    assert!(config.validate().is_ok());

    config.max_parallelism = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ZeroParallelism { .. })
    ));

    config.max_parallelism = 4;
    config.score_digits = MAX_SCORE_DIGITS + 1;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ScoreDigitsOutOfRange { .. })
    ));
}

#[test]
fn test_component_config_views() {
    let config = Config {
        max_parallelism: 2,
        federation_timeout: Duration::from_millis(500),
        timeout_policy: TimeoutPolicy::Fail,
        score_digits: 3,
        filter_secondaries: true,
        ..Default::default()
    };

    let federation = config.federation();
    assert_eq!(federation.max_parallelism, 2);
    assert_eq!(federation.timeout, Duration::from_millis(500));
    assert_eq!(federation.on_timeout, TimeoutPolicy::Fail);

    let aggregator = config.aggregator();
    assert_eq!(aggregator.score_digits, 3);
    assert!(aggregator.filter_secondaries);
}
