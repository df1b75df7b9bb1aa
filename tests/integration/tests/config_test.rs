//! Configuration loading tests
//!
//! Environment overrides touch process-wide state, so these run serially.

use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use dedication::handshake::{HandshakeOptions, TrustPolicy};
use dedication::utils::config::TrustMode;
use dedication::{Config, PagePhase};
use dedication_integration_tests::TestFixture;
use serial_test::serial;
use tempfile::NamedTempFile;

const VARS: &[&str] = &[
    "DEDICATION_TRUSTED_ORIGIN",
    "DEDICATION_TRUST",
    "DEDICATION_MAX_ATTEMPTS",
    "DEDICATION_RETRY_INTERVAL_MS",
    "DEDICATION_DEFAULT_MEDIA",
    "DEDICATION_LOG_LEVEL",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_env_overrides_apply() -> Result<()> {
    clear_env();
    std::env::set_var("DEDICATION_TRUST", "first-sender");
    std::env::set_var("DEDICATION_MAX_ATTEMPTS", "3");
    std::env::set_var("DEDICATION_RETRY_INTERVAL_MS", "250");
    std::env::set_var("DEDICATION_DEFAULT_MEDIA", "dQw4w9WgXcQ");

    let mut config = Config::default();
    config.apply_env_overrides()?;
    clear_env();

    assert_eq!(config.handshake.trust, TrustMode::FirstSender);
    assert_eq!(config.handshake.max_attempts, 3);
    assert_eq!(config.player.default_media, "dQw4w9WgXcQ");

    let options = HandshakeOptions::from_config(&config.handshake);
    assert_eq!(options.trust, TrustPolicy::FirstSender);
    assert_eq!(options.retry_interval, Duration::from_millis(250));
    Ok(())
}

#[test]
#[serial]
fn test_invalid_env_value_is_an_error() {
    clear_env();
    std::env::set_var("DEDICATION_MAX_ATTEMPTS", "lots");

    let mut config = Config::default();
    let result = config.apply_env_overrides();
    clear_env();

    assert!(result.is_err());
}

#[test]
#[serial]
fn test_overridden_config_drives_the_page() -> Result<()> {
    clear_env();
    std::env::set_var("DEDICATION_MAX_ATTEMPTS", "2");
    std::env::set_var("DEDICATION_RETRY_INTERVAL_MS", "100");

    let mut config = Config::default();
    config.apply_env_overrides()?;
    clear_env();

    let fx = TestFixture::new();
    let page = fx.start_page(config);

    // Two sends (t = 0 and 100 ms), timed out on the next tick
    fx.advance_ms(200);
    assert_eq!(page.phase(), PagePhase::ShowingFallback);
    assert_eq!(page.attempts_sent(), 2);
    assert_eq!(fx.channel.post_count(), 2);
    Ok(())
}

#[test]
#[serial]
fn test_file_overrides_defaults() -> Result<()> {
    clear_env();
    let mut file = NamedTempFile::new()?;
    writeln!(
        file,
        r#"
[handshake]
trust = "pinned"
trusted_origin = "https://gifts.example"

[player]
poll_interval_ms = 250
"#
    )?;

    let config = Config::from_file(file.path())?;
    assert_eq!(
        config.handshake.trusted_origin.as_deref(),
        Some("https://gifts.example")
    );
    assert_eq!(config.player.poll_interval_ms, 250);
    assert_eq!(config.player.default_start_seconds, 4);
    Ok(())
}
