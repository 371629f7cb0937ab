use std::time::Duration;

use holdfast::config::{Config, DelayConfig};

// Environment-driven cases share process state, so they live in one test.
#[test]
fn test_config_env_overrides() {
    unsafe {
        std::env::remove_var("HOLDFAST_CONFIG");
        std::env::remove_var("LISTEN");
        std::env::remove_var("HOLDFAST_INTERVAL_MS");
        std::env::remove_var("HOLDFAST_TIMEOUT_MS");
    }
    let cfg = Config::load().unwrap();
    assert_eq!(cfg.listen_addr, "127.0.0.1:8080");
    assert_eq!(cfg.delay, DelayConfig::default());

    unsafe {
        std::env::set_var("LISTEN", "0.0.0.0:3000");
        std::env::set_var("HOLDFAST_INTERVAL_MS", "250");
        std::env::set_var("HOLDFAST_TIMEOUT_MS", "5000");
    }
    let cfg = Config::load().unwrap();
    assert_eq!(cfg.listen_addr, "0.0.0.0:3000");
    assert_eq!(cfg.delay.interval(), Duration::from_millis(250));
    assert_eq!(cfg.delay.timeout(), Some(Duration::from_secs(5)));

    unsafe {
        std::env::set_var("HOLDFAST_INTERVAL_MS", "fast");
    }
    assert!(Config::load().is_err());

    unsafe {
        std::env::remove_var("LISTEN");
        std::env::remove_var("HOLDFAST_INTERVAL_MS");
        std::env::remove_var("HOLDFAST_TIMEOUT_MS");
    }
}

#[test]
fn test_config_from_yaml() {
    let cfg = Config::from_yaml(
        r#"
listen_addr: "127.0.0.1:9000"
delay:
  interval_ms: 20
  initial_delay_ms: 500
  heartbeat: "\n"
"#,
    )
    .unwrap();

    assert_eq!(cfg.listen_addr, "127.0.0.1:9000");
    assert_eq!(cfg.delay.interval(), Duration::from_millis(20));
    assert_eq!(cfg.delay.initial_delay(), Some(Duration::from_millis(500)));
    // unspecified fields keep their defaults
    assert_eq!(cfg.delay.timeout(), Some(Duration::from_secs(30)));
    assert_eq!(cfg.delay.heartbeat_byte(), b'\n');
}

#[test]
fn test_config_yaml_partial_uses_defaults() {
    let cfg = Config::from_yaml("listen_addr: \"[::1]:8081\"\n").unwrap();
    assert_eq!(cfg.listen_addr, "[::1]:8081");
    assert_eq!(cfg.delay.heartbeat_byte(), b' ');
}

#[test]
fn test_config_rejects_zero_interval() {
    assert!(Config::from_yaml("delay:\n  interval_ms: 0\n").is_err());
}

#[test]
fn test_non_ascii_heartbeat_falls_back_to_space() {
    let delay = DelayConfig {
        heartbeat: 'é',
        ..DelayConfig::default()
    };
    assert_eq!(delay.heartbeat_byte(), b' ');
}

#[test]
fn test_config_clone() {
    let cfg1 = Config::default();
    let cfg2 = cfg1.clone();
    assert_eq!(cfg1, cfg2);
}
