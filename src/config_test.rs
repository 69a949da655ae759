use std::sync::{Mutex, MutexGuard, PoisonError};

use super::*;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn env_lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// # Safety
/// Callers hold `env_lock()` so no other test mutates the environment.
unsafe fn clear_engine_env() {
    unsafe {
        std::env::remove_var("FLOWSYNC_DEBOUNCE_MS");
        std::env::remove_var("FLOWSYNC_SETTLE_MS");
        std::env::remove_var("FLOWSYNC_PARSE_RETRY_MS");
        std::env::remove_var("FLOWSYNC_PARSE_TIMEOUT_MS");
        std::env::remove_var("FLOWSYNC_HISTORY_LIMIT");
    }
}

#[test]
fn from_env_defaults() {
    let _env = env_lock();
    unsafe { clear_engine_env() };

    let cfg = EngineConfig::from_env().unwrap();
    assert_eq!(cfg, EngineConfig::default());
    assert_eq!(cfg.debounce, Duration::from_millis(DEFAULT_DEBOUNCE_MS));
    assert_eq!(cfg.history_limit, None);
}

#[test]
fn from_env_parses_overrides() {
    let _env = env_lock();
    unsafe {
        clear_engine_env();
        std::env::set_var("FLOWSYNC_DEBOUNCE_MS", "120");
        std::env::set_var("FLOWSYNC_SETTLE_MS", "0");
        std::env::set_var("FLOWSYNC_PARSE_RETRY_MS", " 5 ");
        std::env::set_var("FLOWSYNC_HISTORY_LIMIT", "25");
    }

    let cfg = EngineConfig::from_env().unwrap();
    assert_eq!(cfg.debounce, Duration::from_millis(120));
    assert_eq!(cfg.settle, Duration::ZERO);
    assert_eq!(cfg.parse_retry, Duration::from_millis(5));
    assert_eq!(cfg.parse_timeout, Duration::from_millis(DEFAULT_PARSE_TIMEOUT_MS));
    assert_eq!(cfg.history_limit, Some(25));

    unsafe { clear_engine_env() };
}

#[test]
fn from_env_rejects_garbage() {
    let _env = env_lock();
    unsafe {
        clear_engine_env();
        std::env::set_var("FLOWSYNC_DEBOUNCE_MS", "soon");
    }

    let err = EngineConfig::from_env().unwrap_err();
    assert_eq!(err, ConfigError::InvalidValue { key: "FLOWSYNC_DEBOUNCE_MS".into(), value: "soon".into() });
    assert_eq!(err.error_code(), "E_CONFIG_INVALID");

    unsafe { clear_engine_env() };
}

#[test]
fn history_limit_floor_is_one() {
    let _env = env_lock();
    unsafe {
        clear_engine_env();
        std::env::set_var("FLOWSYNC_HISTORY_LIMIT", "0");
    }

    let cfg = EngineConfig::from_env().unwrap();
    assert_eq!(cfg.history_limit, Some(1));

    unsafe { clear_engine_env() };
}
