//! Scoped environment overrides for configuration integration tests.

use std::env;
use std::ffi::OsString;
use std::sync::{Mutex, MutexGuard, OnceLock};

/// Variables `BoardsyncConfig::load` reads on top of the file.
pub const OVERRIDE_KEYS: [&str; 6] = [
    "BOARDSYNC_BACKEND_URL",
    "BOARDSYNC_BACKEND_TOKEN",
    "BOARDSYNC_GITHUB_TOKEN",
    "BOARDSYNC_GITHUB_API",
    "DATABASE_URL",
    "BOARDSYNC_LOG",
];

static ENV_MUTEX: OnceLock<Mutex<()>> = OnceLock::new();

/// Holds the environment lock and restores overridden variables on drop.
pub struct EnvVarGuard {
    previous: Vec<(OsString, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvVarGuard {
    /// Sets the given override variables and clears every other one, so a
    /// developer's shell cannot leak into the test.
    pub fn overrides(values: &[(&str, &str)]) -> Self {
        let lock = env_lock();
        let mut previous = Vec::with_capacity(OVERRIDE_KEYS.len());

        for key in OVERRIDE_KEYS {
            previous.push((OsString::from(key), env::var_os(key)));
            let wanted = values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| *value);
            unsafe {
                // SAFETY: the global mutex serializes environment mutations in tests.
                match wanted {
                    Some(value) => env::set_var(key, value),
                    None => env::remove_var(key),
                }
            }
        }

        Self {
            previous,
            _lock: lock,
        }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        for (key, value) in self.previous.drain(..) {
            unsafe {
                // SAFETY: the global mutex serializes environment mutations in tests.
                match value {
                    Some(previous) => env::set_var(&key, &previous),
                    None => env::remove_var(&key),
                }
            }
        }
    }
}

fn env_lock() -> MutexGuard<'static, ()> {
    ENV_MUTEX
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
