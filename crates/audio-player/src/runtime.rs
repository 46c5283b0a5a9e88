//! Process-wide media runtime.
//!
//! Codec/format registries and the audio host are process-global. Instead of each
//! component touching them on its own, the top-level session object holds a
//! [`RuntimeGuard`]: the first guard warms the registries, the last one to drop logs
//! the teardown. Guards are reference counted so nested sessions are fine.

use std::sync::Mutex;

static USERS: Mutex<usize> = Mutex::new(0);

/// Reference-counted handle on the process-wide media runtime.
#[derive(Debug)]
pub struct RuntimeGuard {
    _private: (),
}

impl RuntimeGuard {
    pub fn acquire() -> Self {
        let mut users = USERS.lock().unwrap();
        if *users == 0 {
            // Force the lazily built registries so the first open is not charged for them.
            let _ = symphonia::default::get_probe();
            let _ = symphonia::default::get_codecs();
            tracing::debug!("media runtime initialized");
        }
        *users += 1;
        Self { _private: () }
    }

    /// Number of live guards.
    pub fn active_users() -> usize {
        *USERS.lock().unwrap()
    }
}

impl Clone for RuntimeGuard {
    fn clone(&self) -> Self {
        Self::acquire()
    }
}

impl Drop for RuntimeGuard {
    fn drop(&mut self) {
        let mut users = USERS.lock().unwrap();
        *users = users.saturating_sub(1);
        if *users == 0 {
            tracing::debug!("media runtime released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_are_reference_counted() {
        let first = RuntimeGuard::acquire();
        let second = first.clone();
        assert!(RuntimeGuard::active_users() >= 2);
        drop(second);
        assert!(RuntimeGuard::active_users() >= 1);
        drop(first);
    }
}
