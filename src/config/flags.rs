//! Runtime feature flags
//!
//! The public id switch is operational configuration that can be flipped
//! while the process runs. Resolvers read it on every call through a
//! [`FeatureFlags`] handle they are given explicitly, never from a global.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

/// Name of the flag that turns the Public-ID scheme on
pub const ENABLE_PUBLIC_ID_LOGIC: &str = "ENABLE_PUBLIC_ID_LOGIC";

/// Source of boolean feature flags
pub trait FeatureFlags: Send + Sync {
    /// Current value of a flag; unknown flags are off
    fn is_enabled(&self, flag: &str) -> bool;

    fn public_id_enabled(&self) -> bool {
        self.is_enabled(ENABLE_PUBLIC_ID_LOGIC)
    }
}

/// Fixed flags, handy for tests
#[derive(Debug, Clone, Default)]
pub struct StaticFlags {
    flags: HashMap<String, bool>,
}

impl StaticFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, flag: impl Into<String>, enabled: bool) -> Self {
        self.flags.insert(flag.into(), enabled);
        self
    }

    /// Only the public id flag, set to `enabled`
    pub fn public_id(enabled: bool) -> Self {
        Self::new().with(ENABLE_PUBLIC_ID_LOGIC, enabled)
    }
}

impl FeatureFlags for StaticFlags {
    fn is_enabled(&self, flag: &str) -> bool {
        self.flags.get(flag).copied().unwrap_or(false)
    }
}

/// Flags that can be toggled at runtime and shared across tasks.
///
/// Clones share state.
#[derive(Debug, Clone, Default)]
pub struct RuntimeFlags {
    public_id: Arc<AtomicBool>,
    others: Arc<RwLock<HashMap<String, bool>>>,
}

impl RuntimeFlags {
    pub fn new(public_id_enabled: bool) -> Self {
        Self {
            public_id: Arc::new(AtomicBool::new(public_id_enabled)),
            others: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn set(&self, flag: &str, enabled: bool) {
        if flag == ENABLE_PUBLIC_ID_LOGIC {
            self.public_id.store(enabled, Ordering::SeqCst);
            tracing::info!(flag, enabled, "feature flag changed");
            return;
        }
        match self.others.write() {
            Ok(mut others) => {
                others.insert(flag.to_string(), enabled);
                tracing::info!(flag, enabled, "feature flag changed");
            }
            Err(e) => tracing::warn!(flag, error = %e, "feature flag lock poisoned"),
        }
    }

    pub fn set_public_id(&self, enabled: bool) {
        self.set(ENABLE_PUBLIC_ID_LOGIC, enabled);
    }
}

impl FeatureFlags for RuntimeFlags {
    fn is_enabled(&self, flag: &str) -> bool {
        if flag == ENABLE_PUBLIC_ID_LOGIC {
            return self.public_id.load(Ordering::SeqCst);
        }
        self.others
            .read()
            .map(|others| others.get(flag).copied().unwrap_or(false))
            .unwrap_or(false)
    }
}

/// Parse a boolean flag value the way environment variables spell them
pub fn parse_flag_value(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
