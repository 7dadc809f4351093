//! Utility macros for reducing boilerplate

/// Implement `FromRef<AppState>` for a cloneable state field.
///
/// # Example
/// ```ignore
/// impl_from_ref!(Arc<StatsService>, stats);
/// ```
#[macro_export]
macro_rules! impl_from_ref {
    ($type:ty, $field:ident) => {
        impl axum::extract::FromRef<$crate::state::AppState> for $type {
            fn from_ref(state: &$crate::state::AppState) -> Self {
                state.$field.clone()
            }
        }
    };
}

/// Read an environment variable and parse it, falling back to a default.
///
/// ```ignore
/// let delay: u64 = env_or!("JIANBAO_SMS_DELAY_SECS", DEFAULT_SMS_DELAY_SECS);
/// ```
#[macro_export]
macro_rules! env_or {
    ($name:expr, $default:expr) => {
        std::env::var($name)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or($default)
    };
}
