//! Application-level constants and logging setup.

use tracing_subscriber::EnvFilter;

pub const APP_NAME: &str = "Hemoline";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Minimum interval between two donations by the same donor, in days.
pub const COOLDOWN_DAYS: i64 = 90;

/// Default search radius for donor matching, in kilometers.
pub const DEFAULT_RADIUS_KM: f64 = 50.0;

/// Mean Earth radius used by the haversine distance, in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// How long a call waits on a locked database before failing with `Timeout`.
pub const BUSY_TIMEOUT_MS: u64 = 5_000;

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> String {
    format!("{}=info", env!("CARGO_PKG_NAME"))
}

/// Initialize the global tracing subscriber.
///
/// Call once at process startup; later calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_log_filter())),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_is_ninety_days() {
        assert_eq!(COOLDOWN_DAYS, 90);
    }

    #[test]
    fn default_filter_names_crate() {
        assert_eq!(default_log_filter(), "hemoline=info");
    }
}
