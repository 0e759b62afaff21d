//! Boson RTS simulation core: cell grid and spatial index, per-player fog of
//! war with unit visibility, and lakes with chunked water geometry.

pub mod game;

// ============================================================================
// Profiling Macros
// ============================================================================

/// Log a message every 100 simulation ticks when `perf_stats` is enabled.
///
/// Without the feature the macro expands to nothing and its arguments are
/// never evaluated.
///
/// # Example
/// ```ignore
/// profile_log!(tick, "Items: {}", world.index().len());
/// ```
#[macro_export]
#[cfg(feature = "perf_stats")]
macro_rules! profile_log {
    ($tick:expr, $($arg:tt)*) => {
        if $tick.0 % 100 == 0 {
            bevy::prelude::info!($($arg)*);
        }
    };
}

#[macro_export]
#[cfg(not(feature = "perf_stats"))]
macro_rules! profile_log {
    ($tick:expr, $($arg:tt)*) => {};
}
