//! Shared test utilities for the ndvi-pipeline workspace.
//!
//! Synthetic GeoTIFFs and tar archives, provider response bodies, and a skip
//! macro for tests that need a recorded scene.
//!
//! ```ignore
//! use test_utils::{geotiff_i16, tar_with_files, temp_test_dir};
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Return the path of a recorded response file, or skip the test.
///
/// ```ignore
/// #[test]
/// fn test_real_scene() {
///     let path = require_test_file!("default.tif");
/// }
/// ```
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        match $crate::find_test_file($name) {
            Some(path) => path,
            None => {
                eprintln!(
                    "SKIPPED: '{}' not found. Set {} or add it under testdata/.",
                    $name,
                    $crate::TEST_DATA_ENV
                );
                return;
            }
        }
    }};
}

/// Assert two NDVI values agree within `epsilon`.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if !(diff <= epsilon) {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}
