//! Built-in evalscript for Sentinel-3 SLSTR NDVI.
//!
//! The script encodes NDVI as INT16 scaled by 10000 and writes
//! [`DEFAULT_NO_DATA_VALUE`] where the scene has no data, so the analyzer can
//! tell "no measurement" apart from a genuine NDVI of zero.

/// Sentinel value the built-in evalscript writes for pixels without data.
pub const DEFAULT_NO_DATA_VALUE: f64 = -32768.0;

/// Divisor that turns the script's INT16 output back into NDVI.
pub const DEFAULT_VALUE_DIVISOR: f64 = 10000.0;

/// NDVI from SLSTR S3 (NIR, 865nm) and S2 (red, 659nm).
pub const DEFAULT_NDVI_EVALSCRIPT: &str = r#"//VERSION=3
function setup() {
    return {
        input: [
            {
                bands: ["S2", "S3", "dataMask"],
            },
        ],
        output: [
            {
                id: "default",
                bands: 1,
                sampleType: "INT16",
            },
        ],
    };
}

function evaluatePixel(sample) {
    if (sample.dataMask === 0) {
        return { default: [-32768] };
    }
    let ndvi = index(sample.S3, sample.S2);
    return { default: [Math.round(ndvi * 10000)] };
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_writes_configured_sentinel() {
        assert!(DEFAULT_NDVI_EVALSCRIPT.starts_with("//VERSION=3"));
        let sentinel = format!("[{}]", DEFAULT_NO_DATA_VALUE as i64);
        assert!(DEFAULT_NDVI_EVALSCRIPT.contains(&sentinel));
        assert!(DEFAULT_NDVI_EVALSCRIPT.contains(&format!("* {}", DEFAULT_VALUE_DIVISOR as i64)));
    }
}
