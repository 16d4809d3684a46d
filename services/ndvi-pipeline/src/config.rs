//! Configuration loader for the NDVI pipeline.
//!
//! One YAML file (`config/ndvi.yaml` by default) describes credentials,
//! endpoints, the request, raster interpretation and output paths.
//!
//! Supports environment variable substitution using ${VAR} syntax in string
//! values. Keys, comments and the inline evalscript are left alone.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use ndvi_common::{AreaOfInterest, CrsCode, TimeRange};
use ndvi_raster::AnalyzerConfig;
use sentinel_client::{
    HttpSettings, OrbitDirection, OutputFormat, RequestParameters, DEFAULT_NDVI_EVALSCRIPT,
    DEFAULT_NO_DATA_VALUE, DEFAULT_PROCESS_URL, DEFAULT_TOKEN_URL, DEFAULT_VALUE_DIVISOR,
};
use serde::Deserialize;
use serde_yaml::Value;

use crate::retry::RetryPolicy;

// ============================================================================
// Pipeline Configuration (ndvi.yaml)
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    pub request: RequestConfig,
    pub raster: RasterConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Clone, Deserialize)]
pub struct CredentialsConfig {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_process_url")]
    pub process_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            token_url: default_token_url(),
            process_url: default_process_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestConfig {
    /// Name recorded in the statistics document
    pub region_name: String,
    pub area: AreaOfInterest,
    #[serde(default = "default_crs")]
    pub crs: String,
    pub time_from: String,
    pub time_to: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub orbit_direction: Option<OrbitDirection>,
    /// Inline evalscript. Mutually exclusive with `evalscript_file`.
    #[serde(default)]
    pub evalscript: Option<String>,
    #[serde(default)]
    pub evalscript_file: Option<PathBuf>,
    #[serde(default = "default_dimension")]
    pub width: u32,
    #[serde(default = "default_dimension")]
    pub height: u32,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default = "default_response_identifier")]
    pub response_identifier: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RasterConfig {
    /// No-data sentinel. Required; `.nan` selects NaN.
    pub nodata: f64,
    #[serde(default = "default_value_divisor")]
    pub value_divisor: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_archive_path")]
    pub archive_path: PathBuf,
    #[serde(default = "default_extract_dir")]
    pub extract_dir: PathBuf,
    #[serde(default = "default_statistics_path")]
    pub statistics_path: PathBuf,
    #[serde(default = "default_true")]
    pub keep_archive: bool,
    #[serde(default = "default_true")]
    pub keep_extracted: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            archive_path: default_archive_path(),
            extract_dir: default_extract_dir(),
            statistics_path: default_statistics_path(),
            keep_archive: true,
            keep_extracted: true,
        }
    }
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}
fn default_process_url() -> String {
    DEFAULT_PROCESS_URL.to_string()
}
fn default_request_timeout_secs() -> u64 {
    300
}
fn default_connect_timeout_secs() -> u64 {
    30
}
fn default_initial_delay_ms() -> u64 {
    1000
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_crs() -> String {
    "EPSG:4326".to_string()
}
fn default_collection() -> String {
    "sentinel-3-slstr".to_string()
}
fn default_dimension() -> u32 {
    512
}
fn default_response_identifier() -> String {
    "default".to_string()
}
fn default_value_divisor() -> f64 {
    DEFAULT_VALUE_DIVISOR
}
fn default_archive_path() -> PathBuf {
    PathBuf::from("retrieved_files.tar")
}
fn default_extract_dir() -> PathBuf {
    PathBuf::from("retrieved_files")
}
fn default_statistics_path() -> PathBuf {
    PathBuf::from("ndvi_statistics.json")
}
fn default_true() -> bool {
    true
}

impl PipelineConfig {
    pub fn http_settings(&self) -> HttpSettings {
        let mut settings = HttpSettings {
            request_timeout: Duration::from_secs(self.http.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.http.connect_timeout_secs),
            ..HttpSettings::default()
        };
        if let Some(ua) = &self.http.user_agent {
            settings.user_agent = ua.clone();
        }
        settings
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.max_retries,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }

    pub fn analyzer_config(&self) -> AnalyzerConfig {
        AnalyzerConfig::new(self.raster.nodata).with_divisor(self.raster.value_divisor)
    }

    /// Resolve the request section into builder input.
    ///
    /// Reads `evalscript_file` relative to the working directory. Range
    /// ordering is left to the request builder.
    pub fn request_parameters(&self) -> Result<RequestParameters> {
        let req = &self.request;

        let crs = CrsCode::parse(&req.crs).with_context(|| format!("Invalid request.crs '{}'", req.crs))?;
        let time_range = TimeRange::parse(&req.time_from, &req.time_to).with_context(|| {
            format!(
                "Invalid request time window '{}'..'{}'",
                req.time_from, req.time_to
            )
        })?;

        let evalscript = match (&req.evalscript, &req.evalscript_file) {
            (Some(inline), None) => inline.clone(),
            (None, Some(path)) => fs::read_to_string(path)
                .with_context(|| format!("Failed to read evalscript from {:?}", path))?,
            (None, None) => DEFAULT_NDVI_EVALSCRIPT.to_string(),
            (Some(_), Some(_)) => {
                anyhow::bail!("request.evalscript and request.evalscript_file are mutually exclusive")
            }
        };

        Ok(RequestParameters {
            area: req.area.clone(),
            crs,
            time_range,
            collection: req.collection.clone(),
            orbit_direction: req.orbit_direction,
            evalscript,
            width: req.width,
            height: req.height,
            output_format: req.output_format,
            response_identifier: req.response_identifier.clone(),
        })
    }
}

// ============================================================================
// Loading Functions
// ============================================================================

/// Load and parse the pipeline config with environment variable substitution
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read pipeline config from {:?}", path.as_ref()))?;

    parse_config(&content)
        .with_context(|| format!("Invalid pipeline config {:?}", path.as_ref()))
}

/// Parse and validate YAML config text.
pub fn parse_config(content: &str) -> Result<PipelineConfig> {
    let mut tree: Value =
        serde_yaml::from_str(content).with_context(|| "Failed to parse pipeline config YAML")?;
    expand_tree(&mut tree, "")?;

    let config: PipelineConfig =
        serde_yaml::from_value(tree).with_context(|| "Failed to parse pipeline config YAML")?;

    validate_config(&config)?;

    Ok(config)
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Values passed through without substitution.
const VERBATIM_KEYS: &[&str] = &["request.evalscript"];

/// Substitute variables in every string scalar of the document.
fn expand_tree(value: &mut Value, path: &str) -> Result<()> {
    match value {
        Value::Mapping(map) => {
            for (key, child) in map.iter_mut() {
                let child_path = match key.as_str() {
                    Some(k) if path.is_empty() => k.to_string(),
                    Some(k) => format!("{}.{}", path, k),
                    None => path.to_string(),
                };
                if VERBATIM_KEYS.contains(&child_path.as_str()) {
                    continue;
                }
                expand_tree(child, &child_path)?;
            }
        }
        Value::Sequence(items) => {
            for item in items {
                expand_tree(item, path)?;
            }
        }
        Value::Tagged(tagged) => expand_tree(&mut tagged.value, path)?,
        Value::String(text) if text.contains("${") => {
            let expanded = expand_env_vars(text).with_context(|| format!("In {}", path))?;
            *value = rescan_scalar(expanded);
        }
        _ => {}
    }
    Ok(())
}

/// Let `${RETRIES:-3}` feed numeric and boolean fields.
fn rescan_scalar(text: String) -> Value {
    match serde_yaml::from_str::<Value>(&text) {
        Ok(scalar @ (Value::Null | Value::Bool(_) | Value::Number(_))) => scalar,
        _ => Value::String(text),
    }
}

/// Expand environment variables in one string
/// Supports ${VAR} and ${VAR:-default} syntax
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::new();
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'

            let mut var_expr = String::new();
            let mut brace_count = 1;

            while brace_count > 0 {
                match chars.next() {
                    Some('{') => {
                        brace_count += 1;
                        var_expr.push('{');
                    }
                    Some('}') => {
                        brace_count -= 1;
                        if brace_count > 0 {
                            var_expr.push('}');
                        }
                    }
                    Some(c) => var_expr.push(c),
                    None => anyhow::bail!("Unclosed variable substitution: ${{{}", var_expr),
                }
            }

            let value = resolve_var_expr(&var_expr)?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

/// Resolve variable expression (supports VAR and VAR:-default syntax)
fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).with_context(|| format!("Environment variable {} not set", expr))
    }
}

// ============================================================================
// Validation
// ============================================================================

fn validate_config(config: &PipelineConfig) -> Result<()> {
    for (name, url) in [
        ("endpoints.token_url", &config.endpoints.token_url),
        ("endpoints.process_url", &config.endpoints.process_url),
    ] {
        anyhow::ensure!(
            url.starts_with("http://") || url.starts_with("https://"),
            "{} must be an http(s) URL, got '{}'",
            name,
            url
        );
    }

    anyhow::ensure!(
        config.http.request_timeout_secs > 0,
        "http.request_timeout_secs must be greater than 0"
    );
    anyhow::ensure!(
        config.http.connect_timeout_secs > 0,
        "http.connect_timeout_secs must be greater than 0"
    );

    anyhow::ensure!(
        config.retry.initial_delay_ms <= config.retry.max_delay_ms,
        "retry.initial_delay_ms must not exceed retry.max_delay_ms"
    );

    anyhow::ensure!(
        !config.request.region_name.trim().is_empty(),
        "request.region_name cannot be empty"
    );

    // NaN is a valid sentinel; infinities are not.
    anyhow::ensure!(
        !config.raster.nodata.is_infinite(),
        "raster.nodata must be finite or .nan"
    );
    anyhow::ensure!(
        config.raster.value_divisor.is_finite() && config.raster.value_divisor > 0.0,
        "raster.value_divisor must be a positive number, got {}",
        config.raster.value_divisor
    );

    if config.request.evalscript.is_none()
        && config.request.evalscript_file.is_none()
        && config.raster.nodata != DEFAULT_NO_DATA_VALUE
    {
        tracing::warn!(
            nodata = config.raster.nodata,
            expected = DEFAULT_NO_DATA_VALUE,
            "raster.nodata differs from the sentinel the built-in evalscript writes"
        );
    }

    for (name, path) in [
        ("output.archive_path", &config.output.archive_path),
        ("output.extract_dir", &config.output.extract_dir),
        ("output.statistics_path", &config.output.statistics_path),
    ] {
        anyhow::ensure!(!path.as_os_str().is_empty(), "{} cannot be empty", name);
    }
    anyhow::ensure!(
        !config.output.archive_path.starts_with(&config.output.extract_dir),
        "output.archive_path must not be inside output.extract_dir"
    );

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
credentials:
  client_id: id
  client_secret: secret
request:
  region_name: Gorizia
  area:
    polygon:
      - [13.431473, 45.843278]
      - [13.407070, 45.901024]
      - [13.374575, 45.944087]
      - [13.431473, 45.843278]
  time_from: "2020-06-20"
  time_to: "2020-06-20"
raster:
  nodata: -32768
"#;

    #[test]
    fn test_expand_env_vars_simple() {
        std::env::set_var("NDVI_TEST_VAR", "test_value");
        let result = expand_env_vars("prefix_${NDVI_TEST_VAR}_suffix").unwrap();
        assert_eq!(result, "prefix_test_value_suffix");
    }

    #[test]
    fn test_expand_env_vars_with_default() {
        std::env::remove_var("NDVI_NONEXISTENT_VAR");
        let result = expand_env_vars("value_${NDVI_NONEXISTENT_VAR:-default}_end").unwrap();
        assert_eq!(result, "value_default_end");
    }

    #[test]
    fn test_expand_env_vars_missing_required() {
        std::env::remove_var("NDVI_REQUIRED_VAR");
        assert!(expand_env_vars("${NDVI_REQUIRED_VAR}").is_err());
    }

    #[test]
    fn test_unclosed_substitution() {
        assert!(expand_env_vars("client_id: ${SH_CLIENT_ID").is_err());
    }

    #[test]
    fn test_inline_evalscript_not_expanded() {
        std::env::remove_var("NDVI_UNSET_SCRIPT_VAR");
        let script = "//VERSION=3\nfunction evaluatePixel(s) { return [`${NDVI_UNSET_SCRIPT_VAR}`]; }";
        let yaml = MINIMAL.replace(
            "  time_from:",
            &format!("  evalscript: {:?}\n  time_from:", script),
        );

        let config = parse_config(&yaml).unwrap();
        assert_eq!(config.request.evalscript.as_deref(), Some(script));
    }

    #[test]
    fn test_substituted_number_feeds_numeric_field() {
        std::env::remove_var("NDVI_UNSET_RETRIES");
        std::env::set_var("NDVI_TEST_WIDTH", "256");
        let yaml = format!(
            "{}retry:\n  max_retries: ${{NDVI_UNSET_RETRIES:-3}}\n",
            MINIMAL.replace("  time_from:", "  width: ${NDVI_TEST_WIDTH}\n  time_from:")
        );

        let config = parse_config(&yaml).unwrap();
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.request.width, 256);
    }

    #[test]
    fn test_commented_variable_ignored() {
        std::env::remove_var("NDVI_COMMENTED_VAR");
        let yaml = format!("# client_id: ${{NDVI_COMMENTED_VAR}}\n{}", MINIMAL);
        assert!(parse_config(&yaml).is_ok());
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = parse_config(MINIMAL).unwrap();

        assert_eq!(config.endpoints.token_url, DEFAULT_TOKEN_URL);
        assert_eq!(config.endpoints.process_url, DEFAULT_PROCESS_URL);
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.raster.value_divisor, 10000.0);
        assert_eq!(config.output.archive_path, PathBuf::from("retrieved_files.tar"));
        assert_eq!(config.output.statistics_path, PathBuf::from("ndvi_statistics.json"));
        assert!(config.output.keep_archive);

        let params = config.request_parameters().unwrap();
        assert_eq!(params.collection, "sentinel-3-slstr");
        assert_eq!(params.width, 512);
        assert_eq!(params.output_format, OutputFormat::TarOfTiff);
        assert_eq!(params.evalscript, DEFAULT_NDVI_EVALSCRIPT);
    }

    #[test]
    fn test_nodata_is_required() {
        let yaml = MINIMAL.replace("raster:\n  nodata: -32768\n", "raster:\n  value_divisor: 1\n");
        assert!(parse_config(&yaml).is_err());
    }

    #[test]
    fn test_nan_nodata_accepted() {
        let yaml = MINIMAL.replace("nodata: -32768", "nodata: .nan");
        let config = parse_config(&yaml).unwrap();
        assert!(config.raster.nodata.is_nan());
    }

    #[test]
    fn test_non_positive_divisor_rejected() {
        let yaml = MINIMAL.replace("nodata: -32768", "nodata: -32768\n  value_divisor: 0");
        assert!(parse_config(&yaml).is_err());
    }

    #[test]
    fn test_bad_endpoint_rejected() {
        let yaml = format!("{}endpoints:\n  token_url: ftp://example.com/token\n", MINIMAL);
        assert!(parse_config(&yaml).is_err());
    }

    #[test]
    fn test_both_evalscript_sources_rejected() {
        let yaml = MINIMAL.replace(
            "  time_from:",
            "  evalscript: \"//VERSION=3\"\n  evalscript_file: ndvi.js\n  time_from:",
        );
        let config = parse_config(&yaml).unwrap();
        assert!(config.request_parameters().is_err());
    }

    #[test]
    fn test_archive_inside_extract_dir_rejected() {
        let yaml = format!(
            "{}output:\n  archive_path: out/scene.tar\n  extract_dir: out\n",
            MINIMAL
        );
        let err = parse_config(&yaml).unwrap_err();
        assert!(err.to_string().contains("archive_path"), "{}", err);
    }

    #[test]
    fn test_credentials_debug_redacted() {
        let config = parse_config(MINIMAL).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("\"secret\""));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_repository_config_parses() {
        std::env::set_var("SH_CLIENT_ID", "ci-client");
        std::env::set_var("SH_CLIENT_SECRET", "ci-secret");
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/ndvi.yaml");

        let config = load_config(&path).unwrap();

        assert_eq!(config.credentials.client_id, "ci-client");
        assert_eq!(config.request.region_name, "Gorizia");
        assert_eq!(config.raster.nodata, DEFAULT_NO_DATA_VALUE);
        config.request_parameters().unwrap();
    }
}
