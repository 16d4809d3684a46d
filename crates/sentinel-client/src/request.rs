//! Processing request construction.
//!
//! [`build_request`] is a pure function: it validates [`RequestParameters`]
//! and produces an immutable [`ProcessingRequest`] whose payload serializes to
//! the processing API's JSON format. The evalscript is embedded verbatim.

use ndvi_common::{AreaOfInterest, CrsCode, NdviError, NdviResult, TimeRange};
use serde::{Deserialize, Serialize};

/// Largest width/height the processing API renders in one request.
pub const MAX_OUTPUT_DIMENSION: u32 = 2500;

/// Container the processing API returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// A single GeoTIFF body
    Tiff,
    /// A tar archive holding one GeoTIFF per response identifier
    #[default]
    TarOfTiff,
}

impl OutputFormat {
    /// `Accept` header value selecting this container.
    pub fn accept_header(&self) -> &'static str {
        match self {
            OutputFormat::Tiff => "image/tiff",
            OutputFormat::TarOfTiff => "application/tar",
        }
    }

    /// Whether the response needs unpacking before analysis.
    pub fn is_archive(&self) -> bool {
        matches!(self, OutputFormat::TarOfTiff)
    }
}

/// Satellite pass direction filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrbitDirection {
    Ascending,
    Descending,
}

/// Everything needed to describe one processing request.
#[derive(Debug, Clone)]
pub struct RequestParameters {
    pub area: AreaOfInterest,
    pub crs: CrsCode,
    pub time_range: TimeRange,
    /// Data collection identifier, e.g. "sentinel-3-slstr"
    pub collection: String,
    pub orbit_direction: Option<OrbitDirection>,
    /// Provider-specific band math, passed through untouched
    pub evalscript: String,
    pub width: u32,
    pub height: u32,
    pub output_format: OutputFormat,
    /// Response identifier; the raster arrives as `<identifier>.tif`
    pub response_identifier: String,
}

impl RequestParameters {
    /// File name the raster will have once fetched.
    pub fn artifact_name(&self) -> String {
        artifact_file_name(&self.response_identifier)
    }
}

fn artifact_file_name(identifier: &str) -> String {
    format!("{}.tif", identifier)
}

/// A validated, immutable processing request.
#[derive(Debug, Clone)]
pub struct ProcessingRequest {
    area: AreaOfInterest,
    crs: CrsCode,
    time_range: TimeRange,
    output_format: OutputFormat,
    response_identifier: String,
    payload: ProcessPayload,
}

impl ProcessingRequest {
    pub fn area(&self) -> &AreaOfInterest {
        &self.area
    }

    pub fn crs(&self) -> CrsCode {
        self.crs
    }

    pub fn time_range(&self) -> &TimeRange {
        &self.time_range
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    /// File name of the raster inside the returned archive.
    pub fn artifact_name(&self) -> String {
        artifact_file_name(&self.response_identifier)
    }

    /// JSON body for the processing endpoint.
    pub fn payload(&self) -> &ProcessPayload {
        &self.payload
    }
}

/// Processing API request body.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessPayload {
    input: InputSpec,
    output: OutputSpec,
    evalscript: String,
}

#[derive(Debug, Clone, Serialize)]
struct InputSpec {
    bounds: Bounds,
    data: Vec<DataSpec>,
}

#[derive(Debug, Clone, Serialize)]
struct Bounds {
    properties: BoundsProperties,
    #[serde(skip_serializing_if = "Option::is_none")]
    geometry: Option<Geometry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bbox: Option<[f64; 4]>,
}

#[derive(Debug, Clone, Serialize)]
struct BoundsProperties {
    crs: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: &'static str,
    coordinates: Vec<Vec<[f64; 2]>>,
}

#[derive(Debug, Clone, Serialize)]
struct DataSpec {
    #[serde(rename = "type")]
    collection: String,
    #[serde(rename = "dataFilter")]
    data_filter: DataFilter,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct DataFilter {
    time_range: ProviderTimeRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    orbit_direction: Option<OrbitDirection>,
}

#[derive(Debug, Clone, Serialize)]
struct ProviderTimeRange {
    from: String,
    to: String,
}

#[derive(Debug, Clone, Serialize)]
struct OutputSpec {
    width: u32,
    height: u32,
    responses: Vec<ResponseSpec>,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseSpec {
    identifier: String,
    format: FormatSpec,
}

#[derive(Debug, Clone, Serialize)]
struct FormatSpec {
    #[serde(rename = "type")]
    mime: &'static str,
}

/// Validate parameters and assemble the request.
///
/// Fails only with `InvalidRequestParameters`.
pub fn build_request(params: &RequestParameters) -> NdviResult<ProcessingRequest> {
    validate(params)?;

    let bounds = match &params.area {
        AreaOfInterest::Polygon(polygon) => Bounds {
            properties: BoundsProperties {
                crs: params.crs.opengis_url(),
            },
            geometry: Some(Geometry {
                kind: "Polygon",
                coordinates: vec![polygon.exterior.clone()],
            }),
            bbox: None,
        },
        AreaOfInterest::Bbox(bbox) => Bounds {
            properties: BoundsProperties {
                crs: params.crs.opengis_url(),
            },
            geometry: None,
            bbox: Some(bbox.to_array()),
        },
    };

    let payload = ProcessPayload {
        input: InputSpec {
            bounds,
            data: vec![DataSpec {
                collection: params.collection.clone(),
                data_filter: DataFilter {
                    time_range: ProviderTimeRange {
                        from: params.time_range.provider_from(),
                        to: params.time_range.provider_to(),
                    },
                    orbit_direction: params.orbit_direction,
                },
            }],
        },
        output: OutputSpec {
            width: params.width,
            height: params.height,
            responses: vec![ResponseSpec {
                identifier: params.response_identifier.clone(),
                format: FormatSpec { mime: "image/tiff" },
            }],
        },
        evalscript: params.evalscript.clone(),
    };

    Ok(ProcessingRequest {
        area: params.area.clone(),
        crs: params.crs,
        time_range: params.time_range,
        output_format: params.output_format,
        response_identifier: params.response_identifier.clone(),
        payload,
    })
}

fn validate(params: &RequestParameters) -> NdviResult<()> {
    if !params.time_range.is_ordered() {
        return Err(NdviError::invalid_param(
            "time_range",
            format!(
                "start {} is after end {}",
                params.time_range.provider_from(),
                params.time_range.provider_to()
            ),
        ));
    }

    params
        .area
        .validate(params.crs)
        .map_err(|message| NdviError::invalid_param("area_of_interest", message))?;

    for (name, value) in [("width", params.width), ("height", params.height)] {
        if value == 0 || value > MAX_OUTPUT_DIMENSION {
            return Err(NdviError::invalid_param(
                name,
                format!("must be between 1 and {}, got {}", MAX_OUTPUT_DIMENSION, value),
            ));
        }
    }

    if params.collection.trim().is_empty() {
        return Err(NdviError::invalid_param("collection", "must not be empty"));
    }

    if params.evalscript.trim().is_empty() {
        return Err(NdviError::invalid_param("evalscript", "must not be empty"));
    }

    // The identifier becomes a file name inside the extraction directory.
    let id = params.response_identifier.as_str();
    if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
        return Err(NdviError::invalid_param(
            "response_identifier",
            format!("'{}' is not a plain file stem", id),
        ));
    }

    Ok(())
}
