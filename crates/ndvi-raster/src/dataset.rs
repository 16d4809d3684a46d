//! First-band GeoTIFF reader.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use ndvi_common::{NdviError, NdviResult};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tiff::TiffError;
use tracing::debug;

/// GDAL_NODATA (ASCII).
const GDAL_NODATA_TAG: u16 = 42113;

/// One band of a raster, widened to f64.
///
/// Samples are row-major. For interleaved multi-sample images only the first
/// sample of each pixel is kept.
#[derive(Debug, Clone)]
pub struct RasterDataset {
    path: PathBuf,
    width: u32,
    height: u32,
    samples_per_pixel: usize,
    values: Vec<f64>,
    nodata_tag: Option<f64>,
}

impl RasterDataset {
    /// Open and decode a TIFF file.
    pub fn open(path: &Path) -> NdviResult<Self> {
        let file = File::open(path).map_err(|e| NdviError::RasterReadError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut decoder =
            Decoder::new(BufReader::new(file)).map_err(|e| tiff_error(path, e))?;

        let (width, height) = decoder.dimensions().map_err(|e| tiff_error(path, e))?;
        let nodata_tag = read_nodata_tag(&mut decoder, path);

        let samples = decoder.read_image().map_err(|e| tiff_error(path, e))?;
        let samples = widen(samples).ok_or_else(|| NdviError::RasterFormatError {
            path: path.to_path_buf(),
            message: "unsupported sample format".to_string(),
        })?;

        let pixels = width as usize * height as usize;
        if pixels == 0 || samples.len() % pixels != 0 {
            return Err(NdviError::RasterFormatError {
                path: path.to_path_buf(),
                message: format!(
                    "{} samples do not fit a {}x{} raster",
                    samples.len(),
                    width,
                    height
                ),
            });
        }

        let samples_per_pixel = samples.len() / pixels;
        let values = if samples_per_pixel == 1 {
            samples
        } else {
            samples.into_iter().step_by(samples_per_pixel).collect()
        };

        debug!(
            path = %path.display(),
            width,
            height,
            samples_per_pixel,
            nodata_tag = ?nodata_tag,
            "Raster decoded"
        );

        Ok(Self {
            path: path.to_path_buf(),
            width,
            height,
            samples_per_pixel,
            values,
            nodata_tag,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn samples_per_pixel(&self) -> usize {
        self.samples_per_pixel
    }

    /// First-band values, row-major.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn pixel_count(&self) -> usize {
        self.values.len()
    }

    /// No-data value declared in the file, if any.
    pub fn nodata_tag(&self) -> Option<f64> {
        self.nodata_tag
    }
}

fn tiff_error(path: &Path, e: TiffError) -> NdviError {
    match e {
        TiffError::IoError(io) => NdviError::RasterReadError {
            path: path.to_path_buf(),
            message: io.to_string(),
        },
        other => NdviError::RasterFormatError {
            path: path.to_path_buf(),
            message: other.to_string(),
        },
    }
}

fn read_nodata_tag<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    path: &Path,
) -> Option<f64> {
    let value = match decoder.find_tag(Tag::from_u16_exhaustive(GDAL_NODATA_TAG)) {
        Ok(Some(value)) => value,
        Ok(None) => return None,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Unreadable GDAL_NODATA tag");
            return None;
        }
    };

    let text = value.into_string().ok()?;
    let parsed = text.trim_matches(|c: char| c == '\0' || c.is_whitespace()).parse::<f64>();
    match parsed {
        Ok(v) => Some(v),
        Err(_) => {
            debug!(path = %path.display(), tag = %text, "GDAL_NODATA tag is not numeric");
            None
        }
    }
}

fn widen(result: DecodingResult) -> Option<Vec<f64>> {
    let values = match result {
        DecodingResult::U8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::U64(buf) => buf.into_iter().map(|v| v as f64).collect(),
        DecodingResult::I8(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I16(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::I64(buf) => buf.into_iter().map(|v| v as f64).collect(),
        DecodingResult::F32(buf) => buf.into_iter().map(f64::from).collect(),
        DecodingResult::F64(buf) => buf,
        #[allow(unreachable_patterns)]
        _ => return None,
    };
    Some(values)
}
