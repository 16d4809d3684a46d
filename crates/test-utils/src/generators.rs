//! Test data generators for synthetic NDVI rasters and response archives.
//!
//! Everything is built in memory so tests never depend on recorded scenes.

use std::io::{Cursor, Write};

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Builder, EntryType, Header};
use tiff::encoder::colortype::{Gray32Float, GrayI16, RGB8};
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

/// GDAL no-data tag, stored as ASCII.
const GDAL_NODATA: u16 = 42113;

/// Creates a scaled NDVI grid (NDVI * 10000) as INT16.
///
/// Values ramp from -2000 at the left edge to 8000 at the right edge, like a
/// transect from water to dense vegetation.
pub fn create_scaled_ndvi_grid(width: usize, height: usize) -> Vec<i16> {
    let mut data = Vec::with_capacity(width * height);
    for _row in 0..height {
        for col in 0..width {
            let t = if width > 1 {
                col as f64 / (width - 1) as f64
            } else {
                0.0
            };
            data.push((-2000.0 + t * 10000.0).round() as i16);
        }
    }
    data
}

/// Encodes a single-band Float32 GeoTIFF in memory.
///
/// `nodata` is written to the GDAL_NODATA tag when given.
pub fn geotiff_f32(width: u32, height: u32, data: &[f32], nodata: Option<&str>) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut encoder = TiffEncoder::new(Cursor::new(&mut buf)).expect("tiff encoder");
        let mut image = encoder
            .new_image::<Gray32Float>(width, height)
            .expect("tiff image");
        if let Some(nodata) = nodata {
            image
                .encoder()
                .write_tag(Tag::from_u16_exhaustive(GDAL_NODATA), nodata)
                .expect("nodata tag");
        }
        image.write_data(data).expect("tiff data");
    }
    buf
}

/// Encodes a single-band INT16 GeoTIFF in memory, the layout the built-in
/// evalscript produces.
pub fn geotiff_i16(width: u32, height: u32, data: &[i16], nodata: Option<&str>) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut encoder = TiffEncoder::new(Cursor::new(&mut buf)).expect("tiff encoder");
        let mut image = encoder
            .new_image::<GrayI16>(width, height)
            .expect("tiff image");
        if let Some(nodata) = nodata {
            image
                .encoder()
                .write_tag(Tag::from_u16_exhaustive(GDAL_NODATA), nodata)
                .expect("nodata tag");
        }
        image.write_data(data).expect("tiff data");
    }
    buf
}

/// Encodes a three-sample RGB8 TIFF from interleaved samples.
pub fn tiff_rgb8(width: u32, height: u32, interleaved: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut encoder = TiffEncoder::new(Cursor::new(&mut buf)).expect("tiff encoder");
        encoder
            .write_image::<RGB8>(width, height, interleaved)
            .expect("tiff image");
    }
    buf
}

/// Builds an uncompressed tar archive holding the given regular files.
///
/// Names may contain directories, e.g. `"outputs/default.tif"`.
pub fn tar_with_files(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = Builder::new(Vec::new());
    for (name, data) in files {
        let mut header = Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(EntryType::Regular);
        builder
            .append_data(&mut header, name, *data)
            .expect("tar entry");
    }
    builder.into_inner().expect("tar finish")
}

/// Builds a tar archive with one regular entry whose name is written into
/// the header verbatim, bypassing the path checks the tar builder applies.
///
/// Used to produce hostile entries such as `../escape.tif` or `/etc/x`.
pub fn tar_with_raw_entry(raw_name: &str, data: &[u8]) -> Vec<u8> {
    let mut header = Header::new_old();
    {
        let name = &mut header.as_old_mut().name;
        let bytes = raw_name.as_bytes();
        assert!(bytes.len() < name.len(), "raw tar name too long");
        name[..bytes.len()].copy_from_slice(bytes);
    }
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_entry_type(EntryType::Regular);
    header.set_cksum();

    let mut builder = Builder::new(Vec::new());
    builder.append(&header, data).expect("tar entry");
    builder.into_inner().expect("tar finish")
}

/// Builds a tar archive holding a single symbolic link.
pub fn tar_with_symlink(name: &str, target: &str) -> Vec<u8> {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Symlink);
    header.set_size(0);
    header.set_mode(0o777);

    let mut builder = Builder::new(Vec::new());
    builder
        .append_link(&mut header, name, target)
        .expect("tar link");
    builder.into_inner().expect("tar finish")
}

/// Gzip-compresses a buffer.
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("gzip write");
    encoder.finish().expect("gzip finish")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_ndvi_grid_range() {
        let grid = create_scaled_ndvi_grid(11, 2);
        assert_eq!(grid[0], -2000);
        assert_eq!(grid[10], 8000);
        assert_eq!(grid[5], 3000);
        assert_eq!(grid[11], -2000);
    }

    #[test]
    fn test_geotiff_has_tiff_signature() {
        let bytes = geotiff_f32(2, 2, &[0.1, 0.2, 0.3, -9999.0], Some("-9999"));
        assert_eq!(&bytes[..4], b"II*\0");

        let bytes = geotiff_i16(2, 1, &[100, -32768], None);
        assert_eq!(&bytes[..4], b"II*\0");
    }

    #[test]
    fn test_tar_has_ustar_magic() {
        let bytes = tar_with_files(&[("default.tif", b"abc")]);
        assert_eq!(&bytes[257..262], b"ustar");
        assert_eq!(&bytes[..11], b"default.tif");
    }

    #[test]
    fn test_raw_entry_keeps_parent_component() {
        let bytes = tar_with_raw_entry("../escape.tif", b"x");
        assert_eq!(&bytes[..13], b"../escape.tif");
    }

    #[test]
    fn test_gzip_magic() {
        let bytes = gzip(b"hello");
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
    }
}
