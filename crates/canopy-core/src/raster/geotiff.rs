//! GeoTIFF reading and writing on top of the `tiff` crate.
//!
//! Only chunky (pixel-interleaved) images with 8-bit, 16-bit unsigned or
//! 32-bit float samples are handled. Georeferencing is carried through as
//! raw GeoTIFF tags so a written raster keeps the source projection.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::{
    ColorType, Gray16, Gray32Float, Gray8, RGB16, RGB32Float, RGB8, RGBA16, RGBA32Float, RGBA8,
};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKindStandard, TiffValue};
use tiff::tags::Tag;
use tiff::TiffResult;
use tracing::debug;

use super::{GeoTransform, Raster, SampleFormat};
use crate::error::{CanopyError, Result};

// ── GeoTIFF tag codes ────────────────────────────────────────────────────────

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GEO_DOUBLE_PARAMS: u16 = 34736;
const GEO_ASCII_PARAMS: u16 = 34737;
const GDAL_NODATA: u16 = 42113;

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

// ── Georeferencing ───────────────────────────────────────────────────────────

/// Raw GeoTIFF georeferencing tags, copied verbatim between rasters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoReference {
    pub pixel_scale: Option<Vec<f64>>,
    pub tiepoint: Option<Vec<f64>>,
    /// 4×4 row-major ModelTransformation matrix.
    pub transformation: Option<Vec<f64>>,
    pub geo_keys: Option<Vec<u16>>,
    pub geo_doubles: Option<Vec<f64>>,
    pub geo_ascii: Option<String>,
}

impl GeoReference {
    /// Pixel-scale + tie-point tags for a north-up transform.
    pub fn from_transform(gt: &GeoTransform) -> Self {
        Self {
            pixel_scale: Some(vec![gt.pixel_width, gt.pixel_height.abs(), 0.0]),
            tiepoint: Some(vec![0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0]),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_geo_keys(mut self, keys: Vec<u16>) -> Self {
        self.geo_keys = Some(keys);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.pixel_scale.is_none() && self.tiepoint.is_none() && self.transformation.is_none()
    }

    /// Affine transform described by the tags. ModelTransformation wins over
    /// pixel scale + tie point when both are present.
    pub fn transform(&self) -> Option<GeoTransform> {
        if let Some(m) = self.transformation.as_ref().filter(|m| m.len() >= 8) {
            return Some(GeoTransform {
                origin_x: m[3],
                origin_y: m[7],
                pixel_width: m[0],
                pixel_height: m[5],
                row_rotation: m[1],
                col_rotation: m[4],
            });
        }
        let scale = self.pixel_scale.as_ref().filter(|s| s.len() >= 2)?;
        let tie = self.tiepoint.as_ref().filter(|t| t.len() >= 6)?;
        // tiepoint: [I, J, K, X, Y, Z] maps raster (I, J) to model (X, Y).
        let origin_x = tie[3] - tie[0] * scale[0];
        let origin_y = tie[4] + tie[1] * scale[1];
        Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
    }

    /// Tags for a window whose top-left pixel is `(col, row)` of this raster.
    /// Projection keys are kept; the model origin moves to the window corner.
    pub fn offset(&self, col: usize, row: usize) -> Self {
        let Some(gt) = self.transform() else {
            return self.clone();
        };
        let (x, y) = gt.pixel_to_geo_corner(col as f64, row as f64);
        let mut out = self.clone();
        if let Some(m) = out.transformation.as_mut().filter(|m| m.len() >= 8) {
            m[3] = x;
            m[7] = y;
        }
        if out.tiepoint.is_some() {
            out.tiepoint = Some(vec![0.0, 0.0, 0.0, x, y, 0.0]);
        }
        out
    }
}

// ── Reading ──────────────────────────────────────────────────────────────────

/// Read a GeoTIFF into a band-major [`Raster`].
pub fn read_geotiff(path: impl AsRef<Path>) -> Result<Raster> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| CanopyError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    decode_geotiff(BufReader::new(file), path)
}

fn decode_geotiff<R: Read + Seek>(reader: R, path: &Path) -> Result<Raster> {
    let tiff_err = |source| CanopyError::Tiff {
        path: path.to_path_buf(),
        source,
    };
    let mut decoder = Decoder::new(reader)
        .map_err(tiff_err)?
        .with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions().map_err(tiff_err)?;
    let (width, height) = (width as usize, height as usize);
    let georef = read_georef(&mut decoder).map_err(tiff_err)?;
    let nodata = read_nodata(&mut decoder).map_err(tiff_err)?;

    let (format, samples): (SampleFormat, Vec<f32>) = match decoder.read_image().map_err(tiff_err)? {
        DecodingResult::U8(v) => (SampleFormat::U8, v.into_iter().map(f32::from).collect()),
        DecodingResult::U16(v) => (SampleFormat::U16, v.into_iter().map(f32::from).collect()),
        DecodingResult::F32(v) => (SampleFormat::F32, v),
        _ => {
            return Err(CanopyError::UnsupportedSampleFormat {
                path: path.to_path_buf(),
                detail: "expected u8, u16 or f32 samples".to_string(),
            })
        }
    };

    let n_pixels = width * height;
    if n_pixels == 0 || samples.len() % n_pixels != 0 {
        return Err(CanopyError::UnsupportedSampleFormat {
            path: path.to_path_buf(),
            detail: format!("{} samples for a {width}x{height} image", samples.len()),
        });
    }
    let n_bands = samples.len() / n_pixels;
    let mut bands = vec![Vec::with_capacity(n_pixels); n_bands];
    for pixel in samples.chunks_exact(n_bands) {
        for (band, &v) in bands.iter_mut().zip(pixel) {
            band.push(v);
        }
    }

    debug!(path = %path.display(), width, height, n_bands, ?format, "read raster");

    Ok(Raster::from_bands(width, height, bands, format)?
        .with_georef(georef)
        .with_nodata(nodata))
}

fn find_f64s<R: Read + Seek>(decoder: &mut Decoder<R>, code: u16) -> TiffResult<Option<Vec<f64>>> {
    decoder.find_tag(tag(code))?.map(|v| v.into_f64_vec()).transpose()
}

fn find_u16s<R: Read + Seek>(decoder: &mut Decoder<R>, code: u16) -> TiffResult<Option<Vec<u16>>> {
    decoder.find_tag(tag(code))?.map(|v| v.into_u16_vec()).transpose()
}

fn find_ascii<R: Read + Seek>(decoder: &mut Decoder<R>, code: u16) -> TiffResult<Option<String>> {
    decoder.find_tag(tag(code))?.map(|v| v.into_string()).transpose()
}

fn read_georef<R: Read + Seek>(decoder: &mut Decoder<R>) -> TiffResult<GeoReference> {
    Ok(GeoReference {
        pixel_scale: find_f64s(decoder, MODEL_PIXEL_SCALE)?,
        tiepoint: find_f64s(decoder, MODEL_TIEPOINT)?,
        transformation: find_f64s(decoder, MODEL_TRANSFORMATION)?,
        geo_keys: find_u16s(decoder, GEO_KEY_DIRECTORY)?,
        geo_doubles: find_f64s(decoder, GEO_DOUBLE_PARAMS)?,
        geo_ascii: find_ascii(decoder, GEO_ASCII_PARAMS)?,
    })
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> TiffResult<Option<f64>> {
    let Some(raw) = find_ascii(decoder, GDAL_NODATA)? else {
        return Ok(None);
    };
    let trimmed = raw.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    match trimmed.parse::<f64>() {
        Ok(v) => Ok(Some(v)),
        Err(_) => {
            debug!(raw = trimmed, "ignoring unparseable GDAL_NODATA tag");
            Ok(None)
        }
    }
}

// ── Writing ──────────────────────────────────────────────────────────────────

/// Write a raster as an uncompressed GeoTIFF, keeping its sample format,
/// georeferencing tags and no-data value.
pub fn write_geotiff(raster: &Raster, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| CanopyError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    encode_geotiff(raster, &mut writer, path)?;
    writer.flush().map_err(|source| CanopyError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), width = raster.width, height = raster.height, "wrote raster");
    Ok(())
}

fn encode_geotiff<W: Write + Seek>(raster: &Raster, writer: W, path: &Path) -> Result<()> {
    let tiff_err = |source| CanopyError::Tiff {
        path: path.to_path_buf(),
        source,
    };
    let mut encoder = TiffEncoder::new(writer).map_err(tiff_err)?;

    let written = match (raster.format, raster.n_bands()) {
        (SampleFormat::U8, 1) => encode_image::<Gray8, _>(&mut encoder, raster, &interleave(raster, |v| v as u8)),
        (SampleFormat::U8, 3) => encode_image::<RGB8, _>(&mut encoder, raster, &interleave(raster, |v| v as u8)),
        (SampleFormat::U8, 4) => encode_image::<RGBA8, _>(&mut encoder, raster, &interleave(raster, |v| v as u8)),
        (SampleFormat::U16, 1) => encode_image::<Gray16, _>(&mut encoder, raster, &interleave(raster, |v| v as u16)),
        (SampleFormat::U16, 3) => encode_image::<RGB16, _>(&mut encoder, raster, &interleave(raster, |v| v as u16)),
        (SampleFormat::U16, 4) => encode_image::<RGBA16, _>(&mut encoder, raster, &interleave(raster, |v| v as u16)),
        (SampleFormat::F32, 1) => encode_image::<Gray32Float, _>(&mut encoder, raster, &interleave(raster, |v| v)),
        (SampleFormat::F32, 3) => encode_image::<RGB32Float, _>(&mut encoder, raster, &interleave(raster, |v| v)),
        (SampleFormat::F32, 4) => encode_image::<RGBA32Float, _>(&mut encoder, raster, &interleave(raster, |v| v)),
        (format, n) => {
            return Err(CanopyError::UnsupportedSampleFormat {
                path: path.to_path_buf(),
                detail: format!("cannot write {n} band(s) of {format:?}"),
            })
        }
    };
    written.map_err(tiff_err)
}

/// Band-major to pixel-interleaved, quantized to the raster's format.
fn interleave<T>(raster: &Raster, cast: impl Fn(f32) -> T) -> Vec<T> {
    let n_pixels = raster.n_pixels();
    let mut out = Vec::with_capacity(n_pixels * raster.n_bands());
    for i in 0..n_pixels {
        for band in &raster.bands {
            out.push(cast(raster.format.quantize(band[i])));
        }
    }
    out
}

fn encode_image<C, W>(encoder: &mut TiffEncoder<W>, raster: &Raster, data: &[C::Inner]) -> TiffResult<()>
where
    C: ColorType,
    [C::Inner]: TiffValue,
    W: Write + Seek,
{
    let mut image = encoder.new_image::<C>(raster.width as u32, raster.height as u32)?;
    write_georef_tags(image.encoder(), &raster.georef, raster.nodata)?;
    image.write_data(data)
}

fn write_georef_tags<W: Write + Seek>(
    dir: &mut DirectoryEncoder<'_, W, TiffKindStandard>,
    georef: &GeoReference,
    nodata: Option<f64>,
) -> TiffResult<()> {
    if let Some(v) = &georef.pixel_scale {
        dir.write_tag(tag(MODEL_PIXEL_SCALE), v.as_slice())?;
    }
    if let Some(v) = &georef.tiepoint {
        dir.write_tag(tag(MODEL_TIEPOINT), v.as_slice())?;
    }
    if let Some(v) = &georef.transformation {
        dir.write_tag(tag(MODEL_TRANSFORMATION), v.as_slice())?;
    }
    if let Some(v) = &georef.geo_keys {
        dir.write_tag(tag(GEO_KEY_DIRECTORY), v.as_slice())?;
    }
    if let Some(v) = &georef.geo_doubles {
        dir.write_tag(tag(GEO_DOUBLE_PARAMS), v.as_slice())?;
    }
    if let Some(s) = &georef.geo_ascii {
        dir.write_tag(tag(GEO_ASCII_PARAMS), s.trim_end_matches('\0'))?;
    }
    if let Some(v) = nodata {
        dir.write_tag(tag(GDAL_NODATA), format!("{v}").as_str())?;
    }
    Ok(())
}
