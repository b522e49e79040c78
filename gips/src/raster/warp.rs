//! Resampling and compositing on a single spatial reference system.

use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{GridRaster, RasterError, TargetGrid};

/// Resampling method used when warping to a target grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    #[default]
    Nearest,
    Bilinear,
    Cubic,
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interpolation::Nearest => write!(f, "nearest"),
            Interpolation::Bilinear => write!(f, "bilinear"),
            Interpolation::Cubic => write!(f, "cubic"),
        }
    }
}

/// Unrecognized interpolation name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown interpolation '{0}' (expected nearest, bilinear or cubic)")]
pub struct ParseInterpolationError(pub String);

impl FromStr for Interpolation {
    type Err = ParseInterpolationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" | "near" => Ok(Interpolation::Nearest),
            "bilinear" => Ok(Interpolation::Bilinear),
            "cubic" => Ok(Interpolation::Cubic),
            _ => Err(ParseInterpolationError(s.to_string())),
        }
    }
}

/// Whether two SRS strings name the same system.
pub fn same_srs(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Resample `src` onto `target`.
///
/// Target pixels whose centers fall outside the source, or whose
/// neighbourhood is entirely missing, stay missing. Interpolation near
/// missing pixels degrades to the next simpler method.
pub fn warp(
    src: &GridRaster,
    target: &TargetGrid,
    interpolation: Interpolation,
) -> Result<GridRaster, RasterError> {
    if !same_srs(&src.srs, &target.srs) {
        return Err(RasterError::UnsupportedReprojection {
            from: src.srs.clone(),
            to: target.srs.clone(),
        });
    }

    if target.pixel_count() == 0 {
        return Err(RasterError::InvalidGrid("target grid has no pixels".to_string()));
    }

    let mut out = GridRaster::filled(target, src.band_count(), src.nodata);
    out.band_descriptions = src.band_descriptions.clone();
    out.metadata = src.metadata.clone();

    let max_x = src.width as f64 - 0.5;
    let max_y = src.height as f64 - 0.5;

    for (band, values) in out.bands.iter_mut().enumerate() {
        values
            .par_chunks_mut(target.width)
            .enumerate()
            .for_each(|(row, line)| {
                for (col, value) in line.iter_mut().enumerate() {
                    let (x, y) = target.transform.pixel_center(col, row);
                    let (fx, fy) = src.transform.to_pixel(x, y);
                    if fx < -0.5 || fy < -0.5 || fx >= max_x || fy >= max_y {
                        continue;
                    }
                    if let Some(v) = sample(src, band, fx, fy, interpolation) {
                        *value = v;
                    }
                }
            });
    }
    Ok(out)
}

fn sample(src: &GridRaster, band: usize, fx: f64, fy: f64, method: Interpolation) -> Option<f32> {
    match method {
        Interpolation::Nearest => nearest(src, band, fx, fy),
        Interpolation::Bilinear => {
            bilinear(src, band, fx, fy).or_else(|| nearest(src, band, fx, fy))
        }
        Interpolation::Cubic => cubic(src, band, fx, fy)
            .or_else(|| bilinear(src, band, fx, fy))
            .or_else(|| nearest(src, band, fx, fy)),
    }
}

fn clamp_index(i: f64, len: usize) -> usize {
    i.max(0.0).min(len as f64 - 1.0) as usize
}

fn data(src: &GridRaster, band: usize, col: usize, row: usize) -> Option<f64> {
    let v = src.value(band, col, row);
    (!src.is_nodata(v)).then_some(v as f64)
}

fn nearest(src: &GridRaster, band: usize, fx: f64, fy: f64) -> Option<f32> {
    let col = clamp_index((fx + 0.5).floor(), src.width);
    let row = clamp_index((fy + 0.5).floor(), src.height);
    data(src, band, col, row).map(|v| v as f32)
}

fn bilinear(src: &GridRaster, band: usize, fx: f64, fy: f64) -> Option<f32> {
    let (x0, y0) = (fx.floor(), fy.floor());
    let (tx, ty) = (fx - x0, fy - y0);
    let c0 = clamp_index(x0, src.width);
    let c1 = clamp_index(x0 + 1.0, src.width);
    let r0 = clamp_index(y0, src.height);
    let r1 = clamp_index(y0 + 1.0, src.height);

    let top = data(src, band, c0, r0)? * (1.0 - tx) + data(src, band, c1, r0)? * tx;
    let bottom = data(src, band, c0, r1)? * (1.0 - tx) + data(src, band, c1, r1)? * tx;
    Some((top * (1.0 - ty) + bottom * ty) as f32)
}

/// Catmull-Rom kernel (a = -0.5).
fn cubic_weight(t: f64) -> f64 {
    const A: f64 = -0.5;
    let t = t.abs();
    if t <= 1.0 {
        (A + 2.0) * t.powi(3) - (A + 3.0) * t.powi(2) + 1.0
    } else if t < 2.0 {
        A * t.powi(3) - 5.0 * A * t.powi(2) + 8.0 * A * t - 4.0 * A
    } else {
        0.0
    }
}

fn cubic(src: &GridRaster, band: usize, fx: f64, fy: f64) -> Option<f32> {
    let (x0, y0) = (fx.floor(), fy.floor());
    let mut sum = 0.0;
    for j in -1..=2 {
        let wy = cubic_weight(fy - (y0 + j as f64));
        let row = clamp_index(y0 + j as f64, src.height);
        for i in -1..=2 {
            let wx = cubic_weight(fx - (x0 + i as f64));
            let col = clamp_index(x0 + i as f64, src.width);
            sum += data(src, band, col, row)? * wx * wy;
        }
    }
    Some(sum as f32)
}

/// Copy every non-missing pixel of `src` over `dst`.
///
/// Both rasters must share a grid and band count. Returns the number of
/// pixels written.
pub fn merge_into(dst: &mut GridRaster, src: &GridRaster) -> Result<usize, RasterError> {
    if dst.width != src.width || dst.height != src.height || dst.band_count() != src.band_count() {
        return Err(RasterError::ShapeMismatch(format!(
            "cannot merge {}x{}x{} into {}x{}x{}",
            src.width,
            src.height,
            src.band_count(),
            dst.width,
            dst.height,
            dst.band_count()
        )));
    }

    let mut written = 0;
    for (band, values) in src.bands.iter().enumerate() {
        for (i, v) in values.iter().enumerate() {
            if !src.is_nodata(*v) {
                dst.bands[band][i] = *v;
                written += 1;
            }
        }
    }
    Ok(written)
}

/// Concatenate the bands of rasters sharing one grid.
pub fn stack(layers: Vec<GridRaster>) -> Result<GridRaster, RasterError> {
    let mut layers = layers.into_iter();
    let mut out = layers
        .next()
        .ok_or_else(|| RasterError::ShapeMismatch("nothing to stack".to_string()))?;

    for layer in layers {
        if layer.width != out.width || layer.height != out.height {
            return Err(RasterError::ShapeMismatch(format!(
                "cannot stack {}x{} onto {}x{}",
                layer.width, layer.height, out.width, out.height
            )));
        }
        let nodata = out.nodata.unwrap_or(f32::NAN);
        for mut band in layer.bands {
            if layer.nodata != out.nodata {
                for v in band.iter_mut() {
                    if v.is_nan() || layer.nodata == Some(*v) {
                        *v = nodata;
                    }
                }
            }
            out.bands.push(band);
        }
        out.band_descriptions.extend(layer.band_descriptions);
    }
    Ok(out)
}
