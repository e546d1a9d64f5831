// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The palette: a small 2D table of RGBA samples.  The horizontal axis
//! is the running point color, the vertical axis is the fraction of the
//! way through the frame's time step.  Lookups use normalized
//! coordinates with bilinear filtering and clamp at the edges.

use crate::error::RenderError;

/// A read-only RGBA lookup table, stored as floats in [0, 1].
#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    width: usize,
    height: usize,
    texels: Vec<[f32; 4]>,
}

impl Palette {
    /// `width` entries per row, `height` rows (one per time sample),
    /// row-major 8-bit RGBA.
    pub fn new(width: usize, height: usize, rgba: &[[u8; 4]]) -> Result<Self, RenderError> {
        if width == 0 || height == 0 || rgba.len() != width * height {
            return Err(RenderError::InvalidConfig(format!(
                "palette of {}x{} needs {} entries, got {}",
                width,
                height,
                width * height,
                rgba.len()
            )));
        }
        let texels = rgba
            .iter()
            .map(|p| {
                [
                    f32::from(p[0]) / 255.0,
                    f32::from(p[1]) / 255.0,
                    f32::from(p[2]) / 255.0,
                    f32::from(p[3]) / 255.0,
                ]
            })
            .collect();
        Ok(Palette {
            width,
            height,
            texels,
        })
    }

    /// A single-row, fully opaque gradient through `(position, rgb)`
    /// stops.  Stops are sorted by position; colors before the first
    /// and after the last stop are held flat.
    pub fn from_stops(stops: &[(f32, [u8; 3])], width: usize) -> Result<Self, RenderError> {
        if stops.is_empty() {
            return Err(RenderError::InvalidConfig(
                "a palette needs at least one stop".to_string(),
            ));
        }
        let mut stops = stops.to_vec();
        stops.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let lerp = |a: u8, b: u8, t: f32| (f32::from(a) + (f32::from(b) - f32::from(a)) * t).round() as u8;
        let rgba: Vec<[u8; 4]> = (0..width)
            .map(|i| {
                let pos = (i as f32 + 0.5) / width as f32;
                let hi = stops.iter().position(|s| s.0 >= pos);
                let c = match hi {
                    None => stops[stops.len() - 1].1,
                    Some(0) => stops[0].1,
                    Some(h) => {
                        let (p0, c0) = stops[h - 1];
                        let (p1, c1) = stops[h];
                        let t = if p1 > p0 { (pos - p0) / (p1 - p0) } else { 0.0 };
                        [lerp(c0[0], c1[0], t), lerp(c0[1], c1[1], t), lerp(c0[2], c1[2], t)]
                    }
                };
                [c[0], c[1], c[2], 255]
            })
            .collect();
        Palette::new(width, 1, &rgba)
    }

    /// Entries per row.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    fn texel(&self, x: usize, y: usize) -> [f32; 4] {
        self.texels[y * self.width + x]
    }

    /// Bilinear lookup at normalized `(color, time)`.
    #[inline]
    pub fn sample(&self, color: f32, time: f32) -> [f32; 4] {
        let (x0, x1, fx) = Self::axis(color, self.width);
        let (y0, y1, fy) = Self::axis(time, self.height);
        let (a, b) = (self.texel(x0, y0), self.texel(x1, y0));
        let (c, d) = (self.texel(x0, y1), self.texel(x1, y1));
        let mut out = [0.0; 4];
        for i in 0..4 {
            let top = a[i] + (b[i] - a[i]) * fx;
            let bottom = c[i] + (d[i] - c[i]) * fx;
            out[i] = top + (bottom - top) * fy;
        }
        out
    }

    /// Texel-center addressing: coordinate `u` in [0, 1] maps to
    /// `u * n - 0.5`, split into the two neighbours and the blend.
    fn axis(u: f32, n: usize) -> (usize, usize, f32) {
        let pos = u * n as f32 - 0.5;
        if !(pos > 0.0) {
            return (0, 0, 0.0);
        }
        let last = n - 1;
        let i0 = pos.floor() as usize;
        if i0 >= last {
            return (last, last, 0.0);
        }
        (i0, i0 + 1, pos - i0 as f32)
    }
}
