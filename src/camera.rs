// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Contains the Camera, which describes a relationship between a
//! rectangle of flame space, given by its left-lower and right-upper
//! corners, and the integral pixel plane of the accumulator, with its
//! origin at the top-left pixel.  The iterator never sees the Camera
//! itself, only the affine map it produces.

use crate::affine::Affine;
use crate::error::RenderError;

/// The x, y of a pixel, column first.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pixel(pub usize, pub usize);

/// Maps a window of flame space onto a `width` × `height` pixel grid.
/// Flame-space y grows upward; pixel rows grow downward.
#[derive(Copy, Clone, Debug)]
pub struct Camera {
    /// Pixel dimensions.
    pub width: usize,
    /// Pixel dimensions.
    pub height: usize,
    /// Left-lower corner of the flame-space window.
    pub leftlower: (f32, f32),
    /// Right-upper corner of the flame-space window.
    pub rightupper: (f32, f32),
    // Pixels per flame-space unit along each axis.
    grid_factors: (f32, f32),
}

impl Camera {
    /// Takes the pixel dimensions and the two corners of the window.
    pub fn new(
        width: usize,
        height: usize,
        leftlower: (f32, f32),
        rightupper: (f32, f32),
    ) -> Result<Camera, RenderError> {
        if !(rightupper.0 > leftlower.0) {
            return Err(RenderError::InvalidConfig(
                "The left lower corner is not to the left of the right upper corner.".to_string(),
            ));
        }
        if !(rightupper.1 > leftlower.1) {
            return Err(RenderError::InvalidConfig(
                "The left lower corner is not lower than the right upper corner".to_string(),
            ));
        }
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidConfig(
                "The pixel plane is empty".to_string(),
            ));
        }

        let grid_factors = (
            (width as f32) / (rightupper.0 - leftlower.0),
            (height as f32) / (rightupper.1 - leftlower.1),
        );

        Ok(Camera {
            width,
            height,
            leftlower,
            rightupper,
            grid_factors,
        })
    }

    /// The window as an affine map into continuous pixel coordinates.
    /// Truncating its output gives the pixel a point falls in.
    pub fn to_affine(&self) -> Affine {
        let (gx, gy) = self.grid_factors;
        Affine {
            a: gx,
            b: 0.0,
            c: -self.leftlower.0 * gx,
            d: 0.0,
            e: -gy,
            f: self.rightupper.1 * gy,
        }
    }

    /// Map a flame-space point to the pixel it falls in, or `None` if
    /// it is outside the window.
    pub fn point_to_pixel(&self, x: f32, y: f32) -> Option<Pixel> {
        let (px, py) = self.to_affine().apply(x, y);
        if !(px >= 0.0 && px < self.width as f32 && py >= 0.0 && py < self.height as f32) {
            return None;
        }
        Some(Pixel(px as usize, py as usize))
    }

    /// The flame-space point at the top-left corner of a pixel.
    pub fn pixel_to_point(&self, pixel: Pixel) -> (f32, f32) {
        (
            (pixel.0 as f32) / self.grid_factors.0 + self.leftlower.0,
            self.rightupper.1 - (pixel.1 as f32) / self.grid_factors.1,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_fails_on_bad_shape() {
        assert!(Camera::new(4, 4, (-1.0, 1.0), (1.0, -1.0)).is_err());
        assert!(Camera::new(4, 4, (1.0, -1.0), (-1.0, 1.0)).is_err());
        assert!(Camera::new(0, 4, (-1.0, -1.0), (1.0, 1.0)).is_err());
    }

    #[test]
    fn camera_passes_on_good_shape() {
        assert!(Camera::new(4, 4, (-1.0, -1.0), (1.0, 1.0)).is_ok());
    }

    #[test]
    fn point_to_pixel_on_mixed_planes() {
        let cam = Camera::new(4, 4, (-2.0, -2.0), (2.0, 2.0)).unwrap();
        assert_eq!(cam.point_to_pixel(0.0, 0.0), Some(Pixel(2, 2)));
        assert_eq!(cam.point_to_pixel(-2.0, 1.99), Some(Pixel(0, 0)));
        assert_eq!(cam.point_to_pixel(1.99, -1.99), Some(Pixel(3, 3)));
        assert_eq!(cam.point_to_pixel(2.0, 0.0), None);
        assert_eq!(cam.point_to_pixel(0.0, -2.5), None);
    }

    #[test]
    fn point_to_pixel_maps_on_large_mixed_planes() {
        let cam = Camera::new(640, 480, (-2.0, -1.5), (2.0, 1.5)).unwrap();
        assert_eq!(cam.point_to_pixel(0.0, 0.0), Some(Pixel(320, 240)));
        assert_eq!(cam.point_to_pixel(1.0, 1.5), Some(Pixel(480, 0)));
    }

    #[test]
    fn pixel_to_point_inverts_the_map() {
        let cam = Camera::new(4, 4, (-2.0, -2.0), (2.0, 2.0)).unwrap();
        assert_eq!(cam.pixel_to_point(Pixel(2, 2)), (0.0, 0.0));
        assert_eq!(cam.pixel_to_point(Pixel(0, 0)), (-2.0, 2.0));
    }

    #[test]
    fn nan_never_lands_on_a_pixel() {
        let cam = Camera::new(4, 4, (-2.0, -2.0), (2.0, 2.0)).unwrap();
        assert_eq!(cam.point_to_pixel(std::f32::NAN, 0.0), None);
    }
}
