// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Six-coefficient affine maps, used both for the pre-transform of every
//! xform and for the camera.

/// `x' = a*x + b*y + c`, `y' = d*x + e*y + f`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Affine {
    /// x weight in x'.
    pub a: f32,
    /// y weight in x'.
    pub b: f32,
    /// x' offset.
    pub c: f32,
    /// x weight in y'.
    pub d: f32,
    /// y weight in y'.
    pub e: f32,
    /// y' offset.
    pub f: f32,
}

impl Affine {
    /// The identity map.
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 0.0,
        e: 1.0,
        f: 0.0,
    };

    /// Coefficients in `[a, b, c, d, e, f]` order.
    pub fn from_coefs(c: [f32; 6]) -> Self {
        Affine {
            a: c[0],
            b: c[1],
            c: c[2],
            d: c[3],
            e: c[4],
            f: c[5],
        }
    }

    /// The inverse of `from_coefs`.
    pub fn coefs(&self) -> [f32; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }

    /// Map `(x, y)`.
    #[inline]
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.a * x + self.b * y + self.c,
            self.d * x + self.e * y + self.f,
        )
    }
}

impl Default for Affine {
    fn default() -> Self {
        Affine::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_leaves_points_alone() {
        assert_eq!(Affine::IDENTITY.apply(0.25, -3.0), (0.25, -3.0));
    }

    #[test]
    fn coefficients_follow_row_order() {
        let m = Affine::from_coefs([2.0, 0.0, 1.0, 0.0, 3.0, -1.0]);
        assert_eq!(m.apply(1.0, 1.0), (3.0, 2.0));
        assert_eq!(m.coefs(), [2.0, 0.0, 1.0, 0.0, 3.0, -1.0]);
    }
}
