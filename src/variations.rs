// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The variation registry.  A variation is a nonlinear map that takes
//! the affine-transformed point and a weight and returns a contribution
//! that the xform sums into its output.  The set is closed: every kind
//! the iterator knows about is a variant of `Variation`, parameters and
//! all, and `Variation::apply` is the single place that dispatches on
//! it.
//!
//! Variations are treated as black boxes by the iterator.  They must
//! return finite values for finite input under sane parameters, but
//! nothing downstream checks that they do.

use std::f32::consts::PI;

use serde::Deserialize;

use crate::rng::Mwc;

const EPS: f32 = 1e-10;

/// The tag of a variation, without its parameters.  This is what the
/// compile-time shape of a launch records.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariationKind {
    /// [`Variation::Linear`].
    Linear,
    /// [`Variation::Sinusoidal`].
    Sinusoidal,
    /// [`Variation::Spherical`].
    Spherical,
    /// [`Variation::Swirl`].
    Swirl,
    /// [`Variation::Horseshoe`].
    Horseshoe,
    /// [`Variation::Polar`].
    Polar,
    /// [`Variation::Handkerchief`].
    Handkerchief,
    /// [`Variation::Heart`].
    Heart,
    /// [`Variation::Disc`].
    Disc,
    /// [`Variation::Spiral`].
    Spiral,
    /// [`Variation::Hyperbolic`].
    Hyperbolic,
    /// [`Variation::Diamond`].
    Diamond,
    /// [`Variation::Ex`].
    Ex,
    /// [`Variation::Julia`].
    Julia,
    /// [`Variation::Bent`].
    Bent,
    /// [`Variation::Fisheye`].
    Fisheye,
    /// [`Variation::Exponential`].
    Exponential,
    /// [`Variation::Power`].
    Power,
    /// [`Variation::Cosine`].
    Cosine,
    /// [`Variation::Bubble`].
    Bubble,
    /// [`Variation::Cylinder`].
    Cylinder,
    /// [`Variation::Eyefish`].
    Eyefish,
    /// [`Variation::Blur`].
    Blur,
    /// [`Variation::GaussianBlur`].
    GaussianBlur,
    /// [`Variation::Noise`].
    Noise,
    /// [`Variation::Tangent`].
    Tangent,
    /// [`Variation::Square`].
    Square,
    /// [`Variation::Rings2`].
    Rings2,
    /// [`Variation::Fan2`].
    Fan2,
    /// [`Variation::Blob`].
    Blob,
    /// [`Variation::Pdj`].
    Pdj,
    /// [`Variation::Curl`].
    Curl,
    /// [`Variation::Perspective`].
    Perspective,
    /// [`Variation::Julian`].
    Julian,
    /// [`Variation::Rectangles`].
    Rectangles,
}

impl VariationKind {
    /// How many floats of parameters the kind carries in a packed block.
    pub fn nparams(self) -> usize {
        use self::VariationKind::*;
        match self {
            Rings2 => 1,
            Fan2 | Curl | Perspective | Julian | Rectangles => 2,
            Blob => 3,
            Pdj => 4,
            _ => 0,
        }
    }

    /// Rebuild the typed variation from its packed parameters.  Returns
    /// `None` when the slice is the wrong length for the kind.
    pub fn from_params(self, p: &[f32]) -> Option<Variation> {
        use self::VariationKind as K;
        if p.len() != self.nparams() {
            return None;
        }
        Some(match self {
            K::Linear => Variation::Linear,
            K::Sinusoidal => Variation::Sinusoidal,
            K::Spherical => Variation::Spherical,
            K::Swirl => Variation::Swirl,
            K::Horseshoe => Variation::Horseshoe,
            K::Polar => Variation::Polar,
            K::Handkerchief => Variation::Handkerchief,
            K::Heart => Variation::Heart,
            K::Disc => Variation::Disc,
            K::Spiral => Variation::Spiral,
            K::Hyperbolic => Variation::Hyperbolic,
            K::Diamond => Variation::Diamond,
            K::Ex => Variation::Ex,
            K::Julia => Variation::Julia,
            K::Bent => Variation::Bent,
            K::Fisheye => Variation::Fisheye,
            K::Exponential => Variation::Exponential,
            K::Power => Variation::Power,
            K::Cosine => Variation::Cosine,
            K::Bubble => Variation::Bubble,
            K::Cylinder => Variation::Cylinder,
            K::Eyefish => Variation::Eyefish,
            K::Blur => Variation::Blur,
            K::GaussianBlur => Variation::GaussianBlur,
            K::Noise => Variation::Noise,
            K::Tangent => Variation::Tangent,
            K::Square => Variation::Square,
            K::Rings2 => Variation::Rings2 { val: p[0] },
            K::Fan2 => Variation::Fan2 { x: p[0], y: p[1] },
            K::Blob => Variation::Blob {
                low: p[0],
                high: p[1],
                waves: p[2],
            },
            K::Pdj => Variation::Pdj {
                a: p[0],
                b: p[1],
                c: p[2],
                d: p[3],
            },
            K::Curl => Variation::Curl { c1: p[0], c2: p[1] },
            K::Perspective => Variation::Perspective {
                angle: p[0],
                dist: p[1],
            },
            K::Julian => Variation::Julian {
                power: p[0],
                dist: p[1],
            },
            K::Rectangles => Variation::Rectangles { x: p[0], y: p[1] },
        })
    }
}

/// A variation together with its parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Variation {
    /// The point itself.
    Linear,
    /// `sin` of each coordinate.
    Sinusoidal,
    /// Inversion through the unit circle.
    Spherical,
    /// Rotation by an angle that grows with `r²`.
    Swirl,
    /// Doubles the angle, keeps the radius.
    Horseshoe,
    /// Angle and radius, as Cartesian coordinates.
    Polar,
    /// The classic `handkerchief` map.
    Handkerchief,
    /// The classic `heart` map.
    Heart,
    /// The classic `disc` map.
    Disc,
    /// The classic `spiral` map.
    Spiral,
    /// The classic `hyperbolic` map.
    Hyperbolic,
    /// The classic `diamond` map.
    Diamond,
    /// The classic `ex` map.
    Ex,
    /// Square root in the complex plane, random branch.
    Julia,
    /// Stretches the left half, squashes the bottom half.
    Bent,
    /// Radial compression with the axes swapped.
    Fisheye,
    /// Complex exponential.
    Exponential,
    /// Radius raised to the sine of the angle.
    Power,
    /// Complex cosine.
    Cosine,
    /// Stereographic projection onto a sphere.
    Bubble,
    /// `sin` of x, y unchanged.
    Cylinder,
    /// Fisheye without the swap.
    Eyefish,
    /// A random point in the disc of radius `w`.
    Blur,
    /// A random point, radius roughly normal.
    GaussianBlur,
    /// The point scaled by a random vector.
    Noise,
    /// The classic `tangent` map.
    Tangent,
    /// A random point in the square of side `w`.
    Square,
    /// Concentric rings.
    Rings2 {
        /// Ring spacing.
        val: f32,
    },
    /// Alternating wedges.
    Fan2 {
        /// Wedge width.
        x: f32,
        /// Wedge phase.
        y: f32,
    },
    /// Radius modulated by a wave around the origin.
    Blob {
        /// Smallest radius factor.
        low: f32,
        /// Largest radius factor.
        high: f32,
        /// Waves per turn.
        waves: f32,
    },
    /// Peter de Jong map.
    Pdj {
        /// Frequency of `sin(a·y)` in x.
        a: f32,
        /// Frequency of `cos(b·x)` in x.
        b: f32,
        /// Frequency of `sin(c·x)` in y.
        c: f32,
        /// Frequency of `cos(d·y)` in y.
        d: f32,
    },
    /// Complex curl.
    Curl {
        /// Linear coefficient.
        c1: f32,
        /// Quadratic coefficient.
        c2: f32,
    },
    /// Tilt toward the viewer.
    Perspective {
        /// Tilt, in radians.
        angle: f32,
        /// Viewer distance.
        dist: f32,
    },
    /// Generalized julia, `power` branches.
    Julian {
        /// Branch count.
        power: f32,
        /// Radius exponent numerator.
        dist: f32,
    },
    /// Snaps the point onto a grid of rectangles.
    Rectangles {
        /// Cell width.
        x: f32,
        /// Cell height.
        y: f32,
    },
}

impl Variation {
    /// The tag of this variation.
    pub fn kind(&self) -> VariationKind {
        use self::Variation as V;
        use self::VariationKind as K;
        match *self {
            V::Linear => K::Linear,
            V::Sinusoidal => K::Sinusoidal,
            V::Spherical => K::Spherical,
            V::Swirl => K::Swirl,
            V::Horseshoe => K::Horseshoe,
            V::Polar => K::Polar,
            V::Handkerchief => K::Handkerchief,
            V::Heart => K::Heart,
            V::Disc => K::Disc,
            V::Spiral => K::Spiral,
            V::Hyperbolic => K::Hyperbolic,
            V::Diamond => K::Diamond,
            V::Ex => K::Ex,
            V::Julia => K::Julia,
            V::Bent => K::Bent,
            V::Fisheye => K::Fisheye,
            V::Exponential => K::Exponential,
            V::Power => K::Power,
            V::Cosine => K::Cosine,
            V::Bubble => K::Bubble,
            V::Cylinder => K::Cylinder,
            V::Eyefish => K::Eyefish,
            V::Blur => K::Blur,
            V::GaussianBlur => K::GaussianBlur,
            V::Noise => K::Noise,
            V::Tangent => K::Tangent,
            V::Square => K::Square,
            V::Rings2 { .. } => K::Rings2,
            V::Fan2 { .. } => K::Fan2,
            V::Blob { .. } => K::Blob,
            V::Pdj { .. } => K::Pdj,
            V::Curl { .. } => K::Curl,
            V::Perspective { .. } => K::Perspective,
            V::Julian { .. } => K::Julian,
            V::Rectangles { .. } => K::Rectangles,
        }
    }

    /// Append the packed parameters, in the order `from_params` reads
    /// them back.
    pub fn write_params(&self, out: &mut Vec<f32>) {
        use self::Variation::*;
        match *self {
            Rings2 { val } => out.push(val),
            Fan2 { x, y } | Rectangles { x, y } => out.extend_from_slice(&[x, y]),
            Blob { low, high, waves } => out.extend_from_slice(&[low, high, waves]),
            Pdj { a, b, c, d } => out.extend_from_slice(&[a, b, c, d]),
            Curl { c1, c2 } => out.extend_from_slice(&[c1, c2]),
            Perspective { angle, dist } => out.extend_from_slice(&[angle, dist]),
            Julian { power, dist } => out.extend_from_slice(&[power, dist]),
            _ => {}
        }
    }

    /// Evaluate the variation at `(x, y)` and return its weighted
    /// contribution.
    #[inline]
    pub fn apply(&self, x: f32, y: f32, w: f32, rng: &mut Mwc) -> (f32, f32) {
        use self::Variation::*;
        let r2 = x * x + y * y;
        match *self {
            Linear => (w * x, w * y),
            Sinusoidal => (w * x.sin(), w * y.sin()),
            Spherical => {
                let r = w / (r2 + EPS);
                (r * x, r * y)
            }
            Swirl => {
                let (s, c) = r2.sin_cos();
                (w * (s * x - c * y), w * (c * x + s * y))
            }
            Horseshoe => {
                let r = w / (r2.sqrt() + EPS);
                ((x - y) * (x + y) * r, 2.0 * x * y * r)
            }
            Polar => (w * x.atan2(y) / PI, w * (r2.sqrt() - 1.0)),
            Handkerchief => {
                let a = x.atan2(y);
                let r = r2.sqrt();
                (w * r * (a + r).sin(), w * r * (a - r).cos())
            }
            Heart => {
                let r = r2.sqrt();
                let a = x.atan2(y) * r;
                (w * r * a.sin(), -w * r * a.cos())
            }
            Disc => {
                let a = w * x.atan2(y) / PI;
                let (s, c) = (PI * r2.sqrt()).sin_cos();
                (s * a, c * a)
            }
            Spiral => {
                let r = r2.sqrt() + EPS;
                let a = x.atan2(y);
                let r1 = w / r;
                (r1 * (a.cos() + r.sin()), r1 * (a.sin() - r.cos()))
            }
            Hyperbolic => {
                let r = r2.sqrt() + EPS;
                let a = x.atan2(y);
                (w * a.sin() / r, w * a.cos() * r)
            }
            Diamond => {
                let r = r2.sqrt();
                let a = x.atan2(y);
                (w * a.sin() * r.cos(), w * a.cos() * r.sin())
            }
            Ex => {
                let r = r2.sqrt();
                let a = x.atan2(y);
                let n0 = (a + r).sin();
                let n1 = (a - r).cos();
                let (m0, m1) = (n0 * n0 * n0 * r, n1 * n1 * n1 * r);
                (w * (m0 + m1), w * (m0 - m1))
            }
            Julia => {
                let mut a = 0.5 * x.atan2(y);
                if rng.next_u32() & 1 == 1 {
                    a += PI;
                }
                let r = w * r2.sqrt().sqrt();
                (r * a.cos(), r * a.sin())
            }
            Bent => {
                let nx = if x < 0.0 { x * 2.0 } else { x };
                let ny = if y < 0.0 { y / 2.0 } else { y };
                (w * nx, w * ny)
            }
            Fisheye => {
                let r = 2.0 * w / (r2.sqrt() + 1.0);
                (r * y, r * x)
            }
            Exponential => {
                let dx = w * (x - 1.0).exp();
                let (s, c) = (PI * y).sin_cos();
                (dx * c, dx * s)
            }
            Power => {
                let r = r2.sqrt();
                let (sa, ca) = if r > 0.0 { (x / r, y / r) } else { (0.0, 1.0) };
                let rp = w * r.powf(sa);
                (rp * ca, rp * sa)
            }
            Cosine => {
                let a = x * PI;
                (w * a.cos() * y.cosh(), -w * a.sin() * y.sinh())
            }
            Bubble => {
                let r = w / (0.25 * r2 + 1.0);
                (r * x, r * y)
            }
            Cylinder => (w * x.sin(), w * y),
            Eyefish => {
                let r = 2.0 * w / (r2.sqrt() + 1.0);
                (r * x, r * y)
            }
            Blur => {
                let (s, c) = (rng.next_unit() * 2.0 * PI).sin_cos();
                let r = w * rng.next_unit();
                (r * c, r * s)
            }
            GaussianBlur => {
                let (s, c) = (rng.next_unit() * 2.0 * PI).sin_cos();
                let sum: f32 = (0..4).map(|_| rng.next_unit()).sum();
                let r = w * (sum - 2.0);
                (r * c, r * s)
            }
            Noise => {
                let (s, c) = (rng.next_unit() * 2.0 * PI).sin_cos();
                let r = w * rng.next_unit();
                (x * r * c, y * r * s)
            }
            Tangent => (w * x.sin() / y.cos(), w * y.tan()),
            Square => (w * (rng.next_unit() - 0.5), w * (rng.next_unit() - 0.5)),
            Rings2 { val } => {
                let dx = val * val + EPS;
                let mut r = r2.sqrt();
                r += -2.0 * dx * ((r + dx) / (2.0 * dx)).trunc() + r * (1.0 - dx);
                let a = x.atan2(y);
                (w * r * a.sin(), w * r * a.cos())
            }
            Fan2 { x: fx, y: fy } => {
                let dx = PI * (fx * fx + EPS);
                let a = x.atan2(y);
                let r = w * r2.sqrt();
                let t = a + fy - dx * ((a + fy) / dx).trunc();
                let ang = if t > 0.5 * dx { a - 0.5 * dx } else { a + 0.5 * dx };
                (r * ang.sin(), r * ang.cos())
            }
            Blob { low, high, waves } => {
                let a = x.atan2(y);
                let r = r2.sqrt() * (low + (high - low) * (0.5 + 0.5 * (waves * a).sin()));
                (w * r * a.sin(), w * r * a.cos())
            }
            Pdj { a, b, c, d } => (
                w * ((a * y).sin() - (b * x).cos()),
                w * ((c * x).sin() - (d * y).cos()),
            ),
            Curl { c1, c2 } => {
                let re = 1.0 + c1 * x + c2 * (x * x - y * y);
                let im = c1 * y + 2.0 * c2 * x * y;
                let r = w / (re * re + im * im);
                ((x * re + y * im) * r, (y * re - x * im) * r)
            }
            Perspective { angle, dist } => {
                let ang = angle * PI / 2.0;
                let t = 1.0 / (dist - y * ang.sin());
                (w * dist * x * t, w * dist * ang.cos() * y * t)
            }
            Julian { power, dist } => {
                let turn = (power.abs() * rng.next_unit()).trunc();
                let a = (y.atan2(x) + 2.0 * PI * turn) / power;
                let r = w * r2.powf(dist / power / 2.0);
                (r * a.cos(), r * a.sin())
            }
            Rectangles { x: rx, y: ry } => {
                let fold = |v: f32, s: f32| {
                    if s == 0.0 {
                        v
                    } else {
                        (2.0 * (v / s).floor() + 1.0) * s - v
                    }
                };
                (w * fold(x, rx), w * fold(y, ry))
            }
        }
    }
}
