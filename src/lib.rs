#![deny(missing_docs)]
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Fractal flame iterator
//!
//! A fractal flame is the attractor of a small set of nonlinear
//! functions, the xforms.  Pick a point, pick an xform at random,
//! move the point, and repeat: after a few rounds the point is on the
//! attractor, and every round after that is one sample of its shape.
//! Map each sample to the nearest pixel, add the palette color it
//! carries, and count the hit, and after enough samples the
//! accumulators hold a picture of the flame.
//!
//! This crate is the sampler.  A launch runs many lanes at once, each
//! with its own point and random stream, all writing into the same pair
//! of accumulators without locks.  Filtering the accumulators into a
//! finished image is somebody else's job; the `flame` binary only
//! writes a raw preview.

pub mod accum;
pub mod affine;
pub mod camera;
pub mod error;
pub mod info;
pub mod iter;
pub mod launch;
pub mod palette;
pub mod rng;
pub mod scene;
pub mod variations;
pub mod xform;

pub use accum::{ColorBuffer, DensityBuffer, Dims};
pub use error::RenderError;
pub use info::{Features, IterInfo};
pub use launch::{run, Launch, RunStats};
pub use rng::{seed_lanes, Mwc};
pub use scene::{Render, Sampling, Scene};
