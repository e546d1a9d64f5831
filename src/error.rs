// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Everything that can make a render invalid.  Out-of-frame samples
//! are not errors; they are handled inside the lane and never get this
//! far.

use failure::Fail;

/// Errors surfaced by a launch or by the configuration that feeds it.
#[derive(Debug, Fail, PartialEq)]
pub enum RenderError {
    /// A lane drew a selection value that no xform threshold covered.
    /// The render is invalid; the thresholds were malformed.
    #[fail(display = "lane {} drew {} but no xform threshold covers it", lane, draw)]
    FatalSelection {
        /// The global index of the lane that failed.
        lane: usize,
        /// The selection draw that fell through.
        draw: f32,
    },

    /// The configuration was rejected before any iteration ran.
    #[fail(display = "invalid configuration: {}", _0)]
    InvalidConfig(String),

    /// A packed info block doesn't match the compile-time shape.
    #[fail(display = "info block does not match its layout: {}", _0)]
    LayoutMismatch(String),

    /// A scene file could not be read or understood.
    #[fail(display = "could not load scene: {}", _0)]
    Scene(String),

    /// A worker thread panicked mid-launch.
    #[fail(display = "a worker thread panicked")]
    WorkerPanicked,
}
