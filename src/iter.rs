// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The chaos game, one lane at a time.
//!
//! A lane holds a point and a random stream.  Every round it picks an
//! xform, moves the point, and, once the point has had `fuse` rounds to
//! settle onto the attractor, projects it through the camera and drops
//! its palette color into the accumulators.  Points that keep landing
//! outside the frame are thrown away and replaced.

use std::ops::AddAssign;

use crate::accum::{ColorBuffer, DensityBuffer};
use crate::info::{Features, IterInfo};
use crate::palette::Palette;
use crate::rng::Mwc;
use crate::xform::{FatalSelection, Point};

/// Everything a lane reads or writes besides its own state.  All of it
/// is shared with every other lane of the launch.
#[derive(Copy, Clone)]
pub struct Frame<'a> {
    /// The block's decoded info.
    pub info: &'a IterInfo,
    /// The render's shape.
    pub features: &'a Features,
    /// Read-only color lookup.
    pub palette: &'a Palette,
    /// Shared RGBA accumulator.
    pub accbuf: &'a ColorBuffer,
    /// Shared hit counter.
    pub denbuf: &'a DensityBuffer,
}

/// The mutable per-lane point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PointState {
    /// Position and running color; what the next round starts from.
    pub point: Point,
    /// Below zero: fuse rounds left to burn, negated.  Zero or above:
    /// consecutive out-of-frame samples.
    pub consec_bad: i32,
}

impl PointState {
    /// A fresh random point at the start of its fuse.
    pub fn seed(rng: &mut Mwc, fuse: i32) -> Self {
        PointState {
            point: Point::random(rng),
            consec_bad: -fuse,
        }
    }
}

/// What one round did.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Round {
    /// Still settling; nothing was spent or written.
    Fuse,
    /// Landed outside the frame.  `reseeded` if that was one too many.
    Rejected {
        /// The point was replaced.
        reseeded: bool,
    },
    /// Landed in cell `index`.
    Deposited {
        /// Flattened accumulator index.
        index: usize,
    },
}

/// Counters for one or more lanes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LaneStats {
    /// Rounds spent in the fuse.
    pub fuse_rounds: u64,
    /// Samples written to the accumulators.
    pub deposits: u64,
    /// Samples that fell outside the frame.
    pub rejections: u64,
    /// Times a point was replaced.
    pub reseeds: u64,
}

impl AddAssign for LaneStats {
    fn add_assign(&mut self, o: LaneStats) {
        self.fuse_rounds += o.fuse_rounds;
        self.deposits += o.deposits;
        self.rejections += o.rejections;
        self.reseeds += o.reseeds;
    }
}

/// One execution lane.
pub struct Lane<'a> {
    frame: Frame<'a>,
    /// The lane's point.
    pub state: PointState,
    /// The lane's stream; hand it back to the caller when done.
    pub rng: Mwc,
}

impl<'a> Lane<'a> {
    /// Start a lane on a fresh random point drawn from `rng`.
    pub fn new(frame: Frame<'a>, mut rng: Mwc) -> Self {
        let state = PointState::seed(&mut rng, frame.features.fuse);
        Lane { frame, state, rng }
    }

    /// Play one round.
    pub fn step(&mut self) -> Result<Round, FatalSelection> {
        let Frame {
            info,
            features,
            palette,
            accbuf,
            denbuf,
        } = self.frame;

        let draw = self.rng.next_unit();
        let xf = info.xforms.select(draw)?;
        self.state.point = xf.apply(self.state.point, &mut self.rng);

        // The final xform moves what gets plotted, never where the next
        // round starts or which palette entry it carries.
        let out = match info.xforms.final_xform() {
            Some(fxf) => fxf.apply(self.state.point, &mut self.rng),
            None => self.state.point,
        };

        if self.state.consec_bad < 0 {
            self.state.consec_bad += 1;
            return Ok(Round::Fuse);
        }

        let (cx, cy) = info.camera.apply(out.x, out.y);
        let ditherwidth = 0.5 * info.spatial_filter_radius;
        let ditherx = self.rng.next_signed() * ditherwidth;
        let dithery = self.rng.next_signed() * ditherwidth;
        let ix = (cx + ditherx).trunc();
        let iy = (cy + dithery).trunc();

        let acc = features.acc;
        // Written so that NaN fails too.
        if !(ix >= 0.0 && ix < acc.width as f32 && iy >= 0.0 && iy < acc.height as f32) {
            self.state.consec_bad += 1;
            let reseeded = self.state.consec_bad > features.max_oob;
            if reseeded {
                self.state = PointState::seed(&mut self.rng, features.fuse);
            }
            return Ok(Round::Rejected { reseeded });
        }

        let index = acc.offset(ix as usize, iy as usize);
        accbuf.deposit(index, palette.sample(self.state.point.color, info.step_frac));
        denbuf.bump(index);
        Ok(Round::Deposited { index })
    }

    /// Play rounds until `budget` samples have been attempted.  Fuse
    /// rounds are free; every other round costs one, whether or not it
    /// lands in the frame.
    ///
    /// A fatal selection stamps the density buffer with the sentinel
    /// and stops this lane where it is.
    pub fn run(&mut self, budget: u64) -> Result<LaneStats, FatalSelection> {
        let mut stats = LaneStats::default();
        let mut nsamps = budget;
        while nsamps > 0 {
            let round = match self.step() {
                Ok(round) => round,
                Err(e) => {
                    self.frame.denbuf.mark_fatal();
                    return Err(e);
                }
            };
            match round {
                Round::Fuse => stats.fuse_rounds += 1,
                Round::Rejected { reseeded } => {
                    nsamps -= 1;
                    stats.rejections += 1;
                    if reseeded {
                        stats.reseeds += 1;
                    }
                }
                Round::Deposited { .. } => {
                    nsamps -= 1;
                    stats.deposits += 1;
                }
            }
        }
        Ok(stats)
    }
}
