// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The entry point.  A launch is a batch of blocks, each with its own
//! packed info and `lanes_per_block` lanes.  Worker threads pull blocks
//! off a shared queue; within a block the lanes preload the info, then
//! each one plays its whole sample budget.  Every lane of every block
//! writes into the same two accumulators.

use std::sync::{Arc, Mutex};

use crossbeam::thread::ScopedJoinHandle;
use tracing::{debug, info, warn};

use crate::accum::{ColorBuffer, DensityBuffer};
use crate::error::RenderError;
use crate::info::{preload, Features, IterInfo};
use crate::iter::{Frame, Lane, LaneStats};
use crate::palette::Palette;
use crate::rng::Mwc;
use crate::xform::FatalSelection;

/// What a launch runs.
#[derive(Copy, Clone)]
pub struct Launch<'a> {
    /// The render's fixed shape.
    pub features: &'a Features,
    /// One packed info block per launch block.
    pub infos: &'a [Vec<f32>],
    /// The palette for every block.
    pub palette: &'a Palette,
    /// Worker threads; clamped to at least one.
    pub threads: usize,
}

type BlockOutcome = (usize, Result<LaneStats, RenderError>);

/// Totals for a finished launch.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Blocks run.
    pub blocks: usize,
    /// Lanes run.
    pub lanes: usize,
    /// Summed lane counters.
    pub samples: LaneStats,
}

/// Run one launch.  `msts` holds one stream per lane, block-major; each
/// lane reads its stream at the start and writes it back at the end,
/// so the next launch picks up exactly where this one stopped.
///
/// A fatal selection in any lane invalidates the render: that lane
/// stops and stamps the density buffer, the rest of the launch runs to
/// completion, and the error for the lowest-numbered failing lane is
/// returned.
pub fn run(
    msts: &mut [Mwc],
    launch: &Launch,
    accbuf: &ColorBuffer,
    denbuf: &DensityBuffer,
) -> Result<RunStats, RenderError> {
    let features = launch.features;
    features.validate()?;
    if accbuf.dims() != features.acc || denbuf.dims() != features.acc {
        return Err(RenderError::InvalidConfig(
            "accumulator dimensions differ from the render's".to_string(),
        ));
    }
    let lanes = launch.infos.len() * features.lanes_per_block;
    if msts.len() != lanes {
        return Err(RenderError::InvalidConfig(format!(
            "{} blocks of {} lanes need {} random streams, got {}",
            launch.infos.len(),
            features.lanes_per_block,
            lanes,
            msts.len()
        )));
    }
    let threads = launch.threads.max(1);
    info!(
        blocks = launch.infos.len(),
        lanes = lanes,
        threads = threads,
        "launching"
    );

    let lpb = features.lanes_per_block;
    let queue = Arc::new(Mutex::new(
        msts.chunks_mut(lpb).zip(launch.infos.iter()).enumerate(),
    ));

    let mut outcomes: Vec<BlockOutcome> = vec![];
    crossbeam::scope(|spawner| {
        let handles: Vec<ScopedJoinHandle<Vec<BlockOutcome>>> = (0..threads)
            .map(|_| {
                let queue = queue.clone();
                spawner.spawn(move |_| {
                    let mut done = vec![];
                    loop {
                        let block = match queue.lock() {
                            Ok(mut q) => q.next(),
                            Err(_) => None,
                        };
                        match block {
                            Some((b, (streams, packed))) => done.push((
                                b,
                                run_block(b, streams, packed, launch, accbuf, denbuf),
                            )),
                            None => break,
                        }
                    }
                    done
                })
            })
            .collect();

        for handle in handles {
            match handle.join() {
                Ok(done) => outcomes.extend(done),
                Err(_) => outcomes.push((usize::max_value(), Err(RenderError::WorkerPanicked))),
            }
        }
    })
    .map_err(|_| RenderError::WorkerPanicked)?;

    outcomes.sort_by_key(|&(b, _)| b);
    let mut stats = RunStats {
        blocks: launch.infos.len(),
        lanes,
        samples: LaneStats::default(),
    };
    for (_, outcome) in outcomes {
        stats.samples += outcome?;
    }
    info!(
        deposits = stats.samples.deposits,
        rejections = stats.samples.rejections,
        reseeds = stats.samples.reseeds,
        "launch complete"
    );
    Ok(stats)
}

fn run_block(
    block: usize,
    streams: &mut [Mwc],
    packed: &[f32],
    launch: &Launch,
    accbuf: &ColorBuffer,
    denbuf: &DensityBuffer,
) -> Result<LaneStats, RenderError> {
    let features = launch.features;
    let shared = preload(packed, streams.len());
    let info = IterInfo::unpack(&shared, features)?;
    let budget = info.samples_per_lane(features.lanes_per_block);
    let frame = Frame {
        info: &info,
        features,
        palette: launch.palette,
        accbuf,
        denbuf,
    };

    let mut stats = LaneStats::default();
    let mut fatal = None;
    for (i, mst) in streams.iter_mut().enumerate() {
        let mut lane = Lane::new(frame, *mst);
        let result = lane.run(budget);
        *mst = lane.rng;
        match result {
            Ok(s) => stats += s,
            Err(FatalSelection { draw }) => {
                let lane = block * features.lanes_per_block + i;
                warn!(lane = lane, "no xform covers selection draw {}", draw);
                if fatal.is_none() {
                    fatal = Some(RenderError::FatalSelection { lane, draw });
                }
            }
        }
    }
    debug!(
        block = block,
        budget = budget,
        deposits = stats.deposits,
        rejections = stats.rejections,
        "block done"
    );
    match fatal {
        Some(e) => Err(e),
        None => Ok(stats),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accum::Dims;
    use crate::affine::Affine;
    use crate::camera::Camera;
    use crate::rng::seed_lanes;
    use crate::variations::Variation;
    use crate::xform::{Transform, TransformSet};

    const LANES: usize = 4;

    fn dims() -> Dims {
        Dims {
            width: 16,
            height: 16,
            stride: 20,
        }
    }

    fn sierpinski() -> IterInfo {
        let corner = |c: f32, f: f32| {
            Transform::new(
                Affine::from_coefs([0.5, 0.0, c, 0.0, 0.5, f]),
                vec![(Variation::Linear, 1.0)],
            )
        };
        let xforms = vec![corner(-0.5, -0.5), corner(0.5, -0.5), corner(0.0, 0.5)];
        IterInfo {
            xforms: TransformSet::from_weights(xforms, &[1.0, 1.0, 1.0], None).unwrap(),
            camera: Camera::new(16, 16, (-1.1, -1.1), (1.1, 1.1)).unwrap().to_affine(),
            width: 16.0,
            height: 16.0,
            ntemporal_samples: 2.0,
            adj_density: 8.0,
            spatial_filter_radius: 0.5,
            step_frac: 0.5,
        }
    }

    struct Fixture {
        features: Features,
        infos: Vec<Vec<f32>>,
        palette: Palette,
    }

    impl Fixture {
        fn new(info: IterInfo, blocks: usize) -> Self {
            let features = Features::for_info(&info, 10, 5, dims(), LANES);
            let infos = (0..blocks)
                .map(|b| {
                    let mut block = info.clone();
                    block.step_frac = (b as f32 + 0.5) / blocks as f32;
                    block.pack(&features).unwrap()
                })
                .collect();
            Fixture {
                features,
                infos,
                palette: Palette::from_stops(&[(0.0, [255, 0, 0]), (1.0, [0, 0, 255])], 64)
                    .unwrap(),
            }
        }

        fn launch(&self, threads: usize) -> Launch {
            Launch {
                features: &self.features,
                infos: &self.infos,
                palette: &self.palette,
                threads,
            }
        }
    }

    #[test]
    fn single_thread_launch_accounts_for_every_sample() {
        let fx = Fixture::new(sierpinski(), 2);
        let mut msts = seed_lanes(2 * LANES, 1);
        let accbuf = ColorBuffer::new(dims());
        let denbuf = DensityBuffer::new(dims());
        let stats = run(&mut msts, &fx.launch(1), &accbuf, &denbuf).unwrap();

        // 16 * 16 / (2 * 4) * 8 per lane
        let budget = 256;
        assert_eq!(stats.blocks, 2);
        assert_eq!(stats.lanes, 8);
        assert_eq!(stats.samples.deposits + stats.samples.rejections, 8 * budget);
        assert_eq!(stats.samples.fuse_rounds, 8 * 10);
        let total: f32 = denbuf.to_vec().iter().sum();
        assert_eq!(total, stats.samples.deposits as f32);
        let alpha: f32 = accbuf.to_vec().chunks(4).map(|c| c[3]).sum();
        assert!((alpha - total).abs() < 1e-3);
    }

    #[test]
    fn nothing_lands_in_the_stride_padding() {
        let fx = Fixture::new(sierpinski(), 1);
        let mut msts = seed_lanes(LANES, 2);
        let accbuf = ColorBuffer::new(dims());
        let denbuf = DensityBuffer::new(dims());
        run(&mut msts, &fx.launch(2), &accbuf, &denbuf).unwrap();
        let d = dims();
        for (i, v) in denbuf.to_vec().iter().enumerate() {
            if i % d.stride >= d.width {
                assert_eq!(*v, 0.0);
            }
        }
    }

    #[test]
    fn many_threads_share_the_accumulators() {
        let fx = Fixture::new(sierpinski(), 8);
        let mut msts = seed_lanes(8 * LANES, 3);
        let accbuf = ColorBuffer::new(dims());
        let denbuf = DensityBuffer::new(dims());
        let stats = run(&mut msts, &fx.launch(4), &accbuf, &denbuf).unwrap();
        let total: f32 = denbuf.to_vec().iter().sum();
        assert!(total > 0.0);
        assert!(total <= stats.samples.deposits as f32);
    }

    #[test]
    fn streams_are_written_back_for_the_next_launch() {
        let fx = Fixture::new(sierpinski(), 1);
        let start = seed_lanes(LANES, 4);

        let mut msts = start.clone();
        let accbuf = ColorBuffer::new(dims());
        let denbuf = DensityBuffer::new(dims());
        run(&mut msts, &fx.launch(1), &accbuf, &denbuf).unwrap();
        run(&mut msts, &fx.launch(1), &accbuf, &denbuf).unwrap();

        // The same two launches played lane by lane without the
        // store in between.
        let info = IterInfo::unpack(&fx.infos[0], &fx.features).unwrap();
        let budget = info.samples_per_lane(LANES);
        let (scratch_acc, scratch_den) = (ColorBuffer::new(dims()), DensityBuffer::new(dims()));
        let frame = Frame {
            info: &info,
            features: &fx.features,
            palette: &fx.palette,
            accbuf: &scratch_acc,
            denbuf: &scratch_den,
        };
        for (i, &rng) in start.iter().enumerate() {
            let mut first = Lane::new(frame, rng);
            first.run(budget).unwrap();
            let mut second = Lane::new(frame, first.rng);
            second.run(budget).unwrap();
            assert_eq!(msts[i], second.rng);
        }
        assert_eq!(scratch_den.to_vec(), denbuf.to_vec());
    }

    #[test]
    fn fatal_selection_invalidates_the_launch() {
        let mut info = sierpinski();
        let mut xforms = info.xforms.xforms().to_vec();
        xforms[2].selection_weight = 0.9;
        info.xforms = TransformSet::new(xforms, None).unwrap();
        let fx = Fixture::new(info, 2);

        let start = seed_lanes(2 * LANES, 5);
        let mut msts = start.clone();
        let accbuf = ColorBuffer::new(dims());
        let denbuf = DensityBuffer::new(dims());
        match run(&mut msts, &fx.launch(2), &accbuf, &denbuf) {
            Err(RenderError::FatalSelection { lane, draw }) => {
                assert!(lane < 2 * LANES);
                assert!(draw > 0.9);
            }
            other => panic!("expected a fatal selection, got {:?}", other),
        }
        assert!(denbuf.is_marked_fatal());
        for (before, after) in start.iter().zip(&msts) {
            assert_ne!(before, after);
        }
    }

    #[test]
    fn mismatched_inputs_are_refused() {
        let fx = Fixture::new(sierpinski(), 2);
        let accbuf = ColorBuffer::new(dims());
        let denbuf = DensityBuffer::new(dims());

        let mut short = seed_lanes(LANES, 6);
        assert!(run(&mut short, &fx.launch(1), &accbuf, &denbuf).is_err());

        let mut msts = seed_lanes(2 * LANES, 6);
        let other = Dims {
            width: 16,
            height: 16,
            stride: 16,
        };
        let wrong = DensityBuffer::new(other);
        assert!(run(&mut msts, &fx.launch(1), &accbuf, &wrong).is_err());
        assert_eq!(msts, seed_lanes(2 * LANES, 6));
    }
}
