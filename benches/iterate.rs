// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#[macro_use]
extern crate criterion;

use criterion::Criterion;
use flame::{run, seed_lanes, ColorBuffer, DensityBuffer, Launch, Sampling, Scene};

const SCENE: &str = r#"
[camera]
leftlower = [-1.1, -1.1]
rightupper = [1.1, 1.1]

[[palette]]
position = 0.0
rgb = [255, 128, 0]

[[palette]]
position = 1.0
rgb = [0, 128, 255]

[[xform]]
affine = [0.5, 0.0, -0.5, 0.0, 0.5, -0.5]
variations = [{ kind = "linear" }]

[[xform]]
color = 0.5
affine = [0.5, 0.0, 0.5, 0.0, 0.5, -0.5]
variations = [{ kind = "linear" }, { kind = "swirl", weight = 0.2 }]

[[xform]]
color = 1.0
affine = [0.5, 0.0, 0.0, 0.0, 0.5, 0.5]
variations = [{ kind = "sinusoidal" }]
"#;

fn one_launch(c: &mut Criterion) {
    let sampling = Sampling {
        width: 128,
        height: 128,
        lanes_per_block: 32,
        blocks: 4,
        adj_density: 1.0,
    };
    let scene = Scene::from_toml(SCENE).unwrap();
    let mut msts = seed_lanes(sampling.blocks * sampling.lanes_per_block, 7);
    c.bench_function("launch 128x128", move |b| {
        let render = scene.build(&sampling).unwrap();
        let accbuf = ColorBuffer::new(render.features.acc);
        let denbuf = DensityBuffer::new(render.features.acc);
        let launch = Launch {
            features: &render.features,
            infos: &render.infos,
            palette: &render.palette,
            threads: 1,
        };
        b.iter(|| run(&mut msts, &launch, &accbuf, &denbuf).unwrap())
    });
}

criterion_group!(benches, one_launch);
criterion_main!(benches);
