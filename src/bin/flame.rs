// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::{App, Arg, ArgMatches};
use failure::Error;
use image::ColorType;
use itertools::iproduct;
use num::clamp;
use std::path::Path;
use std::str::FromStr;
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;

use flame::{run, seed_lanes, ColorBuffer, DensityBuffer, Launch, Sampling, Scene};

fn parse_pair<T>(s: &str, separator: char) -> Option<(T, T)>
where
    T: FromStr,
{
    match s.find(separator) {
        None => None,
        Some(index) => match (T::from_str(&s[..index]), T::from_str(&s[index + 1..])) {
            (Ok(l), Ok(r)) => Some((l, r)),
            _ => None,
        },
    }
}

fn validate_pair<T: FromStr>(s: &str, separator: char, err: &str) -> Result<(), String> {
    match parse_pair::<T>(s, separator) {
        Some(_) => Ok(()),
        None => Err(err.to_string()),
    }
}

fn validate_range<T: FromStr + PartialOrd>(
    s: &str,
    low: T,
    high: T,
    isnotanumber_err: &str,
    isnotinrange_err: &str,
) -> Result<(), String> {
    match T::from_str(s) {
        Ok(i) => {
            if i >= low && i <= high {
                Ok(())
            } else {
                Err(isnotinrange_err.to_string())
            }
        }
        Err(_) => Err(isnotanumber_err.to_string()),
    }
}

const SCENE: &str = "scene";
const OUTPUT: &str = "output";
const SIZE: &str = "size";
const THREADS: &str = "threads";
const QUALITY: &str = "quality";
const BLOCKS: &str = "blocks";
const LANES: &str = "lanes";
const LAUNCHES: &str = "launches";
const SEED: &str = "seed";
const LOG_LEVEL: &str = "log-level";

fn args<'a>() -> ArgMatches<'a> {
    let max_threads = num_cpus::get();
    let default_threads: &'static str = Box::leak(max_threads.to_string().into_boxed_str());

    App::new("flame")
        .version("0.1.0")
        .author("Elf M. Sternberg <elf.sternberg@gmail.com>")
        .about("Fractal flame chaos-game sampler")
        .arg(
            Arg::with_name(SCENE)
                .required(true)
                .long(SCENE)
                .short("c")
                .takes_value(true)
                .help("Scene file (TOML)"),
        )
        .arg(
            Arg::with_name(OUTPUT)
                .required(true)
                .long(OUTPUT)
                .short("o")
                .takes_value(true)
                .help("Output file"),
        )
        .arg(
            Arg::with_name(SIZE)
                .required(false)
                .long(SIZE)
                .short("s")
                .takes_value(true)
                .default_value("640x480")
                .validator(|s| validate_pair::<u16>(&s, 'x', "Could not parse output image size"))
                .help("Size of output image"),
        )
        .arg(
            Arg::with_name(THREADS)
                .required(false)
                .long(THREADS)
                .short("t")
                .takes_value(true)
                .default_value(default_threads)
                .validator(move |s| {
                    validate_range(
                        &s,
                        1,
                        max_threads,
                        "Could not parse thread count",
                        &format!("Thread count must be between 1 and {}", max_threads),
                    )
                })
                .help("Number of worker threads"),
        )
        .arg(
            Arg::with_name(QUALITY)
                .required(false)
                .long(QUALITY)
                .short("q")
                .takes_value(true)
                .default_value("20")
                .validator(|s| {
                    validate_range(
                        &s,
                        0.001_f32,
                        100_000.0,
                        "Could not parse quality",
                        "Quality must be between 0.001 and 100000",
                    )
                })
                .help("Samples per pixel per launch"),
        )
        .arg(
            Arg::with_name(BLOCKS)
                .required(false)
                .long(BLOCKS)
                .short("b")
                .takes_value(true)
                .default_value("8")
                .validator(|s| {
                    validate_range(
                        &s,
                        1,
                        4096,
                        "Could not parse block count",
                        "Block count must be between 1 and 4096",
                    )
                })
                .help("Blocks per launch"),
        )
        .arg(
            Arg::with_name(LANES)
                .required(false)
                .long(LANES)
                .short("l")
                .takes_value(true)
                .default_value("64")
                .validator(|s| {
                    validate_range(
                        &s,
                        1,
                        4096,
                        "Could not parse lane count",
                        "Lanes per block must be between 1 and 4096",
                    )
                })
                .help("Lanes per block"),
        )
        .arg(
            Arg::with_name(LAUNCHES)
                .required(false)
                .long(LAUNCHES)
                .short("n")
                .takes_value(true)
                .default_value("1")
                .validator(|s| {
                    validate_range(
                        &s,
                        1,
                        10_000,
                        "Could not parse launch count",
                        "Launch count must be between 1 and 10000",
                    )
                })
                .help("Launches to accumulate, reusing the random streams"),
        )
        .arg(
            Arg::with_name(SEED)
                .required(false)
                .long(SEED)
                .takes_value(true)
                .default_value("1")
                .validator(|s| {
                    validate_range(
                        &s,
                        0,
                        u64::max_value(),
                        "Could not parse seed",
                        "Seed out of range",
                    )
                })
                .help("Seed for the random streams"),
        )
        .arg(
            Arg::with_name(LOG_LEVEL)
                .required(false)
                .long(LOG_LEVEL)
                .takes_value(true)
                .default_value("info")
                .help("trace, debug, info, warn, or error"),
        )
        .get_matches()
}

// A raw look at the accumulators: the mean palette color of each pixel,
// scaled by log density.  No filtering, no gamma.
fn preview(accbuf: &ColorBuffer, denbuf: &DensityBuffer) -> Vec<u8> {
    let dims = denbuf.dims();
    let density = denbuf.to_vec();
    let color = accbuf.to_vec();
    let maxd = density.iter().cloned().fold(0.0_f32, f32::max);
    let scale = (1.0 + maxd).ln().max(std::f32::MIN_POSITIVE);

    let mut pixels = Vec::with_capacity(dims.width * dims.height * 3);
    for (y, x) in iproduct!(0..dims.height, 0..dims.width) {
        let i = dims.offset(x, y);
        let d = density[i];
        if d > 0.0 {
            let brightness = (1.0 + d).ln() / scale;
            for c in &color[i * 4..i * 4 + 3] {
                pixels.push(clamp(c / d * brightness * 255.0, 0.0, 255.0) as u8);
            }
        } else {
            pixels.extend_from_slice(&[0, 0, 0]);
        }
    }
    pixels
}

fn write_image(outfile: &str, pixels: &[u8], bounds: (usize, usize)) -> Result<(), Error> {
    image::save_buffer(
        Path::new(outfile),
        pixels,
        bounds.0 as u32,
        bounds.1 as u32,
        ColorType::RGB(8),
    )?;
    Ok(())
}

fn render(matches: &ArgMatches) -> Result<(), Error> {
    let (width, height) = parse_pair::<usize>(matches.value_of(SIZE).unwrap_or(""), 'x')
        .ok_or_else(|| failure::err_msg("Error parsing image dimensions"))?;
    let value = |name: &str| matches.value_of(name).unwrap_or("");
    let threads = usize::from_str(value(THREADS))?;
    let sampling = Sampling {
        width,
        height,
        lanes_per_block: usize::from_str(value(LANES))?,
        blocks: usize::from_str(value(BLOCKS))?,
        adj_density: f32::from_str(value(QUALITY))?,
    };
    let launches = usize::from_str(value(LAUNCHES))?;
    let seed = u64::from_str(value(SEED))?;

    let scene_path = value(SCENE);
    info!("loading scene {}", scene_path);
    let scene = Scene::load(Path::new(scene_path))?;
    let render = scene.build(&sampling)?;

    let mut msts = seed_lanes(sampling.blocks * sampling.lanes_per_block, seed);
    let accbuf = ColorBuffer::new(render.features.acc);
    let denbuf = DensityBuffer::new(render.features.acc);
    let launch = Launch {
        features: &render.features,
        infos: &render.infos,
        palette: &render.palette,
        threads,
    };
    for n in 0..launches {
        let stats = run(&mut msts, &launch, &accbuf, &denbuf)?;
        info!(
            launch = n,
            deposits = stats.samples.deposits,
            rejections = stats.samples.rejections,
            "launch finished"
        );
    }

    let pixels = preview(&accbuf, &denbuf);
    write_image(value(OUTPUT), &pixels, (width, height))?;
    info!("wrote {}", value(OUTPUT));
    Ok(())
}

fn main() {
    let matches = args();
    let level = matches
        .value_of(LOG_LEVEL)
        .unwrap_or("info")
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = render(&matches) {
        error!("Render failure: {}", e);
        eprintln!("Render failure: {}", e);
        std::process::exit(1);
    }
}
