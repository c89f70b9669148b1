// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CLI tool: reconstruct a 2D floor plan and 3D wireframe from a labeled
//! indoor point cloud.
//!
//! Usage:
//!   planscan <cloud_path> [options]
//!
//! Exit codes: 0 success, 2 invalid input, 3 nothing detected, 4 i/o
//! failure, 5 resource limit.

use std::env;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use planscan_core::io::off::write_coff;
use planscan_core::io::ply::write_ply_points;
use planscan_core::io::txt::{read_cloud_path, write_points};
use planscan_core::io::{lineset, strokes};
use planscan_core::{Error, PointCloud, PointSample, Progress, Rgba8};
use planscan_fit::{load_height_field, PipelineConfig, PipelineOutput};
use planscan_index::{LodPyramid, LodStrategy};

const EXIT_INVALID_INPUT: u8 = 2;
const EXIT_NOTHING_DETECTED: u8 = 3;
const EXIT_IO: u8 = 4;
const EXIT_RESOURCE_LIMIT: u8 = 5;

struct Options {
    input: PathBuf,
    wdir: PathBuf,
    config: PipelineConfig,
    lod_strategy: LodStrategy,
    lod_levels: usize,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let opts = match parse_args() {
        Ok(Some(opts)) => opts,
        Ok(None) => return ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("Error: {msg}");
            eprintln!("Run with --help for usage.");
            return ExitCode::from(EXIT_INVALID_INPUT);
        }
    };

    match run(&opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}

fn exit_code_for(e: &Error) -> u8 {
    match e {
        Error::InvalidInput(_) => EXIT_INVALID_INPUT,
        Error::DetectionFailure(_) => EXIT_NOTHING_DETECTED,
        Error::Io(_) => EXIT_IO,
        Error::ResourceLimit(_) => EXIT_RESOURCE_LIMIT,
        _ => 1,
    }
}

fn parse_args() -> Result<Option<Options>, String> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return Ok(None);
    }

    let input = PathBuf::from(&args[1]);
    let mut wdir = PathBuf::from(".");
    let mut config = PipelineConfig::default();
    let mut lod_strategy = LodStrategy::Voxel;
    let mut lod_levels = 0usize;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--probability" => {
                config.ransac.probability = value(&args, &mut i)?;
            }
            "--min-points" => {
                config.ransac.min_points = value(&args, &mut i)?;
            }
            "--epsilon" => {
                config.ransac.epsilon = value(&args, &mut i)?;
            }
            "--cluster-epsilon" => {
                config.ransac.cluster_epsilon = value(&args, &mut i)?;
            }
            "--normal-threshold" => {
                config.ransac.normal_threshold = value(&args, &mut i)?;
            }
            "--cos-angle" => {
                config.ransac.cos_angle = value(&args, &mut i)?;
            }
            "--seed" => {
                config.seed = value(&args, &mut i)?;
            }
            "--wdir" => {
                i += 1;
                wdir = PathBuf::from(
                    args.get(i).ok_or_else(|| "--wdir needs a value".to_string())?,
                );
            }
            "--config" => {
                i += 1;
                let path = args.get(i).ok_or_else(|| "--config needs a value".to_string())?;
                let text = fs::read_to_string(path)
                    .map_err(|e| format!("cannot read config '{path}': {e}"))?;
                config = serde_json::from_str(&text)
                    .map_err(|e| format!("bad config '{path}': {e}"))?;
            }
            "--no-regularize" => {
                config.regularize_walls = false;
            }
            "--no-cylinders" => {
                config.detect_cylinders = false;
            }
            "--lod-strategy" => {
                i += 1;
                let s = args
                    .get(i)
                    .ok_or_else(|| "--lod-strategy needs a value".to_string())?;
                lod_strategy = LodStrategy::parse(s)
                    .ok_or_else(|| format!("unknown LOD strategy '{s}'"))?;
            }
            "--lod-levels" => {
                lod_levels = value(&args, &mut i)?;
            }
            other => {
                return Err(format!("unknown option: {other}"));
            }
        }
        i += 1;
    }

    Ok(Some(Options {
        input,
        wdir,
        config,
        lod_strategy,
        lod_levels,
    }))
}

fn value<T: std::str::FromStr>(args: &[String], i: &mut usize) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    let flag = args[*i].clone();
    *i += 1;
    let raw = args
        .get(*i)
        .ok_or_else(|| format!("{flag} needs a value"))?;
    raw.parse()
        .map_err(|e| format!("invalid value for {flag}: {e}"))
}

fn run(opts: &Options) -> planscan_core::Result<()> {
    println!("[1/5] Loading cloud: {}", opts.input.display());
    let cloud = read_cloud_path(&opts.input)?;
    let bounds = cloud.bounds();
    println!(
        "  {} points in {} label groups, extent {:.1}m x {:.1}m x {:.1}m",
        cloud.len(),
        cloud.groups().len(),
        bounds.max.x - bounds.min.x,
        bounds.max.y - bounds.min.y,
        bounds.max.z - bounds.min.z,
    );

    fs::create_dir_all(&opts.wdir)?;

    if opts.lod_levels > 0 {
        write_lod_previews(&cloud, opts)?;
    }

    println!("[2/5] Loading sidecars from {}", opts.wdir.display());
    let stroke_path = opts.wdir.join("strokes.json");
    let strokes = if stroke_path.is_file() {
        let file = strokes::read_strokes_path(&stroke_path)?;
        println!("  {} strokes", file.lines.len());
        file.lines
    } else {
        println!("  no stroke sidecar, skipping guided fitting");
        Vec::new()
    };

    let heights = if opts.wdir.join("floor.off").is_file()
        && opts.wdir.join("ceiling.off").is_file()
    {
        println!("  floor/ceiling meshes found");
        Some(load_height_field(&opts.wdir)?)
    } else {
        println!("  no floor/ceiling meshes, using flat heights from the cloud");
        None
    };

    println!("[3/5] Detecting primitives (seed {})...", opts.config.seed);
    let output = planscan_fit::run(
        &cloud,
        &strokes,
        heights,
        &opts.config,
        &mut Progress::none(),
    )?;

    let s = output.summary;
    println!(
        "  {} planes, {} wall lines, {} cylinders",
        s.planes,
        output.wall_lines.len(),
        s.cylinders
    );
    if s.planes == 0 && s.cylinders == 0 {
        return Err(Error::DetectionFailure(
            "no planes or cylinders found; lower --min-points or check labels".into(),
        ));
    }

    println!("[4/5] Fitting walls...");
    println!(
        "  {} wall segments, {} unresolved strokes",
        s.walls, s.unresolved_strokes
    );
    for u in &output.unresolved {
        println!(
            "  stroke {} segment {}: {:?}",
            u.stroke_id, u.segment, u.reason
        );
    }

    println!("[5/5] Writing outputs to {}", opts.wdir.display());
    write_outputs(&opts.wdir, &output)?;

    println!();
    println!("Done.");
    Ok(())
}

fn write_lod_previews(cloud: &PointCloud, opts: &Options) -> planscan_core::Result<()> {
    let positions: Vec<_> = cloud.samples().iter().map(|s| s.position).collect();
    let pyramid = LodPyramid::generate(
        &positions,
        opts.lod_strategy,
        opts.lod_levels,
        opts.config.seed,
        &mut Progress::none(),
    )?;
    println!("  LOD pyramid ({:?}):", opts.lod_strategy);
    for level in pyramid.levels() {
        println!(
            "    level {}: {} points ({:.1}%, {:.1} MiB)",
            level.level,
            level.points.len(),
            level.reduction * 100.0,
            level.memory_bytes as f64 / (1024.0 * 1024.0),
        );
        let samples: Vec<PointSample> = level
            .points
            .iter()
            .map(|p| PointSample::new(*p, None, 0))
            .collect();
        let path = opts.wdir.join(format!("lod_{}.ply", level.level));
        let mut w = BufWriter::new(fs::File::create(path)?);
        write_ply_points(&mut w, &samples, Rgba8::WHITE)?;
    }
    Ok(())
}

fn write_outputs(wdir: &Path, output: &PipelineOutput) -> planscan_core::Result<()> {
    let text = |name: &str| -> planscan_core::Result<BufWriter<fs::File>> {
        Ok(BufWriter::new(fs::File::create(wdir.join(name))?))
    };

    // Classified point pools, text and colored PLY.
    for (name, points, color) in [
        ("wall", &output.wall_points, Rgba8::new(200, 60, 60, 255)),
        ("floor", &output.floor_points, Rgba8::new(60, 200, 60, 255)),
        (
            "ceiling",
            &output.ceiling_points,
            Rgba8::new(60, 60, 200, 255),
        ),
    ] {
        write_points(&mut text(&format!("{name}.txt"))?, points)?;
        write_ply_points(&mut text(&format!("{name}.ply"))?, points, color)?;
        println!("  {name}.txt / {name}.ply ({} points)", points.len());
    }

    lineset::write_floor_plan(&mut text("floor_plan.txt")?, &output.floor_plan_lines())?;
    println!("  floor_plan.txt ({} lines)", output.wall_lines.len());

    let circles = output.circle_rows();
    if !circles.is_empty() {
        lineset::write_circles(&mut text("cylinder")?, &circles)?;
        lineset::write_cylinder_edges(&mut text("cylinder_final")?, &output.cylinder_edges)?;
        write_coff(&mut text("cylinder.off")?, &output.cylinder_mesh)?;
        println!("  cylinder / cylinder_final / cylinder.off ({} columns)", circles.len());
    }

    if !output.walls.is_empty() {
        write_coff(&mut text("wireframe.off")?, &output.wall_mesh)?;
        println!(
            "  wireframe.off ({} walls, {} faces)",
            output.walls.len(),
            output.wall_mesh.faces.len()
        );
    }

    Ok(())
}

fn print_usage() {
    println!(
        r#"planscan: floor plan and wireframe reconstruction from point clouds
====================================================================

Reads a labeled point cloud (x y z label nx ny nz per line), detects
wall planes and column cylinders per label group, and writes a 2D floor
plan plus 3D wireframe meshes.

USAGE:
  planscan <cloud_path> [OPTIONS]

ARGUMENTS:
  <cloud_path>              Path to the labeled point cloud text file

OPTIONS:
  --wdir <dir>              Working directory for sidecars and outputs (default: .)
  --probability <p>         RANSAC success probability (default: 0.99)
  --min-points <n>          Minimum inliers per plane (default: 5000)
  --epsilon <m>             Inlier distance threshold (default: 0.02)
  --cluster-epsilon <m>     Connected-component radius (default: 0.5)
  --normal-threshold <c>    Minimum |cos| between point and plane normals (default: 0.9)
  --cos-angle <c>           Verticality tolerance as |cos| to the plan (default: 0.08)
  --seed <n>                RNG seed; equal seeds give identical output (default: 0)
  --config <path>           JSON pipeline config; overrides all of the above
  --no-regularize           Skip wall merging, snapping, and orthogonalization
  --no-cylinders            Skip cylinder detection
  --lod-strategy <s>        uniform | voxel | random | importance (default: voxel)
  --lod-levels <n>          Write n LOD preview levels as lod_<k>.ply (default: 0)
  -h, --help                Show this help message

SIDECARS (read from --wdir when present):
  strokes.json              User wall centerline strokes for guided fitting
  floor.off, ceiling.off    Reconstructed height meshes for the resolver

OUTPUTS (written to --wdir):
  wall.txt / floor.txt / ceiling.txt    Classified point pools (plus .ply)
  floor_plan.txt                        Wall lines: x1 y1 x2 y2 nx ny
  cylinder, cylinder_final              Column circles and octagon edges
  cylinder.off, wireframe.off           Colored OFF meshes

EXIT CODES:
  0 success, 2 invalid input, 3 nothing detected, 4 i/o failure,
  5 resource limit

EXAMPLES:
  planscan scan.txt --wdir out --seed 42
  planscan scan.txt --min-points 2000 --epsilon 0.05 --no-cylinders
"#
    );
}
