// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end pipeline scenarios on synthetic room clouds.

use nalgebra::{Point2, Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use planscan_core::io::strokes::StrokeRecord;
use planscan_core::{PointCloud, PointSample, Progress};
use planscan_detect::RansacParams;
use planscan_fit::{
    fit_strokes, flat_height_field, run, FitConfig, PipelineConfig, UnresolvedReason,
    WallIdAllocator,
};
use planscan_index::SpatialIndex;

#[allow(clippy::too_many_arguments)]
fn wall_patch(
    origin: Point3<f32>,
    dir: Vector3<f32>,
    normal: Vector3<f32>,
    length: f32,
    height: f32,
    spacing: f32,
    label: u32,
    noise_amp: f32,
    rng: &mut StdRng,
) -> Vec<PointSample> {
    let mut out = Vec::new();
    let cols = (length / spacing) as usize + 1;
    let rows = (height / spacing) as usize + 1;
    for c in 0..cols {
        for r in 0..rows {
            let mut p = origin + dir * (c as f32 * spacing) + Vector3::z() * (r as f32 * spacing);
            if noise_amp > 0.0 {
                p += normal * rng.gen_range(-noise_amp..noise_amp);
            }
            out.push(PointSample::new(p, Some(normal), label));
        }
    }
    out
}

fn horizontal_patch(z: f32, size: f32, spacing: f32, up: f32, label: u32) -> Vec<PointSample> {
    let mut out = Vec::new();
    let n = (size / spacing) as usize + 1;
    for i in 0..n {
        for j in 0..n {
            out.push(PointSample::new(
                Point3::new(i as f32 * spacing, j as f32 * spacing, z),
                Some(Vector3::new(0.0, 0.0, up)),
                label,
            ));
        }
    }
    out
}

/// 10m x 10m x 3m room. Wall noise amplitude is applied along each wall's
/// normal; floor and ceiling are sampled coarser than the walls.
fn room_cloud(noise_amp: f32, noise_seed: u64) -> PointCloud {
    let mut rng = StdRng::seed_from_u64(noise_seed);
    let mut samples = Vec::new();
    let walls: [(Point3<f32>, Vector3<f32>, Vector3<f32>); 4] = [
        (Point3::new(0.0, 0.0, 0.0), Vector3::x(), Vector3::y()),
        (Point3::new(0.0, 10.0, 0.0), Vector3::x(), -Vector3::y()),
        (Point3::new(0.0, 0.0, 0.0), Vector3::y(), Vector3::x()),
        (Point3::new(10.0, 0.0, 0.0), Vector3::y(), -Vector3::x()),
    ];
    for (label, (origin, dir, normal)) in walls.into_iter().enumerate() {
        let patch = wall_patch(
            origin,
            dir,
            normal,
            10.0,
            3.0,
            0.1,
            label as u32 + 1,
            noise_amp,
            &mut rng,
        );
        samples.extend(patch);
    }
    samples.extend(horizontal_patch(0.0, 10.0, 0.2, 1.0, 5));
    samples.extend(horizontal_patch(3.0, 10.0, 0.2, -1.0, 6));
    PointCloud::from_samples(samples).unwrap()
}

/// Cylinder shell of radius 0.5 around (5, 5), 3 m tall, tilted about the
/// x axis through its midpoint.
fn cylinder_shell(tilt: f32, label: u32) -> Vec<PointSample> {
    let mid = Point3::new(5.0f32, 5.0, 1.5);
    let (sin, cos) = tilt.sin_cos();
    let rotate = |v: Vector3<f32>| Vector3::new(v.x, v.y * cos - v.z * sin, v.y * sin + v.z * cos);
    let mut out = Vec::new();
    for a in 0..64 {
        let phi = a as f32 * std::f32::consts::TAU / 64.0;
        let normal = Vector3::new(phi.cos(), phi.sin(), 0.0);
        for r in 0..31 {
            let rel = normal * 0.5 + Vector3::z() * (r as f32 * 0.1 - 1.5);
            out.push(PointSample::new(mid + rotate(rel), Some(rotate(normal)), label));
        }
    }
    out
}

fn config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.ransac = RansacParams::default().with_min_points(1500);
    config
}

fn stroke(id: u32, points: &[[f64; 2]]) -> StrokeRecord {
    StrokeRecord {
        id,
        points: points.to_vec(),
        closed: false,
    }
}

#[test]
fn rectangular_room_reconstruction() {
    let cloud = room_cloud(0.0, 0);
    let output = run(&cloud, &[], None, &config(), &mut Progress::none()).unwrap();

    assert_eq!(output.wall_lines.len(), 4);
    assert_eq!(output.summary.cylinders, 0);
    assert_eq!(output.summary.unresolved_strokes, 0);
    assert!(output.circles.is_empty());

    // The four lines trace the square's sides.
    let mut sides = [false; 4];
    for line in &output.wall_lines {
        assert!((line.length() - 10.0).abs() < 0.2);
        let mx = (line.s.x + line.t.x) / 2.0;
        let my = (line.s.y + line.t.y) / 2.0;
        if my.abs() < 0.1 {
            sides[0] = true;
        } else if (my - 10.0).abs() < 0.1 {
            sides[1] = true;
        } else if mx.abs() < 0.1 {
            sides[2] = true;
        } else if (mx - 10.0).abs() < 0.1 {
            sides[3] = true;
        }
    }
    assert_eq!(sides, [true; 4]);

    let mean = |pts: &[PointSample]| {
        pts.iter().map(|p| p.position.z as f64).sum::<f64>() / pts.len() as f64
    };
    assert!(mean(&output.floor_points).abs() < 0.05);
    assert!((mean(&output.ceiling_points) - 3.0).abs() < 0.05);
}

#[test]
fn stroke_guided_fit_snaps_to_noisy_wall() {
    let cloud = room_cloud(0.01, 11);
    // Stroke approximates the south wall, 0.08m off laterally.
    let strokes = [stroke(1, &[[0.0, 0.08], [10.0, 0.08]])];
    let output = run(&cloud, &strokes, None, &config(), &mut Progress::none()).unwrap();

    assert_eq!(output.summary.unresolved_strokes, 0);
    assert_eq!(output.walls.len(), 1);
    let wall = &output.walls[0];
    assert!((wall.start.x - 0.0).abs() <= 0.05 && wall.start.y.abs() <= 0.05);
    assert!((wall.end.x - 10.0).abs() <= 0.05 && wall.end.y.abs() <= 0.05);
    assert!(wall.start.z.abs() <= 0.05);
    assert!(wall.thickness <= 0.08, "thickness {}", wall.thickness);
    assert!(wall.confidence >= 0.8, "confidence {}", wall.confidence);
    assert!((wall.height - 3.0).abs() <= 0.1);
}

#[test]
fn near_collinear_strokes_merge_into_one_wall() {
    let cloud = room_cloud(0.0, 0);
    let strokes = [
        stroke(1, &[[0.0, 0.0], [5.0, 0.0]]),
        stroke(2, &[[5.2, 0.05], [10.0, 0.0]]),
    ];
    let output = run(&cloud, &strokes, None, &config(), &mut Progress::none()).unwrap();

    assert_eq!(output.walls.len(), 1, "merge left {} walls", output.walls.len());
    let wall = &output.walls[0];
    assert!(wall.length() >= 9.8 && wall.length() <= 10.2, "len {}", wall.length());
    assert!(wall.start_2d().y.abs() < 0.1 && wall.end_2d().y.abs() < 0.1);
    let mut ids = wall.stroke_ids.clone();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn height_miss_leaves_stroke_unresolved() {
    // Single wall far away from the height field's coverage.
    let mut rng = StdRng::seed_from_u64(0);
    let samples = wall_patch(
        Point3::new(0.0, 0.0, 0.0),
        Vector3::x(),
        Vector3::y(),
        10.0,
        3.0,
        0.1,
        1,
        0.0,
        &mut rng,
    );
    let positions: Vec<_> = samples.iter().map(|s| s.position).collect();
    let index = SpatialIndex::build_kdtree(&positions).unwrap();
    let heights = flat_height_field(
        Point2::new(100.0, 100.0),
        Point2::new(110.0, 110.0),
        0.0,
        3.0,
    );

    let strokes = [stroke(9, &[[0.0, 0.0], [10.0, 0.0]])];
    let mut ids = WallIdAllocator::new();
    let mut rng = StdRng::seed_from_u64(1);
    let outcome = fit_strokes(
        &samples,
        &index,
        &strokes,
        &heights,
        &RansacParams::default(),
        &FitConfig::default(),
        &mut ids,
        &mut rng,
        &mut Progress::none(),
    )
    .unwrap();

    assert!(outcome.walls.is_empty());
    assert_eq!(outcome.unresolved.len(), 1);
    assert_eq!(outcome.unresolved[0].reason, UnresolvedReason::HeightMiss);
}

#[test]
fn tilted_cylinder_is_not_a_column() {
    let upright = PointCloud::from_samples(cylinder_shell(0.0, 1)).unwrap();
    let leaning =
        PointCloud::from_samples(cylinder_shell(std::f32::consts::FRAC_PI_4, 1)).unwrap();

    let out = run(&upright, &[], None, &config(), &mut Progress::none()).unwrap();
    assert_eq!(out.summary.cylinders, 1);

    let out = run(&leaning, &[], None, &config(), &mut Progress::none()).unwrap();
    assert_eq!(out.summary.cylinders, 0);
    assert!(out.circles.is_empty());
}

#[test]
fn equal_seeds_reproduce_the_run_exactly() {
    let cloud = room_cloud(0.01, 11);
    let strokes = [stroke(1, &[[0.0, 0.08], [10.0, 0.08]])];
    let mut config = config();
    config.seed = 42;

    let a = run(&cloud, &strokes, None, &config, &mut Progress::none()).unwrap();
    let b = run(&cloud, &strokes, None, &config, &mut Progress::none()).unwrap();

    assert_eq!(a.summary, b.summary);
    assert_eq!(a.primitives.len(), b.primitives.len());
    assert_eq!(a.wall_lines.len(), b.wall_lines.len());
    for (x, y) in a.wall_lines.iter().zip(&b.wall_lines) {
        assert_eq!(x.id, y.id);
        assert_eq!(x.s, y.s);
        assert_eq!(x.t, y.t);
        assert_eq!(x.inliers, y.inliers);
    }
    assert_eq!(a.walls.len(), b.walls.len());
    for (x, y) in a.walls.iter().zip(&b.walls) {
        assert_eq!(x.id, y.id);
        assert_eq!(x.start, y.start);
        assert_eq!(x.end, y.end);
        assert_eq!(x.thickness, y.thickness);
        assert_eq!(x.confidence, y.confidence);
        assert_eq!(x.supports, y.supports);
    }
}
