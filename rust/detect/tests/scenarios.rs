// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end detection scenarios on synthetic room clouds.

use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::SeedableRng;

use planscan_core::{PointCloud, PointSample, Progress};
use planscan_detect::{
    classify_planes, clean_circles, detect_cylinders, detect_planes, RansacParams,
};

/// Axis-aligned wall patch on a grid: `u` sweeps the wall direction,
/// z sweeps the height.
fn wall_patch(
    origin: Point3<f32>,
    dir: Vector3<f32>,
    normal: Vector3<f32>,
    length: f32,
    height: f32,
    spacing: f32,
    label: u32,
) -> Vec<PointSample> {
    let mut out = Vec::new();
    let cols = (length / spacing) as usize + 1;
    let rows = (height / spacing) as usize + 1;
    for c in 0..cols {
        for r in 0..rows {
            let p = origin + dir * (c as f32 * spacing) + Vector3::z() * (r as f32 * spacing);
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

/// 10m x 10m x 3m room: four walls, floor, ceiling, one label each.
fn room_cloud() -> PointCloud {
    let mut samples = Vec::new();
    samples.extend(wall_patch(
        Point3::new(0.0, 0.0, 0.0),
        Vector3::x(),
        Vector3::y(),
        10.0,
        3.0,
        0.1,
        1,
    ));
    samples.extend(wall_patch(
        Point3::new(0.0, 10.0, 0.0),
        Vector3::x(),
        -Vector3::y(),
        10.0,
        3.0,
        0.1,
        2,
    ));
    samples.extend(wall_patch(
        Point3::new(0.0, 0.0, 0.0),
        Vector3::y(),
        Vector3::x(),
        10.0,
        3.0,
        0.1,
        3,
    ));
    samples.extend(wall_patch(
        Point3::new(10.0, 0.0, 0.0),
        Vector3::y(),
        -Vector3::x(),
        10.0,
        3.0,
        0.1,
        4,
    ));
    samples.extend(horizontal_patch(0.0, 10.0, 0.1, 1.0, 5));
    samples.extend(horizontal_patch(3.0, 10.0, 0.1, -1.0, 6));
    PointCloud::from_samples(samples).unwrap()
}

fn params() -> RansacParams {
    RansacParams::default().with_min_points(2000)
}

#[test]
fn rectangular_room_yields_four_wall_lines() {
    let cloud = room_cloud();
    let stats = cloud.z_stats();
    let params = params();
    let mut rng = StdRng::seed_from_u64(7);
    let mut next_id = 0u32;

    let mut wall_lines = Vec::new();
    let mut floor_points = Vec::new();
    let mut ceiling_points = Vec::new();
    for group in cloud.groups() {
        let samples = cloud.group_samples(group);
        let planes = detect_planes(samples, &params, &mut rng, &mut Progress::none()).unwrap();
        assert_eq!(planes.len(), 1, "one plane per label group");
        let cls = classify_planes(
            &planes,
            samples,
            params.cos_angle,
            stats.min_z,
            stats.max_z,
            stats.mean_z,
            &mut next_id,
        );
        // Every inlier lies within epsilon of its line, and the endpoints
        // bound every inlier's axis projection.
        for line in &cls.wall_lines {
            let dir = line.form.direction();
            let u = |p: &nalgebra::Point2<f64>| dir.x * p.x + dir.y * p.y;
            let (lo, hi) = (u(&line.s).min(u(&line.t)), u(&line.s).max(u(&line.t)));
            for &i in &line.inliers {
                let p = samples[i as usize].position;
                let q = nalgebra::Point2::new(p.x as f64, p.y as f64);
                assert!(line.form.distance(&q) <= params.epsilon + 1e-6);
                let ui = u(&q);
                assert!(ui >= lo - 1e-6 && ui <= hi + 1e-6);
            }
        }

        wall_lines.extend(cls.wall_lines);
        floor_points.extend(cls.floor_points);
        ceiling_points.extend(cls.ceiling_points);
    }

    assert_eq!(wall_lines.len(), 4);
    for line in &wall_lines {
        assert!((line.length() - 10.0).abs() < 0.2, "len {}", line.length());
    }

    // Each wall sits on one side of the square.
    let mut sides = [false; 4];
    for line in &wall_lines {
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
    assert!(mean(&floor_points).abs() < 0.05);
    assert!((mean(&ceiling_points) - 3.0).abs() < 0.05);
}

#[test]
fn cylinder_in_empty_room_is_recovered() {
    let center = Point3::new(5.0f32, 5.0, 0.0);
    let radius = 0.5f32;
    let mut samples = Vec::new();
    for a in 0..64 {
        let angle = a as f32 * std::f32::consts::TAU / 64.0;
        let radial = Vector3::new(angle.cos(), angle.sin(), 0.0);
        for r in 0..31 {
            let p = center + radial * radius + Vector3::z() * (r as f32 * 0.1);
            samples.push(PointSample::new(p, Some(radial), 1));
        }
    }

    let params = RansacParams::default().with_min_points(1000);
    let mut rng = StdRng::seed_from_u64(3);
    let cylinders =
        detect_cylinders(&samples, &params, &mut rng, &mut Progress::none()).unwrap();
    assert_eq!(cylinders.len(), 1);

    let mut circles = vec![cylinders[0].footprint(&samples).unwrap()];
    clean_circles(&mut circles, 1.0);
    assert!(circles[0].active);
    assert!((circles[0].radius - 0.5).abs() <= 0.02, "r {}", circles[0].radius);
    assert!(
        (circles[0].center.x - 5.0).abs() <= 0.05 && (circles[0].center.y - 5.0).abs() <= 0.05,
        "c {:?}",
        circles[0].center
    );
}

#[test]
fn detection_is_deterministic_for_equal_seeds() {
    let cloud = room_cloud();
    let params = params();

    let run = || {
        let mut rng = StdRng::seed_from_u64(42);
        let mut all = Vec::new();
        for group in cloud.groups() {
            let planes = detect_planes(
                cloud.group_samples(group),
                &params,
                &mut rng,
                &mut Progress::none(),
            )
            .unwrap();
            all.extend(planes);
        }
        all
    };

    let a = run();
    let b = run();
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.inliers, y.inliers);
        assert_eq!(x.plane.normal, y.plane.normal);
        assert_eq!(x.plane.offset, y.plane.offset);
    }
}
