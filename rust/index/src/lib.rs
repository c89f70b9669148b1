// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # planscan-index
//!
//! Spatial acceleration structures and level-of-detail support for indoor
//! point clouds.
//!
//! - [`octree::Octree`]: arena-backed octree with incremental insertion
//! - [`kdtree::KdTree`]: balanced k-d tree built once over a snapshot
//! - [`lod`]: level-of-detail pyramid generation and distance-band selection
//! - [`chunk`]: chunked residency tracking with byte budgets and eviction
//!
//! Both trees index a snapshot of positions taken at build time. Points
//! appended to the source cloud afterwards are invisible until a rebuild;
//! the octree additionally accepts single-point insertion.

pub mod chunk;
pub mod error;
pub mod heap;
pub mod kdtree;
pub mod lod;
pub mod octree;

pub use chunk::{ChunkManager, EvictionPolicy};
pub use error::{Error, Result};
pub use kdtree::KdTree;
pub use lod::{LodLevel, LodPyramid, LodStrategy};
pub use octree::Octree;

use nalgebra::Point3;
use planscan_core::Aabb;

/// Sentinel child slot meaning "no node".
pub const NIL: u32 = u32::MAX;

/// One result of a spatial query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryHit {
    /// Index into the position snapshot the tree was built from.
    pub index: u32,
    /// Euclidean distance to the query point.
    pub distance: f32,
}

/// Structure counters reported by [`Octree::stats`] and [`KdTree::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub points: usize,
    pub nodes: usize,
    pub leaves: usize,
    pub max_depth: u32,
}

/// Either spatial index behind one query surface.
///
/// The pipeline picks the octree for clouds that keep growing and the k-d
/// tree for fixed snapshots; callers that only query do not care which.
#[derive(Debug)]
pub enum SpatialIndex {
    Octree(Octree),
    KdTree(KdTree),
}

impl SpatialIndex {
    pub fn build_octree(positions: &[Point3<f32>]) -> Result<Self> {
        Ok(Self::Octree(Octree::build(positions)?))
    }

    pub fn build_kdtree(positions: &[Point3<f32>]) -> Result<Self> {
        Ok(Self::KdTree(KdTree::build(positions)?))
    }

    pub fn radius_query(&self, center: &Point3<f32>, radius: f32) -> Vec<QueryHit> {
        match self {
            Self::Octree(t) => t.radius_query(center, radius),
            Self::KdTree(t) => t.radius_query(center, radius),
        }
    }

    pub fn knn_query(&self, center: &Point3<f32>, k: usize) -> Vec<QueryHit> {
        match self {
            Self::Octree(t) => t.knn_query(center, k),
            Self::KdTree(t) => t.knn_query(center, k),
        }
    }

    pub fn aabb_query(&self, aabb: &Aabb) -> Vec<u32> {
        match self {
            Self::Octree(t) => t.aabb_query(aabb),
            Self::KdTree(t) => t.aabb_query(aabb),
        }
    }

    /// Appends one point. Only the octree supports this.
    pub fn insert(&mut self, position: Point3<f32>) -> Result<u32> {
        match self {
            Self::Octree(t) => Ok(t.insert(position)),
            Self::KdTree(_) => Err(Error::Unsupported(
                "k-d tree is immutable after build; rebuild instead",
            )),
        }
    }

    pub fn stats(&self) -> IndexStats {
        match self {
            Self::Octree(t) => t.stats(),
            Self::KdTree(t) => t.stats(),
        }
    }
}
