//! Rasterizing region geometries onto grid cells, with an LRU mask cache.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use lru::LruCache;
use ndarray::Array2;
use region_common::{GeoTransform, GridShape};

use crate::geometry::Geometry;

/// Boolean raster, `true` where the cell centre lies inside the geometry.
pub type Mask = Array2<bool>;

/// Build the mask of `geometry` on a grid described by `transform` and `shape`.
///
/// A cell is selected when its centre is inside the geometry or on its
/// boundary. Only cells within the geometry's extent are tested.
pub fn build_mask(geometry: &Geometry, transform: &GeoTransform, shape: GridShape) -> Mask {
    let mut mask = Array2::from_elem((shape.rows, shape.cols), false);
    if shape.is_empty() {
        return mask;
    }
    let Some(bounds) = geometry.bounds() else {
        return mask;
    };

    let Some(cols) = candidate_range(
        transform.col_at(bounds.lon_min),
        transform.col_at(bounds.lon_max),
        shape.cols,
    ) else {
        return mask;
    };
    let Some(rows) = candidate_range(
        transform.row_at(bounds.lat_min),
        transform.row_at(bounds.lat_max),
        shape.rows,
    ) else {
        return mask;
    };

    for row in rows.0..=rows.1 {
        for col in cols.0..=cols.1 {
            let (x, y) = transform.cell_center(row, col);
            if geometry.contains(x, y) {
                mask[[row, col]] = true;
            }
        }
    }
    mask
}

/// Inclusive index range covering fractional positions `a` and `b`, padded by
/// one cell and clamped to `0..len`. `None` when it misses the grid.
fn candidate_range(a: f64, b: f64, len: usize) -> Option<(usize, usize)> {
    let lo = a.min(b).floor() - 1.0;
    let hi = a.max(b).ceil() + 1.0;
    if !lo.is_finite() || !hi.is_finite() || hi < 0.0 || lo > (len - 1) as f64 {
        return None;
    }
    let lo = lo.max(0.0) as usize;
    let hi = (hi as usize).min(len - 1);
    Some((lo, hi))
}

/// Number of selected cells.
pub fn mask_count(mask: &Mask) -> usize {
    mask.iter().filter(|&&m| m).count()
}

/// Cache key: (region index, transform bits, rows, cols).
pub type MaskKey = (usize, [u64; 6], usize, usize);

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaskCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Thread-safe LRU cache of region masks.
///
/// Grids within one variable usually share a transform, so each region's
/// mask is built once and reused for every year.
pub struct MaskCache {
    cache: Mutex<LruCache<MaskKey, Arc<Mask>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MaskCache {
    /// Create a cache holding at most `capacity` masks.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached mask for this key, building it on a miss.
    ///
    /// The mask is built outside the lock; two threads missing on the same
    /// key at once both build it and the later insert wins.
    pub fn get_or_build(
        &self,
        region_index: usize,
        geometry: &Geometry,
        transform: &GeoTransform,
        shape: GridShape,
    ) -> Arc<Mask> {
        let key: MaskKey = (region_index, transform.cache_key(), shape.rows, shape.cols);

        if let Some(mask) = self.lock().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(mask);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let mask = Arc::new(build_mask(geometry, transform, shape));
        self.lock().put(key, Arc::clone(&mask));
        mask
    }

    pub fn stats(&self) -> MaskCacheStats {
        MaskCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.lock().len(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<MaskKey, Arc<Mask>>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MaskCache {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Polygon, Ring};

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Geometry {
        Geometry::Polygon(Polygon::new(
            Ring::new(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1)]).unwrap(),
            vec![],
        ))
    }

    /// 4 rows x 5 cols, one-degree cells, north-up: x 0..5, y 4..0.
    fn grid() -> (GeoTransform, GridShape) {
        (GeoTransform::from_origin(0.0, 4.0, 1.0, -1.0), GridShape::new(4, 5))
    }

    #[test]
    fn test_outside_is_all_false() {
        let (t, shape) = grid();
        let mask = build_mask(&rect(20.0, 20.0, 30.0, 30.0), &t, shape);
        assert_eq!(mask.dim(), (4, 5));
        assert_eq!(mask_count(&mask), 0);
    }

    #[test]
    fn test_covering_is_all_true() {
        let (t, shape) = grid();
        let mask = build_mask(&rect(-1.0, -1.0, 6.0, 5.0), &t, shape);
        assert_eq!(mask_count(&mask), 20);
    }

    #[test]
    fn test_single_cell() {
        let (t, shape) = grid();
        // Cell row 1, col 2 spans x 2..3, y 2..3.
        let mask = build_mask(&rect(2.0, 2.0, 3.0, 3.0), &t, shape);
        assert_eq!(mask_count(&mask), 1);
        assert!(mask[[1, 2]]);
    }

    #[test]
    fn test_hole_excludes_cells() {
        let (t, shape) = grid();
        let outer = Ring::new(vec![(0.0, 0.0), (5.0, 0.0), (5.0, 4.0), (0.0, 4.0)]).unwrap();
        let hole = Ring::new(vec![(1.0, 1.0), (4.0, 1.0), (4.0, 3.0), (1.0, 3.0)]).unwrap();
        let geom = Geometry::Polygon(Polygon::new(outer, vec![hole]));
        let mask = build_mask(&geom, &t, shape);
        // 20 cells minus the 3 x 2 block inside the hole
        assert_eq!(mask_count(&mask), 14);
        assert!(!mask[[1, 2]]);
        assert!(mask[[0, 0]]);
    }

    #[test]
    fn test_cache_hits_and_misses() {
        let (t, shape) = grid();
        let cache = MaskCache::new(4);
        let geom = rect(0.0, 0.0, 2.0, 2.0);

        let a = cache.get_or_build(0, &geom, &t, shape);
        let b = cache.get_or_build(0, &geom, &t, shape);
        assert!(Arc::ptr_eq(&a, &b));

        let other = GeoTransform::from_origin(0.0, 4.0, 0.5, -0.5);
        cache.get_or_build(0, &geom, &other, shape);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.entries, 2);
    }

    #[test]
    fn test_cache_evicts_lru() {
        let (t, shape) = grid();
        let cache = MaskCache::new(1);
        let geom = rect(0.0, 0.0, 2.0, 2.0);
        cache.get_or_build(0, &geom, &t, shape);
        cache.get_or_build(1, &geom, &t, shape);
        cache.get_or_build(0, &geom, &t, shape);
        assert_eq!(cache.stats().misses, 3);
        assert_eq!(cache.stats().entries, 1);
    }
}
