//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

use crate::error::{CommonError, CommonResult};

/// An axis-aligned geographic bounding box.
///
/// Bounds are expressed in the same coordinate reference as the dataset's
/// longitude/latitude coordinate variables (degrees for EMO-style grids).
/// All containment checks are inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
}

impl BoundingBox {
    /// Box used by the reference regional run (Poland with a 0.05 degree margin).
    pub const POLAND: BoundingBox = BoundingBox {
        lon_min: 12.95,
        lon_max: 26.05,
        lat_min: 47.95,
        lat_max: 55.05,
    };

    /// Create a new bounding box, rejecting inverted or non-finite bounds.
    pub fn new(lon_min: f64, lon_max: f64, lat_min: f64, lat_max: f64) -> CommonResult<Self> {
        let bbox = Self {
            lon_min,
            lon_max,
            lat_min,
            lat_max,
        };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Parse a "lon_min,lon_max,lat_min,lat_max" string.
    pub fn from_str_list(s: &str) -> Result<Self, BboxParseError> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let mut values = [0.0f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| BboxParseError::InvalidNumber(part.to_string()))?;
        }

        Self::new(values[0], values[1], values[2], values[3])
            .map_err(|e| BboxParseError::Invalid(e.to_string()))
    }

    /// Check the min <= max invariant on both axes.
    pub fn validate(&self) -> CommonResult<()> {
        let all = [self.lon_min, self.lon_max, self.lat_min, self.lat_max];
        if all.iter().any(|v| !v.is_finite()) {
            return Err(CommonError::InvalidBbox(format!(
                "bounds must be finite: {:?}",
                self
            )));
        }
        if self.lon_min > self.lon_max {
            return Err(CommonError::InvalidBbox(format!(
                "lon_min {} > lon_max {}",
                self.lon_min, self.lon_max
            )));
        }
        if self.lat_min > self.lat_max {
            return Err(CommonError::InvalidBbox(format!(
                "lat_min {} > lat_max {}",
                self.lat_min, self.lat_max
            )));
        }
        Ok(())
    }

    /// Inclusive longitude check. NaN is never contained.
    pub fn contains_lon(&self, lon: f64) -> bool {
        lon >= self.lon_min && lon <= self.lon_max
    }

    /// Inclusive latitude check. NaN is never contained.
    pub fn contains_lat(&self, lat: f64) -> bool {
        lat >= self.lat_min && lat <= self.lat_max
    }

    /// Check if a point lies within this box (edges included).
    pub fn contains_point(&self, lon: f64, lat: f64) -> bool {
        self.contains_lon(lon) && self.contains_lat(lat)
    }

    /// Check if this box overlaps another (touching edges count).
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.lon_min <= other.lon_max
            && self.lon_max >= other.lon_min
            && self.lat_min <= other.lat_max
            && self.lat_max >= other.lat_min
    }

    /// Smallest box covering a set of (lon, lat) points.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = points.into_iter();
        let (lon, lat) = iter.next()?;
        let mut bbox = Self {
            lon_min: lon,
            lon_max: lon,
            lat_min: lat,
            lat_max: lat,
        };
        for (lon, lat) in iter {
            bbox.lon_min = bbox.lon_min.min(lon);
            bbox.lon_max = bbox.lon_max.max(lon);
            bbox.lat_min = bbox.lat_min.min(lat);
            bbox.lat_max = bbox.lat_max.max(lat);
        }
        Some(bbox)
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::POLAND
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "lon [{}, {}] lat [{}, {}]",
            self.lon_min, self.lon_max, self.lat_min, self.lat_max
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid bbox format: {0}. Expected 'lon_min,lon_max,lat_min,lat_max'")]
    InvalidFormat(String),

    #[error("Invalid number in bbox: {0}")]
    InvalidNumber(String),

    #[error("{0}")]
    Invalid(String),
}
