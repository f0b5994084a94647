//! Administrative regions loaded from a GeoJSON FeatureCollection.

use std::path::Path;

use region_common::BoundingBox;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{ZonalError, ZonalResult};
use crate::geometry::{Geometry, Polygon, Ring};

/// Default property holding the region's display name.
pub const DEFAULT_NAME_FIELD: &str = "nazwa";

/// One named region.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub name: String,
    pub geometry: Geometry,
    pub bounds: BoundingBox,
}

/// All regions of one partition, in file order. Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionSet {
    regions: Vec<Region>,
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    type_: String,
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    geometry: Option<GeoJsonGeometry>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum GeoJsonGeometry {
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
    #[serde(other)]
    Unsupported,
}

impl RegionSet {
    pub fn new(regions: Vec<Region>) -> Self {
        Self { regions }
    }

    /// Load a GeoJSON file, taking display names from `name_field`.
    pub fn load(path: &Path, name_field: &str) -> ZonalResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let set = Self::from_geojson_str(&text, name_field).map_err(|e| match e {
            ZonalError::Json(err) => ZonalError::RegionFile {
                path: path.to_path_buf(),
                message: err.to_string(),
            },
            other => other,
        })?;
        info!(path = %path.display(), regions = set.len(), "Loaded regions");
        Ok(set)
    }

    /// Parse a GeoJSON FeatureCollection.
    ///
    /// Features whose geometry is missing or not a (Multi)Polygon are skipped
    /// with a warning. A feature without the name property is an error.
    pub fn from_geojson_str(text: &str, name_field: &str) -> ZonalResult<Self> {
        let collection: FeatureCollection = serde_json::from_str(text)?;
        if collection.type_ != "FeatureCollection" {
            return Err(ZonalError::InvalidGeometry {
                region: String::new(),
                message: format!("expected FeatureCollection, got {}", collection.type_),
            });
        }

        let mut regions = Vec::with_capacity(collection.features.len());
        for (index, feature) in collection.features.into_iter().enumerate() {
            let name = feature_name(&feature, name_field).ok_or_else(|| {
                ZonalError::InvalidGeometry {
                    region: format!("#{}", index),
                    message: format!("missing '{}' property", name_field),
                }
            })?;

            let geometry = match feature.geometry {
                Some(GeoJsonGeometry::Polygon { coordinates }) => {
                    Geometry::Polygon(polygon_from(&name, coordinates)?)
                }
                Some(GeoJsonGeometry::MultiPolygon { coordinates }) => Geometry::MultiPolygon(
                    coordinates
                        .into_iter()
                        .map(|rings| polygon_from(&name, rings))
                        .collect::<ZonalResult<Vec<_>>>()?,
                ),
                Some(GeoJsonGeometry::Unsupported) | None => {
                    warn!(region = %name, "Skipping feature without polygon geometry");
                    continue;
                }
            };

            let bounds = geometry.bounds().ok_or_else(|| ZonalError::InvalidGeometry {
                region: name.clone(),
                message: "empty geometry".to_string(),
            })?;

            regions.push(Region {
                name,
                geometry,
                bounds,
            });
        }

        Ok(Self { regions })
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Region> {
        self.regions.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Region> {
        self.regions.get(index)
    }

    pub fn names(&self) -> Vec<&str> {
        self.regions.iter().map(|r| r.name.as_str()).collect()
    }
}

impl<'a> IntoIterator for &'a RegionSet {
    type Item = &'a Region;
    type IntoIter = std::slice::Iter<'a, Region>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}

fn feature_name(feature: &Feature, name_field: &str) -> Option<String> {
    match feature.properties.as_ref()?.get(name_field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn polygon_from(name: &str, rings: Vec<Vec<Vec<f64>>>) -> ZonalResult<Polygon> {
    let invalid = |message: String| ZonalError::InvalidGeometry {
        region: name.to_string(),
        message,
    };

    let mut rings = rings.into_iter().map(|ring| {
        let points = ring
            .into_iter()
            .map(|pos| match pos.as_slice() {
                [x, y, ..] => Ok((*x, *y)),
                _ => Err(invalid("position with fewer than 2 coordinates".to_string())),
            })
            .collect::<ZonalResult<Vec<_>>>()?;
        Ring::new(points).map_err(invalid)
    });

    let exterior = rings
        .next()
        .ok_or_else(|| invalid("polygon without rings".to_string()))??;
    let holes = rings.collect::<ZonalResult<Vec<_>>>()?;
    Ok(Polygon::new(exterior, holes))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_REGIONS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"nazwa": "mazowieckie", "kod": 14},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[2,0],[2,2],[0,2],[0,0]], [[0.5,0.5],[1,0.5],[1,1],[0.5,0.5]]]}},
            {"type": "Feature", "properties": {"nazwa": "pomorskie"},
             "geometry": {"type": "MultiPolygon", "coordinates": [[[[5,5,0],[6,5,0],[6,6,0],[5,5,0]]], [[[8,8],[9,8],[9,9],[8,8]]]]}},
            {"type": "Feature", "properties": {"nazwa": "punkt"},
             "geometry": {"type": "Point", "coordinates": [1, 1]}}
        ]
    }"#;

    #[test]
    fn test_parse_polygon_and_multipolygon() {
        let set = RegionSet::from_geojson_str(TWO_REGIONS, DEFAULT_NAME_FIELD).unwrap();
        assert_eq!(set.names(), vec!["mazowieckie", "pomorskie"]);

        let maz = set.get(0).unwrap();
        assert_eq!(maz.geometry.polygons()[0].holes.len(), 1);
        assert_eq!(maz.bounds, BoundingBox::new(0.0, 2.0, 0.0, 2.0).unwrap());

        let pom = set.get(1).unwrap();
        assert_eq!(pom.geometry.polygons().len(), 2);
        assert_eq!(pom.name, "pomorskie");
    }

    #[test]
    fn test_numeric_name_field() {
        let set = RegionSet::from_geojson_str(TWO_REGIONS, "kod");
        assert!(matches!(set, Err(ZonalError::InvalidGeometry { ref region, .. }) if region == "#1"));
    }

    #[test]
    fn test_not_a_feature_collection() {
        let err = RegionSet::from_geojson_str(r#"{"type":"Feature","features":[]}"#, "nazwa")
            .unwrap_err();
        assert!(matches!(err, ZonalError::InvalidGeometry { .. }));
        assert!(matches!(
            RegionSet::from_geojson_str("not json", "nazwa"),
            Err(ZonalError::Json(_))
        ));
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.geojson");
        std::fs::write(&path, "{").unwrap();
        let err = RegionSet::load(&path, "nazwa").unwrap_err();
        assert!(matches!(err, ZonalError::RegionFile { .. }));
    }
}
