//! Tests for BoundingBox parsing, validation and containment.

use region_common::bbox::{BboxParseError, BoundingBox};

// ============================================================================
// Constructor tests
// ============================================================================

#[test]
fn test_bbox_new() {
    let bbox = BoundingBox::new(-180.0, 180.0, -90.0, 90.0).unwrap();
    assert_eq!(bbox.lon_min, -180.0);
    assert_eq!(bbox.lon_max, 180.0);
    assert_eq!(bbox.lat_min, -90.0);
    assert_eq!(bbox.lat_max, 90.0);
}

#[test]
fn test_bbox_degenerate_point_is_valid() {
    let bbox = BoundingBox::new(5.0, 5.0, 5.0, 5.0).unwrap();
    assert_eq!(bbox.lon_min, bbox.lon_max);
    assert!(bbox.contains_point(5.0, 5.0));
}

#[test]
fn test_bbox_default_is_poland() {
    assert_eq!(BoundingBox::default(), BoundingBox::POLAND);
}

// ============================================================================
// from_str_list tests
// ============================================================================

#[test]
fn test_parse_whitespace() {
    let bbox = BoundingBox::from_str_list(" 1.5 , 2.5 ,3, 4 ").unwrap();
    assert_eq!(bbox.lon_min, 1.5);
    assert_eq!(bbox.lon_max, 2.5);
    assert_eq!(bbox.lat_min, 3.0);
    assert_eq!(bbox.lat_max, 4.0);
}

#[test]
fn test_parse_too_few() {
    let err = BoundingBox::from_str_list("1,2,3").unwrap_err();
    assert!(matches!(err, BboxParseError::InvalidFormat(_)));
}

#[test]
fn test_parse_invalid_number() {
    let err = BoundingBox::from_str_list("1,two,3,4").unwrap_err();
    assert!(matches!(err, BboxParseError::InvalidNumber(ref s) if s == "two"));
}

#[test]
fn test_parse_inverted() {
    let err = BoundingBox::from_str_list("10,0,0,5").unwrap_err();
    assert!(matches!(err, BboxParseError::Invalid(_)));
}

// ============================================================================
// Containment and intersection tests
// ============================================================================

#[test]
fn test_poland_contains_warsaw() {
    assert!(BoundingBox::POLAND.contains_point(21.01, 52.23));
    assert!(!BoundingBox::POLAND.contains_point(13.40, 52.52 + 3.0));
}

#[test]
fn test_intersects_adjacent_edge() {
    let a = BoundingBox::new(0.0, 10.0, 0.0, 10.0).unwrap();
    let b = BoundingBox::new(10.0, 20.0, 0.0, 10.0).unwrap();
    let c = BoundingBox::new(10.5, 20.0, 0.0, 10.0).unwrap();
    assert!(a.intersects(&b));
    assert!(!a.intersects(&c));
}

#[test]
fn test_from_points() {
    let bbox = BoundingBox::from_points([(1.0, 5.0), (-2.0, 7.0), (3.0, 6.0)]).unwrap();
    assert_eq!(bbox, BoundingBox::new(-2.0, 3.0, 5.0, 7.0).unwrap());
    assert!(BoundingBox::from_points(Vec::<(f64, f64)>::new()).is_none());
}

#[test]
fn test_serde_roundtrip_field_names() {
    let json = r#"{"lon_min":1.0,"lon_max":2.0,"lat_min":3.0,"lat_max":4.0}"#;
    let bbox: BoundingBox = serde_json::from_str(json).unwrap();
    assert_eq!(bbox, BoundingBox::new(1.0, 2.0, 3.0, 4.0).unwrap());
}
