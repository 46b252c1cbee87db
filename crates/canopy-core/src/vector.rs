//! Shapefile input: dissolved polygon footprints and attributed points.
//!
//! Reading is kept to [`read_footprint`] and [`read_points`]; the shape and
//! attribute conversions they use work on in-memory `shapefile` values.

use std::path::Path;

use geo::{Coord, LineString, MultiPolygon, Polygon};
use shapefile::dbase::{FieldValue, Record};
use shapefile::{PolygonRing, Shape};
use tracing::{debug, warn};

use crate::error::{CanopyError, Result};

/// A point feature with its site id and class attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct SitePoint {
    pub uid: String,
    pub class: String,
    pub x: f64,
    pub y: f64,
}

fn ring_to_line<P>(points: &[P], xy: impl Fn(&P) -> (f64, f64)) -> LineString<f64> {
    points
        .iter()
        .map(|p| {
            let (x, y) = xy(p);
            Coord { x, y }
        })
        .collect()
}

fn rings_to_polygons<P>(rings: &[PolygonRing<P>], xy: impl Fn(&P) -> (f64, f64) + Copy) -> Vec<Polygon<f64>> {
    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    for ring in rings {
        match ring {
            PolygonRing::Outer(points) => polygons.push(Polygon::new(ring_to_line(points, xy), vec![])),
            PolygonRing::Inner(points) => match polygons.last_mut() {
                Some(outer) => outer.interiors_push(ring_to_line(points, xy)),
                // A hole before any outer ring; treat it as an outer ring.
                None => polygons.push(Polygon::new(ring_to_line(points, xy), vec![])),
            },
        }
    }
    polygons
}

/// Polygons of a polygon shape (Z and M values dropped). Other shape
/// types give an empty list.
pub fn shape_polygons(shape: &Shape) -> Vec<Polygon<f64>> {
    match shape {
        Shape::Polygon(p) => rings_to_polygons(p.rings(), |pt| (pt.x, pt.y)),
        Shape::PolygonM(p) => rings_to_polygons(p.rings(), |pt| (pt.x, pt.y)),
        Shape::PolygonZ(p) => rings_to_polygons(p.rings(), |pt| (pt.x, pt.y)),
        _ => Vec::new(),
    }
}

/// Coordinates of a point shape, or `None` for other shape types.
pub fn shape_point(shape: &Shape) -> Option<(f64, f64)> {
    match shape {
        Shape::Point(p) => Some((p.x, p.y)),
        Shape::PointM(p) => Some((p.x, p.y)),
        Shape::PointZ(p) => Some((p.x, p.y)),
        _ => None,
    }
}

/// Attribute value as text. Null values give an empty string; whole
/// numbers are written without a decimal part.
pub fn field_text(value: &FieldValue) -> String {
    fn number(v: f64) -> String {
        if v.fract() == 0.0 && v.abs() < 1e15 {
            format!("{}", v as i64)
        } else {
            v.to_string()
        }
    }
    match value {
        FieldValue::Character(s) => s.as_deref().unwrap_or("").trim().to_string(),
        FieldValue::Memo(s) => s.trim().to_string(),
        FieldValue::Numeric(v) => v.map(number).unwrap_or_default(),
        FieldValue::Float(v) => v.map(|v| number(v as f64)).unwrap_or_default(),
        FieldValue::Double(v) | FieldValue::Currency(v) => number(*v),
        FieldValue::Integer(v) => v.to_string(),
        FieldValue::Logical(v) => v.map(|b| b.to_string()).unwrap_or_default(),
        other => format!("{other:?}"),
    }
}

/// Merge the polygons of every shape into one footprint. Shapes that are
/// not polygons are ignored.
pub fn dissolve<'a>(shapes: impl IntoIterator<Item = &'a Shape>) -> MultiPolygon<f64> {
    MultiPolygon::new(shapes.into_iter().flat_map(shape_polygons).collect())
}

/// Build a [`SitePoint`] from a point shape and its attribute record.
/// `index` is only used for error context.
pub fn site_point(
    path: &Path,
    index: usize,
    shape: &Shape,
    record: &Record,
    uid_field: &str,
    class_field: &str,
) -> Result<Option<SitePoint>> {
    let Some((x, y)) = shape_point(shape) else {
        return Ok(None);
    };
    let attribute = |name: &str| {
        record
            .get(name)
            .map(field_text)
            .ok_or_else(|| CanopyError::MissingAttribute {
                path: path.to_path_buf(),
                index,
                attribute: name.to_string(),
            })
    };
    Ok(Some(SitePoint {
        uid: attribute(uid_field)?,
        class: attribute(class_field)?,
        x,
        y,
    }))
}

fn read_shapes(path: &Path) -> Result<Vec<(Shape, Record)>> {
    let shp_err = |source| CanopyError::Shapefile {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = shapefile::Reader::from_path(path).map_err(shp_err)?;
    reader
        .iter_shapes_and_records()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(shp_err)
}

/// Read a polygon shapefile and dissolve all its features into one footprint.
pub fn read_footprint(path: impl AsRef<Path>) -> Result<MultiPolygon<f64>> {
    let path = path.as_ref();
    let shapes = read_shapes(path)?;
    let footprint = dissolve(shapes.iter().map(|(s, _)| s));
    if footprint.0.is_empty() {
        return Err(CanopyError::NoFeatures {
            path: path.to_path_buf(),
            kind: "polygon",
        });
    }
    debug!(path = %path.display(), n_features = shapes.len(), n_polygons = footprint.0.len(), "footprint dissolved");
    Ok(footprint)
}

/// Read a point shapefile, taking the site id from `uid_field` and the
/// class from `class_field`. Non-point shapes are skipped with a warning.
pub fn read_points(path: impl AsRef<Path>, uid_field: &str, class_field: &str) -> Result<Vec<SitePoint>> {
    let path = path.as_ref();
    let mut points = Vec::new();
    for (index, (shape, record)) in read_shapes(path)?.iter().enumerate() {
        match site_point(path, index, shape, record, uid_field, class_field)? {
            Some(p) => points.push(p),
            None => warn!(index, shape = ?shape.shapetype(), "skipping non-point feature"),
        }
    }
    if points.is_empty() {
        return Err(CanopyError::NoFeatures {
            path: path.to_path_buf(),
            kind: "point",
        });
    }
    debug!(path = %path.display(), n_points = points.len(), "points read");
    Ok(points)
}
