//! Feature records as returned by a feature-service `query` call.
//!
//! The JSON shape follows the ArcGIS REST feature-set encoding:
//! `{ "features": [ { "attributes": { .. }, "geometry": { .. } } ] }` where a
//! geometry is either a point (`x`, `y`) or a polygon (`rings`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    Result,
    record::{CensusCode, DistrictRecord, attribute, fields},
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box in map coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Extent {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin: xmin.min(xmax),
            ymin: ymin.min(ymax),
            xmax: xmin.max(xmax),
            ymax: ymin.max(ymax),
        }
    }

    pub fn center(&self) -> Point {
        Point::new(
            f64::midpoint(self.xmin, self.xmax),
            f64::midpoint(self.ymin, self.ymax),
        )
    }

    pub fn contains(&self, point: Point) -> bool {
        (self.xmin..=self.xmax).contains(&point.x) && (self.ymin..=self.ymax).contains(&point.y)
    }

    pub fn intersects(&self, other: &Self) -> bool {
        self.xmin <= other.xmax
            && other.xmin <= self.xmax
            && self.ymin <= other.ymax
            && other.ymin <= self.ymax
    }

    fn from_points(mut points: impl Iterator<Item = Point>) -> Option<Self> {
        let first = points.next()?;
        Some(points.fold(
            Self::new(first.x, first.y, first.x, first.y),
            |acc, p| Self {
                xmin: acc.xmin.min(p.x),
                ymin: acc.ymin.min(p.y),
                xmax: acc.xmax.max(p.x),
                ymax: acc.ymax.max(p.y),
            },
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Geometry {
    Point(Point),
    /// Rings of `[x, y]` (or `[x, y, z]`) vertices; holes are rings too.
    Polygon { rings: Vec<Vec<Vec<f64>>> },
}

impl Geometry {
    fn vertices(&self) -> Box<dyn Iterator<Item = Point> + '_> {
        match self {
            Self::Point(p) => Box::new(std::iter::once(*p)),
            Self::Polygon { rings } => Box::new(
                rings
                    .iter()
                    .flatten()
                    .filter(|v| v.len() >= 2)
                    .map(|v| Point::new(v[0], v[1])),
            ),
        }
    }

    pub fn extent(&self) -> Option<Extent> {
        Extent::from_points(self.vertices())
    }

    /// Area-weighted centroid; degenerate polygons fall back to the mean of
    /// their vertices.
    pub fn centroid(&self) -> Option<Point> {
        let rings = match self {
            Self::Point(p) => return Some(*p),
            Self::Polygon { rings } => rings,
        };

        let (mut area2, mut cx, mut cy) = (0.0, 0.0, 0.0);
        for ring in rings {
            let pts: Vec<Point> = ring
                .iter()
                .filter(|v| v.len() >= 2)
                .map(|v| Point::new(v[0], v[1]))
                .collect();
            for (a, b) in pts.iter().zip(pts.iter().cycle().skip(1)) {
                let cross = a.x * b.y - b.x * a.y;
                area2 += cross;
                cx += (a.x + b.x) * cross;
                cy += (a.y + b.y) * cross;
            }
        }

        if area2.abs() > f64::EPSILON {
            return Some(Point::new(cx / (3.0 * area2), cy / (3.0 * area2)));
        }

        let (n, sx, sy) = self
            .vertices()
            .fold((0usize, 0.0, 0.0), |(n, sx, sy), p| (n + 1, sx + p.x, sy + p.y));
        (n > 0).then(|| Point::new(sx / n as f64, sy / n as f64))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
}

impl Feature {
    pub fn new(attributes: Map<String, Value>, geometry: Option<Geometry>) -> Self {
        Self {
            attributes,
            geometry,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        attribute(&self.attributes, name)
    }

    pub fn census_code(&self) -> Option<CensusCode> {
        self.attribute(fields::CENSUS_CODE)
            .and_then(CensusCode::from_value)
    }

    pub fn to_record(&self) -> Result<DistrictRecord> {
        DistrictRecord::from_attributes(&self.attributes)
    }

    pub fn centroid(&self) -> Option<Point> {
        self.geometry.as_ref().and_then(Geometry::centroid)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    #[serde(default)]
    pub features: Vec<Feature>,
    /// Feature services answer failed queries with HTTP 200 and an `error` body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ServiceError>,
}

impl FeatureSet {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            features,
            error: None,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Census codes of every feature that carries one, in result order.
    pub fn census_codes(&self) -> impl Iterator<Item = CensusCode> + '_ {
        self.features.iter().filter_map(Feature::census_code)
    }
}
