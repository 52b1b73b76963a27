//! Type-specific annotation payloads.

use std::collections::BTreeMap;
use std::fmt;

use annotate_geom::algebra::{mean, ring_centroid};
use annotate_geom::{BoundingBox, CompoundPath, ImagePoint};
use serde::{Deserialize, Serialize};

use crate::model::AnnotationId;
use crate::raster::RasterId;

/// Annotation type tag, serialized as its wire name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AnnotationType {
    BoundingBox,
    Polygon,
    Polyline,
    Skeleton,
    Tag,
    Table,
    DirectionalVector,
    Mask,
    RasterLayer,
    /// Type contributed by a plugin serializer
    Other(String),
}

impl AnnotationType {
    /// Wire name of this type.
    pub fn as_str(&self) -> &str {
        match self {
            AnnotationType::BoundingBox => "bounding_box",
            AnnotationType::Polygon => "polygon",
            AnnotationType::Polyline => "polyline",
            AnnotationType::Skeleton => "skeleton",
            AnnotationType::Tag => "tag",
            AnnotationType::Table => "table",
            AnnotationType::DirectionalVector => "directional_vector",
            AnnotationType::Mask => "mask",
            AnnotationType::RasterLayer => "raster_layer",
            AnnotationType::Other(name) => name,
        }
    }

    /// Parse a wire name; unknown names become [`AnnotationType::Other`].
    pub fn parse(name: &str) -> Self {
        match name {
            "bounding_box" => AnnotationType::BoundingBox,
            "polygon" => AnnotationType::Polygon,
            "polyline" => AnnotationType::Polyline,
            "skeleton" => AnnotationType::Skeleton,
            "tag" => AnnotationType::Tag,
            "table" => AnnotationType::Table,
            "directional_vector" => AnnotationType::DirectionalVector,
            "mask" => AnnotationType::Mask,
            "raster_layer" => AnnotationType::RasterLayer,
            other => AnnotationType::Other(other.to_string()),
        }
    }

    /// Built-in types, in registration order.
    pub fn builtin() -> &'static [AnnotationType] {
        &[
            AnnotationType::BoundingBox,
            AnnotationType::Polygon,
            AnnotationType::Polyline,
            AnnotationType::Skeleton,
            AnnotationType::Tag,
            AnnotationType::Table,
            AnnotationType::DirectionalVector,
            AnnotationType::Mask,
            AnnotationType::RasterLayer,
        ]
    }
}

impl From<String> for AnnotationType {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<AnnotationType> for String {
    fn from(kind: AnnotationType) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for AnnotationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Open path, wire shape `{path: [{x, y}]}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polyline {
    pub path: Vec<ImagePoint>,
}

/// A single skeleton keypoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkeletonNode {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl SkeletonNode {
    pub fn point(&self) -> ImagePoint {
        ImagePoint::new(self.x, self.y)
    }
}

/// Keypoint skeleton, wire shape `{nodes: [{x, y, label?}]}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Skeleton {
    pub nodes: Vec<SkeletonNode>,
}

/// One cell of a table annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub row: u32,
    pub column: u32,
    pub bounding_box: BoundingBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Table, wire shape `{bounding_box, cells}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    pub bounding_box: BoundingBox,
    #[serde(default)]
    pub cells: Vec<TableCell>,
}

/// Direction in radians plus length in image pixels, wire shape `{angle, length}`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DirectionalVector {
    pub angle: f64,
    pub length: f64,
}

/// Mask annotation bound to a label on a raster.
///
/// The pixels live in the raster; the payload only records where.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskData {
    pub raster_id: RasterId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

/// Persisted form of a whole raster.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RasterLayerData {
    /// Alternating `label, run length` pairs over the row-major buffer
    pub dense_rle: Vec<u32>,
    /// Annotation id → label index
    pub mask_annotation_ids_mapping: BTreeMap<AnnotationId, u8>,
    pub total_pixels: u64,
    pub width: u32,
    pub height: u32,
}

/// Type-specific data of an image annotation or of one video keyframe.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    BoundingBox(BoundingBox),
    Polygon(CompoundPath),
    Polyline(Polyline),
    Skeleton(Skeleton),
    Tag,
    Table(Table),
    DirectionalVector(DirectionalVector),
    Mask(MaskData),
    RasterLayer(RasterLayerData),
    /// Opaque data of a plugin-defined type
    Custom(serde_json::Value),
}

impl Payload {
    /// The built-in type this payload belongs to; `None` for custom payloads.
    pub fn builtin_type(&self) -> Option<AnnotationType> {
        Some(match self {
            Payload::BoundingBox(_) => AnnotationType::BoundingBox,
            Payload::Polygon(_) => AnnotationType::Polygon,
            Payload::Polyline(_) => AnnotationType::Polyline,
            Payload::Skeleton(_) => AnnotationType::Skeleton,
            Payload::Tag => AnnotationType::Tag,
            Payload::Table(_) => AnnotationType::Table,
            Payload::DirectionalVector(_) => AnnotationType::DirectionalVector,
            Payload::Mask(_) => AnnotationType::Mask,
            Payload::RasterLayer(_) => AnnotationType::RasterLayer,
            Payload::Custom(_) => return None,
        })
    }

    /// Short name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Payload::BoundingBox(_) => "bounding_box",
            Payload::Polygon(_) => "polygon",
            Payload::Polyline(_) => "polyline",
            Payload::Skeleton(_) => "skeleton",
            Payload::Tag => "tag",
            Payload::Table(_) => "table",
            Payload::DirectionalVector(_) => "directional_vector",
            Payload::Mask(_) => "mask",
            Payload::RasterLayer(_) => "raster_layer",
            Payload::Custom(_) => "custom",
        }
    }

    /// Whether this payload may be stored under `kind`.
    pub fn matches(&self, kind: &AnnotationType) -> bool {
        match self.builtin_type() {
            Some(own) => &own == kind,
            None => matches!(kind, AnnotationType::Other(_)),
        }
    }

    /// Vertices used for zooming and bounds.
    pub fn vertices(&self) -> Vec<ImagePoint> {
        match self {
            Payload::BoundingBox(b) => b.corners().to_vec(),
            Payload::Polygon(p) => p.sub_paths().flatten().copied().collect(),
            Payload::Polyline(p) => p.path.clone(),
            Payload::Skeleton(s) => s.nodes.iter().map(SkeletonNode::point).collect(),
            Payload::Table(t) => t.bounding_box.corners().to_vec(),
            Payload::Mask(m) => m.bounding_box.map(|b| b.corners().to_vec()).unwrap_or_default(),
            Payload::Tag
            | Payload::DirectionalVector(_)
            | Payload::RasterLayer(_)
            | Payload::Custom(_) => Vec::new(),
        }
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        BoundingBox::from_points(&self.vertices())
    }

    /// Geometric center, used for labels and sub-annotation anchors.
    pub fn centroid(&self) -> Option<ImagePoint> {
        match self {
            Payload::BoundingBox(b) => Some(b.center()),
            Payload::Polygon(p) => ring_centroid(&p.path),
            Payload::Polyline(p) => mean(&p.path),
            Payload::Skeleton(s) => {
                let points: Vec<ImagePoint> = s.nodes.iter().map(SkeletonNode::point).collect();
                mean(&points)
            }
            Payload::Table(t) => Some(t.bounding_box.center()),
            Payload::Mask(m) => m.bounding_box.map(|b| b.center()),
            Payload::Tag
            | Payload::DirectionalVector(_)
            | Payload::RasterLayer(_)
            | Payload::Custom(_) => None,
        }
    }

    /// Whether `p` lies on or inside the shape, with `tolerance` in image pixels
    /// for open shapes and points.
    pub fn hit_test(&self, p: &ImagePoint, tolerance: f64) -> bool {
        use annotate_geom::algebra::distance_to_segment;

        match self {
            Payload::BoundingBox(b) => b.contains(p),
            Payload::Polygon(path) => path.contains(p),
            Payload::Polyline(line) => line
                .path
                .windows(2)
                .any(|w| distance_to_segment(p, &w[0], &w[1]) <= tolerance),
            Payload::Skeleton(s) => s.nodes.iter().any(|n| n.point().distance(p) <= tolerance),
            Payload::Table(t) => t.bounding_box.contains(p),
            Payload::Mask(m) => m.bounding_box.is_some_and(|b| b.contains(p)),
            Payload::Tag
            | Payload::DirectionalVector(_)
            | Payload::RasterLayer(_)
            | Payload::Custom(_) => false,
        }
    }

    /// Move the shape by an image-space delta.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        match self {
            Payload::BoundingBox(b) => *b = b.translate(dx, dy),
            Payload::Polygon(p) => p.translate(dx, dy),
            Payload::Polyline(line) => {
                for p in &mut line.path {
                    p.x += dx;
                    p.y += dy;
                }
            }
            Payload::Skeleton(s) => {
                for n in &mut s.nodes {
                    n.x += dx;
                    n.y += dy;
                }
            }
            Payload::Table(t) => {
                t.bounding_box = t.bounding_box.translate(dx, dy);
                for cell in &mut t.cells {
                    cell.bounding_box = cell.bounding_box.translate(dx, dy);
                }
            }
            // Mask pixels move through the raster, not the payload
            Payload::Mask(_)
            | Payload::Tag
            | Payload::DirectionalVector(_)
            | Payload::RasterLayer(_)
            | Payload::Custom(_) => {}
        }
    }

    /// Move vertex `index` (as numbered by [`Payload::vertices`]) to `to`.
    ///
    /// Box corners drag against the opposite corner. Returns `false` if the
    /// payload has no such vertex.
    pub fn move_vertex(&mut self, index: usize, to: ImagePoint) -> bool {
        fn drag_corner(b: &BoundingBox, index: usize, to: ImagePoint) -> Option<BoundingBox> {
            let corners = b.corners();
            corners.get(index)?;
            Some(BoundingBox::from_corners(corners[(index + 2) % 4], to))
        }

        match self {
            Payload::BoundingBox(b) => match drag_corner(b, index, to) {
                Some(moved) => {
                    *b = moved;
                    true
                }
                None => false,
            },
            Payload::Table(t) => match drag_corner(&t.bounding_box, index, to) {
                Some(moved) => {
                    t.bounding_box = moved;
                    true
                }
                None => false,
            },
            Payload::Polygon(path) => match path.sub_paths_mut().flatten().nth(index) {
                Some(p) => {
                    *p = to;
                    true
                }
                None => false,
            },
            Payload::Polyline(line) => match line.path.get_mut(index) {
                Some(p) => {
                    *p = to;
                    true
                }
                None => false,
            },
            Payload::Skeleton(s) => match s.nodes.get_mut(index) {
                Some(n) => {
                    n.x = to.x;
                    n.y = to.y;
                    true
                }
                None => false,
            },
            Payload::Mask(_)
            | Payload::Tag
            | Payload::DirectionalVector(_)
            | Payload::RasterLayer(_)
            | Payload::Custom(_) => false,
        }
    }
}
