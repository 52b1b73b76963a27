//! The label buffer itself.

use std::collections::{BTreeMap, HashMap};

use annotate_geom::BoundingBox;
use serde::{Deserialize, Serialize};

use crate::model::{AnnotationId, RasterLayerData};
use crate::raster::RasterError;
use crate::raster::rle;

/// Label value of pixels that belong to no annotation.
pub const EMPTY_LABEL: u8 = 0;

/// Number of usable labels (1..=255).
pub const MAX_LABELS: usize = 255;

/// Identifier of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RasterId(pub u64);

/// Inclusive pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRegion {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl PixelRegion {
    pub fn new(x_min: u32, y_min: u32, x_max: u32, y_max: u32) -> Self {
        Self {
            x_min: x_min.min(x_max),
            y_min: y_min.min(y_max),
            x_max: x_max.max(x_min),
            y_max: y_max.max(y_min),
        }
    }

    pub fn single(x: u32, y: u32) -> Self {
        Self::new(x, y, x, y)
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }

    pub fn width(&self) -> u32 {
        self.x_max - self.x_min + 1
    }

    pub fn height(&self) -> u32 {
        self.y_max - self.y_min + 1
    }

    pub fn area(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// Pixels covered by an image-space box, clipped to a `width` x `height` raster.
    pub fn from_bounding_box(bounds: &BoundingBox, width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let max_x = f64::from(width - 1);
        let max_y = f64::from(height - 1);
        let x0 = bounds.x.floor();
        let y0 = bounds.y.floor();
        let x1 = (bounds.x + bounds.w).ceil() - 1.0;
        let y1 = (bounds.y + bounds.h).ceil() - 1.0;
        if x1 < 0.0 || y1 < 0.0 || x0 > max_x || y0 > max_y || x1 < x0 || y1 < y0 {
            return None;
        }
        Some(Self::new(
            x0.clamp(0.0, max_x) as u32,
            y0.clamp(0.0, max_y) as u32,
            x1.clamp(0.0, max_x) as u32,
            y1.clamp(0.0, max_y) as u32,
        ))
    }

    /// The region as an image-space box covering whole pixels.
    pub fn to_bounding_box(&self) -> BoundingBox {
        BoundingBox::new(
            f64::from(self.x_min),
            f64::from(self.y_min),
            f64::from(self.width()),
            f64::from(self.height()),
        )
    }
}

/// A copy of the pixels inside a region, used to restore raster state on undo.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterPatch {
    pub region: PixelRegion,
    pub pixels: Vec<u8>,
}

/// Dense per-pixel label buffer for one file.
#[derive(Debug, Clone)]
pub struct Raster {
    id: RasterId,
    file_id: String,
    width: u32,
    height: u32,
    buffer: Vec<u8>,
    label_to_annotation: BTreeMap<u8, AnnotationId>,
    annotation_to_label: HashMap<AnnotationId, u8>,
    invalidated: Option<PixelRegion>,
}

impl Raster {
    pub fn new(id: RasterId, file_id: &str, width: u32, height: u32) -> Self {
        Self {
            id,
            file_id: file_id.to_string(),
            width,
            height,
            buffer: vec![EMPTY_LABEL; width as usize * height as usize],
            label_to_annotation: BTreeMap::new(),
            annotation_to_label: HashMap::new(),
            invalidated: None,
        }
    }

    pub fn id(&self) -> RasterId {
        self.id
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn full_region(&self) -> Option<PixelRegion> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        Some(PixelRegion::new(0, 0, self.width - 1, self.height - 1))
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn in_bounds(&self, region: &PixelRegion) -> bool {
        region.x_max < self.width && region.y_max < self.height
    }

    pub fn label_at(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.buffer[self.index(x, y)])
    }

    /// Write one pixel. Returns the previous label if the pixel changed.
    pub fn set_label_at(&mut self, x: u32, y: u32, label: u8) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.index(x, y);
        let previous = self.buffer[i];
        if previous == label {
            return None;
        }
        self.buffer[i] = label;
        self.invalidate(PixelRegion::single(x, y));
        Some(previous)
    }

    // ========================================================================
    // Label ↔ annotation mapping
    // ========================================================================

    /// Lowest label not bound to any annotation.
    pub fn next_available_label(&self) -> Result<u8, RasterError> {
        (1..=u8::MAX)
            .find(|label| !self.label_to_annotation.contains_key(label))
            .ok_or(RasterError::LabelsExhausted(MAX_LABELS))
    }

    /// Bind `label` to `annotation`, replacing any previous binding of either.
    pub fn bind_label(&mut self, label: u8, annotation: AnnotationId) {
        if let Some(old_annotation) = self.label_to_annotation.insert(label, annotation) {
            self.annotation_to_label.remove(&old_annotation);
        }
        if let Some(old_label) = self.annotation_to_label.insert(annotation, label) {
            if old_label != label {
                self.label_to_annotation.remove(&old_label);
            }
        }
    }

    /// Drop the binding of `annotation`, returning the label it had.
    pub fn unbind_annotation(&mut self, annotation: AnnotationId) -> Option<u8> {
        let label = self.annotation_to_label.remove(&annotation)?;
        self.label_to_annotation.remove(&label);
        Some(label)
    }

    pub fn label_for(&self, annotation: AnnotationId) -> Option<u8> {
        self.annotation_to_label.get(&annotation).copied()
    }

    pub fn annotation_for(&self, label: u8) -> Option<AnnotationId> {
        self.label_to_annotation.get(&label).copied()
    }

    /// Bound labels in ascending order.
    pub fn labels_on_raster(&self) -> impl Iterator<Item = (u8, AnnotationId)> + '_ {
        self.label_to_annotation.iter().map(|(l, a)| (*l, *a))
    }

    pub fn label_bindings(&self) -> Vec<(u8, AnnotationId)> {
        self.labels_on_raster().collect()
    }

    /// Replace the whole label mapping.
    pub fn set_label_bindings(&mut self, bindings: &[(u8, AnnotationId)]) {
        self.label_to_annotation.clear();
        self.annotation_to_label.clear();
        for (label, annotation) in bindings {
            self.bind_label(*label, *annotation);
        }
    }

    // ========================================================================
    // Invalidation
    // ========================================================================

    /// Record that pixels in `region` changed and must be redrawn.
    pub fn invalidate(&mut self, region: PixelRegion) {
        self.invalidated = Some(match self.invalidated {
            Some(existing) => existing.union(&region),
            None => region,
        });
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated.is_some()
    }

    pub fn invalidated_region(&self) -> Option<PixelRegion> {
        self.invalidated
    }

    pub fn clear_invalidation(&mut self) {
        self.invalidated = None;
    }

    // ========================================================================
    // Region access
    // ========================================================================

    pub fn read_patch(&self, region: PixelRegion) -> Result<RasterPatch, RasterError> {
        if !self.in_bounds(&region) {
            return Err(RasterError::OutOfBounds(format!("{region:?}")));
        }
        let mut pixels = Vec::with_capacity(region.area());
        for y in region.y_min..=region.y_max {
            let start = self.index(region.x_min, y);
            pixels.extend_from_slice(&self.buffer[start..start + region.width() as usize]);
        }
        Ok(RasterPatch { region, pixels })
    }

    pub fn write_patch(&mut self, patch: &RasterPatch) -> Result<(), RasterError> {
        let region = patch.region;
        if !self.in_bounds(&region) || patch.pixels.len() != region.area() {
            return Err(RasterError::OutOfBounds(format!("{region:?}")));
        }
        let row = region.width() as usize;
        for (i, y) in (region.y_min..=region.y_max).enumerate() {
            let start = self.index(region.x_min, y);
            self.buffer[start..start + row].copy_from_slice(&patch.pixels[i * row..(i + 1) * row]);
        }
        self.invalidate(region);
        Ok(())
    }

    /// Reset every pixel holding `label` to empty, optionally only inside `within`.
    /// Returns the number of cleared pixels.
    pub fn clear_label(&mut self, label: u8, within: Option<PixelRegion>) -> usize {
        let Some(region) = within.or_else(|| self.full_region()) else {
            return 0;
        };
        let region = PixelRegion::new(
            region.x_min,
            region.y_min,
            region.x_max.min(self.width.saturating_sub(1)),
            region.y_max.min(self.height.saturating_sub(1)),
        );
        let mut cleared = 0;
        for y in region.y_min..=region.y_max {
            for x in region.x_min..=region.x_max {
                let i = self.index(x, y);
                if self.buffer[i] == label {
                    self.buffer[i] = EMPTY_LABEL;
                    cleared += 1;
                }
            }
        }
        if cleared > 0 {
            self.invalidate(region);
        }
        cleared
    }

    pub fn count_label(&self, label: u8) -> usize {
        self.buffer.iter().filter(|&&l| l == label).count()
    }

    /// Tight pixel bounds of `label`, or `None` if no pixel has it.
    pub fn label_bounds(&self, label: u8) -> Option<PixelRegion> {
        let mut bounds: Option<PixelRegion> = None;
        for (i, &l) in self.buffer.iter().enumerate() {
            if l != label {
                continue;
            }
            let x = (i % self.width as usize) as u32;
            let y = (i / self.width as usize) as u32;
            let p = PixelRegion::single(x, y);
            bounds = Some(bounds.map_or(p, |b| b.union(&p)));
        }
        bounds
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Encode the whole raster for storage.
    pub fn to_layer_data(&self) -> RasterLayerData {
        RasterLayerData {
            dense_rle: rle::encode(&self.buffer),
            mask_annotation_ids_mapping: self
                .annotation_to_label
                .iter()
                .map(|(a, l)| (*a, *l))
                .collect(),
            total_pixels: self.buffer.len() as u64,
            width: self.width,
            height: self.height,
        }
    }

    /// Replace buffer and label mapping with persisted data.
    pub fn load_layer_data(&mut self, data: &RasterLayerData) -> Result<(), RasterError> {
        if data.width != self.width || data.height != self.height {
            return Err(RasterError::InvalidData(format!(
                "layer is {}x{}, raster is {}x{}",
                data.width, data.height, self.width, self.height
            )));
        }
        let buffer = rle::decode(&data.dense_rle, self.buffer.len())?;
        self.buffer = buffer;
        self.label_to_annotation.clear();
        self.annotation_to_label.clear();
        for (annotation, label) in &data.mask_annotation_ids_mapping {
            self.bind_label(*label, *annotation);
        }
        if let Some(full) = self.full_region() {
            self.invalidate(full);
        }
        Ok(())
    }
}
