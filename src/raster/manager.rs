//! Owner of a view's rasters.

use std::collections::HashMap;

use crate::raster::{Raster, RasterError, RasterId};

/// Sole owner and mutator of the rasters of one view, keyed by file.
#[derive(Debug, Default)]
pub struct RasterManager {
    rasters: HashMap<RasterId, Raster>,
    by_file: HashMap<String, RasterId>,
    next_id: u64,
}

impl RasterManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the raster of `file_id`. At most one raster exists per file.
    pub fn create_raster(
        &mut self,
        file_id: &str,
        width: u32,
        height: u32,
    ) -> Result<RasterId, RasterError> {
        if self.by_file.contains_key(file_id) {
            return Err(RasterError::DuplicateRaster(file_id.to_string()));
        }
        self.next_id += 1;
        let id = RasterId(self.next_id);
        self.rasters.insert(id, Raster::new(id, file_id, width, height));
        self.by_file.insert(file_id.to_string(), id);
        log::debug!("Created {}x{} raster {:?} for file '{}'", width, height, id, file_id);
        Ok(id)
    }

    pub fn raster(&self, id: RasterId) -> Option<&Raster> {
        self.rasters.get(&id)
    }

    pub fn raster_mut(&mut self, id: RasterId) -> Option<&mut Raster> {
        self.rasters.get_mut(&id)
    }

    pub fn try_raster_mut(&mut self, id: RasterId) -> Result<&mut Raster, RasterError> {
        self.rasters.get_mut(&id).ok_or(RasterError::UnknownRaster(id))
    }

    pub fn raster_for_file(&self, file_id: &str) -> Option<RasterId> {
        self.by_file.get(file_id).copied()
    }

    pub fn delete_raster(&mut self, id: RasterId) -> Option<Raster> {
        let raster = self.rasters.remove(&id)?;
        self.by_file.remove(raster.file_id());
        log::debug!("Deleted raster {:?}", id);
        Some(raster)
    }

    /// Keep only the rasters of files `keep` accepts. Returns how many were dropped.
    pub fn retain_files(&mut self, mut keep: impl FnMut(&str) -> bool) -> usize {
        let before = self.rasters.len();
        self.by_file.retain(|file_id, _| keep(file_id));
        let live: Vec<RasterId> = self.by_file.values().copied().collect();
        self.rasters.retain(|id, _| live.contains(id));
        before - self.rasters.len()
    }

    pub fn len(&self) -> usize {
        self.rasters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rasters.is_empty()
    }

    /// Rasters with pending redraw regions.
    pub fn invalidated(&self) -> impl Iterator<Item = &Raster> {
        self.rasters.values().filter(|r| r.is_invalidated())
    }

    pub fn clear_invalidation(&mut self) {
        for raster in self.rasters.values_mut() {
            raster.clear_invalidation();
        }
    }
}
