//! The rendering and interaction context of one media slot.
//!
//! A [`View`] owns everything scoped to its slot: camera, layers, the
//! annotation/comment/raster managers, the file list and the tool manager.
//! Managers only flag changes; [`View::sync_layers`] turns those flags into
//! dirty layers and [`View::repaint`] redraws just those.

mod files;
mod layers;
pub mod palette;
pub mod render;

use std::rc::Rc;

use annotate_geom::{Camera, Size};

pub use files::{FileManager, MediaFile, MediaKind};
pub use layers::{LayerKind, LayerStack};
pub use palette::Rgba;
pub use render::{DrawCommand, DrawSurface, LayerSurfaces, RecordingSurface, render_layer};

use crate::frames::FrameBitmap;
use crate::manager::{AnnotationManager, CommentManager};
use crate::persistence::{AnnotationBackend, ItemKey};
use crate::raster::RasterManager;
use crate::tool::ToolManager;

/// Identifier of a view slot inside the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub u32);

pub struct View {
    id: ViewId,
    pub camera: Camera,
    pub layers: LayerStack,
    pub annotations: AnnotationManager,
    pub comments: CommentManager,
    pub rasters: RasterManager,
    pub files: FileManager,
    pub tools: ToolManager,
}

impl View {
    pub fn new(id: ViewId, backend: Rc<dyn AnnotationBackend>, item: ItemKey, viewport: Size) -> Self {
        Self {
            id,
            camera: Camera::new(viewport, Size::default()),
            layers: LayerStack::new(),
            annotations: AnnotationManager::new(backend.clone(), item.clone()),
            comments: CommentManager::new(backend, item),
            rasters: RasterManager::new(),
            files: FileManager::new(),
            tools: ToolManager::new(),
        }
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    /// Replace the files of this slot and show the first one.
    ///
    /// Rasters of files that are still listed are kept.
    pub fn set_files(&mut self, files: Vec<MediaFile>) {
        let dropped = self
            .rasters
            .retain_files(|file_id| files.iter().any(|f| f.id == file_id));
        if dropped > 0 {
            log::debug!("View {} dropped {} rasters of removed files", self.id.0, dropped);
        }
        self.files.set_files(files);
        self.on_file_changed();
    }

    /// Show file `index`. Returns `false` if it doesn't exist or already is current.
    pub fn set_current_file(&mut self, index: usize) -> bool {
        if !self.files.set_current(index) {
            return false;
        }
        self.on_file_changed();
        true
    }

    fn on_file_changed(&mut self) {
        let (size, frames, is_video) = match self.files.current_file() {
            Some(file) => (
                Size::new(f64::from(file.width), f64::from(file.height)),
                file.frame_count(),
                file.is_video(),
            ),
            None => (Size::default(), 1, false),
        };
        self.camera.set_image_size(size);
        self.annotations.set_total_frames(frames);
        self.annotations.set_current_frame(0);
        self.comments.set_current_frame(is_video.then_some(0));
        self.layers.mark_all_dirty();
        log::debug!("View {} shows file {:?}", self.id.0, self.files.current_index());
    }

    pub fn current_frame(&self) -> u32 {
        self.annotations.current_frame()
    }

    /// Move to `frame`, clamped to the current file.
    pub fn set_current_frame(&mut self, frame: u32) {
        let frame = frame.min(self.annotations.total_frames().saturating_sub(1));
        if frame == self.current_frame() {
            return;
        }
        self.annotations.set_current_frame(frame);
        let is_video = self.files.current_file().is_some_and(MediaFile::is_video);
        self.comments.set_current_frame(is_video.then_some(frame));
        self.layers.mark_dirty(LayerKind::Image);
        self.layers.mark_dirty(LayerKind::Annotations);
        self.layers.mark_dirty(LayerKind::Comments);
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        self.camera.set_viewport(viewport);
        self.camera.reset();
        self.layers.mark_all_dirty();
    }

    /// Turn manager change flags into dirty layers.
    pub fn sync_layers(&mut self) {
        if self.annotations.take_dirty() {
            self.layers.mark_dirty(LayerKind::Annotations);
        }
        if self.comments.take_dirty() {
            self.layers.mark_dirty(LayerKind::Comments);
        }
        if self.rasters.invalidated().next().is_some() {
            self.layers.mark_dirty(LayerKind::Masks);
            self.rasters.clear_invalidation();
        }
    }

    /// Redraw dirty layers. Returns the layers that were touched.
    pub fn repaint(&mut self, frame: Option<&FrameBitmap>, surfaces: &mut dyn LayerSurfaces) -> Vec<LayerKind> {
        self.sync_layers();
        let dirty = self.layers.take_dirty();
        for kind in &dirty {
            let surface = surfaces.surface(*kind);
            surface.clear();
            if self.layers.is_visible(*kind) {
                render_layer(self, *kind, frame, surface);
            }
        }
        dirty
    }

    #[cfg(test)]
    pub(crate) fn for_tests(backend: Rc<dyn AnnotationBackend>) -> View {
        let mut view = View::new(
            ViewId(0),
            backend,
            ItemKey::new("test-item"),
            Size::new(100.0, 100.0),
        );
        view.camera.set_image_size(Size::new(100.0, 100.0));
        view
    }
}

impl std::fmt::Debug for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("id", &self.id)
            .field("camera", &self.camera)
            .field("annotations", &self.annotations.len())
            .field("file", &self.files.current_file().map(|f| &f.id))
            .field("tool", &self.tools.active_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Annotation, AnnotationData, AnnotationType, Payload};
    use crate::persistence::InMemoryBackend;
    use annotate_geom::BoundingBox;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Surfaces(HashMap<LayerKind, RecordingSurface>);

    impl LayerSurfaces for Surfaces {
        fn surface(&mut self, kind: LayerKind) -> &mut dyn DrawSurface {
            self.0.entry(kind).or_default()
        }
    }

    fn view() -> View {
        let mut view = View::for_tests(Rc::new(InMemoryBackend::new()));
        view.set_files(vec![MediaFile::video("clip.mp4", 100, 100, 10)]);
        view
    }

    #[test]
    fn test_only_dirty_layers_repaint() {
        let mut view = view();
        let mut surfaces = Surfaces::default();
        assert_eq!(view.repaint(None, &mut surfaces).len(), LayerKind::all().len());
        assert!(view.repaint(None, &mut surfaces).is_empty());

        let annotation = Annotation::new(
            AnnotationType::BoundingBox,
            AnnotationData::Image(Payload::BoundingBox(BoundingBox::new(0.0, 0.0, 5.0, 5.0))),
        );
        view.annotations.create_annotation(annotation).unwrap();
        assert_eq!(view.repaint(None, &mut surfaces), vec![LayerKind::Annotations]);
        assert!(surfaces.0[&LayerKind::Annotations].commands.len() > 1);
    }

    #[test]
    fn test_frame_change_is_clamped() {
        let mut view = view();
        view.set_current_frame(4);
        assert_eq!(view.current_frame(), 4);
        view.set_current_frame(99);
        assert_eq!(view.current_frame(), 9);
        assert!(view.layers.is_dirty(LayerKind::Image));
    }

    #[test]
    fn test_file_switch_keeps_rasters() {
        let mut view = View::for_tests(Rc::new(InMemoryBackend::new()));
        view.set_files(vec![
            MediaFile::image("a.png", 10, 10),
            MediaFile::image("b.png", 30, 20),
        ]);
        let raster = view.rasters.create_raster("a.png", 10, 10).unwrap();
        assert!(view.set_current_file(1));
        assert_eq!(view.camera.image_size(), Size::new(30.0, 20.0));
        assert!(view.set_current_file(0));
        assert_eq!(view.rasters.raster_for_file("a.png"), Some(raster));
    }

    #[test]
    fn test_removed_files_drop_their_rasters() {
        let mut view = View::for_tests(Rc::new(InMemoryBackend::new()));
        view.set_files(vec![
            MediaFile::image("a.png", 10, 10),
            MediaFile::image("b.png", 10, 10),
        ]);
        view.rasters.create_raster("a.png", 10, 10).unwrap();
        let kept = view.rasters.create_raster("b.png", 10, 10).unwrap();

        view.set_files(vec![
            MediaFile::image("b.png", 10, 10),
            MediaFile::image("c.png", 10, 10),
        ]);
        assert_eq!(view.rasters.raster_for_file("a.png"), None);
        assert_eq!(view.rasters.raster_for_file("b.png"), Some(kept));
        assert_eq!(view.rasters.len(), 1);
    }
}
