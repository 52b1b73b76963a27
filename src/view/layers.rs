//! Ordered drawable layers with dirty tracking.
//!
//! Mutations only flag a layer; the host repaints flagged layers once per
//! frame, so a burst of edits costs a single repaint.

/// Drawable layers of a view, bottom to top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// The media frame
    Image,
    /// Raster masks
    Masks,
    /// Vector annotations
    Annotations,
    /// Comment thread markers
    Comments,
    /// In-progress tool drawing
    Overlay,
}

impl LayerKind {
    pub fn all() -> &'static [LayerKind] {
        &[
            LayerKind::Image,
            LayerKind::Masks,
            LayerKind::Annotations,
            LayerKind::Comments,
            LayerKind::Overlay,
        ]
    }
}

#[derive(Debug, Clone)]
struct Layer {
    kind: LayerKind,
    visible: bool,
    dirty: bool,
}

/// The ordered layers of one view.
#[derive(Debug, Clone)]
pub struct LayerStack {
    layers: Vec<Layer>,
}

impl LayerStack {
    /// All layers in default order, visible and dirty.
    pub fn new() -> Self {
        Self {
            layers: LayerKind::all()
                .iter()
                .map(|kind| Layer {
                    kind: *kind,
                    visible: true,
                    dirty: true,
                })
                .collect(),
        }
    }

    fn layer_mut(&mut self, kind: LayerKind) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.kind == kind)
    }

    /// Layer kinds bottom to top.
    pub fn order(&self) -> impl Iterator<Item = LayerKind> + '_ {
        self.layers.iter().map(|l| l.kind)
    }

    pub fn mark_dirty(&mut self, kind: LayerKind) {
        if let Some(layer) = self.layer_mut(kind) {
            layer.dirty = true;
        }
    }

    pub fn mark_all_dirty(&mut self) {
        for layer in &mut self.layers {
            layer.dirty = true;
        }
    }

    pub fn is_dirty(&self, kind: LayerKind) -> bool {
        self.layers.iter().any(|l| l.kind == kind && l.dirty)
    }

    pub fn is_visible(&self, kind: LayerKind) -> bool {
        self.layers.iter().any(|l| l.kind == kind && l.visible)
    }

    pub fn set_visible(&mut self, kind: LayerKind, visible: bool) {
        if let Some(layer) = self.layer_mut(kind) {
            if layer.visible != visible {
                layer.visible = visible;
                layer.dirty = true;
            }
        }
    }

    /// Dirty layers bottom to top, clearing their flags.
    ///
    /// Hidden layers are returned too so the host can clear them.
    pub fn take_dirty(&mut self) -> Vec<LayerKind> {
        self.layers
            .iter_mut()
            .filter(|l| l.dirty)
            .map(|l| {
                l.dirty = false;
                l.kind
            })
            .collect()
    }
}

impl Default for LayerStack {
    fn default() -> Self {
        Self::new()
    }
}
