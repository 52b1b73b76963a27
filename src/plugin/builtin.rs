use crate::error::Result;
use crate::plugin::{Owner, Plugin, PluginRegistry};
use crate::serializer::builtin_serializers;
use crate::tool::{
    AutoAnnotateTool, BoundingBoxTool, BrushTool, MaskBrushTool, PolygonTool, SelectTool, Tool,
};

/// Serializers of the built-in annotation types and the built-in tools.
#[derive(Debug, Default)]
pub struct CorePlugin;

impl CorePlugin {
    pub const NAME: &'static str = "core";
}

impl Plugin for CorePlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn activate(&mut self, registry: &mut PluginRegistry) -> Result<()> {
        let owner = Owner::plugin(Self::NAME);
        for serializer in builtin_serializers() {
            registry.register_serializer(&owner, serializer)?;
        }
        Ok(())
    }

    fn create_tools(&self) -> Vec<Box<dyn Tool>> {
        vec![
            Box::new(SelectTool::new()),
            Box::new(BoundingBoxTool::new()),
            Box::new(PolygonTool::new()),
            Box::new(BrushTool::new()),
            Box::new(MaskBrushTool::new()),
            Box::new(AutoAnnotateTool::new()),
        ]
    }
}
