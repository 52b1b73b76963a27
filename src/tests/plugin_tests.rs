//! Installing and removing plugins through the editor.

use std::cell::Cell;
use std::rc::Rc;

use annotate_geom::Size;
use serde_json::Value;

use super::{editor, item};
use crate::error::{EngineError, Result};
use crate::model::AnnotationType;
use crate::plugin::{Owner, Plugin, PluginRegistry};
use crate::serializer::OpaqueSerializer;
use crate::tool::{Cursor, Tool, ToolContext};

/// Counts `counter.add` commands while active.
#[derive(Debug)]
struct CounterTool {
    count: Rc<Cell<u32>>,
}

impl Tool for CounterTool {
    fn name(&self) -> &str {
        "counter_tool"
    }

    fn activate(&mut self, cx: &mut ToolContext<'_>) -> Result<()> {
        cx.registry.register_command(&Owner::tool(self.name()), "counter.add")?;
        Ok(())
    }

    fn reset(&mut self, _cx: &mut ToolContext<'_>) {}

    fn on_command(&mut self, _cx: &mut ToolContext<'_>, name: &str, _payload: &Value) -> Result<bool> {
        if name != "counter.add" {
            return Ok(false);
        }
        self.count.set(self.count.get() + 1);
        Ok(true)
    }

    fn cursor(&self) -> Cursor {
        Cursor::Named("counter.add".to_string())
    }
}

#[derive(Debug, Default)]
struct CounterPlugin {
    count: Rc<Cell<u32>>,
}

impl Plugin for CounterPlugin {
    fn name(&self) -> &str {
        "counter"
    }

    fn activate(&mut self, registry: &mut PluginRegistry) -> Result<()> {
        let owner = Owner::plugin(self.name());
        registry.register_serializer(&owner, Box::new(OpaqueSerializer::new("counter")))?;
        registry.register_command(&owner, "counter.reset")?;
        registry.register_cursor(&owner, "counter.add", "copy");
        Ok(())
    }

    fn create_tools(&self) -> Vec<Box<dyn Tool>> {
        vec![Box::new(CounterTool {
            count: self.count.clone(),
        })]
    }
}

/// Registers one command, then fails.
#[derive(Debug)]
struct BrokenPlugin;

impl Plugin for BrokenPlugin {
    fn name(&self) -> &str {
        "broken"
    }

    fn activate(&mut self, registry: &mut PluginRegistry) -> Result<()> {
        registry.register_command(&Owner::plugin("broken"), "broken.go")?;
        Err(EngineError::ResourceNotInitialized("broken backend"))
    }
}

/// Claims a command name another plugin owns.
#[derive(Debug)]
struct ClashingPlugin;

impl Plugin for ClashingPlugin {
    fn name(&self) -> &str {
        "clash"
    }

    fn activate(&mut self, registry: &mut PluginRegistry) -> Result<()> {
        let owner = Owner::plugin("clash");
        registry.register_cursor(&owner, "clash.busy", "wait");
        registry.register_command(&owner, "counter.reset")?;
        Ok(())
    }
}

/// Places keypoints; shares its name with the plugin that supplies it.
#[derive(Debug)]
struct KeypointTool;

impl Tool for KeypointTool {
    fn name(&self) -> &str {
        "keypoint"
    }

    fn activate(&mut self, cx: &mut ToolContext<'_>) -> Result<()> {
        cx.registry.register_command(&Owner::tool(self.name()), "keypoint.place")?;
        Ok(())
    }

    fn reset(&mut self, _cx: &mut ToolContext<'_>) {}
}

#[derive(Debug)]
struct KeypointPlugin;

impl Plugin for KeypointPlugin {
    fn name(&self) -> &str {
        "keypoint"
    }

    fn activate(&mut self, registry: &mut PluginRegistry) -> Result<()> {
        let owner = Owner::plugin(self.name());
        registry.register_serializer(&owner, Box::new(OpaqueSerializer::new("keypoint")))?;
        registry.register_command(&owner, "keypoint.clear")?;
        Ok(())
    }

    fn create_tools(&self) -> Vec<Box<dyn Tool>> {
        vec![Box::new(KeypointTool)]
    }
}

#[test]
fn test_install_and_uninstall_release_everything() {
    let (mut editor, _backend) = editor();
    let plugin = CounterPlugin::default();
    let count = plugin.count.clone();
    editor.install_plugin(Box::new(plugin)).unwrap();

    assert_eq!(editor.plugin_names(), vec!["core", "counter"]);
    assert_eq!(editor.registry().registration_count(&Owner::plugin("counter")), 3);
    assert!(editor.registry().serializers().contains(&AnnotationType::parse("counter")));
    assert!(editor.active_view().unwrap().tools.has_tool("counter_tool"));

    editor.activate_tool("counter_tool").unwrap();
    assert_eq!(editor.cursor(), "copy");
    assert!(editor.command("counter.add", &Value::Null).unwrap());
    assert_eq!(count.get(), 1);
    // Plugin-level commands have no active tool to reach
    assert!(!editor.command("counter.reset", &Value::Null).unwrap());

    assert!(editor.uninstall_plugin("counter"));
    assert_eq!(editor.registry().registration_count(&Owner::plugin("counter")), 0);
    assert_eq!(editor.registry().registration_count(&Owner::tool("counter_tool")), 0);
    assert!(!editor.registry().serializers().contains(&AnnotationType::parse("counter")));
    assert_eq!(editor.active_tool_name(), None);
    assert!(!editor.active_view().unwrap().tools.has_tool("counter_tool"));
    assert!(matches!(
        editor.command("counter.add", &Value::Null),
        Err(EngineError::UnknownCommand(_))
    ));
    assert!(!editor.uninstall_plugin("counter"));
}

#[test]
fn test_failed_install_releases_partial_registrations() {
    let (mut editor, _backend) = editor();
    assert!(editor.install_plugin(Box::new(BrokenPlugin)).is_err());
    assert_eq!(editor.registry().registration_count(&Owner::plugin("broken")), 0);
    assert_eq!(editor.registry().command_owner("broken.go"), None);
    assert_eq!(editor.plugin_names(), vec!["core"]);
}

#[test]
fn test_clashing_command_fails_install() {
    let (mut editor, _backend) = editor();
    editor.install_plugin(Box::new(CounterPlugin::default())).unwrap();
    assert!(matches!(
        editor.install_plugin(Box::new(ClashingPlugin)),
        Err(EngineError::DuplicateCommand(_))
    ));
    assert_eq!(editor.registry().registration_count(&Owner::plugin("clash")), 0);
    assert_eq!(
        editor.registry().command_owner("counter.reset"),
        Some(&Owner::plugin("counter"))
    );
}

#[test]
fn test_later_views_get_plugin_tools() {
    let (mut editor, _backend) = editor();
    editor.install_plugin(Box::new(CounterPlugin::default())).unwrap();
    // Installing twice is ignored
    editor.install_plugin(Box::new(CounterPlugin::default())).unwrap();
    assert_eq!(editor.registry().registration_count(&Owner::plugin("counter")), 3);

    let view = editor.add_view(item().with_stage("qa"), Size::new(50.0, 50.0));
    let tools = editor.view(view).unwrap().tools.names();
    assert!(tools.contains(&"counter_tool"));
    assert!(tools.contains(&"polygon"));
}

#[test]
fn test_tool_switch_keeps_registrations_of_same_named_plugin() {
    let (mut editor, _backend) = editor();
    editor.install_plugin(Box::new(KeypointPlugin)).unwrap();
    let keypoint = AnnotationType::parse("keypoint");

    editor.activate_tool("keypoint").unwrap();
    assert_eq!(
        editor.registry().command_owner("keypoint.place"),
        Some(&Owner::tool("keypoint"))
    );
    editor.activate_tool("select").unwrap();

    assert!(editor.registry().serializers().contains(&keypoint));
    assert_eq!(
        editor.registry().command_owner("keypoint.clear"),
        Some(&Owner::plugin("keypoint"))
    );
    assert_eq!(editor.registry().command_owner("keypoint.place"), None);
    assert_eq!(editor.registry().registration_count(&Owner::plugin("keypoint")), 2);

    assert!(editor.uninstall_plugin("keypoint"));
    assert!(!editor.registry().serializers().contains(&keypoint));
}
