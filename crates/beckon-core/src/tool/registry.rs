//! ToolRegistry - immutable process-wide tool catalog
//!
//! The registry is populated once at startup and never mutated afterwards,
//! so readers share it through a plain `Arc` with no locking.

use std::collections::HashMap;
use std::sync::Arc;

use crate::types::ExecutionTarget;

use super::{Tool, ToolSpec};

/// A skill groups related tools and contributes prompt material to the
/// planner: a one-line description for the catalog and skill-specific
/// planning rules.
#[derive(Debug, Clone)]
pub struct SkillManifest {
    /// Short identifier, e.g. "calendar"
    pub name: String,
    /// Human-readable name, e.g. "Calendar"
    pub display_name: String,
    /// One-liner for the system prompt
    pub description: String,
    /// Skill-specific rules appended to the planner's rule list
    pub planner_instructions: Vec<String>,
}

impl SkillManifest {
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            description: description.into(),
            planner_instructions: Vec::new(),
        }
    }

    /// Append planner rules for this skill.
    pub fn with_instructions(mut self, instructions: Vec<String>) -> Self {
        self.planner_instructions = instructions;
        self
    }
}

/// Catalog of invocable tools, keyed by qualified name.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    skills: Vec<SkillManifest>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            skills: Vec::new(),
        }
    }

    /// Register a tool under its spec name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Register a skill manifest.
    pub fn register_skill(&mut self, manifest: SkillManifest) {
        self.skills.push(manifest);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Check whether a tool name exists in the catalog.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tool specs, sorted by name for stable prompt assembly.
    pub fn specs(&self) -> Vec<&ToolSpec> {
        let mut specs: Vec<&ToolSpec> = self.tools.values().map(|t| t.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Specs filtered to one execution target, sorted by name.
    pub fn specs_for_target(&self, target: ExecutionTarget) -> Vec<&ToolSpec> {
        self.specs()
            .into_iter()
            .filter(|s| s.execution_target == target)
            .collect()
    }

    /// Registered skill manifests, in registration order.
    pub fn skills(&self) -> &[SkillManifest] {
        &self.skills
    }

    /// All registered tool names.
    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
