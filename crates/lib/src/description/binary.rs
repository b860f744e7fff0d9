use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use crate::args::{Attributes, ConstructorArg, HasDeclaredDeps, ValidationError};
use crate::filesystem::ProjectFilesystem;
use crate::rule::{BuildRule, BuildRuleError, BuildRuleParams};
use crate::rulekey::{AddsToRuleKey, KeyField, KeyValue};
use crate::source_path::SourcePath;
use crate::target::BuildTarget;
use crate::tool::{CommandTool, DefaultSourcePathResolver, SourcePathResolver, Tool};

use super::types::{BuildRuleCreationContext, Description};

const ATTRIBUTES: &[&str] = &["command", "deps", "inputs", "environment", "executable"];

/// Validated argument of a `binary` target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryArg {
  command: Vec<String>,
  deps: BTreeSet<BuildTarget>,
  inputs: BTreeSet<SourcePath>,
  environment: BTreeMap<String, String>,
  executable: Option<SourcePath>,
}

impl BinaryArg {
  /// Start building the argument for `target`; errors name that target.
  pub fn builder(target: &BuildTarget) -> BinaryArgBuilder {
    BinaryArgBuilder {
      target: target.clone(),
      command: None,
      deps: BTreeSet::new(),
      inputs: BTreeSet::new(),
      environment: BTreeMap::new(),
      executable: None,
    }
  }

  pub fn command(&self) -> &[String] {
    &self.command
  }

  pub fn inputs(&self) -> &BTreeSet<SourcePath> {
    &self.inputs
  }

  pub fn environment(&self) -> &BTreeMap<String, String> {
    &self.environment
  }

  pub fn executable(&self) -> Option<&SourcePath> {
    self.executable.as_ref()
  }
}

impl HasDeclaredDeps for BinaryArg {
  fn declared_deps(&self) -> &BTreeSet<BuildTarget> {
    &self.deps
  }
}

impl ConstructorArg for BinaryArg {
  fn parse_deps(&self) -> BTreeSet<BuildTarget> {
    self
      .deps
      .iter()
      .chain(self.inputs.iter().filter_map(SourcePath::build_target))
      .chain(self.executable.iter().filter_map(SourcePath::build_target))
      .cloned()
      .collect()
  }

  fn as_any(&self) -> &dyn Any {
    self
  }
}

#[derive(Debug, Clone)]
pub struct BinaryArgBuilder {
  target: BuildTarget,
  command: Option<Vec<String>>,
  deps: BTreeSet<BuildTarget>,
  inputs: BTreeSet<SourcePath>,
  environment: BTreeMap<String, String>,
  executable: Option<SourcePath>,
}

impl BinaryArgBuilder {
  pub fn command<S: Into<String>>(mut self, command: impl IntoIterator<Item = S>) -> Self {
    self.command = Some(command.into_iter().map(Into::into).collect());
    self
  }

  pub fn dep(mut self, dep: BuildTarget) -> Self {
    self.deps.insert(dep);
    self
  }

  pub fn deps(mut self, deps: impl IntoIterator<Item = BuildTarget>) -> Self {
    self.deps.extend(deps);
    self
  }

  pub fn input(mut self, input: SourcePath) -> Self {
    self.inputs.insert(input);
    self
  }

  pub fn inputs(mut self, inputs: impl IntoIterator<Item = SourcePath>) -> Self {
    self.inputs.extend(inputs);
    self
  }

  pub fn env(mut self, key: &str, value: &str) -> Self {
    self.environment.insert(key.to_string(), value.to_string());
    self
  }

  pub fn environment(mut self, environment: BTreeMap<String, String>) -> Self {
    self.environment.extend(environment);
    self
  }

  pub fn executable(mut self, executable: SourcePath) -> Self {
    self.executable = Some(executable);
    self
  }

  pub fn build(self) -> Result<BinaryArg, ValidationError> {
    let command = self
      .command
      .ok_or_else(|| ValidationError::missing(&self.target, "command"))?;
    if command.is_empty() {
      return Err(ValidationError::new(&self.target, "command", "must not be empty"));
    }
    if let Some(name) = self.environment.keys().find(|k| k.is_empty() || k.contains('=')) {
      return Err(ValidationError::new(
        &self.target,
        "environment",
        format!("invalid variable name '{name}'"),
      ));
    }
    if self.deps.contains(&self.target) {
      return Err(ValidationError::new(&self.target, "deps", "a target cannot depend on itself"));
    }

    Ok(BinaryArg {
      command,
      deps: self.deps,
      inputs: self.inputs,
      environment: self.environment,
      executable: self.executable,
    })
  }
}

/// Runs a fixed command.
///
/// ```json
/// { "target": "//app:hello", "kind": "binary", "command": ["echo", "hi"],
///   "deps": ["//lib:greeting"], "inputs": ["app/hello.txt"],
///   "environment": { "LANG": "C" } }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryDescription;

impl Description for BinaryDescription {
  type Arg = BinaryArg;

  fn kind(&self) -> &'static str {
    "binary"
  }

  fn parse_arg(
    &self,
    target: &BuildTarget,
    attributes: &serde_json::Map<String, serde_json::Value>,
  ) -> Result<BinaryArg, ValidationError> {
    let attrs = Attributes::new(target, attributes);
    attrs.deny_unknown(ATTRIBUTES)?;

    let mut builder = BinaryArg::builder(target)
      .deps(attrs.or_default::<BTreeSet<BuildTarget>>("deps")?)
      .inputs(attrs.or_default::<BTreeSet<SourcePath>>("inputs")?)
      .environment(attrs.or_default("environment")?);
    if let Some(command) = attrs.optional::<Vec<String>>("command")? {
      builder = builder.command(command);
    }
    if let Some(executable) = attrs.optional("executable")? {
      builder = builder.executable(executable);
    }
    builder.build()
  }

  fn create_build_rule(
    &self,
    ctx: &BuildRuleCreationContext<'_>,
    target: &BuildTarget,
    filesystem: Arc<ProjectFilesystem>,
    params: BuildRuleParams,
    arg: &BinaryArg,
  ) -> Result<Arc<dyn BuildRule>, BuildRuleError> {
    let mut tool = CommandTool::builder()
      .command(arg.command.iter().cloned())
      .environment(arg.environment.clone())
      .inputs(arg.inputs.iter().cloned())
      .deps_inputs(arg.deps.iter().cloned().map(SourcePath::BuildTarget));
    if let Some(executable) = &arg.executable {
      let resolver = DefaultSourcePathResolver::new(ctx.rule_resolver, &filesystem);
      resolver
        .absolute_path(executable)
        .map_err(|source| BuildRuleError::ToolResolution {
          target: target.clone(),
          field: "executable".to_string(),
          source,
        })?;
      tool = tool.executable(executable.clone());
    }
    let tool = tool.build();

    let extra = ctx.rule_resolver.get_all_rules(target, &tool.deps())?;
    let build_deps = params.with_extra_deps(extra).build_deps();

    Ok(Arc::new(BinaryRule {
      target: target.clone(),
      filesystem,
      tool,
      build_deps,
    }))
  }
}

/// A constructed `binary` rule.
#[derive(Debug)]
pub struct BinaryRule {
  target: BuildTarget,
  filesystem: Arc<ProjectFilesystem>,
  tool: CommandTool,
  build_deps: Vec<Arc<dyn BuildRule>>,
}

impl BinaryRule {
  pub fn command_tool(&self) -> &CommandTool {
    &self.tool
  }
}

impl AddsToRuleKey for BinaryRule {
  fn key_fields(&self) -> Vec<KeyField> {
    vec![KeyField::new("tool", KeyValue::nested(&self.tool))]
  }
}

impl BuildRule for BinaryRule {
  fn kind(&self) -> &str {
    "binary"
  }

  fn build_target(&self) -> &BuildTarget {
    &self.target
  }

  fn filesystem(&self) -> &Arc<ProjectFilesystem> {
    &self.filesystem
  }

  fn build_deps(&self) -> &[Arc<dyn BuildRule>] {
    &self.build_deps
  }

  fn output_path(&self) -> Option<PathBuf> {
    let mut path = self.filesystem.output_dir();
    if !self.target.base_path().is_empty() {
      path.push(self.target.base_path());
    }
    path.push(self.target.short_name());
    Some(path)
  }

  fn tool(&self) -> Option<&dyn Tool> {
    Some(&self.tool)
  }
}
