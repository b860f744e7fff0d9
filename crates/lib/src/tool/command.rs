use std::collections::{BTreeMap, BTreeSet};

use crate::rulekey::{AddsToRuleKey, KeyField, KeyValue};
use crate::source_path::SourcePath;

use super::{SourcePathError, SourcePathResolver, Tool};

/// A tool defined by a literal command line.
///
/// The optional `executable` is resolved at run time and placed in front of
/// `command`. `inputs` are files the command reads; `deps_inputs` only make
/// their rules dependencies of whoever embeds the tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandTool {
  executable: Option<SourcePath>,
  command: Vec<String>,
  environment: BTreeMap<String, String>,
  inputs: BTreeSet<SourcePath>,
  deps_inputs: Vec<SourcePath>,
}

impl CommandTool {
  pub fn builder() -> CommandToolBuilder {
    CommandToolBuilder::default()
  }

  pub fn executable(&self) -> Option<&SourcePath> {
    self.executable.as_ref()
  }

  pub fn command(&self) -> &[String] {
    &self.command
  }

  pub fn declared_environment(&self) -> &BTreeMap<String, String> {
    &self.environment
  }

  pub fn declared_inputs(&self) -> &BTreeSet<SourcePath> {
    &self.inputs
  }
}

impl AddsToRuleKey for CommandTool {
  fn key_fields(&self) -> Vec<KeyField> {
    vec![
      KeyField::new("executable", self.executable.clone()),
      KeyField::new("command", KeyValue::list(&self.command)),
      KeyField::new("environment", KeyValue::map(self.environment.clone())),
      KeyField::new("inputs", KeyValue::set(&self.inputs)),
      KeyField::new("deps_inputs", KeyValue::non_hashed(&self.deps_inputs)),
    ]
  }
}

impl Tool for CommandTool {
  fn command_prefix(&self, resolver: &dyn SourcePathResolver) -> Result<Vec<String>, SourcePathError> {
    let mut prefix = Vec::with_capacity(self.command.len() + 1);
    if let Some(executable) = &self.executable {
      let path = resolver.absolute_path(executable)?;
      prefix.push(path.to_string_lossy().into_owned());
    }
    prefix.extend(self.command.iter().cloned());
    Ok(prefix)
  }

  fn environment(&self, _resolver: &dyn SourcePathResolver) -> Result<BTreeMap<String, String>, SourcePathError> {
    Ok(self.environment.clone())
  }
}

#[derive(Debug, Default)]
pub struct CommandToolBuilder {
  tool: CommandTool,
}

impl CommandToolBuilder {
  pub fn executable(mut self, executable: SourcePath) -> Self {
    self.tool.executable = Some(executable);
    self
  }

  pub fn command<S: Into<String>>(mut self, command: impl IntoIterator<Item = S>) -> Self {
    self.tool.command = command.into_iter().map(Into::into).collect();
    self
  }

  pub fn env(mut self, key: &str, value: &str) -> Self {
    self.tool.environment.insert(key.to_string(), value.to_string());
    self
  }

  pub fn environment(mut self, environment: BTreeMap<String, String>) -> Self {
    self.tool.environment = environment;
    self
  }

  pub fn input(mut self, input: SourcePath) -> Self {
    self.tool.inputs.insert(input);
    self
  }

  pub fn inputs(mut self, inputs: impl IntoIterator<Item = SourcePath>) -> Self {
    self.tool.inputs.extend(inputs);
    self
  }

  pub fn deps_inputs(mut self, deps: impl IntoIterator<Item = SourcePath>) -> Self {
    self.tool.deps_inputs = deps.into_iter().collect();
    self
  }

  pub fn build(self) -> CommandTool {
    self.tool
  }
}
