use std::any::Any;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::args::{Attributes, ConstructorArg, HasDeclaredDeps, ValidationError};
use crate::filesystem::ProjectFilesystem;
use crate::rule::{BuildRule, BuildRuleError, BuildRuleParams};
use crate::rulekey::{AddsToRuleKey, KeyField};
use crate::source_path::{RelPath, SourcePath};
use crate::target::BuildTarget;

use super::types::{BuildRuleCreationContext, Description};

const ATTRIBUTES: &[&str] = &["src", "out"];

/// Validated argument of an `export_file` target. Defaults are already
/// applied: `src` falls back to the short name inside the base path, `out`
/// to the short name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFileArg {
  src: SourcePath,
  out: RelPath,
  deps: BTreeSet<BuildTarget>,
}

impl ExportFileArg {
  pub fn new(target: &BuildTarget, src: Option<SourcePath>, out: Option<&str>) -> Result<Self, ValidationError> {
    let src = match src {
      Some(src) => src,
      None => {
        let default = match target.base_path() {
          "" => target.short_name().to_string(),
          base => format!("{base}/{}", target.short_name()),
        };
        SourcePath::path(&default).map_err(|e| ValidationError::new(target, "src", e.to_string()))?
      }
    };
    if src.build_target() == Some(target) {
      return Err(ValidationError::new(target, "src", "a target cannot export itself"));
    }

    let out = RelPath::new(out.unwrap_or(target.short_name())).map_err(|e| ValidationError::new(target, "out", e.to_string()))?;

    // Exporting another rule's output makes that rule a dependency.
    let deps = src.build_target().cloned().into_iter().collect();
    Ok(Self { src, out, deps })
  }

  pub fn src(&self) -> &SourcePath {
    &self.src
  }

  pub fn out(&self) -> &RelPath {
    &self.out
  }
}

impl HasDeclaredDeps for ExportFileArg {
  fn declared_deps(&self) -> &BTreeSet<BuildTarget> {
    &self.deps
  }
}

impl ConstructorArg for ExportFileArg {
  fn as_any(&self) -> &dyn Any {
    self
  }
}

/// Exposes a file as the output of a rule, so other rules can depend on it by
/// target.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportFileDescription;

impl Description for ExportFileDescription {
  type Arg = ExportFileArg;

  fn kind(&self) -> &'static str {
    "export_file"
  }

  fn parse_arg(
    &self,
    target: &BuildTarget,
    attributes: &serde_json::Map<String, serde_json::Value>,
  ) -> Result<ExportFileArg, ValidationError> {
    let attrs = Attributes::new(target, attributes);
    attrs.deny_unknown(ATTRIBUTES)?;
    let src = attrs.optional::<SourcePath>("src")?;
    let out = attrs.optional::<String>("out")?;
    ExportFileArg::new(target, src, out.as_deref())
  }

  fn create_build_rule(
    &self,
    _ctx: &BuildRuleCreationContext<'_>,
    target: &BuildTarget,
    filesystem: Arc<ProjectFilesystem>,
    params: BuildRuleParams,
    arg: &ExportFileArg,
  ) -> Result<Arc<dyn BuildRule>, BuildRuleError> {
    Ok(Arc::new(ExportFileRule {
      target: target.clone(),
      filesystem,
      src: arg.src.clone(),
      out: arg.out.clone(),
      build_deps: params.build_deps(),
    }))
  }
}

#[derive(Debug)]
pub struct ExportFileRule {
  target: BuildTarget,
  filesystem: Arc<ProjectFilesystem>,
  src: SourcePath,
  out: RelPath,
  build_deps: Vec<Arc<dyn BuildRule>>,
}

impl AddsToRuleKey for ExportFileRule {
  fn key_fields(&self) -> Vec<KeyField> {
    vec![KeyField::new("src", &self.src), KeyField::new("out", self.out.as_str())]
  }
}

impl BuildRule for ExportFileRule {
  fn kind(&self) -> &str {
    "export_file"
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
    path.push(self.out.as_path());
    Some(path)
  }
}
