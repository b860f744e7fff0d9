use std::any::Any;
use std::collections::BTreeSet;
use std::fs;
use std::sync::Arc;

use rulekey_lib::action_graph::ActionGraphBuilder;
use rulekey_lib::args::{Attributes, ConstructorArg, HasDeclaredDeps, RawTargetNode, ValidationError};
use rulekey_lib::config::EngineConfig;
use rulekey_lib::description::{BuildRuleCreationContext, Description, DescriptionRegistry};
use rulekey_lib::filesystem::{CellPathResolver, ProjectFilesystem};
use rulekey_lib::rule::{BuildRule, BuildRuleError, BuildRuleParams};
use rulekey_lib::rulekey::{AddsToRuleKey, DefaultFileHashCache, KeyField, RuleKeyError, RuleKeyFactory};
use rulekey_lib::target::BuildTarget;
use rulekey_lib::target_graph::TargetGraph;
use rulekey_lib::tool::SourcePathError;
use serde_json::json;
use tempfile::TempDir;
use tracing_test::traced_test;

use super::common::{TestProject, target};

/// A rule kind that groups dependencies and produces nothing.
#[derive(Debug)]
struct PhonyArg {
  deps: BTreeSet<BuildTarget>,
}

impl HasDeclaredDeps for PhonyArg {
  fn declared_deps(&self) -> &BTreeSet<BuildTarget> {
    &self.deps
  }
}

impl ConstructorArg for PhonyArg {
  fn as_any(&self) -> &dyn Any {
    self
  }
}

struct PhonyDescription;

impl Description for PhonyDescription {
  type Arg = PhonyArg;

  fn kind(&self) -> &'static str {
    "phony"
  }

  fn parse_arg(
    &self,
    target: &BuildTarget,
    attributes: &serde_json::Map<String, serde_json::Value>,
  ) -> Result<PhonyArg, ValidationError> {
    let attrs = Attributes::new(target, attributes);
    attrs.deny_unknown(&["deps"])?;
    Ok(PhonyArg {
      deps: attrs.or_default("deps")?,
    })
  }

  fn create_build_rule(
    &self,
    _ctx: &BuildRuleCreationContext<'_>,
    target: &BuildTarget,
    filesystem: Arc<ProjectFilesystem>,
    params: BuildRuleParams,
    _arg: &PhonyArg,
  ) -> Result<Arc<dyn BuildRule>, BuildRuleError> {
    Ok(Arc::new(PhonyRule {
      target: target.clone(),
      filesystem,
      build_deps: params.build_deps(),
    }))
  }
}

#[derive(Debug)]
struct PhonyRule {
  target: BuildTarget,
  filesystem: Arc<ProjectFilesystem>,
  build_deps: Vec<Arc<dyn BuildRule>>,
}

impl AddsToRuleKey for PhonyRule {
  fn key_fields(&self) -> Vec<KeyField> {
    Vec::new()
  }
}

impl BuildRule for PhonyRule {
  fn kind(&self) -> &str {
    "phony"
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
}

fn raw(value: serde_json::Value) -> Vec<RawTargetNode> {
  serde_json::from_value(value).unwrap()
}

#[traced_test]
#[test]
fn json_targets_to_rule_keys() {
  let project = TestProject::new();
  project.write("data/config.json", "{}");
  project.write("tools/gen.py", "print('hi')");

  let json = r#"[
    { "target": "//app:hello", "kind": "binary",
      "executable": "//tools:gen", "command": ["--config", "data/config.json"],
      "inputs": ["//data:config"], "environment": { "LANG": "C" } },
    { "target": "//data:config", "kind": "export_file", "src": "data/config.json" },
    { "target": "//tools:gen", "kind": "binary", "command": ["python3", "gen.py"],
      "inputs": ["tools/gen.py"] }
  ]"#;
  let target_graph = TargetGraph::from_json(json, &project.registry).unwrap();
  assert_eq!(
    target_graph.deps_of(&target("//app:hello")),
    vec![&target("//data:config"), &target("//tools:gen")]
  );

  let action_graph = project.action_graph(&target_graph);
  assert!(action_graph.is_success());
  assert_eq!(action_graph.total(), 3);

  let hello = action_graph.resolver.get_rule(&target("//app:hello")).unwrap();
  let deps: Vec<String> = hello.build_deps().iter().map(|d| d.build_target().to_string()).collect();
  assert_eq!(deps, vec!["//data:config", "//tools:gen"]);

  let hashes = DefaultFileHashCache::new();
  let factory = RuleKeyFactory::new(&action_graph.resolver, &hashes, &EngineConfig::default());
  let targets = action_graph.resolver.targets();
  let keys = factory.build_all(&targets);
  assert_eq!(keys.len(), 3);
  assert!(keys.values().all(|k| k.is_ok()));
  assert_eq!(factory.computed_count(), 3);
  assert!(logs_contain("computed rule keys"));

  // A second walk over the same definitions reproduces every key.
  let again = project.action_graph(&TargetGraph::from_json(json, &project.registry).unwrap());
  let factory = RuleKeyFactory::new(&again.resolver, &hashes, &EngineConfig::default());
  for (target, key) in keys {
    assert_eq!(factory.build_for_target(&target).unwrap(), key.unwrap());
  }
}

#[traced_test]
#[test]
fn executable_without_output_fails_construction_and_skips_dependents() {
  let mut project = TestProject::new();
  project.registry.register(PhonyDescription);

  let target_graph = project.target_graph(&raw(json!([
    { "target": "//tools:all", "kind": "phony" },
    { "target": "//app:main", "kind": "binary", "command": ["run"], "executable": "//tools:all" },
    { "target": "//app:test", "kind": "binary", "command": ["test"], "deps": ["//app:main"] },
    { "target": "//lib:ok", "kind": "binary", "command": ["ok"], "deps": ["//tools:all"] },
  ])));
  let action_graph = project.action_graph(&target_graph);

  assert!(!action_graph.is_success());
  assert_eq!(action_graph.total(), 4);
  assert!(action_graph.resolver.contains(&target("//tools:all")));
  assert!(action_graph.resolver.contains(&target("//lib:ok")));

  match &action_graph.failed[&target("//app:main")] {
    BuildRuleError::ToolResolution { field, source, .. } => {
      assert_eq!(field, "executable");
      assert_eq!(source, &SourcePathError::NoOutput(target("//tools:all")));
    }
    other => panic!("unexpected error: {other}"),
  }
  assert_eq!(action_graph.skipped[&target("//app:test")], target("//app:main"));
  assert!(logs_contain("//app:main"));
}

#[test]
fn key_failures_are_isolated_per_target() {
  let project = TestProject::new();
  project.write("data/present.txt", "here");

  let target_graph = project.target_graph(&raw(json!([
    { "target": "//data:missing", "kind": "export_file" },
    { "target": "//data:present", "kind": "export_file", "src": "data/present.txt" },
    { "target": "//app:uses_missing", "kind": "binary", "command": ["a"], "deps": ["//data:missing"] },
    { "target": "//app:top", "kind": "binary", "command": ["b"], "deps": ["//app:uses_missing"] },
    { "target": "//app:uses_present", "kind": "binary", "command": ["c"], "inputs": ["//data:present"] },
  ])));
  let action_graph = project.action_graph(&target_graph);
  assert!(action_graph.is_success());

  let hashes = DefaultFileHashCache::new();
  let factory = RuleKeyFactory::new(&action_graph.resolver, &hashes, &EngineConfig::default());
  let keys = factory.build_all(&action_graph.resolver.targets());

  assert!(keys[&target("//data:present")].is_ok());
  assert!(keys[&target("//app:uses_present")].is_ok());

  let missing = keys[&target("//data:missing")].as_ref().unwrap_err();
  assert!(matches!(missing, RuleKeyError::Field { field, .. } if field == "src"));

  let top = keys[&target("//app:top")].as_ref().unwrap_err();
  assert_eq!(top.target(), &target("//app:top"));
  assert_eq!(top.root_cause().target(), &target("//data:missing"));
  assert!(top.to_string().contains("//app:uses_missing"), "{top}");
}

#[test]
fn validation_errors_name_target_and_field() {
  let project = TestProject::new();

  let err = TargetGraph::from_raw(
    &raw(json!([{ "target": "//app:main", "kind": "binary", "command": [] }])),
    &project.registry,
  )
  .unwrap_err()
  .to_string();
  assert!(err.contains("//app:main") && err.contains("command"), "{err}");

  let err = TargetGraph::from_raw(
    &raw(json!([{ "target": "//app:main", "kind": "binary", "command": ["x"], "deps": ["//lib:nowhere"] }])),
    &project.registry,
  )
  .unwrap_err()
  .to_string();
  assert!(err.contains("//lib:nowhere"), "{err}");
}

#[test]
fn cells_resolve_to_their_own_roots() {
  let project = TestProject::new();
  let other_dir = TempDir::new().unwrap();
  let other = ProjectFilesystem::new(other_dir.path());
  fs::create_dir_all(other_dir.path().join("lib")).unwrap();
  fs::write(other_dir.path().join("lib/shared.txt"), "shared").unwrap();

  let cells = CellPathResolver::new(project.filesystem.clone()).with_cell("other", other.clone());
  let target_graph = project.target_graph(&raw(json!([
    { "target": "other//lib:shared", "kind": "export_file", "src": "lib/shared.txt" },
    { "target": "//app:main", "kind": "binary", "command": ["cat"], "inputs": ["other//lib:shared"] },
  ])));
  let action_graph = ActionGraphBuilder::new(&project.registry, &cells, &EngineConfig::default()).build(&target_graph);
  assert!(action_graph.is_success());

  let shared = action_graph.resolver.get_rule(&target("other//lib:shared")).unwrap();
  assert_eq!(shared.filesystem().root(), other.root());
  assert_eq!(shared.output_path().unwrap(), other.output_dir().join("lib").join("shared"));

  let hashes = DefaultFileHashCache::new();
  let factory = RuleKeyFactory::new(&action_graph.resolver, &hashes, &EngineConfig::default());
  factory.build_for_target(&target("//app:main")).unwrap();
}
