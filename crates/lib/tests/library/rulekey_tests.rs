use std::fs;

use rulekey_lib::config::EngineConfig;
use rulekey_lib::rule::{BuildRuleError, BuildRuleResolver};
use rulekey_lib::rulekey::{DefaultFileHashCache, KeyFieldCause, RuleKeyError, RuleKeyFactory};
use rulekey_lib::tool::DefaultSourcePathResolver;
use rulekey_lib::util::hash::FileHashError;

use super::common::{BinaryRuleBuilder, TestProject, target};

#[test]
fn echo_hi_has_plain_command_prefix_and_stable_key() {
  let project = TestProject::new();
  let resolver = BuildRuleResolver::new();
  let rule = BinaryRuleBuilder::new("//app:hello")
    .command(&["echo", "hi"])
    .build(&project, &resolver)
    .unwrap();

  let paths = DefaultSourcePathResolver::new(&resolver, &project.filesystem);
  let tool = rule.tool().unwrap();
  assert_eq!(tool.command_prefix(&paths).unwrap(), vec!["echo", "hi"]);
  assert!(tool.environment(&paths).unwrap().is_empty());

  let first = project.key(&resolver, &rule).unwrap();
  let second = project.key(&resolver, &rule).unwrap();
  assert_eq!(first, second);
}

#[test]
fn environment_insertion_order_does_not_change_key() {
  let project = TestProject::new();

  let resolver = BuildRuleResolver::new();
  let ab = BinaryRuleBuilder::new("//app:env")
    .command(&["env"])
    .env("A", "1")
    .env("B", "2")
    .build(&project, &resolver)
    .unwrap();

  let other = BuildRuleResolver::new();
  let ba = BinaryRuleBuilder::new("//app:env")
    .command(&["env"])
    .env("B", "2")
    .env("A", "1")
    .build(&project, &other)
    .unwrap();

  assert_eq!(project.key(&resolver, &ab).unwrap(), project.key(&other, &ba).unwrap());
}

#[test]
fn command_order_changes_key() {
  let project = TestProject::new();
  let resolver = BuildRuleResolver::new();

  let a = BinaryRuleBuilder::new("//app:say")
    .command(&["echo", "hi", "there"])
    .build(&project, &resolver)
    .unwrap();
  let b = BinaryRuleBuilder::new("//app:say")
    .command(&["echo", "there", "hi"])
    .build(&project, &resolver)
    .unwrap();

  assert_ne!(project.key(&resolver, &a).unwrap(), project.key(&resolver, &b).unwrap());
}

#[test]
fn dependency_declaration_order_does_not_change_key() {
  let project = TestProject::new();
  let resolver = BuildRuleResolver::new();
  BinaryRuleBuilder::new("//lib:a").command(&["a"]).build_and_add(&project, &resolver);
  BinaryRuleBuilder::new("//lib:b").command(&["b"]).build_and_add(&project, &resolver);

  let ab = BinaryRuleBuilder::new("//app:main")
    .command(&["link"])
    .dep("//lib:a")
    .dep("//lib:b")
    .build(&project, &resolver)
    .unwrap();
  let ba = BinaryRuleBuilder::new("//app:main")
    .command(&["link"])
    .dep("//lib:b")
    .dep("//lib:a")
    .build(&project, &resolver)
    .unwrap();

  assert_eq!(project.key(&resolver, &ab).unwrap(), project.key(&resolver, &ba).unwrap());
}

#[test]
fn dependency_change_propagates_to_dependents() {
  let project = TestProject::new();

  let key_with_dep_command = |dep_command: &[&str]| {
    let resolver = BuildRuleResolver::new();
    let dep = BinaryRuleBuilder::new("//lib:r2")
      .command(dep_command)
      .build_and_add(&project, &resolver);
    let rule = BinaryRuleBuilder::new("//app:r1")
      .command(&["run"])
      .dep("//lib:r2")
      .build_and_add(&project, &resolver);
    (project.key(&resolver, &dep).unwrap(), project.key(&resolver, &rule).unwrap())
  };

  let (r2_before, r1_before) = key_with_dep_command(&["make", "v1"]);
  let (r2_after, r1_after) = key_with_dep_command(&["make", "v2"]);
  assert_ne!(r2_before, r2_after);
  assert_ne!(r1_before, r1_after);

  // Unchanged configuration reproduces the same keys.
  assert_eq!(key_with_dep_command(&["make", "v1"]), (r2_before, r1_before));
}

#[test]
fn transitive_input_change_reaches_the_top() {
  let project = TestProject::new();
  project.write("gen/schema.txt", "v1");

  let keys = || {
    let resolver = BuildRuleResolver::new();
    BinaryRuleBuilder::new("//gen:schema")
      .command(&["gen"])
      .input("gen/schema.txt")
      .build_and_add(&project, &resolver);
    BinaryRuleBuilder::new("//lib:mid")
      .command(&["mid"])
      .input("//gen:schema")
      .build_and_add(&project, &resolver);
    let top = BinaryRuleBuilder::new("//app:top")
      .command(&["top"])
      .dep("//lib:mid")
      .build_and_add(&project, &resolver);
    project.key(&resolver, &top).unwrap()
  };

  let before = keys();
  project.write("gen/schema.txt", "v2");
  assert_ne!(before, keys());
}

#[test]
fn constructing_twice_yields_equal_keys() {
  let project = TestProject::new();
  project.write("app/main.c", "int main() {}");

  let construct = || {
    let resolver = BuildRuleResolver::new();
    BinaryRuleBuilder::new("//tools:cc").command(&["cc"]).build_and_add(&project, &resolver);
    let rule = BinaryRuleBuilder::new("//app:main")
      .command(&["-o", "main"])
      .executable("//tools:cc")
      .input("app/main.c")
      .env("CFLAGS", "-O2")
      .build_and_add(&project, &resolver);
    project.key(&resolver, &rule).unwrap()
  };

  assert_eq!(construct(), construct());
}

#[test]
fn input_content_changes_key() {
  let project = TestProject::new();
  let resolver = BuildRuleResolver::new();
  project.write("app/data.txt", "one");
  let rule = BinaryRuleBuilder::new("//app:cat")
    .command(&["cat"])
    .input("app/data.txt")
    .build(&project, &resolver)
    .unwrap();

  let before = project.key(&resolver, &rule).unwrap();
  project.write("app/data.txt", "two");
  let after = project.key(&resolver, &rule).unwrap();
  assert_ne!(before, after);

  project.write("app/data.txt", "one");
  assert_eq!(project.key(&resolver, &rule).unwrap(), before);
}

#[test]
fn keys_do_not_depend_on_project_root() {
  let key_in_fresh_project = |contents: &str| {
    let project = TestProject::new();
    project.write("src/input.txt", contents);
    let resolver = BuildRuleResolver::new();
    let rule = BinaryRuleBuilder::new("//src:tool")
      .command(&["process"])
      .input("src/input.txt")
      .build(&project, &resolver)
      .unwrap();
    project.key(&resolver, &rule).unwrap()
  };

  assert_eq!(key_in_fresh_project("same"), key_in_fresh_project("same"));
  assert_ne!(key_in_fresh_project("same"), key_in_fresh_project("different"));
}

#[test]
fn diamond_computes_shared_dependency_once() {
  let project = TestProject::new();
  let resolver = BuildRuleResolver::new();
  BinaryRuleBuilder::new("//lib:base").command(&["base"]).build_and_add(&project, &resolver);
  BinaryRuleBuilder::new("//lib:left")
    .command(&["left"])
    .dep("//lib:base")
    .build_and_add(&project, &resolver);
  BinaryRuleBuilder::new("//lib:right")
    .command(&["right"])
    .input("//lib:base")
    .build_and_add(&project, &resolver);
  let top = BinaryRuleBuilder::new("//app:top")
    .command(&["top"])
    .dep("//lib:left")
    .dep("//lib:right")
    .build_and_add(&project, &resolver);

  let hashes = DefaultFileHashCache::new();
  let factory = RuleKeyFactory::new(&resolver, &hashes, &EngineConfig::default());
  factory.build(top.as_ref()).unwrap();
  assert_eq!(factory.computed_count(), 4);
  assert!(factory.cached(&target("//lib:base")).is_some());
}

#[test]
fn missing_input_fails_key_for_that_field() {
  let project = TestProject::new();
  let resolver = BuildRuleResolver::new();
  let rule = BinaryRuleBuilder::new("//app:cat")
    .command(&["cat"])
    .input("app/absent.txt")
    .build(&project, &resolver)
    .unwrap();

  let err = project.key(&resolver, &rule).unwrap_err();
  assert!(
    err.to_string().contains("field 'tool.inputs' of rule //app:cat"),
    "{err}"
  );
  assert!(matches!(
    err,
    RuleKeyError::Field {
      cause: KeyFieldCause::FileHash(FileHashError::NotFound { .. }),
      ..
    }
  ));
}

#[cfg(unix)]
#[test]
fn unreadable_input_is_a_read_error() {
  let project = TestProject::new();
  let resolver = BuildRuleResolver::new();
  // A symlink to itself cannot be read.
  fs::create_dir_all(project.root().join("app")).unwrap();
  std::os::unix::fs::symlink("loop.txt", project.root().join("app/loop.txt")).unwrap();

  let rule = BinaryRuleBuilder::new("//app:cat")
    .command(&["cat"])
    .input("app/loop.txt")
    .build(&project, &resolver)
    .unwrap();

  let err = project.key(&resolver, &rule).unwrap_err();
  assert!(matches!(
    err,
    RuleKeyError::Field {
      cause: KeyFieldCause::FileHash(FileHashError::Read { .. }),
      ..
    }
  ));
}

#[test]
fn undeclared_dependency_fails_construction() {
  let project = TestProject::new();
  let resolver = BuildRuleResolver::new();

  let err = BinaryRuleBuilder::new("//app:main")
    .command(&["run"])
    .dep("//lib:not_built")
    .build(&project, &resolver)
    .unwrap_err();
  assert!(matches!(
    err,
    BuildRuleError::UnresolvedDependency { ref dependency, .. } if dependency == &target("//lib:not_built")
  ));

  // Targets reached only through tool inputs must be built too.
  let err = BinaryRuleBuilder::new("//app:main")
    .command(&["run"])
    .input("//gen:not_built")
    .build(&project, &resolver)
    .unwrap_err();
  assert!(matches!(err, BuildRuleError::UnresolvedDependency { .. }));
}

#[test]
fn executable_is_resolved_to_rule_output() {
  let project = TestProject::new();
  let resolver = BuildRuleResolver::new();
  BinaryRuleBuilder::new("//tools:cc").command(&["bootstrap"]).build_and_add(&project, &resolver);
  let rule = BinaryRuleBuilder::new("//app:main")
    .command(&["-c", "main.c"])
    .executable("//tools:cc")
    .build_and_add(&project, &resolver);

  let deps: Vec<String> = rule.build_deps().iter().map(|d| d.build_target().to_string()).collect();
  assert_eq!(deps, vec!["//tools:cc"]);

  let paths = DefaultSourcePathResolver::new(&resolver, &project.filesystem);
  let prefix = rule.tool().unwrap().command_prefix(&paths).unwrap();
  let expected = project.root().join("rulekey-out").join("tools").join("cc");
  assert_eq!(prefix[0], expected.to_string_lossy());
  assert_eq!(&prefix[1..], ["-c", "main.c"]);
}

#[test]
fn key_seed_invalidates_keys() {
  let project = TestProject::new();
  let resolver = BuildRuleResolver::new();
  let rule = BinaryRuleBuilder::new("//app:hello")
    .command(&["echo", "hi"])
    .build(&project, &resolver)
    .unwrap();

  let hashes = DefaultFileHashCache::new();
  let plain = RuleKeyFactory::new(&resolver, &hashes, &EngineConfig::default())
    .build(rule.as_ref())
    .unwrap();
  let seeded = EngineConfig {
    key_seed: "format-2".to_string(),
    ..EngineConfig::default()
  };
  let reseeded = RuleKeyFactory::new(&resolver, &hashes, &seeded)
    .build(rule.as_ref())
    .unwrap();
  assert_ne!(plain, reseeded);
}
