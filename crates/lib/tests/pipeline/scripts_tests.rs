//! End-to-end script behaviour.

use serde_json::json;

use super::common::*;

#[test]
fn declared_library_is_usable_in_main_body() {
  let (mut cfg, handler) = with_handler(
    r#"
buildscript {
  declare("lib-x")
}
resolved = useLib("lib-x")
"#,
    &[],
  );
  let target = dynamic();

  cfg.apply(target.clone()).unwrap();

  assert_eq!(target.borrow().get("resolved"), Some(&json!("lib-x")));
  assert!(handler.environment().contains("lib-x"));
}

#[test]
fn custom_block_name_leaves_default_name_as_plain_code() {
  let mut cfg = configurer(
    r#"
deps {
  declare("lib-y")
}
local calls = 0
function buildscript(t) calls = calls + 1 end
buildscript { }
called = calls
lib = useLib("lib-y")
"#,
  );
  cfg.set_classpath_closure_name("deps");
  let target = dynamic();

  cfg.apply(target.clone()).unwrap();

  let obj = target.borrow();
  assert_eq!(obj.get("called"), Some(&json!(1)));
  assert_eq!(obj.get("lib"), Some(&json!("lib-y")));
}

#[test]
fn classpath_block_runs_only_once() {
  let mut cfg = configurer(
    r#"
buildscript {
  runs = (runs or 0) + 1
}
after = runs
"#,
  );
  let target = dynamic();

  cfg.apply(target.clone()).unwrap();

  let obj = target.borrow();
  assert_eq!(obj.get("runs"), Some(&json!(1)));
  assert_eq!(obj.get("after"), Some(&json!(1)));
}

#[test]
fn empty_block_leaves_environment_unchanged() {
  let (mut cfg, handler) = with_handler("buildscript { }\nx = 1\n", &["base"]);

  cfg.apply(dynamic()).unwrap();

  assert_eq!(entry_names(&handler.environment()), vec!["base"]);
  assert!(handler.pending().is_empty());
}

#[test]
fn script_without_block_runs_main_body() {
  let target = dynamic();
  configurer("name = format('%s!', 'plain')").apply(target.clone()).unwrap();
  assert_eq!(target.borrow().get("name"), Some(&json!("plain!")));
}

#[test]
fn block_in_string_or_function_is_not_a_classpath_block() {
  let mut cfg = configurer(
    r#"
text = "buildscript { declare('nope') }"
local function later()
  buildscript { }
end
ok = #classpath
"#,
  );
  let target = dynamic();

  cfg.apply(target.clone()).unwrap();

  let obj = target.borrow();
  assert_eq!(obj.get("text"), Some(&json!("buildscript { declare('nope') }")));
  assert_eq!(obj.get("ok"), Some(&json!(0)));
}

#[test]
fn nested_apply_configures_same_target() {
  let dir = ScriptDir::new();
  dir.write("build.lua", "apply { from = \"child.lua\" }\nparent = true\n");
  dir.write(
    "child.lua",
    "buildscript {\n  declare(\"child-lib\")\n}\nchild = useLib(\"child-lib\")\n",
  );
  let target = dynamic();

  dir.configurer("build.lua").apply(target.clone()).unwrap();

  let obj = target.borrow();
  assert_eq!(obj.get("parent"), Some(&json!(true)));
  assert_eq!(obj.get("child"), Some(&json!("child-lib")));
}

#[test]
fn self_applying_script_is_cut_off() {
  let dir = ScriptDir::new();
  dir.write("loop.lua", "apply { from = \"loop.lua\" }\n");

  let err = dir.configurer("loop.lua").apply(dynamic()).unwrap_err();
  assert!(err.to_string().contains("nested more than"), "got: {}", err);
}

#[test]
fn declared_directory_extends_module_path() {
  let dir = ScriptDir::new();
  dir.write("mods/greet.lua", "return { hello = function() return 'hi' end }\n");
  dir.write(
    "build.lua",
    "buildscript {\n  declare(\"mods\")\n}\nlocal greet = require(\"greet\")\ngreeting = greet.hello()\nlibs = #classpath\n",
  );
  let target = dynamic();

  dir.configurer("build.lua").apply(target.clone()).unwrap();

  let obj = target.borrow();
  assert_eq!(obj.get("greeting"), Some(&json!("hi")));
  assert_eq!(obj.get("libs"), Some(&json!(1)));
}

#[test]
fn script_directory_is_exposed() {
  let dir = ScriptDir::new();
  dir.write("build.lua", "here = paths.basename(__dir)\n");
  let target = dynamic();

  dir.configurer("build.lua").apply(target.clone()).unwrap();

  let expected = dunce::canonicalize(dir.temp.path()).unwrap();
  let expected = expected.file_name().unwrap().to_string_lossy().into_owned();
  assert_eq!(target.borrow().get("here"), Some(&json!(expected)));
}

#[test]
fn script_tables_are_mutable_in_place() {
  let target = dynamic();
  configurer(
    "config = {}\nconfig.name = 'core'\nlist = {}\ntable.insert(list, 'x')\nhandlers = { onBuild = function() return 1 end }\nresult = handlers.onBuild()\n",
  )
  .apply(target.clone())
  .unwrap();

  let obj = target.borrow();
  assert_eq!(obj.get("config"), Some(&json!({ "name": "core" })));
  assert_eq!(obj.get("list"), Some(&json!(["x"])));
  assert_eq!(obj.get("result"), Some(&json!(1)));
  assert!(obj.get("handlers").is_none());
}

#[test]
fn nested_apply_sees_and_extends_parent_tables() {
  let dir = ScriptDir::new();
  dir.write("build.lua", "config = { a = 1 }\napply { from = \"child.lua\" }\nconfig.c = 3\n");
  dir.write("child.lua", "config.b = 2\n");
  let target = dynamic();

  dir.configurer("build.lua").apply(target.clone()).unwrap();

  assert_eq!(target.borrow().get("config"), Some(&json!({ "a": 1, "b": 2, "c": 3 })));
}
