//! Classpath declaration and environment providers.

use std::sync::Arc;

use bootscript_lib::configurer::ScriptConfigurerFactory;
use bootscript_lib::error::{Phase, ScriptError};
use bootscript_lib::settings::Settings;
use bootscript_lib::source::StringScriptSource;
use serde_json::json;

use super::common::*;

#[test]
fn declared_entries_merge_with_initial_environment() {
  let (mut cfg, handler) = with_handler(
    r#"
buildscript {
  declare("c")
  declare("a")
  declare("b")
  declare("a")
}
"#,
    &["base"],
  );

  cfg.apply(dynamic()).unwrap();

  assert_eq!(entry_names(&handler.environment()), vec!["a", "b", "base", "c"]);
}

#[test]
fn multiple_blocks_all_declare() {
  let (mut cfg, handler) = with_handler(
    "buildscript { declare(\"one\") }\nx = 1\nbuildscript { declare(\"two\") }\n",
    &[],
  );

  cfg.apply(dynamic()).unwrap();

  assert_eq!(entry_names(&handler.environment()), vec!["one", "two"]);
}

#[test]
fn custom_provider_takes_precedence_over_environment() {
  let (mut cfg, _handler) = with_handler("from_provider = useLib(\"provided\")\n", &["provided"]);
  cfg.set_environment(environment(&["ignored"]));
  let target = dynamic();

  cfg.apply(target.clone()).unwrap();
  assert_eq!(target.borrow().get("from_provider"), Some(&json!("provided")));

  let (mut cfg, _handler) = with_handler("useLib(\"ignored\")\n", &["provided"]);
  cfg.set_environment(environment(&["ignored"]));
  assert!(cfg.apply(dynamic()).is_err());
}

#[test]
fn plain_environment_is_used_without_provider() {
  let mut cfg = configurer("lib = useLib(\"given\")\ncount = #classpath\n");
  cfg.set_environment(environment(&["given"]));
  let target = dynamic();

  cfg.apply(target.clone()).unwrap();

  let obj = target.borrow();
  assert_eq!(obj.get("lib"), Some(&json!("given")));
  assert_eq!(obj.get("count"), Some(&json!(1)));
}

#[test]
fn rejected_declaration_fails_classpath_phase() {
  let provider = Arc::new(RejectingProvider::default());
  let mut cfg = configurer("buildscript {\n  declare(\"lib-x\")\n}\nreached = true\n");
  cfg.set_environment_provider(provider.clone());
  let target = dynamic();

  let err = cfg.apply(target.clone()).unwrap_err();

  let ScriptError::Execution(e) = err else {
    panic!("expected execution error, got {:?}", err);
  };
  assert_eq!(e.phase, Phase::Classpath);
  assert_eq!(e.location.line, Some(2));
  assert!(e.message.contains("rejected"), "got: {}", e.message);
  assert!(!*provider.refreshed.lock().unwrap());
  assert!(target.borrow().get("reached").is_none());
}

#[test]
fn factory_settings_provide_base_classpath() {
  let settings = Settings {
    classpath: vec!["from-settings".to_string()],
    closure_name: "deps".to_string(),
    ..Settings::default()
  };
  let factory = ScriptConfigurerFactory::from_settings(&settings).unwrap();
  let mut cfg = factory.create(Arc::new(StringScriptSource::new(
    "build.lua",
    "deps { declare(\"extra\") }\na = useLib(\"from-settings\")\nb = useLib(\"extra\")\n",
  )));
  let target = dynamic();

  cfg.apply(target.clone()).unwrap();

  let obj = target.borrow();
  assert_eq!(obj.get("a"), Some(&json!("from-settings")));
  assert_eq!(obj.get("b"), Some(&json!("extra")));
}
