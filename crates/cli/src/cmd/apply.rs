//! Implementation of the `boot apply` command.
//!
//! Applies a script to an empty [`DynamicObject`] and prints the properties it
//! set together with the classpath the script ended up with.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use bootscript_lib::ScriptConfigurerFactory;
use bootscript_lib::environment::{ClasspathEntry, EnvironmentProvider, ScriptHandler};
use bootscript_lib::settings::Settings;
use bootscript_lib::source::FileScriptSource;
use bootscript_lib::target::DynamicObject;

use crate::output::{OutputFormat, print_json, print_stat, print_success, symbols};

#[derive(Serialize)]
struct ApplyReport<'a> {
  script: String,
  properties: &'a BTreeMap<String, Value>,
  classpath: Vec<ClasspathEntry>,
}

pub fn cmd_apply(file: &Path, block: Option<String>, classpath: Vec<String>, output: OutputFormat) -> Result<()> {
  if !file.exists() {
    anyhow::bail!("Script not found: {}", file.display());
  }

  let mut settings = Settings::from_env().context("Failed to read settings from environment")?;
  if let Some(block) = block {
    settings.closure_name = block;
  }
  settings.classpath.extend(classpath);

  let factory = ScriptConfigurerFactory::from_settings(&settings).context("Invalid settings")?;
  let handler = Arc::new(ScriptHandler::new(factory.environment().clone()));

  let mut configurer = factory.create(Arc::new(FileScriptSource::new(file)));
  configurer.set_environment_provider(handler.clone());

  let target = DynamicObject::new().into_ref();
  info!(script = %file.display(), "applying script");
  configurer
    .apply(target.clone())
    .with_context(|| format!("Failed to apply script: {}", file.display()))?;

  let properties = target.borrow();
  let report = ApplyReport {
    script: file.display().to_string(),
    properties: properties.properties(),
    classpath: handler.environment().entries().to_vec(),
  };

  if output.is_json() {
    return print_json(&report);
  }

  print_success(&format!("Applied {}", report.script));
  if !report.properties.is_empty() {
    println!();
    println!("Properties:");
    for (name, value) in report.properties {
      print_stat(name, &value.to_string());
    }
  }
  if !report.classpath.is_empty() {
    println!();
    println!("Classpath:");
    for entry in &report.classpath {
      println!("  {} {}", symbols::INFO, entry);
    }
  }

  Ok(())
}
