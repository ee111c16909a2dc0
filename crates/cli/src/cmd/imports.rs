//! Implementation of the `boot imports` command.

use anyhow::{Context, Result};

use bootscript_lib::ScriptConfigurerFactory;
use bootscript_lib::settings::Settings;

use crate::output::{OutputFormat, print_json};

pub fn cmd_imports(output: OutputFormat) -> Result<()> {
  let settings = Settings::from_env().context("Failed to read settings from environment")?;
  let factory = ScriptConfigurerFactory::from_settings(&settings).context("Invalid settings")?;
  let imports = factory.imports();

  if output.is_json() {
    return print_json(&imports);
  }
  for line in imports {
    println!("{}", line);
  }
  Ok(())
}
