//! Integration tests for applying scripts through `ScriptConfigurer`.

mod common;

mod classpath_tests;
mod errors_tests;
mod hooks_tests;
mod scripts_tests;
