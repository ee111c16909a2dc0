/// Name of the block that declares classpath entries when none is configured.
pub const DEFAULT_CLASSPATH_CLOSURE: &str = "buildscript";

/// Environment variable holding the base classpath as a platform path list.
pub const CLASSPATH_ENV: &str = "BOOTSCRIPT_CLASSPATH";

/// Environment variable naming a file with extra default imports.
pub const IMPORTS_ENV: &str = "BOOTSCRIPT_IMPORTS";

/// Environment variable overriding the default classpath block name.
pub const BLOCK_ENV: &str = "BOOTSCRIPT_BLOCK";
