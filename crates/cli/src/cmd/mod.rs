mod apply;
mod imports;

pub use apply::cmd_apply;
pub use imports::cmd_imports;
