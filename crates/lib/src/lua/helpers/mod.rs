//! Helper tables exposed to scripts.

pub mod paths;
