//! Helpers shared by processors, templates and the build.

pub mod exec;
pub mod fs;
pub mod markdown;
pub mod minify;
pub mod slug;
