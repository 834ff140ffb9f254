// Tree model and the pure passes over it: indexing, instrumentation,
// correlation and trimming. Nothing in here touches the filesystem.

pub mod ast;
#[cfg(any(test, feature = "test-support"))]
pub mod builder;
pub mod comments;
pub mod cover;
pub mod extent;
pub mod instrument;
pub mod profile;
pub mod trace;
pub mod trim;
pub mod visit;
