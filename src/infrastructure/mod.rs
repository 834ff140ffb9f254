// Implementations of the ports plus process-level plumbing.

pub mod concurrency;
pub mod json_loader;
pub mod printer;
pub mod resolver;
pub mod sink;

pub use concurrency::init_thread_pool;
pub use json_loader::JsonTreeLoader;
pub use printer::SourcePrinter;
pub use resolver::SearchPathResolver;
pub use sink::{ConsoleSink, DirectorySink};
