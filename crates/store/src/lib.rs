pub mod backend;
pub mod document;
pub mod file;
pub mod http;
pub mod memory;

pub use backend::{DocumentStore, WatchRegistry};
pub use document::{Document, DocumentEvent, DocumentPath};
pub use file::FileStore;
pub use http::HttpStore;
pub use memory::MemoryStore;
