//! Storage layer: the note store abstraction and its backends.

mod error;
mod memory;
mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use store::{NoteStore, StoredPrediction, open_store};

#[cfg(feature = "duckdb")]
mod corpus;
#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use corpus::read_corpus_csv;
#[cfg(feature = "duckdb")]
pub use duck::DuckStore;
