//! Record layer - payloads stored as chains of blocks.

mod record_store;

pub use record_store::RecordStore;
