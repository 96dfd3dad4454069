//! chainstore - A minimal embedded storage engine: chained records over
//! fixed-size blocks, with an in-memory B-tree index.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           chainstore                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                Engine (engine.rs)                        │   │
//! │  │   create/read/update/delete record + index operations   │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                 ↓                               ↓               │
//! │  ┌───────────────────────────┐   ┌───────────────────────────┐ │
//! │  │   Record Store (record/)  │   │   B-tree Index (index/)   │ │
//! │  │  payload = chain of blocks│   │  key → record id, memory  │ │
//! │  └───────────────────────────┘   └───────────────────────────┘ │
//! │                 ↓                                               │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Storage Layer (storage/)                       │   │
//! │  │   BlockStore + Block (dirty write-back) + Medium         │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (BlockId, Error, Config)
//! - [`storage`] - Media, block allocation and block handles
//! - [`record`] - Variable-length records as block chains
//! - [`index`] - Index structures (B-tree)
//! - [`engine`] - Record store and index composed
//!
//! # Threading
//! Everything here is single-threaded. A [`BlockStore`](storage::BlockStore)
//! is `Send` but not `Sync`; share an engine between threads through
//! [`SharedEngine`].
//!
//! # Quick Start
//! ```no_run
//! use chainstore::{Config, Engine, RangeDirection};
//!
//! let mut engine: Engine<String> = Engine::open("my_store.db", &Config::default()).unwrap();
//!
//! let id = engine.create_record(b"Silverstone").unwrap();
//! engine.index_insert("GBR".to_string(), id).unwrap();
//!
//! let found = engine.index_get(&"GBR".to_string()).unwrap();
//! assert_eq!(engine.read_record(found).unwrap(), b"Silverstone");
//! ```

pub mod common;
pub mod engine;
pub mod index;
pub mod record;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{DEFAULT_BLOCK_SIZE, DEFAULT_MIN_DEGREE};
pub use common::{BlockId, Config, Error, ErrorKind, Result};

pub use engine::{Engine, SharedEngine};
pub use index::{BTreeIndex, RangeDirection};
pub use record::RecordStore;
pub use storage::{Block, BlockStore, HeaderField, Medium, MemoryMedium, StatsSnapshot};
