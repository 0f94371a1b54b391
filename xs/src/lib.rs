//! ExperienceStore - durable log of predicted vs. observed action costs
//!
//! Every time an execution engine reports how long (or how expensive) a
//! planned action actually was, one `ExperienceRecord` is appended. Planners
//! read these records back to rescale their heuristic estimates.
//!
//! # Architecture
//!
//! ```text
//! ~/.local/share/experiencestore/
//! ├── experience.jsonl   # one ExperienceRecord per line, oldest first
//! └── experience.lock    # advisory lock shared by concurrent writers
//! ```
//!
//! # Example
//!
//! ```ignore
//! use experiencestore::{ExperienceRecord, ExperienceStore, JsonlExperienceStore, StoreOptions};
//!
//! let store = JsonlExperienceStore::open("/tmp/xs", StoreOptions::default())?;
//! store.append(ExperienceRecord::new("book-flight-hotel", "search_flights(SFO)", 1, 2))?;
//! let matches = store.query("book-flight-hotel", "search_flights(LAX)", 0.5, 10)?;
//! ```

pub mod cli;
pub mod config;
mod error;
mod record;
mod similarity;
mod store;

pub use error::StoreError;
pub use record::{ExperienceMatch, ExperienceRecord, StoreStats};
pub use similarity::{normalize_descriptor, similarity};
pub use store::{ExperienceStore, JsonlExperienceStore, MemoryExperienceStore, StoreOptions};

/// Default number of records retained before FIFO eviction
pub const DEFAULT_CAPACITY: usize = 10_000;

/// File name of the record log inside the store directory
pub const RECORDS_FILE: &str = "experience.jsonl";

/// File name of the advisory lock inside the store directory
pub const LOCK_FILE: &str = "experience.lock";
