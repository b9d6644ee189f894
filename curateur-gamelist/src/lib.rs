pub mod entry;
pub mod error;
pub mod integrity;
pub mod merge;
pub mod parser;
pub mod provenance;
pub mod writer;

pub use entry::{ExtraField, GameEntry};
pub use error::GamelistError;
pub use integrity::{validate_integrity, IntegrityReport};
pub use merge::{merge_entries, ChangeKind, ChangeReport, FieldChange, MergePolicy};
pub use parser::parse_gamelist;
pub use provenance::{ProvenanceRecord, ProvenanceStore};
pub use writer::write_gamelist;
