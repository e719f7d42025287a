//! Legacy board schema: entity types, prefix detection and extraction.

pub mod extract;
pub mod prefix;
pub mod types;

pub use extract::DocumentExtractor;
pub use prefix::{detect_prefix, verify_prefix};
pub use types::{LegacyDocument, LegacyMember, LegacyModule, LegacySite};
