//! Vault scanning: markdown discovery and per-note metadata extraction.

pub mod extractor;
pub mod walker;

pub use extractor::{ExtractedNote, extract_note};
pub use walker::{VaultWalker, VaultWalkerError, WalkedFile};
