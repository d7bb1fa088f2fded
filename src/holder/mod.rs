//! Holder-side collaborators of the presentation exchange engine: key
//! material, proof suites, credential storage and JSON-LD document loading.

pub mod document_loader;
pub mod signer;
pub mod store;
pub mod verifiable_presentation_builder;
pub mod wallet;
