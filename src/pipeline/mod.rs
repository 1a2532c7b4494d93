//! Pipeline stage implementations
//!
//! Each stage is an independent job body over the shared context. Failures
//! inside a stage are scoped to the smallest unit that can make progress
//! on its own: one source, one item, one segment.

pub mod highlight;
pub mod highlights;
pub mod ingest;
pub mod publish;
