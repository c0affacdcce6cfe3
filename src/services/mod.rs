pub mod capture_service;
pub mod extraction_service;

pub use capture_service::{reconstruct, CaptureService};
pub use extraction_service::{ExtractionService, ExtractionSummary, SourceStatus};
