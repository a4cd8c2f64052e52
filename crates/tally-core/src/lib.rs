pub mod config;
pub mod error;
pub mod extract;
pub mod format;
pub mod model;
pub mod normalize;
pub mod ocr;
pub mod pipeline;
pub mod roster;
pub mod rules;

pub use config::PipelineConfig;
pub use error::TallyError;
pub use model::{MediaKind, OutputPayload, SubmissionMeta, SubmittedDocument, TimesheetRecord};
pub use pipeline::{deliver, DeliveryTarget, Pipeline, ProcessedSubmission, ReplySink, RowSink, Stage};
