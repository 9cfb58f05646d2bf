//! Runs domain - Document and evaluation entry points of the run pipeline

mod document;
mod entity;
mod evaluation;
mod repository;

pub use document::{DocumentRun, DocumentRunResponse, DocumentRunner, RunDocument};
pub use entity::{
    DocumentLog, Evaluation, EvaluationResult, EvaluationResultType, NewDocumentLog,
    NewEvaluationResult,
};
pub use evaluation::{EvaluationRun, EvaluationRunner, RunEvaluation};
pub use repository::RunRecordRepository;

#[cfg(test)]
pub use repository::MockRunRecordRepository;
