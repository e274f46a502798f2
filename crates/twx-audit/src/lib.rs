//! # twx-audit
//!
//! Audit artifacts for twx runs.
//!
//! Every run leaves two files behind: the submitted specification, with
//! every key it carried, and the [`ExecutionReport`](twx_core::ExecutionReport) it
//! produced, whether the run completed, aborted, was cancelled or was
//! rejected before reaching the remote platform.
//!
//! ```text
//! <directory>/
//!   specs/spec_20250101T120000.123Z.json
//!   reports/run_20250101T120000.456Z_1a2b3c4d.json
//! ```

pub mod error;
pub mod storage;

pub use error::AuditError;
pub use storage::{
    ArtifactStore, FileArtifactStore, NullArtifactStore, REPORTS_DIR, SPECS_DIR, create_store,
    load_report_file,
};
