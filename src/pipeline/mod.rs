//! 流水线核心
//!
//! ```text
//! POST /start ──try_start──▶ PipelineStateTracker
//!      │
//!      └─spawn──▶ StageRunner ──▶ scrape → extract → analyze
//!                     │
//!                     ├──▶ LogSink
//!                     └──▶ PipelineStateTracker ◀── StatusReporter ◀── GET /status, /logs
//! ```

pub mod log_sink;
pub mod runner;
pub mod stage;
pub mod state;
pub mod status;

pub use log_sink::{LogEntry, LogLevel, LogSink, DEFAULT_TAIL};
pub use runner::{Collaborators, StageRunner};
pub use stage::{
    DocumentAnalyzer, DocumentProcessor, DocumentScraper, ExtractOutcome, ResultsWriter,
    ScrapeOutcome, Stage, StageResult,
};
pub use state::{PipelineStateTracker, RunSnapshot, RunState};
pub use status::StatusReporter;
