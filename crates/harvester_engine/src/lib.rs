//! Harvester engine: fetch, validate and extract pages concurrently, then persist results.
mod decode;
mod dom;
mod engine;
mod export;
mod extract;
mod fetch;
mod filename;
mod harvest;
mod persist;
mod settings;
mod types;
mod validate;

pub use decode::{decode_html, decode_page, DecodeError};
pub use engine::{ChannelProgressSink, EngineHandle};
pub use export::{
    build_companies_export, write_group_status, ExportError, ExportOptions, ExportSummary,
};
pub use extract::{url_from_open_window, ExtractionError, PageExtractor, PlanPageExtractor};
pub use fetch::{BodyPolicy, PageFetcher, ReqwestFetcher};
pub use filename::safe_file_stem;
pub use harvest::{classify_extraction, Harvester, ProgressSink, SilentProgress};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use settings::{HarvestSettings, PageProfile, RetryPolicy};
pub use types::{EngineEvent, FailureKind, FetchError, FetchedPage, HarvestError};
pub use validate::{
    check_page, find_account_id, Exhaustion, InvalidReason, ValidDocument, Validation, Validator,
};

pub use tokio_util::sync::CancellationToken;
