// Downloader module - extraction, format selection and delivery

pub mod errors;
pub mod extractors;
pub mod format_selector;
pub mod headers;
pub mod janitor;
pub mod models;
pub mod relay;
pub mod tools;
pub mod utils;
pub mod video_id;

pub use errors::{DownloadError, ErrorKind};
pub use format_selector::FormatSelector;
pub use models::{AudioCandidate, DownloadSession, Extraction, StrategyKind, VideoId, VideoMetadata};
pub use relay::{RelayConfig, StreamRelay};
pub use tools::{ToolCapability, ToolManager};
