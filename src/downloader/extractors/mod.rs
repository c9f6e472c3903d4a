// Extraction strategies - metadata and audio candidates for a video
//
// Three interchangeable strategies behind one trait:
// - Library: rusty_ytdl, in-process
// - CLI: native `yt-dlp` binary (only when the startup probe found it)
// - Scrape: player response embedded in the watch page
//
// The orchestrator runs them in that order and stops at the first success.

pub mod traits;
pub mod library;
pub mod cli;
pub mod scrape;
pub mod orchestrator;
pub mod diagnostics;

pub use traits::{ByteStream, ExtractionStrategy, ExtractorConfig, LibraryStreamOpener};
pub use library::LibraryStrategy;
pub use cli::CliInfoExtractor;
pub use scrape::ScrapeExtractor;
pub use orchestrator::InfoExtractorOrchestrator;
pub use diagnostics::{classify, classify_playability};
