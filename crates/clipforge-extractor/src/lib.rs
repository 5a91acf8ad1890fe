//! Metadata/download extraction for clipforge, bridged to an external
//! helper process that speaks a newline-delimited JSON event protocol.

pub mod mock;
pub mod process_extractor;
pub mod protocol;

pub use mock::MockExtractor;
pub use process_extractor::ProcessExtractor;
pub use protocol::{parse_line, ExtractorEvent, ProtocolError};
