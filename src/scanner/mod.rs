pub mod raw_scanner;

pub use raw_scanner::{format_bytes, RawFile, RawFileScanner, ScanStatistics};
