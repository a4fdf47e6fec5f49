pub mod collector;
pub mod parser;
pub mod scanner;

pub use parser::{flatten_tree, CppFileParser};
pub use scanner::{scan, scan_with_config, ScannerConfig};
