pub mod models;
pub mod report;
pub mod scanner;

pub use models::{
    ClassProperty,
    FailureKind,
    FileFailure,
    FileParser,
    GameClass,
    PropertyValue,
    ScanResult,
};

pub use scanner::{
    scan,
    scan_with_config,
    CppFileParser,
    ScannerConfig,
};

pub use report::{generate_report, ScanReport};
