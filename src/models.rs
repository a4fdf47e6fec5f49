use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Interface for file parsers
pub trait FileParser: Send + Sync {
    /// Parse a single file and return all classes found
    fn parse_file(&self, file_path: &Path) -> anyhow::Result<Vec<GameClass>>;

    /// Get the name of the parser
    fn name(&self) -> &str;
}

/// A class definition found in a config file, flattened for reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameClass {
    /// Class name
    pub name: String,

    /// Parent class name (if any)
    pub parent: Option<String>,

    /// Path to the file where this class was found
    pub file_path: PathBuf,

    /// Container class (if this is a nested class)
    pub container_class: Option<String>,

    /// Whether the class is only a forward declaration
    pub is_forward_declaration: bool,

    /// Properties of the class
    pub properties: Vec<ClassProperty>,
}

impl GameClass {
    pub fn new(name: String, parent: Option<String>, file_path: PathBuf) -> Self {
        Self {
            name,
            parent,
            file_path,
            container_class: None,
            is_forward_declaration: false,
            properties: Vec::new(),
        }
    }

    pub fn add_property(&mut self, name: String, value: PropertyValue) {
        self.properties.push(ClassProperty { name, value });
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| &p.value)
    }

    /// Check if this class is a child of the given parent
    pub fn is_child_of(&self, parent_name: &str) -> bool {
        self.parent
            .as_deref()
            .map_or(false, |p| p.eq_ignore_ascii_case(parent_name))
    }
}

/// Represents a property of a class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassProperty {
    /// Property name
    pub name: String,

    /// Property value
    pub value: PropertyValue,
}

/// Represents a property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    /// String value
    String(String),

    /// Integer value
    Number(i64),

    /// Floating-point value
    Float(f64),

    /// Array of scalar values rendered as strings
    Array(Vec<String>),
}

impl PropertyValue {
    pub fn as_string(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[String]> {
        match self {
            PropertyValue::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// Result of scanning a directory of config files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanResult {
    /// Total number of files scanned
    pub files_scanned: usize,

    /// Total number of classes found
    pub classes_found: usize,

    /// Number of files that had errors during parsing
    pub files_with_errors: usize,

    /// Map of class names to class definitions
    pub class_map: HashMap<String, Vec<GameClass>>,

    /// Per-file parse failures
    pub failures: Vec<FileFailure>,

    /// Time taken to complete the scan (in milliseconds)
    pub scan_time_ms: Option<u64>,
}

impl ScanResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_classes(&mut self, classes: Vec<GameClass>) {
        for class in classes {
            self.add_class(class);
        }
    }

    pub fn add_class(&mut self, class: GameClass) {
        self.class_map
            .entry(class.name.clone())
            .or_default()
            .push(class);
        self.classes_found += 1;
    }

    pub fn merge(&mut self, other: ScanResult) {
        self.files_scanned += other.files_scanned;
        self.classes_found += other.classes_found;
        self.files_with_errors += other.files_with_errors;
        self.failures.extend(other.failures);

        for (class_name, classes) in other.class_map {
            self.class_map.entry(class_name).or_default().extend(classes);
        }
    }

    /// Get all classes with a specific parent
    pub fn get_classes_with_parent(&self, parent_name: &str) -> Vec<&GameClass> {
        let mut result = Vec::new();
        for classes in self.class_map.values() {
            for class in classes {
                if class.is_child_of(parent_name) {
                    result.push(class);
                }
            }
        }
        result
    }

    /// Find a class by its name
    pub fn find_class(&self, name: &str) -> Option<&Vec<GameClass>> {
        self.class_map.get(name)
    }
}

/// Broad category of a per-file failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// File could not be read
    Io,
    /// Tokenizer rejected the input
    Lex,
    /// Macro definition or expansion failed
    Macro,
    /// Structural parse failed
    Syntax,
    /// Inheritance resolution failed
    Resolution,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Io => write!(f, "io"),
            FailureKind::Lex => write!(f, "lex"),
            FailureKind::Macro => write!(f, "macro"),
            FailureKind::Syntax => write!(f, "syntax"),
            FailureKind::Resolution => write!(f, "resolution"),
        }
    }
}

/// One file that failed to parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFailure {
    /// Path of the failing file
    pub file_path: PathBuf,

    /// Category of the failure
    pub kind: FailureKind,

    /// Error message from the parser
    pub error_message: String,

    /// Line number of the error, when the parser reports one
    pub error_line: Option<usize>,

    /// Column of the error, when the parser reports one
    pub error_column: Option<usize>,

    /// Time spent before the failure (in milliseconds)
    pub parse_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_result_merge_combines_maps() {
        let mut a = ScanResult::new();
        a.files_scanned = 1;
        a.add_class(GameClass::new("Rifle".into(), None, "a.cpp".into()));

        let mut b = ScanResult::new();
        b.files_scanned = 2;
        b.add_class(GameClass::new(
            "Rifle".into(),
            Some("Weapon".into()),
            "b.cpp".into(),
        ));

        a.merge(b);
        assert_eq!(a.files_scanned, 3);
        assert_eq!(a.classes_found, 2);
        assert_eq!(a.find_class("Rifle").unwrap().len(), 2);
    }

    #[test]
    fn classes_with_parent_is_case_insensitive() {
        let mut result = ScanResult::new();
        result.add_class(GameClass::new(
            "child".into(),
            Some("Uniform_Base".into()),
            "a.cpp".into(),
        ));
        assert_eq!(result.get_classes_with_parent("uniform_base").len(), 1);
    }
}
