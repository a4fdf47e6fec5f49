use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Source location of a token or error, 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub fn start() -> Self {
        Self {
            line: 1,
            column: 1,
            offset: 0,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyntaxErrorKind {
    UnexpectedToken,
    MissingSemicolon,
    UnterminatedBlock,
    DuplicateDefinition,
}

impl fmt::Display for SyntaxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntaxErrorKind::UnexpectedToken => write!(f, "unexpected token"),
            SyntaxErrorKind::MissingSemicolon => write!(f, "missing semicolon"),
            SyntaxErrorKind::UnterminatedBlock => write!(f, "unterminated block"),
            SyntaxErrorKind::DuplicateDefinition => write!(f, "duplicate definition"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionErrorKind {
    UnknownParent,
    CyclicInheritance,
}

impl fmt::Display for ResolutionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionErrorKind::UnknownParent => write!(f, "unknown parent"),
            ResolutionErrorKind::CyclicInheritance => write!(f, "cyclic inheritance"),
        }
    }
}

/// Everything that can go wrong between raw text and a resolved tree.
///
/// Lexer, preprocessor and parser errors abort the current file; resolution
/// errors are scoped to the failing class so siblings still resolve.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
pub enum ConfigError {
    #[error("lex error at {position}: {message}")]
    Lex { message: String, position: Position },

    #[error("macro error at {position}: {message}")]
    Macro { message: String, position: Position },

    #[error("syntax error ({kind}) at {position}: {message}")]
    Syntax {
        kind: SyntaxErrorKind,
        message: String,
        position: Position,
    },

    #[error("resolution error ({kind}) in class `{class}`: {message}")]
    Resolution {
        kind: ResolutionErrorKind,
        class: String,
        message: String,
    },
}

impl ConfigError {
    pub fn lex(message: impl Into<String>, position: Position) -> Self {
        ConfigError::Lex {
            message: message.into(),
            position,
        }
    }

    pub fn macro_error(message: impl Into<String>, position: Position) -> Self {
        ConfigError::Macro {
            message: message.into(),
            position,
        }
    }

    pub fn syntax(kind: SyntaxErrorKind, message: impl Into<String>, position: Position) -> Self {
        ConfigError::Syntax {
            kind,
            message: message.into(),
            position,
        }
    }

    pub fn resolution(
        kind: ResolutionErrorKind,
        class: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ConfigError::Resolution {
            kind,
            class: class.into(),
            message: message.into(),
        }
    }

    /// Position of the error, if it has one (resolution errors do not).
    pub fn position(&self) -> Option<Position> {
        match self {
            ConfigError::Lex { position, .. }
            | ConfigError::Macro { position, .. }
            | ConfigError::Syntax { position, .. } => Some(*position),
            ConfigError::Resolution { .. } => None,
        }
    }
}
