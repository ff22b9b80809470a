//! Unified error handling for the Nyla compiler.
//!
//! Every failure the compiler can report is a [`CompilerError`]: an error
//! kind, a human readable message, the source location it points at and an
//! optional bag of structured metadata for tooling. Local analysis errors are
//! appended to their unit's diagnostic list so a single run can surface many
//! of them; structural errors (unreadable files, conflicting internal paths)
//! abort the whole compilation.

use crate::compiler::tokens::CharPosition;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Every diagnostic the compiler can raise. The name is the stable identity
/// of the diagnostic; the message carried next to it is free-form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // Lexer
    UnknownChar,
    IntTooLarge,

    // Parser
    ExpectedToken,
    ExpectedIdentifier,
    ExpectedStmt,
    ExpectedFactor,
    VariableRedeclaration,

    // Name resolution
    CouldNotFindImport,
    CouldNotFindModuleType,

    // Analysis
    UndeclaredVariable,
    UseOfVariableBeforeDeclaration,
    CannotAssign,
    OpCannotApplyTo,
    ExpectedBoolCond,
    ReturnValueNotCompatibleWithReturnType,
    FunctionExpectsReturnValue,
    FunctionExpectsReturn,
    StmtsAfterReturn,
    CouldNotFindFunction,
    CouldNotFindConstructor,
    AccessingFieldFromStaticContext,
    CalledNonStaticFuncFromStatic,
    FieldNotVisible,
    FunctionNotVisible,
    CircularFields,
    TypeDoesNotHaveField,
    ThisKeywordExpectsDotOp,
    ThisKeywordMustComeFirst,
    CannotUseThisKeywordInStaticContext,
    DotOpExpectsVariable,
    ArrTooManyInitValues,
    ArrSizeMustBePositive,
    ArrSizeNotConstant,
    ArrayAccessExpectsInt,
    ArrayAccessOnInvalidType,
    TooManyArrayAccessIndexes,
    ElementOfArrayNotCompatibleWithArray,
    ComptimeNotComputable,

    // Program level
    MultipleMainFunctionsInProgram,
    MainFunctionNotFound,
    FileWithMainFunctionDoesNotExist,

    // Structural
    FailedToReadFile,
    FailedToReadSourceDirectory,
    ConflictingInternalPaths,
    MalformedConfig,

    // Internal
    CompilerBug,
}

impl ErrorKind {
    pub fn category(self) -> ErrorType {
        use ErrorKind::*;
        match self {
            UnknownChar | IntTooLarge | ExpectedToken | ExpectedIdentifier | ExpectedStmt
            | ExpectedFactor => ErrorType::Syntax,

            CannotAssign
            | OpCannotApplyTo
            | ExpectedBoolCond
            | ReturnValueNotCompatibleWithReturnType
            | ElementOfArrayNotCompatibleWithArray
            | ArrayAccessExpectsInt
            | ArrayAccessOnInvalidType
            | TooManyArrayAccessIndexes
            | TypeDoesNotHaveField => ErrorType::Type,

            FailedToReadFile
            | FailedToReadSourceDirectory
            | ConflictingInternalPaths
            | FileWithMainFunctionDoesNotExist => ErrorType::File,

            MalformedConfig => ErrorType::Config,
            CompilerBug => ErrorType::Compiler,

            _ => ErrorType::Rule,
        }
    }
}

/// Broad category a diagnostic falls into, used for display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Syntax,
    Type,
    Rule,
    File,
    Config,
    Compiler,
}

pub fn error_type_to_str(e_type: ErrorType) -> &'static str {
    match e_type {
        ErrorType::Syntax => "Syntax Error",
        ErrorType::Type => "Type Error",
        ErrorType::Rule => "Language Rule Violation",
        ErrorType::File => "File Error",
        ErrorType::Config => "Malformed Config",
        ErrorType::Compiler => "Compiler Bug",
    }
}

/// Structured metadata keys attached to errors for tooling and editors.
#[derive(Debug, Eq, Hash, PartialEq, Clone, Copy)]
pub enum ErrorMetaDataKey {
    CompilationStage,
    ExpectedType,
    FoundType,
    PrimarySuggestion,
}

/// A completely owned source location. The file path is resolved when the
/// error is created so diagnostics never need the word table to print.
#[derive(Debug, Clone, Default)]
pub struct ErrorLocation {
    pub path: PathBuf,
    pub start_pos: CharPosition,
    pub end_pos: CharPosition,
}

impl ErrorLocation {
    pub fn new(path: PathBuf, start: CharPosition, end: CharPosition) -> ErrorLocation {
        ErrorLocation {
            path,
            start_pos: start,
            end_pos: end,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompilerError {
    pub kind: ErrorKind,
    pub msg: String,
    pub location: ErrorLocation,
    pub metadata: HashMap<ErrorMetaDataKey, &'static str>,
}

impl CompilerError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>, location: ErrorLocation) -> CompilerError {
        CompilerError {
            kind,
            msg: msg.into(),
            location,
            metadata: HashMap::new(),
        }
    }

    pub fn with_file_path(mut self, file_path: &Path) -> Self {
        self.location.path = file_path.to_path_buf();
        self
    }

    pub fn with_metadata(mut self, key: ErrorMetaDataKey, value: &'static str) -> Self {
        self.metadata.insert(key, value);
        self
    }

    /// A file system error pointing at a whole file rather than a span.
    pub fn file_error(kind: ErrorKind, path: &Path, msg: impl Into<String>) -> Self {
        CompilerError::new(
            kind,
            msg,
            ErrorLocation::new(
                path.to_path_buf(),
                CharPosition::default(),
                CharPosition::default(),
            ),
        )
    }

    pub fn config_error(path: &Path, msg: impl Into<String>) -> Self {
        CompilerError::file_error(ErrorKind::MalformedConfig, path, msg)
    }

    /// An internal compiler bug. Not the user's fault.
    pub fn compiler_bug(msg: impl Into<String>) -> Self {
        CompilerError::new(ErrorKind::CompilerBug, msg, ErrorLocation::default())
    }
}

/// Returns a new syntax-category CompilerError from a parsing code path.
///
/// Usage: `return_syntax_error!(ExpectedToken, "message", location)`;
#[macro_export]
macro_rules! return_syntax_error {
    ($kind:ident, $msg:expr, $loc:expr) => {
        return Err($crate::compiler::compiler_errors::CompilerError::new(
            $crate::compiler::compiler_errors::ErrorKind::$kind,
            $msg,
            $loc,
        ))
    };
}

/// Returns a new rule-category CompilerError.
///
/// Usage: `return_rule_error!(CouldNotFindImport, "message", location)`;
#[macro_export]
macro_rules! return_rule_error {
    ($kind:ident, $msg:expr, $loc:expr) => {
        return Err($crate::compiler::compiler_errors::CompilerError::new(
            $crate::compiler::compiler_errors::ErrorKind::$kind,
            $msg,
            $loc,
        ))
    };
}

/// Returns a new file system CompilerError for a whole file or directory.
///
/// Usage: `return_file_error!(FailedToReadFile, path, "message")`;
#[macro_export]
macro_rules! return_file_error {
    ($kind:ident, $path:expr, $msg:expr) => {
        return Err(
            $crate::compiler::compiler_errors::CompilerError::file_error(
                $crate::compiler::compiler_errors::ErrorKind::$kind,
                $path,
                $msg,
            ),
        )
    };
}

/// Returns a CompilerError for an internal compiler bug.
#[macro_export]
macro_rules! return_compiler_error {
    ($($arg:tt)*) => {
        return Err($crate::compiler::compiler_errors::CompilerError::compiler_bug(
            format!($($arg)*),
        ))
    };
}
