//! Top-level error type for the query path.

use thiserror::Error;

use crate::adapter::ExecutionError;
use crate::cache::CacheError;
use crate::compile::CompileError;

/// Any failure along the compile → cache → execute path.
///
/// Compilation errors identify their stage (see [`CompileError::stage`]);
/// resolution failures are always terminal for the request; no partial
/// plan is ever executed.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("compilation failed: {0}")]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

pub type EngineResult<T> = Result<T, EngineError>;
