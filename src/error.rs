//! Error types for assembly, execution and the file driver.

use std::path::PathBuf;

use thiserror::Error;

use crate::address::Address;
use crate::bytecode::{BitStreamError, Operation};

/// Assembly errors. `line` is 1-based and counts every line of the source, including blank
/// and comment lines.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum AssemblyError {
  #[error("line {line}: cannot be split into tokens: {reason}")]
  Syntax { line: usize, reason: String },
  #[error("line {line}: `{name}` is not an operation")]
  UnknownOpcode { line: usize, name: String },
  #[error("line {line}: operand `{token}` is not a non-negative integer")]
  InvalidOperand { line: usize, token: String },
  #[error("line {line}: {operation} requires {expected} operands but was given {given}")]
  ArityError { line: usize, operation: Operation, expected: usize, given: usize },
  #[error("line {line}: {operation} operand `{field}` = {token} does not fit in {width} bits")]
  OperandOverflow {
    line      : usize,
    operation : Operation,
    field     : &'static str,
    token     : String,
    width     : u32
  },
}

impl AssemblyError {
  pub fn line(&self) -> usize {
    match self {
      | AssemblyError::Syntax { line, .. }
      | AssemblyError::UnknownOpcode { line, .. }
      | AssemblyError::InvalidOperand { line, .. }
      | AssemblyError::ArityError { line, .. }
      | AssemblyError::OperandOverflow { line, .. } => *line
    }
  }
}

/// Why an instruction could not be decoded.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum Malformation {
  #[error("stream ends inside the instruction ({0})")]
  Truncated(#[from] BitStreamError),
  #[error("reserved bits are {0:#x}, expected zero")]
  ReservedBits(u64),
}

/// Execution errors. `bit_offset` is where the offending instruction starts in the stream.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ExecutionError {
  #[error("unknown opcode {code} at bit {bit_offset}")]
  UnknownOpcode { code: u8, bit_offset: usize },
  #[error("malformed instruction at bit {bit_offset}: {reason}")]
  MalformedInstruction { bit_offset: usize, reason: Malformation },
  #[error("address {address} out of bounds at bit {bit_offset}")]
  AddressOutOfBounds { address: Address, bit_offset: usize },
  #[error("{operation} at bit {bit_offset} has {given} operands, expected {expected}")]
  OperandCount { operation: Operation, expected: usize, given: usize, bit_offset: usize },
  #[error("invalid memory range {start}..{end}")]
  InvalidRange { start: usize, end: usize },
}

/// Errors from the file-level driver.
#[derive(Debug, Error)]
pub enum Error {
  #[error("{}: {source}", path.display())]
  Io { path: PathBuf, source: std::io::Error },
  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),
  #[error("assembly failed: {0}")]
  Assembly(#[from] AssemblyError),
  #[error("execution failed: {0}")]
  Execution(#[from] ExecutionError),
}

impl Error {
  pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Error {
    Error::Io { path: path.into(), source }
  }
}
