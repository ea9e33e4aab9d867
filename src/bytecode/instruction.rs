use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::IntoEnumIterator;
use strum_macros::{Display as StrumDisplay, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::bytecode::{Word, MAX_FIELD_WIDTH};

/// Width of the opcode field that starts every instruction.
pub const OPCODE_WIDTH: u32 = 7;

/// Operand fields may not be wider than a machine word.
pub const MAX_OPERAND_WIDTH: u32 = Word::BITS;

/**
  Opcodes of the virtual machine. The discriminant is the numeric opcode written to the
  instruction stream, so the values below are part of the binary format.

  Mnemonics are parsed without regard to case and always printed in upper case.
*/
#[derive(
StrumDisplay, IntoStaticStr, EnumString, EnumIter, TryFromPrimitive, IntoPrimitive,
Clone,        Copy,          Eq, PartialEq,  Debug,            Hash
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[repr(u8)]
pub enum Operation {
  Load   = 10, // load( dest_reg, const )
  Read   = 54, // read( src_addr_reg, dest_reg )
  Write  = 39, // write( dest_reg, src_reg )
  Popcnt = 18, // popcnt( dest_addr_reg, src_mem_addr )
}

impl Operation{
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }

  pub fn mnemonic(&self) -> &'static str {
    self.into()
  }

  /// Operand field names in the order the machine reads them. Every format of this operation
  /// must use exactly these fields.
  pub fn field_names(&self) -> &'static [&'static str] {
    match self {
      Operation::Load   => &["dest_reg", "const"],
      Operation::Read   => &["src_addr_reg", "dest_reg"],
      Operation::Write  => &["dest_reg", "src_reg"],
      Operation::Popcnt => &["dest_addr_reg", "src_mem_addr"],
    }
  }
}

/// A named, fixed-width slot in an encoded instruction.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct OperandField {
  pub name  : &'static str,
  pub width : u32
}

impl OperandField {
  pub const fn new(name: &'static str, width: u32) -> OperandField {
    OperandField { name, width }
  }

  /// The largest value that fits in the field.
  pub fn max_value(&self) -> u64 {
    match self.width >= u64::BITS {
      true  => u64::MAX,
      false => (1u64 << self.width) - 1
    }
  }

  pub fn fits(&self, value: u64) -> bool {
    value <= self.max_value()
  }
}

/// The layout of one operation: opcode, then operands in order, then reserved zero bits.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstructionFormat {
  pub operation : Operation,
  pub operands  : Vec<OperandField>,
  pub reserved  : u32
}

impl InstructionFormat {
  pub fn new(operation: Operation, operands: &[OperandField], reserved: u32) -> InstructionFormat {
    InstructionFormat { operation, operands: operands.to_vec(), reserved }
  }

  pub fn arity(&self) -> usize {
    self.operands.len()
  }

  pub fn bit_length(&self) -> u32 {
    OPCODE_WIDTH + self.operands.iter().map(|field| field.width).sum::<u32>() + self.reserved
  }

  pub fn byte_length(&self) -> u32 {
    self.bit_length() / 8
  }
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum DescriptorError {
  #[error("{0} is described more than once")]
  DuplicateOperation(Operation),
  #[error("{operation} has fields {found:?}, expected {expected:?}")]
  FieldLayout {
    operation : Operation,
    expected  : &'static [&'static str],
    found     : Vec<&'static str>
  },
  #[error("{operation} field `{field}` has width {width}, expected 1 to {max}", max = MAX_OPERAND_WIDTH)]
  BadFieldWidth { operation: Operation, field: &'static str, width: u32 },
  #[error("{operation} is {bits} bits long, which is not a whole number of bytes")]
  NotByteAligned { operation: Operation, bits: u32 },
  #[error("{operation} has {width} reserved bits, at most {max} allowed", max = MAX_FIELD_WIDTH)]
  BadReservedWidth { operation: Operation, width: u32 },
}

/**
  The instruction set descriptor: an immutable table from operation to layout. The assembler
  and the machine both take it by reference, so encoder and decoder can never disagree on
  field order or widths.
*/
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstructionSet {
  formats: Vec<InstructionFormat>
}

impl InstructionSet {

  /// Builds a descriptor from a custom table after checking it can be encoded and decoded
  /// unambiguously.
  pub fn new(formats: Vec<InstructionFormat>) -> Result<InstructionSet, DescriptorError> {
    let set = InstructionSet { formats };
    set.validate()?;
    Ok(set)
  }

  /// The table of the standard machine.
  pub fn standard() -> InstructionSet {
    use Operation::*;
    InstructionSet {
      formats: vec![
        // [OpCode:7][DestReg:3][Const:24][Reserved:6]
        InstructionFormat::new(
          Load,
          &[OperandField::new("dest_reg", 3), OperandField::new("const", 24)],
          6
        ),
        // [OpCode:7][SrcAddrReg:32][DestReg:3][Reserved:6]
        InstructionFormat::new(
          Read,
          &[OperandField::new("src_addr_reg", 32), OperandField::new("dest_reg", 3)],
          6
        ),
        // [OpCode:7][DestReg:3][SrcReg:3][Reserved:3]
        InstructionFormat::new(
          Write,
          &[OperandField::new("dest_reg", 3), OperandField::new("src_reg", 3)],
          3
        ),
        // [OpCode:7][DestAddrReg:3][SrcMemAddr:32][Reserved:6]
        InstructionFormat::new(
          Popcnt,
          &[OperandField::new("dest_addr_reg", 3), OperandField::new("src_mem_addr", 32)],
          6
        ),
      ]
    }
  }

  pub fn validate(&self) -> Result<(), DescriptorError> {
    let mut seen_operations = HashSet::new();

    for format in &self.formats {
      let operation = format.operation;

      if !seen_operations.insert(operation) {
        return Err(DescriptorError::DuplicateOperation(operation));
      }
      let found: Vec<&'static str> = format.operands.iter().map(|field| field.name).collect();
      if found != operation.field_names() {
        return Err(
          DescriptorError::FieldLayout { operation, expected: operation.field_names(), found }
        );
      }
      for field in &format.operands {
        if field.width == 0 || field.width > MAX_OPERAND_WIDTH {
          return Err(
            DescriptorError::BadFieldWidth { operation, field: field.name, width: field.width }
          );
        }
      }
      // The reserved tail is read in one piece.
      if format.reserved > MAX_FIELD_WIDTH {
        return Err(DescriptorError::BadReservedWidth { operation, width: format.reserved });
      }
      if format.bit_length() % 8 != 0 {
        return Err(DescriptorError::NotByteAligned { operation, bits: format.bit_length() });
      }
    }
    Ok(())
  }

  pub fn format(&self, operation: Operation) -> Option<&InstructionFormat> {
    self.formats.iter().find(|format| format.operation == operation)
  }

  /// Resolves a numeric opcode read from the instruction stream.
  pub fn format_for_code(&self, code: u8) -> Option<&InstructionFormat> {
    Operation::try_from(code)
      .ok()
      .and_then(|operation| self.format(operation))
  }

  /// Resolves an assembly mnemonic, ignoring case.
  pub fn format_for_mnemonic(&self, mnemonic: &str) -> Option<&InstructionFormat> {
    Operation::from_str(mnemonic)
      .ok()
      .and_then(|operation| self.format(operation))
  }

  pub fn formats(&self) -> impl Iterator<Item = &InstructionFormat> {
    self.formats.iter()
  }

}

impl Default for InstructionSet {
  fn default() -> InstructionSet {
    InstructionSet::standard()
  }
}

lazy_static! {
  /// The process-wide descriptor of the standard machine.
  pub static ref STANDARD_INSTRUCTION_SET: InstructionSet = InstructionSet::standard();
}

/// Every operation the machine understands, in declaration order.
pub fn all_operations() -> impl Iterator<Item = Operation> {
  Operation::iter()
}

/// Holds the unencoded components of an instruction. Operands are stored in the order their
/// fields appear in the instruction's `InstructionFormat`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Instruction {
  pub operation : Operation,
  pub operands  : Vec<Word>
}

impl Instruction {
  pub fn new(operation: Operation, operands: Vec<Word>) -> Instruction {
    Instruction { operation, operands }
  }
}

impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.operation)?;
    for operand in &self.operands {
      write!(f, " {}", operand)?;
    }
    Ok(())
  }
}
