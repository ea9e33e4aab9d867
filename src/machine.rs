//! The register/memory machine that executes decoded instructions.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::ops::Range;

use prettytable::{format as TableFormat, Table};
use serde::Serialize;
use tracing::{debug, trace};

use crate::address::*;
use crate::bytecode::*;
use crate::error::ExecutionError;

pub const DEFAULT_REGISTER_COUNT: usize = 8;
pub const DEFAULT_MEMORY_SIZE: usize = 1024;

/// Memory is addressed by a `Word`, so larger sizes have unreachable cells.
pub const MAX_MEMORY_SIZE: u64 = 1 << Word::BITS;

/// READ names its address register with a `Word`.
pub const MAX_REGISTER_COUNT: u64 = 1 << Word::BITS;

/// Sizes of the register file and of memory, in words.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MachineConfig {
  pub register_count : usize,
  pub memory_size    : usize
}

impl Default for MachineConfig {
  fn default() -> MachineConfig {
    MachineConfig {
      register_count : DEFAULT_REGISTER_COUNT,
      memory_size    : DEFAULT_MEMORY_SIZE
    }
  }
}

/// Final memory contents over a window of addresses, in ascending address order. Serializes
/// as a JSON object keyed by address.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MemorySnapshot(pub BTreeMap<AddressNumberType, Word>);

impl MemorySnapshot {
  pub fn get(&self, address: AddressNumberType) -> Option<Word> {
    self.0.get(&address).copied()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

/// A memory snapshot together with the whole register file, for diagnostics.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct MachineDump {
  pub memory    : MemorySnapshot,
  pub registers : Vec<Word>
}

#[derive(Debug)]
pub struct Machine {

  // Memory Stores
  registers : Vec<Word>,
  memory    : Vec<Word>,

  // The last cell written, highlighted when the machine is displayed.
  last_written : Option<Address>,

}

impl Machine {

  // region Display methods

  fn make_register_table<'a, I> (
      name      : char,
      cells     : I,
      highlight : Option<AddressNumberType>
    ) -> Table
    where I: Iterator<Item = (AddressNumberType, &'a Word)>
  {

    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Address", ubl->"Contents"]);

    for (i, cell) in cells {
      match Some(i) == highlight{

        true  => {
          table.add_row(
            row![r->format!("* --> {}[{}] =", name, i), format!("{}", cell)]
          );
        }

        false => {
          table.add_row(
            row![r->format!("{}[{}] =", name, i), format!("{}", cell)]
          );
        }

      } // end match on highlight
    } // end for
    table
  }

  // endregion

  // region Low-level utility methods

  pub fn new(config: MachineConfig) -> Machine {
    Machine {
      registers    : vec![0; config.register_count],
      memory       : vec![0; config.memory_size],
      last_written : None
    }
  }

  /// Reads the cell at `address`. `bit_offset` locates the instruction for error reporting.
  fn value_at(&self, address: Address, bit_offset: usize) -> Result<Word, ExecutionError> {
    let store = match address {
      Address::Register(_) => &self.registers,
      Address::Memory(_)   => &self.memory
    };
    store.get(address.idx())
         .copied()
         .ok_or(ExecutionError::AddressOutOfBounds { address, bit_offset })
  }

  /// Writes the cell at `address`. Unlike a growable heap, the stores have a fixed size and an
  /// out of range address is an error.
  fn set_value_at(
    &mut self,
    address    : Address,
    value      : Word,
    bit_offset : usize
  ) -> Result<(), ExecutionError> {
    let store = match address {
      Address::Register(_) => &mut self.registers,
      Address::Memory(_)   => &mut self.memory
    };
    let cell = store.get_mut(address.idx())
                    .ok_or(ExecutionError::AddressOutOfBounds { address, bit_offset })?;
    *cell = value;
    self.last_written = Some(address);
    Ok(())
  }

  /// Presets a memory cell, e.g. to give a program input.
  pub fn store(&mut self, address: AddressNumberType, value: Word) -> Result<(), ExecutionError> {
    self.set_value_at(Address::Memory(address), value, 0)
  }

  pub fn load(&self, address: AddressNumberType) -> Result<Word, ExecutionError> {
    self.value_at(Address::Memory(address), 0)
  }

  pub fn register(&self, index: AddressNumberType) -> Option<Word> {
    self.registers.get(index).copied()
  }

  pub fn registers(&self) -> &[Word] {
    &self.registers
  }

  // endregion

  // region Execution

  /**
    Executes one decoded instruction against the registers and memory.

    `bit_offset` is where the instruction started in its stream and is only used to locate
    errors. Operands are in the order of `Operation::field_names`, which every validated
    `InstructionSet` follows.
  */
  pub fn execute(&mut self, instruction: &Instruction, bit_offset: usize) -> Result<(), ExecutionError> {
    let operation = instruction.operation;
    let (first, second) = match instruction.operands[..] {
      [first, second] => (first, second),
      _ => {
        return Err(
          ExecutionError::OperandCount {
            operation,
            expected : operation.field_names().len(),
            given    : instruction.operands.len(),
            bit_offset
          }
        );
      }
    };

    match operation {

      Operation::Load => {
        // registers[dest_reg] = const
        let (dest_reg, constant) = (first, second);
        self.set_value_at(Address::register(dest_reg), constant, bit_offset)
      }

      Operation::Read => {
        // registers[dest_reg] = memory[registers[src_addr_reg]]
        let (src_addr_reg, dest_reg) = (first, second);
        let source = self.value_at(Address::register(src_addr_reg), bit_offset)?;
        let value  = self.value_at(Address::memory(source), bit_offset)?;
        self.set_value_at(Address::register(dest_reg), value, bit_offset)
      }

      Operation::Write => {
        // memory[registers[dest_reg]] = registers[src_reg]
        let (dest_reg, src_reg) = (first, second);
        let destination = self.value_at(Address::register(dest_reg), bit_offset)?;
        let value       = self.value_at(Address::register(src_reg), bit_offset)?;
        self.set_value_at(Address::memory(destination), value, bit_offset)
      }

      Operation::Popcnt => {
        // memory[registers[dest_addr_reg]] = popcount(memory[src_mem_addr])
        let (dest_addr_reg, src_mem_addr) = (first, second);
        let destination = self.value_at(Address::register(dest_addr_reg), bit_offset)?;
        let value       = self.value_at(Address::memory(src_mem_addr), bit_offset)?;
        self.set_value_at(Address::memory(destination), value.count_ones(), bit_offset)
      }

    } // end match operation
  }

  /**
    Decodes and executes every instruction in `bytes`, in order, until the cursor reaches the
    end of the buffer. The first error stops execution; the machine is left in whatever state
    the preceding instructions produced.
  */
  pub fn run(&mut self, bytes: &[u8], set: &InstructionSet) -> Result<usize, ExecutionError> {
    let mut reader = BitReader::new(bytes);
    let mut executed = 0;

    while !reader.is_at_end() {
      let bit_offset  = reader.position();
      let instruction = decode_instruction(&mut reader, set)?;
      trace!(bit_offset, %instruction, "execute");
      self.execute(&instruction, bit_offset)?;
      executed += 1;

      #[cfg(feature = "trace_computation")]
      trace!("\n{}", self);
    }

    debug!(executed, bits = reader.bit_len(), "program finished");
    Ok(executed)
  }

  // endregion

  // region Snapshots

  /// Checks that `range` is a window of memory.
  pub fn check_range(&self, range: &Range<AddressNumberType>) -> Result<(), ExecutionError> {
    if range.start > range.end {
      return Err(ExecutionError::InvalidRange { start: range.start, end: range.end });
    }
    if range.end > self.memory.len() {
      // The first address past the end of memory.
      let address = Address::Memory(range.start.max(self.memory.len()));
      return Err(ExecutionError::AddressOutOfBounds { address, bit_offset: 0 });
    }
    Ok(())
  }

  pub fn snapshot(&self, range: Range<AddressNumberType>) -> Result<MemorySnapshot, ExecutionError> {
    self.check_range(&range)?;
    Ok(MemorySnapshot(
      range.clone()
           .zip(self.memory[range].iter().copied())
           .collect()
    ))
  }

  pub fn dump(&self, range: Range<AddressNumberType>) -> Result<MachineDump, ExecutionError> {
    Ok(MachineDump {
      memory    : self.snapshot(range)?,
      registers : self.registers.clone()
    })
  }

  // endregion

}

/**
  Runs `bytes` on a fresh machine and returns memory over `range`.

  The range is checked before anything executes, and no snapshot is produced if execution
  fails, so a caller gets a complete result or an error.
*/
pub fn interpret(
  bytes  : &[u8],
  set    : &InstructionSet,
  config : MachineConfig,
  range  : Range<AddressNumberType>
) -> Result<MemorySnapshot, ExecutionError> {
  let mut machine = Machine::new(config);
  machine.check_range(&range)?;
  machine.run(bytes, set)?;
  machine.snapshot(range)
}


lazy_static! {
  static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

impl Display for Machine {

  // Memory is mostly zero, so only nonzero cells are listed.
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let highlight = |is_register: bool| {
      self.last_written
          .filter(|address| address.is_register() == is_register)
          .map(|address| address.idx())
    };

    let r_table = Machine::make_register_table(
      'R',
      self.registers.iter().enumerate(),
      highlight(true)
    );
    let m_table = Machine::make_register_table(
      'M',
      self.memory.iter().enumerate().filter(|(_, value)| **value != 0),
      highlight(false)
    );

    let mut combined_table = table!([r_table, m_table]);

    combined_table.set_titles(row![ub->"Registers", ub->"Memory"]);
    combined_table.set_format(*TABLE_DISPLAY_FORMAT);

    write!(f, "{}", combined_table)
  }
}
