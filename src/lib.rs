/*!
  An assembler and interpreter for a tiny register/memory machine with a bit-packed
  instruction stream.

  ```text
  text -> [`assemble`] -> bytes (+ log) -> [`interpret`] -> memory snapshot
  ```

  Both directions are driven by one `InstructionSet` descriptor.
*/

#[macro_use] extern crate prettytable;
#[macro_use] extern crate lazy_static;

pub mod address;
pub mod bytecode;
pub mod driver;
pub mod error;
pub mod machine;

pub use address::Address;
pub use bytecode::{assemble, disassemble, Assembly, Instruction, InstructionSet, LogEntry, Operation,
                   Word, STANDARD_INSTRUCTION_SET};
pub use error::{AssemblyError, Error, ExecutionError, Malformation};
pub use machine::{interpret, Machine, MachineConfig, MachineDump, MemorySnapshot};
