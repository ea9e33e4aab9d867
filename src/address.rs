//! An `Either` type that holds the address of either a register or a memory cell, with some
//! convenience functions.

use std::fmt::{Display, Formatter};

use crate::bytecode::Word;

// `AddressNumberType` is `usize`, as it is naturally an index into a store.
pub type AddressNumberType = usize;

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum Address{
  /// An index into the register file.
  Register(AddressNumberType),
  /// An index into memory. Memory addresses words, not bytes.
  Memory(AddressNumberType)
}

impl Address {
  /// Converts the address to an index into the corresponding vector.
  pub fn idx(&self) -> AddressNumberType {
    match self{
      | Address::Register(i)
      | Address::Memory(i) => *i
    }
  }

  /// A register address taken from an operand field.
  pub fn register(operand: Word) -> Address {
    Address::Register(operand as AddressNumberType)
  }

  /// A memory address taken from an operand field or from the contents of a register.
  pub fn memory(value: Word) -> Address {
    Address::Memory(value as AddressNumberType)
  }

  pub fn is_register(&self) -> bool {
    matches!(self, Address::Register(_))
  }

}


impl Display for Address{
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self{
      Address::Register(i) => {
        write!(f, "R[{}]", i)
      },
      Address::Memory(i) => {
        write!(f, "M[{}]", i)
      }
    }
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_and_index(){
    let register = Address::register(3);
    let memory   = Address::memory(1023);
    assert_eq!(register.to_string(), "R[3]");
    assert_eq!(memory.to_string(), "M[1023]");
    assert_eq!(register.idx(), 3);
    assert_eq!(memory.idx(), 1023);
    assert!(register.is_register());
    assert!(!memory.is_register());
  }
}
