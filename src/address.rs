//! The location an operand resolved to, with some convenience functions.

use std::fmt::{Display, Formatter};

use crate::bytecode::Word;

// `AddressNumberType` is `usize`, as it is naturally an index into a register store.
pub type AddressNumberType = usize;

/**
  The result of resolving an operand at run time. Registers and memory cells are mutable
  slots; two operands may resolve to the same slot. Immediates carry their value and cannot be
  written.
*/
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum Slot {
  /// An index into the register file.
  Register(AddressNumberType),
  /// A memory address. Every word is a valid address.
  Memory(Word),
  /// A value with nowhere to write it back.
  Immediate(Word),
}

impl Slot {
  pub fn is_writable(&self) -> bool {
    match self {
      Slot::Immediate(_) => false,
      _ => true
    }
  }
}

impl Display for Slot {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Slot::Register(i) => {
        write!(f, "R[{}]", i)
      },
      Slot::Memory(address) => {
        write!(f, "M[0x{:04X}]", address)
      },
      Slot::Immediate(value) => {
        write!(f, "0x{:04X}", value)
      }
    }
  }
}
