use std::convert::TryFrom;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use strum_macros::{Display as StrumDisplay, EnumIter, EnumString, IntoStaticStr};
use num_enum::{TryFromPrimitive, IntoPrimitive};

use crate::bytecode::Operand;

/**
  Basic opcodes, stored in the low four bits of the instruction word. Zero is not a basic
  opcode: it marks a non-basic instruction, whose opcode lives in the next six bits
  (see `Special`).

  Order-dependencies:
      ```
      Operation::is_conditional()
      ```
*/
#[derive(
StrumDisplay, IntoStaticStr, EnumString, EnumIter, TryFromPrimitive, IntoPrimitive,
Clone,        Copy,          Eq, PartialEq,  Debug,    Hash
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[repr(u8)]
pub enum Operation {
  Set = 0x1,   // a = b
  Add = 0x2,   // a = a + b, O = carry
  Sub = 0x3,   // a = a - b, O = borrow
  Mul = 0x4,   // a = a * b, O = high word
  Div = 0x5,   // a = a / b, O = fraction
  Mod = 0x6,   // a = a % b
  // Shift direction follows the mnemonic. Some reference revisions have the two swapped.
  Shl = 0x7,   // a = a << b, O = bits shifted out
  Shr = 0x8,   // a = a >> b, O = bits shifted out
  And = 0x9,   // a = a & b
  // The reference documents disagree on the name; both spellings assemble.
  #[strum(to_string = "BOR", serialize = "OR")]
  Bor = 0xA,   // a = a | b
  Xor = 0xB,   // a = a ^ b
  // Conditionals: skip the next instruction unless the test holds //
  Ife = 0xC,   // a == b
  Ifn = 0xD,   // a != b
  Ifg = 0xE,   // a > b
  Ifb = 0xF,   // (a & b) != 0
}

/// Non-basic opcodes, stored in bits [9:4] of an instruction word whose low nibble is zero.
#[derive(
StrumDisplay, IntoStaticStr, EnumString, EnumIter, TryFromPrimitive, IntoPrimitive,
Clone,        Copy,          Eq, PartialEq,  Debug,    Hash
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[repr(u8)]
pub enum Special {
  #[strum(to_string = "HLT")]
  Halt = 0x00, // stop the machine
  Jsr  = 0x01, // push PC, PC = a
}

impl Operation {
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }

  pub fn from_code(code: u8) -> Option<Operation> {
    Operation::try_from(code).ok()
  }

  pub fn is_conditional(&self) -> bool {
    self.code() >= Operation::Ife.code()
  }

  /// Cycles charged for the operation itself, excluding operand fetches and skips.
  pub fn cycles(&self) -> u64 {
    match self {
      Operation::Set | Operation::And | Operation::Bor | Operation::Xor => 1,

      | Operation::Add
      | Operation::Sub
      | Operation::Mul
      | Operation::Shl
      | Operation::Shr => 2,

      Operation::Div | Operation::Mod => 3,

      Operation::Ife | Operation::Ifn | Operation::Ifg | Operation::Ifb => 2,
    }
  }
}

impl Special {
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }

  pub fn from_code(code: u8) -> Option<Special> {
    Special::try_from(code).ok()
  }

  pub fn cycles(&self) -> u64 {
    match self {
      Special::Halt => 0,
      Special::Jsr  => 2,
    }
  }
}

/// Either kind of opcode, as named in assembly source.
#[derive(Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum Mnemonic {
  Basic(Operation),
  Special(Special),
}

impl Mnemonic {
  /// Basic instructions take two operands, non-basic instructions take one.
  pub fn arity(&self) -> usize {
    match self {
      Mnemonic::Basic(_)   => 2,
      Mnemonic::Special(_) => 1,
    }
  }
}

impl FromStr for Mnemonic {
  type Err = strum::ParseError;

  fn from_str(text: &str) -> Result<Self, Self::Err> {
    Operation::from_str(text)
      .map(Mnemonic::Basic)
      .or_else(|_| Special::from_str(text).map(Mnemonic::Special))
  }
}

impl Display for Mnemonic {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Mnemonic::Basic(operation) => write!(f, "{}", operation),
      Mnemonic::Special(special) => write!(f, "{}", special),
    }
  }
}

/// Holds the unencoded components of an instruction.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Instruction {
  /// [B:6][A:6][Opcode:4]
  Basic {
    opcode : Operation,
    a      : Operand,
    b      : Operand
  },
  /// [A:6][Opcode:6][0000]
  NonBasic {
    opcode : Special,
    a      : Operand
  },
}

impl Instruction {
  pub fn mnemonic(&self) -> Mnemonic {
    match self {
      Instruction::Basic { opcode, .. }    => Mnemonic::Basic(*opcode),
      Instruction::NonBasic { opcode, .. } => Mnemonic::Special(*opcode),
    }
  }

  pub fn is_conditional(&self) -> bool {
    match self {
      Instruction::Basic { opcode, .. } => opcode.is_conditional(),
      Instruction::NonBasic { .. }      => false,
    }
  }
}

impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {

      Instruction::Basic { opcode, a, b } => {
        write!(f, "{} {}, {}", opcode, a, b)
      }

      Instruction::NonBasic { opcode, a } => {
        write!(f, "{} {}", opcode, a)
      }

    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use strum::IntoEnumIterator;

  #[test]
  fn mnemonics_are_case_insensitive() {
    assert_eq!("set".parse::<Mnemonic>().unwrap(), Mnemonic::Basic(Operation::Set));
    assert_eq!("IfB".parse::<Mnemonic>().unwrap(), Mnemonic::Basic(Operation::Ifb));
    assert_eq!("JSR".parse::<Mnemonic>().unwrap(), Mnemonic::Special(Special::Jsr));
    assert_eq!("hlt".parse::<Mnemonic>().unwrap(), Mnemonic::Special(Special::Halt));
    assert!("nop".parse::<Mnemonic>().is_err());
  }

  #[test]
  fn bitwise_or_has_two_spellings() {
    assert_eq!("or".parse::<Mnemonic>().unwrap(), Mnemonic::Basic(Operation::Bor));
    assert_eq!("bor".parse::<Mnemonic>().unwrap(), Mnemonic::Basic(Operation::Bor));
    assert_eq!(Operation::Bor.to_string(), "BOR");
    assert_eq!(Operation::Bor.code(), 0xA);
  }

  #[test]
  fn codes_round_trip_through_names() {
    for operation in Operation::iter() {
      assert_eq!(Operation::from_code(operation.code()), Some(operation));
      assert_eq!(operation.to_string().parse::<Operation>().unwrap(), operation);
    }
    assert_eq!(Operation::from_code(0), None);
    assert_eq!(Special::from_code(0x01), Some(Special::Jsr));
    assert_eq!(Special::from_code(0x02), None);
  }

  #[test]
  fn only_the_if_family_is_conditional() {
    let conditionals: Vec<Operation> = Operation::iter().filter(Operation::is_conditional).collect();
    assert_eq!(conditionals, vec![Operation::Ife, Operation::Ifn, Operation::Ifg, Operation::Ifb]);
  }

  #[test]
  fn display() {
    let instruction = Instruction::Basic {
      opcode: Operation::Set,
      a: Operand::Register(crate::bytecode::Register::A),
      b: Operand::Next(0x30),
    };
    assert_eq!(instruction.to_string(), "SET A, 0x0030");
  }
}
