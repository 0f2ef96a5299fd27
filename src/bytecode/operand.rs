//! Operand encodings: the six bit field that selects an addressing mode.

use std::collections::HashMap;
use std::convert::TryFrom;
use std::fmt::{Display, Formatter};

use strum_macros::{Display as StrumDisplay, EnumIter, EnumString, IntoStaticStr};
use num_enum::{TryFromPrimitive, IntoPrimitive};

use crate::bytecode::{DecodeError, Word};

/// General purpose registers, in encoding order.
#[derive(
StrumDisplay, IntoStaticStr, EnumString, EnumIter, TryFromPrimitive, IntoPrimitive,
Clone,        Copy,          Eq, PartialEq,  Debug,    Hash
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[repr(u8)]
pub enum Register {
  A, B, C, X, Y, Z, I, J
}

impl Register {
  /// Index into the register file.
  pub fn idx(&self) -> usize {
    Into::<u8>::into(*self) as usize
  }
}

const REGISTER           : u8 = 0x00;
const INDIRECT           : u8 = 0x08;
const INDIRECT_OFFSET    : u8 = 0x10;
const POP                : u8 = 0x18;
const PEEK               : u8 = 0x19;
const PUSH               : u8 = 0x1A;
const SP                 : u8 = 0x1B;
const PC                 : u8 = 0x1C;
const OVERFLOW           : u8 = 0x1D;
const INDIRECT_NEXT      : u8 = 0x1E;
const NEXT               : u8 = 0x1F;
const LITERAL            : u8 = 0x20;
const MAXIMUM_OPERAND    : u8 = 0x3F;

/// The largest value that fits in an inline literal.
pub const MAXIMUM_INLINE_LITERAL: Word = (MAXIMUM_OPERAND - LITERAL) as Word;

/**
  A decoded operand. Word-extending modes carry the extra word they consume.

  Operands are pure syntax: what they refer to at run time is decided by the machine when it
  resolves them (see `crate::address::Slot`).
*/
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Operand {
  /// `A`
  Register(Register),
  /// `[A]`
  Indirect(Register),
  /// `[0x1000+A]`
  IndirectOffset(Register, Word),
  Pop,
  Peek,
  Push,
  Sp,
  Pc,
  /// The overflow register.
  O,
  /// `[0x1000]`
  IndirectNext(Word),
  /// `0x1000`, a literal stored in the following word.
  Next(Word),
  /// `0x1F`, a literal stored in the operand field itself.
  Literal(Word),
}

lazy_static! {
  /// The operand keywords of assembly source, already lowercased.
  pub static ref KEYWORDS: HashMap<&'static str, Operand> = {
    let mut keywords = HashMap::new();
    keywords.insert("pop",  Operand::Pop);
    keywords.insert("peek", Operand::Peek);
    keywords.insert("push", Operand::Push);
    keywords.insert("sp",   Operand::Sp);
    keywords.insert("pc",   Operand::Pc);
    keywords.insert("o",    Operand::O);
    keywords
  };
}

/// Whether decoding the operand encoding consumes one extra word from the instruction stream.
pub fn is_word_extending(code: u8) -> bool {
  match code {
    INDIRECT_OFFSET..=0x17 | INDIRECT_NEXT | NEXT => true,
    _ => false
  }
}

impl Operand {

  /// The six bit encoding of the operand.
  pub fn code(&self) -> u8 {
    match self {
      Operand::Register(r)          => REGISTER + r.idx() as u8,
      Operand::Indirect(r)          => INDIRECT + r.idx() as u8,
      Operand::IndirectOffset(r, _) => INDIRECT_OFFSET + r.idx() as u8,
      Operand::Pop                  => POP,
      Operand::Peek                 => PEEK,
      Operand::Push                 => PUSH,
      Operand::Sp                   => SP,
      Operand::Pc                   => PC,
      Operand::O                    => OVERFLOW,
      Operand::IndirectNext(_)      => INDIRECT_NEXT,
      Operand::Next(_)              => NEXT,
      Operand::Literal(value)       => LITERAL + *value as u8,
    }
  }

  /// The extra instruction word this operand occupies, if any.
  pub fn next_word(&self) -> Option<Word> {
    match self {
      | Operand::IndirectOffset(_, word)
      | Operand::IndirectNext(word)
      | Operand::Next(word) => Some(*word),
      _ => None
    }
  }

  /**
    Decodes an operand field. `next_word` is only consulted for word-extending encodings, and
    must be supplied for them.
  */
  pub fn decode(code: u8, next_word: Option<Word>) -> Result<Operand, DecodeError> {
    let register = |base: u8| {
      Register::try_from(code - base).map_err(|_| DecodeError::InvalidOperand { code })
    };
    let extra = || next_word.ok_or(DecodeError::InvalidOperand { code });

    let operand =
      match code {
        REGISTER..=0x07        => Operand::Register(register(REGISTER)?),
        INDIRECT..=0x0F        => Operand::Indirect(register(INDIRECT)?),
        INDIRECT_OFFSET..=0x17 => Operand::IndirectOffset(register(INDIRECT_OFFSET)?, extra()?),
        POP                    => Operand::Pop,
        PEEK                   => Operand::Peek,
        PUSH                   => Operand::Push,
        SP                     => Operand::Sp,
        PC                     => Operand::Pc,
        OVERFLOW               => Operand::O,
        INDIRECT_NEXT          => Operand::IndirectNext(extra()?),
        NEXT                   => Operand::Next(extra()?),
        LITERAL..=MAXIMUM_OPERAND => Operand::Literal((code - LITERAL) as Word),
        _                      => return Err(DecodeError::InvalidOperand { code }),
      };
    Ok(operand)
  }

  /// The smallest encoding of a literal value.
  pub fn literal(value: Word) -> Operand {
    match value <= MAXIMUM_INLINE_LITERAL {
      true  => Operand::Literal(value),
      false => Operand::Next(value)
    }
  }
}

// Next-word values print with four digits and inline literals with two, so the assembler
// can tell them apart when reading the text back.
impl Display for Operand {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Operand::Register(r)               => write!(f, "{}", r),
      Operand::Indirect(r)               => write!(f, "[{}]", r),
      Operand::IndirectOffset(r, offset) => write!(f, "[0x{:04X}+{}]", offset, r),
      Operand::Pop                       => write!(f, "POP"),
      Operand::Peek                      => write!(f, "PEEK"),
      Operand::Push                      => write!(f, "PUSH"),
      Operand::Sp                        => write!(f, "SP"),
      Operand::Pc                        => write!(f, "PC"),
      Operand::O                         => write!(f, "O"),
      Operand::IndirectNext(address)     => write!(f, "[0x{:04X}]", address),
      Operand::Next(value)               => write!(f, "0x{:04X}", value),
      Operand::Literal(value)            => write!(f, "0x{:02X}", value),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn every_encoding_decodes() {
    for code in 0..=MAXIMUM_OPERAND {
      let next = if is_word_extending(code) { Some(0x1234) } else { None };
      let operand = Operand::decode(code, next).unwrap();
      assert_eq!(operand.code(), code);
      assert_eq!(operand.next_word(), next);
    }
  }

  #[test]
  fn encodings_past_six_bits_are_rejected() {
    assert_eq!(Operand::decode(0x40, None), Err(DecodeError::InvalidOperand { code: 0x40 }));
  }

  #[test]
  fn word_extending_modes() {
    let extending: Vec<u8> = (0..=MAXIMUM_OPERAND).filter(|code| is_word_extending(*code)).collect();
    assert_eq!(extending, vec![0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x1E, 0x1F]);
  }

  #[test]
  fn literals_pick_the_short_form_when_they_fit() {
    assert_eq!(Operand::literal(0x1F), Operand::Literal(0x1F));
    assert_eq!(Operand::literal(0x20), Operand::Next(0x20));
    assert_eq!(Operand::Literal(0x1F).code(), 0x3F);
  }

  #[test]
  fn display() {
    assert_eq!(Operand::IndirectOffset(Register::I, 0x10).to_string(), "[0x0010+I]");
    assert_eq!(Operand::Literal(5).to_string(), "0x05");
    assert_eq!(Operand::Next(5).to_string(), "0x0005");
    assert_eq!(KEYWORDS.get("peek"), Some(&Operand::Peek));
  }
}
