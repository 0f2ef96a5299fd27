/*!
  This module is responsible for the encoding and decoding of binary instructions.

*/

use super::{is_word_extending, Instruction, Operand, Operation, Special};

// If you change this you must also change `encode_instruction` and `decode_instruction`.
pub type Word = u16;

const OPCODE_MASK  : Word = 0x000F;
const FIELD_MASK   : Word = 0x003F;
const A_SHIFT      : u32  = 4;
const B_SHIFT      : u32  = 10;

/// An encoded instruction is one, two, or three words long depending on how many of its
/// operands are word-extending.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum EncodedInstruction {
  Word(Word),
  DoubleWord(Word, Word),
  TripleWord(Word, Word, Word),
}

impl EncodedInstruction {
  pub fn len(&self) -> usize {
    match self {
      EncodedInstruction::Word(_)             => 1,
      EncodedInstruction::DoubleWord(_, _)    => 2,
      EncodedInstruction::TripleWord(_, _, _) => 3,
    }
  }

  pub fn to_vec(&self) -> Vec<Word> {
    match *self {
      EncodedInstruction::Word(w)             => vec![w],
      EncodedInstruction::DoubleWord(w, x)    => vec![w, x],
      EncodedInstruction::TripleWord(w, x, y) => vec![w, x, y],
    }
  }
}

/// An error that occurred while reading instructions out of a word stream.
#[derive(thiserror::Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum DecodeError {
  #[error("unknown opcode in word 0x{word:04X} at offset 0x{offset:04X}")]
  UnknownOpcode { word: Word, offset: usize },

  #[error("instruction at offset 0x{offset:04X} runs past the end of the program")]
  UnexpectedEnd { offset: usize },

  #[error("operand encoding 0x{code:02X} is not defined")]
  InvalidOperand { code: u8 },
}

/**
  Encodes the instruction into bytecode. Operand A occupies bits [9:4] of a basic instruction
  and bits [15:10] of a non-basic one; operand B always occupies bits [15:10]. Extra words
  follow the instruction word in operand order.
*/
pub fn encode_instruction(instruction: &Instruction) -> EncodedInstruction {
  let (word, operands) =
    match instruction {

      Instruction::Basic { opcode, a, b } => {
        // [B:6][A:6][Opcode:4]
        let word =
          (opcode.code() as Word)
            | ((a.code() as Word) << A_SHIFT)
            | ((b.code() as Word) << B_SHIFT);
        (word, [Some(*a), Some(*b)])
      }

      Instruction::NonBasic { opcode, a } => {
        // [A:6][Opcode:6][0000]
        let word =
          ((opcode.code() as Word) << A_SHIFT)
            | ((a.code() as Word) << B_SHIFT);
        (word, [Some(*a), None])
      }

    };

  let mut extra = operands.iter().flatten().filter_map(Operand::next_word);
  match (extra.next(), extra.next()) {
    (None, _)          => EncodedInstruction::Word(word),
    (Some(x), None)    => EncodedInstruction::DoubleWord(word, x),
    (Some(x), Some(y)) => EncodedInstruction::TripleWord(word, x, y),
  }
}

/// The operand fields of an instruction word, in operand order.
fn operand_codes(word: Word) -> (u8, Option<u8>) {
  let high = ((word >> B_SHIFT) & FIELD_MASK) as u8;
  match word & OPCODE_MASK {
    0 => (high, None),
    _ => (((word >> A_SHIFT) & FIELD_MASK) as u8, Some(high)),
  }
}

/**
  Returns the size in WORDS of the instruction whose first word is given. This is how to
  determine how far to skip without decoding the rest of the instruction.

  Note that this function does not check if the word has a valid opcode.
*/
pub fn instruction_size(word: Word) -> usize {
  let (a, b) = operand_codes(word);
  let extending = |code: u8| if is_word_extending(code) { 1 } else { 0 };
  1 + extending(a) + b.map_or(0, extending)
}

/**
  Decodes the instruction starting at `offset`, returning it with its size in words.
*/
pub fn decode_instruction(words: &[Word], offset: usize) -> Result<(Instruction, usize), DecodeError> {
  let word = *words.get(offset).ok_or(DecodeError::UnexpectedEnd { offset })?;
  let mut cursor = offset + 1;

  let mut operand = |code: u8| -> Result<Operand, DecodeError> {
    let next_word =
      match is_word_extending(code) {
        true  => {
          let next = *words.get(cursor).ok_or(DecodeError::UnexpectedEnd { offset })?;
          cursor += 1;
          Some(next)
        }
        false => None
      };
    Operand::decode(code, next_word)
  };

  let instruction =
    match operand_codes(word) {

      (a, Some(b)) => {
        let opcode = Operation::from_code((word & OPCODE_MASK) as u8)
          .ok_or(DecodeError::UnknownOpcode { word, offset })?;
        let a = operand(a)?;
        let b = operand(b)?;
        Instruction::Basic { opcode, a, b }
      }

      (a, None) => {
        let opcode = Special::from_code(((word >> A_SHIFT) & FIELD_MASK) as u8)
          .ok_or(DecodeError::UnknownOpcode { word, offset })?;
        let a = operand(a)?;
        Instruction::NonBasic { opcode, a }
      }

    };

  Ok((instruction, cursor - offset))
}
