//! Translates words back into assembly text.

use super::{decode_instruction, DecodeError, Word};

const INDENT: &str = "    ";

/**
  Disassembles a program into assembly text, one instruction per line.

  The instruction after a conditional is indented one level deeper than the conditional.
  Consecutive conditionals keep nesting, and each non-conditional instruction drops the next
  line back by one level. Undecodable words are an error rather than a warning, so that a
  corrupt image is noticed immediately.
*/
pub fn disassemble(words: &[Word]) -> Result<String, DecodeError> {
  let mut lines  = Vec::new();
  let mut offset = 0;
  let mut depth  = 0usize;

  while offset < words.len() {
    let (instruction, size) = decode_instruction(words, offset)?;
    lines.push(format!("{}{}", INDENT.repeat(depth), instruction));

    depth =
      match instruction.is_conditional() {
        true  => depth + 1,
        false => depth.saturating_sub(1)
      };
    offset += size;
  }

  Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::assemble;

  #[test]
  fn basic_listing() {
    let text = disassemble(&[0x7C01, 0x0030, 0xC002]).unwrap();
    assert_eq!(text, "SET A, 0x0030\nADD A, 0x10");
  }

  #[test]
  fn conditional_targets_are_indented() {
    let words = assemble("ife a, b\nset a, 1\nset b, 2").unwrap();
    assert_eq!(disassemble(&words).unwrap(), "IFE A, B\n    SET A, 0x01\nSET B, 0x02");
  }

  #[test]
  fn indentation_accumulates_and_decays() {
    let words = assemble("ife a, b\nifn a, c\nset a, 1\nset b, 2\nset c, 3").unwrap();
    let expected = [
      "IFE A, B",
      "    IFN A, C",
      "        SET A, 0x01",
      "    SET B, 0x02",
      "SET C, 0x03",
    ].join("\n");
    assert_eq!(disassemble(&words).unwrap(), expected);
  }

  #[test]
  fn word_extending_operands_are_consumed() {
    let text = disassemble(&[0x7DE1, 0x1000, 0x0020, 0x7C10, 0x0000]).unwrap();
    assert_eq!(text, "SET [0x1000], 0x0020\nJSR 0x0000");
  }

  #[test]
  fn text_reassembles_to_the_same_words() {
    let source = "\
      :start set a, 0x30\n\
      set [0x1000+i], 4\n\
      ifg a, 0x0003\n\
        jsr start\n\
      set push, [b]\n\
      hlt a";
    let words = assemble(source).unwrap();
    let text  = disassemble(&words).unwrap();
    assert_eq!(assemble(&text), Ok(words));
  }

  #[test]
  fn unknown_opcodes_fail() {
    assert_eq!(
      disassemble(&[0x0001, 0x03F0]),
      Err(DecodeError::UnknownOpcode { word: 0x03F0, offset: 1 })
    );
  }

  #[test]
  fn truncated_programs_fail() {
    assert_eq!(disassemble(&[0x7C01]), Err(DecodeError::UnexpectedEnd { offset: 0 }));
  }
}
