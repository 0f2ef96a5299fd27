#![allow(dead_code)]

use dcpu::bytecode::{assemble, is_word_extending, Word};
use dcpu::cpu::{Machine, State};

pub fn machine_for(source: &str) -> Machine {
  let program = assemble(source).unwrap();
  let mut machine = Machine::new();
  machine.mount(&program).unwrap();
  machine
}

pub fn run(source: &str) -> Machine {
  let mut machine = machine_for(source);
  machine.run().unwrap();
  machine
}

/// Steps `count` instructions, asserting the machine stays active throughout.
pub fn step(machine: &mut Machine, count: usize) {
  for _ in 0..count {
    assert_eq!(machine.step().unwrap(), State::Active);
  }
}

/**
  Packs one instruction from raw fields. `opcode` is folded into the valid range of the chosen
  kind (1..=15 for basic, 0..=1 for non-basic) and the operand codes into six bits. `extra`
  supplies the following words, one per word-extending operand.
*/
pub fn instruction_words(basic: bool, opcode: u16, a: u8, b: u8, extra: [Word; 2]) -> Vec<Word> {
  let (a, b) = (a & 0x3F, b & 0x3F);
  let (word, codes) =
    match basic {
      true  => (1 + opcode % 15 | (a as Word) << 4 | (b as Word) << 10, vec![a, b]),
      false => ((opcode % 2) << 4 | (a as Word) << 10, vec![a]),
    };

  let mut words = vec![word];
  let mut extra = extra.iter();
  for code in codes {
    if is_word_extending(code) {
      words.extend(extra.next());
    }
  }
  words
}
