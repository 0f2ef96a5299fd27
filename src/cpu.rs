//! Structures and functions for the machine itself: register and memory storage and the
//! fetch-decode-execute loop.

use std::fmt::{Display, Formatter};

use prettytable::{format as TableFormat, Table};

use crate::address::*;
use crate::bytecode::*;
use crate::image::{self, ImageError};

/// Every word is addressable.
pub const MEMORY_SIZE     : usize = 0x10000;
/// The first word of the display peripheral's framebuffer.
pub const VIDEO_RAM       : Word  = 0x8000;
/// 32 columns by 16 rows.
pub const VIDEO_RAM_SIZE  : usize = 32 * 16;
/// The initial stack pointer.
pub const STACK_TOP       : Word  = 0xFFFF;

const PC                : usize = 8;
const SP                : usize = 9;
const O                 : usize = 10;
const REGISTER_COUNT    : usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
  Active,
  Halted,
}

/// An error that stopped execution. The machine's state afterward should not be trusted.
#[derive(thiserror::Error, Debug)]
pub enum RuntimeError {
  #[error("operand encoding 0x{code:02X} is not defined (PC = 0x{pc:04X})")]
  InvalidOperand { code: u8, pc: Word },

  #[error("unknown opcode in word 0x{word:04X} (PC = 0x{pc:04X})")]
  UnknownOpcode { word: Word, pc: Word },

  #[error("a program of {words} words does not fit in memory")]
  ImageTooLarge { words: usize },

  #[error("machine is halted")]
  MachineHalted,

  #[error(transparent)]
  Image(#[from] ImageError),
}

/// How an operand is resolved. Skipped instructions resolve without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
  Execute,
  Skip,
}

/**
  The machine. Registers and memory are plain word arrays; operands resolve to a `Slot`
  naming one of their cells (or an immediate), and every write goes through `write_slot`.
*/
pub struct Machine {
  memory    : Box<[Word]>,
  registers : [Word; REGISTER_COUNT], // A B C X Y Z I J PC SP O
  cycles    : u64,
  state     : State,
}

impl Machine {

  // region Display methods

  fn make_register_table<T>(
      rows      : &[(String, T)],
      highlight : Option<usize>
    ) -> Table
    where T: Display
  {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Address", ubl->"Contents"]);

    for (i, (name, cell)) in rows.iter().enumerate() {
      match Some(i) == highlight {

        true  => {
          table.add_row(row![r->format!("* --> {} =", name), format!("{}", cell)]);
        }

        false => {
          table.add_row(row![r->format!("{} =", name), format!("{}", cell)]);
        }

      } // end match on highlight
    } // end for
    table
  }

  fn register_rows(&self) -> Vec<(String, String)> {
    let mut rows: Vec<(String, String)> =
      ["A", "B", "C", "X", "Y", "Z", "I", "J", "PC", "SP", "O"]
        .iter()
        .zip(self.registers.iter())
        .map(|(name, value)| (name.to_string(), format!("0x{:04X}", value)))
        .collect();
    rows.push(("Cycles".to_string(), self.cycles.to_string()));
    rows
  }

  /// The words around the program counter.
  fn program_rows(&self) -> (Vec<(String, String)>, usize) {
    let pc    = self.pc() as usize;
    let start = pc.saturating_sub(4);
    let end   = (start + 9).min(MEMORY_SIZE);
    let rows  =
      (start..end)
        .map(|address| (format!("M[0x{:04X}]", address), format!("0x{:04X}", self.memory[address])))
        .collect();
    (rows, pc - start)
  }

  /// The top of the stack, nearest word first.
  fn stack_rows(&self) -> Vec<(String, String)> {
    let sp = self.sp() as usize;
    (sp..MEMORY_SIZE)
      .take(8)
      .map(|address| (format!("M[0x{:04X}]", address), format!("0x{:04X}", self.memory[address])))
      .collect()
  }

  // endregion

  // region Low-level utility methods

  /// Create a new machine with zeroed memory and registers, and an empty stack.
  pub fn new() -> Machine {
    let mut registers = [0; REGISTER_COUNT];
    registers[SP] = STACK_TOP;
    Machine {
      memory    : vec![0; MEMORY_SIZE].into_boxed_slice(),
      registers,
      cycles    : 0,
      state     : State::Active,
    }
  }

  pub fn register(&self, register: Register) -> Word {
    self.registers[register.idx()]
  }

  pub fn pc(&self) -> Word {
    self.registers[PC]
  }

  pub fn sp(&self) -> Word {
    self.registers[SP]
  }

  /// The overflow register.
  pub fn overflow(&self) -> Word {
    self.registers[O]
  }

  pub fn cycles(&self) -> u64 {
    self.cycles
  }

  pub fn state(&self) -> State {
    self.state
  }

  pub fn is_halted(&self) -> bool {
    self.state == State::Halted
  }

  pub fn read(&self, address: Word) -> Word {
    self.memory[address as usize]
  }

  pub fn memory(&self) -> &[Word] {
    &self.memory
  }

  /// The display peripheral's view of memory. It is ordinary memory with no write barrier.
  pub fn framebuffer(&self) -> &[Word] {
    let start = VIDEO_RAM as usize;
    &self.memory[start..start + VIDEO_RAM_SIZE]
  }

  fn read_slot(&self, slot: Slot) -> Word {
    match slot {
      Slot::Register(i)     => self.registers[i],
      Slot::Memory(address) => self.memory[address as usize],
      Slot::Immediate(v)    => v,
    }
  }

  /// Writes to immediates are dropped.
  fn write_slot(&mut self, slot: Slot, value: Word) {
    match slot {
      Slot::Register(i)     => self.registers[i] = value,
      Slot::Memory(address) => self.memory[address as usize] = value,
      Slot::Immediate(_)    => {}
    }
  }

  /// Reads the word at PC and advances PC.
  fn fetch(&mut self) -> Word {
    let word = self.memory[self.registers[PC] as usize];
    self.registers[PC] = self.registers[PC].wrapping_add(1);
    word
  }

  // endregion

  // region Loading

  /**
    Copies a program into memory starting at address zero, zeroes the rest of memory, and
    resets the registers. The machine is ready to run afterward.
  */
  pub fn mount(&mut self, program: &[Word]) -> Result<(), RuntimeError> {
    if program.len() > MEMORY_SIZE {
      return Err(RuntimeError::ImageTooLarge { words: program.len() });
    }
    *self = Machine::new();
    self.memory[..program.len()].copy_from_slice(program);
    Ok(())
  }

  /// Mounts a big-endian binary image.
  pub fn mount_bytes(&mut self, bytes: &[u8]) -> Result<(), RuntimeError> {
    let program = image::from_bytes(bytes)?;
    self.mount(&program)
  }

  /// Mounts and runs a program on a fresh machine, returning the machine in its final state.
  pub fn execute(program: &[Word]) -> Result<Machine, RuntimeError> {
    let mut machine = Machine::new();
    machine.mount(program)?;
    machine.run()?;
    Ok(machine)
  }

  // endregion

  // region Execution

  /**
    Runs until the halt instruction. A program that never halts never returns; callers that
    need a bound should drive `step` themselves.
  */
  pub fn run(&mut self) -> Result<(), RuntimeError> {
    while self.step()? == State::Active {}
    Ok(())
  }

  /// Executes exactly one instruction.
  pub fn step(&mut self) -> Result<State, RuntimeError> {
    if self.state == State::Halted {
      return Err(RuntimeError::MachineHalted);
    }

    #[cfg(feature = "trace_execution")] self.trace();

    let pc   = self.pc();
    let word = self.fetch();

    match Operation::from_code((word & 0xF) as u8) {
      Some(operation) => self.execute_basic(operation, word, pc)?,
      None            => self.execute_non_basic(word, pc)?,
    }

    #[cfg(feature = "trace_execution")] println!("{}", self);

    Ok(self.state)
  }

  /**
    Resolves an operand to the slot it names. In `Access::Execute` mode stack operands move SP
    and word-extending operands charge a cycle for their extra fetch. In `Access::Skip` mode
    only PC moves, past any extra word.
  */
  fn resolve(&mut self, code: u8, access: Access, pc: Word) -> Result<Slot, RuntimeError> {
    let execute = access == Access::Execute;
    let next_word = |machine: &mut Machine| {
      if execute {
        machine.cycles += 1;
      }
      machine.fetch()
    };

    let slot =
      match code {
        0x00..=0x07 => Slot::Register(code as usize),
        0x08..=0x0F => Slot::Memory(self.registers[(code - 0x08) as usize]),
        0x10..=0x17 => {
          let offset = next_word(self);
          Slot::Memory(self.registers[(code - 0x10) as usize].wrapping_add(offset))
        }
        // POP
        0x18 => {
          let sp = self.registers[SP];
          if execute {
            self.registers[SP] = sp.wrapping_add(1);
          }
          Slot::Memory(sp)
        }
        // PEEK
        0x19 => Slot::Memory(self.registers[SP]),
        // PUSH
        0x1A => {
          if execute {
            self.registers[SP] = self.registers[SP].wrapping_sub(1);
          }
          Slot::Memory(self.registers[SP])
        }
        0x1B => Slot::Register(SP),
        0x1C => Slot::Register(PC),
        0x1D => Slot::Register(O),
        0x1E => Slot::Memory(next_word(self)),
        0x1F => Slot::Immediate(next_word(self)),
        0x20..=0x3F => Slot::Immediate((code - 0x20) as Word),
        _ => return Err(RuntimeError::InvalidOperand { code, pc }),
      };
    Ok(slot)
  }

  fn execute_basic(&mut self, operation: Operation, word: Word, pc: Word) -> Result<(), RuntimeError> {
    let a = self.resolve(((word >> 4) & 0x3F) as u8, Access::Execute, pc)?;
    let b = self.resolve(((word >> 10) & 0x3F) as u8, Access::Execute, pc)?;
    let a_value = self.read_slot(a) as u32;
    let b_value = self.read_slot(b) as u32;

    self.cycles += operation.cycles();

    // (result, overflow) for operations that write back; conditionals return early.
    let (result, overflow): (u32, Option<u32>) =
      match operation {
        Operation::Set => (b_value, None),

        Operation::Add => {
          let sum = a_value + b_value;
          (sum, Some(if sum > 0xFFFF { 0x0001 } else { 0 }))
        }

        Operation::Sub => {
          let borrow = b_value > a_value;
          (a_value.wrapping_sub(b_value), Some(if borrow { 0xFFFF } else { 0 }))
        }

        Operation::Mul => {
          let product = a_value * b_value;
          (product, Some(product >> 16))
        }

        Operation::Div => {
          match b_value {
            0 => (0, Some(0)),
            _ => {
              let quotient = a_value / b_value;
              (quotient, Some((quotient << 16) / b_value))
            }
          }
        }

        Operation::Mod => {
          match b_value {
            0 => (0, None),
            _ => (a_value % b_value, None),
          }
        }

        Operation::Shl => {
          let shifted = (a_value as u64).checked_shl(b_value).unwrap_or(0);
          (shifted as u32, Some((shifted >> 16) as u32))
        }

        Operation::Shr => {
          let shifted  = a_value.checked_shr(b_value).unwrap_or(0);
          let shed     = ((a_value as u64) << 16).checked_shr(b_value).unwrap_or(0);
          (shifted, Some(shed as u32))
        }

        Operation::And => (a_value & b_value, None),
        Operation::Bor => (a_value | b_value, None),
        Operation::Xor => (a_value ^ b_value, None),

        Operation::Ife => return self.branch(a_value == b_value, pc),
        Operation::Ifn => return self.branch(a_value != b_value, pc),
        Operation::Ifg => return self.branch(a_value > b_value, pc),
        Operation::Ifb => return self.branch(a_value & b_value != 0, pc),
      };

    // An immediate destination drops the whole mutation, overflow included. When the
    // destination is O itself, the overflow write lands last and wins.
    if a.is_writable() {
      self.write_slot(a, (result & 0xFFFF) as Word);
      if let Some(overflow) = overflow {
        self.registers[O] = (overflow & 0xFFFF) as Word;
      }
    }
    Ok(())
  }

  /// Skips the next instruction unless `condition` holds.
  fn branch(&mut self, condition: bool, pc: Word) -> Result<(), RuntimeError> {
    if condition {
      return Ok(());
    }

    let word = self.fetch();
    let a_code = ((word >> 4) & 0x3F) as u8;
    let b_code = ((word >> 10) & 0x3F) as u8;
    match word & 0xF {
      0 => {
        self.resolve(b_code, Access::Skip, pc)?;
      }
      _ => {
        self.resolve(a_code, Access::Skip, pc)?;
        self.resolve(b_code, Access::Skip, pc)?;
      }
    }
    self.cycles += 1;
    Ok(())
  }

  fn execute_non_basic(&mut self, word: Word, pc: Word) -> Result<(), RuntimeError> {
    let special = Special::from_code(((word >> 4) & 0x3F) as u8)
      .ok_or(RuntimeError::UnknownOpcode { word, pc })?;
    let a = self.resolve(((word >> 10) & 0x3F) as u8, Access::Execute, pc)?;
    let target = self.read_slot(a);

    self.cycles += special.cycles();

    match special {

      Special::Halt => {
        self.state = State::Halted;
      }

      Special::Jsr => {
        let sp = self.registers[SP].wrapping_sub(1);
        self.registers[SP] = sp;
        self.memory[sp as usize] = self.registers[PC];
        self.registers[PC] = target;
      }

    }
    Ok(())
  }

  #[cfg(feature = "trace_execution")]
  fn trace(&self) {
    let pc = self.pc() as usize;
    match decode_instruction(&self.memory, pc) {
      Ok((instruction, _)) => println!("0x{:04X}: {}", pc, instruction),
      Err(e)               => println!("0x{:04X}: {}", pc, e),
    }
  }

  // endregion
}

impl Default for Machine {
  fn default() -> Self {
    Self::new()
  }
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
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let (program, pc_row) = self.program_rows();
    let r_table = Machine::make_register_table(&self.register_rows(), None);
    let p_table = Machine::make_register_table(&program, Some(pc_row));
    let s_table = Machine::make_register_table(&self.stack_rows(), Some(0));

    let mut combined_table = table!([r_table, p_table, s_table]);

    combined_table.set_titles(row![ub->"Registers", ub->"Program", ub->"Stack"]);
    combined_table.set_format(*TABLE_DISPLAY_FORMAT);

    let state = match self.state {
      State::Active => "Running.",
      State::Halted => "Halted.",
    };

    write!(f, "{}\n{}", state, combined_table)
  }
}
