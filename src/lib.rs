//! An assembler, disassembler and interpreter for the DCPU-16, a 16 bit virtual CPU.
//!
//! ```
//! use dcpu::bytecode::{assemble, disassemble, Register};
//! use dcpu::cpu::Machine;
//!
//! let program = assemble("set a, 0x30\nadd a, 0x10\nhlt a").unwrap();
//! let machine = Machine::execute(&program).unwrap();
//! assert_eq!(machine.register(Register::A), 0x40);
//! assert_eq!(disassemble(&program).unwrap(), "SET A, 0x0030\nADD A, 0x10\nHLT A");
//! ```

#[macro_use] extern crate prettytable;
#[macro_use] extern crate lazy_static;

pub mod address;
pub mod bytecode;
pub mod cpu;
pub mod image;
pub mod symboltable;
