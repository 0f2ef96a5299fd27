/*!

  The machine uses a 16 bit word for everything: memory cells, registers and instructions.
  An instruction is one to three words long. The first word holds the opcode and the operand
  encodings, and each word-extending operand consumes one additional word, in operand order.

    Basic:      [B:6][A:6][Opcode:4]      (opcode != 0)
    Non-basic:  [A:6][Opcode:6][0000]

  Non-basic opcode 0 halts the machine.

  Operand encodings are six bits wide:

    0x00-0x07   register
    0x08-0x0F   [register]
    0x10-0x17   [next word + register]     (word-extending)
    0x18        POP
    0x19        PEEK
    0x1A        PUSH
    0x1B        SP
    0x1C        PC
    0x1D        O
    0x1E        [next word]                (word-extending)
    0x1F        next word (literal)        (word-extending)
    0x20-0x3F   literal 0x00-0x1F

  Textual assembly is translated to bytecode by `assembly` and back again by `disassembly`.
  Both go through `binary`, so the two directions cannot drift apart.

*/

mod assembly;
mod binary;
mod disassembly;
mod instruction;
mod operand;

pub use assembly::{assemble, AssemblyError, MAXIMUM_INSTRUCTIONS, MAXIMUM_LABELS, MINIMUM_LABEL_LENGTH};
pub use binary::{decode_instruction, encode_instruction, instruction_size, DecodeError, EncodedInstruction, Word};
pub use disassembly::disassemble;
pub use instruction::{Instruction, Mnemonic, Operation, Special};
pub use operand::{is_word_extending, Operand, Register, KEYWORDS};
