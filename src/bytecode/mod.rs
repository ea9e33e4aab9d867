/*!

  The VM uses a 32 bit word. Instructions are bit-packed: every field is written least
  significant bit first directly after the previous one, with no alignment between fields or
  between instructions. Each instruction is a 7 bit opcode, its operands in the order and
  widths given by the `InstructionSet`, and a run of reserved zero bits that brings it to a
  whole number of bytes:

    LOAD   (10): [OpCode:7][DestReg:3][Const:24][Reserved:6]          5 bytes
    READ   (54): [OpCode:7][SrcAddrReg:32][DestReg:3][Reserved:6]     6 bytes
    WRITE  (39): [OpCode:7][DestReg:3][SrcReg:3][Reserved:3]          2 bytes
    POPCNT (18): [OpCode:7][DestAddrReg:3][SrcMemAddr:32][Reserved:6] 6 bytes

  The decoder has no way to find instruction boundaries other than the descriptor, so the
  reserved bits are checked on decode. A nonzero reserved field means the stream is not in
  step with the table.

  Instructions are held unencoded as an `Operation` plus a vector of operand values rather
  than one enum variant per opcode. The layout lives in one place, the descriptor, and the
  assembler, disassembler and machine all walk it the same way.

*/

mod assembly;
mod binary;
mod bitstream;
mod instruction;

// Registers and memory cells each hold one `Word`.
pub type Word = u32;

pub use assembly::{assemble, disassemble, parse_line, Assembly, LogEntry, ParsedLine, COMMENT_CHAR};
pub use binary::{decode_instruction, encode_instruction};
pub use bitstream::{BitReader, BitStreamError, BitWriter, MAX_FIELD_WIDTH};
pub use instruction::{
  all_operations, DescriptorError, Instruction, InstructionFormat, InstructionSet, OperandField,
  Operation, MAX_OPERAND_WIDTH, OPCODE_WIDTH, STANDARD_INSTRUCTION_SET
};
