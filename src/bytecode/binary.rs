/*!
  This module is responsible for the encoding and decoding of binary instructions. Both
  directions walk the same `InstructionFormat`, field by field.
*/

use super::{BitReader, BitWriter, Instruction, InstructionFormat, InstructionSet,
            Word, OPCODE_WIDTH};
use crate::error::{ExecutionError, Malformation};

/**
  Encodes the instruction onto the end of `writer`: opcode, operands in format order, then the
  reserved zero bits.

  It is the caller's responsibility to pass the format belonging to `instruction.operation`
  and operands that fit their fields; the assembler checks both before calling this. Excess
  high bits of an operand are dropped by the writer.
*/
pub fn encode_instruction(
  writer      : &mut BitWriter,
  format      : &InstructionFormat,
  instruction : &Instruction
) {
  debug_assert_eq!(format.operation, instruction.operation);
  debug_assert_eq!(format.arity(), instruction.operands.len());

  writer.write(instruction.operation.code() as u64, OPCODE_WIDTH);
  for (field, value) in format.operands.iter().zip(&instruction.operands) {
    writer.write(*value as u64, field.width);
  }
  writer.write(0, format.reserved);
}

/**
  Decodes the instruction starting at the reader's cursor.

  Fails with `UnknownOpcode` if the opcode is not in `set`, and with `MalformedInstruction` if
  the stream ends inside the instruction or its reserved bits are not zero. The reported
  `bit_offset` is the position of the opcode.
*/
pub fn decode_instruction(
  reader : &mut BitReader,
  set    : &InstructionSet
) -> Result<Instruction, ExecutionError> {
  let bit_offset = reader.position();
  let malformed = move |reason: Malformation| {
    ExecutionError::MalformedInstruction { bit_offset, reason }
  };

  let code = reader.read(OPCODE_WIDTH).map_err(|e| malformed(e.into()))? as u8;
  let format = set.format_for_code(code)
                  .ok_or(ExecutionError::UnknownOpcode { code, bit_offset })?;

  let mut operands: Vec<Word> = Vec::with_capacity(format.arity());
  for field in &format.operands {
    let value = reader.read(field.width).map_err(|e| malformed(e.into()))?;
    operands.push(value as Word);
  }

  let reserved = reader.read(format.reserved).map_err(|e| malformed(e.into()))?;
  if reserved != 0 {
    return Err(malformed(Malformation::ReservedBits(reserved)));
  }

  Ok(Instruction::new(format.operation, operands))
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::{Operation, STANDARD_INSTRUCTION_SET};
  use proptest::prelude::*;

  fn encode(instruction: &Instruction) -> Vec<u8> {
    let mut writer = BitWriter::new();
    let format = STANDARD_INSTRUCTION_SET.format(instruction.operation).unwrap();
    encode_instruction(&mut writer, format, instruction);
    writer.finish()
  }

  #[test]
  fn reference_encodings(){
    let cases = vec![
      (Instruction::new(Operation::Load,   vec![6, 632]), vec![0x0a, 0xe3, 0x09, 0x00, 0x00]),
      (Instruction::new(Operation::Read,   vec![328, 3]), vec![0x36, 0xa4, 0x00, 0x00, 0x80, 0x01]),
      (Instruction::new(Operation::Write,  vec![1, 5]),   vec![0xa7, 0x14]),
      (Instruction::new(Operation::Popcnt, vec![6, 310]), vec![0x12, 0xdb, 0x04, 0x00, 0x00, 0x00]),
    ];
    for (instruction, bytes) in cases {
      assert_eq!(encode(&instruction), bytes, "{}", instruction);

      let mut reader = BitReader::new(&bytes);
      assert_eq!(decode_instruction(&mut reader, &STANDARD_INSTRUCTION_SET), Ok(instruction));
      assert!(reader.is_at_end());
    }
  }

  #[test]
  fn unknown_opcode(){
    let bytes = [0x00, 0x00];
    let mut reader = BitReader::new(&bytes);
    assert_eq!(
      decode_instruction(&mut reader, &STANDARD_INSTRUCTION_SET),
      Err(ExecutionError::UnknownOpcode { code: 0, bit_offset: 0 })
    );
  }

  #[test]
  fn truncated_instruction(){
    let bytes = encode(&Instruction::new(Operation::Load, vec![6, 632]));
    let mut reader = BitReader::new(&bytes[..3]);
    let result = decode_instruction(&mut reader, &STANDARD_INSTRUCTION_SET);
    assert!(
      matches!(
        result,
        Err(ExecutionError::MalformedInstruction { bit_offset: 0, reason: Malformation::Truncated(_) })
      ),
      "{:?}", result
    );
  }

  #[test]
  fn nonzero_reserved_bits(){
    let mut bytes = encode(&Instruction::new(Operation::Write, vec![1, 5]));
    bytes[1] |= 0b1000_0000;
    let mut reader = BitReader::new(&bytes);
    assert_eq!(
      decode_instruction(&mut reader, &STANDARD_INSTRUCTION_SET),
      Err(ExecutionError::MalformedInstruction {
        bit_offset : 0,
        reason     : Malformation::ReservedBits(0b100)
      })
    );
  }

  #[test]
  fn instructions_pack_back_to_back(){
    let program = vec![
      Instruction::new(Operation::Write,  vec![7, 0]),
      Instruction::new(Operation::Popcnt, vec![2, u32::MAX]),
      Instruction::new(Operation::Load,   vec![3, 0xFF_FFFF]),
    ];
    let mut writer = BitWriter::new();
    for instruction in &program {
      let format = STANDARD_INSTRUCTION_SET.format(instruction.operation).unwrap();
      encode_instruction(&mut writer, format, instruction);
    }
    assert_eq!(writer.bit_len(), 16 + 48 + 40);
    let bytes = writer.finish();

    let mut reader = BitReader::new(&bytes);
    let mut decoded = vec![];
    while !reader.is_at_end() {
      decoded.push(decode_instruction(&mut reader, &STANDARD_INSTRUCTION_SET).unwrap());
    }
    assert_eq!(decoded, program);
  }

  fn any_instruction() -> impl Strategy<Value = Instruction> {
    prop_oneof![
      (0u32..8, 0u32..(1 << 24)).prop_map(|(r, c)| Instruction::new(Operation::Load, vec![r, c])),
      (any::<u32>(), 0u32..8).prop_map(|(a, r)| Instruction::new(Operation::Read, vec![a, r])),
      (0u32..8, 0u32..8).prop_map(|(d, s)| Instruction::new(Operation::Write, vec![d, s])),
      (0u32..8, any::<u32>()).prop_map(|(r, a)| Instruction::new(Operation::Popcnt, vec![r, a])),
    ]
  }

  proptest! {
    #[test]
    fn decode_inverts_encode(program in prop::collection::vec(any_instruction(), 1..16)){
      let mut writer = BitWriter::new();
      for instruction in &program {
        let format = STANDARD_INSTRUCTION_SET.format(instruction.operation).unwrap();
        encode_instruction(&mut writer, format, instruction);
      }
      let bytes = writer.finish();

      let mut reader = BitReader::new(&bytes);
      for instruction in &program {
        prop_assert_eq!(&decode_instruction(&mut reader, &STANDARD_INSTRUCTION_SET).unwrap(), instruction);
      }
      prop_assert!(reader.is_at_end());
    }
  }
}
