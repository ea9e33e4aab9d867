/*!
  The human readable textual form of bytecode is called assembly. One instruction per line:

  ```text
  # comment
  LOAD 1 5
  write 1 1     # trailing comment
  ```

  The mnemonic is matched without regard to case through the `strum` derives on `Operation`.
  Operands are non-negative decimal integers separated by whitespace, one per field of the
  instruction's format, in field order.
*/

use nom::{
  bytes::complete::{take_till1, take_while, take_while1},
  character::complete::{char as one_char, digit1},
  combinator::{all_consuming, eof, opt, rest},
  error::Error as NomError,
  multi::many0,
  sequence::{pair, preceded, terminated, tuple},
  Err as NomErr,
  IResult
};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

use super::{decode_instruction, encode_instruction, BitReader, BitWriter, Instruction,
            InstructionFormat, InstructionSet, Operation, Word};
use crate::error::{AssemblyError, ExecutionError};

pub const COMMENT_CHAR: char = '#';

/// A source line split into whitespace separated tokens. Nothing has been resolved yet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedLine<'a> {
  pub mnemonic : &'a str,
  pub operands : Vec<&'a str>
}

fn token(input: &str) -> IResult<&str, &str> {
  take_till1(|c: char| c.is_whitespace() || c == COMMENT_CHAR)(input)
}

fn space0(input: &str) -> IResult<&str, &str> {
  take_while(char::is_whitespace)(input)
}

fn space1(input: &str) -> IResult<&str, &str> {
  take_while1(char::is_whitespace)(input)
}

fn comment(input: &str) -> IResult<&str, &str> {
  preceded(one_char(COMMENT_CHAR), rest)(input)
}

/**
  Splits one line of assembly into tokens at any Unicode whitespace. Returns `Ok(None)` for
  blank and comment-only lines.

  Every character is whitespace, part of a comment or part of a token, so the grammar accepts
  any line; whether the tokens mean anything is decided by `assemble`.
*/
pub fn parse_line(text: &str) -> Result<Option<ParsedLine<'_>>, NomErr<NomError<&str>>> {
  let tokens_p = pair(token, many0(preceded(space1, token)));
  let line_p = preceded(
    space0,
    terminated(opt(tokens_p), tuple((space0, opt(comment), eof)))
  );

  let (_rest, tokens) = all_consuming(line_p)(text)?;
  Ok(tokens.map(|(mnemonic, operands)| ParsedLine { mnemonic, operands }))
}

fn is_decimal(token: &str) -> bool {
  let digits: IResult<&str, &str> = all_consuming(digit1)(token);
  digits.is_ok()
}

/// Resolves and range checks a parsed line against the instruction set. No bits are written.
fn resolve_line<'s>(
  line   : usize,
  parsed : &ParsedLine,
  set    : &'s InstructionSet
) -> Result<(&'s InstructionFormat, Instruction), AssemblyError> {
  let format = set.format_for_mnemonic(parsed.mnemonic)
                  .ok_or_else(|| AssemblyError::UnknownOpcode {
                    line,
                    name: parsed.mnemonic.to_string()
                  })?;
  let operation = format.operation;

  if let Some(token) = parsed.operands.iter().find(|token| !is_decimal(token)) {
    return Err(AssemblyError::InvalidOperand { line, token: token.to_string() });
  }

  if parsed.operands.len() != format.arity() {
    return Err(
      AssemblyError::ArityError {
        line,
        operation,
        expected : format.arity(),
        given    : parsed.operands.len()
      }
    );
  }

  let mut operands: Vec<Word> = Vec::with_capacity(format.arity());
  for (field, token) in format.operands.iter().zip(&parsed.operands) {
    // Digit strings too long for a u64 fail to parse and certainly do not fit.
    let value = token.parse::<u64>()
                     .ok()
                     .filter(|value| field.fits(*value))
                     .ok_or_else(|| AssemblyError::OperandOverflow {
                       line,
                       operation,
                       field : field.name,
                       token : token.to_string(),
                       width : field.width
                     })?;
    // Fields are at most one `Word` wide.
    operands.push(value as Word);
  }

  Ok((format, Instruction::new(operation, operands)))
}

/// One record per assembled instruction: the mnemonic, the numeric opcode, and each operand
/// under its field name in field order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LogEntry {
  pub operation : Operation,
  pub fields    : Vec<(&'static str, Word)>
}

impl LogEntry {
  pub fn new(format: &InstructionFormat, instruction: &Instruction) -> LogEntry {
    LogEntry {
      operation : instruction.operation,
      fields    : format.operands
                        .iter()
                        .map(|field| field.name)
                        .zip(instruction.operands.iter().copied())
                        .collect()
    }
  }

  pub fn field(&self, name: &str) -> Option<Word> {
    self.fields
        .iter()
        .find(|(field, _)| *field == name)
        .map(|(_, value)| *value)
  }
}

// Serialized by hand so the keys keep field order.
impl Serialize for LogEntry {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(2 + self.fields.len()))?;
    map.serialize_entry("command", self.operation.mnemonic())?;
    map.serialize_entry("opcode", &self.operation.code())?;
    for (name, value) in &self.fields {
      map.serialize_entry(name, value)?;
    }
    map.end()
  }
}

/// The output of a successful assembly.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Assembly {
  /// The bit-packed program.
  pub bytes        : Vec<u8>,
  /// One entry per instruction, in program order.
  pub log          : Vec<LogEntry>,
  pub instructions : Vec<Instruction>
}

/**
  Assembles `text` into a bit-packed program.

  Lines are validated one at a time and the first bad line aborts the whole assembly, so a
  caller only ever sees a complete program or an error.
*/
pub fn assemble(text: &str, set: &InstructionSet) -> Result<Assembly, AssemblyError> {
  let mut writer       = BitWriter::new();
  let mut log          = Vec::new();
  let mut instructions = Vec::new();

  for (idx, source_line) in text.lines().enumerate() {
    let line = idx + 1;
    let parsed = match parse_line(source_line) {
      Ok(Some(parsed)) => parsed,
      Ok(None)         => continue,
      Err(e)           => {
        return Err(AssemblyError::Syntax { line, reason: e.to_string() });
      }
    };

    let (format, instruction) = resolve_line(line, &parsed, set)?;
    encode_instruction(&mut writer, format, &instruction);
    debug!(line, %instruction, bits = format.bit_length(), "assembled");

    log.push(LogEntry::new(format, &instruction));
    instructions.push(instruction);
  }

  Ok(Assembly { bytes: writer.finish(), log, instructions })
}

/// Decodes a whole program. Reserved bits are checked, so anything this accepts the machine
/// can at least decode.
pub fn disassemble(bytes: &[u8], set: &InstructionSet) -> Result<Vec<Instruction>, ExecutionError> {
  let mut reader = BitReader::new(bytes);
  let mut instructions = Vec::new();
  while !reader.is_at_end() {
    instructions.push(decode_instruction(&mut reader, set)?);
  }
  Ok(instructions)
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::STANDARD_INSTRUCTION_SET;

  fn assemble_standard(text: &str) -> Result<Assembly, AssemblyError> {
    assemble(text, &STANDARD_INSTRUCTION_SET)
  }

  #[test]
  fn split_lines(){
    assert_eq!(parse_line(""), Ok(None));
    assert_eq!(parse_line("   \t "), Ok(None));
    assert_eq!(parse_line("# LOAD 1 2"), Ok(None));
    assert_eq!(parse_line("   #### indented comment"), Ok(None));
    assert_eq!(
      parse_line("  load   6\t632  # set up"),
      Ok(Some(ParsedLine { mnemonic: "load", operands: vec!["6", "632"] }))
    );
    assert_eq!(
      parse_line("WRITE 1 5#no space"),
      Ok(Some(ParsedLine { mnemonic: "WRITE", operands: vec!["1", "5"] }))
    );
    assert_eq!(
      parse_line("POPCNT"),
      Ok(Some(ParsedLine { mnemonic: "POPCNT", operands: vec![] }))
    );
  }

  #[test]
  fn splits_on_any_whitespace(){
    assert_eq!(
      parse_line("LOAD\u{0b}6\u{a0}632\u{2003}"),
      Ok(Some(ParsedLine { mnemonic: "LOAD", operands: vec!["6", "632"] }))
    );
    assert_eq!(parse_line("\u{0c}\u{a0}"), Ok(None));
    assert_eq!(
      assemble_standard("LOAD\u{0b}6\u{a0}632").unwrap().bytes,
      vec![0x0a, 0xe3, 0x09, 0x00, 0x00]
    );
  }

  #[test]
  fn reference_programs(){
    let cases = vec![
      ("LOAD 6 632\n",  vec![0x0a, 0xe3, 0x09, 0x00, 0x00]),
      ("READ 328 3\n",  vec![0x36, 0xa4, 0x00, 0x00, 0x80, 0x01]),
      ("WRITE 1 5",     vec![0xa7, 0x14]),
      ("POPCNT 6 310\n", vec![0x12, 0xdb, 0x04, 0x00, 0x00, 0x00]),
    ];
    for (text, bytes) in cases {
      assert_eq!(assemble_standard(text).unwrap().bytes, bytes, "{}", text);
    }
  }

  #[test]
  fn skips_blank_and_comment_lines(){
    let text = "# setup\n\nload 1 5\n   \n  # store\nWrite 1 1\n";
    let assembly = assemble_standard(text).unwrap();
    assert_eq!(
      assembly.instructions,
      vec![
        Instruction::new(Operation::Load, vec![1, 5]),
        Instruction::new(Operation::Write, vec![1, 1]),
      ]
    );
    assert_eq!(assembly.bytes.len(), 5 + 2);
  }

  #[test]
  fn empty_program(){
    let assembly = assemble_standard("# nothing here\n").unwrap();
    assert!(assembly.bytes.is_empty());
    assert!(assembly.log.is_empty());
  }

  #[test]
  fn log_entries(){
    let assembly = assemble_standard("LOAD 6 632\nREAD 328 3").unwrap();
    assert_eq!(assembly.log.len(), 2);
    assert_eq!(assembly.log[0].operation, Operation::Load);
    assert_eq!(assembly.log[0].field("dest_reg"), Some(6));
    assert_eq!(assembly.log[0].field("const"), Some(632));
    assert_eq!(assembly.log[1].fields, vec![("src_addr_reg", 328), ("dest_reg", 3)]);

    let json = serde_json::to_string(&assembly.log).unwrap();
    assert_eq!(
      json,
      r#"[{"command":"LOAD","opcode":10,"dest_reg":6,"const":632},{"command":"READ","opcode":54,"src_addr_reg":328,"dest_reg":3}]"#
    );
  }

  #[test]
  fn unknown_mnemonic(){
    assert_eq!(
      assemble_standard("LOAD 1 2\nload_const 17 6 42"),
      Err(AssemblyError::UnknownOpcode { line: 2, name: "load_const".to_string() })
    );
  }

  #[test]
  fn missing_operand(){
    assert_eq!(
      assemble_standard("LOAD 6"),
      Err(AssemblyError::ArityError { line: 1, operation: Operation::Load, expected: 2, given: 1 })
    );
    assert_eq!(
      assemble_standard("\n\nWRITE 1 2 3"),
      Err(AssemblyError::ArityError { line: 3, operation: Operation::Write, expected: 2, given: 3 })
    );
  }

  #[test]
  fn operand_overflow(){
    assert_eq!(
      assemble_standard("LOAD 6 999999999"),
      Err(AssemblyError::OperandOverflow {
        line      : 1,
        operation : Operation::Load,
        field     : "const",
        token     : "999999999".to_string(),
        width     : 24
      })
    );
    assert!(matches!(
      assemble_standard("WRITE 8 0"),
      Err(AssemblyError::OperandOverflow { field: "dest_reg", width: 3, .. })
    ));
    assert!(matches!(
      assemble_standard("READ 99999999999999999999999 0"),
      Err(AssemblyError::OperandOverflow { field: "src_addr_reg", .. })
    ));
  }

  #[test]
  fn field_limits_are_inclusive(){
    let assembly = assemble_standard("LOAD 7 16777215\nREAD 4294967295 7").unwrap();
    assert_eq!(
      assembly.instructions[1],
      Instruction::new(Operation::Read, vec![u32::MAX, 7])
    );
  }

  #[test]
  fn invalid_operands(){
    assert_eq!(
      assemble_standard("LOAD 1 -5"),
      Err(AssemblyError::InvalidOperand { line: 1, token: "-5".to_string() })
    );
    assert_eq!(
      assemble_standard("LOAD 0x10 5"),
      Err(AssemblyError::InvalidOperand { line: 1, token: "0x10".to_string() })
    );
  }

  #[test]
  fn error_lines_count_skipped_lines(){
    let error = assemble_standard("# header\n\nLOAD 1 1\nPOPCNT 1").unwrap_err();
    assert_eq!(error.line(), 4);

    let syntax = AssemblyError::Syntax { line: 3, reason: "eof".to_string() };
    assert_eq!(syntax.line(), 3);
    assert_eq!(syntax.to_string(), "line 3: cannot be split into tokens: eof");
  }

  #[test]
  fn disassembly_reassembles(){
    let text = "LOAD 1 5\nWRITE 1 1\nPOPCNT 1 0\nREAD 1 2";
    let assembly = assemble_standard(text).unwrap();
    let instructions = disassemble(&assembly.bytes, &STANDARD_INSTRUCTION_SET).unwrap();
    assert_eq!(instructions, assembly.instructions);

    let listing = instructions
      .iter()
      .map(Instruction::to_string)
      .collect::<Vec<String>>()
      .join("\n");
    assert_eq!(listing, text);
    assert_eq!(assemble_standard(&listing).unwrap().bytes, assembly.bytes);
  }
}
