/*!
  File level operations behind the command line.

  Every output file is written to a temporary file in its destination directory and moved
  into place only after the whole pass has succeeded, so a failed run never leaves a partial
  artifact behind.
*/

use std::fs;
use std::io::Write;
use std::ops::Range;
use std::path::Path;

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::bytecode::{assemble, disassemble, Assembly, Instruction, InstructionSet};
use crate::error::Error;
use crate::machine::{Machine, MachineConfig};

/// What `run_file` writes to its result file.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum DumpFormat {
  /// A JSON object from address to value.
  #[default]
  Memory,
  /// `{"memory": {...}, "registers": [...]}`.
  MemoryAndRegisters
}

fn read_text(path: &Path) -> Result<String, Error> {
  fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, Error> {
  fs::read(path).map_err(|e| Error::io(path, e))
}

/// Creates the temporary file that will replace `path`, in the same directory so the final
/// rename does not cross file systems.
fn stage(path: &Path, contents: &[u8]) -> Result<NamedTempFile, Error> {
  let directory = match path.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent,
    _ => Path::new(".")
  };
  let mut file = NamedTempFile::new_in(directory).map_err(|e| Error::io(directory, e))?;
  file.write_all(contents).map_err(|e| Error::io(file.path(), e))?;
  Ok(file)
}

fn commit(file: NamedTempFile, path: &Path) -> Result<(), Error> {
  file.persist(path).map_err(|e| Error::io(path, e.error))?;
  Ok(())
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, Error> {
  let mut json = serde_json::to_vec_pretty(value)?;
  json.push(b'\n');
  Ok(json)
}

/// Assembles the program at `input`, writing the bit-packed program to `binary` and the JSON
/// instruction log to `log`. Neither file is touched unless assembly succeeds.
pub fn assemble_file(
  input  : &Path,
  binary : &Path,
  log    : &Path,
  set    : &InstructionSet
) -> Result<Assembly, Error> {
  let text     = read_text(input)?;
  let assembly = assemble(&text, set)?;

  let staged_binary = stage(binary, &assembly.bytes)?;
  let staged_log    = stage(log, &to_json(&assembly.log)?)?;
  commit(staged_log, log)?;
  if let Err(e) = commit(staged_binary, binary) {
    // Take the log back out so no half of the pair is left behind.
    if let Err(remove_error) = fs::remove_file(log) {
      warn!(log = %log.display(), error = %remove_error, "could not remove log");
    }
    return Err(e);
  }

  info!(
    input = %input.display(),
    instructions = assembly.instructions.len(),
    bytes = assembly.bytes.len(),
    "assembled"
  );
  Ok(assembly)
}

/// Runs the program in `binary` on a fresh machine and writes memory over `range` (and the
/// registers, if asked) to `result` as JSON. Nothing is written if execution fails.
pub fn run_file(
  binary : &Path,
  result : &Path,
  range  : Range<usize>,
  config : MachineConfig,
  format : DumpFormat,
  set    : &InstructionSet
) -> Result<Machine, Error> {
  let bytes = read_bytes(binary)?;

  let mut machine = Machine::new(config);
  machine.check_range(&range)?;
  let executed = machine.run(&bytes, set)?;

  let json = match format {
    DumpFormat::Memory             => to_json(&machine.snapshot(range)?)?,
    DumpFormat::MemoryAndRegisters => to_json(&machine.dump(range)?)?
  };
  commit(stage(result, &json)?, result)?;

  info!(binary = %binary.display(), executed, result = %result.display(), "ran program");
  Ok(machine)
}

/// Decodes the program in `binary`.
pub fn disassemble_file(binary: &Path, set: &InstructionSet) -> Result<Vec<Instruction>, Error> {
  let bytes = read_bytes(binary)?;
  Ok(disassemble(&bytes, set)?)
}
