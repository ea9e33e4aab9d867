use std::path::PathBuf;
use std::process::ExitCode;

use clap::builder::RangedU64ValueParser;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

use bitvm::driver::{assemble_file, disassemble_file, run_file, DumpFormat};
use bitvm::machine::{DEFAULT_MEMORY_SIZE, DEFAULT_REGISTER_COUNT, MAX_MEMORY_SIZE, MAX_REGISTER_COUNT};
use bitvm::{Error, MachineConfig, STANDARD_INSTRUCTION_SET};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Assemble a program into a bit-packed binary and a JSON instruction log
  Assemble {
    input  : PathBuf,
    binary : PathBuf,
    log    : PathBuf,
  },
  /// Run a binary and write memory in [START, END) as JSON
  Run {
    binary : PathBuf,
    result : PathBuf,
    start  : usize,
    end    : usize,
    #[arg(
      long,
      default_value_t = DEFAULT_REGISTER_COUNT,
      value_parser = RangedU64ValueParser::<usize>::new().range(1..=MAX_REGISTER_COUNT)
    )]
    registers: usize,
    #[arg(
      long,
      default_value_t = DEFAULT_MEMORY_SIZE,
      value_parser = RangedU64ValueParser::<usize>::new().range(0..=MAX_MEMORY_SIZE)
    )]
    memory_size: usize,
    /// Also write the register file to the result
    #[arg(long)]
    with_registers: bool,
    /// Print the final machine state to stderr
    #[arg(long)]
    show_state: bool,
  },
  /// Print a binary as assembly
  Disasm {
    binary: PathBuf,
  },
}

fn setup_tracing() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let fmt_layer = fmt::layer()
    .with_target(false)
    .with_writer(std::io::stderr);
  let subscriber = Registry::default()
    .with(filter)
    .with(fmt_layer);
  if tracing::subscriber::set_global_default(subscriber).is_err() {
    eprintln!("A tracing subscriber is already installed.");
  }
}

fn execute(command: Command) -> Result<(), Error> {
  match command {

    Command::Assemble { input, binary, log } => {
      assemble_file(&input, &binary, &log, &STANDARD_INSTRUCTION_SET)?;
    }

    Command::Run { binary, result, start, end, registers, memory_size, with_registers, show_state } => {
      let config = MachineConfig { register_count: registers, memory_size };
      let format = match with_registers {
        true  => DumpFormat::MemoryAndRegisters,
        false => DumpFormat::Memory
      };
      let machine = run_file(&binary, &result, start..end, config, format, &STANDARD_INSTRUCTION_SET)?;
      if show_state {
        eprintln!("{}", machine);
      }
    }

    Command::Disasm { binary } => {
      let instructions = disassemble_file(&binary, &STANDARD_INSTRUCTION_SET)?;
      for instruction in &instructions {
        println!("{}", instruction);
      }
      info!(instructions = instructions.len(), "disassembled");
    }

  }
  Ok(())
}

fn main() -> ExitCode {
  setup_tracing();

  let cli = Cli::parse();

  #[cfg(feature = "trace_computation")]
  tracing::debug!("Computation tracing ENABLED");

  match execute(cli.command) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      error!("{}", e);
      ExitCode::FAILURE
    }
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  fn run_args(extra: &[&str]) -> Result<Cli, clap::Error> {
    let mut args = vec!["bitvm", "run", "program.bin", "result.json", "0", "4"];
    args.extend_from_slice(extra);
    Cli::try_parse_from(args)
  }

  #[test]
  fn machine_size_defaults(){
    match run_args(&[]).unwrap().command {
      Command::Run { registers, memory_size, with_registers, .. } => {
        assert_eq!(registers, DEFAULT_REGISTER_COUNT);
        assert_eq!(memory_size, DEFAULT_MEMORY_SIZE);
        assert!(!with_registers);
      }
      _ => panic!("expected the run command")
    }
  }

  #[test]
  fn machine_size_is_bounded(){
    assert!(run_args(&["--memory-size", "4294967296"]).is_ok());
    assert!(run_args(&["--memory-size", "4294967297"]).is_err());
    assert!(run_args(&["--memory-size", "18446744073709551615"]).is_err());
    assert!(run_args(&["--registers", "0"]).is_err());
    assert!(run_args(&["--registers", "16", "--memory-size", "64"]).is_ok());
  }
}
