use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use dcpu::bytecode::{assemble, disassemble, Word};
use dcpu::cpu::{Machine, State};
use dcpu::image::{read_image, write_image};

#[derive(Parser, Debug)]
#[command(author, version, about = "DCPU-16 assembler, disassembler and interpreter")]
struct Opts {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Assemble a source file into a big-endian binary image
  #[command(alias = "c")]
  Assemble {
    source: PathBuf,
    output: PathBuf,
  },
  /// Disassemble a binary image
  #[command(alias = "d")]
  Disassemble {
    image: PathBuf,
    /// Where to write the listing (standard output when omitted)
    output: Option<PathBuf>,
  },
  /// Execute a binary image until it halts
  #[command(alias = "e")]
  Execute {
    image: PathBuf,
    /// Treat the input as assembly source and assemble it first
    #[arg(long)]
    source: bool,
    /// Stop with an error after this many cycles
    #[arg(long)]
    max_cycles: Option<u64>,
    /// Print the final machine state
    #[arg(long)]
    dump: bool,
  },
}

fn load_program(path: &PathBuf, source: bool) -> Result<Vec<Word>> {
  match source {

    true  => {
      let text = fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
      Ok(assemble(&text)?)
    }

    false => {
      let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
      Ok(read_image(file)?)
    }

  }
}

fn run(machine: &mut Machine, max_cycles: Option<u64>) -> Result<()> {
  let limit = match max_cycles {
    Some(limit) => limit,
    None        => return Ok(machine.run()?),
  };
  while machine.step()? == State::Active {
    if machine.cycles() > limit {
      bail!("program did not halt within {} cycles", limit);
    }
  }
  Ok(())
}

fn main() -> Result<()> {
  let opts = Opts::parse();

  match opts.command {

    Command::Assemble { source, output } => {
      let text = fs::read_to_string(&source)
        .with_context(|| format!("reading {}", source.display()))?;
      let words = assemble(&text)?;
      let file = File::create(&output).with_context(|| format!("creating {}", output.display()))?;
      write_image(BufWriter::new(file), &words)?;
      println!("Compiled {} words to {}", words.len(), output.display());
    }

    Command::Disassemble { image, output } => {
      let words = load_program(&image, false)?;
      let text  = disassemble(&words)?;
      match output {
        Some(path) => {
          fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
          println!("Disassembled instructions to {}", path.display());
        }
        None => {
          let stdout = io::stdout();
          writeln!(stdout.lock(), "{}", text)?;
        }
      }
    }

    Command::Execute { image, source, max_cycles, dump } => {
      let words = load_program(&image, source)?;
      let mut machine = Machine::new();
      machine.mount(&words)?;
      let result = run(&mut machine, max_cycles);
      if dump {
        println!("{}", machine);
      }
      result?;
      println!("The program took a total of {} cycles", machine.cycles());
    }

  }

  Ok(())
}
