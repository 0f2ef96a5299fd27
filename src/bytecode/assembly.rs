/*!
  The human readable textual form of bytecode is called assembly. This module translates
  assembly source into a flat sequence of words.

  The pipeline is this:
  ```text
  text -> [`sanitize`] -> lines -> [`tokenize`] -> `Token`s ->⋯

  ⋯-> [`declare_labels`] -> `Item`s -> [`parse_statements`] -> `Statement`s ->⋯

  ⋯-> [`size_program`] -> bound `LabelTable` -> [`encode_program`] -> `Word`s
  ```
  Labels can be referenced before they are declared, so nothing can be encoded until every
  statement has been sized and every label bound to its word offset. A label reference always
  encodes as a next-word literal so that sizing never depends on the value of a label.
*/

use std::fmt::Write as FmtWrite;

use nom::{
  branch::alt,
  bytes::complete::{is_not, take_till1, take_while, take_while1},
  character::complete::{char as one_char, space0},
  combinator::{all_consuming, map, opt, recognize},
  multi::many0,
  sequence::{delimited, preceded, separated_pair, terminated},
  IResult,
};

use super::{
  encode_instruction, Instruction, Mnemonic, Operand, Operation, Register, Special, Word,
  KEYWORDS
};
use super::operand::MAXIMUM_INLINE_LITERAL;
use crate::symboltable::LabelTable;

/// The maximum number of words a program may assemble to.
pub const MAXIMUM_INSTRUCTIONS: usize = 0x1000;
/// The maximum number of labels a program may declare.
pub const MAXIMUM_LABELS: usize = 0xFFFF;
/// Shorter names are too easily confused with registers and keywords.
pub const MINIMUM_LABEL_LENGTH: usize = 4;

/// Hexadecimal literals written with at least this many digits always take a full word.
const WIDE_LITERAL_DIGITS: usize = 4;

#[derive(thiserror::Error, Debug, Clone, Eq, PartialEq)]
pub enum AssemblyError {
  #[error("Error on line {line}: duplicate label '{name}'.")]
  DuplicateLabel { name: String, line: usize },

  #[error("Error on line {line}: illegal label '{name}'.")]
  IllegalLabel { name: String, line: usize },

  #[error("Error on line {line}: label overflow, at most {} labels are allowed.", MAXIMUM_LABELS)]
  LabelOverflow { line: usize },

  #[error("Error on line {line}: invalid hexadecimal literal '{literal}'.")]
  InvalidHexLiteral { literal: String, line: usize },

  #[error("Error on line {line}: unknown instruction '{name}'.")]
  UnknownMnemonic { name: String, line: usize },

  #[error("Error on line {line}: expected argument {argument} after {mnemonic}.")]
  MissingOperand { mnemonic: Mnemonic, argument: usize, line: usize },

  #[error("Error on line {line}: unknown value '{value}'.")]
  UnknownValue { value: String, line: usize },

  #[error("Error on line {line}: literal '{literal}' does not fit in a word.")]
  LiteralOverflow { literal: String, line: usize },

  #[error("Error on line {line}: instruction overflow, at most {} words are allowed.", MAXIMUM_INSTRUCTIONS)]
  InstructionOverflow { line: usize },
}

// region Syntax types

/// A whitespace delimited piece of sanitized source text.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
struct Token<'a> {
  text: &'a str,
  line: usize
}

/// The token stream after label declarations have been replaced by their ordinals.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
enum Item<'a> {
  Label(usize),
  Token(Token<'a>),
}

/// A number or a label reference.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
enum Value {
  Number { value: Word, wide: bool },
  Label(usize),
}

/// An operand as written, before labels are resolved to addresses.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
enum Argument {
  Register(Register),
  Indirect(Register),
  IndirectOffset(Register, Value),
  IndirectValue(Value),
  Keyword(Operand),
  Value(Value),
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
enum Statement {
  Label(usize),
  Basic {
    opcode : Operation,
    a      : Argument,
    b      : Argument,
    line   : usize
  },
  NonBasic {
    opcode : Special,
    a      : Argument,
    line   : usize
  },
}

/// The bracket structure of an operand. Terms are classified afterward.
enum Shape<'a> {
  Direct(&'a str),
  Indirect(&'a str),
  IndirectSum(&'a str, &'a str),
}

impl Value {
  fn resolve(&self, labels: &LabelTable) -> Word {
    match self {
      Value::Number { value, .. } => *value,
      // Every declared label is bound while sizing.
      Value::Label(ordinal)       => labels.offset(*ordinal).unwrap_or(0),
    }
  }
}

impl Argument {
  /// The number of words the argument adds after the instruction word.
  fn extra_words(&self) -> usize {
    match self {
      Argument::Value(Value::Number { value, wide: false }) if *value <= MAXIMUM_INLINE_LITERAL => 0,

      | Argument::Value(_)
      | Argument::IndirectValue(_)
      | Argument::IndirectOffset(_, _) => 1,

      | Argument::Register(_)
      | Argument::Indirect(_)
      | Argument::Keyword(_) => 0,
    }
  }

  fn to_operand(&self, labels: &LabelTable) -> Operand {
    match self {
      Argument::Register(r)              => Operand::Register(*r),
      Argument::Indirect(r)              => Operand::Indirect(*r),
      Argument::IndirectOffset(r, value) => Operand::IndirectOffset(*r, value.resolve(labels)),
      Argument::IndirectValue(value)     => Operand::IndirectNext(value.resolve(labels)),
      Argument::Keyword(operand)         => *operand,
      Argument::Value(value) => {
        match self.extra_words() {
          0 => Operand::Literal(value.resolve(labels)),
          _ => Operand::Next(value.resolve(labels)),
        }
      }
    }
  }
}

// endregion

// region Parsers

fn separator(input: &str) -> IResult<&str, &str> {
  take_while(|c: char| c.is_whitespace() || c == ',')(input)
}

/// A bracketed operand (which may contain spaces) or a run of non-separator characters.
fn token(input: &str) -> IResult<&str, &str> {
  alt((
    recognize(delimited(one_char('['), opt(is_not("]")), one_char(']'))),
    take_till1(|c: char| c.is_whitespace() || c == ',' || c == '['),
  ))(input)
}

fn tokens(input: &str) -> IResult<&str, Vec<&str>> {
  preceded(separator, many0(terminated(token, separator)))(input)
}

fn term(input: &str) -> IResult<&str, &str> {
  delimited(
    space0,
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    space0
  )(input)
}

fn shape(input: &str) -> IResult<&str, Shape<'_>> {
  alt((
    map(
      delimited(one_char('['), separated_pair(term, one_char('+'), term), one_char(']')),
      |(left, right)| Shape::IndirectSum(left, right)
    ),
    map(delimited(one_char('['), term, one_char(']')), Shape::Indirect),
    map(term, Shape::Direct),
  ))(input)
}

// endregion

// region Pipeline stages

fn is_allowed(c: char) -> bool {
  c.is_ascii_alphanumeric() || c.is_whitespace() || "_[]+:,".contains(c)
}

/// Strips comments and disallowed characters and lowercases what is left, line by line.
fn sanitize(source: &str) -> Vec<String> {
  source
    .lines()
    .map(|line| {
      let code = match line.find(';') {
        Some(start) => &line[..start],
        None        => line
      };
      code.chars().filter(|c| is_allowed(*c)).collect::<String>().to_ascii_lowercase()
    })
    .collect()
}

fn tokenize(lines: &[String]) -> Result<Vec<Token<'_>>, AssemblyError> {
  let mut result = Vec::new();
  for (index, text) in lines.iter().enumerate() {
    let line = index + 1;
    match tokens(text) {
      Ok(("", found)) => {
        result.extend(found.into_iter().map(|text| Token { text, line }));
      }
      Ok((rest, _)) => {
        return Err(AssemblyError::UnknownValue { value: rest.to_string(), line });
      }
      Err(_) => {
        return Err(AssemblyError::UnknownValue { value: text.clone(), line });
      }
    }
  }
  Ok(result)
}

fn is_valid_label(name: &str) -> bool {
  name.len() >= MINIMUM_LABEL_LENGTH
    && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    && !name.starts_with(|c: char| c.is_ascii_digit())
    && !KEYWORDS.contains_key(name)
}

/// Gives every label declaration an ordinal and replaces the declaration with it.
fn declare_labels<'a>(tokens: Vec<Token<'a>>, labels: &mut LabelTable)
  -> Result<Vec<Item<'a>>, AssemblyError>
{
  let mut items = Vec::with_capacity(tokens.len());
  for token in tokens {
    let name =
      match token.text.strip_prefix(':') {
        Some(name) => name,
        None => {
          items.push(Item::Token(token));
          continue;
        }
      };

    if !is_valid_label(name) {
      return Err(AssemblyError::IllegalLabel { name: name.to_string(), line: token.line });
    }
    if labels.len() >= MAXIMUM_LABELS {
      return Err(AssemblyError::LabelOverflow { line: token.line });
    }
    let ordinal =
      labels
        .declare(name)
        .map_err(|name| AssemblyError::DuplicateLabel { name: name.to_string(), line: token.line })?;
    items.push(Item::Label(ordinal));
  }
  Ok(items)
}

/// Converts a numeric term to its value. Hexadecimal terms start with `0x`.
fn normalize_literal(text: &str, line: usize) -> Result<Value, AssemblyError> {
  let overflow = || AssemblyError::LiteralOverflow { literal: text.to_string(), line };

  let (value, wide) =
    match text.strip_prefix("0x") {

      Some(digits) => {
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
          return Err(AssemblyError::InvalidHexLiteral { literal: text.to_string(), line });
        }
        let value = u64::from_str_radix(digits, 16).map_err(|_| overflow())?;
        (value, digits.len() >= WIDE_LITERAL_DIGITS)
      }

      None => {
        if !text.chars().all(|c| c.is_ascii_digit()) {
          return Err(AssemblyError::UnknownValue { value: text.to_string(), line });
        }
        (text.parse::<u64>().map_err(|_| overflow())?, false)
      }

    };

  match value <= Word::max_value() as u64 {
    true  => Ok(Value::Number { value: value as Word, wide }),
    false => Err(overflow())
  }
}

enum Term {
  Register(Register),
  Keyword(Operand),
  Value(Value),
}

fn classify(text: &str, line: usize, labels: &LabelTable) -> Result<Term, AssemblyError> {
  if let Ok(register) = text.parse::<Register>() {
    return Ok(Term::Register(register));
  }
  if let Some(keyword) = KEYWORDS.get(text) {
    return Ok(Term::Keyword(*keyword));
  }
  if text.starts_with(|c: char| c.is_ascii_digit()) {
    return normalize_literal(text, line).map(Term::Value);
  }
  match labels.ordinal(text) {
    Some(ordinal) => Ok(Term::Value(Value::Label(ordinal))),
    None          => Err(AssemblyError::UnknownValue { value: text.to_string(), line })
  }
}

fn parse_argument(token: Token<'_>, labels: &LabelTable) -> Result<Argument, AssemblyError> {
  let unknown = || AssemblyError::UnknownValue { value: token.text.to_string(), line: token.line };
  let (_, shape) = all_consuming(shape)(token.text).map_err(|_| unknown())?;

  let argument =
    match shape {

      Shape::Direct(text) => {
        match classify(text, token.line, labels)? {
          Term::Register(r)    => Argument::Register(r),
          Term::Keyword(k)     => Argument::Keyword(k),
          Term::Value(v)       => Argument::Value(v),
        }
      }

      Shape::Indirect(text) => {
        match classify(text, token.line, labels)? {
          Term::Register(r)    => Argument::Indirect(r),
          Term::Value(v)       => Argument::IndirectValue(v),
          Term::Keyword(_)     => return Err(unknown()),
        }
      }

      Shape::IndirectSum(left, right) => {
        match (classify(left, token.line, labels)?, classify(right, token.line, labels)?) {
          | (Term::Register(r), Term::Value(v))
          | (Term::Value(v), Term::Register(r)) => Argument::IndirectOffset(r, v),
          _ => return Err(unknown()),
        }
      }

    };
  Ok(argument)
}

/// Takes the token for argument `argument` of `mnemonic`.
fn next_argument<'a, I>(
  items    : &mut I,
  mnemonic : Mnemonic,
  argument : usize,
  line     : usize,
  labels   : &LabelTable
) -> Result<Argument, AssemblyError>
  where I: Iterator<Item = Item<'a>>
{
  match items.next() {
    Some(Item::Token(token)) => parse_argument(token, labels),
    _ => Err(AssemblyError::MissingOperand { mnemonic, argument, line }),
  }
}

/// Groups the item stream into instructions, checking mnemonics and operand syntax.
fn parse_statements(items: Vec<Item<'_>>, labels: &LabelTable) -> Result<Vec<Statement>, AssemblyError> {
  let mut statements = Vec::new();
  let mut items = items.into_iter();

  while let Some(item) = items.next() {
    let token =
      match item {
        Item::Label(ordinal) => {
          statements.push(Statement::Label(ordinal));
          continue;
        }
        Item::Token(token) => token
      };

    let line = token.line;
    let mnemonic =
      token
        .text
        .parse::<Mnemonic>()
        .map_err(|_| AssemblyError::UnknownMnemonic { name: token.text.to_string(), line })?;

    let a = next_argument(&mut items, mnemonic, 1, line, labels)?;
    let statement =
      match mnemonic {
        Mnemonic::Basic(opcode) => {
          let b = next_argument(&mut items, mnemonic, 2, line, labels)?;
          Statement::Basic { opcode, a, b, line }
        }
        Mnemonic::Special(opcode) => Statement::NonBasic { opcode, a, line },
      };
    statements.push(statement);
  }

  Ok(statements)
}

/// Binds every label to the word offset of the statement that follows it.
fn size_program(statements: &[Statement], labels: &mut LabelTable) -> Result<usize, AssemblyError> {
  let mut counter = 0usize;

  for statement in statements {
    let (size, line) =
      match statement {
        Statement::Label(ordinal) => {
          labels.bind(*ordinal, counter as Word);
          continue;
        }
        Statement::Basic { a, b, line, .. } => (1 + a.extra_words() + b.extra_words(), *line),
        Statement::NonBasic { a, line, .. } => (1 + a.extra_words(), *line),
      };

    counter += size;
    if counter > MAXIMUM_INSTRUCTIONS {
      return Err(AssemblyError::InstructionOverflow { line });
    }
  }

  Ok(counter)
}

fn encode_program(statements: &[Statement], labels: &LabelTable, size: usize) -> Vec<Word> {
  let mut words = Vec::with_capacity(size);

  for statement in statements {
    let instruction =
      match statement {
        Statement::Label(_) => continue,
        Statement::Basic { opcode, a, b, .. } => Instruction::Basic {
          opcode : *opcode,
          a      : a.to_operand(labels),
          b      : b.to_operand(labels)
        },
        Statement::NonBasic { opcode, a, .. } => Instruction::NonBasic {
          opcode : *opcode,
          a      : a.to_operand(labels)
        },
      };
    words.extend(encode_instruction(&instruction).to_vec());
  }

  words
}

// endregion

/// A listing of the label table, one `name = offset` per line.
#[cfg_attr(not(feature = "trace_execution"), allow(dead_code))]
fn label_listing(labels: &LabelTable) -> String {
  let mut listing = String::new();
  for ordinal in 0..labels.len() {
    if let (Some(name), Some(offset)) = (labels.name(ordinal), labels.offset(ordinal)) {
      let _ = writeln!(listing, "{} = 0x{:04X}", name, offset);
    }
  }
  listing
}

/**
  Assembles source text into words. Every error is fatal and reports the line it was found
  on; no partial output is returned.
*/
pub fn assemble(source: &str) -> Result<Vec<Word>, AssemblyError> {
  let lines      = sanitize(source);
  let tokens     = tokenize(&lines)?;
  let mut labels = LabelTable::new();
  let items      = declare_labels(tokens, &mut labels)?;
  let statements = parse_statements(items, &labels)?;
  let size       = size_program(&statements, &mut labels)?;

  #[cfg(feature = "trace_execution")]
  print!("# Labels\n{}", label_listing(&labels));

  Ok(encode_program(&statements, &labels, size))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn literals_pick_their_encoding() {
    // SET A, 0x30 needs a next word; ADD A, 0x10 fits inline.
    assert_eq!(assemble("set a, 0x30\nadd a, 0x10"), Ok(vec![0x7C01, 0x0030, 0xC002]));
  }

  #[test]
  fn comments_case_and_commas() {
    let words = assemble("  SET A, 0x30   ; load\n; nothing here\nSet B,A").unwrap();
    assert_eq!(words, vec![0x7C01, 0x0030, 0x0011]);
  }

  #[test]
  fn forward_label_reference() {
    // The label resolves to the offset of `set a, 1`, after the two words of the jump.
    let words = assemble("set pc, loopstart\n:loopstart set a, 1").unwrap();
    assert_eq!(words, vec![0x7DC1, 0x0002, 0x8401]);
  }

  #[test]
  fn backward_label_reference_at_offset_zero() {
    let words = assemble(":loop add a, 1\nset pc, loop").unwrap();
    // The reference still takes a full word, even though zero would fit inline.
    assert_eq!(words, vec![0x8402, 0x7DC1, 0x0000]);
  }

  #[test]
  fn subroutine_call() {
    let words = assemble("jsr sub\nset a, 1\n:sub set b, 2").unwrap();
    assert_eq!(words, vec![0x7C10, 0x0003, 0x8401, 0x8811]);
  }

  #[test]
  fn indirect_forms() {
    let forward = assemble("set [a], [0x1000+b]").unwrap();
    let reverse = assemble("set [a], [ b + 0x1000 ]").unwrap();
    assert_eq!(forward, vec![0x4481, 0x1000]);
    assert_eq!(forward, reverse);
    assert_eq!(assemble("set [0x1000], 0x20"), Ok(vec![0x7DE1, 0x1000, 0x0020]));
  }

  #[test]
  fn labels_inside_brackets() {
    let words = assemble("set a, [data+i]\nset b, [data]\n:data hlt a").unwrap();
    assert_eq!(words, vec![0x5801, 0x0004, 0x7811, 0x0004, 0x0000]);
  }

  #[test]
  fn stack_and_special_operands() {
    assert_eq!(assemble("set push, pop"), Ok(vec![0x61A1]));
    assert_eq!(assemble("set peek, o"), Ok(vec![0x7591]));
    assert_eq!(assemble("set sp, pc"), Ok(vec![0x71B1]));
  }

  #[test]
  fn four_digit_hex_is_always_a_full_word() {
    assert_eq!(assemble("set a, 0x05"), Ok(vec![0x9401]));
    assert_eq!(assemble("set a, 0x0005"), Ok(vec![0x7C01, 0x0005]));
  }

  #[test]
  fn or_alias() {
    assert_eq!(assemble("or a, b"), assemble("bor a, b"));
  }

  #[test]
  fn duplicate_label() {
    let result = assemble(":loop set a, 1\n:loop set b, 2");
    assert_eq!(result, Err(AssemblyError::DuplicateLabel { name: "loop".to_string(), line: 2 }));
  }

  #[test]
  fn short_and_reserved_labels() {
    assert_eq!(
      assemble("\n:abc set a, 1"),
      Err(AssemblyError::IllegalLabel { name: "abc".to_string(), line: 2 })
    );
    assert!(matches!(assemble(":push set a, 1"), Err(AssemblyError::IllegalLabel { .. })));
  }

  #[test]
  fn invalid_hex_literal() {
    assert_eq!(
      assemble("set a, 1\nset a, 0xzz"),
      Err(AssemblyError::InvalidHexLiteral { literal: "0xzz".to_string(), line: 2 })
    );
  }

  #[test]
  fn unknown_mnemonic() {
    assert_eq!(
      assemble("nop a, b"),
      Err(AssemblyError::UnknownMnemonic { name: "nop".to_string(), line: 1 })
    );
  }

  #[test]
  fn missing_operand() {
    assert_eq!(
      assemble("set a"),
      Err(AssemblyError::MissingOperand { mnemonic: Mnemonic::Basic(Operation::Set), argument: 2, line: 1 })
    );
    assert!(matches!(assemble("set a\n:done hlt a"), Err(AssemblyError::MissingOperand { .. })));
  }

  #[test]
  fn unknown_values() {
    assert!(matches!(assemble("set a, nowhere"), Err(AssemblyError::UnknownValue { .. })));
    assert!(matches!(assemble("set [sp], 1"), Err(AssemblyError::UnknownValue { .. })));
    assert!(matches!(assemble("set [a+b], 1"), Err(AssemblyError::UnknownValue { .. })));
    assert!(matches!(assemble("set [a, 1"), Err(AssemblyError::UnknownValue { .. })));
  }

  #[test]
  fn literal_overflow() {
    assert_eq!(assemble("set a, 65535"), Ok(vec![0x7C01, 0xFFFF]));
    assert_eq!(
      assemble("set a, 65536"),
      Err(AssemblyError::LiteralOverflow { literal: "65536".to_string(), line: 1 })
    );
    assert!(matches!(assemble("set a, 0x10000"), Err(AssemblyError::LiteralOverflow { .. })));
  }

  #[test]
  fn instruction_overflow() {
    let fits = "set a, b\n".repeat(MAXIMUM_INSTRUCTIONS);
    assert_eq!(assemble(&fits).map(|words| words.len()), Ok(MAXIMUM_INSTRUCTIONS));

    let overflows = format!("{}set a, b", fits);
    assert_eq!(
      assemble(&overflows),
      Err(AssemblyError::InstructionOverflow { line: MAXIMUM_INSTRUCTIONS + 1 })
    );
  }

  #[test]
  fn error_messages_name_the_line() {
    let error = assemble("set a, 1\n\nfoo").unwrap_err();
    assert_eq!(error.to_string(), "Error on line 3: unknown instruction 'foo'.");
  }

  #[test]
  fn label_listing_names_offsets() {
    let lines      = sanitize("set a, 1\n:next set b, 2");
    let tokens     = tokenize(&lines).unwrap();
    let mut labels = LabelTable::new();
    let items      = declare_labels(tokens, &mut labels).unwrap();
    let statements = parse_statements(items, &labels).unwrap();
    assert_eq!(size_program(&statements, &mut labels), Ok(2));
    assert_eq!(label_listing(&labels), "next = 0x0001\n");
  }

  #[test]
  fn any_whitespace_separates_tokens() {
    assert_eq!(assemble("set\u{0c}a,\u{0b}1"), Ok(vec![0x8401]));
    assert_eq!(assemble("set\u{a0}a,\u{a0}1"), Ok(vec![0x8401]));
  }

  #[test]
  fn label_overflow() {
    let labels: String = (0..MAXIMUM_LABELS).map(|i| format!(":label{}\n", i)).collect();
    assert_eq!(assemble(&format!("{}hlt a", labels)), Ok(vec![0x0000]));

    let overflows = format!("{}:extra\nhlt a", labels);
    assert_eq!(
      assemble(&overflows),
      Err(AssemblyError::LabelOverflow { line: MAXIMUM_LABELS + 1 })
    );
  }
}
