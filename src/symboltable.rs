use bimap::BiMap;
use string_cache::DefaultAtom;

use crate::bytecode::Word;

/**
  The assembler's label table. Each declared label gets the next ordinal, and the table is
  really just a convenience wrapper around a BiMap between interned names and ordinals plus
  the word offset each ordinal resolves to once the program has been sized.

  The table lives for exactly one call to `assemble`.
*/
#[derive(Debug)]
pub struct LabelTable {
  names   : BiMap<DefaultAtom, usize>,
  offsets : Vec<Option<Word>>
}

impl LabelTable {

  pub fn new() -> LabelTable {
    LabelTable {
      names   : BiMap::new(),
      offsets : vec![]
    }
  }

  pub fn len(&self) -> usize {
    self.offsets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.offsets.is_empty()
  }

  /// Assigns the next ordinal to `name`. Gives the name back if it is already declared.
  pub fn declare(&mut self, name: &str) -> Result<usize, DefaultAtom> {
    let ordinal = self.offsets.len();
    self.names
        .insert_no_overwrite(DefaultAtom::from(name), ordinal)
        .map_err(|(name, _)| name)?;
    self.offsets.push(None);
    Ok(ordinal)
  }

  pub fn ordinal(&self, name: &str) -> Option<usize> {
    self.names.get_by_left(&DefaultAtom::from(name)).copied()
  }

  pub fn name(&self, ordinal: usize) -> Option<&DefaultAtom> {
    self.names.get_by_right(&ordinal)
  }

  /// Records the word offset of the instruction following the label's declaration.
  pub fn bind(&mut self, ordinal: usize, offset: Word) {
    if let Some(slot) = self.offsets.get_mut(ordinal) {
      *slot = Some(offset);
    }
  }

  pub fn offset(&self, ordinal: usize) -> Option<Word> {
    self.offsets.get(ordinal).copied().flatten()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ordinals_are_sequential() {
    let mut table = LabelTable::new();
    assert_eq!(table.declare("loop"), Ok(0));
    assert_eq!(table.declare("done"), Ok(1));
    assert_eq!(table.ordinal("done"), Some(1));
    assert_eq!(table.name(0).map(|name| name.to_string()), Some("loop".to_string()));
    assert_eq!(table.len(), 2);
  }

  #[test]
  fn redeclaring_is_refused() {
    let mut table = LabelTable::new();
    table.declare("loop").unwrap();
    assert_eq!(table.declare("loop"), Err(DefaultAtom::from("loop")));
    assert_eq!(table.len(), 1);
  }

  #[test]
  fn offsets_are_unknown_until_bound() {
    let mut table = LabelTable::new();
    let ordinal = table.declare("loop").unwrap();
    assert_eq!(table.offset(ordinal), None);
    table.bind(ordinal, 0x0004);
    assert_eq!(table.offset(ordinal), Some(0x0004));
    assert_eq!(table.offset(7), None);
  }
}
