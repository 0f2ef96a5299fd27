//! Binary images: words serialized big-endian, high byte first, with no header.

use std::io::{self, Read, Write};

use crate::bytecode::Word;

#[derive(thiserror::Error, Debug)]
pub enum ImageError {
  #[error("an image must hold whole words, but has {0} bytes")]
  OddLength(usize),

  #[error(transparent)]
  Io(#[from] io::Error),
}

pub fn from_bytes(bytes: &[u8]) -> Result<Vec<Word>, ImageError> {
  if bytes.len() % 2 != 0 {
    return Err(ImageError::OddLength(bytes.len()));
  }
  Ok(
    bytes
      .chunks_exact(2)
      .map(|pair| Word::from_be_bytes([pair[0], pair[1]]))
      .collect()
  )
}

pub fn to_bytes(words: &[Word]) -> Vec<u8> {
  words.iter().flat_map(|word| word.to_be_bytes().to_vec()).collect()
}

/// Reads a whole image. The stream is fully buffered before anything is decoded.
pub fn read_image<R: Read>(mut reader: R) -> Result<Vec<Word>, ImageError> {
  let mut bytes = Vec::new();
  reader.read_to_end(&mut bytes)?;
  from_bytes(&bytes)
}

pub fn write_image<W: Write>(mut writer: W, words: &[Word]) -> Result<(), ImageError> {
  writer.write_all(&to_bytes(words))?;
  writer.flush()?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn high_byte_first() {
    assert_eq!(to_bytes(&[0x7C01, 0x0030]), vec![0x7C, 0x01, 0x00, 0x30]);
    assert_eq!(from_bytes(&[0x7C, 0x01, 0x00, 0x30]).unwrap(), vec![0x7C01, 0x0030]);
  }

  #[test]
  fn odd_lengths_are_rejected() {
    assert!(matches!(from_bytes(&[0x7C, 0x01, 0x00]), Err(ImageError::OddLength(3))));
  }

  #[test]
  fn streams() {
    let mut buffer = Vec::new();
    write_image(&mut buffer, &[0x0001, 0xFFFF]).unwrap();
    assert_eq!(read_image(&buffer[..]).unwrap(), vec![0x0001, 0xFFFF]);
    assert!(read_image(&[0u8; 0][..]).unwrap().is_empty());
  }
}
