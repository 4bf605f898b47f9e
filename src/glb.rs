//! Reading and writing the binary glTF (`.glb`) container format: a 12-byte
//! header followed by a JSON chunk and an optional binary chunk, each
//! individually 4-byte aligned.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::borrow::Cow;
use std::fmt;
use std::io;

const MAGIC: [u8; 4] = *b"glTF";
const JSON_CHUNK_TYPE: u32 = 0x4E4F534A; // "JSON"
const BIN_CHUNK_TYPE: u32 = 0x004E4942; // "BIN\0"
const HEADER_SIZE: u32 = 12;
const CHUNK_HEADER_SIZE: u32 = 8;

#[derive(Clone, Copy, Debug)]
struct Header {
    magic: [u8; 4],
    version: u32,
    length: u32,
}

impl Header {
    fn from_reader<R: io::Read>(mut reader: R) -> Result<Self, Error> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(Error::Magic(magic));
        }
        let version = reader.read_u32::<LittleEndian>()?;
        let length = reader.read_u32::<LittleEndian>()?;
        Ok(Header {
            magic,
            version,
            length,
        })
    }

    fn to_writer<W: io::Write>(&self, mut writer: W) -> Result<(), Error> {
        writer.write_all(&self.magic)?;
        writer.write_u32::<LittleEndian>(self.version)?;
        writer.write_u32::<LittleEndian>(self.length)?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
struct ChunkHeader {
    length: u32,
    ty: u32,
}

impl ChunkHeader {
    fn from_reader<R: io::Read>(mut reader: R) -> Result<Self, Error> {
        let length = reader.read_u32::<LittleEndian>()?;
        let ty = reader.read_u32::<LittleEndian>()?;
        Ok(ChunkHeader { length, ty })
    }

    fn to_writer<W: io::Write>(&self, mut writer: W) -> Result<(), Error> {
        writer.write_u32::<LittleEndian>(self.length)?;
        writer.write_u32::<LittleEndian>(self.ty)?;
        Ok(())
    }
}

/// A parsed (or about-to-be-serialized) binary glTF container.
#[derive(Clone, Debug)]
pub struct Glb<'a> {
    pub json: Cow<'a, [u8]>,
    pub bin: Option<Cow<'a, [u8]>>,
}

/// Errors produced while reading or writing a GLB container.
#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Version(u32),
    Magic([u8; 4]),
    Length { expected: u32, actual: u32 },
    ChunkLength { expected: u32, actual: usize },
    ChunkType(u32),
    UnknownChunkType(u32),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Version(v) => write!(f, "unsupported glTF version {}", v),
            Error::Magic(m) => write!(f, "invalid magic {:?}, expected \"glTF\"", m),
            Error::Length { expected, actual } => {
                write!(f, "length mismatch: header says {}, read {}", expected, actual)
            }
            Error::ChunkLength { expected, actual } => {
                write!(f, "chunk length mismatch: expected {}, got {}", expected, actual)
            }
            Error::ChunkType(t) => write!(f, "expected JSON chunk, found type 0x{:08x}", t),
            Error::UnknownChunkType(t) => write!(f, "unknown chunk type 0x{:08x}", t),
        }
    }
}

impl std::error::Error for Error {}

fn align_to_multiple_of_four(n: u32) -> u32 {
    (n + 3) & !3
}

impl<'a> Glb<'a> {
    /// Splits a GLB byte slice into its header-validated JSON and BIN chunks.
    pub fn from_slice(mut data: &'a [u8]) -> Result<Self, Error> {
        let header = Header::from_reader(&mut data)?;
        if header.version != 2 {
            return Err(Error::Version(header.version));
        }
        if header.length as usize != data.len() + HEADER_SIZE as usize {
            return Err(Error::Length {
                expected: header.length,
                actual: (data.len() + HEADER_SIZE as usize) as u32,
            });
        }

        let json_chunk_header = ChunkHeader::from_reader(&mut data)?;
        if json_chunk_header.ty != JSON_CHUNK_TYPE {
            return Err(Error::ChunkType(json_chunk_header.ty));
        }
        let json_len = json_chunk_header.length as usize;
        if json_len > data.len() {
            return Err(Error::ChunkLength {
                expected: json_chunk_header.length,
                actual: data.len(),
            });
        }
        let (json, mut rest) = data.split_at(json_len);
        let json = Cow::Borrowed(json);

        let bin = if rest.is_empty() {
            None
        } else {
            let bin_chunk_header = ChunkHeader::from_reader(&mut rest)?;
            if bin_chunk_header.ty != BIN_CHUNK_TYPE {
                return Err(Error::UnknownChunkType(bin_chunk_header.ty));
            }
            let bin_len = bin_chunk_header.length as usize;
            if bin_len > rest.len() {
                return Err(Error::ChunkLength {
                    expected: bin_chunk_header.length,
                    actual: rest.len(),
                });
            }
            Some(Cow::Borrowed(&rest[..bin_len]))
        };

        Ok(Glb { json, bin })
    }

    /// Parses a GLB container from a reader by buffering it first.
    pub fn from_reader<R: io::Read>(mut reader: R) -> Result<Glb<'static>, Error> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let borrowed = Glb::from_slice(&data)?;
        Ok(Glb {
            json: Cow::Owned(borrowed.json.into_owned()),
            bin: borrowed.bin.map(|b| Cow::Owned(b.into_owned())),
        })
    }

    /// Serializes this container, padding each chunk to a 4-byte boundary
    /// with spaces (JSON chunk) or zero bytes (BIN chunk), per the glTF spec.
    pub fn to_vec(&self) -> Result<Vec<u8>, Error> {
        let json_len = align_to_multiple_of_four(self.json.len() as u32);
        let bin_len = self
            .bin
            .as_ref()
            .map(|b| align_to_multiple_of_four(b.len() as u32));

        let mut total = HEADER_SIZE + CHUNK_HEADER_SIZE + json_len;
        if let Some(bin_len) = bin_len {
            total += CHUNK_HEADER_SIZE + bin_len;
        }

        let mut out = Vec::with_capacity(total as usize);
        Header {
            magic: MAGIC,
            version: 2,
            length: total,
        }
        .to_writer(&mut out)?;

        ChunkHeader {
            length: json_len,
            ty: JSON_CHUNK_TYPE,
        }
        .to_writer(&mut out)?;
        out.extend_from_slice(&self.json);
        out.resize(out.len() + (json_len as usize - self.json.len()), b' ');

        if let (Some(bin), Some(bin_len)) = (&self.bin, bin_len) {
            ChunkHeader {
                length: bin_len,
                ty: BIN_CHUNK_TYPE,
            }
            .to_writer(&mut out)?;
            out.extend_from_slice(bin);
            out.resize(out.len() + (bin_len as usize - bin.len()), 0);
        }

        Ok(out)
    }

    pub fn to_writer<W: io::Write>(&self, mut writer: W) -> Result<(), Error> {
        writer.write_all(&self.to_vec()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_json_and_bin_chunks() {
        let glb = Glb {
            json: Cow::Borrowed(br#"{"asset":{"version":"2.0"}}"#),
            bin: Some(Cow::Borrowed(&[1, 2, 3, 4, 5])),
        };
        let bytes = glb.to_vec().unwrap();
        let parsed = Glb::from_slice(&bytes).unwrap();
        assert_eq!(&*parsed.json, &br#"{"asset":{"version":"2.0"}}"#[..]);
        assert_eq!(parsed.bin.unwrap().into_owned(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = vec![0u8; 20];
        bytes[0..4].copy_from_slice(b"NOPE");
        assert!(matches!(Glb::from_slice(&bytes), Err(Error::Magic(_))));
    }

    #[test]
    fn pads_chunks_to_four_byte_boundary() {
        let glb = Glb {
            json: Cow::Borrowed(br#"{"a":1}"#),
            bin: Some(Cow::Borrowed(&[1, 2, 3])),
        };
        let bytes = glb.to_vec().unwrap();
        assert_eq!(bytes.len() % 4, 0);
    }
}
