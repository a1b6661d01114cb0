//! The paged node store: a fixed-size record file addressed by integer node
//! IDs, with a 32-byte header record at offset 0.
//!
//! Byte offset of node `id` = `HEADER_SIZE + id * node_size`. Reads and
//! writes are always full-node; every header mutation is flushed to disk
//! before returning to the caller.

use super::btree::{Node, NODE_SIZE};
use crate::errors::Error;
use bincode::{config, Decode, Encode};
use std::fs::OpenOptions;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Magic number identifying an index file.
pub const MAGIC: i32 = 0x12345678;

/// Fixed size of the on-disk header record; the header struct is
/// zero-padded to fill this region exactly.
pub const HEADER_SIZE: usize = 32;

/// Index file header. All fields are little-endian 32-bit on disk.
#[derive(Encode, Decode, Debug, Clone)]
pub struct IndexHeader {
    pub magic: i32,
    pub version: i32,
    /// Size of each node record in bytes.
    pub node_size: i32,
    /// ID of the root node.
    pub root_id: i32,
    /// Next node ID handed out by `allocate`; monotonic, never reused.
    pub next_id: i32,
}

pub struct Pager {
    path: PathBuf,
    file: std::fs::File,
    header: IndexHeader,
}

impl Pager {
    /// Open an index file, creating and initializing it when absent.
    ///
    /// A fresh file ships with a single empty leaf as node 0, `root_id = 0`
    /// and `next_id = 1`. An existing file fails with `CorruptIndex` when
    /// the magic does not match; a `node_size` differing from the compiled
    /// layout is a warning, not an error.
    pub fn open(path: &Path) -> Result<Self, Error> {
        if path.exists() {
            let mut file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(path)
                .map_err(|e| Error::io(path, e))?;

            let mut buf = [0u8; HEADER_SIZE];
            file.read_exact(&mut buf).map_err(|e| match e.kind() {
                io::ErrorKind::UnexpectedEof => err!(
                    CorruptIndex,
                    "Short header read in '{}'.",
                    path.display()
                ),
                _ => Error::io(path, e),
            })?;
            let header: IndexHeader = decode_frame(&buf)?;

            if header.magic != MAGIC {
                return Err(err!(
                    CorruptIndex,
                    "Bad magic 0x{:08x} in '{}'.",
                    header.magic,
                    path.display()
                ));
            }
            if header.node_size != NODE_SIZE as i32 {
                warn!(
                    path = %path.display(),
                    file_node_size = header.node_size,
                    expected = NODE_SIZE,
                    "Node size mismatch, trying to continue"
                );
            }
            debug!(
                path = %path.display(),
                root_id = header.root_id,
                next_id = header.next_id,
                "Opened index file"
            );

            Ok(Pager {
                path: path.to_path_buf(),
                file,
                header,
            })
        } else {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(path)
                .map_err(|e| Error::io(path, e))?;

            let mut pager = Pager {
                path: path.to_path_buf(),
                file,
                header: IndexHeader {
                    magic: MAGIC,
                    version: 1,
                    node_size: NODE_SIZE as i32,
                    root_id: 0,
                    next_id: 1,
                },
            };
            pager.write_header()?;
            pager.write_node(0, &Node::leaf())?;
            info!(path = %path.display(), "Initialized new index file");
            Ok(pager)
        }
    }

    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    pub fn root_id(&self) -> i32 {
        self.header.root_id
    }

    /// Point the header at a new root node and persist it.
    pub fn set_root(&mut self, id: i32) -> Result<(), Error> {
        self.header.root_id = id;
        self.write_header()
    }

    /// Hand out the next node ID and persist the incremented counter.
    pub fn allocate(&mut self) -> Result<i32, Error> {
        let id = self.header.next_id;
        self.header.next_id += 1;
        self.write_header()?;
        Ok(id)
    }

    pub fn read_node(&mut self, id: i32) -> Result<Node, Error> {
        let offset = self.node_offset(id);
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| Error::io(&self.path, e))?;

        let mut buf = [0u8; NODE_SIZE];
        self.file.read_exact(&mut buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => err!(
                CorruptIndex,
                "Unexpected EOF reading node {} from '{}'.",
                id,
                self.path.display()
            ),
            _ => Error::io(&self.path, e),
        })?;
        decode_frame(&buf)
    }

    pub fn write_node(&mut self, id: i32, node: &Node) -> Result<(), Error> {
        let offset = self.node_offset(id);
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|e| Error::io(&self.path, e))?;

        let frame: [u8; NODE_SIZE] = encode_frame(node)?;
        self.file
            .write_all(&frame)
            .and_then(|_| self.file.flush())
            .map_err(|e| Error::io(&self.path, e))?;
        Ok(())
    }

    fn node_offset(&self, id: i32) -> u64 {
        // Seek with the stride recorded in the file, not the compiled one.
        HEADER_SIZE as u64 + id as u64 * self.header.node_size as u64
    }

    fn write_header(&mut self) -> Result<(), Error> {
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(|e| Error::io(&self.path, e))?;

        let frame: [u8; HEADER_SIZE] = encode_frame(&self.header)?;
        self.file
            .write_all(&frame)
            .and_then(|_| self.file.flush())
            .map_err(|e| Error::io(&self.path, e))?;
        Ok(())
    }
}

/// Encode a record into a zero-padded fixed-size frame, little-endian with
/// explicit field widths.
fn encode_frame<T: Encode, const N: usize>(value: &T) -> Result<[u8; N], Error> {
    let config = config::standard().with_fixed_int_encoding();
    let encoded = bincode::encode_to_vec(value, config)
        .map_err(|e| err!(CorruptIndex, "Failed to encode record. {}", e))?;

    if encoded.len() > N {
        return Err(err!(
            CorruptIndex,
            "Record size ({}) does not fit within the frame ({}).",
            encoded.len(),
            N
        ));
    }
    let mut frame = [0u8; N];
    frame[..encoded.len()].copy_from_slice(&encoded);
    Ok(frame)
}

fn decode_frame<T: Decode<()>>(bytes: &[u8]) -> Result<T, Error> {
    let config = config::standard().with_fixed_int_encoding();
    let (decoded, _): (T, usize) = bincode::decode_from_slice(bytes, config)
        .map_err(|e| err!(CorruptIndex, "Failed to decode record. {}", e))?;
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_create_ships_empty_leaf_root() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pk.idx");

        let mut pager = Pager::open(&path).unwrap();
        assert_eq!(pager.header().magic, MAGIC);
        assert_eq!(pager.header().version, 1);
        assert_eq!(pager.root_id(), 0);
        assert_eq!(pager.header().next_id, 1);

        let root = pager.read_node(0).unwrap();
        assert_eq!(root.is_leaf, 1);
        assert_eq!(root.num_keys, 0);
        assert_eq!(root.next_leaf, -1);
    }

    #[test]
    fn test_node_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut pager = Pager::open(&dir.path().join("pk.idx")).unwrap();

        let mut node = Node::leaf();
        node.num_keys = 2;
        node.keys = [7, 9];
        node.offsets = [0, 54];
        node.next_leaf = 3;

        let id = pager.allocate().unwrap();
        pager.write_node(id, &node).unwrap();
        let read = pager.read_node(id).unwrap();

        assert_eq!(read.is_leaf, 1);
        assert_eq!(read.num_keys, 2);
        assert_eq!(read.keys, [7, 9]);
        assert_eq!(read.offsets, [0, 54]);
        assert_eq!(read.next_leaf, 3);
    }

    #[test]
    fn test_allocate_is_monotonic_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pk.idx");

        let first = {
            let mut pager = Pager::open(&path).unwrap();
            pager.allocate().unwrap()
        };
        assert_eq!(first, 1);

        let mut pager = Pager::open(&path).unwrap();
        assert_eq!(pager.allocate().unwrap(), 2);
        assert_eq!(pager.allocate().unwrap(), 3);
    }

    #[test]
    fn test_bad_magic_is_corrupt_index() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pk.idx");
        Pager::open(&path).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        bytes[..4].copy_from_slice(&0xdeadbeefu32.to_le_bytes());
        fs::write(&path, &bytes).unwrap();

        match Pager::open(&path) {
            Err(Error::CorruptIndex(_)) => {}
            other => panic!("Expected CorruptIndex, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_truncated_header_is_corrupt_index() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pk.idx");
        fs::write(&path, [0u8; 10]).unwrap();

        match Pager::open(&path) {
            Err(Error::CorruptIndex(_)) => {}
            other => panic!("Expected CorruptIndex, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_read_past_end_is_corrupt_index() {
        let dir = TempDir::new().unwrap();
        let mut pager = Pager::open(&dir.path().join("pk.idx")).unwrap();

        match pager.read_node(42) {
            Err(Error::CorruptIndex(_)) => {}
            other => panic!("Expected CorruptIndex, got {:?}", other.map(|_| ())),
        }
    }
}
