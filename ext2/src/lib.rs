//! Read-only interpretation of ext2 filesystem images.
//!
//! [`Ext2Reader`] bootstraps from the superblock and first group descriptor and then
//! answers inode, directory and file-content queries with positional reads against the
//! underlying image. Nothing is ever written back.

use crate::util::ReadAtExt;
use log::{debug, warn};
use positioned_io2::ReadAt;
use std::fs::File;
use thiserror::Error;
use unix_path::Path;

mod blocks;
#[cfg(any(test, feature = "builder"))]
pub mod builder;
mod dir;
mod file;
mod structs;
mod util;

pub use file::Ext2FileReader;
pub use structs::*;

#[derive(Error, Debug)]
pub enum Ext2Error {
    #[error("Cannot open image {path}: {source}")]
    Open {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Short read: expected {len} bytes at offset {offset}")]
    ShortRead { offset: u64, len: usize },
    #[error("Block {block} lies outside the filesystem ({blocks_count} blocks)")]
    Seek { block: u32, blocks_count: u32 },
    #[error("Invalid superblock magic number, not an ext2 image")]
    InvalidSuperblock,
    #[error("Unsupported filesystem feature: {0}")]
    UnsupportedFeature(&'static str),
    #[error("Invalid inode number: {0}")]
    InvalidInode(u32),
    #[error("Path not found: {0}")]
    PathNotFound(String),
    #[error("Not a directory: {0}")]
    NotADirectory(String),
    #[error("Is a directory: {0}")]
    IsADirectory(String),
    #[error("Invalid directory entry in block {block} at offset {offset}")]
    InvalidDirectoryEntry { block: u32, offset: usize },
    #[error("Corrupt image: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, Ext2Error>;

/// Handle on one ext2 image.
///
/// Geometry is read once in [`Ext2Reader::new`] and never changes afterwards. Only the
/// inode table of block group 0 is consulted, so images spanning several block groups
/// resolve inodes of group 0 only.
pub struct Ext2Reader<R: ReadAt> {
    reader: R,
    superblock: Superblock,
    group_descriptor: GroupDescriptor,
    block_size: u64,
    inode_size: usize,
}

impl Ext2Reader<File> {
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Ext2Error::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::new(file)
    }
}

impl<R: ReadAt> Ext2Reader<R> {
    pub fn new(reader: R) -> Result<Self> {
        let superblock = Self::read_superblock(&reader)?;
        let block_size = superblock.block_size();
        let inode_size = superblock.inode_size();
        if inode_size < EXT2_GOOD_OLD_INODE_SIZE || inode_size as u64 > block_size {
            return Err(Ext2Error::Corrupt(format!(
                "inode size {inode_size} with block size {block_size}"
            )));
        }

        let group_count = superblock.group_count();
        if group_count > 1 {
            warn!(
                "image has {group_count} block groups, only the inode table of group 0 is used"
            );
        }

        let gd_offset = (superblock.s_first_data_block as u64 + 1) * block_size;
        let group_descriptor = reader.read_pod_owned::<GroupDescriptor>(gd_offset)?;
        debug!(
            "ext2 image: block size {}, inode size {}, {} inodes, inode table at block {}",
            block_size, inode_size, superblock.s_inodes_count, group_descriptor.bg_inode_table
        );

        Ok(Ext2Reader {
            reader,
            superblock,
            group_descriptor,
            block_size,
            inode_size,
        })
    }

    fn read_superblock(reader: &R) -> Result<Superblock> {
        let s = reader.read_pod_owned::<Superblock>(EXT2_SUPERBLOCK_OFFSET)?;
        if s.s_magic != EXT2_SUPER_MAGIC {
            return Err(Ext2Error::InvalidSuperblock);
        }
        if s.s_log_block_size > EXT2_MAX_LOG_BLOCK_SIZE {
            return Err(Ext2Error::UnsupportedFeature("block size above 64 KiB"));
        }

        Ok(s)
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn inode_size(&self) -> usize {
        self.inode_size
    }

    pub fn inode_table_block(&self) -> u32 {
        self.group_descriptor.bg_inode_table
    }

    /// Reads one whole block.
    pub fn read_block(&self, block_num: u32) -> Result<Vec<u8>> {
        self.check_block(block_num)?;
        let offset = block_num as u64 * self.block_size;
        self.reader
            .read_bytes_at(offset, self.block_size as usize)
    }

    /// Reads an indirect block as its array of little-endian block pointers.
    pub fn read_block_pointers(&self, block_num: u32) -> Result<Vec<u32>> {
        self.check_block(block_num)?;
        let offset = block_num as u64 * self.block_size;
        self.reader
            .read_pod_vec::<u32>(offset, self.block_size as usize / 4)
    }

    fn check_block(&self, block_num: u32) -> Result<()> {
        if block_num >= self.superblock.s_blocks_count {
            return Err(Ext2Error::Seek {
                block: block_num,
                blocks_count: self.superblock.s_blocks_count,
            });
        }
        Ok(())
    }

    /// Reads the inode with the given 1-based number from the inode table.
    pub fn read_inode(&self, inode_num: u32) -> Result<Inode> {
        if inode_num == 0 || inode_num > self.superblock.s_inodes_count {
            return Err(Ext2Error::InvalidInode(inode_num));
        }

        let inode_offset = self.inode_table_block() as u64 * self.block_size
            + (inode_num - 1) as u64 * self.inode_size as u64;
        let raw = self.reader.read_bytes_at(inode_offset, self.inode_size)?;

        Ok(bytemuck::pod_read_unaligned::<Inode>(
            &raw[..std::mem::size_of::<Inode>()],
        ))
    }

    /// Resolves a slash separated path, always starting at the root directory.
    ///
    /// A missing component and a non-directory in the middle of the path both yield
    /// [`Ext2Error::PathNotFound`].
    pub fn resolve_path<P: AsRef<Path>>(&self, path: P) -> Result<(u32, Inode)> {
        let path = path.as_ref();
        let path_str = path
            .as_unix_str()
            .to_str()
            .ok_or_else(|| Ext2Error::PathNotFound("Invalid path encoding".to_string()))?;

        if path_str == "/" || path_str == "." {
            return Ok((EXT2_ROOT_INO, self.read_inode(EXT2_ROOT_INO)?));
        }

        let mut current_ino = EXT2_ROOT_INO;
        let mut current = self.read_inode(current_ino)?;

        for component in path_str.split('/').filter(|s| !s.is_empty()) {
            if !current.is_dir() {
                debug!("{path_str}: inode {current_ino} is not a directory before '{component}'");
                return Err(Ext2Error::PathNotFound(path_str.to_string()));
            }

            let Some(entry) = self.lookup(&current, component)? else {
                debug!("{path_str}: no entry '{component}' in inode {current_ino}");
                return Err(Ext2Error::PathNotFound(path_str.to_string()));
            };

            current_ino = entry.inode;
            current = self.read_inode(current_ino)?;
        }

        Ok((current_ino, current))
    }

    /// Opens a non-directory inode for sequential reading.
    pub fn open_file<P: AsRef<Path>>(&self, path: P) -> Result<Ext2FileReader<'_, R>> {
        let path = path.as_ref();
        let (_, inode) = self.resolve_path(path)?;

        if inode.is_dir() {
            return Err(Ext2Error::IsADirectory(path.display().to_string()));
        }

        Ext2FileReader::new(self, inode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ImageBuilder;

    fn sample_image() -> Vec<u8> {
        let mut builder = ImageBuilder::new(1024);
        let docs = builder.add_dir(EXT2_ROOT_INO, "docs");
        builder.add_file(docs, "notes.md", b"# notes\n");
        builder.add_file(EXT2_ROOT_INO, "file.txt", b"0123456789");
        builder.build()
    }

    #[test]
    fn bootstrap_reads_geometry() {
        let reader = Ext2Reader::new(sample_image()).unwrap();
        assert_eq!(reader.block_size(), 1024);
        assert_eq!(reader.inode_size(), 128);
        assert_eq!(reader.superblock().s_first_data_block, 1);
        assert!(reader.inode_table_block() > 2);
    }

    #[test]
    fn bootstrap_rejects_bad_magic() {
        let mut image = sample_image();
        image[1024 + 56] = 0;
        assert!(matches!(
            Ext2Reader::new(image),
            Err(Ext2Error::InvalidSuperblock)
        ));
    }

    #[test]
    fn bootstrap_rejects_truncated_image() {
        let image = vec![0u8; 1100];
        assert!(matches!(
            Ext2Reader::new(image),
            Err(Ext2Error::ShortRead { offset: 1024, .. })
        ));
    }

    #[test]
    fn open_reports_missing_image() {
        let err = Ext2Reader::open("/nonexistent/image.ext2").err().unwrap();
        assert!(matches!(err, Ext2Error::Open { .. }));
    }

    #[test]
    fn root_resolves_from_slash_and_dot() {
        let reader = Ext2Reader::new(sample_image()).unwrap();
        for path in ["/", "."] {
            let (ino, inode) = reader.resolve_path(path).unwrap();
            assert_eq!(ino, EXT2_ROOT_INO);
            assert!(inode.is_dir());
        }
    }

    #[test]
    fn resolves_nested_paths_and_extra_slashes() {
        let reader = Ext2Reader::new(sample_image()).unwrap();
        let (_, notes) = reader.resolve_path("/docs/notes.md").unwrap();
        assert!(notes.is_regular());
        assert_eq!(notes.size(), 8);

        let (a, _) = reader.resolve_path("docs//notes.md").unwrap();
        let (b, _) = reader.resolve_path("/docs/notes.md/").unwrap();
        assert_eq!(a, b);

        let (dotdot, _) = reader.resolve_path("/docs/..").unwrap();
        assert_eq!(dotdot, EXT2_ROOT_INO);
    }

    #[test]
    fn resolution_is_idempotent() {
        let reader = Ext2Reader::new(sample_image()).unwrap();
        let first = reader.resolve_path("/file.txt").unwrap();
        let second = reader.resolve_path("/file.txt").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_component_and_file_prefix_are_not_found() {
        let reader = Ext2Reader::new(sample_image()).unwrap();
        assert!(matches!(
            reader.resolve_path("/nope"),
            Err(Ext2Error::PathNotFound(_))
        ));
        assert!(matches!(
            reader.resolve_path("/file.txt/inner"),
            Err(Ext2Error::PathNotFound(_))
        ));
    }

    #[test]
    fn inode_zero_and_out_of_range_are_rejected() {
        let reader = Ext2Reader::new(sample_image()).unwrap();
        assert!(matches!(reader.read_inode(0), Err(Ext2Error::InvalidInode(0))));
        let past = reader.superblock().s_inodes_count + 1;
        assert!(matches!(
            reader.read_inode(past),
            Err(Ext2Error::InvalidInode(_))
        ));
    }

    #[test]
    fn read_block_outside_filesystem_fails() {
        let reader = Ext2Reader::new(sample_image()).unwrap();
        let count = reader.superblock().s_blocks_count;
        assert!(matches!(
            reader.read_block(count),
            Err(Ext2Error::Seek { .. })
        ));
        assert_eq!(reader.read_block(count - 1).unwrap().len(), 1024);
    }

    #[test]
    fn larger_inode_records_are_padded() {
        let mut builder = ImageBuilder::new(4096).inode_size(256);
        builder.add_file(EXT2_ROOT_INO, "a", b"abc");
        let reader = Ext2Reader::new(builder.build()).unwrap();
        assert_eq!(reader.inode_size(), 256);
        let (_, inode) = reader.resolve_path("/a").unwrap();
        assert_eq!(inode.size(), 3);
    }

    #[test]
    fn open_file_rejects_directories() {
        let reader = Ext2Reader::new(sample_image()).unwrap();
        assert!(matches!(
            reader.open_file("/docs"),
            Err(Ext2Error::IsADirectory(_))
        ));
    }
}
