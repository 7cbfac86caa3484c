use crate::{EXT2_N_BLOCKS, Ext2Reader, Inode, Result};
use positioned_io2::ReadAt;
use std::io::Read;

/// Sequential reader over the contents of one inode.
///
/// Blocks are fetched strictly in the order given by
/// [`Ext2Reader::expand_block_list`], and no byte past the inode's logical size is
/// ever returned, even though the last block is stored whole on disk.
pub struct Ext2FileReader<'a, R: ReadAt> {
    reader: &'a Ext2Reader<R>,
    blocks: Vec<u32>,
    inline: Option<Vec<u8>>,
    current: Option<(usize, Vec<u8>)>,
    position: u64,
    size: u64,
}

impl<'a, R: ReadAt> Ext2FileReader<'a, R> {
    pub fn new(reader: &'a Ext2Reader<R>, inode: Inode) -> Result<Self> {
        let size = inode.size();
        let inline = inode.is_fast_symlink().then(|| {
            let mut target: Vec<u8> = inode.i_block.iter().flat_map(|w| w.to_le_bytes()).collect();
            target.truncate((size as usize).min(EXT2_N_BLOCKS * 4));
            target
        });
        let blocks = reader.expand_block_list(&inode)?;

        Ok(Self {
            reader,
            blocks,
            inline,
            current: None,
            position: 0,
            size,
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    fn block(&mut self, index: usize) -> std::io::Result<&[u8]> {
        let cached = matches!(&self.current, Some((i, _)) if *i == index);
        if !cached {
            let data = self
                .reader
                .read_block(self.blocks[index])
                .map_err(std::io::Error::other)?;
            self.current = Some((index, data));
        }

        Ok(self.current.as_ref().map(|(_, data)| data.as_slice()).unwrap_or(&[]))
    }
}

impl<'a, R: ReadAt> Read for Ext2FileReader<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.position >= self.size || buf.is_empty() {
            return Ok(0);
        }

        if let Some(inline) = &self.inline {
            let start = self.position as usize;
            let n = std::cmp::min(buf.len(), inline.len().saturating_sub(start));
            buf[..n].copy_from_slice(&inline[start..start + n]);
            self.position += n as u64;
            return Ok(n);
        }

        let block_size = self.reader.block_size();
        let index = (self.position / block_size) as usize;
        if index >= self.blocks.len() {
            // Holes were dropped from the block list, so the data ends early.
            return Ok(0);
        }

        let skip = (self.position % block_size) as usize;
        let remaining = self.size - self.position;
        let to_read = std::cmp::min(buf.len() as u64, remaining)
            .min(block_size - skip as u64) as usize;

        let data = self.block(index)?;
        buf[..to_read].copy_from_slice(&data[skip..skip + to_read]);
        self.position += to_read as u64;

        Ok(to_read)
    }
}
