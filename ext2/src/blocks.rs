use crate::{
    EXT2_DIND_BLOCK, EXT2_IND_BLOCK, EXT2_NDIR_BLOCKS, EXT2_TIND_BLOCK, EXT4_EXTENTS_FL,
    Ext2Error, Ext2Reader, Inode, Result,
};
use log::debug;
use positioned_io2::ReadAt;

impl<R: ReadAt> Ext2Reader<R> {
    /// Number of blocks needed to hold the inode's logical size.
    pub fn data_block_count(&self, inode: &Inode) -> u64 {
        inode.size().div_ceil(self.block_size)
    }

    /// Expands the 15 block pointers of an inode into its data blocks, in file order.
    ///
    /// Zero direct pointers are skipped; a zero inside an indirect block ends that
    /// block's list. Expansion stops once enough blocks for the logical size are known.
    pub fn expand_block_list(&self, inode: &Inode) -> Result<Vec<u32>> {
        if inode.i_flags & EXT4_EXTENTS_FL != 0 {
            return Err(Ext2Error::UnsupportedFeature("extents"));
        }
        if inode.is_fast_symlink() {
            return Ok(Vec::new());
        }

        let wanted = self.data_block_count(inode) as usize;
        let mut blocks = Vec::with_capacity(wanted.min(EXT2_NDIR_BLOCKS + 1024));

        for &block_num in &inode.i_block[..EXT2_NDIR_BLOCKS] {
            if blocks.len() >= wanted {
                return Ok(blocks);
            }
            if block_num != 0 {
                blocks.push(block_num);
            }
        }

        for (index, level) in [(EXT2_IND_BLOCK, 1), (EXT2_DIND_BLOCK, 2), (EXT2_TIND_BLOCK, 3)] {
            let block_num = inode.i_block[index];
            if block_num != 0 && blocks.len() < wanted {
                self.read_indirect(block_num, level, wanted, &mut blocks)?;
            }
        }

        debug!(
            "expanded {} of {} data blocks for a {} byte inode",
            blocks.len(),
            wanted,
            inode.size()
        );
        Ok(blocks)
    }

    /// Appends the data blocks reachable from an indirect block `level` hops deep.
    fn read_indirect(
        &self,
        block_num: u32,
        level: u8,
        wanted: usize,
        out: &mut Vec<u32>,
    ) -> Result<()> {
        for next in self.read_block_pointers(block_num)? {
            if out.len() >= wanted || next == 0 {
                break;
            }

            if level == 1 {
                out.push(next);
            } else {
                self.read_indirect(next, level - 1, wanted, out)?;
            }
        }

        Ok(())
    }
}
