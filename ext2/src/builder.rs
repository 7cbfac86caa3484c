//! In-memory builder for small single-group ext2 images.
//!
//! Used by test suites to synthesize fixtures. Layout:
//!
//! ```text
//!   superblock at byte 1024 (block 1 with 1 KiB blocks, block 0 otherwise)
//!   group descriptor table, block bitmap, inode bitmap, inode table
//!   data and indirect blocks, allocated sequentially
//! ```
//!
//! Directory entries are written in insertion order, which is the order the reader
//! reports them in.

use crate::{
    EXT2_DIND_BLOCK, EXT2_DIR_ENTRY_HEADER, EXT2_FT_DIR, EXT2_FT_REG_FILE, EXT2_FT_SYMLINK,
    EXT2_FT_UNKNOWN, EXT2_IND_BLOCK, EXT2_N_BLOCKS, EXT2_NDIR_BLOCKS, EXT2_ROOT_INO,
    EXT2_S_IFDIR, EXT2_S_IFLNK, EXT2_S_IFMT, EXT2_S_IFREG, EXT2_SUPER_MAGIC,
    EXT2_SUPERBLOCK_OFFSET, GroupDescriptor, Inode, Superblock,
};
use bytemuck::Zeroable;
use std::collections::BTreeMap;

const FIRST_FREE_INO: u32 = 11;

struct Node {
    mode: u16,
    parent: u32,
    data: Vec<u8>,
    links: u16,
    children: Vec<(String, u32)>,
}

pub struct ImageBuilder {
    block_size: usize,
    inode_size: usize,
    next_ino: u32,
    nodes: BTreeMap<u32, Node>,
}

impl ImageBuilder {
    /// # Panics
    ///
    /// Panics unless `block_size` is 1024, 2048 or 4096.
    pub fn new(block_size: usize) -> Self {
        assert!(
            matches!(block_size, 1024 | 2048 | 4096),
            "unsupported block size {block_size}"
        );

        let mut nodes = BTreeMap::new();
        nodes.insert(
            EXT2_ROOT_INO,
            Node {
                mode: EXT2_S_IFDIR | 0o755,
                parent: EXT2_ROOT_INO,
                data: Vec::new(),
                links: 2,
                children: Vec::new(),
            },
        );

        ImageBuilder {
            block_size,
            inode_size: 128,
            next_ino: FIRST_FREE_INO,
            nodes,
        }
    }

    pub fn inode_size(mut self, inode_size: usize) -> Self {
        assert!(inode_size >= 128 && inode_size.is_power_of_two());
        self.inode_size = inode_size;
        self
    }

    pub fn add_dir(&mut self, parent: u32, name: &str) -> u32 {
        let ino = self.insert(parent, name, EXT2_S_IFDIR | 0o755, Vec::new());
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.links += 1;
        }
        ino
    }

    pub fn add_file(&mut self, parent: u32, name: &str, data: &[u8]) -> u32 {
        self.insert(parent, name, EXT2_S_IFREG | 0o644, data.to_vec())
    }

    pub fn add_symlink(&mut self, parent: u32, name: &str, target: &str) -> u32 {
        self.insert(parent, name, EXT2_S_IFLNK | 0o777, target.as_bytes().to_vec())
    }

    /// Adds another directory entry for an existing inode.
    pub fn add_link(&mut self, parent: u32, name: &str, ino: u32) {
        self.node_mut(parent).children.push((name.to_string(), ino));
        self.node_mut(ino).links += 1;
    }

    pub fn set_permissions(&mut self, ino: u32, perm: u16) {
        let node = self.node_mut(ino);
        node.mode = (node.mode & EXT2_S_IFMT) | (perm & 0o7777);
    }

    fn insert(&mut self, parent: u32, name: &str, mode: u16, data: Vec<u8>) -> u32 {
        let ino = self.next_ino;
        self.next_ino += 1;
        self.nodes.insert(
            ino,
            Node {
                mode,
                parent,
                data,
                links: if mode & EXT2_S_IFMT == EXT2_S_IFDIR { 2 } else { 1 },
                children: Vec::new(),
            },
        );
        self.node_mut(parent).children.push((name.to_string(), ino));
        ino
    }

    fn node_mut(&mut self, ino: u32) -> &mut Node {
        self.nodes
            .get_mut(&ino)
            .unwrap_or_else(|| panic!("no inode {ino} in builder"))
    }

    fn file_type(&self, ino: u32) -> u8 {
        match self.nodes[&ino].mode & EXT2_S_IFMT {
            EXT2_S_IFREG => EXT2_FT_REG_FILE,
            EXT2_S_IFDIR => EXT2_FT_DIR,
            EXT2_S_IFLNK => EXT2_FT_SYMLINK,
            _ => EXT2_FT_UNKNOWN,
        }
    }

    /// Packs `.`, `..` and the children into whole directory blocks. The last entry of
    /// each block stretches to the block end.
    fn directory_data(&self, ino: u32) -> Vec<u8> {
        let node = &self.nodes[&ino];
        let mut entries = vec![
            (".".to_string(), ino, EXT2_FT_DIR),
            ("..".to_string(), node.parent, EXT2_FT_DIR),
        ];
        entries.extend(
            node.children
                .iter()
                .map(|(name, child)| (name.clone(), *child, self.file_type(*child))),
        );

        let bs = self.block_size;
        let mut data = vec![0u8; bs];
        let mut block_start = 0;
        let mut offset = 0;
        let mut last_entry = 0;

        for (name, child, file_type) in entries {
            let rec_len = (EXT2_DIR_ENTRY_HEADER + name.len()).next_multiple_of(4);
            if offset + rec_len > block_start + bs {
                let stretched = (block_start + bs - last_entry) as u16;
                data[last_entry + 4..last_entry + 6].copy_from_slice(&stretched.to_le_bytes());
                block_start += bs;
                offset = block_start;
                data.resize(block_start + bs, 0);
            }

            data[offset..offset + 4].copy_from_slice(&child.to_le_bytes());
            data[offset + 4..offset + 6].copy_from_slice(&(rec_len as u16).to_le_bytes());
            data[offset + 6] = name.len() as u8;
            data[offset + 7] = file_type;
            data[offset + 8..offset + 8 + name.len()].copy_from_slice(name.as_bytes());
            last_entry = offset;
            offset += rec_len;
        }

        let stretched = (block_start + bs - last_entry) as u16;
        data[last_entry + 4..last_entry + 6].copy_from_slice(&stretched.to_le_bytes());
        data
    }

    pub fn build(&self) -> Vec<u8> {
        let bs = self.block_size;
        let first_data_block = if bs == 1024 { 1u32 } else { 0 };
        let gdt_block = first_data_block + 1;
        let block_bitmap = gdt_block + 1;
        let inode_bitmap = gdt_block + 2;
        let inode_table = gdt_block + 3;

        let num_inodes = (self.next_ino + 16).next_multiple_of(8);
        let inode_table_blocks = (num_inodes as usize * self.inode_size).div_ceil(bs) as u32;

        let mut image = Image {
            bytes: vec![0u8; (inode_table + inode_table_blocks) as usize * bs],
            block_size: bs,
            next_block: inode_table + inode_table_blocks,
        };

        let mut dir_count = 0u16;
        for (&ino, node) in &self.nodes {
            let mut inode = Inode::zeroed();
            inode.i_mode = node.mode;
            inode.i_links_count = node.links;

            let is_dir = node.mode & EXT2_S_IFMT == EXT2_S_IFDIR;
            let is_fast_symlink =
                node.mode & EXT2_S_IFMT == EXT2_S_IFLNK && node.data.len() < EXT2_N_BLOCKS * 4;
            let data = if is_dir {
                dir_count += 1;
                self.directory_data(ino)
            } else {
                node.data.clone()
            };
            inode.i_size = data.len() as u32;

            if is_fast_symlink {
                for (i, chunk) in data.chunks(4).enumerate() {
                    let mut word = [0u8; 4];
                    word[..chunk.len()].copy_from_slice(chunk);
                    inode.i_block[i] = u32::from_le_bytes(word);
                }
            } else {
                let allocated = image.store(&data, &mut inode.i_block);
                inode.i_blocks = allocated * (bs / 512) as u32;
            }

            let offset = inode_table as usize * bs + (ino as usize - 1) * self.inode_size;
            image.bytes[offset..offset + std::mem::size_of::<Inode>()]
                .copy_from_slice(bytemuck::bytes_of(&inode));
        }

        let blocks_count = image.next_block;
        image.bytes.resize(blocks_count as usize * bs, 0);

        for block in first_data_block..blocks_count {
            let bit = (block - first_data_block) as usize;
            image.bytes[block_bitmap as usize * bs + bit / 8] |= 1 << (bit % 8);
        }
        for ino in 1..self.next_ino {
            let bit = ino as usize - 1;
            image.bytes[inode_bitmap as usize * bs + bit / 8] |= 1 << (bit % 8);
        }

        let mut gd = GroupDescriptor::zeroed();
        gd.bg_block_bitmap = block_bitmap;
        gd.bg_inode_bitmap = inode_bitmap;
        gd.bg_inode_table = inode_table;
        gd.bg_free_inodes_count = (num_inodes + 1 - self.next_ino) as u16;
        gd.bg_used_dirs_count = dir_count;
        let gd_offset = gdt_block as usize * bs;
        image.bytes[gd_offset..gd_offset + std::mem::size_of::<GroupDescriptor>()]
            .copy_from_slice(bytemuck::bytes_of(&gd));

        let mut sb = Superblock::zeroed();
        sb.s_inodes_count = num_inodes;
        sb.s_blocks_count = blocks_count;
        sb.s_free_inodes_count = num_inodes + 1 - self.next_ino;
        sb.s_first_data_block = first_data_block;
        sb.s_log_block_size = (bs / 1024).trailing_zeros();
        sb.s_log_frag_size = sb.s_log_block_size;
        sb.s_blocks_per_group = (bs * 8) as u32;
        sb.s_frags_per_group = sb.s_blocks_per_group;
        sb.s_inodes_per_group = num_inodes;
        sb.s_max_mnt_count = u16::MAX;
        sb.s_magic = EXT2_SUPER_MAGIC;
        sb.s_state = 1;
        sb.s_errors = 1;
        sb.s_rev_level = 1;
        sb.s_first_ino = FIRST_FREE_INO;
        sb.s_inode_size = self.inode_size as u16;
        let sb_offset = EXT2_SUPERBLOCK_OFFSET as usize;
        image.bytes[sb_offset..sb_offset + std::mem::size_of::<Superblock>()]
            .copy_from_slice(bytemuck::bytes_of(&sb));

        image.bytes
    }
}

struct Image {
    bytes: Vec<u8>,
    block_size: usize,
    next_block: u32,
}

impl Image {
    fn alloc(&mut self) -> u32 {
        let block = self.next_block;
        self.next_block += 1;
        self.bytes
            .resize(self.next_block as usize * self.block_size, 0);
        block
    }

    fn write_u32(&mut self, block: u32, index: usize, value: u32) {
        let offset = block as usize * self.block_size + index * 4;
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    /// Writes `data` into freshly allocated blocks and fills in the pointer array.
    /// Returns the number of blocks used, indirect blocks included.
    fn store(&mut self, data: &[u8], i_block: &mut [u32; EXT2_N_BLOCKS]) -> u32 {
        let bs = self.block_size;
        let per_block = bs / 4;
        let data_blocks: Vec<u32> = data
            .chunks(bs)
            .map(|chunk| {
                let block = self.alloc();
                let offset = block as usize * bs;
                self.bytes[offset..offset + chunk.len()].copy_from_slice(chunk);
                block
            })
            .collect();
        assert!(
            data_blocks.len() <= EXT2_NDIR_BLOCKS + per_block + per_block * per_block,
            "triple indirection is not supported by the builder"
        );

        let mut used = data_blocks.len() as u32;
        let (direct, rest) = data_blocks.split_at(data_blocks.len().min(EXT2_NDIR_BLOCKS));
        i_block[..direct.len()].copy_from_slice(direct);
        if rest.is_empty() {
            return used;
        }

        let (single, rest) = rest.split_at(rest.len().min(per_block));
        let indirect = self.alloc();
        used += 1;
        i_block[EXT2_IND_BLOCK] = indirect;
        for (i, &block) in single.iter().enumerate() {
            self.write_u32(indirect, i, block);
        }
        if rest.is_empty() {
            return used;
        }

        let double = self.alloc();
        used += 1;
        i_block[EXT2_DIND_BLOCK] = double;
        for (i, chunk) in rest.chunks(per_block).enumerate() {
            let level1 = self.alloc();
            used += 1;
            self.write_u32(double, i, level1);
            for (j, &block) in chunk.iter().enumerate() {
                self.write_u32(level1, j, block);
            }
        }

        used
    }
}
