use bytemuck::{Pod, Zeroable};

pub const EXT2_SUPER_MAGIC: u16 = 0xEF53;
pub const EXT2_SUPERBLOCK_OFFSET: u64 = 1024;
pub const EXT2_ROOT_INO: u32 = 2;
pub const EXT2_GOOD_OLD_REV: u32 = 0;
pub const EXT2_GOOD_OLD_INODE_SIZE: usize = 128;
pub const EXT2_MAX_LOG_BLOCK_SIZE: u32 = 6;

pub const EXT2_FT_UNKNOWN: u8 = 0;
pub const EXT2_FT_REG_FILE: u8 = 1;
pub const EXT2_FT_DIR: u8 = 2;
pub const EXT2_FT_SYMLINK: u8 = 7;

pub const EXT2_S_IFMT: u16 = 0xF000;
pub const EXT2_S_IFLNK: u16 = 0xA000;
pub const EXT2_S_IFREG: u16 = 0x8000;
pub const EXT2_S_IFDIR: u16 = 0x4000;

/// Set by ext4 on inodes whose `i_block` holds an extent tree instead of block pointers.
pub const EXT4_EXTENTS_FL: u32 = 0x80000;

pub const EXT2_NDIR_BLOCKS: usize = 12;
pub const EXT2_IND_BLOCK: usize = EXT2_NDIR_BLOCKS;
pub const EXT2_DIND_BLOCK: usize = EXT2_IND_BLOCK + 1;
pub const EXT2_TIND_BLOCK: usize = EXT2_DIND_BLOCK + 1;
pub const EXT2_N_BLOCKS: usize = EXT2_TIND_BLOCK + 1;

/// Size of the fixed directory entry header preceding the name bytes.
pub const EXT2_DIR_ENTRY_HEADER: usize = 8;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Superblock {
    pub s_inodes_count: u32,
    pub s_blocks_count: u32,
    pub s_r_blocks_count: u32,
    pub s_free_blocks_count: u32,
    pub s_free_inodes_count: u32,
    pub s_first_data_block: u32,
    pub s_log_block_size: u32,
    pub s_log_frag_size: u32,
    pub s_blocks_per_group: u32,
    pub s_frags_per_group: u32,
    pub s_inodes_per_group: u32,
    pub s_mtime: u32,
    pub s_wtime: u32,
    pub s_mnt_count: u16,
    pub s_max_mnt_count: u16,
    pub s_magic: u16,
    pub s_state: u16,
    pub s_errors: u16,
    pub s_minor_rev_level: u16,
    pub s_lastcheck: u32,
    pub s_checkinterval: u32,
    pub s_creator_os: u32,
    pub s_rev_level: u32,
    pub s_def_resuid: u16,
    pub s_def_resgid: u16,
    pub s_first_ino: u32,
    pub s_inode_size: u16,
    pub s_block_group_nr: u16,
    pub s_feature_compat: u32,
    pub s_feature_incompat: u32,
    pub s_feature_ro_compat: u32,
}

impl Superblock {
    pub fn block_size(&self) -> u64 {
        1024u64 << self.s_log_block_size
    }

    /// On-disk inode record size. Revision 0 images always use 128 bytes.
    pub fn inode_size(&self) -> usize {
        if self.s_rev_level == EXT2_GOOD_OLD_REV {
            EXT2_GOOD_OLD_INODE_SIZE
        } else {
            self.s_inode_size as usize
        }
    }

    pub fn group_count(&self) -> u32 {
        if self.s_blocks_per_group == 0 {
            return 1;
        }
        self.s_blocks_count
            .saturating_sub(self.s_first_data_block)
            .div_ceil(self.s_blocks_per_group)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GroupDescriptor {
    pub bg_block_bitmap: u32,
    pub bg_inode_bitmap: u32,
    pub bg_inode_table: u32,
    pub bg_free_blocks_count: u16,
    pub bg_free_inodes_count: u16,
    pub bg_used_dirs_count: u16,
    pub bg_pad: u16,
    pub bg_reserved: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct Inode {
    pub i_mode: u16,
    pub i_uid: u16,
    pub i_size: u32,
    pub i_atime: u32,
    pub i_ctime: u32,
    pub i_mtime: u32,
    pub i_dtime: u32,
    pub i_gid: u16,
    pub i_links_count: u16,
    pub i_blocks: u32,
    pub i_flags: u32,
    pub osd1: u32,
    pub i_block: [u32; EXT2_N_BLOCKS],
    pub i_generation: u32,
    pub i_file_acl: u32,
    /// `i_dir_acl` on directories, upper 32 bits of the size on regular files.
    pub i_size_high: u32,
    pub i_faddr: u32,
    pub osd2: [u8; 12],
}

impl Inode {
    pub fn file_type(&self) -> u16 {
        self.i_mode & EXT2_S_IFMT
    }

    pub fn is_dir(&self) -> bool {
        self.file_type() == EXT2_S_IFDIR
    }

    pub fn is_regular(&self) -> bool {
        self.file_type() == EXT2_S_IFREG
    }

    pub fn is_symlink(&self) -> bool {
        self.file_type() == EXT2_S_IFLNK
    }

    /// Symlinks short enough to live inside `i_block` own no data blocks.
    pub fn is_fast_symlink(&self) -> bool {
        self.is_symlink() && self.i_blocks == 0
    }

    /// Logical size in bytes.
    pub fn size(&self) -> u64 {
        if self.is_regular() {
            ((self.i_size_high as u64) << 32) | self.i_size as u64
        } else {
            self.i_size as u64
        }
    }

    /// Permission bits (`0o7777`).
    pub fn permissions(&self) -> u16 {
        self.i_mode & 0o7777
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub inode: u32,
    pub rec_len: u16,
    pub name_len: u8,
    pub file_type: u8,
    pub name: String,
}
