use crate::util::{le_u16, le_u32};
use crate::{DirEntry, EXT2_DIR_ENTRY_HEADER, Ext2Error, Ext2Reader, Inode, Result};
use positioned_io2::ReadAt;

impl<R: ReadAt> Ext2Reader<R> {
    /// Lists every live entry of a directory, `.` and `..` included, in on-disk order.
    pub fn read_dir(&self, inode: &Inode) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        self.walk_directory(inode, |entry| {
            entries.push(entry);
            false
        })?;
        Ok(entries)
    }

    /// Finds the first entry called `name`, stopping the scan at the match.
    pub fn lookup(&self, dir: &Inode, name: &str) -> Result<Option<DirEntry>> {
        let mut found = None;
        self.walk_directory(dir, |entry| {
            if entry.name == name {
                found = Some(entry);
                true
            } else {
                false
            }
        })?;
        Ok(found)
    }

    fn walk_directory<F>(&self, inode: &Inode, mut visit: F) -> Result<()>
    where
        F: FnMut(DirEntry) -> bool,
    {
        for block_num in self.expand_block_list(inode)? {
            let block_data = self.read_block(block_num)?;
            for entry in parse_directory_block(&block_data, block_num)? {
                if visit(entry) {
                    return Ok(());
                }
            }
        }

        Ok(())
    }
}

/// Decodes the directory entries packed in one block, skipping deleted slots (inode 0).
pub fn parse_directory_block(block_data: &[u8], block_num: u32) -> Result<Vec<DirEntry>> {
    let mut entries = Vec::new();
    let mut offset = 0;

    while offset < block_data.len() {
        let invalid = Ext2Error::InvalidDirectoryEntry {
            block: block_num,
            offset,
        };
        if offset + EXT2_DIR_ENTRY_HEADER > block_data.len() {
            return Err(invalid);
        }

        let inode = le_u32(block_data, offset);
        let rec_len = le_u16(block_data, offset + 4);
        if rec_len == 0 || rec_len as usize > block_data.len() - offset {
            return Err(invalid);
        }

        let name_len = block_data[offset + 6];
        let file_type = block_data[offset + 7];
        if (rec_len as usize) < EXT2_DIR_ENTRY_HEADER + name_len as usize {
            return Err(invalid);
        }

        if inode != 0 {
            let start = offset + EXT2_DIR_ENTRY_HEADER;
            let name_bytes = &block_data[start..start + name_len as usize];
            entries.push(DirEntry {
                inode,
                rec_len,
                name_len,
                file_type,
                name: String::from_utf8_lossy(name_bytes).to_string(),
            });
        }

        offset += rec_len as usize;
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ImageBuilder;
    use crate::{EXT2_FT_DIR, EXT2_FT_REG_FILE, EXT2_ROOT_INO};

    fn put_entry(block: &mut [u8], offset: usize, inode: u32, rec_len: u16, name: &[u8]) {
        block[offset..offset + 4].copy_from_slice(&inode.to_le_bytes());
        block[offset + 4..offset + 6].copy_from_slice(&rec_len.to_le_bytes());
        block[offset + 6] = name.len() as u8;
        block[offset + 7] = EXT2_FT_REG_FILE;
        block[offset + 8..offset + 8 + name.len()].copy_from_slice(name);
    }

    #[test]
    fn walks_entries_by_record_length() {
        let mut block = vec![0u8; 1024];
        put_entry(&mut block, 0, 11, 20, b"abc");
        put_entry(&mut block, 20, 12, 1004, b"longer-name");
        let entries = parse_directory_block(&block, 7).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "abc");
        assert_eq!(entries[0].rec_len, 20);
        assert_eq!(entries[1].inode, 12);
        assert_eq!(entries[1].name, "longer-name");
    }

    #[test]
    fn skips_deleted_slots() {
        let mut block = vec![0u8; 1024];
        put_entry(&mut block, 0, 0, 12, b"old");
        put_entry(&mut block, 12, 13, 1012, b"kept");
        let entries = parse_directory_block(&block, 7).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "kept");
    }

    #[test]
    fn zero_record_length_is_rejected() {
        let mut block = vec![0u8; 1024];
        put_entry(&mut block, 0, 11, 0, b"loop");
        assert!(matches!(
            parse_directory_block(&block, 9),
            Err(Ext2Error::InvalidDirectoryEntry {
                block: 9,
                offset: 0
            })
        ));
    }

    #[test]
    fn record_past_block_end_is_rejected() {
        let mut block = vec![0u8; 1024];
        put_entry(&mut block, 0, 11, 12, b"a");
        put_entry(&mut block, 12, 12, 1020, b"b");
        assert!(matches!(
            parse_directory_block(&block, 9),
            Err(Ext2Error::InvalidDirectoryEntry { offset: 12, .. })
        ));
    }

    #[test]
    fn name_longer_than_record_is_rejected() {
        let mut block = vec![0u8; 1024];
        put_entry(&mut block, 0, 11, 1024, b"x");
        block[6] = 200;
        block[4..6].copy_from_slice(&12u16.to_le_bytes());
        assert!(parse_directory_block(&block, 9).is_err());
    }

    #[test]
    fn read_dir_lists_dot_entries_in_disk_order() {
        let mut builder = ImageBuilder::new(1024);
        builder.add_file(EXT2_ROOT_INO, "zeta", b"z");
        builder.add_dir(EXT2_ROOT_INO, "alpha");
        let reader = Ext2Reader::new(builder.build()).unwrap();
        let root = reader.read_inode(EXT2_ROOT_INO).unwrap();

        let names: Vec<_> = reader
            .read_dir(&root)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, [".", "..", "zeta", "alpha"]);

        let alpha = reader.lookup(&root, "alpha").unwrap().unwrap();
        assert_eq!(alpha.file_type, EXT2_FT_DIR);
        assert!(reader.lookup(&root, "missing").unwrap().is_none());
    }

    #[test]
    fn directories_spanning_several_blocks_are_walked() {
        let mut builder = ImageBuilder::new(1024);
        for i in 0..120 {
            builder.add_file(EXT2_ROOT_INO, &format!("file-with-a-long-name-{i:03}"), b"x");
        }
        let reader = Ext2Reader::new(builder.build()).unwrap();
        let root = reader.read_inode(EXT2_ROOT_INO).unwrap();
        assert!(root.size() > 1024);

        let entries = reader.read_dir(&root).unwrap();
        assert_eq!(entries.len(), 122);
        let (_, last) = reader.resolve_path("/file-with-a-long-name-119").unwrap();
        assert_eq!(last.size(), 1);
    }
}
