use crate::{Ext2Error, Result};
use positioned_io2::ReadAt;

pub trait ReadAtExt {
    fn read_bytes_at(&self, offset: u64, len: usize) -> Result<Vec<u8>>;
    fn read_pod_owned<T: bytemuck::Pod>(&self, offset: u64) -> Result<T>;
    fn read_pod_vec<T: bytemuck::Pod>(&self, offset: u64, count: usize) -> Result<Vec<T>>;
}

impl<R: ReadAt> ReadAtExt for R {
    fn read_bytes_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact_at(offset, &mut buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Ext2Error::ShortRead { offset, len }
            } else {
                Ext2Error::Io(e)
            }
        })?;
        Ok(buf)
    }

    fn read_pod_owned<T: bytemuck::Pod>(&self, offset: u64) -> Result<T> {
        let buf = self.read_bytes_at(offset, std::mem::size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned::<T>(&buf))
    }

    fn read_pod_vec<T: bytemuck::Pod>(&self, offset: u64, count: usize) -> Result<Vec<T>> {
        let buf = self.read_bytes_at(offset, std::mem::size_of::<T>() * count)?;
        Ok(buf
            .chunks_exact(std::mem::size_of::<T>())
            .map(bytemuck::pod_read_unaligned::<T>)
            .collect())
    }
}

pub(crate) fn le_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

pub(crate) fn le_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}
