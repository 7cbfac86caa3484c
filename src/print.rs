use crate::command::CommandError;
use ext2::Ext2Reader;
use positioned_io2::ReadAt;
use std::io::{Read, Write};

/// Streams the file at `path` to `out`.
///
/// With `max_lines` set, output stops right after the newline that completes that many
/// lines; the remaining blocks are never read.
pub fn print_file<R: ReadAt, W: Write>(
    reader: &Ext2Reader<R>,
    path: &str,
    max_lines: Option<usize>,
    out: &mut W,
) -> Result<u64, CommandError> {
    let mut file = reader.open_file(path)?;

    let Some(max_lines) = max_lines else {
        return Ok(std::io::copy(&mut file, out)?);
    };

    let mut buf = vec![0u8; reader.block_size() as usize];
    let mut lines = 0;
    let mut written = 0u64;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }

        let mut end = n;
        for (i, _) in buf[..n].iter().enumerate().filter(|(_, b)| **b == b'\n') {
            lines += 1;
            if lines == max_lines {
                end = i + 1;
                break;
            }
        }

        out.write_all(&buf[..end])?;
        written += end as u64;
        if lines == max_lines {
            break;
        }
    }

    Ok(written)
}
