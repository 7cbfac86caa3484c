use crate::command::{Command, CommandError};
use crate::help::print_help;
use crate::print::print_file;
use crate::tree::run_tree;
use ext2::{Ext2Error, Ext2Reader};
use log::debug;
use positioned_io2::ReadAt;
use std::io::{BufRead, Write};

pub const PROMPT: &str = "ext2> ";

/// Interactive command loop over one opened image.
pub struct Shell<'a, R: ReadAt> {
    reader: &'a Ext2Reader<R>,
}

impl<'a, R: ReadAt> Shell<'a, R> {
    pub fn new(reader: &'a Ext2Reader<R>) -> Self {
        Self { reader }
    }

    /// Reads commands until `exit` or end of input. Command failures are reported on
    /// `err` and never end the loop.
    pub fn run<I, O, E>(&self, mut input: I, out: &mut O, err: &mut E) -> std::io::Result<()>
    where
        I: BufRead,
        O: Write,
        E: Write,
    {
        let mut buf = Vec::new();
        loop {
            write!(out, "{PROMPT}")?;
            out.flush()?;

            buf.clear();
            if input.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\n', '\r']);

            match Command::parse(line) {
                Ok(None) => continue,
                Ok(Some(Command::Exit)) => break,
                Ok(Some(command)) => self.execute(command, out, err)?,
                Err(e) => {
                    writeln!(err, "{e}")?;
                    print_help(None, out)?;
                }
            }
        }

        Ok(())
    }

    fn execute<O: Write, E: Write>(
        &self,
        command: Command,
        out: &mut O,
        err: &mut E,
    ) -> std::io::Result<()> {
        debug!("executing {command:?}");
        let (name, result) = match command {
            Command::Tree { path, options } => (
                "tree",
                run_tree(self.reader, &path, &options, out).map(|_| ()),
            ),
            Command::Print { path, max_lines } => (
                "print",
                print_file(self.reader, &path, max_lines, out).map(|_| ()),
            ),
            Command::Help(topic) => (
                "help",
                print_help(topic.as_deref(), out).map_err(CommandError::from),
            ),
            Command::Exit => return Ok(()),
        };
        out.flush()?;

        if let Err(e) = result {
            writeln!(err, "{name}: {e}")?;
            if matches!(e, CommandError::Fs(Ext2Error::PathNotFound(_))) {
                print_help(Some(name), out)?;
            }
        }

        Ok(())
    }
}
