//! Interactive read-only browser for ext2 filesystem images.
//!
//! The image itself is interpreted by the [`ext2`] crate; this crate adds the `tree`,
//! `print`, `help` and `exit` commands and the prompt loop driving them.

pub mod command;
pub mod help;
pub mod print;
pub mod shell;
pub mod tree;

pub use command::{Command, CommandError, TreeOptions};
pub use shell::Shell;
