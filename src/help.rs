use std::io::Write;

const TREE_USAGE: &str = "\
  > tree <PATH> [OPTION]... : display the directory structure if <PATH> is a directory
    -r : descend into subdirectories recursively
    -s : include the size of each file in bytes
    -p : include the permissions of each directory and file
";

const PRINT_USAGE: &str = "\
  > print <PATH> [OPTION]... : print the contents of <PATH> on the standard output if it is a file
    -n <line_number> : print only the first <line_number> lines
";

const HELP_USAGE: &str = "  > help [COMMAND] : show usage for all commands or for COMMAND\n";

const EXIT_USAGE: &str = "  > exit : exit the program\n";

fn usage(command: &str) -> Option<&'static str> {
    match command {
        "tree" => Some(TREE_USAGE),
        "print" => Some(PRINT_USAGE),
        "help" => Some(HELP_USAGE),
        "exit" => Some(EXIT_USAGE),
        _ => None,
    }
}

/// Writes usage for one command, or for every command when `topic` is `None`.
pub fn print_help<W: Write>(topic: Option<&str>, out: &mut W) -> std::io::Result<()> {
    match topic {
        Some(command) => match usage(command) {
            Some(text) => write!(out, "{text}")?,
            None => {
                writeln!(out, "invalid command -- '{command}'")?;
                print_all(out)?;
            }
        },
        None => print_all(out)?,
    }
    writeln!(out)
}

fn print_all<W: Write>(out: &mut W) -> std::io::Result<()> {
    for text in [TREE_USAGE, PRINT_USAGE, HELP_USAGE, EXIT_USAGE] {
        write!(out, "{text}")?;
    }
    Ok(())
}
