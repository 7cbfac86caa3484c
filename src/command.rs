use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Fs(#[from] ext2::Ext2Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeOptions {
    pub recursive: bool,
    pub show_size: bool,
    pub show_permissions: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Tree { path: String, options: TreeOptions },
    Print { path: String, max_lines: Option<usize> },
    Help(Option<String>),
    Exit,
}

impl Command {
    /// Parses one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
        let args: Vec<&str> = line.split([' ', '\t']).filter(|s| !s.is_empty()).collect();
        let Some((&name, rest)) = args.split_first() else {
            return Ok(None);
        };

        let command = match name {
            "tree" => Self::parse_tree(rest)?,
            "print" => Self::parse_print(rest)?,
            "help" => Command::Help(rest.first().map(|s| s.to_string())),
            "exit" => Command::Exit,
            other => {
                return Err(CommandError::Usage(format!("unknown command '{other}'")));
            }
        };

        Ok(Some(command))
    }

    fn parse_tree(args: &[&str]) -> Result<Command, CommandError> {
        let Some((&path, flags)) = args.split_first() else {
            return Err(CommandError::Usage("tree: missing <PATH>".to_string()));
        };

        let mut options = TreeOptions::default();
        for flag in flags {
            let letters = flag
                .strip_prefix('-')
                .filter(|l| !l.is_empty())
                .ok_or_else(|| CommandError::Usage(format!("tree: invalid argument '{flag}'")))?;
            for letter in letters.chars() {
                match letter {
                    'r' => options.recursive = true,
                    's' => options.show_size = true,
                    'p' => options.show_permissions = true,
                    _ => {
                        return Err(CommandError::Usage(format!(
                            "tree: invalid option -- '{letter}'"
                        )));
                    }
                }
            }
        }

        Ok(Command::Tree {
            path: path.to_string(),
            options,
        })
    }

    fn parse_print(args: &[&str]) -> Result<Command, CommandError> {
        let Some((&path, mut flags)) = args.split_first() else {
            return Err(CommandError::Usage("print: missing <PATH>".to_string()));
        };

        let mut max_lines = None;
        while let Some((&flag, rest)) = flags.split_first() {
            if flag != "-n" {
                return Err(CommandError::Usage(format!(
                    "print: invalid argument '{flag}'"
                )));
            }
            let Some((&value, rest)) = rest.split_first() else {
                return Err(CommandError::Usage(
                    "print: option requires an argument -- 'n'".to_string(),
                ));
            };
            let lines = value
                .parse::<usize>()
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| {
                    CommandError::Usage(format!("print: invalid line number '{value}'"))
                })?;
            max_lines = Some(lines);
            flags = rest;
        }

        Ok(Command::Print {
            path: path.to_string(),
            max_lines,
        })
    }
}
