use crate::command::{CommandError, TreeOptions};
use ext2::{Ext2Error, Ext2Reader, Inode};
use positioned_io2::ReadAt;
use std::fmt;
use std::io::Write;

/// Deepest directory nesting `build_tree` descends into before giving up. Cyclic
/// directory entries on a corrupt image would otherwise recurse forever.
pub const MAX_TREE_DEPTH: usize = 64;

const HIDDEN_ENTRIES: [&str; 3] = [".", "..", "lost+found"];

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub name: String,
    pub depth: usize,
    /// Last surviving entry of its directory listing.
    pub is_last: bool,
    pub inode: Inode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeSummary {
    /// Includes the directory the listing started from.
    pub directories: usize,
    pub files: usize,
}

impl fmt::Display for TreeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} directories, {} files", self.directories, self.files)
    }
}

/// Lists the children of the directory at `path` in on-disk order, depth first when
/// `recursive` is set, skipping `.`, `..` and `lost+found`.
pub fn build_tree<R: ReadAt>(
    reader: &Ext2Reader<R>,
    path: &str,
    recursive: bool,
) -> ext2::Result<Vec<TreeNode>> {
    let (_, inode) = reader.resolve_path(path)?;
    if !inode.is_dir() {
        return Err(Ext2Error::NotADirectory(path.to_string()));
    }

    let mut nodes = Vec::new();
    collect_children(reader, &inode, 0, recursive, &mut nodes)?;
    Ok(nodes)
}

fn collect_children<R: ReadAt>(
    reader: &Ext2Reader<R>,
    dir: &Inode,
    depth: usize,
    recursive: bool,
    nodes: &mut Vec<TreeNode>,
) -> ext2::Result<()> {
    if depth >= MAX_TREE_DEPTH {
        return Err(Ext2Error::Corrupt(format!(
            "directory nesting deeper than {MAX_TREE_DEPTH} levels"
        )));
    }

    let entries: Vec<_> = reader
        .read_dir(dir)?
        .into_iter()
        .filter(|entry| !HIDDEN_ENTRIES.contains(&entry.name.as_str()))
        .collect();
    let count = entries.len();

    for (i, entry) in entries.into_iter().enumerate() {
        let inode = reader.read_inode(entry.inode)?;
        nodes.push(TreeNode {
            name: entry.name,
            depth,
            is_last: i + 1 == count,
            inode,
        });

        if recursive && inode.is_dir() {
            collect_children(reader, &inode, depth + 1, recursive, nodes)?;
        }
    }

    Ok(())
}

/// `ls -l` style permission string, e.g. `drwxr-xr-x`.
pub fn format_permissions(inode: &Inode) -> String {
    let mut s = String::with_capacity(10);
    s.push(if inode.is_dir() { 'd' } else { '-' });
    for (i, c) in "rwxrwxrwx".chars().enumerate() {
        s.push(if inode.i_mode & (1 << (8 - i)) != 0 { c } else { '-' });
    }
    s
}

/// Renders nodes with box-drawing branches and returns the directory and file counts.
pub fn print_tree<W: Write>(
    nodes: &[TreeNode],
    options: &TreeOptions,
    out: &mut W,
) -> std::io::Result<TreeSummary> {
    let mut summary = TreeSummary {
        directories: 1,
        files: 0,
    };
    let mut last_at_depth: Vec<bool> = Vec::new();

    for node in nodes {
        for level in 0..node.depth {
            let closed = last_at_depth.get(level).copied().unwrap_or(false);
            write!(out, "{}", if closed { "    " } else { "│   " })?;
        }
        write!(out, "{}", if node.is_last { "└── " } else { "├── " })?;

        if options.show_permissions || options.show_size {
            let mut columns = Vec::with_capacity(2);
            if options.show_permissions {
                columns.push(format_permissions(&node.inode));
            }
            if options.show_size {
                columns.push(node.inode.size().to_string());
            }
            write!(out, "[{}] ", columns.join(" "))?;
        }
        writeln!(out, "{}", node.name)?;

        if last_at_depth.len() <= node.depth {
            last_at_depth.resize(node.depth + 1, false);
        }
        last_at_depth[node.depth] = node.is_last;

        if node.inode.is_dir() {
            summary.directories += 1;
        } else {
            summary.files += 1;
        }
    }

    Ok(summary)
}

/// The `tree` command: the path, its rendered listing and the counts.
pub fn run_tree<R: ReadAt, W: Write>(
    reader: &Ext2Reader<R>,
    path: &str,
    options: &TreeOptions,
    out: &mut W,
) -> Result<TreeSummary, CommandError> {
    let nodes = build_tree(reader, path, options.recursive)?;

    writeln!(out, "{path}")?;
    let summary = print_tree(&nodes, options, out)?;
    writeln!(out)?;
    writeln!(out, "{summary}")?;
    writeln!(out)?;

    Ok(summary)
}
