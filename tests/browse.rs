use ext2::builder::ImageBuilder;
use ext2::{EXT2_ROOT_INO, Ext2Error, Ext2Reader};
use ext2_browser::Shell;
use ext2_browser::print::print_file;
use std::io::Write;
use std::process::{Command, Stdio};
use tempfile::NamedTempFile;

fn scenario_image() -> Vec<u8> {
    let mut builder = ImageBuilder::new(1024);
    builder.add_dir(EXT2_ROOT_INO, "lost+found");
    builder.add_file(EXT2_ROOT_INO, "file.txt", b"hello\nabc\n");
    builder.add_dir(EXT2_ROOT_INO, "docs");
    let big: Vec<u8> = (0..13 * 1024 + 512).map(|i| b"abcdefghij\n"[i % 11]).collect();
    builder.add_file(EXT2_ROOT_INO, "big.txt", &big);
    builder.build()
}

fn image_file(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

fn session(reader: &Ext2Reader<std::fs::File>, script: &str) -> (String, String) {
    let mut out = Vec::new();
    let mut err = Vec::new();
    Shell::new(reader)
        .run(script.as_bytes(), &mut out, &mut err)
        .unwrap();
    (
        String::from_utf8(out).unwrap(),
        String::from_utf8(err).unwrap(),
    )
}

#[test]
fn tree_and_print_against_an_image_file() {
    let file = image_file(&scenario_image());
    let reader = Ext2Reader::open(file.path()).unwrap();

    let (out, err) = session(&reader, "tree /\nprint /file.txt\nprint /file.txt -n 1\nexit\n");
    assert!(err.is_empty(), "{err}");
    assert_eq!(
        out,
        "ext2> /\n\
         ├── file.txt\n\
         ├── docs\n\
         └── big.txt\n\
         \n\
         2 directories, 2 files\n\n\
         ext2> hello\nabc\n\
         ext2> hello\n\
         ext2> "
    );
}

#[test]
fn file_with_single_indirect_block_round_trips() {
    let bytes = scenario_image();
    let file = image_file(&bytes);
    let reader = Ext2Reader::open(file.path()).unwrap();

    let (_, inode) = reader.resolve_path("/big.txt").unwrap();
    assert_eq!(reader.expand_block_list(&inode).unwrap().len(), 14);

    let mut out = Vec::new();
    print_file(&reader, "/big.txt", None, &mut out).unwrap();
    let expected: Vec<u8> = (0..13 * 1024 + 512).map(|i| b"abcdefghij\n"[i % 11]).collect();
    assert_eq!(out, expected);
}

#[test]
fn printing_a_directory_fails_without_output() {
    let file = image_file(&scenario_image());
    let reader = Ext2Reader::open(file.path()).unwrap();

    let (out, err) = session(&reader, "print /docs\n");
    assert_eq!(out, "ext2> ext2> ");
    assert_eq!(err, "print: Is a directory: /docs\n");
}

#[test]
fn truncated_image_fails_to_load() {
    let bytes = scenario_image();
    let file = image_file(&bytes[..1050]);
    assert!(matches!(
        Ext2Reader::open(file.path()),
        Err(Ext2Error::ShortRead { .. })
    ));
}

#[test]
fn binary_runs_commands_from_stdin() {
    let file = image_file(&scenario_image());
    let mut child = Command::new(env!("CARGO_BIN_EXE_ext2-browser"))
        .arg(file.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"print /file.txt\nexit\n")
        .unwrap();

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        "ext2> hello\nabc\next2> "
    );
}

#[test]
fn binary_rejects_non_ext2_images() {
    let file = image_file(&[0u8; 4096]);
    let output = Command::new(env!("CARGO_BIN_EXE_ext2-browser"))
        .arg(file.path())
        .stdin(Stdio::null())
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Invalid superblock magic number"), "{stderr}");
}

#[test]
fn binary_rejects_missing_images() {
    let output = Command::new(env!("CARGO_BIN_EXE_ext2-browser"))
        .arg("/nonexistent/disk.img")
        .stdin(Stdio::null())
        .output()
        .unwrap();
    assert!(!output.status.success());
}
