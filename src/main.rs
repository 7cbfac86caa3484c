use anyhow::Context;
use clap::Parser;
use ext2::Ext2Reader;
use ext2_browser::Shell;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "ext2-browser",
    about = "Browse an ext2 filesystem image without mounting it"
)]
struct Args {
    /// Path to the ext2 image, opened read-only
    #[arg(value_name = "EXT2_IMAGE_PATH")]
    image: PathBuf,

    /// Verbose output
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .format_timestamp(None)
        .format_target(false)
        .init();

    let reader = Ext2Reader::open(&args.image)
        .with_context(|| format!("Failed to load ext2 image {}", args.image.display()))?;

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    Shell::new(&reader).run(stdin.lock(), &mut stdout, &mut stderr)?;

    Ok(())
}
