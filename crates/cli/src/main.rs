use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{command, Arg, ArgAction};

fn main() -> Result<()> {
    let matches = command!()
        .max_term_width(100)
        .args(&[
            Arg::new("input")
                .required(true)
                .value_parser(clap::value_parser!(PathBuf))
                .help("The C source file to compile"),
            Arg::new("output")
                .short('o')
                .value_name("outfile")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Write the image to <outfile> instead of deriving a name from the input"),
            Arg::new("object")
                .short('c')
                .action(ArgAction::SetTrue)
                .help("Select object output (currently produces the same image as a full link)"),
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .help("Print version and exit; also enables verbose library tracing"),
        ])
        .get_matches();

    if matches.get_flag("verbose") {
        env_logger::builder()
            .format_level(false)
            .format_target(false)
            .filter_module("nanocc", log::LevelFilter::Debug)
            .init();
        println!("nanocc {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let in_path = matches.get_one::<PathBuf>("input").unwrap();
    let is_object = matches.get_flag("object");
    let out_path = match matches.get_one::<PathBuf>("output") {
        Some(path) => path.clone(),
        None => derived_output_path(in_path, is_object),
    };

    let in_file = fs::File::open(in_path)
        .with_context(|| format!("Failed to open input file '{}'", in_path.display()))?;
    let in_data = unsafe { memmap2::Mmap::map(&in_file) }
        .with_context(|| format!("Failed to map input file '{}'", in_path.display()))?;
    let in_data = &*in_data;

    let file_name = in_path.display().to_string();
    let (sections, entry, global_fixups) = match nanocc::compile_program(&file_name, in_data) {
        Ok(result) => result,
        Err(_) => std::process::exit(1),
    };
    let image = nanocc::pe::write_image(&sections, entry, &global_fixups);

    let mut open_options = fs::OpenOptions::new();
    open_options.write(true).create(true).truncate(true);
    let out_file = open_options
        .open(&out_path)
        .with_context(|| format!("Failed to create output file '{}'", out_path.display()))?;
    write_image(out_file, &image, &out_path)?;

    Ok(())
}

fn write_image(mut out_file: fs::File, image: &[u8], out_path: &Path) -> Result<()> {
    use std::io::Write;
    out_file.write_all(image).with_context(|| {
        fs::remove_file(out_path).ok();
        format!("Failed to write output file '{}'", out_path.display())
    })
}

fn derived_output_path(in_path: &Path, is_object: bool) -> PathBuf {
    let extension = if is_object { "obj" } else { "exe" };
    in_path.with_extension(extension)
}
