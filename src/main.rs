use anyhow::{bail, ensure, Context, Result};
use jukeboxica::{convert_song, parser, song_title};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();
    if !(3..=5).contains(&args.len()) {
        eprintln!(
            "Usage: {} input.nbs output.schem [use_redstone_lamp: True or False] [sides: -1, 1, 2 or 3]",
            args[0]
        );
        eprintln!("(Where [...] is optional; input may also be a directory of .nbs files)");
        std::process::exit(2);
    }

    let mut use_redstone_lamp = true;
    let mut sides_mode = -1;
    if args.len() >= 4 {
        use_redstone_lamp = match args[3].as_str() {
            "True" => true,
            "False" => false,
            other => bail!("use redstone lamp's value should be True or False, got {other}"),
        };
    }
    if args.len() == 5 {
        sides_mode = match args[4].parse() {
            Ok(sides @ (-1 | 1..=3)) => sides,
            _ => bail!("sides mode's value should be -1, 1, 2 or 3, got {}", args[4]),
        };
    }

    let input = Path::new(&args[1]);
    let output = Path::new(&args[2]);
    if input.is_dir() {
        convert_batch(input, output, use_redstone_lamp, sides_mode)
    } else {
        convert_one(input, output, use_redstone_lamp, sides_mode)
    }
}

fn convert_one(input: &Path, output: &Path, use_redstone_lamp: bool, sides_mode: i32) -> Result<()> {
    let song = parser::read_song(input)?;
    println!(
        "jukeboxica: parsed {} ({} notes, header = {})",
        input.display(),
        song.notes.len(),
        serde_json::to_string_pretty(&song.header)?
    );
    let title = song_title(&song.header, input);
    convert_song(&song, &title, output, use_redstone_lamp, sides_mode)?;
    println!("Wrote schematic to {}", output.display());
    Ok(())
}

/// Batch mode: every .nbs file directly inside `dir` is converted into
/// `out_dir`, keeping the file stems.
fn convert_batch(dir: &Path, out_dir: &Path, use_redstone_lamp: bool, sides_mode: i32) -> Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("cannot create output directory {}", out_dir.display()))?;
    let mut inputs: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("cannot read {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "nbs"))
        .collect();
    ensure!(!inputs.is_empty(), "no .nbs files in {}", dir.display());
    inputs.sort();
    for input in inputs {
        let stem = input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "song".to_string());
        convert_one(&input, &out_dir.join(format!("{stem}.schem")), use_redstone_lamp, sides_mode)?;
    }
    Ok(())
}
