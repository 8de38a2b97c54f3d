//! Compiles a Note Block Studio song into a Sponge Schematic v2 file that
//! pastes into a Minecraft world as a self-playing redstone jukebox: one
//! noteblock per fully split note line, each fed by its own delay wire from
//! a single start button.

pub mod assembler;
pub mod lines;
pub mod parser;
pub mod planner;
pub mod primitives;
pub mod schematic;
pub mod vector;

use crate::lines::lines_from_song;
use crate::parser::{Header, Song};
use crate::planner::SplitLine;
use anyhow::{ensure, Result};
use log::debug;
use std::path::Path;

pub use crate::schematic::{Schematic, DEFAULT_DATA_VERSION};

/// Pick the wall count for a song size: one wall up to 128 lines, two up to
/// 256, three beyond that.
pub fn auto_sides(line_count: usize) -> i32 {
    match line_count {
        0..=128 => 1,
        129..=256 => 2,
        _ => 3,
    }
}

/// Wall widths `(left, middle, right)` and the shared height for
/// `line_count` lines spread over `sides` walls. Each wall is roughly a
/// 2n x n rectangle of noteblocks thanks to the zig-zag columns.
pub fn layout_dimensions(line_count: usize, sides: i32) -> (i32, i32, i32, i32) {
    assert!((1..=3).contains(&sides), "sides must be 1, 2 or 3, got {sides}");
    assert!(line_count > 0, "cannot lay out zero lines");
    let height = (line_count as f64 / (2.0 * sides as f64)).sqrt().ceil() as i32;
    let mut whole_width = (line_count as i32 + height - 1) / height;
    if whole_width == 1 {
        // a 1-wide contraption leaves no room for the rear plumbing
        whole_width = 2;
    }
    match sides {
        1 => (0, whole_width, 0, height),
        2 => {
            let left = whole_width / 2;
            (left, whole_width - left, 0, height)
        }
        _ => {
            let left = whole_width / 3;
            (left, whole_width - 2 * left, left, height)
        }
    }
}

/// The walkway sign title: the song's name, falling back to the file the
/// song was imported from and then to the input file's stem, credited to
/// the original author when the header names one.
pub fn song_title(header: &Header, input: &Path) -> String {
    let name = header.song_name.trim();
    let origin = header.imported_file_name.trim();
    let name = if !name.is_empty() {
        name.to_string()
    } else if !origin.is_empty() {
        Path::new(origin)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| origin.to_string())
    } else {
        input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Unknown song".to_string())
    };
    let author = match header.original_song_author.trim() {
        "" => header.song_author.trim(),
        original => original,
    };
    if author.is_empty() {
        name
    } else {
        format!("{name} by {author}")
    }
}

/// Compile an already parsed song into `out_path`.
///
/// `sides_mode` is how many walls of noteblocks to build: 1 puts a 2n x n
/// rectangle in front, 2 adds one to the left, 3 surrounds the listener,
/// and -1 picks automatically by line count.
pub fn convert_song(
    song: &Song,
    title: &str,
    out_path: &Path,
    use_redstone_lamp: bool,
    sides_mode: i32,
) -> Result<()> {
    let mut split = Vec::new();
    for line in lines_from_song(song) {
        ensure!(
            (0..16).contains(&line.instrument),
            "custom instruments are not supported (instrument {} on key {})",
            line.instrument,
            line.key
        );
        let ticks: Vec<i32> = line.ticks().collect();
        split.push(SplitLine::new(line.key as i32, line.instrument as usize, &ticks));
    }
    ensure!(!split.is_empty(), "there is no note line to convert");
    split.sort_by_key(SplitLine::sort_key);

    let sides = if sides_mode == -1 { auto_sides(split.len()) } else { sides_mode };
    ensure!((1..=3).contains(&sides), "sides mode must be -1, 1, 2 or 3, got {sides_mode}");
    let (left, middle, right, height) = layout_dimensions(split.len(), sides);
    debug!(
        "{} split lines over {sides} walls: {left}/{middle}/{right} wide, {height} tall",
        split.len()
    );

    let mut schem = Schematic::new();
    assembler::build_contraption(&mut schem, split, left, middle, right, height, title, use_redstone_lamp)?;
    schem.save(out_path, DEFAULT_DATA_VERSION)
}

/// Read `input`, compile it, and write the schematic to `out_path`.
pub fn convert(input: &Path, out_path: &Path, use_redstone_lamp: bool, sides_mode: i32) -> Result<()> {
    let song = parser::read_song(input)?;
    let title = song_title(&song.header, input);
    convert_song(&song, &title, out_path, use_redstone_lamp, sides_mode)
}
