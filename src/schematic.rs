//! Block sink and Sponge Schematic v2 writer.
//! https://github.com/SpongePowered/Schematic-Specification/blob/master/versions/schematic-2.md

use crate::vector::Vector;
use anyhow::{bail, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::warn;
use nbt::{Map, Value};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Default Minecraft data version written into the schematic (1952 = 1.14.0).
pub const DEFAULT_DATA_VERSION: i32 = 1952;

/// Anything block placements can be emitted into. Implemented by the real
/// schematic builder and by the measurement sinks that only need geometry.
pub trait BlockSink {
    fn set(&mut self, x: i32, y: i32, z: i32, block: &str);
}

/// Discards everything. Used to measure how far a build routine advances
/// its cursor without committing any blocks.
pub struct NullSink;

impl BlockSink for NullSink {
    fn set(&mut self, _x: i32, _y: i32, _z: i32, _block: &str) {}
}

/// In-memory contraption: a palette of normalized block descriptors plus a
/// sparse map of occupied cells. Serialized with `save`.
pub struct Schematic {
    palette: Vec<String>,
    palette_index: HashMap<String, i32>,
    cells: HashMap<(i32, i32, i32), i32>,
}

/// Descriptors normalize to `namespace:name[state,...]`: the `minecraft:`
/// namespace is implied, blockstates are sorted, and a trailing `{...}`
/// block entity payload (sign text) is carried through untouched.
fn normalize(block: &str) -> String {
    let name_end = block.find(['[', '{']).unwrap_or(block.len());
    let (name, rest) = block.split_at(name_end);
    let mut out = String::with_capacity(block.len() + 10);
    if !name.contains(':') {
        out.push_str("minecraft:");
    }
    out.push_str(name);
    match (rest.strip_prefix('['), rest.find(']')) {
        (Some(_), Some(close)) => {
            let mut states: Vec<&str> = rest[1..close].split(',').collect();
            states.sort_unstable();
            out.push('[');
            out.push_str(&states.join(","));
            out.push(']');
            out.push_str(&rest[close + 1..]);
        }
        _ => out.push_str(rest),
    }
    out
}

impl Schematic {
    pub fn new() -> Schematic {
        let air = "minecraft:air".to_string();
        let mut palette_index = HashMap::new();
        palette_index.insert(air.clone(), 0);
        Schematic {
            palette: vec![air],
            palette_index,
            cells: HashMap::new(),
        }
    }

    pub fn block_count(&self) -> usize {
        self.cells.len()
    }

    pub fn block_at(&self, x: i32, y: i32, z: i32) -> Option<&str> {
        let id = *self.cells.get(&(x, y, z))?;
        Some(&self.palette[id as usize])
    }

    pub fn cells(&self) -> impl Iterator<Item = (Vector, &str)> + '_ {
        self.cells
            .iter()
            .map(|(&(x, y, z), &id)| (Vector::new(x, y, z), self.palette[id as usize].as_str()))
    }

    /// Smallest and largest occupied corner, or None while empty.
    pub fn bounds(&self) -> Option<(Vector, Vector)> {
        let mut iter = self.cells.keys();
        let &(x, y, z) = iter.next()?;
        let mut min = Vector::new(x, y, z);
        let mut max = min;
        for &(x, y, z) in iter {
            min.x = min.x.min(x);
            min.y = min.y.min(y);
            min.z = min.z.min(z);
            max.x = max.x.max(x);
            max.y = max.y.max(y);
            max.z = max.z.max(z);
        }
        Some((min, max))
    }

    /// Write the gzipped NBT file. The `.schem` suffix is appended to `path`
    /// when missing. Refuses to write an empty contraption.
    pub fn save(&self, path: &Path, data_version: i32) -> Result<()> {
        let Some((min, max)) = self.bounds() else {
            bail!("refusing to save an empty schematic");
        };
        let width = max.x - min.x + 1;
        let height = max.y - min.y + 1;
        let length = max.z - min.z + 1;

        // BlockData holds one unsigned varint per cell, in y -> z -> x order,
        // with palette id 0 (air) filling everything that was never set
        let mut block_data: Vec<i8> = Vec::with_capacity((width * height * length) as usize);
        for y in min.y..=max.y {
            for z in min.z..=max.z {
                for x in min.x..=max.x {
                    let mut id = self.cells.get(&(x, y, z)).copied().unwrap_or(0) as u32;
                    while id & !0x7F != 0 {
                        block_data.push(((id & 0x7F) | 0x80) as u8 as i8);
                        id >>= 7;
                    }
                    block_data.push(id as u8 as i8);
                }
            }
        }

        let mut palette = Map::new();
        for (id, name) in self.palette.iter().enumerate() {
            palette.insert(name.clone(), Value::Int(id as i32));
        }

        let mut blob = nbt::Blob::named("Schematic");
        blob.insert("Version", Value::Int(2))?;
        blob.insert("DataVersion", Value::Int(data_version))?;
        blob.insert("Width", Value::Short(width as i16))?;
        blob.insert("Height", Value::Short(height as i16))?;
        blob.insert("Length", Value::Short(length as i16))?;
        blob.insert("Palette", Value::Compound(palette))?;
        blob.insert("BlockData", Value::ByteArray(block_data))?;

        // single gzip layer: plain NBT into the encoder (wrapping
        // to_gzip_writer in another encoder would double-compress)
        let file = File::create(with_schem_extension(path))?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        blob.to_writer(&mut encoder)?;
        encoder.finish()?.flush()?;
        Ok(())
    }
}

impl Default for Schematic {
    fn default() -> Self {
        Schematic::new()
    }
}

impl BlockSink for Schematic {
    fn set(&mut self, x: i32, y: i32, z: i32, block: &str) {
        let block = normalize(block);
        let id = match self.palette_index.get(&block) {
            Some(&id) => id,
            None => {
                let id = self.palette.len() as i32;
                self.palette_index.insert(block.clone(), id);
                self.palette.push(block);
                id
            }
        };
        if let Some(old) = self.cells.insert((x, y, z), id) {
            warn!(
                "block at ({x},{y},{z}) set twice: {} replaces {}",
                self.palette[id as usize], self.palette[old as usize]
            );
        }
    }
}

fn with_schem_extension(path: &Path) -> PathBuf {
    match path.extension() {
        Some(ext) if ext == "schem" => path.to_path_buf(),
        _ => {
            let mut os = path.as_os_str().to_owned();
            os.push(".schem");
            PathBuf::from(os)
        }
    }
}

/// Records every placement verbatim. Test-only sink for inspecting the
/// exact blocks a build routine emits.
#[cfg(test)]
pub(crate) struct RecordSink {
    pub cells: HashMap<(i32, i32, i32), String>,
}

#[cfg(test)]
impl RecordSink {
    pub fn new() -> RecordSink {
        RecordSink { cells: HashMap::new() }
    }

    /// Sum of the `delay=` attributes of every recorded repeater. A signal
    /// passes each repeater of a wire exactly once, so this is the total
    /// latency the recorded wire adds.
    pub fn repeater_ticks(&self) -> i32 {
        self.cells
            .values()
            .filter_map(|block| {
                let rest = block.strip_prefix("repeater[delay=")?;
                rest.split(',').next()?.parse::<i32>().ok()
            })
            .sum()
    }
}

#[cfg(test)]
impl BlockSink for RecordSink {
    fn set(&mut self, x: i32, y: i32, z: i32, block: &str) {
        self.cells.insert((x, y, z), block.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_namespace_and_sorts_states() {
        assert_eq!(normalize("stone"), "minecraft:stone");
        assert_eq!(normalize("minecraft:stone"), "minecraft:stone");
        assert_eq!(
            normalize("repeater[facing=east,delay=1,locked=false]"),
            "minecraft:repeater[delay=1,facing=east,locked=false]"
        );
    }

    #[test]
    fn normalize_keeps_block_entity_payload() {
        let sign = "birch_sign[rotation=8]{Text1: '{\"text\":\"hi\"}'}";
        assert_eq!(
            normalize(sign),
            "minecraft:birch_sign[rotation=8]{Text1: '{\"text\":\"hi\"}'}"
        );
    }

    #[test]
    fn equal_descriptors_share_a_palette_entry() {
        let mut schem = Schematic::new();
        schem.set(0, 0, 0, "repeater[facing=east,delay=1]");
        schem.set(1, 0, 0, "minecraft:repeater[delay=1,facing=east]");
        schem.set(2, 0, 0, "stone");
        // air + repeater + stone
        assert_eq!(schem.palette.len(), 3);
        assert_eq!(schem.cells[&(0, 0, 0)], schem.cells[&(1, 0, 0)]);
    }

    #[test]
    fn empty_schematic_is_refused() {
        let schem = Schematic::new();
        let dir = tempfile::tempdir().unwrap();
        assert!(schem.save(&dir.path().join("empty"), DEFAULT_DATA_VERSION).is_err());
    }

    #[test]
    fn schem_extension_is_appended_once() {
        assert_eq!(with_schem_extension(Path::new("song")), PathBuf::from("song.schem"));
        assert_eq!(with_schem_extension(Path::new("song.schem")), PathBuf::from("song.schem"));
    }

    fn decode_varints(data: &[i8]) -> Vec<u32> {
        let mut out = Vec::new();
        let mut iter = data.iter();
        while let Some(&first) = iter.next() {
            let mut value = (first as u8 & 0x7F) as u32;
            let mut byte = first as u8;
            let mut shift = 7;
            while byte & 0x80 != 0 {
                byte = *iter.next().expect("truncated varint") as u8;
                value |= ((byte & 0x7F) as u32) << shift;
                shift += 7;
            }
            out.push(value);
        }
        out
    }

    #[test]
    fn save_round_trips_through_gzipped_nbt() {
        let mut schem = Schematic::new();
        // enough distinct descriptors to force multi-byte varints
        for i in 0..200 {
            schem.set(i, 0, 0, &format!("note_block[note={i}]"));
        }
        schem.set(10, 2, 3, "stone");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roundtrip.schem");
        schem.save(&path, DEFAULT_DATA_VERSION).unwrap();

        let mut file = File::open(&path).unwrap();
        let blob = nbt::Blob::from_gzip_reader(&mut file).unwrap();
        let width = match &blob["Width"] {
            Value::Short(w) => *w as i32,
            other => panic!("Width is {other:?}"),
        };
        let height = match &blob["Height"] {
            Value::Short(h) => *h as i32,
            other => panic!("Height is {other:?}"),
        };
        let length = match &blob["Length"] {
            Value::Short(l) => *l as i32,
            other => panic!("Length is {other:?}"),
        };
        assert_eq!((width, height, length), (200, 3, 4));

        let decoded = match &blob["BlockData"] {
            Value::ByteArray(data) => decode_varints(data),
            other => panic!("BlockData is {other:?}"),
        };
        assert_eq!(decoded.len(), (width * height * length) as usize);

        // palette is a bijection onto 0..N with air at 0
        let palette = match &blob["Palette"] {
            Value::Compound(map) => map.clone(),
            other => panic!("Palette is {other:?}"),
        };
        let mut ids: Vec<i32> = palette
            .values()
            .map(|v| match v {
                Value::Int(i) => *i,
                other => panic!("palette entry is {other:?}"),
            })
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..palette.len() as i32).collect::<Vec<_>>());
        assert_eq!(palette["minecraft:air"], Value::Int(0));

        // y-z-x order: the first row of the bottom layer is the 200 noteblocks
        for (i, &id) in decoded.iter().take(200).enumerate() {
            let expected = match &palette[&format!("minecraft:note_block[note={i}]")] {
                Value::Int(id) => *id as u32,
                other => panic!("palette entry is {other:?}"),
            };
            assert_eq!(id, expected);
        }
        // every decoded id is air or a real palette entry
        assert!(decoded.iter().all(|&id| (id as usize) < palette.len()));
    }
}
