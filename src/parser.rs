//! Note Block Studio (.nbs) file reader, covering the classic format and
//! OpenNBS versions 1-5. Only the fields the compiler consumes are kept;
//! everything else is read past.

use anyhow::{ensure, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// NBS strings are an i32 length followed by that many bytes.
trait ReadStringExt: ReadBytesExt {
    fn read_string(&mut self) -> Result<String> {
        let len = self.read_i32::<LittleEndian>()?;
        ensure!(len >= 0, "negative string length {len} in NBS file");
        let mut buf = vec![0u8; len as usize];
        self.read_exact(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl<R: Read> ReadStringExt for R {}

#[derive(Debug, Serialize)]
pub struct Header {
    /// 0 for the classic format, otherwise the OpenNBS version.
    pub version: i8,
    pub vanilla_instrument_count: i8,
    /// Song length in song ticks (0 when the version does not store it).
    pub song_length: i16,
    pub layer_count: i16,
    pub song_name: String,
    pub song_author: String,
    pub original_song_author: String,
    pub song_description: String,
    /// Ticks-per-second times 100, as stored on disk.
    tempo_raw: i16,
    pub time_signature: i8,
    /// The .mid or .schematic file the song was imported from, if any.
    pub imported_file_name: String,
}

impl Header {
    /// Ticks per second. The NBS tempo picker has no 20/3 option, so 6.75
    /// almost always means "every 3 gameticks" and is read as such.
    pub fn tempo(&self) -> f64 {
        if self.tempo_raw == 675 {
            20.0 / 3.0
        } else {
            self.tempo_raw as f64 / 100.0
        }
    }

    fn decode<R: Read>(reader: &mut R) -> Result<Header> {
        // the classic format starts with its song length, which is never 0;
        // OpenNBS writes a 0 short followed by the version byte
        let old_song_length = reader.read_i16::<LittleEndian>()?;
        let (version, vanilla_instrument_count, song_length) = if old_song_length != 0 {
            (0, 10, old_song_length)
        } else {
            let version = reader.read_i8()?;
            ensure!((1..=5).contains(&version), "unsupported NBS version {version}");
            let count = reader.read_i8()?;
            let song_length = if version >= 3 {
                reader.read_i16::<LittleEndian>()?
            } else {
                0
            };
            (version, count, song_length)
        };
        let layer_count = reader.read_i16::<LittleEndian>()?;
        let song_name = reader.read_string()?;
        let song_author = reader.read_string()?;
        let original_song_author = reader.read_string()?;
        let song_description = reader.read_string()?;
        let tempo_raw = reader.read_i16::<LittleEndian>()?;
        let _auto_saving = reader.read_i8()?;
        let _auto_saving_duration = reader.read_i8()?;
        let time_signature = reader.read_i8()?;
        let _minutes_spent = reader.read_i32::<LittleEndian>()?;
        let _left_clicks = reader.read_i32::<LittleEndian>()?;
        let _right_clicks = reader.read_i32::<LittleEndian>()?;
        let _noteblocks_added = reader.read_i32::<LittleEndian>()?;
        let _noteblocks_removed = reader.read_i32::<LittleEndian>()?;
        let imported_file_name = reader.read_string()?;
        if version > 0 {
            let _loop_on = reader.read_i8()?;
            let _max_loop_count = reader.read_i8()?;
            let _loop_start_tick = reader.read_i16::<LittleEndian>()?;
        }
        Ok(Header {
            version,
            vanilla_instrument_count,
            song_length,
            layer_count,
            song_name,
            song_author,
            original_song_author,
            song_description,
            tempo_raw,
            time_signature,
            imported_file_name,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Note {
    /// Song tick (at the song's own tempo, not gameticks).
    pub tick: i32,
    pub layer: i16,
    pub instrument: i8,
    pub key: i8,
}

#[derive(Debug, Serialize)]
pub struct Song {
    pub header: Header,
    pub notes: Vec<Note>,
}

impl Song {
    pub fn decode<R: Read>(reader: &mut R) -> Result<Song> {
        let header = Header::decode(reader)?;
        // the note section is jump-encoded: a tick jump of 0 ends the song,
        // a layer jump of 0 ends the current tick
        let mut notes = Vec::new();
        let mut tick: i32 = -1;
        loop {
            let tick_jumps = reader.read_i16::<LittleEndian>()?;
            if tick_jumps == 0 {
                break;
            }
            tick += tick_jumps as i32;
            let mut layer: i16 = -1;
            loop {
                let layer_jumps = reader.read_i16::<LittleEndian>()?;
                if layer_jumps == 0 {
                    break;
                }
                layer += layer_jumps;
                let instrument = reader.read_i8()?;
                let key = reader.read_i8()?;
                if header.version >= 4 {
                    let _velocity = reader.read_i8()?;
                    let _panning = reader.read_u8()?;
                    let _pitch = reader.read_i16::<LittleEndian>()?;
                }
                notes.push(Note { tick, layer, instrument, key });
            }
        }
        // layer metadata and custom instrument definitions may follow; the
        // compiler has no use for either
        Ok(Song { header, notes })
    }
}

pub fn read_song(path: &Path) -> Result<Song> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    Song::decode(&mut BufReader::new(file))
        .with_context(|| format!("cannot parse {} as an NBS song", path.display()))
}

#[cfg(test)]
pub(crate) mod test_songs {
    use byteorder::{LittleEndian, WriteBytesExt};

    pub fn push_string(out: &mut Vec<u8>, s: &str) {
        out.write_i32::<LittleEndian>(s.len() as i32).unwrap();
        out.extend_from_slice(s.as_bytes());
    }

    /// Classic-format header followed by the given `(tick, key, instrument)`
    /// events, one layer per chord entry.
    pub fn classic_song(name: &str, tempo_raw: i16, notes: &[(i16, i8, i8)]) -> Vec<u8> {
        let mut out = Vec::new();
        let song_length = notes.iter().map(|n| n.0).max().unwrap_or(1).max(1);
        out.write_i16::<LittleEndian>(song_length).unwrap();
        out.write_i16::<LittleEndian>(4).unwrap(); // layer count
        push_string(&mut out, name);
        push_string(&mut out, "author");
        push_string(&mut out, "original author");
        push_string(&mut out, "description");
        out.write_i16::<LittleEndian>(tempo_raw).unwrap();
        out.write_i8(0).unwrap(); // auto saving
        out.write_i8(1).unwrap(); // auto saving duration
        out.write_i8(4).unwrap(); // time signature
        for _ in 0..5 {
            out.write_i32::<LittleEndian>(0).unwrap(); // usage statistics
        }
        push_string(&mut out, "");
        let mut previous_tick = -1i16;
        let mut sorted: Vec<(i16, i8, i8)> = notes.to_vec();
        sorted.sort();
        let mut i = 0;
        while i < sorted.len() {
            let tick = sorted[i].0;
            out.write_i16::<LittleEndian>(tick - previous_tick).unwrap();
            previous_tick = tick;
            while i < sorted.len() && sorted[i].0 == tick {
                out.write_i16::<LittleEndian>(1).unwrap(); // next layer
                out.write_i8(sorted[i].2).unwrap(); // instrument
                out.write_i8(sorted[i].1).unwrap(); // key
                i += 1;
            }
            out.write_i16::<LittleEndian>(0).unwrap(); // end of tick
        }
        out.write_i16::<LittleEndian>(0).unwrap(); // end of song
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    #[test]
    fn classic_song_round_trip() {
        let bytes = test_songs::classic_song("My Song", 1000, &[(0, 33, 0), (4, 45, 1), (4, 33, 0)]);
        let song = Song::decode(&mut bytes.as_slice()).unwrap();
        assert_eq!(song.header.version, 0);
        assert_eq!(song.header.song_name, "My Song");
        assert_eq!(song.header.tempo(), 10.0);
        assert_eq!(song.notes.len(), 3);
        assert_eq!(song.notes[0], Note { tick: 0, layer: 0, instrument: 0, key: 33 });
        assert_eq!(song.notes[1].tick, 4);
        assert_eq!(song.notes[2].tick, 4);
    }

    #[test]
    fn open_nbs_v4_reads_note_extras() {
        let mut bytes = Vec::new();
        bytes.write_i16::<LittleEndian>(0).unwrap(); // new format marker
        bytes.write_i8(4).unwrap(); // version
        bytes.write_i8(16).unwrap(); // vanilla instruments
        bytes.write_i16::<LittleEndian>(8).unwrap(); // song length
        bytes.write_i16::<LittleEndian>(1).unwrap(); // layer count
        test_songs::push_string(&mut bytes, "v4 song");
        test_songs::push_string(&mut bytes, "");
        test_songs::push_string(&mut bytes, "");
        test_songs::push_string(&mut bytes, "");
        bytes.write_i16::<LittleEndian>(2000).unwrap(); // 20 t/s
        bytes.write_i8(0).unwrap();
        bytes.write_i8(1).unwrap();
        bytes.write_i8(4).unwrap();
        for _ in 0..5 {
            bytes.write_i32::<LittleEndian>(0).unwrap();
        }
        test_songs::push_string(&mut bytes, "");
        bytes.write_i8(0).unwrap(); // loop on
        bytes.write_i8(0).unwrap(); // max loop count
        bytes.write_i16::<LittleEndian>(0).unwrap(); // loop start
        // one note at tick 7 with velocity/panning/pitch attached
        bytes.write_i16::<LittleEndian>(8).unwrap();
        bytes.write_i16::<LittleEndian>(1).unwrap();
        bytes.write_i8(5).unwrap(); // instrument
        bytes.write_i8(50).unwrap(); // key
        bytes.write_i8(100).unwrap(); // velocity
        bytes.write_u8(100).unwrap(); // panning
        bytes.write_i16::<LittleEndian>(0).unwrap(); // pitch
        bytes.write_i16::<LittleEndian>(0).unwrap();
        bytes.write_i16::<LittleEndian>(0).unwrap();

        let song = Song::decode(&mut bytes.as_slice()).unwrap();
        assert_eq!(song.header.version, 4);
        assert_eq!(song.header.tempo(), 20.0);
        assert_eq!(song.notes, vec![Note { tick: 7, layer: 0, instrument: 5, key: 50 }]);
    }

    #[test]
    fn tempo_675_means_a_note_every_three_gameticks() {
        let bytes = test_songs::classic_song("", 675, &[(1, 33, 0)]);
        let song = Song::decode(&mut bytes.as_slice()).unwrap();
        assert_eq!(song.header.tempo(), 20.0 / 3.0);
        let multiplier = 20.0 / song.header.tempo();
        assert_eq!((song.notes[0].tick as f64 * multiplier + 0.5) as i32, 3);
    }

    #[test]
    fn truncated_file_is_an_error() {
        let bytes = test_songs::classic_song("x", 1000, &[(0, 33, 0)]);
        assert!(Song::decode(&mut bytes[..20].as_ref()).is_err());
    }
}
