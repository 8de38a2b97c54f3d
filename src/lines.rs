//! Score preprocessing: group song notes by (key, instrument) and split the
//! groups until every line can be driven by a single redstone wire.

use crate::parser::Song;
use std::collections::BTreeMap;

/// The noteblocks of one pitch and instrument. May still need splitting:
/// chords repeat the same note at one tick, and a wire cannot retrigger
/// faster than every 4 gameticks or serve both tick parities.
#[derive(Debug)]
pub struct UnsplitLine {
    pub key: i8,
    pub instrument: i8,
    ticks: BTreeMap<i32, u32>,
}

impl UnsplitLine {
    fn new(key: i8, instrument: i8) -> UnsplitLine {
        UnsplitLine { key, instrument, ticks: BTreeMap::new() }
    }

    /// `tick` is in gameticks, so 20 means one second in.
    pub fn add_note(&mut self, tick: i32) {
        *self.ticks.entry(tick).or_insert(0) += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn ticks(&self) -> impl Iterator<Item = i32> + '_ {
        self.ticks.keys().copied()
    }

    /// Split into one line per gametick parity, keyed off the first note.
    fn split_even(self) -> Vec<UnsplitLine> {
        let evenness = match self.ticks.keys().next() {
            Some(&tick) => tick % 2,
            None => return vec![self],
        };
        let mut same = UnsplitLine::new(self.key, self.instrument);
        let mut other = UnsplitLine::new(self.key, self.instrument);
        for (tick, count) in self.ticks {
            if tick % 2 == evenness {
                same.ticks.insert(tick, count);
            } else {
                other.ticks.insert(tick, count);
            }
        }
        if other.is_empty() {
            vec![same]
        } else {
            vec![same, other]
        }
    }

    /// Extract one fully split line: a single note per tick, no two notes
    /// closer than 4 gameticks. What cannot fit stays behind in `self`.
    fn split_further(&mut self) -> UnsplitLine {
        let mut new_line = UnsplitLine::new(self.key, self.instrument);
        let mut previous = -42;
        let ticks: Vec<i32> = self.ticks.keys().copied().collect();
        for tick in ticks {
            if previous + 4 > tick {
                continue;
            }
            previous = tick;
            new_line.add_note(tick);
            match self.ticks.get_mut(&tick) {
                Some(count) if *count > 1 => *count -= 1,
                _ => {
                    self.ticks.remove(&tick);
                }
            }
        }
        new_line
    }

    /// A line has to be split when
    /// 1) it mixes odd and even tick parities (`split_even`), or
    /// 2) several notes play at the same tick (`split_further`), or
    /// 3) two notes are only 2 gameticks apart (`split_further`).
    pub fn split(self) -> Vec<UnsplitLine> {
        assert!(!self.is_empty(), "an empty line cannot be split");
        let mut fully_split = Vec::new();
        for mut line in self.split_even() {
            while !line.is_empty() {
                let new_line = line.split_further();
                debug_assert!(
                    new_line.ticks.values().all(|&count| count == 1),
                    "a fully split line still has chords: {new_line:?}"
                );
                fully_split.push(new_line);
            }
        }
        fully_split
    }
}

/// Group the song's notes into fully split lines, with time scaled onto the
/// 20 t/s gametick grid.
pub fn lines_from_song(song: &Song) -> Vec<UnsplitLine> {
    let multiplier = 20.0 / song.header.tempo();
    let mut lines: BTreeMap<(i8, i8), UnsplitLine> = BTreeMap::new();
    for note in &song.notes {
        lines
            .entry((note.key, note.instrument))
            .or_insert_with(|| UnsplitLine::new(note.key, note.instrument))
            .add_note((note.tick as f64 * multiplier + 0.5) as i32);
    }
    lines.into_values().flat_map(UnsplitLine::split).collect()
}
