//! The block-level vocabulary of the contraption: instrument and material
//! tables, the block+redstone / block+repeater helpers every stage shares,
//! and the delay cell builder.

use crate::schematic::{BlockSink, NullSink};
use crate::vector::Vector;

pub const INSTRUMENT_NAME: [&str; 16] = [
    "harp",
    "bass",
    "basedrum",
    "snare",
    "hat",
    "guitar",
    "flute",
    "bell",
    "chime",
    "xylophone",
    "iron_xylophone",
    "cow_bell",
    "didgeridoo",
    "bit",
    "banjo",
    "pling",
];

/// The block that sits under the noteblock and selects its instrument.
pub const INSTRUMENT_MATERIAL: [&str; 16] = [
    "lapis_block",
    "jungle_wood",
    "black_concrete",
    "pink_concrete_powder",
    "purple_stained_glass",
    "magenta_wool",
    "clay",
    "gold_block",
    "packed_ice",
    "bone_block",
    "iron_block",
    "soul_sand",
    "pumpkin",
    "emerald_block",
    "hay_block",
    "glowstone",
];

/// The wire carrier blocks, one color per instrument.
pub const BUILDING_MATERIAL: [&str; 16] = [
    "blue_concrete",
    "green_concrete",
    "black_concrete",
    "pink_concrete",
    "purple_concrete",
    "magenta_concrete",
    "light_gray_concrete",
    "yellow_concrete",
    "light_blue_concrete",
    "white_concrete",
    "cyan_concrete",
    "brown_concrete",
    "orange_concrete",
    "lime_concrete",
    "red_concrete",
    "gray_concrete",
];

pub const EVEN_DELAY_BUILDBLOCK: &str = "polished_andesite";
pub const EVEN_DELAY_BUILDBLOCK_SLAB: &str = "polished_andesite_slab[type=top]";
pub const ODD_DELAY_BUILDBLOCK: &str = "polished_granite";
pub const ODD_DELAY_BUILDBLOCK_SLAB: &str = "polished_granite_slab[type=top]";
pub const START_LINE_BUILDBLOCK: &str = "polished_diorite";

pub fn cardinal_direction(v: Vector) -> &'static str {
    match (v.x, v.y, v.z) {
        (1, 0, 0) => "east",
        (-1, 0, 0) => "west",
        (0, 0, 1) => "south",
        (0, 0, -1) => "north",
        _ => panic!("{v} is not a horizontal unit direction"),
    }
}

// the three helpers below are the only way blocks get placed, both here and
// in the planner and assembler stages

pub fn setblock<S: BlockSink>(sink: &mut S, v: Vector, block: &str) {
    sink.set(v.x, v.y, v.z, block);
}

pub fn block_and_redstone<S: BlockSink>(sink: &mut S, v: Vector, buildblock: &str, powered: bool) {
    sink.set(v.x, v.y, v.z, buildblock);
    let power = if powered { 15 } else { 0 };
    sink.set(
        v.x,
        v.y + 1,
        v.z,
        &format!("redstone_wire[east=side,north=side,power={power},south=side,west=side]"),
    );
}

/// Note that the repeater's `facing` blockstate points at its input, which is
/// the opposite of `facing_direction` (the way the signal travels).
pub fn block_and_repeater<S: BlockSink>(
    sink: &mut S,
    v: Vector,
    buildblock: &str,
    facing_direction: Vector,
    delay: i32,
    locked: bool,
    powered: bool,
) {
    assert!((1..=4).contains(&delay), "cannot create a repeater with a delay of {delay}");
    sink.set(v.x, v.y, v.z, buildblock);
    sink.set(
        v.x,
        v.y + 1,
        v.z,
        &format!(
            "repeater[delay={delay},facing={},locked={locked},powered={powered}]",
            cardinal_direction(-facing_direction)
        ),
    );
}

// Slices a delay cell is composed of. Each places one forward step of the
// lower rail (y+0 block, y+1 redstone or repeater) and the upper rail
// (y+2 block, y+3 repeater), then advances the cursor.

fn d_redstone_u_repeater<S: BlockSink>(
    sink: &mut S,
    buildblock: &str,
    v: &mut Vector,
    forward: Vector,
    u_delay: i32,
) {
    block_and_redstone(sink, *v, buildblock, false);
    block_and_repeater(sink, *v + Vector::new(0, 2, 0), buildblock, forward, u_delay, false, false);
    *v += forward;
}

fn d_repeater_u_repeater<S: BlockSink>(
    sink: &mut S,
    buildblock: &str,
    v: &mut Vector,
    forward: Vector,
    d_delay: i32,
    u_delay: i32,
) {
    block_and_repeater(sink, *v, buildblock, -forward, d_delay, false, false);
    block_and_repeater(sink, *v + Vector::new(0, 2, 0), buildblock, forward, u_delay, false, false);
    *v += forward;
}

fn d_block_u_repeater<S: BlockSink>(
    sink: &mut S,
    buildblock: &str,
    v: &mut Vector,
    forward: Vector,
    u_delay: i32,
) {
    setblock(sink, *v + Vector::UP, buildblock);
    block_and_repeater(sink, *v + Vector::new(0, 2, 0), buildblock, forward, u_delay, false, false);
    *v += forward;
}

/// Terminator: caps the upper rail and, unless the caller is about to turn,
/// places the redstone that carries the signal back down to the lower rail.
fn d_loopback_u_block<S: BlockSink>(
    sink: &mut S,
    buildblock: &str,
    v: &mut Vector,
    forward: Vector,
    loopback: bool,
) {
    if loopback {
        block_and_redstone(sink, *v + Vector::UP, buildblock, false);
    } else {
        setblock(sink, *v + Vector::UP, buildblock);
    }
    setblock(sink, *v + Vector::new(0, 3, 0), buildblock);
    *v += forward;
}

// md is the minimum of the current and all later delays of the line. It
// bounds the repeater ticks we may use: two bottom-rail repeaters in a row
// choke a pulse shorter than the second one's delay (MC-54711,
// https://bugs.mojang.com/browse/MC-54711), so each md class below only
// chains repeaters where a pulse of md ticks survives. With md 6 for
// example, a 3 tick bottom repeater may only follow a 1 tick one if the
// pulse was already stretched to 3 ticks.

/// 1 tick repeaters everywhere, repeater chaining only on the upper rail.
fn build_delay_md2<S: BlockSink>(
    sink: &mut S,
    buildblock: &str,
    v: &mut Vector,
    forward: Vector,
    mut delay: i32,
    loopback: bool,
) {
    if delay % 3 != 2 {
        // 0 or 1 is the remainder
        delay -= 1;
        d_redstone_u_repeater(sink, buildblock, v, forward, 1);
    }
    if delay % 3 == 2 {
        // 0 or 2 was the remainder originally
        delay -= 2;
        d_repeater_u_repeater(sink, buildblock, v, forward, 1, 1);
    }
    while delay > 0 {
        delay -= 3;
        d_block_u_repeater(sink, buildblock, v, forward, 1);
        d_repeater_u_repeater(sink, buildblock, v, forward, 1, 1);
    }
    assert_eq!(delay, 0, "delay not consumed to zero at {v}");
    d_loopback_u_block(sink, buildblock, v, forward, loopback);
}

/// 1 tick repeaters everywhere, chaining on both rails.
fn build_delay_md3<S: BlockSink>(
    sink: &mut S,
    buildblock: &str,
    v: &mut Vector,
    forward: Vector,
    mut delay: i32,
    loopback: bool,
) {
    if delay % 2 == 1 {
        delay -= 1;
        d_redstone_u_repeater(sink, buildblock, v, forward, 1);
    }
    while delay > 0 {
        delay -= 2;
        d_repeater_u_repeater(sink, buildblock, v, forward, 1, 1);
    }
    assert_eq!(delay, 0, "delay not consumed to zero at {v}");
    d_loopback_u_block(sink, buildblock, v, forward, loopback);
}

/// 2 tick repeaters, a bottom-rail chain has to end on a 1 tick one.
fn build_delay_md4<S: BlockSink>(
    sink: &mut S,
    buildblock: &str,
    v: &mut Vector,
    forward: Vector,
    mut delay: i32,
    loopback: bool,
) {
    if delay == 4 {
        delay -= 4;
        d_repeater_u_repeater(sink, buildblock, v, forward, 2, 2);
    } else if delay % 4 == 0 {
        delay -= 4;
        d_repeater_u_repeater(sink, buildblock, v, forward, 1, 1);
        d_repeater_u_repeater(sink, buildblock, v, forward, 1, 1);
    } else if delay % 4 == 1 {
        delay -= 5;
        d_repeater_u_repeater(sink, buildblock, v, forward, 1, 1);
        d_repeater_u_repeater(sink, buildblock, v, forward, 1, 2);
    } else if delay % 4 == 2 {
        delay -= 2;
        d_repeater_u_repeater(sink, buildblock, v, forward, 1, 1);
    } else {
        delay -= 3;
        d_repeater_u_repeater(sink, buildblock, v, forward, 1, 2);
    }
    while delay > 0 {
        delay -= 4;
        d_repeater_u_repeater(sink, buildblock, v, forward, 2, 2);
    }
    assert_eq!(delay, 0, "delay not consumed to zero at {v}");
    d_loopback_u_block(sink, buildblock, v, forward, loopback);
}

/// Same as md4, except 2 tick repeaters chain everywhere.
fn build_delay_md5<S: BlockSink>(
    sink: &mut S,
    buildblock: &str,
    v: &mut Vector,
    forward: Vector,
    mut delay: i32,
    loopback: bool,
) {
    if delay % 4 == 0 {
        while delay > 0 {
            delay -= 4;
            d_repeater_u_repeater(sink, buildblock, v, forward, 2, 2);
        }
        d_loopback_u_block(sink, buildblock, v, forward, loopback);
    } else {
        build_delay_md4(sink, buildblock, v, forward, delay, loopback);
    }
}

/// 3 tick repeaters, a bottom-rail chain has to end on a 1 or 2 tick one.
fn build_delay_md6<S: BlockSink>(
    sink: &mut S,
    buildblock: &str,
    v: &mut Vector,
    forward: Vector,
    mut delay: i32,
    loopback: bool,
) {
    if delay == 6 {
        delay -= 6;
        d_repeater_u_repeater(sink, buildblock, v, forward, 3, 3);
    } else if delay % 6 <= 1 {
        let rem = delay % 6;
        delay -= 6 + rem;
        d_repeater_u_repeater(sink, buildblock, v, forward, 1, 1);
        d_repeater_u_repeater(sink, buildblock, v, forward, 1 + rem, 3);
    } else {
        let rem = delay % 6;
        delay -= rem;
        let d_delay = if rem == 5 { 2 } else { 1 };
        d_repeater_u_repeater(sink, buildblock, v, forward, d_delay, rem - d_delay);
    }
    while delay > 0 {
        delay -= 6;
        d_repeater_u_repeater(sink, buildblock, v, forward, 3, 3);
    }
    assert_eq!(delay, 0, "delay not consumed to zero at {v}");
    d_loopback_u_block(sink, buildblock, v, forward, loopback);
}

/// Same as md6, except 3 tick repeaters chain everywhere.
fn build_delay_md7<S: BlockSink>(
    sink: &mut S,
    buildblock: &str,
    v: &mut Vector,
    forward: Vector,
    mut delay: i32,
    loopback: bool,
) {
    if delay % 6 == 0 {
        while delay > 0 {
            delay -= 6;
            d_repeater_u_repeater(sink, buildblock, v, forward, 3, 3);
        }
        d_loopback_u_block(sink, buildblock, v, forward, loopback);
    } else {
        build_delay_md6(sink, buildblock, v, forward, delay, loopback);
    }
}

/// 4 tick repeaters, a bottom-rail chain has to end below 4 ticks.
fn build_delay_md8<S: BlockSink>(
    sink: &mut S,
    buildblock: &str,
    v: &mut Vector,
    forward: Vector,
    mut delay: i32,
    loopback: bool,
) {
    if delay == 8 {
        delay -= 8;
        d_repeater_u_repeater(sink, buildblock, v, forward, 4, 4);
    } else if delay % 8 <= 1 {
        let rem = delay % 8;
        delay -= 8 + rem;
        d_repeater_u_repeater(sink, buildblock, v, forward, 1, 1);
        d_repeater_u_repeater(sink, buildblock, v, forward, 2 + rem, 4);
    } else {
        let rem = delay % 8;
        delay -= rem;
        let d_delay = if rem >= 6 { rem - 4 } else { 1 };
        d_repeater_u_repeater(sink, buildblock, v, forward, d_delay, rem - d_delay);
    }
    while delay > 0 {
        delay -= 8;
        d_repeater_u_repeater(sink, buildblock, v, forward, 4, 4);
    }
    assert_eq!(delay, 0, "delay not consumed to zero at {v}");
    d_loopback_u_block(sink, buildblock, v, forward, loopback);
}

/// Same as md8, except 4 tick repeaters chain everywhere.
fn build_delay_md9_or_above<S: BlockSink>(
    sink: &mut S,
    buildblock: &str,
    v: &mut Vector,
    forward: Vector,
    mut delay: i32,
    loopback: bool,
) {
    if delay % 8 == 0 {
        while delay > 0 {
            delay -= 8;
            d_repeater_u_repeater(sink, buildblock, v, forward, 4, 4);
        }
        d_loopback_u_block(sink, buildblock, v, forward, loopback);
    } else {
        build_delay_md8(sink, buildblock, v, forward, delay, loopback);
    }
}

/// Build one delay cell of exactly `delay` redstone ticks, in the form:
///
/// ```text
/// <> repeater   -  redstone   # block   ?  either
///
/// >>>>>>#
/// ######-
/// <????<#
/// #????#
/// ```
///
/// The signal enters on the upper rail, runs forward, and comes back on the
/// lower rail `delay` redstone ticks later. Cells stack one after another.
/// With `loopback` false the return redstone at the far end is left out,
/// which the spiral builder uses right before turning a corner.
///
/// `v` advances by the cell's footprint.
pub fn build_delay<S: BlockSink>(
    sink: &mut S,
    buildblock: &str,
    v: &mut Vector,
    forward: Vector,
    delay: i32,
    md: i32,
    loopback: bool,
) {
    // a corner split can leave a piece as small as min(md, 9), never smaller
    assert!(md >= 2 && delay >= md.min(9), "invalid delay cell: delay {delay} with md {md} at {v}");
    match md.min(9) {
        2 => build_delay_md2(sink, buildblock, v, forward, delay, loopback),
        3 => build_delay_md3(sink, buildblock, v, forward, delay, loopback),
        4 => build_delay_md4(sink, buildblock, v, forward, delay, loopback),
        5 => build_delay_md5(sink, buildblock, v, forward, delay, loopback),
        6 => build_delay_md6(sink, buildblock, v, forward, delay, loopback),
        7 => build_delay_md7(sink, buildblock, v, forward, delay, loopback),
        8 => build_delay_md8(sink, buildblock, v, forward, delay, loopback),
        _ => build_delay_md9_or_above(sink, buildblock, v, forward, delay, loopback),
    }
}

/// Forward footprint of the cell `build_delay` would emit for this pair.
pub fn delay_length(delay: i32, md: i32) -> i32 {
    let mut v = Vector::new(0, 0, 0);
    build_delay(&mut NullSink, "", &mut v, Vector::new(0, 0, 1), delay, md, true);
    v.z
}
