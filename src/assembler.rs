//! Whole-contraption assembly: walks the three walls placing every line,
//! then builds the shared start plumbing around them.

use crate::planner::{LineCircuit, Side, SplitLine};
use crate::primitives as bld;
use crate::schematic::{BlockSink, Schematic};
use crate::vector::Vector;
use anyhow::{ensure, Result};
use log::{debug, warn};
use std::collections::VecDeque;

/// Listener position. The sweet spot is the middle of the 2x2x2 cube from
/// here to here+(1,1,1); the walkway's first glass pair sits right below.
const PLAYER_POS: Vector = Vector::new(0, 0, 0);

/// Anchor every line to its wall slot, walking left wall, middle wall,
/// right wall, each wall column by column with the odd columns dropped 2
/// blocks (the zig-zag that doubles the noteblock density).
fn place_lines(
    lines: Vec<SplitLine>,
    left_width: i32,
    middle_width: i32,
    right_width: i32,
    height: i32,
) -> Vec<LineCircuit> {
    let view_distance = left_width.max(right_width).max(middle_width);
    let middle_side_z = PLAYER_POS.z + view_distance;
    let left_side_x = PLAYER_POS.x + middle_width + 1;
    let right_side_x = PLAYER_POS.x - middle_width;

    let walls = [
        (
            Vector::new(left_side_x, PLAYER_POS.y + height, middle_side_z - 2 * left_width + 1),
            0,
            left_width,
            Vector::new(0, 0, 1),
            Side::Left,
        ),
        (
            Vector::new(left_side_x - 1, PLAYER_POS.y + height, middle_side_z),
            left_width,
            middle_width,
            Vector::new(-1, 0, 0),
            Side::Middle,
        ),
        (
            Vector::new(right_side_x, PLAYER_POS.y + height, middle_side_z),
            left_width + middle_width,
            right_width,
            Vector::new(0, 0, -1),
            Side::Right,
        ),
    ];

    let mut circuits = Vec::with_capacity(lines.len());
    let mut pending = lines.into_iter();
    'walls: for (corner, prev_width, width, forward, side) in walls {
        // each 2-block-wide column is walked as two passes so the zig-zag
        // neighbors still come out in placement order
        for col in 0..2 * width {
            let mut top = corner + forward * col;
            if col % 2 == 1 {
                top.y -= 2;
            }
            for row in 0..(height + (1 - col % 2)) / 2 {
                let Some(line) = pending.next() else { break 'walls };
                let dist_to_middle = match side {
                    Side::Middle => 0,
                    Side::Left => 2 * width - col,
                    Side::Right => col + 1,
                };
                circuits.push(line.begin_circuit(
                    top - Vector::new(0, 4 * row, 0),
                    forward.rotated(true),
                    side,
                    dist_to_middle,
                    2 * row + col % 2,
                    height,
                    prev_width + col / 2,
                    col / 2,
                    width,
                ));
            }
        }
    }
    assert!(
        pending.next().is_none(),
        "the walls ran out of slots before every line was placed"
    );
    circuits
}

/// The paired andesite/granite bus at the rear that carries the two start
/// pulses from the bottom up past every row's junction plane.
fn build_vertical_connection<S: BlockSink>(sink: &mut S, begin_v: Vector, height: i32) -> Vector {
    fn double_block_and_redstone<S: BlockSink>(sink: &mut S, andesite_v: Vector, rel_granite_v: Vector) {
        bld::block_and_redstone(sink, andesite_v, bld::EVEN_DELAY_BUILDBLOCK, false);
        bld::block_and_redstone(sink, andesite_v + rel_granite_v, bld::ODD_DELAY_BUILDBLOCK, false);
    }
    fn double_block_and_repeater<S: BlockSink>(
        sink: &mut S,
        andesite_v: Vector,
        rel_granite_v: Vector,
        direction: Vector,
    ) {
        bld::block_and_repeater(sink, andesite_v, bld::EVEN_DELAY_BUILDBLOCK, direction, 1, false, false);
        bld::block_and_repeater(sink, andesite_v + rel_granite_v, bld::ODD_DELAY_BUILDBLOCK, direction, 1, false, false);
    }

    let mut forward = Vector::new(1, 0, 0);
    for h in 0..height - 1 {
        let mut v = begin_v - Vector::new(0, 4 * h, 0);
        double_block_and_redstone(sink, v, Vector::new(0, 0, 2));
        v += forward;
        // top slabs step the signal down 2 blocks to the next row's plane
        bld::block_and_redstone(sink, v + Vector::new(0, -3, 0), bld::EVEN_DELAY_BUILDBLOCK_SLAB, false);
        bld::block_and_redstone(sink, v + Vector::new(0, -3, 2), bld::ODD_DELAY_BUILDBLOCK_SLAB, false);
        bld::block_and_redstone(sink, v + Vector::new(0, -1, 0), bld::EVEN_DELAY_BUILDBLOCK_SLAB, false);
        bld::block_and_redstone(sink, v + Vector::new(0, -1, 2), bld::ODD_DELAY_BUILDBLOCK_SLAB, false);
        v += forward;
        if (h + 1) % 3 == 0 {
            // signal refresh; the planner compensates with row / 3
            double_block_and_repeater(sink, v + Vector::new(0, -3, 0), Vector::new(0, 0, 2), forward);
            double_block_and_redstone(sink, v + Vector::new(0, -1, 0), Vector::new(0, 0, 2));
            v += forward;
        }
        double_block_and_redstone(sink, v + Vector::new(0, -2, 0), Vector::new(0, 0, 2));
    }

    // bottom row runs out and turns toward the delayer
    let mut v = begin_v - Vector::new(0, 4 * (height - 1), 0);
    double_block_and_redstone(sink, v, Vector::new(0, 0, 2));
    v += forward;
    v += Vector::new(0, -1, 0);
    double_block_and_repeater(sink, v, Vector::new(0, 0, 2), -forward);
    v += forward;
    double_block_and_redstone(sink, v, Vector::new(0, 0, 2));
    v += forward;
    double_block_and_redstone(sink, v, Vector::new(0, 0, 2));
    bld::block_and_redstone(sink, v + Vector::new(1, 0, 2), bld::ODD_DELAY_BUILDBLOCK, false);
    bld::block_and_redstone(sink, v + Vector::new(2, 0, 2), bld::ODD_DELAY_BUILDBLOCK, false);
    bld::block_and_redstone(sink, v + Vector::new(2, 0, 1), bld::ODD_DELAY_BUILDBLOCK, false);
    bld::block_and_redstone(sink, v + Vector::new(2, 0, 0), bld::ODD_DELAY_BUILDBLOCK, false);

    forward.rotate(true);
    v + forward
}

/// Turns the button press into one even-gametick pulse on the andesite
/// track and one odd-gametick pulse on the granite track, 1 gametick apart,
/// so both parities of notes can fire on the 10 Hz redstone grid.
///
/// `v` is the block before the andesite repeater at the bottom;
/// `v + (2,0,0)` the one before the granite repeater.
fn build_1gt_delayer<S: BlockSink>(sink: &mut S, v: Vector, forward: Vector) -> Vector {
    let right = forward.rotated(false);
    let up = Vector::UP;
    let mut v = v;
    bld::block_and_redstone(sink, v, bld::EVEN_DELAY_BUILDBLOCK, false);
    bld::block_and_redstone(sink, v + right * 2, bld::ODD_DELAY_BUILDBLOCK, false);
    v += forward;
    bld::block_and_redstone(sink, v - up, bld::EVEN_DELAY_BUILDBLOCK, false);
    bld::block_and_redstone(sink, v + right * 2, bld::ODD_DELAY_BUILDBLOCK, false);
    v += forward;
    bld::block_and_repeater(sink, v - up, bld::EVEN_DELAY_BUILDBLOCK, -forward, 1, false, false);
    bld::block_and_redstone(sink, v + up, bld::START_LINE_BUILDBLOCK, true);
    bld::block_and_repeater(sink, v + right, bld::START_LINE_BUILDBLOCK, right, 1, false, true);
    bld::block_and_repeater(sink, v + right * 2, bld::EVEN_DELAY_BUILDBLOCK, -forward, 1, true, false);
    v += forward;
    bld::block_and_repeater(sink, v - up, bld::EVEN_DELAY_BUILDBLOCK, -forward, 1, false, false);
    bld::block_and_redstone(sink, v + up, bld::START_LINE_BUILDBLOCK, true);
    bld::setblock(
        sink,
        v + up + right * 2,
        &format!("observer[facing={}]", bld::cardinal_direction(forward)),
    );
    v += forward;
    bld::block_and_redstone(sink, v - up, bld::EVEN_DELAY_BUILDBLOCK, false);
    bld::block_and_redstone(sink, v + up, bld::START_LINE_BUILDBLOCK, true);
    bld::setblock(
        sink,
        v + right * 2,
        &format!("oak_trapdoor[facing={},half=top]", bld::cardinal_direction(-forward)),
    );
    bld::setblock(sink, v + right * 2 + up, "scaffolding");
    v += forward;
    bld::block_and_redstone(sink, v - up, bld::EVEN_DELAY_BUILDBLOCK, false);
    bld::block_and_redstone(sink, v + up, bld::START_LINE_BUILDBLOCK, true);
    bld::block_and_redstone(sink, v + right - up, bld::EVEN_DELAY_BUILDBLOCK, false);
    bld::setblock(sink, v + right * 2, bld::EVEN_DELAY_BUILDBLOCK);
    bld::setblock(sink, v + right * 2 + up, "scaffolding");
    v += forward;
    bld::block_and_redstone(sink, v, bld::START_LINE_BUILDBLOCK, true);
    bld::block_and_repeater(sink, v + right - up, bld::START_LINE_BUILDBLOCK, right, 1, false, true);
    bld::block_and_repeater(sink, v + right * 2 - up, bld::START_LINE_BUILDBLOCK, -forward, 1, true, false);
    v += forward;
    bld::setblock(sink, v, bld::START_LINE_BUILDBLOCK);
    bld::setblock(sink, v + up, "redstone_torch");
    bld::block_and_repeater(sink, v + right, bld::START_LINE_BUILDBLOCK, right, 1, false, true);
    bld::block_and_redstone(sink, v + right * 2, bld::START_LINE_BUILDBLOCK, true);
    v += forward;
    v - up
}

fn sign_descriptor<T: AsRef<str>>(rows: &[T]) -> String {
    let mut out = String::from("birch_sign[rotation=8]{");
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&format!("Text{}: '{{\"text\":\"{}\"}}'", i + 1, row.as_ref()));
    }
    out.push('}');
    out
}

/// Split the title into the sign's four 15-character rows, dropping
/// characters the sign text payload cannot carry.
fn title_rows(title: &str) -> [String; 4] {
    let clean: Vec<char> = title.chars().filter(|c| !matches!(c, '"' | '\'' | '\\')).collect();
    if clean.len() > 60 {
        warn!("song title does not fit on the sign, truncating: {title}");
    }
    std::array::from_fn(|i| clean.iter().skip(i * 15).take(15).collect())
}

/// The 2-wide glass bridge out of the contraption, the ladder shaft at its
/// end, the two signs, and the diorite line from the start button back to
/// the 1gt delayer.
fn build_glass_walkway<S: BlockSink>(
    sink: &mut S,
    player_pos: Vector,
    forward_in: Vector,
    one_gt_delayer_pos: Vector,
    length: i32,
    depth: i32,
    title: &str,
    min_render_dist: i32,
) {
    let mut forward = forward_in;
    let right = forward.rotated(false);
    let up = Vector::UP;
    let mut v = player_pos - up - forward;
    for _ in 0..length + 2 {
        bld::setblock(sink, v, "glass");
        bld::setblock(sink, v + right, "glass");
        v += forward;
    }

    bld::setblock(
        sink,
        v + up - forward + right,
        &sign_descriptor(&[
            "Created with",
            "Note Block Studio",
            "Render distance",
            &format!("must be >= {min_render_dist} !"),
        ]),
    );
    bld::setblock(sink, v + up - forward, &sign_descriptor(&title_rows(title)));

    let save_v = v;
    for _ in 0..depth {
        bld::setblock(sink, v, "glass");
        bld::setblock(sink, v + right, "glass");
        bld::setblock(sink, v + forward, "ladder");
        bld::setblock(sink, v + forward + right, "ladder");
        v -= up;
    }

    // button wire: out sideways, one turn, then straight to the delayer,
    // drifting one level per block until it meets the goal height
    let mut v = save_v + right * 2;
    forward = right;
    let goal = one_gt_delayer_pos;
    bld::setblock(sink, v, bld::START_LINE_BUILDBLOCK);
    bld::setblock(
        sink,
        v + up,
        &format!("stone_button[face=floor,facing={}]", bld::cardinal_direction(forward)),
    );
    v += forward;
    v -= up;
    let mut rc = 0; // redstone since the last repeater, 15 is the limit
    for rotation in [true, false] {
        let diff_forward = goal.get_coord(forward) - v.get_coord(forward) + 1;
        for i in 0..diff_forward {
            if rc == 15 || (rc == 14 && i + 2 == diff_forward) {
                bld::block_and_repeater(sink, v, bld::START_LINE_BUILDBLOCK, forward, 1, false, false);
                rc = 0;
            } else {
                bld::block_and_redstone(sink, v, bld::START_LINE_BUILDBLOCK, false);
                rc += 1;
                if v.y > goal.y {
                    v -= up;
                } else if v.y < goal.y {
                    v += up;
                }
            }
            v += forward;
        }
        if rotation {
            v -= forward;
            forward.rotate(false);
            v += forward;
        }
    }
    assert!(
        v.y == goal.y,
        "the start button line missed the delayer level (at {v}, goal {goal})"
    );
}

/// A render distance of n keeps chunks n-2 out of the player's own loaded,
/// so the farthest horizontal corner dictates the minimum to recommend.
fn calculate_min_render_distance_needed(schem: &Schematic) -> i32 {
    let Some((min, max)) = schem.bounds() else { return 2 };
    let max_distance = (-min.x).max(-min.z).max(max.x).max(max.z);
    max_distance / 16 + 2
}

/// Turn positions for one line's spiral. The first two legs clear the
/// horizontal adjustment and the rear plumbing; after that the legs
/// alternate between the two horizontal axes, each lap growing by the
/// spiral thickness. Legs are added until their combined capacity covers
/// the line's delay footprint plus the per-turn stretch overhead, so the
/// list is long enough for any delay sequence.
fn spiral_turns(line: &LineCircuit, first_z_difference: i32, width: i32) -> VecDeque<i32> {
    let col = line.col;
    let needed = line.delay_footprint();
    let mut turns = VecDeque::new();
    turns.push_back(2 + 2 * col);
    turns.push_back(9 + 4 * col);
    let mut z_difference = first_z_difference;
    let mut x_difference = 2 * width + 13;
    let mut capacity = 0;
    while capacity < needed + 4 * turns.len() as i32 + 16 {
        turns.push_back(z_difference + 4 * col);
        capacity += z_difference + 4 * col;
        z_difference += 2 * width;
        turns.push_back(x_difference + 4 * col);
        capacity += x_difference + 4 * col;
        x_difference += 2 * width;
    }
    turns
}

/// Build the whole contraption for the already split and sorted `lines`.
#[allow(clippy::too_many_arguments)]
pub fn build_contraption(
    schem: &mut Schematic,
    lines: Vec<SplitLine>,
    left_width: i32,
    middle_width: i32,
    right_width: i32,
    height: i32,
    title: &str,
    use_redstone_lamp: bool,
) -> Result<()> {
    let width = left_width + middle_width + right_width;
    ensure!(
        1 <= lines.len() && lines.len() as i32 <= width * height,
        "there are {} lines but only {} places for them",
        lines.len(),
        width * height
    );
    let view_distance = left_width.max(right_width).max(middle_width);
    debug!(
        "assembling {} lines on walls {left_width}/{middle_width}/{right_width}, height {height}",
        lines.len()
    );
    let mut lines = place_lines(lines, left_width, middle_width, right_width, height);

    let shallow_depth = left_width.max(right_width);
    // the longest side-turn redstone run is 2*2*shallow_depth blocks, the
    // two ends may each place their repeater a block early, and one more
    // repeater always terminates the turn
    let turn_max_delay = (2 * 2 * shallow_depth + 2) / 16 + 1;
    for line in &mut lines {
        line.build_noteblock(schem, use_redstone_lamp);
        line.build_side_turn(schem, turn_max_delay);
        line.build_vertical_adjustment(schem);
        line.build_horizontal_adjustment(schem);
        line.add_delay_for_vertical_connection();
    }

    let bottom = build_vertical_connection(schem, lines[0].pos() + Vector::new(2, 3, 0), height);
    let bottom = build_1gt_delayer(schem, bottom, Vector::new(0, 0, -1));
    // at least one block of walkway, otherwise enough to clear the left wall
    let walkway_length = (left_width * 2 - view_distance).max(1);

    // a repeater every 4th block on the start bus behind the junctions
    let junction_delay = (width - 1) / 2;
    for line in &mut lines {
        line.build_junction(schem, junction_delay);
    }

    // the start button line needs 2 blocks of space behind the player
    let begin_z = PLAYER_POS.z - (right_width * 2 - view_distance).max(2 + walkway_length);
    let current_z = lines[0].pos().z;
    let additional_spacing = 8; // extra room behind the player for the spiral
    for line in &mut lines {
        let turns = spiral_turns(line, current_z - begin_z + 2 + additional_spacing, width);
        line.build_delays(schem, turns);
    }

    let min_render_dist = calculate_min_render_distance_needed(schem);
    build_glass_walkway(
        schem,
        PLAYER_POS,
        Vector::new(0, 0, -1),
        bottom,
        walkway_length,
        10,
        title,
        min_render_dist,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn simple_lines(count: usize) -> Vec<SplitLine> {
        (0..count)
            .map(|i| SplitLine::new(33 + (i % 25) as i32, 0, &[(i as i32 % 2) * 2, 20 + (i as i32 % 2) * 2]))
            .collect()
    }

    #[test]
    fn placement_walk_gives_every_line_a_distinct_slot() {
        for (l, m, r, h) in [(0, 2, 0, 1), (2, 3, 0, 2), (2, 2, 2, 4)] {
            let capacity = ((l + m + r) * h) as usize;
            let circuits = place_lines(simple_lines(capacity), l, m, r, h);
            assert_eq!(circuits.len(), capacity);
            let slots: HashSet<(i32, i32, i32)> =
                circuits.iter().map(|c| (c.pos().x, c.pos().y, c.pos().z)).collect();
            assert_eq!(slots.len(), capacity, "wall slots collided for {l}/{m}/{r} h{h}");
        }
    }

    #[test]
    fn single_line_contraption_has_the_expected_stack() {
        let mut schem = Schematic::new();
        let lines = vec![SplitLine::new(33, 0, &[0])];
        build_contraption(&mut schem, lines, 0, 2, 0, 1, "Test song", true).unwrap();

        let noteblocks: Vec<Vector> = schem
            .cells()
            .filter(|(_, block)| block.starts_with("minecraft:note_block"))
            .map(|(v, _)| v)
            .collect();
        assert_eq!(noteblocks.len(), 1);
        let nb = noteblocks[0];
        assert_eq!(
            schem.block_at(nb.x, nb.y, nb.z),
            Some("minecraft:note_block[instrument=harp,note=0]")
        );
        assert_eq!(schem.block_at(nb.x, nb.y - 1, nb.z), Some("minecraft:lapis_block"));
        assert_eq!(schem.block_at(nb.x, nb.y - 2, nb.z), Some("minecraft:redstone_lamp"));
        // the start button made it in
        assert!(schem
            .cells()
            .any(|(_, block)| block.starts_with("minecraft:stone_button")));
    }

    #[test]
    fn every_line_gets_exactly_one_noteblock() {
        let mut schem = Schematic::new();
        let count = 13;
        build_contraption(&mut schem, simple_lines(count), 0, 7, 0, 2, "x", true).unwrap();
        let noteblocks = schem
            .cells()
            .filter(|(_, block)| block.starts_with("minecraft:note_block"))
            .count();
        assert_eq!(noteblocks, count);
    }

    #[test]
    fn three_wall_contraption_assembles() {
        let mut schem = Schematic::new();
        build_contraption(&mut schem, simple_lines(19), 3, 4, 3, 2, "three walls", false).unwrap();
        assert!(schem.block_count() > 0);
    }

    #[test]
    fn too_many_lines_are_refused() {
        let mut schem = Schematic::new();
        assert!(build_contraption(&mut schem, simple_lines(5), 0, 2, 0, 2, "x", true).is_err());
    }

    #[test]
    fn render_distance_follows_the_farthest_corner() {
        let mut schem = Schematic::new();
        schem.set(40, 0, -70, "stone");
        schem.set(-10, 0, 3, "stone");
        assert_eq!(calculate_min_render_distance_needed(&schem), 70 / 16 + 2);
    }

    #[test]
    fn sign_rows_carry_the_title() {
        let rows = title_rows("A quite long song title for a sign");
        assert_eq!(rows[0].chars().count(), 15);
        assert_eq!(rows.concat(), "A quite long song title for a sign");
        let sign = sign_descriptor(&rows);
        assert!(sign.starts_with("birch_sign[rotation=8]{Text1:"));
    }
}
