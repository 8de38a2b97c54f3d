//! Prints the forward footprint of every supported (md, delay) delay cell.
//! Handy when checking layout changes against the spiral's spacing math.

use jukeboxica::primitives::delay_length;

fn main() {
    for md in 2..10 {
        for delay in md..100 {
            println!("{md} md, {delay} delay: {} length", delay_length(delay, md));
        }
    }
}
