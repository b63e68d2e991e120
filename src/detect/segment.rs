//! Segmentation of the history map into independently moving regions.
//!
//! Pixels stamped on the current tick seed a flood fill that grows through fresh
//! pixels whose timestamps differ from their already-filled neighbour by at most
//! `seg_threshold` seconds (4-connectivity, floating range). Stale and never-changed
//! pixels block the fill.

use super::history::MotionHistory;
use super::result::Region;

/// Connected components of recent motion, without the whole-frame region.
pub fn segment_motion(history: &MotionHistory, now: f64, seg_threshold: f64) -> Vec<Region> {
    let width = history.width() as usize;
    let height = history.height() as usize;
    let stamps = history.effective_map(now);
    let mut filled = vec![false; stamps.len()];
    let mut regions = Vec::new();
    let mut stack = Vec::new();

    for seed in 0..stamps.len() {
        if filled[seed] || stamps[seed] == 0.0 || stamps[seed] != now {
            continue;
        }
        let mut bounds = Bounds::at(seed % width, seed / width);
        filled[seed] = true;
        stack.push(seed);

        while let Some(idx) = stack.pop() {
            let (x, y) = (idx % width, idx / width);
            bounds.include(x, y);
            let current = stamps[idx];

            let mut visit = |n: usize| {
                if !filled[n] && stamps[n] != 0.0 && (stamps[n] - current).abs() <= seg_threshold {
                    filled[n] = true;
                    stack.push(n);
                }
            };
            if x > 0 {
                visit(idx - 1);
            }
            if x + 1 < width {
                visit(idx + 1);
            }
            if y > 0 {
                visit(idx - width);
            }
            if y + 1 < height {
                visit(idx + width);
            }
        }

        regions.push(bounds.into_region(regions.len() + 1));
    }
    regions
}

struct Bounds {
    min_x: usize,
    min_y: usize,
    max_x: usize,
    max_y: usize,
}

impl Bounds {
    fn at(x: usize, y: usize) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    fn include(&mut self, x: usize, y: usize) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    fn into_region(self, index: usize) -> Region {
        Region {
            index,
            x: self.min_x as u32,
            y: self.min_y as u32,
            width: (self.max_x - self.min_x + 1) as u32,
            height: (self.max_y - self.min_y + 1) as u32,
        }
    }
}
