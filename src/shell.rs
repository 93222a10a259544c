use nalgebra::Vector3;

/// Endless walk over integer cell offsets in order of increasing Chebyshev
/// radius: the origin, then the hollow cube (square in 2D) of radius 1, and
/// so on.
///
/// No cell at radius `r` or beyond can hold a point closer than
/// `(r - 1) * cell_width` to any point of the origin cell, which is what the
/// query iterators use to stop expanding.
#[derive(Clone, Debug)]
pub struct ShellSequence {
    is_2d: bool,
    range: i32,
    offsets: Vec<Vector3<i32>>,
    cursor: usize,
}

impl ShellSequence {
    pub fn new(is_2d: bool) -> Self {
        Self {
            is_2d,
            range: 0,
            offsets: shell_offsets(0, is_2d),
            cursor: 0,
        }
    }

    /// Chebyshev radius of the shell the last yielded offset belongs to.
    pub fn range(&self) -> i32 {
        self.range
    }
}

impl Iterator for ShellSequence {
    type Item = Vector3<i32>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == self.offsets.len() {
            self.range += 1;
            self.offsets = shell_offsets(self.range, self.is_2d);
            self.cursor = 0;
        }
        let offset = self.offsets[self.cursor];
        self.cursor += 1;
        Some(offset)
    }
}

/// All offsets with `max(|dx|, |dy|, |dz|) == range`; dz is always 0 in 2D.
pub fn shell_offsets(range: i32, is_2d: bool) -> Vec<Vector3<i32>> {
    if range == 0 {
        return vec![Vector3::zeros()];
    }
    let r = range;
    let mut offsets = Vec::new();
    let z_span = if is_2d { 0..=0 } else { -r..=r };
    for dz in z_span {
        for dy in -r..=r {
            if dz.abs() == r || dy.abs() == r {
                // Whole face row.
                for dx in -r..=r {
                    offsets.push(Vector3::new(dx, dy, dz));
                }
            } else {
                offsets.push(Vector3::new(-r, dy, dz));
                offsets.push(Vector3::new(r, dy, dz));
            }
        }
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    fn chebyshev(o: &Vector3<i32>) -> i32 {
        o.x.abs().max(o.y.abs()).max(o.z.abs())
    }

    #[test]
    fn test_shell_sizes_3d() {
        assert_eq!(shell_offsets(0, false).len(), 1);
        for r in 1..6 {
            let side = 2 * r + 1;
            let inner = 2 * r - 1;
            assert_eq!(
                shell_offsets(r, false).len() as i32,
                side * side * side - inner * inner * inner
            );
        }
    }

    #[test]
    fn test_shell_sizes_2d() {
        for r in 1..6 {
            let shell = shell_offsets(r, true);
            assert_eq!(shell.len() as i32, 8 * r);
            assert!(shell.iter().all(|o| o.z == 0));
        }
    }

    #[test]
    fn test_sequence_is_ordered_and_unique() {
        let mut seq = ShellSequence::new(false);
        let mut seen = FxHashSet::default();
        let mut last_range = 0;
        // Radii 0..=4 hold 9^3 offsets.
        for _ in 0..729 {
            let o = seq.next().unwrap();
            assert!(seen.insert(o), "offset {:?} yielded twice", o);
            assert_eq!(chebyshev(&o), seq.range());
            assert!(seq.range() >= last_range);
            last_range = seq.range();
        }
        assert_eq!(seq.range(), 4);
        seq.next();
        assert_eq!(seq.range(), 5);
    }

    #[test]
    fn test_sequence_starts_at_origin() {
        let mut seq = ShellSequence::new(true);
        assert_eq!(seq.next(), Some(Vector3::zeros()));
        assert_eq!(seq.range(), 0);
        assert_eq!(seq.next().map(|o| chebyshev(&o)), Some(1));
        assert_eq!(seq.range(), 1);
    }
}
