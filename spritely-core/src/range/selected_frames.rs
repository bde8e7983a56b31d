use rangemap::RangeInclusiveSet;

use crate::sprite::Frame;

/// A set of frames, stored as sorted, disjoint, inclusive intervals.
///
/// Adjacent intervals are merged on insertion, so [`Self::ranges`] counts maximal contiguous runs.
/// A set may be flagged as reversed, in which case iteration yields frames in descending order.
#[derive(Clone, Debug)]
pub struct SelectedFrames {
    ranges: RangeInclusiveSet<Frame>,
    reversed: bool,
}
impl Default for SelectedFrames {
    fn default() -> Self {
        Self {
            ranges: RangeInclusiveSet::new(),
            reversed: false,
        }
    }
}
impl PartialEq for SelectedFrames {
    /// Iteration direction does not take part in equality.
    fn eq(&self, other: &Self) -> bool {
        self.ranges.iter().eq(other.ranges.iter())
    }
}
impl Eq for SelectedFrames {}

impl SelectedFrames {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Number of selected frames.
    #[must_use]
    pub fn size(&self) -> usize {
        self.ranges
            .iter()
            .map(|range| (range.end() - range.start()).unsigned_abs() as usize + 1)
            .sum()
    }
    /// Number of maximal contiguous runs.
    #[must_use]
    pub fn ranges(&self) -> usize {
        self.ranges.iter().count()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.iter().next().is_none()
    }
    #[must_use]
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }
    /// Deselect everything. A cleared set iterates forward again.
    pub fn clear(&mut self) {
        self.ranges = RangeInclusiveSet::new();
        self.reversed = false;
    }
    pub fn insert(&mut self, frame: Frame) {
        self.ranges.insert(frame..=frame);
    }
    /// Insert an inclusive interval. Bounds may be given in either order.
    pub fn insert_range(&mut self, from: Frame, to: Frame) {
        self.ranges.insert(from.min(to)..=from.max(to));
    }
    #[must_use]
    pub fn contains(&self, frame: Frame) -> bool {
        self.ranges.contains(&frame)
    }
    /// Lowest selected frame, or `-1` if empty.
    #[must_use]
    pub fn first_frame(&self) -> Frame {
        self.ranges.iter().next().map_or(-1, |range| *range.start())
    }
    /// Highest selected frame, or `-1` if empty.
    #[must_use]
    pub fn last_frame(&self) -> Frame {
        self.ranges.iter().last().map_or(-1, |range| *range.end())
    }
    /// Frames in ascending order, whether or not this set is reversed.
    pub fn iter_ascending(&self) -> impl Iterator<Item = Frame> + '_ {
        self.ranges.iter().flat_map(Clone::clone)
    }
    /// Frames in ascending order, or descending if this set is reversed.
    pub fn iter(&self) -> impl Iterator<Item = Frame> + '_ {
        let forward = self.iter_ascending();
        if self.reversed {
            let mut frames: Vec<Frame> = forward.collect();
            frames.reverse();
            either::Either::Right(frames.into_iter())
        } else {
            either::Either::Left(forward)
        }
    }
    /// The same frames, iterated in the opposite direction.
    #[must_use]
    pub fn make_reverse(&self) -> Self {
        Self {
            ranges: self.ranges.clone(),
            reversed: !self.reversed,
        }
    }
    /// The same frames, iterated descending if `reversed`, ascending otherwise.
    #[must_use]
    pub fn with_reversed(&self, reversed: bool) -> Self {
        Self {
            ranges: self.ranges.clone(),
            reversed,
        }
    }
    /// Shift every frame by `delta`. The shift is clamped so no frame becomes negative.
    pub fn displace(&mut self, delta: Frame) {
        if self.is_empty() {
            return;
        }
        let delta = delta.max(-self.first_frame());
        if delta == 0 {
            return;
        }
        let shifted: RangeInclusiveSet<Frame> = self
            .ranges
            .iter()
            .map(|range| (range.start() + delta)..=(range.end() + delta))
            .collect();
        self.ranges = shifted;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn runs_merge() {
        let mut frames = SelectedFrames::new();
        frames.insert(1);
        frames.insert(3);
        assert_eq!(frames.ranges(), 2);
        frames.insert(2);
        assert_eq!(frames.ranges(), 1);
        frames.insert_range(8, 6);
        assert_eq!(frames.ranges(), 2);
        assert_eq!(frames.size(), 6);
        assert_eq!(frames.first_frame(), 1);
        assert_eq!(frames.last_frame(), 8);
        assert_eq!(frames.iter().collect::<Vec<_>>(), vec![1, 2, 3, 6, 7, 8]);
    }
    #[test]
    fn reverse_iteration() {
        let mut frames = SelectedFrames::new();
        frames.insert_range(0, 2);
        frames.insert(5);
        let reversed = frames.make_reverse();
        assert_eq!(reversed.iter().collect::<Vec<_>>(), vec![5, 2, 1, 0]);
        assert_eq!(reversed, frames);
        assert_eq!(reversed.make_reverse().iter().next(), Some(0));
    }
    #[test]
    fn clear_resets_direction() {
        let mut frames = SelectedFrames::new();
        frames.insert_range(0, 2);
        let mut frames = frames.make_reverse();
        assert_eq!(frames.iter_ascending().collect::<Vec<_>>(), vec![0, 1, 2]);
        frames.clear();
        assert!(!frames.is_reversed());
        frames.insert_range(4, 5);
        assert_eq!(frames.iter().collect::<Vec<_>>(), vec![4, 5]);
        // Direction is set, not toggled.
        let backwards = frames.make_reverse();
        assert!(backwards.with_reversed(true).is_reversed());
        assert!(!backwards.with_reversed(false).is_reversed());
    }
    #[test]
    fn displace_never_negative() {
        let mut frames = SelectedFrames::new();
        frames.insert_range(2, 3);
        frames.displace(-5);
        assert_eq!(frames.iter().collect::<Vec<_>>(), vec![0, 1]);
        frames.displace(4);
        assert_eq!(frames.iter().collect::<Vec<_>>(), vec![4, 5]);
    }
    #[test]
    fn empty() {
        let frames = SelectedFrames::new();
        assert_eq!(frames.first_frame(), -1);
        assert_eq!(frames.last_frame(), -1);
        assert_eq!(frames.size(), 0);
    }
}
