//! Play queue: ordered tracks, a current index, and the advance rules.
//!
//! The index is always within bounds while the queue is non-empty; an empty
//! queue has no current track. Shuffle guarantees no immediate repeat only,
//! not full-history avoidance.

use core_catalog::{Track, TrackId};
use rand::Rng;

/// Direction of queue traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Ordered play queue with a current index.
#[derive(Debug, Clone, Default)]
pub struct PlaybackQueue {
    tracks: Vec<Track>,
    index: usize,
}

impl PlaybackQueue {
    /// Build a queue positioned at `start`. An out-of-range start clamps to 0.
    pub fn new(tracks: Vec<Track>, start: usize) -> Self {
        let index = if start < tracks.len() { start } else { 0 };
        Self { tracks, index }
    }

    /// Build a queue positioned at the given track, defaulting to index 0
    /// when the track is not in the queue.
    pub fn positioned_at(tracks: Vec<Track>, track_id: TrackId) -> Self {
        let index = tracks.iter().position(|t| t.id == track_id).unwrap_or(0);
        Self { tracks, index }
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> Option<&Track> {
        self.tracks.get(self.index)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.index = 0;
    }

    /// Candidate index one step in the given direction.
    ///
    /// Shuffle draws a uniformly random index different from the current one
    /// (when more than one track exists). Non-shuffle wraps around.
    fn step<R: Rng>(&self, from: usize, direction: Direction, shuffle: bool, rng: &mut R) -> usize {
        let len = self.tracks.len();
        if len <= 1 {
            return 0;
        }
        if shuffle {
            // Uniform over the other len-1 indices: no immediate repeat.
            let draw = rng.gen_range(0..len - 1);
            return if draw >= from { draw + 1 } else { draw };
        }
        match direction {
            Direction::Forward => (from + 1) % len,
            Direction::Backward => {
                if from == 0 {
                    len - 1
                } else {
                    from - 1
                }
            }
        }
    }

    /// Move the index one step, skipping tracks the filter rejects.
    ///
    /// Probes at most `len` candidate indices; returns `None` (index
    /// unchanged) when no candidate passes, which is what prevents an
    /// infinite loop when nothing in the queue is playable.
    pub fn advance_filtered<R, F>(
        &mut self,
        direction: Direction,
        shuffle: bool,
        rng: &mut R,
        mut playable: F,
    ) -> Option<&Track>
    where
        R: Rng,
        F: FnMut(&Track) -> bool,
    {
        if self.tracks.is_empty() {
            return None;
        }
        if self.tracks.len() == 1 {
            // Single-track queue: the step is a no-op on index 0.
            return self.tracks.first().filter(|t| playable(t));
        }

        let mut candidate = self.index;
        for _ in 0..self.tracks.len() {
            candidate = self.step(candidate, direction, shuffle, rng);
            if playable(&self.tracks[candidate]) {
                self.index = candidate;
                return self.current();
            }
        }
        None
    }

    /// Move one step with no playability filter.
    pub fn advance<R: Rng>(
        &mut self,
        direction: Direction,
        shuffle: bool,
        rng: &mut R,
    ) -> Option<&Track> {
        self.advance_filtered(direction, shuffle, rng, |_| true)
    }
}
