//! Simulation State
//!
//! Triple-buffered vertex positions (current, previous, previous-previous) for
//! Verlet-style integration, plus per-vertex tangents.
//!
//! ```text
//!            rotate()
//! [cur] [prev] [prev2]   ──►   [prev2'] [cur'] [prev']
//!                              write    read    read
//! ```
//!
//! Buffers are rotated, never copied: after [`SimulationState::rotate`] the
//! oldest buffer becomes the write target.

use glam::{Vec3, Vec4};

/// Per-group mutable simulation buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    buffers: [Vec<Vec4>; 3],
    /// Index of the current buffer; previous is `current + 2`, previous-previous `current + 1` (mod 3).
    current: usize,
    tangents: Vec<Vec3>,
    /// Frames this state has been advanced by the solver.
    frames_simulated: u64,
}

impl SimulationState {
    /// Allocates all three buffers initialized to the rest pose.
    #[must_use]
    pub fn new(rest_positions: &[Vec4], vertices_per_strand: usize) -> Self {
        let mut state = Self {
            buffers: [
                rest_positions.to_vec(),
                rest_positions.to_vec(),
                rest_positions.to_vec(),
            ],
            current: 0,
            tangents: vec![Vec3::ZERO; rest_positions.len()],
            frames_simulated: 0,
        };
        state.recompute_tangents(vertices_per_strand);
        state
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.buffers[0].len()
    }

    #[inline]
    pub fn frames_simulated(&self) -> u64 {
        self.frames_simulated
    }

    #[inline]
    pub(crate) fn mark_simulated(&mut self) {
        self.frames_simulated += 1;
    }

    #[inline]
    fn previous_index(&self) -> usize {
        (self.current + 2) % 3
    }

    #[inline]
    fn previous_previous_index(&self) -> usize {
        (self.current + 1) % 3
    }

    #[inline]
    pub fn current(&self) -> &[Vec4] {
        &self.buffers[self.current]
    }

    #[inline]
    pub fn current_mut(&mut self) -> &mut [Vec4] {
        &mut self.buffers[self.current]
    }

    #[inline]
    pub fn previous(&self) -> &[Vec4] {
        &self.buffers[self.previous_index()]
    }

    #[inline]
    pub fn previous_previous(&self) -> &[Vec4] {
        &self.buffers[self.previous_previous_index()]
    }

    #[inline]
    pub fn tangents(&self) -> &[Vec3] {
        &self.tangents
    }

    /// Makes the oldest buffer the new current (write target). The old current
    /// becomes previous and the old previous becomes previous-previous.
    pub fn rotate(&mut self) {
        self.current = (self.current + 1) % 3;
    }

    /// Split borrow: (current, previous, previous-previous).
    pub fn split_mut(&mut self) -> (&mut [Vec4], &mut [Vec4], &mut [Vec4]) {
        let cur = self.current;
        let prev = self.previous_index();
        let [a, b, c] = &mut self.buffers;
        let bufs: [&mut Vec<Vec4>; 3] = [a, b, c];
        let mut slots: [Option<&mut Vec<Vec4>>; 3] = bufs.map(Some);
        let current = slots[cur].take().map(Vec::as_mut_slice);
        let previous = slots[prev].take().map(Vec::as_mut_slice);
        let previous_previous = slots[(cur + 1) % 3].take().map(Vec::as_mut_slice);
        match (current, previous, previous_previous) {
            (Some(c), Some(p), Some(pp)) => (c, p, pp),
            _ => unreachable!("ring indices are always distinct"),
        }
    }

    /// Copies the current buffer into both history buffers, zeroing the implied velocity.
    pub fn equalize_history(&mut self) {
        let (current, previous, previous_previous) = self.split_mut();
        previous.copy_from_slice(current);
        previous_previous.copy_from_slice(current);
    }

    /// Overwrites all three buffers with `positions`.
    pub fn reset_to(&mut self, positions: &[Vec4]) {
        for buffer in &mut self.buffers {
            buffer.copy_from_slice(positions);
        }
    }

    /// Recomputes tangents along each strand from the current positions.
    ///
    /// Each vertex takes the direction to the next vertex; the tip reuses the
    /// last segment's direction. Degenerate segments keep the previous
    /// vertex's tangent.
    pub fn recompute_tangents(&mut self, vertices_per_strand: usize) {
        let vps = vertices_per_strand.max(1);
        let positions = &self.buffers[self.current];
        for (strand_pos, strand_tan) in positions.chunks(vps).zip(self.tangents.chunks_mut(vps)) {
            let mut last = Vec3::ZERO;
            for i in 0..strand_pos.len() {
                let dir = if i + 1 < strand_pos.len() {
                    (strand_pos[i + 1] - strand_pos[i]).truncate().normalize_or_zero()
                } else {
                    last
                };
                if dir != Vec3::ZERO {
                    last = dir;
                }
                strand_tan[i] = last;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotate_makes_oldest_buffer_current() {
        let rest = vec![Vec4::ZERO; 2];
        let mut state = SimulationState::new(&rest, 2);
        state.current_mut()[0] = Vec4::splat(1.0);
        state.rotate();
        state.current_mut()[0] = Vec4::splat(2.0);
        state.rotate();
        state.current_mut()[0] = Vec4::splat(3.0);

        assert_eq!(state.current()[0], Vec4::splat(3.0));
        assert_eq!(state.previous()[0], Vec4::splat(2.0));
        assert_eq!(state.previous_previous()[0], Vec4::splat(1.0));

        // The next rotation recycles the buffer that held 1.0.
        state.rotate();
        assert_eq!(state.current()[0], Vec4::splat(1.0));
        assert_eq!(state.previous()[0], Vec4::splat(3.0));
    }

    #[test]
    fn equalize_history_zeroes_velocity() {
        let mut state = SimulationState::new(&[Vec4::ZERO], 1);
        state.rotate();
        state.current_mut()[0] = Vec4::new(1.0, 2.0, 3.0, 1.0);
        state.equalize_history();
        assert_eq!(state.previous(), state.current());
        assert_eq!(state.previous_previous(), state.current());
    }
}
