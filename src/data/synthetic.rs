// ============================================================
// Layer 4 — Synthetic Sliding Puzzle
// ============================================================
// Generates 3x3 sliding-tile puzzle frames so the trainer can run
// without an image dataset on disk.
//
// Board:  9 cells, values 0..=8, 0 is the blank.
//         Goal board is [0, 1, 2, 3, 4, 5, 6, 7, 8].
//         A random board is a random walk of `scramble` blank
//         moves away from the goal, so every board is solvable.
//
// Render: each cell is a `tile_size` square.
//         - blank cell                → all 0.0
//         - tile v (1..=8)            → 1 px dark border, then three
//                                       vertical bands, band i bright
//                                       (1.0) when bit i of v is set,
//                                       dim (0.3) otherwise
//
// Paired mode: the successor frame is the same board after one
// more random legal blank move.

use anyhow::{ensure, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::domain::frame::{FrameSample, FrameShape};
use crate::domain::traits::SampleSource;

const SIDE: usize = 3;

type Board = [u8; SIDE * SIDE];

pub struct SlidingPuzzle {
    pub tile_size: usize,
    pub samples:   usize,
    pub scramble:  usize,
    pub paired:    bool,
    pub seed:      u64,
}

impl SlidingPuzzle {
    pub fn shape(&self) -> FrameShape {
        FrameShape::new(1, SIDE * self.tile_size, SIDE * self.tile_size)
    }

    fn render(&self, board: &Board) -> Vec<f32> {
        let t    = self.tile_size;
        let side = SIDE * t;
        let mut pixels = vec![0.0f32; side * side];

        for (cell, &value) in board.iter().enumerate() {
            if value == 0 {
                continue;
            }
            let (row, col) = (cell / SIDE, cell % SIDE);
            for y in 1..t.saturating_sub(1) {
                for x in 1..t.saturating_sub(1) {
                    let band = ((x - 1) * 3 / (t - 2)).min(2);
                    let lit  = value & (1 << band) != 0;
                    pixels[(row * t + y) * side + col * t + x] = if lit { 1.0 } else { 0.3 };
                }
            }
        }
        pixels
    }
}

impl SampleSource for SlidingPuzzle {
    fn load_all(&self) -> Result<(FrameShape, Vec<FrameSample>)> {
        ensure!(self.tile_size >= 4, "tile size must be at least 4 pixels");

        let mut rng     = StdRng::seed_from_u64(self.seed);
        let mut samples = Vec::with_capacity(self.samples);
        for _ in 0..self.samples {
            let mut board = goal();
            for _ in 0..self.scramble {
                board = random_move(&board, &mut rng);
            }
            let image = self.render(&board);
            samples.push(if self.paired {
                FrameSample::paired(image, self.render(&random_move(&board, &mut rng)))
            } else {
                FrameSample::single(image)
            });
        }

        tracing::info!(
            "Generated {} synthetic {} puzzle samples",
            samples.len(),
            if self.paired { "paired" } else { "single" }
        );
        Ok((self.shape(), samples))
    }
}

fn goal() -> Board {
    [0, 1, 2, 3, 4, 5, 6, 7, 8]
}

/// Boards reachable by sliding one tile into the blank.
fn successors(board: &Board) -> Vec<Board> {
    let blank = board.iter().position(|&v| v == 0).unwrap_or(0);
    let (r, c) = (blank / SIDE, blank % SIDE);

    let mut out = Vec::with_capacity(4);
    let mut swap_with = |cell: usize| {
        let mut next = *board;
        next.swap(blank, cell);
        out.push(next);
    };
    if r > 0        { swap_with(blank - SIDE); }
    if r + 1 < SIDE { swap_with(blank + SIDE); }
    if c > 0        { swap_with(blank - 1); }
    if c + 1 < SIDE { swap_with(blank + 1); }
    out
}

fn random_move(board: &Board, rng: &mut StdRng) -> Board {
    *successors(board).choose(rng).unwrap_or(board)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn puzzle(paired: bool) -> SlidingPuzzle {
        SlidingPuzzle { tile_size: 8, samples: 16, scramble: 20, paired, seed: 3 }
    }

    #[test]
    fn test_blank_has_two_to_four_moves() {
        assert_eq!(successors(&goal()).len(), 2);
        let centre = [1, 2, 3, 4, 0, 5, 6, 7, 8];
        assert_eq!(successors(&centre).len(), 4);
    }

    #[test]
    fn test_frames_have_declared_shape_and_range() {
        let p = puzzle(false);
        let (shape, samples) = p.load_all().unwrap();
        assert_eq!(shape, FrameShape::new(1, 24, 24));
        assert_eq!(samples.len(), 16);
        for s in &samples {
            assert_eq!(s.image.len(), shape.len());
            assert!(s.image.iter().all(|&v| (0.0..=1.0).contains(&v)));
            assert!(s.next.is_none());
        }
    }

    #[test]
    fn test_successor_differs_by_one_move() {
        let (_, samples) = puzzle(true).load_all().unwrap();
        for s in samples {
            let next = s.next.expect("paired sample");
            assert_eq!(next.len(), s.image.len());
            assert_ne!(next, s.image);
        }
    }

    #[test]
    fn test_same_seed_same_frames() {
        let (_, a) = puzzle(true).load_all().unwrap();
        let (_, b) = puzzle(true).load_all().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_tiny_tiles() {
        let p = SlidingPuzzle { tile_size: 2, ..puzzle(false) };
        assert!(p.load_all().is_err());
    }
}
