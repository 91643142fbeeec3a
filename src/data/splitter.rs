// ============================================================
// Layer 4 — Train/Test Splitter
// ============================================================
// Shuffles samples and splits them into two sets:
//   - Training set: used to update model weights
//   - Test set:     held out, drives best-model checkpointing
//
// The shuffle is seeded so a run can be replayed exactly.
// Uses Fisher-Yates via rand::seq::SliceRandom.
//
// Reference: rand crate documentation

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` with `seed` and split off the last `test_size`
/// items as the test set. Returns `(train, test)`.
///
/// `test_size` larger than the input leaves the training set empty.
pub fn split_train_test<T>(mut samples: Vec<T>, test_size: usize, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let split_at = total.saturating_sub(test_size);

    // split_off(n) removes elements [n..] from the Vec and returns them
    let test = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} test",
        samples.len(),
        test.len(),
    );

    (samples, test)
}
