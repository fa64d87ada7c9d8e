//! Peak search for the energy scan.
//!
//! # Example
//! ```rust
//! use stepnode_core::utils::math::energy::{index_of_maximum, peak_position};
//! assert_eq!(index_of_maximum(&[3u16, 5, 5, 2]), Some(1));
//! assert_eq!(peak_position(&[3, 5, 5, 2], 100), Some(50));
//! ```

/// Index of the largest sample; the first one wins on ties.
///
/// Returns `None` for an empty slice.
pub fn index_of_maximum<T: PartialOrd>(samples: &[T]) -> Option<usize> {
    let mut best = None;
    for (i, sample) in samples.iter().enumerate() {
        match best {
            Some(b) if *sample <= samples[b] => {}
            _ => best = Some(i),
        }
    }
    best
}

/// Motor position of the strongest sample.
///
/// `stride` is the number of step-output edges between samples; two edges make
/// one step, so the peak sits at `index * stride / 2` steps from the sweep start.
pub fn peak_position(
    samples: &[u16],
    stride: u32,
) -> Option<u32> {
    index_of_maximum(samples).map(|i| i as u32 * (stride / 2))
}
