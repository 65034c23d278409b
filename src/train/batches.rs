use rand::seq::SliceRandom;
use rand::Rng;

/// Number of mini-batches needed to cover `n_samples`; the last one may be short.
pub fn batch_count(n_samples: usize, batch_size: usize) -> usize {
    n_samples.div_ceil(batch_size.max(1))
}

/// Shuffles the sample indices and splits them into mini-batches of
/// `batch_size` rows.
pub fn shuffled_batches<R: Rng + ?Sized>(n_samples: usize, batch_size: usize, rng: &mut R) -> Vec<Vec<usize>> {
    let mut indices: Vec<usize> = (0..n_samples).collect();
    indices.shuffle(rng);
    indices
        .chunks(batch_size.max(1))
        .map(<[usize]>::to_vec)
        .collect()
}
