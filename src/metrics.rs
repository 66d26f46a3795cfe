use serde::Serialize;

use crate::param::ZERO_EPSILON;

/// Mean of `|original - rebuilt| / original` over points where the original
/// is non-zero. Zero when there are no such points.
pub fn are(original: &[f64], rebuilt: &[f64]) -> f64 {
    let (sum, n) = original
        .iter()
        .zip(rebuilt)
        .filter(|(&o, _)| o > ZERO_EPSILON)
        .fold((0.0, 0usize), |(sum, n), (&o, &r)| (sum + (o - r).abs() / o, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

pub fn cosine_similarity(original: &[f64], rebuilt: &[f64]) -> f64 {
    let dot: f64 = original.iter().zip(rebuilt).map(|(a, b)| a * b).sum();
    let na = norm(original);
    let nb = norm(rebuilt);
    if na < ZERO_EPSILON || nb < ZERO_EPSILON {
        return 1.0;
    }
    dot / (na * nb)
}

pub fn euclidean_distance(original: &[f64], rebuilt: &[f64]) -> f64 {
    original
        .iter()
        .zip(rebuilt)
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f64>()
        .sqrt()
}

/// Ratio of the two signal energies folded into `[0, 1]`.
pub fn energy_similarity(original: &[f64], rebuilt: &[f64]) -> f64 {
    let eo: f64 = original.iter().map(|x| x * x).sum();
    let er: f64 = rebuilt.iter().map(|x| x * x).sum();
    match (eo < ZERO_EPSILON, er < ZERO_EPSILON) {
        (true, true) => 1.0,
        (true, false) => 0.0,
        (false, true) => 0.0,
        (false, false) => {
            let ratio = er / eo;
            if ratio > 1.0 {
                1.0 / ratio
            } else {
                ratio
            }
        }
    }
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Metrics {
    pub are: f64,
    pub cosine_sim: f64,
    pub euclidean_dist: f64,
    pub energy_sim: f64,
}

impl Metrics {
    pub fn compute(original: &[f64], rebuilt: &[f64]) -> Self {
        Self {
            are: are(original, rebuilt),
            cosine_sim: cosine_similarity(original, rebuilt),
            euclidean_dist: euclidean_distance(original, rebuilt),
            energy_sim: energy_similarity(original, rebuilt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_curves_score_perfectly() {
        let x = [1.0, 0.0, 4.0, 2.0];
        let m = Metrics::compute(&x, &x);
        assert_eq!(m.are, 0.0);
        assert!((m.cosine_sim - 1.0).abs() < 1e-12);
        assert_eq!(m.euclidean_dist, 0.0);
        assert_eq!(m.energy_sim, 1.0);
    }

    #[test]
    fn are_skips_zero_points() {
        assert_eq!(are(&[0.0, 2.0, 4.0], &[5.0, 1.0, 6.0]), 0.5);
        assert_eq!(are(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_of_orthogonal_and_empty() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 1.0);
    }

    #[test]
    fn euclidean_matches_hand_value() {
        assert_eq!(euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
    }

    #[test]
    fn energy_ratio_folds() {
        assert_eq!(energy_similarity(&[2.0], &[1.0]), 0.25);
        assert_eq!(energy_similarity(&[1.0], &[2.0]), 0.25);
        assert_eq!(energy_similarity(&[0.0], &[0.0]), 1.0);
        assert_eq!(energy_similarity(&[0.0], &[1.0]), 0.0);
        assert_eq!(energy_similarity(&[1.0], &[0.0]), 0.0);
    }
}
