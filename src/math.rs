use approx::relative_eq;

pub fn arithmetic_mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

/// Ranks the values of `x` starting at 1, tied values receive the average of their ranks
pub fn average_rank(x: &[f64]) -> Vec<f64> {
    let mut order = (0..x.len()).collect::<Vec<_>>();
    order.sort_by(|&a, &b| x[a].total_cmp(&x[b]));

    let mut ranks = vec![0.0; x.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && x[order[end]] == x[order[start]] {
            end += 1;
        }
        // ranks (start + 1)..=end share their mean
        let rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = rank;
        }
        start = end;
    }
    ranks
}

/// Sum of `t^3 - t` over all groups of tied values
pub fn tie_sum(x: &[f64]) -> f64 {
    let mut sorted = x.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mut total = 0.0;
    let mut start = 0;
    while start < sorted.len() {
        let mut end = start + 1;
        while end < sorted.len() && sorted[end] == sorted[start] {
            end += 1;
        }
        let t = (end - start) as f64;
        total += t * t * t - t;
        start = end;
    }
    total
}

/// Centers `x` on its mean and returns the centered values with their euclidean norm
pub fn center(x: &[f64]) -> (Vec<f64>, f64) {
    let mean = arithmetic_mean(x);
    let centered = x.iter().map(|v| v - mean).collect::<Vec<_>>();
    let norm = centered.iter().map(|v| v * v).sum::<f64>().sqrt();
    (centered, norm)
}

/// Pearson correlation of `x` and `y`, zero when either is constant
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let (cx, nx) = center(x);
    let (cy, ny) = center(y);
    let denom = nx * ny;
    if denom == 0.0 {
        return 0.0;
    }
    cx.iter().zip(cy.iter()).map(|(a, b)| a * b).sum::<f64>() / denom
}

/// Binomial coefficient as a float, zero when `k > n`
pub fn binomial(n: usize, k: usize) -> f64 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

/// Absolute-or-relative float equality used to absorb rounding noise between
/// observed and permuted statistics
pub fn is_close(a: f64, b: f64) -> bool {
    relative_eq!(a, b, epsilon = 1e-8, max_relative = 1e-5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_arithmetic_mean() {
        let x = vec![1., 2., 3.];
        assert_relative_eq!(arithmetic_mean(&x), 2.0);
        assert_relative_eq!(arithmetic_mean(&[]), 0.0);
    }

    #[test]
    fn test_average_rank_no_ties() {
        assert_eq!(average_rank(&[3.0, 1.0, 2.0]), vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_average_rank_ties() {
        assert_eq!(
            average_rank(&[0.0, 5.0, 0.0, 0.0, 2.0]),
            vec![2.0, 5.0, 2.0, 2.0, 4.0]
        );
        assert_eq!(average_rank(&[1.0, 1.0]), vec![1.5, 1.5]);
        assert!(average_rank(&[]).is_empty());
    }

    #[test]
    fn test_tie_sum() {
        assert_relative_eq!(tie_sum(&[1.0, 2.0, 3.0]), 0.0);
        // one group of three (24) and one group of two (6)
        assert_relative_eq!(tie_sum(&[0.0, 0.0, 0.0, 4.0, 4.0]), 30.0);
    }

    #[test]
    fn test_pearson() {
        assert_relative_eq!(pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]), 1.0);
        assert_relative_eq!(pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]), -1.0);
        assert_relative_eq!(pearson(&[1.0, 1.0, 1.0], &[3.0, 2.0, 1.0]), 0.0);
    }

    #[test]
    fn test_binomial() {
        assert_relative_eq!(binomial(5, 2), 10.0);
        assert_relative_eq!(binomial(6, 0), 1.0);
        assert_relative_eq!(binomial(6, 6), 1.0);
        assert_relative_eq!(binomial(20, 10), 184756.0);
        assert_relative_eq!(binomial(3, 4), 0.0);
    }

    #[test]
    fn test_is_close() {
        assert!(is_close(0.1 + 0.2, 0.3));
        assert!(is_close(0.0, 1e-10));
        assert!(!is_close(1.0, 1.001));
    }
}
