//! Crossover detection between two aligned series.
//!
//! crossed_above(i) = A[i] > B[i] && A[i-1] <= B[i-1]
//! crossed_below(i) = A[i] < B[i] && A[i-1] >= B[i-1]
//!
//! Undefined at index 0 and wherever either series is undefined at i or i-1.

/// Crossing test on two consecutive (previous, current) pairs.
pub fn crosses_above(prev_a: f64, prev_b: f64, a: f64, b: f64) -> bool {
    a > b && prev_a <= prev_b
}

pub fn crosses_below(prev_a: f64, prev_b: f64, a: f64, b: f64) -> bool {
    a < b && prev_a >= prev_b
}

fn detect(
    a: &[Option<f64>],
    b: &[Option<f64>],
    test: fn(f64, f64, f64, f64) -> bool,
) -> Vec<Option<bool>> {
    let len = a.len().min(b.len());
    (0..len)
        .map(|i| {
            if i == 0 {
                return None;
            }
            let (prev_a, prev_b, cur_a, cur_b) = (a[i - 1]?, b[i - 1]?, a[i]?, b[i]?);
            Some(test(prev_a, prev_b, cur_a, cur_b))
        })
        .collect()
}

pub fn crossed_above(a: &[Option<f64>], b: &[Option<f64>]) -> Vec<Option<bool>> {
    detect(a, b, crosses_above)
}

pub fn crossed_below(a: &[Option<f64>], b: &[Option<f64>]) -> Vec<Option<bool>> {
    detect(a, b, crosses_below)
}
