//! Evenly spaced search grids.

/// `n` evenly spaced values over `[start, stop]`, both endpoints included.
///
/// `n == 0` yields an empty grid, `n == 1` yields `[start]`, and the last
/// value is exactly `stop`.
///
/// # Example
/// ```
/// use sc_math::linspace;
///
/// let grid = linspace(0.0, 1.0, 5);
/// assert_eq!(grid, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
/// ```
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            let mut grid: Vec<f64> = (0..n).map(|i| i as f64 * step + start).collect();
            grid[n - 1] = stop;
            grid
        }
    }
}
