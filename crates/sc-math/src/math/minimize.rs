//! Pluggable derivative-free minimization of scalar losses.
//!
//! Callers that need a generic optimizer (e.g. Platt coefficient fitting)
//! depend on the [`ScalarLossMinimizer`] trait rather than on a concrete
//! algorithm. [`NelderMead`] is the built-in implementation.

use serde::{Deserialize, Serialize};

/// Result of a minimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Minimum {
    /// Best parameter vector found.
    pub x: Vec<f64>,
    /// Loss at `x`.
    pub value: f64,
    /// Iterations performed.
    pub iterations: usize,
    /// Whether the tolerance criteria were met before the iteration cap.
    pub converged: bool,
}

/// A minimizer for `loss: R^n -> R`.
pub trait ScalarLossMinimizer {
    fn minimize(&self, loss: &dyn Fn(&[f64]) -> f64, x0: &[f64]) -> Minimum;
}

/// Downhill simplex (Nelder–Mead) with the standard coefficients
/// (reflection 1, expansion 2, contraction 0.5, shrink 0.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NelderMead {
    /// Iteration cap; `None` means `200 * n`.
    pub max_iterations: Option<usize>,
    /// Convergence tolerance on simplex vertex spread.
    pub x_tolerance: f64,
    /// Convergence tolerance on loss spread across vertices.
    pub f_tolerance: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iterations: None,
            x_tolerance: 1e-4,
            f_tolerance: 1e-4,
        }
    }
}

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;
const NONZERO_DELTA: f64 = 0.05;
const ZERO_DELTA: f64 = 0.00025;

impl NelderMead {
    fn initial_simplex(x0: &[f64]) -> Vec<Vec<f64>> {
        let mut simplex = Vec::with_capacity(x0.len() + 1);
        simplex.push(x0.to_vec());
        for k in 0..x0.len() {
            let mut vertex = x0.to_vec();
            vertex[k] = if vertex[k] != 0.0 {
                (1.0 + NONZERO_DELTA) * vertex[k]
            } else {
                ZERO_DELTA
            };
            simplex.push(vertex);
        }
        simplex
    }

    fn converged(&self, simplex: &[Vec<f64>], values: &[f64]) -> bool {
        let x_spread = simplex[1..]
            .iter()
            .flat_map(|v| v.iter().zip(&simplex[0]).map(|(a, b)| (a - b).abs()))
            .fold(0.0, f64::max);
        let f_spread = values[1..]
            .iter()
            .map(|f| (f - values[0]).abs())
            .fold(0.0, f64::max);
        x_spread <= self.x_tolerance && f_spread <= self.f_tolerance
    }
}

/// `base + coeff * (base - other)`, elementwise.
fn step_from(base: &[f64], other: &[f64], coeff: f64) -> Vec<f64> {
    base.iter()
        .zip(other)
        .map(|(b, o)| b + coeff * (b - o))
        .collect()
}

impl ScalarLossMinimizer for NelderMead {
    fn minimize(&self, loss: &dyn Fn(&[f64]) -> f64, x0: &[f64]) -> Minimum {
        let n = x0.len();
        if n == 0 {
            return Minimum {
                x: Vec::new(),
                value: loss(&[]),
                iterations: 0,
                converged: true,
            };
        }
        let max_iterations = self.max_iterations.unwrap_or(200 * n);

        let mut simplex = Self::initial_simplex(x0);
        let mut values: Vec<f64> = simplex.iter().map(|v| loss(v)).collect();
        let mut iterations = 0;
        let mut converged = false;

        while iterations < max_iterations {
            // Order vertices best → worst.
            let mut order: Vec<usize> = (0..=n).collect();
            order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
            simplex = order.iter().map(|&i| simplex[i].clone()).collect();
            values = order.iter().map(|&i| values[i]).collect();

            if self.converged(&simplex, &values) {
                converged = true;
                break;
            }

            let centroid: Vec<f64> = (0..n)
                .map(|j| simplex[..n].iter().map(|v| v[j]).sum::<f64>() / n as f64)
                .collect();
            let worst = simplex[n].clone();

            let reflected = step_from(&centroid, &worst, REFLECT);
            let f_reflected = loss(&reflected);
            let mut shrink = false;

            if f_reflected < values[0] {
                let expanded = step_from(&centroid, &worst, REFLECT * EXPAND);
                let f_expanded = loss(&expanded);
                if f_expanded < f_reflected {
                    simplex[n] = expanded;
                    values[n] = f_expanded;
                } else {
                    simplex[n] = reflected;
                    values[n] = f_reflected;
                }
            } else if f_reflected < values[n - 1] {
                simplex[n] = reflected;
                values[n] = f_reflected;
            } else if f_reflected < values[n] {
                let outside = step_from(&centroid, &worst, CONTRACT * REFLECT);
                let f_outside = loss(&outside);
                if f_outside <= f_reflected {
                    simplex[n] = outside;
                    values[n] = f_outside;
                } else {
                    shrink = true;
                }
            } else {
                let inside = step_from(&centroid, &worst, -CONTRACT);
                let f_inside = loss(&inside);
                if f_inside < values[n] {
                    simplex[n] = inside;
                    values[n] = f_inside;
                } else {
                    shrink = true;
                }
            }

            if shrink {
                let best = simplex[0].clone();
                for j in 1..=n {
                    simplex[j] = best
                        .iter()
                        .zip(&simplex[j])
                        .map(|(b, v)| b + SHRINK * (v - b))
                        .collect();
                    values[j] = loss(&simplex[j]);
                }
            }

            iterations += 1;
        }

        let best = (0..=n)
            .min_by(|&a, &b| values[a].total_cmp(&values[b]))
            .unwrap_or(0);
        Minimum {
            x: simplex[best].clone(),
            value: values[best],
            iterations,
            converged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadratic_bowl() {
        let loss = |x: &[f64]| (x[0] - 3.0).powi(2) + (x[1] + 1.0).powi(2);
        let m = NelderMead::default().minimize(&loss, &[0.0, 0.0]);
        assert!(m.converged);
        assert!((m.x[0] - 3.0).abs() < 1e-2, "{:?}", m.x);
        assert!((m.x[1] + 1.0).abs() < 1e-2, "{:?}", m.x);
        assert!(m.value < 1e-3);
    }

    #[test]
    fn minimum_and_settings_serialize() {
        let loss = |x: &[f64]| (x[0] - 3.0).powi(2) + (x[1] + 1.0).powi(2);
        let m = NelderMead::default().minimize(&loss, &[0.0, 0.0]);
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["converged"], true);
        assert_eq!(json["x"].as_array().unwrap().len(), 2);
        let back: Minimum = serde_json::from_value(json).unwrap();
        assert_eq!(back, m);

        let nm: NelderMead =
            serde_json::from_str(r#"{"max_iterations": 50, "x_tolerance": 1e-6, "f_tolerance": 1e-7}"#)
                .unwrap();
        assert_eq!(nm.max_iterations, Some(50));
        assert_eq!(nm.f_tolerance, 1e-7);
    }

    #[test]
    fn rosenbrock_valley() {
        let loss = |x: &[f64]| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let nm = NelderMead {
            max_iterations: Some(2000),
            x_tolerance: 1e-8,
            f_tolerance: 1e-10,
        };
        let m = nm.minimize(&loss, &[-1.2, 1.0]);
        assert!((m.x[0] - 1.0).abs() < 1e-3, "{:?}", m.x);
        assert!((m.x[1] - 1.0).abs() < 1e-3, "{:?}", m.x);
    }

    #[test]
    fn one_dimensional() {
        let loss = |x: &[f64]| (x[0] - 0.5).abs();
        let m = NelderMead::default().minimize(&loss, &[4.0]);
        assert!((m.x[0] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn iteration_cap_respected() {
        let loss = |x: &[f64]| x[0] * x[0] + x[1] * x[1];
        let nm = NelderMead {
            max_iterations: Some(3),
            ..NelderMead::default()
        };
        let m = nm.minimize(&loss, &[10.0, 10.0]);
        assert_eq!(m.iterations, 3);
        assert!(!m.converged);
    }

    #[test]
    fn zero_dimensional_is_trivial() {
        let loss = |_: &[f64]| 7.0;
        let m = NelderMead::default().minimize(&loss, &[]);
        assert!(m.converged);
        assert_eq!(m.value, 7.0);
    }

    #[test]
    fn initial_simplex_perturbs_each_axis() {
        let s = NelderMead::initial_simplex(&[1.0, 0.0]);
        assert_eq!(s.len(), 3);
        assert_eq!(s[1], vec![1.05, 0.0]);
        assert_eq!(s[2], vec![1.0, ZERO_DELTA]);
    }
}
