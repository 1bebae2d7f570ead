// ============================================================
// Layer 5 — Bernstein Polynomial Basis
// ============================================================
// A fixed basis of Beta densities used to build a flexible
// monotone warp on (0, 1).
//
// For degree M the basis members are Beta(i, M-i+1), i = 1..M.
// These are scaled Bernstein basis polynomials:
//
//   Beta(i, M-i+1).pdf(x) = M * binom(M-1, i-1) * x^(i-1) * (1-x)^(M-i)
//
// so the coefficient-weighted mean
//
//   P(x) = mean_i[ theta_i * Beta(i, M-i+1).pdf(x) ]
//
// is a degree M-1 polynomial in Bernstein form. With a
// non-decreasing theta sequence, P is monotone increasing, which
// is what makes the change-of-variables density downstream valid.
//
// The derivative uses the classical degree-reduction identity
//
//   P'(x) = sum_{i=1..M-1} (theta_{i+1} - theta_i) * Beta(i, M-i).pdf(x)
//
// giving a closed form that stays differentiable with respect to
// theta under autodiff. No numeric differentiation anywhere.
//
// Reference: Farouki (2012), The Bernstein polynomial basis: a
//            centennial retrospective

use burn::prelude::*;

/// Fixed (non-trainable) Beta-density basis of a given degree.
/// The degree is the number of coefficients M; construction-time
/// validation lives in the layer config, which guarantees M >= 2.
#[derive(Clone, Debug)]
pub struct BernsteinBasis {
    degree: usize,
}

impl BernsteinBasis {
    pub fn new(degree: usize) -> Self {
        debug_assert!(degree >= 2, "basis degree below 2 cannot form a warp");
        Self { degree }
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Coefficient-weighted basis mean at `x`.
    ///
    /// `x` is `[rows, units]` with entries in (0, 1); `theta` is
    /// `[units, M]`. Returns `[rows, units]`.
    pub fn polynomial<B: Backend>(&self, x: Tensor<B, 2>, theta: Tensor<B, 2>) -> Tensor<B, 2> {
        let m = self.degree;
        debug_assert_eq!(theta.dims()[1], m);
        let [rows, units] = x.dims();

        let mut members = Vec::with_capacity(m);
        for i in 1..=m {
            members.push(beta_pdf(&x, i, m - i + 1));
        }
        let basis = Tensor::stack::<3>(members, 2); // [rows, units, M]

        (basis * theta.unsqueeze::<3>())
            .mean_dim(2)
            .reshape([rows, units])
    }

    /// Closed-form derivative of [`Self::polynomial`] with respect to
    /// `x`, via the degree-reduction identity. Strictly positive
    /// whenever the theta increments are strictly positive.
    pub fn polynomial_deriv<B: Backend>(
        &self,
        x: Tensor<B, 2>,
        theta: Tensor<B, 2>,
    ) -> Tensor<B, 2> {
        let m = self.degree;
        debug_assert_eq!(theta.dims()[1], m);
        let [rows, units] = x.dims();
        let [u, _] = theta.dims();

        let delta = theta.clone().slice([0..u, 1..m]) - theta.slice([0..u, 0..m - 1]);

        let mut members = Vec::with_capacity(m - 1);
        for i in 1..m {
            members.push(beta_pdf(&x, i, m - i));
        }
        let basis = Tensor::stack::<3>(members, 2); // [rows, units, M-1]

        (basis * delta.unsqueeze::<3>())
            .sum_dim(2)
            .reshape([rows, units])
    }
}

/// Beta(a, b) density for integer shape parameters, evaluated
/// elementwise. `x` must lie in (0, 1); the sigmoid squash upstream
/// guarantees that.
fn beta_pdf<B: Backend>(x: &Tensor<B, 2>, a: usize, b: usize) -> Tensor<B, 2> {
    let norm = beta_norm(a, b);
    let left = x.clone().powf_scalar((a - 1) as f64);
    let right = (x.ones_like() - x.clone()).powf_scalar((b - 1) as f64);
    left * right * norm
}

/// 1 / B(a, b) for integer shapes: (a+b-1)! / ((a-1)! (b-1)!),
/// accumulated multiplicatively to stay exact in f64 for the small
/// degrees used here.
fn beta_norm(a: usize, b: usize) -> f64 {
    let mut binom = 1.0;
    for k in 1..a {
        binom *= (b - 1 + k) as f64 / k as f64;
    }
    binom * (a + b - 1) as f64
}
