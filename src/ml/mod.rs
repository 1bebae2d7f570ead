// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains ALL Burn framework specific code.
// No other layer imports from burn directly, only this one
// (plus the checkpoint recorder in infra).
//
// What's in this layer:
//
//   bernstein.rs — the fixed Beta-density basis and the closed-form
//                  derivative of the coefficient-weighted polynomial
//
//   vimlts.rs    — the variational bias layer:
//                  • three-stage monotone transformation of noise
//                  • change-of-variables log-density
//                  • Monte-Carlo KL against a fixed prior
//                  • density-recovery diagnostic
//
//   model.rs     — the null Bernoulli model wrapping the layer,
//                  with a logit-stable ELBO loss
//
//   nll.rs       — the Monte-Carlo Bernoulli NLL numeric contract
//                  with shape and finiteness validation
//
//   trainer.rs   — full-batch Adam training loop
//
//   predictor.rs — checkpoint loading + Monte-Carlo prediction
//                  for the evaluation workflow
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Beta-density basis for the monotone Bernstein warp
pub mod bernstein;

/// Monte-Carlo Bernoulli NLL numeric contract
pub mod nll;

/// The variational transformation layer
pub mod vimlts;

/// Null Bernoulli model assembled around the layer
pub mod model;

/// Full-batch training loop
pub mod trainer;

/// Checkpoint-backed Monte-Carlo prediction
pub mod predictor;
