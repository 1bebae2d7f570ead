// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Framework-free core logic. Nothing in this layer imports burn:
// scores and the bootstrap estimator operate on plain `&[f64]`
// slices so they can be exercised without a tensor backend.
//
// What's in this layer:
//
//   scores.rs    — scalar scoring functions (log score, accuracy,
//                  ROC curve points, AUC) usable as `score_fun`
//                  arguments to the bootstrap estimator
//
//   bootstrap.rs — percentile-bootstrap confidence intervals with
//                  multi-reader aggregation and one-class rejection
//
//   dataset.rs   — label / evaluation-set value types
//
//   traits.rs    — input-source abstractions (Layer 4 implements them)

pub mod bootstrap;
pub mod dataset;
pub mod scores;
pub mod traits;
