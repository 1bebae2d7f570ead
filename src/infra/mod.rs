// ============================================================
// Layer 6 — Infrastructure
// ============================================================
// Persistence concerns that sit beside the pipeline:
//
//   checkpoint.rs — model weights + run config on disk
//                   (the one infra file that touches burn records)
//
//   metrics.rs    — per-epoch training metrics as CSV

pub mod checkpoint;
pub mod metrics;
