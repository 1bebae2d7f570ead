// ============================================================
// Layer 2 — Application Layer
// ============================================================
// Use cases gluing the pipeline together. The CLI converts its
// arguments into the configs defined here and calls execute();
// nothing in this layer parses arguments or touches tensors.

pub mod evaluate_use_case;
pub mod train_use_case;
