// ── Domain model ──
//
// Canonical representation of a Symphony unit as the engine and its
// hosts see it. Wire shapes stay in `symphony_api::protocol`.

pub mod summary;
pub mod unit;

// ── Re-exports ──────────────────────────────────────────────────────

pub use summary::OperatingSummary;
pub use unit::{Series, UnitId, UnitRecord};
