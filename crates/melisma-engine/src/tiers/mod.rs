//! Concrete synthesis tiers wired into the fallback chain.

pub mod neural;
pub mod parametric;
pub mod samples;

pub use neural::NeuralTier;
pub use parametric::ParametricTier;
pub use samples::SampleTier;
