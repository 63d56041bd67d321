//! Reference matrix engine for life-cycle impact calculations.
//!
//! Builds dense technosphere (`A`) and biosphere (`B`) matrices from the
//! entity registry, solves `A s = f` for each functional unit and
//! characterizes the inventory `g = B s` with each method's factors.
//!
//! - `MultiLca`: deterministic, every functional unit x every method
//! - `SuperstructureMlca`: the same per scenario of a superstructure dataset
//! - `Contributions` / `SuperstructureContributions`: per-process breakdowns
//! - `MonteCarloLca`: resampled scores for one functional unit

pub mod contributions;
pub mod error;
pub mod indexing;
pub mod matrix;
pub mod mlca;
pub mod monte_carlo;
pub mod superstructure;

pub use contributions::{Contributions, ProcessContribution, SuperstructureContributions};
pub use error::{CalcError, CalcResult};
pub use indexing::KeyIndex;
pub use matrix::{LcaMatrices, MatrixEntry, MatrixKind};
pub use mlca::MultiLca;
pub use monte_carlo::{MethodSamples, MonteCarloLca, MonteCarloResult};
pub use superstructure::SuperstructureMlca;
