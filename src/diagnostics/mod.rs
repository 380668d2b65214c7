//! Post-selection diagnostics
//!
//! Deviation severities and explanations per nutrient, ionic balance and
//! EC estimate of the final solution, nutrient ratio checks, mixing
//! instructions and warnings.

pub mod advisories;
pub mod analyzer;
pub mod ionic_balance;
pub mod types;

pub use advisories::{mixing_instructions, recipe_warnings, WarningInputs};
pub use analyzer::{analyze, deviation_percent, DiagnosticContext};
pub use ionic_balance::{estimated_ec, ionic_balance, ionic_ratios, BalanceStatus, IonicBalance, IonicRatio, RatioStatus};
pub use types::{Direction, NutrientDiagnostic, ReasonTag, Severity};
