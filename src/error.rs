//! Formulation error kinds
//!
//! Every variant is terminal for a single `formulate` call. The engine never
//! substitutes default targets or compositions to keep going.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulationError {
    /// No crop-phase requirement or explicit target set could be resolved
    #[error("insufficient real data: no nutrient targets could be resolved ({0})")]
    MissingTargets(String),

    /// Soil mode was requested without a soil analysis
    #[error("insufficient real data: soil mode requires a soil analysis")]
    MissingSoilAnalysis,

    /// No active fertilizer in the pool has a usable composition
    #[error("insufficient real data: no fertilizer with a usable composition ({rejected} records rejected)")]
    EmptyFertilizerPool { rejected: usize },

    /// The selection loop finished without accepting a single fertilizer
    #[error("infeasible formulation: no candidate could be dosed within solubility and dosage limits")]
    InfeasibleFormulation,

    /// Non-positive volume, malformed composition values, bad configuration
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_missing_data() {
        let e = FormulationError::EmptyFertilizerPool { rejected: 3 };
        assert!(e.to_string().contains("insufficient real data"));
        assert!(e.to_string().contains("3 records"));

        let e = FormulationError::InvalidInput("volume must be positive".into());
        assert_eq!(e.to_string(), "invalid input: volume must be positive");
    }
}
