//! Structural checks over a list of phases.
//!
//! Field-level checks (thresholds, expressions, patterns) happen while the
//! loader converts each phase; the checks here need the whole list.

use std::collections::HashMap;

use crate::error::ValidationError;
use crate::phase::PhaseDefinition;

/// Whether a phase name uses only letters, digits, `-` and `_`.
pub fn is_valid_phase_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Check names and that every `depends_on`/`run_if` reference points to a
/// phase strictly earlier in the list.
pub fn validate_phases(phases: &[PhaseDefinition]) -> Result<(), ValidationError> {
    if phases.is_empty() {
        return Err(ValidationError::NoPhases);
    }

    // lower-cased name -> position
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(phases.len());
    for (index, phase) in phases.iter().enumerate() {
        if phase.name.trim().is_empty() {
            return Err(ValidationError::EmptyPhaseName { index });
        }
        if !is_valid_phase_name(&phase.name) {
            return Err(ValidationError::InvalidPhaseName {
                name: phase.name.clone(),
            });
        }
        if positions.insert(phase.name.to_lowercase(), index).is_some() {
            return Err(ValidationError::DuplicatePhase {
                name: phase.name.clone(),
            });
        }
    }

    for (index, phase) in phases.iter().enumerate() {
        for (field, reference) in phase.references() {
            let Some(target) = phases.iter().position(|p| p.name == reference) else {
                return Err(ValidationError::UnknownPhaseReference {
                    phase: phase.name.clone(),
                    field,
                    reference: reference.to_string(),
                });
            };
            if target >= index {
                return Err(ValidationError::ForwardReference {
                    phase: phase.name.clone(),
                    field,
                    reference: reference.to_string(),
                });
            }
        }
    }

    Ok(())
}
