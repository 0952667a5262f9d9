//! Build-area margin checks

use serde::Serialize;

use super::bounded_list;
use crate::formats::photon::CompactLayer;

/// Outcome of the margin scan.
///
/// `Disabled` is distinct from a check that found nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MarginState {
    Disabled,
    Checked { margin: usize, layers: Vec<usize> },
}

impl MarginState {
    /// Violating layer indices; `None` when checking is disabled.
    #[must_use]
    pub fn violations(&self) -> Option<&[usize]> {
        match self {
            MarginState::Disabled => None,
            MarginState::Checked { layers, .. } => Some(layers),
        }
    }
}

/// Collect layers whose last analysis found lit pixels inside `margin`.
#[must_use]
pub fn margin_state(layers: &[CompactLayer], margin: usize) -> MarginState {
    if margin == 0 {
        return MarginState::Disabled;
    }
    let violating = layers
        .iter()
        .enumerate()
        .filter(|(_, layer)| layer.extends_margin())
        .map(|(index, _)| index)
        .collect();
    MarginState::Checked {
        margin,
        layers: violating,
    }
}

#[must_use]
pub fn margin_information(state: &MarginState) -> String {
    match state {
        MarginState::Disabled => "Margin check disabled".to_string(),
        MarginState::Checked { margin, layers } if layers.is_empty() => {
            format!("No layers within {margin} px of the edge")
        }
        MarginState::Checked { margin, layers } => format!(
            "{} layers within {margin} px of the edge: {}",
            layers.len(),
            bounded_list(layers)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisScratch, recalculate_all};
    use crate::raster::ExpandedRaster;

    fn layers() -> Vec<CompactLayer> {
        let centre = ExpandedRaster::from_fn(20, 20, |x, y| (8..12).contains(&x) && (8..12).contains(&y));
        let edge = ExpandedRaster::from_fn(20, 20, |x, y| (8..12).contains(&x) && y < 12);
        vec![
            CompactLayer::from_raster(&centre, 0.0, 1.0, 1.0),
            CompactLayer::from_raster(&edge, 0.05, 1.0, 1.0),
        ]
    }

    #[test]
    fn test_zero_margin_is_disabled() {
        let mut layers = layers();
        recalculate_all(&mut layers, &mut AnalysisScratch::new(20, 20), 0, None);
        let state = margin_state(&layers, 0);
        assert_eq!(state, MarginState::Disabled);
        assert_eq!(state.violations(), None);
    }

    #[test]
    fn test_disabled_message_differs_from_clean_check() {
        let mut layers = layers();
        recalculate_all(&mut layers, &mut AnalysisScratch::new(20, 20), 1, None);
        let clean = MarginState::Checked {
            margin: 1,
            layers: Vec::new(),
        };
        assert_ne!(
            margin_information(&clean),
            margin_information(&MarginState::Disabled)
        );

        let state = margin_state(&layers, 1);
        assert_eq!(state.violations(), Some(&[1][..]));
        assert_eq!(margin_information(&state), "1 layers within 1 px of the edge: 1");
    }
}
