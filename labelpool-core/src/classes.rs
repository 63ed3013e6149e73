//! Sample-type class vocabulary.
//!
//! Algorithms train on integer class codes; participants and the
//! `lr_classes` side channel speak in class names.

use serde::{Deserialize, Serialize};

/// Biological sample type a participant can assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleClass {
    CellLine,
    InVitroDifferentiatedCells,
    InducedPluripotentStemCells,
    PrimaryCells,
    StemCells,
    Tissue,
}

impl SampleClass {
    pub const ALL: [SampleClass; 6] = [
        SampleClass::CellLine,
        SampleClass::InVitroDifferentiatedCells,
        SampleClass::InducedPluripotentStemCells,
        SampleClass::PrimaryCells,
        SampleClass::StemCells,
        SampleClass::Tissue,
    ];

    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn code(self) -> i64 {
        match self {
            SampleClass::CellLine => 0,
            SampleClass::InVitroDifferentiatedCells => 1,
            SampleClass::InducedPluripotentStemCells => 2,
            SampleClass::PrimaryCells => 3,
            SampleClass::StemCells => 4,
            SampleClass::Tissue => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SampleClass::CellLine => "cell_line",
            SampleClass::InVitroDifferentiatedCells => "in_vitro_differentiated_cells",
            SampleClass::InducedPluripotentStemCells => "induced_pluripotent_stem_cells",
            SampleClass::PrimaryCells => "primary_cells",
            SampleClass::StemCells => "stem_cells",
            SampleClass::Tissue => "tissue",
        }
    }
}

/// Decode a list of class codes; unknown codes decode to `None`.
pub fn decode_class_codes(codes: &[i64]) -> Vec<Option<&'static str>> {
    codes
        .iter()
        .map(|&code| SampleClass::from_code(code).map(SampleClass::as_str))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for class in SampleClass::ALL {
            assert_eq!(SampleClass::from_code(class.code()), Some(class));
            let json = serde_json::to_value(class).unwrap();
            assert_eq!(json, serde_json::json!(class.as_str()));
        }
    }

    #[test]
    fn test_decode_class_codes() {
        assert_eq!(
            decode_class_codes(&[4, 0, 9, -1]),
            vec![Some("stem_cells"), Some("cell_line"), None, None]
        );
    }

    #[test]
    fn test_serde_names_match_vocabulary() {
        let json = serde_json::to_value(SampleClass::InducedPluripotentStemCells).unwrap();
        assert_eq!(json, serde_json::json!("induced_pluripotent_stem_cells"));
    }
}
