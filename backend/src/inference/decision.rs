use shared::{DiagnosisResponse, ScanType};

use super::RawPrediction;

pub const THRESHOLD: f64 = 0.5;

/// Which side of the threshold counts as a positive finding. The spiral
/// model was trained with class 0 as positive, the MRI model with class 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    PositiveBelow,
    PositiveAbove,
}

impl Polarity {
    pub fn for_scan(scan: ScanType) -> Self {
        match scan {
            ScanType::Spiral => Polarity::PositiveBelow,
            ScanType::Mri => Polarity::PositiveAbove,
        }
    }

    pub fn is_positive(&self, score: f64) -> bool {
        match self {
            Polarity::PositiveBelow => score < THRESHOLD,
            Polarity::PositiveAbove => score > THRESHOLD,
        }
    }

    /// Probability mass on the side of the reported label, as a percentage.
    pub fn confidence(&self, score: f64, label: bool) -> f64 {
        let positive_mass = match self {
            Polarity::PositiveBelow => 1.0 - score,
            Polarity::PositiveAbove => score,
        };
        if label {
            positive_mass * 100.0
        } else {
            (1.0 - positive_mass) * 100.0
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosisResult {
    pub label: bool,
    pub confidence: f64,
    pub raw_score: f64,
    pub message: String,
}

pub fn decide(scan: ScanType, raw: RawPrediction) -> DiagnosisResult {
    let polarity = Polarity::for_scan(scan);
    let score = raw.value();
    let label = polarity.is_positive(score);

    DiagnosisResult {
        label,
        confidence: polarity.confidence(score, label),
        raw_score: score,
        message: diagnosis_message(scan, label),
    }
}

pub fn diagnosis_message(scan: ScanType, label: bool) -> String {
    let finding = if label {
        "indicators of Parkinson's disease were detected"
    } else {
        "no significant indicators of Parkinson's disease were found"
    };
    format!("Based on the {} analysis, {}", scan.analysis_name(), finding)
}

impl From<DiagnosisResult> for DiagnosisResponse {
    fn from(result: DiagnosisResult) -> Self {
        DiagnosisResponse {
            prediction: result.label,
            confidence: result.confidence,
            raw_prediction: result.raw_score,
            message: result.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decide_raw(scan: ScanType, score: f64) -> DiagnosisResult {
        decide(scan, RawPrediction::new(score).unwrap())
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn low_spiral_score_is_positive() {
        let result = decide_raw(ScanType::Spiral, 0.2);
        assert!(result.label);
        assert_close(result.confidence, 80.0);
        assert_eq!(result.raw_score, 0.2);
        assert_eq!(
            result.message,
            "Based on the spiral drawing analysis, indicators of Parkinson's disease were detected"
        );
    }

    #[test]
    fn high_spiral_score_is_negative() {
        let result = decide_raw(ScanType::Spiral, 0.8);
        assert!(!result.label);
        assert_close(result.confidence, 80.0);
        assert_eq!(
            result.message,
            "Based on the spiral drawing analysis, no significant indicators of Parkinson's disease were found"
        );
    }

    #[test]
    fn high_mri_score_is_positive() {
        let result = decide_raw(ScanType::Mri, 0.9);
        assert!(result.label);
        assert_close(result.confidence, 90.0);
        assert!(result.message.starts_with("Based on the MRI scan analysis, indicators"));
    }

    #[test]
    fn low_mri_score_is_negative() {
        let result = decide_raw(ScanType::Mri, 0.3);
        assert!(!result.label);
        assert_close(result.confidence, 70.0);
    }

    #[test]
    fn threshold_itself_is_negative_for_both_models() {
        for scan in [ScanType::Spiral, ScanType::Mri] {
            let result = decide_raw(scan, THRESHOLD);
            assert!(!result.label);
            assert_close(result.confidence, 50.0);
        }
    }

    #[test]
    fn confidence_stays_within_half_to_full() {
        for scan in [ScanType::Spiral, ScanType::Mri] {
            for step in 0..=1000 {
                let score = step as f64 / 1000.0;
                let result = decide_raw(scan, score);
                assert!(
                    (50.0..=100.0).contains(&result.confidence),
                    "{scan} score {score} gave {}",
                    result.confidence
                );
            }
        }
    }

    #[test]
    fn polarities_mirror_each_other() {
        for step in 0..=100 {
            let score = step as f64 / 100.0;
            if score == THRESHOLD {
                continue;
            }
            let spiral = decide_raw(ScanType::Spiral, score);
            let mri = decide_raw(ScanType::Mri, score);
            assert_ne!(spiral.label, mri.label);
            assert_close(spiral.confidence, mri.confidence);
        }
    }

    #[test]
    fn response_carries_every_field() {
        let response = DiagnosisResponse::from(decide_raw(ScanType::Mri, 0.9));
        assert!(response.prediction);
        assert_eq!(response.raw_prediction, 0.9);
        assert_close(response.confidence, 90.0);
    }
}
