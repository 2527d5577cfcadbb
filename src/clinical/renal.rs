//! Renal function (GFR) estimate used for drug dosing.

use crate::error::{MediCoreError, Result};

/// Serum creatinine (mg/dL) assumed when the caller omits it.
pub const DEFAULT_CREATININE: f64 = 1.0;
/// Age (years) assumed when the caller omits it.
pub const DEFAULT_AGE: f64 = 40.0;
/// Gender assumed when the caller omits it.
pub const DEFAULT_GENDER: &str = "male";

const COEFFICIENT: f64 = 175.0;
const CREATININE_EXPONENT: f64 = -1.154;
const AGE_EXPONENT: f64 = -0.203;
const FEMALE_CORRECTION: f64 = 0.742;

/// Estimate GFR in mL/min/1.73m² from serum creatinine, age and gender.
///
/// The female correction applies only when `gender` equals "female"
/// ignoring case; every other value is treated as male.
pub fn estimate_gfr(creatinine: f64, age: f64, gender: &str) -> Result<f64> {
    if !creatinine.is_finite() || creatinine <= 0.0 {
        return Err(MediCoreError::InvalidInput(format!(
            "creatinine must be a positive number, got {}",
            creatinine
        )));
    }
    if !age.is_finite() || age <= 0.0 {
        return Err(MediCoreError::InvalidInput(format!(
            "age must be a positive number, got {}",
            age
        )));
    }

    let mut gfr = COEFFICIENT * creatinine.powf(CREATININE_EXPONENT) * age.powf(AGE_EXPONENT);
    if gender.to_lowercase() == "female" {
        gfr *= FEMALE_CORRECTION;
    }
    Ok(gfr)
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Compute GFR and format it the way the agent reports it.
pub fn calculate_renal_function(creatinine: f64, age: f64, gender: &str) -> Result<String> {
    let gfr = round2(estimate_gfr(creatinine, age, gender)?);
    Ok(format!("Calculated GFR: {} mL/min/1.73m². ", format_value(gfr)))
}

/// Whole numbers keep one decimal place ("45.0"), everything else prints shortest form.
fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_female_reference_case() {
        let expected = 175.0 * 1.2_f64.powf(-1.154) * 65.0_f64.powf(-0.203) * 0.742;
        let gfr = estimate_gfr(1.2, 65.0, "female").unwrap();
        assert!((gfr - expected).abs() < 1e-12);
        assert_eq!(round2(gfr), 45.09);
        assert_eq!(
            calculate_renal_function(1.2, 65.0, "female").unwrap(),
            "Calculated GFR: 45.09 mL/min/1.73m². "
        );
    }

    #[test]
    fn test_gender_is_case_insensitive() {
        let lower = estimate_gfr(1.2, 65.0, "female").unwrap();
        let upper = estimate_gfr(1.2, 65.0, "FEMALE").unwrap();
        let mixed = estimate_gfr(1.2, 65.0, "Female").unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower, mixed);
    }

    #[test]
    fn test_non_female_skips_correction() {
        let uncorrected = 175.0 * 1.2_f64.powf(-1.154) * 65.0_f64.powf(-0.203);
        for gender in ["male", "MALE", DEFAULT_GENDER, "", "unknown", "f"] {
            let gfr = estimate_gfr(1.2, 65.0, gender).unwrap();
            assert!((gfr - uncorrected).abs() < 1e-12, "gender {:?}", gender);
        }
        assert_eq!(
            calculate_renal_function(1.2, 65.0, "male").unwrap(),
            "Calculated GFR: 60.76 mL/min/1.73m². "
        );
    }

    #[test]
    fn test_rejects_non_positive_inputs() {
        assert!(matches!(
            estimate_gfr(0.0, 65.0, "male"),
            Err(MediCoreError::InvalidInput(_))
        ));
        assert!(matches!(
            estimate_gfr(1.2, -3.0, "male"),
            Err(MediCoreError::InvalidInput(_))
        ));
        assert!(estimate_gfr(f64::NAN, 65.0, "male").is_err());
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(45.0), "45.0");
        assert_eq!(format_value(45.1), "45.1");
        assert_eq!(format_value(45.09), "45.09");
    }
}
