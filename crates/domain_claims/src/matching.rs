//! Amount matching between declared and invoiced amounts

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use core_kernel::ClaimId;

use crate::analyzer::ExtractedAmounts;
use crate::error::ClaimError;

/// Configuration of the amount-matching audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Allowed deviation as a percentage of the declared total
    pub tolerance_percentage: Decimal,
    /// Upper bound on claims audited per cycle
    pub max_claims_per_batch: u32,
    /// Ignore the tolerance and require exact amounts
    pub exact_amount_match: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            tolerance_percentage: Decimal::ZERO,
            max_claims_per_batch: 20,
            exact_amount_match: false,
        }
    }
}

impl MatchingConfig {
    /// Checks the tolerance lies in `[0, 100]` and the batch size is positive
    pub fn validate(&self) -> Result<(), ClaimError> {
        if self.tolerance_percentage < Decimal::ZERO || self.tolerance_percentage > Decimal::ONE_HUNDRED {
            return Err(ClaimError::InvalidConfiguration(format!(
                "tolerance_percentage {} must be between 0 and 100",
                self.tolerance_percentage
            )));
        }
        if self.max_claims_per_batch == 0 {
            return Err(ClaimError::InvalidConfiguration(
                "max_claims_per_batch must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }

    /// Tolerance percentage actually applied
    pub fn effective_tolerance(&self) -> Decimal {
        if self.exact_amount_match {
            Decimal::ZERO
        } else {
            self.tolerance_percentage
        }
    }
}

/// Whether two amounts agree within an absolute tolerance
pub fn amounts_match(declared: Decimal, extracted: Decimal, tolerance: Decimal) -> bool {
    if declared.is_zero() && extracted.is_zero() {
        return true;
    }
    (declared - extracted).abs() <= tolerance
}

/// Declared and extracted amounts behind a match decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDetails {
    pub declared_labour: Decimal,
    pub declared_parts: Decimal,
    pub declared_total: Decimal,
    pub extracted: ExtractedAmounts,
    pub labour_match: bool,
    pub part_match: bool,
    pub tolerance_percentage: Decimal,
    pub processed_files: Vec<String>,
}

/// Outcome of matching one claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub claim_id: ClaimId,
    pub match_success: bool,
    pub reason: String,
    /// Absent when the claim could not be matched at all
    pub details: Option<MatchDetails>,
}

impl MatchResult {
    /// A failed match without amounts to compare
    pub fn unmatched(claim_id: ClaimId, reason: impl Into<String>) -> Self {
        Self {
            claim_id,
            match_success: false,
            reason: reason.into(),
            details: None,
        }
    }
}

/// Compares declared labour and parts amounts against extracted ones
///
/// The tolerance is `total * tolerance_percentage / 100` (zero for a
/// non-positive total) and is split evenly between labour and parts. Both
/// sides must agree for the claim to match.
pub fn match_amounts(
    claim_id: ClaimId,
    declared_labour: Decimal,
    declared_parts: Decimal,
    extracted: ExtractedAmounts,
    processed_files: Vec<String>,
    config: &MatchingConfig,
) -> MatchResult {
    let tolerance_percentage = config.effective_tolerance();
    let declared_total = declared_labour + declared_parts;
    let tolerance = if declared_total > Decimal::ZERO {
        declared_total * tolerance_percentage / Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };
    let side_tolerance = tolerance / Decimal::TWO;

    let labour_match = amounts_match(declared_labour, extracted.labour_amount, side_tolerance);
    let part_match = amounts_match(declared_parts, extracted.part_amount, side_tolerance);
    let match_success = labour_match && part_match;

    let reason = if match_success {
        format!("Amounts match within tolerance ({}%)", tolerance_percentage.normalize())
    } else {
        let mut mismatches = Vec::new();
        if !labour_match {
            mismatches.push("labour");
        }
        if !part_match {
            mismatches.push("parts");
        }
        format!("Amount mismatch in: {}", mismatches.join(", "))
    };

    MatchResult {
        claim_id,
        match_success,
        reason,
        details: Some(MatchDetails {
            declared_labour,
            declared_parts,
            declared_total,
            extracted,
            labour_match,
            part_match,
            tolerance_percentage,
            processed_files,
        }),
    }
}

/// Human-readable summary of a matching batch
#[derive(Debug, Clone)]
pub struct MatchingReport<'a> {
    results: &'a BTreeMap<ClaimId, MatchResult>,
}

impl<'a> MatchingReport<'a> {
    pub fn new(results: &'a BTreeMap<ClaimId, MatchResult>) -> Self {
        Self { results }
    }

    pub fn successful(&self) -> usize {
        self.results.values().filter(|result| result.match_success).count()
    }
}

impl fmt::Display for MatchingReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.results.is_empty() {
            return write!(f, "No matching results to report.");
        }

        let total = self.results.len();
        let successful = self.successful();
        let failed = total - successful;
        let share = |count: usize| count as f64 * 100.0 / total as f64;

        writeln!(f, "INVOICE MATCHING REPORT")?;
        writeln!(f, "{}", "=".repeat(50))?;
        writeln!(f, "Total Claims Processed: {}", total)?;
        writeln!(f, "Successful Matches: {} ({:.1}%)", successful, share(successful))?;
        writeln!(f, "Failed Matches: {} ({:.1}%)", failed, share(failed))?;
        writeln!(f)?;
        writeln!(f, "DETAILED RESULTS:")?;
        write!(f, "{}", "-".repeat(30))?;

        for (claim_id, result) in self.results {
            let marker = if result.match_success { "OK  " } else { "FAIL" };
            write!(f, "\n{} CLAIM_ID {}: {}", marker, claim_id, result.reason)?;

            if let (false, Some(details)) = (result.match_success, &result.details) {
                write!(
                    f,
                    "\n    DMS: Labour={:.2}, Parts={:.2}\n    PDF: Labour={:.2}, Parts={:.2}",
                    details.declared_labour,
                    details.declared_parts,
                    details.extracted.labour_amount,
                    details.extracted.part_amount,
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn extracted(labour: Decimal, parts: Decimal) -> ExtractedAmounts {
        ExtractedAmounts {
            labour_amount: labour,
            part_amount: parts,
            extraction_confidence: 0.9,
            files_processed: 1,
        }
    }

    fn config(tolerance: Decimal) -> MatchingConfig {
        MatchingConfig {
            tolerance_percentage: tolerance,
            ..MatchingConfig::default()
        }
    }

    #[test]
    fn test_exact_amounts_match() {
        let result = match_amounts(
            ClaimId::new(1),
            dec!(1000),
            dec!(500),
            extracted(dec!(1000), dec!(500)),
            vec![],
            &config(dec!(0)),
        );
        assert!(result.match_success);
        assert_eq!(result.reason, "Amounts match within tolerance (0%)");
    }

    #[test]
    fn test_parts_mismatch_is_named() {
        let result = match_amounts(
            ClaimId::new(1),
            dec!(1000),
            dec!(500),
            extracted(dec!(1000), dec!(600)),
            vec![],
            &config(dec!(0)),
        );
        assert!(!result.match_success);
        assert_eq!(result.reason, "Amount mismatch in: parts");
    }

    #[test]
    fn test_tolerance_is_split_between_sides() {
        // total 1500 at 2% gives 30, i.e. 15 per side
        let within = match_amounts(
            ClaimId::new(1),
            dec!(1000),
            dec!(500),
            extracted(dec!(1015), dec!(485)),
            vec![],
            &config(dec!(2)),
        );
        assert!(within.match_success);
        assert_eq!(within.reason, "Amounts match within tolerance (2%)");

        let outside = match_amounts(
            ClaimId::new(1),
            dec!(1000),
            dec!(500),
            extracted(dec!(1015.01), dec!(484.99)),
            vec![],
            &config(dec!(2)),
        );
        assert_eq!(outside.reason, "Amount mismatch in: labour, parts");
    }

    #[test]
    fn test_exact_flag_overrides_tolerance() {
        let mut config = config(dec!(10));
        config.exact_amount_match = true;
        let result = match_amounts(
            ClaimId::new(1),
            dec!(1000),
            dec!(500),
            extracted(dec!(1001), dec!(500)),
            vec![],
            &config,
        );
        assert_eq!(result.reason, "Amount mismatch in: labour");
    }

    #[test]
    fn test_zero_amounts_always_match() {
        assert!(amounts_match(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO));
        assert!(!amounts_match(Decimal::ZERO, dec!(0.01), Decimal::ZERO));
    }

    #[test]
    fn test_config_validation() {
        assert!(config(dec!(0)).validate().is_ok());
        assert!(config(dec!(100)).validate().is_ok());
        assert!(config(dec!(-1)).validate().is_err());
        assert!(config(dec!(100.5)).validate().is_err());

        let mut zero_batch = config(dec!(5));
        zero_batch.max_claims_per_batch = 0;
        assert!(zero_batch.validate().is_err());
    }

    #[test]
    fn test_report_summary() {
        let mut results = BTreeMap::new();
        results.insert(ClaimId::new(2), MatchResult::unmatched(ClaimId::new(2), "No processing results available"));
        results.insert(
            ClaimId::new(1),
            match_amounts(ClaimId::new(1), dec!(10), dec!(5), extracted(dec!(10), dec!(5)), vec![], &config(dec!(0))),
        );

        let report = MatchingReport::new(&results).to_string();
        assert!(report.contains("Total Claims Processed: 2"));
        assert!(report.contains("Successful Matches: 1 (50.0%)"));
        assert!(report.contains("FAIL CLAIM_ID 2: No processing results available"));
        assert!(report.find("CLAIM_ID 1").unwrap() < report.find("CLAIM_ID 2").unwrap());
    }

    #[test]
    fn test_empty_report() {
        let results = BTreeMap::new();
        assert_eq!(MatchingReport::new(&results).to_string(), "No matching results to report.");
    }
}
