//! Plain-text evidence report for a finished (or paused) audit.

use std::fmt;

use crate::domain::AuditRecord;

const RULE: &str = "================================================================";

/// Display adapter that lays out a record as an audit report
pub struct Report<'a>(pub &'a AuditRecord);

fn section(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, "{}", title)?;
    writeln!(f, "{}", "-".repeat(title.len()))
}

fn list(f: &mut fmt::Formatter<'_>, items: &[String]) -> fmt::Result {
    if items.is_empty() {
        writeln!(f, "  (none)")?;
    }
    for (i, item) in items.iter().enumerate() {
        writeln!(f, "  {:>2}. {}", i + 1, item)?;
    }
    Ok(())
}

fn or_pending(value: &str) -> &str {
    if value.is_empty() {
        "(pending)"
    } else {
        value
    }
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.0;

        writeln!(f, "{}", RULE)?;
        writeln!(f, "  COMPLIANCE AUDIT REPORT")?;
        writeln!(f, "{}", RULE)?;
        writeln!(f, "Risk level:        {}", record.risk_level)?;
        match record.enforcement {
            Some(action) => writeln!(f, "Enforcement:       {}", action)?,
            None => writeln!(f, "Enforcement:       (awaiting approval)")?,
        }
        writeln!(f, "Financial impact:  {}", or_pending(&record.financial_impact))?;
        writeln!(f, "Policy drift:      {:.0}%", record.drift_score * 100.0)?;
        writeln!(f, "Sensitivity:       {:.2}", record.effective_sensitivity())?;
        writeln!(f, "Discovery attempts: {}", record.retry_count)?;

        let mut modes = Vec::new();
        if record.red_team_mode {
            modes.push("red-team");
        }
        if record.federated_mode {
            modes.push("federated");
        }
        if !modes.is_empty() {
            writeln!(f, "Modes:             {}", modes.join(", "))?;
        }

        section(f, "Findings")?;
        list(f, &record.findings)?;

        section(f, "Policy Gaps")?;
        list(f, &record.policy_gaps)?;

        if !record.supply_chain_risks.is_empty() {
            section(f, "Supply-Chain Risks")?;
            list(f, &record.supply_chain_risks)?;
        }

        section(f, "Remediation Plan")?;
        writeln!(f, "  {}", or_pending(&record.remediation_plan))?;

        section(f, "Policy Amendment")?;
        writeln!(f, "  {}", or_pending(&record.policy_amendment))?;

        section(f, "Generated Patch")?;
        if record.is_no_op_patch() {
            writeln!(f, "  No action required.")?;
        } else {
            for line in record.generated_code.lines() {
                writeln!(f, "  | {}", line)?;
            }
        }
        if !record.simulation_report.is_empty() {
            let verdict = match record.simulation_passed {
                Some(true) => "PASS",
                Some(false) => "FAIL",
                None => "N/A",
            };
            writeln!(f, "  Simulation [{}]: {}", verdict, record.simulation_report)?;
        }

        if !record.forecast.is_empty() {
            section(f, "30-Day Risk Forecast")?;
            let first = record.forecast.first().copied().unwrap_or_default();
            let last = record.forecast.last().copied().unwrap_or_default();
            let peak = record.forecast.iter().copied().fold(0.0_f64, f64::max);
            writeln!(
                f,
                "  Day 1: {:.1}  Day {}: {:.1}  Peak: {:.1}",
                first,
                record.forecast.len(),
                last,
                peak
            )?;
        }

        section(f, "Audit Trail")?;
        list(f, &record.audit_trail)?;

        section(f, "Evidence")?;
        writeln!(f, "  {}", or_pending(&record.evidence_package))?;
        writeln!(f, "  Integrity hash: {}", or_pending(&record.integrity_hash))
    }
}

/// Render the record as a human-readable audit report
pub fn render(record: &AuditRecord) -> String {
    Report(record).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EnforcementAction, RiskLevel, NO_ACTION_REQUIRED};

    #[test]
    fn test_pending_record_renders_placeholders() {
        let text = render(&AuditRecord::new());
        assert!(text.contains("Risk level:        UNKNOWN"));
        assert!(text.contains("(awaiting approval)"));
        assert!(text.contains("(none)"));
        assert!(!text.contains("30-Day Risk Forecast"));
    }

    #[test]
    fn test_finished_record() {
        let mut record = AuditRecord::new().with_red_team(true);
        record.risk_level = RiskLevel::Critical;
        record.enforcement = Some(EnforcementAction::KillSwitch);
        record.findings = vec!["first".to_string(), "second".to_string()];
        record.generated_code = "def mask(x):\n    return '****'".to_string();
        record.forecast = vec![3.0, 6.0, 9.0];

        let text = render(&record);
        assert!(text.contains("Enforcement:       KILL_SWITCH"));
        assert!(text.contains("   2. second"));
        assert!(text.contains("  | def mask(x):"));
        assert!(text.contains("Modes:             red-team"));
        assert!(text.contains("Peak: 9.0"));
    }

    #[test]
    fn test_display_matches_render() {
        let mut record = AuditRecord::new();
        record.sensitivity = f64::NAN;
        let text = render(&record);
        assert_eq!(text, format!("{}", Report(&record)));
        assert!(text.contains("Sensitivity:       0.70"));
        assert!(text.ends_with("Integrity hash: (pending)\n"));
    }

    #[test]
    fn test_sentinel_patch_is_not_printed() {
        let mut record = AuditRecord::new();
        record.generated_code = NO_ACTION_REQUIRED.to_string();
        assert!(render(&record).contains("No action required."));
    }
}
