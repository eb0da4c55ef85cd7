//! Regex detectors for regulated data in transaction streams.

use regex::Regex;

use super::DataScanner;

pub const PCI_CARD: &str = "PCI_CARD";
pub const GDPR_EMAIL: &str = "GDPR_EMAIL";
pub const SSN_PII: &str = "SSN_PII";

/// Compiled detectors for card numbers, email addresses and SSNs
pub struct PatternScanner {
    patterns: Vec<(&'static str, Regex)>,
}

impl PatternScanner {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            patterns: vec![
                (PCI_CARD, Regex::new(r"\b(?:\d[ -]*?){13,16}\b")?),
                (
                    GDPR_EMAIL,
                    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")?,
                ),
                (SSN_PII, Regex::new(r"\b\d{3}-\d{2}-\d{4}\b")?),
            ],
        })
    }
}

impl DataScanner for PatternScanner {
    /// Labels of every pattern found in `text`, in declaration order
    fn scan(&self, text: &str) -> Vec<&'static str> {
        self.patterns
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(label, _)| *label)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scanner_labels() {
        let scanner = PatternScanner::new().unwrap();
        assert_eq!(
            scanner.scan("Payment processed for user@email.com using card 4111-2222-3333-4444"),
            vec![PCI_CARD, GDPR_EMAIL]
        );
        assert_eq!(scanner.scan("SSN on file: 123-45-6789"), vec![SSN_PII]);
        assert!(scanner.scan("Nightly batch reconciled 42 invoices").is_empty());
    }

    #[test]
    fn test_spaced_card_number() {
        let scanner = PatternScanner::new().unwrap();
        assert_eq!(scanner.scan("My card is 4111 1111 1111 1111"), vec![PCI_CARD]);
    }
}
