//! Human-readable formatting of catalog records, validation outcomes and
//! scan results.

use crate::catalog::CertificateRecord;
use crate::scan::ScanOutcome;
use crate::verify::{ChainLink, ValidationOutcome};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

fn date(dt: OffsetDateTime) -> String {
    dt.format(&Rfc3339).unwrap_or_else(|_| dt.to_string())
}

/// Format store records as text, one block per alias.
pub fn display_records(records: &[CertificateRecord]) -> String {
    if records.is_empty() {
        return "No certificates in store.\n".to_string();
    }
    let mut out = String::new();
    for record in records {
        out.push_str(&format!("Alias: {}\n", record.alias));
        out.push_str(&format!("  Subject: {}\n", record.subject));
        out.push_str(&format!("  Issuer: {}\n", record.issuer));
        out.push_str(&format!("  Serial: {}\n", record.serial_number));
        out.push_str("  Validity:\n");
        out.push_str(&format!("    Not Before: {}\n", date(record.not_before)));
        out.push_str(&format!("    Not After:  {}\n", date(record.not_after)));
        out.push_str(&format!("  Status: {}\n", record.status));
        if !record.alt_names.is_empty() {
            out.push_str("  Subject Alternative Name:\n");
            for name in &record.alt_names {
                out.push_str(&format!("    {}\n", name));
            }
        }
        out.push_str(&format!("  Fingerprint (SHA-256): {}\n", record.fingerprint));
    }
    out.push_str(&format!("{} certificate(s)\n", records.len()));
    out
}

fn format_link(out: &mut String, depth: usize, link: &ChainLink) {
    out.push_str(&format!("  [{}] Subject: {}\n", depth, link.subject));
    out.push_str(&format!("      Issuer:  {}\n", link.issuer));
    out.push_str(&format!("      Not After: {}\n", date(link.not_after)));
}

/// Format a validation outcome. The chain is printed only with `show_chain`.
pub fn display_outcome(outcome: &ValidationOutcome, show_chain: bool) -> String {
    let mut out = String::new();
    let verdict = if outcome.success { "OK" } else { "FAIL" };
    out.push_str(&format!("{}: {}\n", verdict, outcome.message));
    if show_chain && !outcome.chain.is_empty() {
        out.push_str("Chain:\n");
        for (depth, link) in outcome.chain.iter().enumerate() {
            format_link(&mut out, depth, link);
        }
    }
    out
}

/// Format an alias scan result.
pub fn display_scan(outcome: &ScanOutcome) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Checked {} alias(es): {} valid, {} failed\n",
        outcome.checked,
        outcome.valid_aliases.len(),
        outcome.failed
    ));
    if outcome.valid_aliases.is_empty() {
        out.push_str("No alias validates the target.\n");
    } else {
        out.push_str("Valid aliases:\n");
        for alias in &outcome.valid_aliases {
            out.push_str(&format!("  {}\n", alias));
        }
    }
    if let Some(error) = &outcome.error {
        out.push_str(&format!("Scan stopped early: {}\n", error));
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::catalog::CertificateStatus;

    fn link(subject: &str) -> ChainLink {
        ChainLink {
            subject: subject.into(),
            issuer: "CN=Root".into(),
            not_after: OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap(),
        }
    }

    #[test]
    fn outcome_hides_chain_unless_requested() {
        let outcome = ValidationOutcome::success("trusted", vec![link("CN=Leaf"), link("CN=Root")]);
        assert_eq!(display_outcome(&outcome, false), "OK: trusted\n");

        let text = display_outcome(&outcome, true);
        assert!(text.contains("Chain:\n"));
        assert!(text.contains("  [0] Subject: CN=Leaf\n"));
        assert!(text.contains("  [1] Subject: CN=Root\n"));
        assert!(text.contains("Not After: 2023-11-14T22:13:20Z"));
    }

    #[test]
    fn failed_outcome_without_chain() {
        let outcome = ValidationOutcome::failure("TLS validation failed: boom");
        assert_eq!(
            display_outcome(&outcome, true),
            "FAIL: TLS validation failed: boom\n"
        );
    }

    #[test]
    fn records_text() {
        let dt = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let record = CertificateRecord {
            alias: "root".into(),
            subject: "CN=Root".into(),
            issuer: "CN=Root".into(),
            serial_number: "01".into(),
            not_before: dt,
            not_after: dt,
            status: CertificateStatus::Expired,
            alt_names: vec!["DNS:example.com".into()],
            fingerprint: "AA:BB".into(),
        };
        let text = display_records(&[record]);
        assert!(text.starts_with("Alias: root\n"));
        assert!(text.contains("  Status: expired\n"));
        assert!(text.contains("    DNS:example.com\n"));
        assert!(text.ends_with("1 certificate(s)\n"));
        assert_eq!(display_records(&[]), "No certificates in store.\n");
    }

    #[test]
    fn scan_text() {
        let outcome = ScanOutcome {
            valid_aliases: vec!["a".into()],
            checked: 2,
            failed: 1,
            error: Some("sink exploded".into()),
        };
        let text = display_scan(&outcome);
        assert!(text.starts_with("Checked 2 alias(es): 1 valid, 1 failed\n"));
        assert!(text.contains("  a\n"));
        assert!(text.ends_with("Scan stopped early: sink exploded\n"));
        assert!(display_scan(&ScanOutcome::default()).contains("No alias validates"));
    }
}
