//! Shared encoding utilities.

use crate::oid;
use x509_parser::prelude::*;

/// Format bytes as colon-separated uppercase hex (e.g., "AB:CD:EF").
pub fn hex_colon_upper(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Format a raw big-endian serial number as lowercase hex without leading
/// zeros, keeping at least one digit ("0" for an all-zero serial).
pub fn serial_hex(raw: &[u8]) -> String {
    let encoded = hex::encode(raw);
    let trimmed = encoded.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Render an X.509 name in RFC 2253 form: most specific RDN first,
/// `KEY=value` pairs joined by commas, multi-valued RDNs joined by `+`.
pub fn rfc2253(name: &X509Name) -> String {
    let rdns: Vec<String> = name
        .iter()
        .map(|rdn| {
            rdn.iter()
                .map(|attr| {
                    let key = oid::attribute_short_name(&attr.attr_type().to_id_string());
                    let value = match attr.as_str() {
                        Ok(s) => escape_rfc2253(s),
                        Err(_) => format!("#{}", hex::encode(attr.attr_value().data)),
                    };
                    format!("{}={}", key, value)
                })
                .collect::<Vec<_>>()
                .join("+")
        })
        .collect();
    rdns.into_iter().rev().collect::<Vec<_>>().join(",")
}

fn escape_rfc2253(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (i, ch) in value.chars().enumerate() {
        match ch {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' => {
                out.push('\\');
                out.push(ch);
            }
            '#' if i == 0 => out.push_str("\\#"),
            ' ' if i == 0 || i == last => out.push_str("\\ "),
            _ => out.push(ch),
        }
    }
    out
}

/// Lowercased file name of a path, or an empty string.
pub(crate) fn lowercase_file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
