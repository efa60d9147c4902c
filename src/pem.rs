//! The PEM textual envelope (RFC 7468) wrapping a DER payload.
//!
//! A PEM document is a `-----BEGIN <label>-----` boundary, one or more lines of
//! base64-encoded data wrapped at 64 characters, and a matching `-----END <label>-----`
//! boundary. This module only implements the "Strict" grammar RFC 7468 describes for use
//! with cryptographic keys and certificates: no headers, no data preceding the first
//! boundary, and no leniency in the base64 alphabet.

use crate::errors::{ASN1Error, ErrorCode};
use base64ct::{Base64, Encoding};

const LINE_WIDTH: usize = 64;
const BEGIN_MARKER: &str = "-----BEGIN ";
const END_MARKER: &str = "-----END ";
const BOUNDARY_DELIMITER: &str = "-----";

/// A single decoded PEM document: its type label and the raw bytes it encapsulates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PEMDocument {
    pub label: String,
    pub der_bytes: Vec<u8>,
}

fn pem_err(reason: impl Into<String>) -> ASN1Error {
    ASN1Error::new(ErrorCode::InvalidPEMDocument, reason.into(), file!().to_string(), line!())
}

/// Validates a PEM type label per RFC 7468: zero or more characters, uppercase by
/// convention, with no leading/trailing space or hyphen and no consecutive separators.
fn validate_label(label: &str) -> Result<(), ASN1Error> {
    if label.is_empty() {
        return Ok(());
    }
    if label.starts_with(' ') || label.starts_with('-') || label.ends_with(' ') || label.ends_with('-') {
        return Err(pem_err("PEM label must not start or end with a space or hyphen"));
    }
    let mut previous_was_separator = false;
    for c in label.chars() {
        if c == ' ' || c == '-' {
            if previous_was_separator {
                return Err(pem_err("PEM label must not contain consecutive spaces or hyphens"));
            }
            previous_was_separator = true;
        } else {
            if !c.is_ascii_graphic() {
                return Err(pem_err("PEM label contains a non-printable character"));
            }
            previous_was_separator = false;
        }
    }
    Ok(())
}

/// Decodes the base64 body of a PEM document, enforcing the 64-character line wrap
/// (every line but the last must be exactly 64 characters) and rejecting an empty body.
fn decode_body(body: &str, label: &str) -> Result<Vec<u8>, ASN1Error> {
    let lines: Vec<&str> = body.lines().filter(|line| !line.is_empty()).collect();
    if lines.is_empty() {
        return Err(pem_err(format!("PEM document \"{}\" has an empty body", label)));
    }

    let mut concatenated = String::with_capacity(body.len());
    for (index, line) in lines.iter().enumerate() {
        let is_last = index + 1 == lines.len();
        if line.len() > LINE_WIDTH || (!is_last && line.len() != LINE_WIDTH) {
            return Err(pem_err("PEM body is not wrapped at 64 characters per line"));
        }
        concatenated.push_str(line);
    }

    let max_decoded_len = concatenated.len() / 4 * 3 + 3;
    let mut buf = vec![0u8; max_decoded_len];
    let decoded = Base64::decode(concatenated.as_bytes(), &mut buf)
        .map_err(|_| pem_err("PEM body is not valid base64"))?;
    Ok(decoded.to_vec())
}

/// Parses every PEM document found in `input`, in order. Bytes outside of
/// `-----BEGIN ...-----` / `-----END ...-----` pairs are ignored.
pub fn parse_all(input: &str) -> Result<Vec<PEMDocument>, ASN1Error> {
    let normalized = input.replace("\r\n", "\n");
    let mut documents = Vec::new();
    let mut remaining: &str = &normalized;

    while let Some(begin_at) = remaining.find(BEGIN_MARKER) {
        let after_marker = &remaining[begin_at + BEGIN_MARKER.len()..];
        let label_end = after_marker
            .find(BOUNDARY_DELIMITER)
            .ok_or_else(|| pem_err("BEGIN line is missing its closing delimiter"))?;
        let label = &after_marker[..label_end];
        validate_label(label)?;

        let after_begin_delimiter = &after_marker[label_end + BOUNDARY_DELIMITER.len()..];
        let after_begin_line = match after_begin_delimiter.find('\n') {
            Some(newline_at) => &after_begin_delimiter[newline_at + 1..],
            None => return Err(pem_err("BEGIN line is not terminated")),
        };
        if !after_begin_delimiter[..after_begin_delimiter.find('\n').unwrap()].is_empty() {
            return Err(pem_err("BEGIN line contains trailing content after the label"));
        }

        let end_marker = format!("{}{}{}", END_MARKER, label, BOUNDARY_DELIMITER);
        let end_at = after_begin_line
            .find(&end_marker)
            .ok_or_else(|| pem_err(format!("No matching END line found for \"{}\"", label)))?;

        let body = &after_begin_line[..end_at];
        let der_bytes = decode_body(body, label)?;
        documents.push(PEMDocument { label: label.to_string(), der_bytes });

        remaining = &after_begin_line[end_at + end_marker.len()..];
    }

    Ok(documents)
}

/// Parses `input`, requiring it to contain exactly one PEM document.
pub fn parse(input: &str) -> Result<PEMDocument, ASN1Error> {
    let mut documents = parse_all(input)?;
    if documents.len() != 1 {
        return Err(pem_err(format!(
            "Expected exactly one PEM document, found {}",
            documents.len()
        )));
    }
    Ok(documents.remove(0))
}

/// Renders `der_bytes` as a single PEM document under `label`, wrapping base64 at 64
/// characters per line.
pub fn emit(label: &str, der_bytes: &[u8]) -> Result<String, ASN1Error> {
    validate_label(label)?;

    let encoded_len = Base64::encoded_len(der_bytes);
    let mut encode_buf = vec![0u8; encoded_len];
    let encoded = Base64::encode(der_bytes, &mut encode_buf)
        .map_err(|_| pem_err("Failed to base64-encode PEM body"))?;
    let encoded_str =
        std::str::from_utf8(encoded).expect("base64ct output is always ASCII");

    let mut out = String::with_capacity(encoded_str.len() + label.len() * 2 + 32);
    out.push_str(BEGIN_MARKER);
    out.push_str(label);
    out.push_str(BOUNDARY_DELIMITER);
    out.push('\n');

    if encoded_str.is_empty() {
        return Err(pem_err("Refusing to emit a PEM document with an empty body"));
    }
    for chunk in encoded_str.as_bytes().chunks(LINE_WIDTH) {
        out.push_str(std::str::from_utf8(chunk).expect("base64ct output is always ASCII"));
        out.push('\n');
    }

    out.push_str(END_MARKER);
    out.push_str(label);
    out.push_str(BOUNDARY_DELIMITER);
    out.push('\n');

    Ok(out)
}

/// Renders multiple PEM documents back to back, in order.
pub fn emit_all(documents: &[(&str, &[u8])]) -> Result<String, ASN1Error> {
    let mut out = String::new();
    for (label, bytes) in documents {
        out.push_str(&emit(label, bytes)?);
    }
    Ok(out)
}
