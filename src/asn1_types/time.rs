use crate::asn1_types::ASN1Identifier;
use crate::asn1::ASN1Node;
use crate::errors::{ASN1Error, ErrorCode};
use crate::der::{DERParseable, DERSerializable, Serializer, DERImplicitlyTaggable};
use crate::ber::{BERParseable, BERSerializable, BERImplicitlyTaggable};
use chrono::{DateTime, Utc, TimeZone, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GeneralizedTime(pub DateTime<Utc>);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UTCTime(pub DateTime<Utc>);

impl From<DateTime<Utc>> for GeneralizedTime {
    fn from(dt: DateTime<Utc>) -> Self { GeneralizedTime(dt) }
}
impl From<DateTime<Utc>> for UTCTime {
    fn from(dt: DateTime<Utc>) -> Self { UTCTime(dt) }
}

struct ParsedTimeFields {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    nanosecond: u32,
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => if is_leap_year(year) { 29 } else { 28 },
        _ => 0,
    }
}

fn invalid_string(reason: impl Into<String>) -> ASN1Error {
    ASN1Error::new(ErrorCode::InvalidStringRepresentation, reason.into(), file!().to_string(), line!())
}

fn parse_two_digit_field(digits: &str, offset: usize) -> Result<u32, ASN1Error> {
    digits
        .get(offset..offset + 2)
        .ok_or_else(|| invalid_string("Time value truncated"))?
        .parse::<u32>()
        .map_err(|_| invalid_string("Time value contains non-digit characters"))
}

/// Strictly parses the positional `YYYYMMDDHHMMSS[.fff]` digit string making up a
/// GeneralizedTime body (the trailing `Z` is stripped by the caller). Unlike a general
/// date-time parser, every character position is validated rather than delegated to a
/// lenient format-string matcher, and the calendar fields are range- and leap-year-checked
/// before a `chrono` value is ever constructed.
fn parse_generalized_time_digits(body: &str) -> Result<ParsedTimeFields, ASN1Error> {
    // DER only permits '.' as the fractional-seconds separator; BER's comma form is
    // rejected here since every caller in this module only handles the DER grammar.
    let (main, fraction) = match body.find('.') {
        Some(idx) => (&body[..idx], Some(&body[idx + 1..])),
        None => (body, None),
    };

    if main.len() != 14 || !main.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid_string("GeneralizedTime must have 14 digits before any fractional part"));
    }

    let year: i32 = main[0..4].parse().map_err(|_| invalid_string("Invalid GeneralizedTime year"))?;
    let month = parse_two_digit_field(main, 4)?;
    let day = parse_two_digit_field(main, 6)?;
    let hour = parse_two_digit_field(main, 8)?;
    let minute = parse_two_digit_field(main, 10)?;
    let second = parse_two_digit_field(main, 12)?;

    validate_calendar_fields(year, month, day, hour, minute, second)?;

    let nanosecond = match fraction {
        None => 0,
        Some(digits) => parse_fractional_seconds(digits)?,
    };

    Ok(ParsedTimeFields { year, month, day, hour, minute, second, nanosecond })
}

fn parse_fractional_seconds(digits: &str) -> Result<u32, ASN1Error> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid_string("Fractional seconds must be one or more digits"));
    }
    // The fraction represents a value strictly less than 1 second; scale it to nanoseconds
    // without relying on floating point so long digit runs don't lose precision.
    let mut nanos: u64 = 0;
    for (i, b) in digits.bytes().take(9).enumerate() {
        let digit = (b - b'0') as u64;
        nanos += digit * 10u64.pow(8 - i as u32);
    }
    Ok(nanos as u32)
}

fn validate_calendar_fields(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> Result<(), ASN1Error> {
    if !(0..=9999).contains(&year) {
        return Err(invalid_string("Year out of range"));
    }
    if !(1..=12).contains(&month) {
        return Err(invalid_string("Month out of range"));
    }
    let max_day = days_in_month(year, month);
    if day < 1 || day > max_day {
        return Err(invalid_string("Day out of range for the given month and year"));
    }
    if hour > 23 {
        return Err(invalid_string("Hour out of range"));
    }
    if minute > 59 {
        return Err(invalid_string("Minute out of range"));
    }
    // A value of 60 denotes a leap second. UTC has never inserted two leap
    // seconds in the same minute, and chrono's NaiveTime has no slot for a
    // second one, so 61 and above are rejected.
    if second > 60 {
        return Err(invalid_string("Second out of range"));
    }
    Ok(())
}

fn fields_to_naive_datetime(fields: &ParsedTimeFields) -> Result<NaiveDateTime, ASN1Error> {
    let date = NaiveDate::from_ymd_opt(fields.year, fields.month, fields.day)
        .ok_or_else(|| invalid_string("Invalid calendar date"))?;
    let nanos_with_leap_second = if fields.second == 60 {
        1_000_000_000 + fields.nanosecond
    } else {
        fields.nanosecond
    };
    let second_field = if fields.second == 60 { 59 } else { fields.second };
    let time = NaiveTime::from_hms_nano_opt(fields.hour, fields.minute, second_field, nanos_with_leap_second)
        .ok_or_else(|| invalid_string("Invalid time of day"))?;
    Ok(NaiveDateTime::new(date, time))
}

impl DERParseable for GeneralizedTime {
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_der_node_with_identifier(node, GeneralizedTime::default_identifier())
    }
}

impl DERSerializable for GeneralizedTime {
    fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
        let mut s = self.0.format("%Y%m%d%H%M%S").to_string();
        // chrono stores a leap second as second=59 with nanosecond offset by
        // +1_000_000_000; strip that back out before treating it as a fraction.
        let nanos = self.0.nanosecond() % 1_000_000_000;
        if nanos != 0 {
            let fraction = format!("{:09}", nanos);
            let trimmed = fraction.trim_end_matches('0');
            s.push('.');
            s.push_str(if trimmed.is_empty() { "0" } else { trimmed });
        }
        s.push('Z');

        serializer.append_primitive_node(Self::default_identifier(), |buf| {
            buf.extend_from_slice(s.as_bytes());
            Ok(())
        })
    }
}

impl DERImplicitlyTaggable for GeneralizedTime {
    fn default_identifier() -> ASN1Identifier {
        ASN1Identifier::GENERALIZED_TIME
    }

    fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        if node.identifier != identifier {
            return Err(ASN1Error::new(ErrorCode::UnexpectedFieldType, format!("Expected {}, got {}", identifier, node.identifier), file!().to_string(), line!()));
        }
        match node.content {
            crate::asn1::Content::Primitive(bytes) => {
                let s = String::from_utf8(bytes.to_vec())
                    .map_err(|_| invalid_string("GeneralizedTime is not valid UTF-8"))?;

                // DER requires the UTC "Z" designator; local-time and differential forms are
                // valid BER but are not produced or accepted here.
                let body = s
                    .strip_suffix('Z')
                    .ok_or_else(|| invalid_string("GeneralizedTime must end with Z in DER"))?;

                let fields = parse_generalized_time_digits(body)?;
                let naive = fields_to_naive_datetime(&fields)?;
                Ok(GeneralizedTime(Utc.from_utc_datetime(&naive)))
            },
            _ => Err(ASN1Error::new(ErrorCode::UnexpectedFieldType, "GeneralizedTime must be primitive".to_string(), file!().to_string(), line!()))
        }
    }
}


impl DERParseable for UTCTime {
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_der_node_with_identifier(node, UTCTime::default_identifier())
    }
}

impl DERSerializable for UTCTime {
    fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
        let s = self.0.format("%y%m%d%H%M%SZ").to_string();
        serializer.append_primitive_node(Self::default_identifier(), |buf| {
            buf.extend_from_slice(s.as_bytes());
            Ok(())
        })
    }
}

impl DERImplicitlyTaggable for UTCTime {
    fn default_identifier() -> ASN1Identifier {
        ASN1Identifier::UTC_TIME
    }

    fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        if node.identifier != identifier {
            return Err(ASN1Error::new(ErrorCode::UnexpectedFieldType, format!("Expected {}, got {}", identifier, node.identifier), file!().to_string(), line!()));
        }
        match node.content {
            crate::asn1::Content::Primitive(bytes) => {
                let s = String::from_utf8(bytes.to_vec())
                    .map_err(|_| invalid_string("UTCTime is not valid UTF-8"))?;

                let body = s
                    .strip_suffix('Z')
                    .ok_or_else(|| invalid_string("UTCTime must end with Z in DER"))?;

                // DER UTCTime always carries seconds: YYMMDDHHMMSS (12 digits after stripping Z).
                if body.len() != 12 || !body.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid_string("UTCTime must have exactly 12 digits before Z"));
                }

                let two_digit_year = parse_two_digit_field(body, 0)?;
                let month = parse_two_digit_field(body, 2)?;
                let day = parse_two_digit_field(body, 4)?;
                let hour = parse_two_digit_field(body, 6)?;
                let minute = parse_two_digit_field(body, 8)?;
                let second = parse_two_digit_field(body, 10)?;

                // X.690: YY >= 50 means 19YY, otherwise 20YY.
                let year = if two_digit_year >= 50 { 1900 + two_digit_year as i32 } else { 2000 + two_digit_year as i32 };

                validate_calendar_fields(year, month, day, hour, minute, second)?;
                let fields = ParsedTimeFields { year, month, day, hour, minute, second, nanosecond: 0 };
                let naive = fields_to_naive_datetime(&fields)?;
                Ok(UTCTime(Utc.from_utc_datetime(&naive)))
            },
            _ => Err(ASN1Error::new(ErrorCode::UnexpectedFieldType, "UTCTime must be primitive".to_string(), file!().to_string(), line!()))
        }
    }
}

// BER implementations
impl BERParseable for GeneralizedTime {
    fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> { Self::from_der_node(node) }
}
impl BERSerializable for GeneralizedTime {}
impl BERImplicitlyTaggable for GeneralizedTime {
     fn from_ber_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> { Self::from_der_node_with_identifier(node, identifier) }
}

impl BERParseable for UTCTime {
    fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> { Self::from_der_node(node) }
}
impl BERSerializable for UTCTime {}
impl BERImplicitlyTaggable for UTCTime {
     fn from_ber_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> { Self::from_der_node_with_identifier(node, identifier) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::der::DERParseable;

    #[test]
    fn test_generalized_time_basic_roundtrip() {
        let bytes = b"20230101120000Z";
        let node = ASN1Node {
            identifier: ASN1Identifier::GENERALIZED_TIME,
            content: crate::asn1::Content::Primitive(bytes::Bytes::copy_from_slice(bytes)),
            encoded_bytes: bytes::Bytes::new(),
        };
        let gt = GeneralizedTime::from_der_node(node).unwrap();
        assert_eq!(gt.0.format("%Y%m%d%H%M%SZ").to_string(), "20230101120000Z");

        let mut serializer = Serializer::new();
        gt.serialize(&mut serializer).unwrap();
        let out = serializer.serialized_bytes();
        assert_eq!(&out[2..], bytes);
    }

    #[test]
    fn test_generalized_time_fractional_seconds() {
        let bytes = b"20230101120000.5Z";
        let node = ASN1Node {
            identifier: ASN1Identifier::GENERALIZED_TIME,
            content: crate::asn1::Content::Primitive(bytes::Bytes::copy_from_slice(bytes)),
            encoded_bytes: bytes::Bytes::new(),
        };
        let gt = GeneralizedTime::from_der_node(node).unwrap();
        assert_eq!(gt.0.nanosecond(), 500_000_000);
    }

    #[test]
    fn test_generalized_time_rejects_invalid_day_for_month() {
        let bytes = b"20230231120000Z"; // February 31st does not exist
        let node = ASN1Node {
            identifier: ASN1Identifier::GENERALIZED_TIME,
            content: crate::asn1::Content::Primitive(bytes::Bytes::copy_from_slice(bytes)),
            encoded_bytes: bytes::Bytes::new(),
        };
        assert!(GeneralizedTime::from_der_node(node).is_err());
    }

    #[test]
    fn test_generalized_time_accepts_leap_day_on_leap_year() {
        let bytes = b"20240229120000Z"; // 2024 is a leap year
        let node = ASN1Node {
            identifier: ASN1Identifier::GENERALIZED_TIME,
            content: crate::asn1::Content::Primitive(bytes::Bytes::copy_from_slice(bytes)),
            encoded_bytes: bytes::Bytes::new(),
        };
        assert!(GeneralizedTime::from_der_node(node).is_ok());
    }

    #[test]
    fn test_generalized_time_rejects_leap_day_on_non_leap_year() {
        let bytes = b"20230229120000Z"; // 2023 is not a leap year
        let node = ASN1Node {
            identifier: ASN1Identifier::GENERALIZED_TIME,
            content: crate::asn1::Content::Primitive(bytes::Bytes::copy_from_slice(bytes)),
            encoded_bytes: bytes::Bytes::new(),
        };
        assert!(GeneralizedTime::from_der_node(node).is_err());
    }

    #[test]
    fn test_generalized_time_accepts_leap_second() {
        let bytes = b"20161231235960Z";
        let node = ASN1Node {
            identifier: ASN1Identifier::GENERALIZED_TIME,
            content: crate::asn1::Content::Primitive(bytes::Bytes::copy_from_slice(bytes)),
            encoded_bytes: bytes::Bytes::new(),
        };
        let gt = GeneralizedTime::from_der_node(node).unwrap();

        let mut serializer = Serializer::new();
        gt.serialize(&mut serializer).unwrap();
        let out = serializer.serialized_bytes();
        // Must round-trip exactly, with no spurious fractional second leaking
        // out of chrono's leap-second nanosecond encoding.
        assert_eq!(&out[2..], bytes);
    }

    #[test]
    fn test_generalized_time_rejects_double_leap_second() {
        let bytes = b"20161231235961Z";
        let node = ASN1Node {
            identifier: ASN1Identifier::GENERALIZED_TIME,
            content: crate::asn1::Content::Primitive(bytes::Bytes::copy_from_slice(bytes)),
            encoded_bytes: bytes::Bytes::new(),
        };
        assert!(GeneralizedTime::from_der_node(node).is_err());
    }

    #[test]
    fn test_generalized_time_rejects_comma_fraction_separator() {
        let bytes = b"19920722132100,3Z";
        let node = ASN1Node {
            identifier: ASN1Identifier::GENERALIZED_TIME,
            content: crate::asn1::Content::Primitive(bytes::Bytes::copy_from_slice(bytes)),
            encoded_bytes: bytes::Bytes::new(),
        };
        assert!(GeneralizedTime::from_der_node(node).is_err());
    }

    #[test]
    fn test_generalized_time_accepts_period_fraction_separator() {
        let bytes = b"19920722132100.3Z";
        let node = ASN1Node {
            identifier: ASN1Identifier::GENERALIZED_TIME,
            content: crate::asn1::Content::Primitive(bytes::Bytes::copy_from_slice(bytes)),
            encoded_bytes: bytes::Bytes::new(),
        };
        assert!(GeneralizedTime::from_der_node(node).is_ok());
    }

    #[test]
    fn test_utc_time_century_window() {
        let old = ASN1Node {
            identifier: ASN1Identifier::UTC_TIME,
            content: crate::asn1::Content::Primitive(bytes::Bytes::from_static(b"990101000000Z")),
            encoded_bytes: bytes::Bytes::new(),
        };
        let gt_old = UTCTime::from_der_node(old).unwrap();
        assert_eq!(gt_old.0.format("%Y").to_string(), "1999");

        let new = ASN1Node {
            identifier: ASN1Identifier::UTC_TIME,
            content: crate::asn1::Content::Primitive(bytes::Bytes::from_static(b"010101000000Z")),
            encoded_bytes: bytes::Bytes::new(),
        };
        let gt_new = UTCTime::from_der_node(new).unwrap();
        assert_eq!(gt_new.0.format("%Y").to_string(), "2001");
    }

    #[test]
    fn test_utc_time_rejects_wrong_digit_count() {
        let node = ASN1Node {
            identifier: ASN1Identifier::UTC_TIME,
            content: crate::asn1::Content::Primitive(bytes::Bytes::from_static(b"23010112000Z")),
            encoded_bytes: bytes::Bytes::new(),
        };
        assert!(UTCTime::from_der_node(node).is_err());
    }

    #[test]
    fn test_time_comparison_orders_chronologically() {
        let earlier = ASN1Node {
            identifier: ASN1Identifier::GENERALIZED_TIME,
            content: crate::asn1::Content::Primitive(bytes::Bytes::from_static(b"20230101120000Z")),
            encoded_bytes: bytes::Bytes::new(),
        };
        let later = ASN1Node {
            identifier: ASN1Identifier::GENERALIZED_TIME,
            content: crate::asn1::Content::Primitive(bytes::Bytes::from_static(b"20230101120000.5Z")),
            encoded_bytes: bytes::Bytes::new(),
        };
        let earlier = GeneralizedTime::from_der_node(earlier).unwrap();
        let later = GeneralizedTime::from_der_node(later).unwrap();
        assert!(earlier.0 < later.0);
    }
}
