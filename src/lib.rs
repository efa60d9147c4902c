//! ASN.1 tag-length-value parsing and serialization under DER and BER.
//!
//! The crate is organized bottom-up: [`asn1`] scans bytes into a tree of
//! nodes, [`der`] and [`ber`] decode/encode typed values from that tree
//! under the two encoding disciplines, [`asn1_types`] implements the
//! built-in universal types, and [`pem`] wraps DER payloads in the
//! textual PEM envelope.

pub mod asn1;
pub mod asn1_types;
pub mod ber;
pub mod der;
pub mod errors;
pub mod pem;

pub use asn1::{ASN1Node, Content, EncodingRules};
pub use errors::{ASN1Error, ErrorCode};
