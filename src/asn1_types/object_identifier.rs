use crate::asn1_types::ASN1Identifier;
use crate::asn1::ASN1Node;
use crate::errors::{ASN1Error, ErrorCode};
use crate::der::{DERParseable, DERSerializable, Serializer, DERImplicitlyTaggable};
use crate::ber::{BERParseable, BERSerializable, BERImplicitlyTaggable};
use bytes::Bytes;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ASN1ObjectIdentifier {
    bytes: Bytes,
}

impl ASN1ObjectIdentifier {
    pub fn new(components: &[u64]) -> Result<Self, ASN1Error> {
        if components.len() < 2 {
             return Err(ASN1Error::new(ErrorCode::TooFewOIDComponents, "Must have at least 2 components".to_string(), file!().to_string(), line!()));
        }
        
        let first = components[0];
        let second = components[1];
        
        if first > 2 {
             return Err(ASN1Error::new(ErrorCode::InvalidASN1Object, "First OID component must be 0, 1, or 2".to_string(), file!().to_string(), line!()));
        }
        if first < 2 && second > 39 {
             return Err(ASN1Error::new(ErrorCode::InvalidASN1Object, "Second OID component must be <= 39 if first is 0 or 1".to_string(), file!().to_string(), line!()));
        }
        
        let mut buffer = Vec::new();
        let first_byte_val = first * 40 + second;
        write_oid_subidentifier(first_byte_val, &mut buffer);
        
        for &c in components[2..].iter() {
            write_oid_subidentifier(c, &mut buffer);
        }
        
        Ok(ASN1ObjectIdentifier { bytes: Bytes::from(buffer) })
    }

    pub fn oid_components(&self) -> Result<Vec<u64>, ASN1Error> {
        let mut components = Vec::new();
        let mut data = self.bytes.clone();
        
        // Read first subidentifier
        if data.is_empty() {
             return Err(ASN1Error::new(ErrorCode::InvalidASN1Object, "Zero components in OID".to_string(), file!().to_string(), line!()));
        }
        
        let before_first = data.len();
        let first_val = read_oid_subidentifier(&mut data)?;
        if data.len() == before_first {
            return Err(ASN1Error::new(
                ErrorCode::InvalidASN1Object,
                "OID decoder failed to consume first subidentifier".to_string(),
                file!().to_string(),
                line!(),
            ));
        }

        // X.690 8.19.4: the first subidentifier folds the first two OID components as
        // 40*X + Y. X is 0 or 1 only when Y <= 39 (first_val < 80); any larger value
        // means X = 2 with Y carrying the remainder unbounded.
        let (first, second) = if first_val < 80 {
            (first_val / 40, first_val % 40)
        } else {
            (2, first_val - 80)
        };
        components.push(first);
        components.push(second);

        while !data.is_empty() {
            let before = data.len();
            components.push(read_oid_subidentifier(&mut data)?);
            if data.len() == before {
                return Err(ASN1Error::new(
                    ErrorCode::InvalidASN1Object,
                    "OID decoder failed to consume subidentifier bytes".to_string(),
                    file!().to_string(),
                    line!(),
                ));
            }
        }
        
        Ok(components)
    }

    /// Renders the OID in its conventional dot-separated decimal string form, e.g. "1.2.840.113549.1.1.11".
    pub fn to_dotted_string(&self) -> Result<String, ASN1Error> {
        let components = self.oid_components()?;
        Ok(components
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join("."))
    }

    /// Parses the conventional dot-separated decimal string form of an OID.
    ///
    /// A lone "0" is tolerated as shorthand for the two-component OID (0, 0), matching how
    /// root-arc-only identifiers are sometimes written; any other string with fewer than two
    /// components is rejected, as is any component that does not parse as a non-negative integer.
    pub fn from_dotted_string(s: &str) -> Result<Self, ASN1Error> {
        let parts: Vec<&str> = s.split('.').collect();

        if parts.len() < 2 {
            if parts.len() == 1 && parts[0] == "0" {
                return Self::new(&[0, 0]);
            }
            return Err(ASN1Error::new(
                ErrorCode::TooFewOIDComponents,
                "OID string form requires at least 2 dot-separated components".to_string(),
                file!().to_string(),
                line!(),
            ));
        }

        let mut components = Vec::with_capacity(parts.len());
        for part in &parts {
            let value: u64 = part.parse().map_err(|_| {
                ASN1Error::new(
                    ErrorCode::InvalidStringRepresentation,
                    format!("OID component '{}' is not a valid non-negative integer", part),
                    file!().to_string(),
                    line!(),
                )
            })?;
            components.push(value);
        }

        Self::new(&components)
    }
}

impl std::fmt::Display for ASN1ObjectIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_dotted_string() {
            Ok(s) => write!(f, "{}", s),
            Err(_) => write!(f, "<invalid OID>"),
        }
    }
}

impl DERParseable for ASN1ObjectIdentifier {
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_der_node_with_identifier(node, ASN1ObjectIdentifier::default_identifier())
    }
}

impl DERSerializable for ASN1ObjectIdentifier {
    fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
         serializer.append_primitive_node(Self::default_identifier(), |buf| {
             buf.extend_from_slice(&self.bytes);
             Ok(())
         })
    }
}

impl DERImplicitlyTaggable for ASN1ObjectIdentifier {
    fn default_identifier() -> ASN1Identifier {
        ASN1Identifier::OBJECT_IDENTIFIER
    }

    fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
         if node.identifier != identifier {
             return Err(ASN1Error::new(ErrorCode::UnexpectedFieldType, format!("Expected {}, got {}", identifier, node.identifier), file!().to_string(), line!()));
        }
        match node.content {
            crate::asn1::Content::Primitive(bytes) => {
                // Validate
                if bytes.is_empty() {
                     return Err(ASN1Error::new(ErrorCode::InvalidASN1Object, "Zero components in OID".to_string(), file!().to_string(), line!()));
                }
                
                // Validate VLQ
                let mut check = bytes.clone();
                while !check.is_empty() {
                    let before = check.len();
                    read_oid_subidentifier(&mut check)?;
                    if check.len() == before {
                        return Err(ASN1Error::new(
                            ErrorCode::InvalidASN1Object,
                            "OID validation failed to consume subidentifier bytes".to_string(),
                            file!().to_string(),
                            line!(),
                        ));
                    }
                }
                
                Ok(ASN1ObjectIdentifier { bytes })
            },
             _ => Err(ASN1Error::new(ErrorCode::UnexpectedFieldType, "OID must be primitive".to_string(), file!().to_string(), line!()))
        }
    }
}

impl BERParseable for ASN1ObjectIdentifier {
    fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_ber_node_with_identifier(node, ASN1ObjectIdentifier::default_identifier())
    }
}
impl BERSerializable for ASN1ObjectIdentifier {}
impl BERImplicitlyTaggable for ASN1ObjectIdentifier {
    fn from_ber_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
         Self::from_der_node_with_identifier(node, identifier)
    }
}

// Helpers
fn write_oid_subidentifier(mut value: u64, buf: &mut Vec<u8>) {
    if value == 0 {
        buf.push(0);
        return;
    }

    let mut stack = Vec::with_capacity(10);
    let mut finished = false;
    for _ in 0..=10 {
        stack.push((value & 0x7F) as u8);
        value >>= 7;
        let done = value == 0;
        if done {
            finished = true;
            break;
        }
    }

    assert!(
        finished,
        "OID subidentifier requires more than 10 bytes of VLQ encoding"
    );

    for (index, byte) in stack.iter().rev().enumerate() {
        let mut out = *byte;
        if index + 1 < stack.len() {
            out |= 0x80;
        }
        buf.push(out);
    }
}

fn read_oid_subidentifier(data: &mut Bytes) -> Result<u64, ASN1Error> {
    let mut value: u64 = 0;
    let mut first_byte = true;
    loop {
        if data.is_empty() {
            return Err(ASN1Error::new(
                ErrorCode::TruncatedASN1Field,
                "".to_string(),
                file!().to_string(),
                line!(),
            ));
        }
        let byte = data.split_to(1)[0];

        if first_byte && byte == 0x80 {
            return Err(ASN1Error::new(
                ErrorCode::InvalidASN1Object,
                "OID subidentifier encoded with leading 0 byte".to_string(),
                file!().to_string(),
                line!(),
            ));
        }
        first_byte = false;

        let chunk = u64::from(byte & 0x7F);
        value = value
            .checked_mul(128)
            .and_then(|v| v.checked_add(chunk))
            .ok_or_else(|| {
                ASN1Error::new(
                    ErrorCode::InvalidASN1Object,
                    "OID subidentifier exceeds u64 capacity".to_string(),
                    file!().to_string(),
                    line!(),
                )
            })?;

        if (byte & 0x80) == 0 {
            break;
        }
    }
    Ok(value)
}
