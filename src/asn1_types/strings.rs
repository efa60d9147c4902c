use crate::asn1_types::ASN1Identifier;
use crate::asn1::ASN1Node;
use crate::errors::{ASN1Error, ErrorCode};
use crate::der::{DERParseable, DERSerializable, Serializer, DERImplicitlyTaggable};
use crate::ber::{BERParseable, BERSerializable, BERImplicitlyTaggable};

macro_rules! impl_string_type {
    ($name:ident, $tag:expr, $validation:expr) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: String) -> Result<Self, ASN1Error> {
                if !($validation)(&s) {
                    return Err(ASN1Error::new(ErrorCode::InvalidStringRepresentation, format!("Invalid content for {}", stringify!($name)), file!().to_string(), line!()));
                }
                Ok($name(s))
            }
        }

        impl From<$name> for String {
             fn from(val: $name) -> Self { val.0 }
        }

        impl DERParseable for $name {
            fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
                Self::from_der_node_with_identifier(node, $name::default_identifier())
            }
        }

        impl DERSerializable for $name {
            fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
                serializer.append_primitive_node(Self::default_identifier(), |buf| {
                    buf.extend_from_slice(self.0.as_bytes());
                    Ok(())
                })
            }
        }

        impl DERImplicitlyTaggable for $name {
            fn default_identifier() -> ASN1Identifier {
                $tag
            }

            fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
                 if node.identifier != identifier {
                     return Err(ASN1Error::new(ErrorCode::UnexpectedFieldType, format!("Expected {}, got {}", identifier, node.identifier), file!().to_string(), line!()));
                }
                match node.content {
                    crate::asn1::Content::Primitive(bytes) => {
                        let s = String::from_utf8(bytes.to_vec()).map_err(|_| ASN1Error::new(ErrorCode::InvalidStringRepresentation, "Invalid UTF-8".to_string(), file!().to_string(), line!()))?;
                        if !($validation)(&s) {
                             return Err(ASN1Error::new(ErrorCode::InvalidStringRepresentation, format!("Invalid content for {}", stringify!($name)), file!().to_string(), line!()));
                        }
                        Ok($name(s))
                    },
                     _ => Err(ASN1Error::new(ErrorCode::UnexpectedFieldType, format!("{} must be primitive", stringify!($name)), file!().to_string(), line!()))
                }
            }
        }
        
        impl BERParseable for $name {
             fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> {
                  Self::from_ber_node_with_identifier(node, $name::default_identifier())
             }
        }
        impl BERSerializable for $name {}
        impl BERImplicitlyTaggable for $name {
             fn from_ber_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
                  // BER permits a constructed encoding that concatenates inner chunks.
                  if node.identifier != identifier {
                     return Err(ASN1Error::new(ErrorCode::UnexpectedFieldType, format!("Expected {}, got {}", identifier, node.identifier), file!().to_string(), line!()));
                  }
                  match node.content {
                     crate::asn1::Content::Primitive(bytes) => {
                         let s = String::from_utf8(bytes.to_vec()).map_err(|_| ASN1Error::new(ErrorCode::InvalidStringRepresentation, "Invalid UTF-8".to_string(), file!().to_string(), line!()))?;
                         if !($validation)(&s) {
                                return Err(ASN1Error::new(ErrorCode::InvalidStringRepresentation, format!("Invalid content for {}", stringify!($name)), file!().to_string(), line!()));
                         }
                         Ok($name(s))
                     },
                     crate::asn1::Content::Constructed(collection) => {
                         let mut res = String::new();
                         for child in collection {
                             let part = $name::from_ber_node(child)?;
                             res.push_str(&part.0);
                         }
                         Ok($name(res))
                     }
                  }
             }
        }
    };
}

impl_string_type!(ASN1UTF8String, ASN1Identifier::UTF8_STRING, |_s: &str| true); // UTF-8 check done by String::from_utf8
impl_string_type!(ASN1PrintableString, ASN1Identifier::PRINTABLE_STRING, |s: &str| {
    s.chars().all(|c| {
        c.is_ascii_alphanumeric() || matches!(c, ' ' | '\'' | '(' | ')' | '+' | ',' | '-' | '.' | '/' | ':' | '=' | '?')
    })
});
impl_string_type!(ASN1IA5String, ASN1Identifier::IA5_STRING, |s: &str| s.is_ascii());
impl_string_type!(ASN1NumericString, ASN1Identifier::NUMERIC_STRING, |s: &str| s.chars().all(|c| c.is_ascii_digit() || c == ' '));
impl_string_type!(ASN1VisibleString, ASN1Identifier::VISIBLE_STRING, |s: &str| {
    s.chars().all(|c| (' '..='~').contains(&c))
});
impl_string_type!(ASN1GraphicString, ASN1Identifier::GRAPHIC_STRING, |s: &str| {
    s.chars().all(|c| !c.is_control())
});
impl_string_type!(ASN1GeneralString, ASN1Identifier::GENERAL_STRING, |s: &str| s.is_ascii());
impl_string_type!(ASN1TeletexString, ASN1Identifier::TELETEX_STRING, |_s: &str| true);
impl_string_type!(ASN1VideotexString, ASN1Identifier::VIDEOTEX_STRING, |_s: &str| true);

/// UniversalString: each character is a 4-byte big-endian UCS-4 code point.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ASN1UniversalString(pub String);

impl ASN1UniversalString {
    pub fn new(s: String) -> Self {
        ASN1UniversalString(s)
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.0.chars().count() * 4);
        for c in self.0.chars() {
            out.extend_from_slice(&(c as u32).to_be_bytes());
        }
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self, ASN1Error> {
        if bytes.len() % 4 != 0 {
            return Err(ASN1Error::new(ErrorCode::InvalidStringRepresentation, "UniversalString content length must be a multiple of 4".to_string(), file!().to_string(), line!()));
        }
        let mut s = String::with_capacity(bytes.len() / 4);
        for chunk in bytes.chunks_exact(4) {
            let code_point = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let c = char::from_u32(code_point).ok_or_else(|| {
                ASN1Error::new(ErrorCode::InvalidStringRepresentation, format!("{:#x} is not a valid Unicode scalar value", code_point), file!().to_string(), line!())
            })?;
            s.push(c);
        }
        Ok(ASN1UniversalString(s))
    }
}

impl From<ASN1UniversalString> for String {
    fn from(val: ASN1UniversalString) -> Self { val.0 }
}

impl DERParseable for ASN1UniversalString {
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_der_node_with_identifier(node, Self::default_identifier())
    }
}

impl DERSerializable for ASN1UniversalString {
    fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
        let encoded = self.encode();
        serializer.append_primitive_node(Self::default_identifier(), |buf| {
            buf.extend_from_slice(&encoded);
            Ok(())
        })
    }
}

impl DERImplicitlyTaggable for ASN1UniversalString {
    fn default_identifier() -> ASN1Identifier {
        ASN1Identifier::UNIVERSAL_STRING
    }

    fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        if node.identifier != identifier {
            return Err(ASN1Error::new(ErrorCode::UnexpectedFieldType, format!("Expected {}, got {}", identifier, node.identifier), file!().to_string(), line!()));
        }
        match node.content {
            crate::asn1::Content::Primitive(bytes) => Self::decode(&bytes),
            _ => Err(ASN1Error::new(ErrorCode::UnexpectedFieldType, "UniversalString must be primitive".to_string(), file!().to_string(), line!())),
        }
    }
}

impl BERParseable for ASN1UniversalString {
    fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_ber_node_with_identifier(node, Self::default_identifier())
    }
}
impl BERSerializable for ASN1UniversalString {}
impl BERImplicitlyTaggable for ASN1UniversalString {
    fn from_ber_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        if node.identifier != identifier {
            return Err(ASN1Error::new(ErrorCode::UnexpectedFieldType, format!("Expected {}, got {}", identifier, node.identifier), file!().to_string(), line!()));
        }
        match node.content {
            crate::asn1::Content::Primitive(bytes) => Self::decode(&bytes),
            crate::asn1::Content::Constructed(collection) => {
                let mut s = String::new();
                for child in collection {
                    s.push_str(&Self::from_ber_node(child)?.0);
                }
                Ok(ASN1UniversalString(s))
            }
        }
    }
}

/// BMPString: each character is a 2-byte big-endian UTF-16 code unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ASN1BMPString(pub String);

impl ASN1BMPString {
    pub fn new(s: String) -> Self {
        ASN1BMPString(s)
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.0.len() * 2);
        for unit in self.0.encode_utf16() {
            out.extend_from_slice(&unit.to_be_bytes());
        }
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self, ASN1Error> {
        if bytes.len() % 2 != 0 {
            return Err(ASN1Error::new(ErrorCode::InvalidStringRepresentation, "BMPString content length must be a multiple of 2".to_string(), file!().to_string(), line!()));
        }
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        let s = String::from_utf16(&units).map_err(|_| {
            ASN1Error::new(ErrorCode::InvalidStringRepresentation, "BMPString content is not valid UTF-16".to_string(), file!().to_string(), line!())
        })?;
        Ok(ASN1BMPString(s))
    }
}

impl From<ASN1BMPString> for String {
    fn from(val: ASN1BMPString) -> Self { val.0 }
}

impl DERParseable for ASN1BMPString {
    fn from_der_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_der_node_with_identifier(node, Self::default_identifier())
    }
}

impl DERSerializable for ASN1BMPString {
    fn serialize(&self, serializer: &mut Serializer) -> Result<(), ASN1Error> {
        let encoded = self.encode();
        serializer.append_primitive_node(Self::default_identifier(), |buf| {
            buf.extend_from_slice(&encoded);
            Ok(())
        })
    }
}

impl DERImplicitlyTaggable for ASN1BMPString {
    fn default_identifier() -> ASN1Identifier {
        ASN1Identifier::BMP_STRING
    }

    fn from_der_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        if node.identifier != identifier {
            return Err(ASN1Error::new(ErrorCode::UnexpectedFieldType, format!("Expected {}, got {}", identifier, node.identifier), file!().to_string(), line!()));
        }
        match node.content {
            crate::asn1::Content::Primitive(bytes) => Self::decode(&bytes),
            _ => Err(ASN1Error::new(ErrorCode::UnexpectedFieldType, "BMPString must be primitive".to_string(), file!().to_string(), line!())),
        }
    }
}

impl BERParseable for ASN1BMPString {
    fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_ber_node_with_identifier(node, Self::default_identifier())
    }
}
impl BERSerializable for ASN1BMPString {}
impl BERImplicitlyTaggable for ASN1BMPString {
    fn from_ber_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        if node.identifier != identifier {
            return Err(ASN1Error::new(ErrorCode::UnexpectedFieldType, format!("Expected {}, got {}", identifier, node.identifier), file!().to_string(), line!()));
        }
        match node.content {
            crate::asn1::Content::Primitive(bytes) => Self::decode(&bytes),
            crate::asn1::Content::Constructed(collection) => {
                let mut s = String::new();
                for child in collection {
                    s.push_str(&Self::from_ber_node(child)?.0);
                }
                Ok(ASN1BMPString(s))
            }
        }
    }
}
