use crate::asn1::{ASN1Node, ASN1NodeCollection, ASN1NodeCollectionIterator, ParseResult, EncodingRules};
use crate::asn1_types::ASN1Identifier;
use crate::errors::{ASN1Error, ErrorCode};
use crate::der::{self, DERParseable, DERSerializable, DERImplicitlyTaggable, Serializer, SetOf};
use bytes::Bytes;

pub trait BERParseable: DERParseable {
    fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        Self::from_der_node(node)
    }
    
    fn from_ber_iterator(iter: &mut ASN1NodeCollectionIterator) -> Result<Self, ASN1Error> {
         let node = iter.next().ok_or_else(|| ASN1Error::new(
            ErrorCode::InvalidASN1Object,
            format!("Unable to decode {}, no ASN.1 nodes to decode", std::any::type_name::<Self>()),
            file!().to_string(),
            line!(),
        ))?;
        Self::from_ber_node(node)
    }
}

pub trait BERSerializable: DERSerializable {}

pub trait BERImplicitlyTaggable: BERParseable + BERSerializable + DERImplicitlyTaggable {
    fn from_ber_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        Self::from_der_node_with_identifier(node, identifier)
    }
}

pub fn parse(data: &[u8]) -> Result<ASN1Node, ASN1Error> {
    let bytes = Bytes::copy_from_slice(data);
    let result = ParseResult::parse(bytes, EncodingRules::Basic)?;
    
    let nodes = result.nodes;
    let first_node = nodes[0].clone();
    
    if first_node.is_constructed {
          let nodes_arc = std::sync::Arc::new(nodes);
          let range = 1..nodes_arc.len();
          let collection = ASN1NodeCollection::new(nodes_arc, range, first_node.depth);
          Ok(ASN1Node {
              identifier: first_node.identifier,
              content: crate::asn1::Content::Constructed(collection),
              encoded_bytes: first_node.encoded_bytes,
          })
     } else {
          Ok(ASN1Node {
              identifier: first_node.identifier,
              content: crate::asn1::Content::Primitive(first_node.data_bytes.unwrap()),
              encoded_bytes: first_node.encoded_bytes,
          })
     }
}

pub fn sequence<T, F>(node: ASN1Node, identifier: ASN1Identifier, builder: F) -> Result<T, ASN1Error>
where
    F: FnOnce(&mut ASN1NodeCollectionIterator) -> Result<T, ASN1Error>,
{
    crate::der::sequence(node, identifier, builder)
}

/// Parses a SET OF under BER, where canonical element ordering is not required.
pub fn set_of<T: BERParseable>(identifier: ASN1Identifier, root_node: ASN1Node) -> Result<Vec<T>, ASN1Error> {
    if root_node.identifier != identifier {
        return Err(ASN1Error::new(
            ErrorCode::UnexpectedFieldType,
            format!("{}", root_node.identifier),
            file!().to_string(),
            line!(),
        ));
    }
    match root_node.content {
        crate::asn1::Content::Constructed(collection) => {
            collection.into_iter().map(T::from_ber_node).collect()
        }
        _ => Err(ASN1Error::new(
            ErrorCode::UnexpectedFieldType,
            format!("{}", root_node.identifier),
            file!().to_string(),
            line!(),
        )),
    }
}

impl<T> BERParseable for SetOf<T>
where
    T: BERParseable + BERSerializable,
{
    fn from_ber_node(node: ASN1Node) -> Result<Self, ASN1Error> {
        <Self as BERImplicitlyTaggable>::from_ber_node_with_identifier(
            node,
            <Self as DERImplicitlyTaggable>::default_identifier(),
        )
    }
}

impl<T> BERSerializable for SetOf<T> where T: BERParseable + BERSerializable {}

impl<T> BERImplicitlyTaggable for SetOf<T>
where
    T: BERParseable + BERSerializable,
{
    fn from_ber_node_with_identifier(node: ASN1Node, identifier: ASN1Identifier) -> Result<Self, ASN1Error> {
        set_of(identifier, node).map(SetOf)
    }
}

/// Reads an explicitly tagged field under BER.
pub fn read_explicit<T: BERParseable>(
    iter: &mut ASN1NodeCollectionIterator,
    identifier: ASN1Identifier,
) -> Result<T, ASN1Error> {
    let node = iter.next().ok_or_else(|| ASN1Error::new(
        ErrorCode::InvalidASN1Object,
        format!("Missing explicitly tagged field {}", identifier),
        file!().to_string(),
        line!(),
    ))?;
    if node.identifier != identifier {
        return Err(ASN1Error::new(ErrorCode::UnexpectedFieldType, format!("{}", node.identifier), file!().to_string(), line!()));
    }
    match node.content {
        crate::asn1::Content::Constructed(collection) => {
            let mut inner_iter = collection.into_iter();
            let inner_node = inner_iter.next().ok_or_else(|| ASN1Error::new(
                ErrorCode::InvalidASN1Object,
                format!("Explicit tag {} has no inner value", identifier),
                file!().to_string(),
                line!(),
            ))?;
            T::from_ber_node(inner_node)
        }
        _ => Err(ASN1Error::new(
            ErrorCode::UnexpectedFieldType,
            format!("Explicit tag {} must be constructed", identifier),
            file!().to_string(),
            line!(),
        )),
    }
}

/// Writes an explicitly tagged field under BER.
pub fn write_explicit<T: BERSerializable>(
    serializer: &mut Serializer,
    identifier: ASN1Identifier,
    value: &T,
) -> Result<(), ASN1Error> {
    der::write_explicit(serializer, identifier, value)
}

/// Reads an implicitly tagged field under BER.
pub fn read_implicit<T: BERImplicitlyTaggable>(
    iter: &mut ASN1NodeCollectionIterator,
    identifier: ASN1Identifier,
) -> Result<T, ASN1Error> {
    let node = iter.next().ok_or_else(|| ASN1Error::new(
        ErrorCode::InvalidASN1Object,
        format!("Missing implicitly tagged field {}", identifier),
        file!().to_string(),
        line!(),
    ))?;
    T::from_ber_node_with_identifier(node, identifier)
}

/// Writes an implicitly tagged field under BER.
pub fn write_implicit<T: BERImplicitlyTaggable>(
    serializer: &mut Serializer,
    identifier: ASN1Identifier,
    value: &T,
) -> Result<(), ASN1Error> {
    value.serialize_with_identifier(serializer, identifier)
}

/// Reads a field with a DEFAULT value under BER, tolerating (unlike DER) an explicit
/// encoding of the default value itself.
pub fn read_default<T>(
    iter: &mut ASN1NodeCollectionIterator,
    default_value: &T,
) -> Result<T, ASN1Error>
where
    T: BERImplicitlyTaggable + Clone,
{
    let should_decode = match iter.peek() {
        None => false,
        Some(node) => node.identifier == T::default_identifier(),
    };
    if !should_decode {
        return Ok(default_value.clone());
    }
    let node = iter.next().expect("peeked node must exist");
    T::from_ber_node(node)
}
