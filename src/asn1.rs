use crate::asn1_types::{ASN1Identifier, TagClass};
use crate::errors::{ASN1Error, ErrorCode};
use bytes::Bytes;
use std::sync::Arc;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingRules {
    Basic,
    Distinguished,
}

fn minimal_octet_len(value: u64) -> usize {
    if value == 0 {
        return 1;
    }
    let significant_bits = 64 - value.leading_zeros();
    ((significant_bits + 7) / 8) as usize
}

impl EncodingRules {
    pub fn indefinite_length_allowed(&self) -> bool {
        matches!(self, EncodingRules::Basic)
    }

    pub fn non_minimal_encoded_lengths_allowed(&self) -> bool {
        matches!(self, EncodingRules::Basic)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ParserNode {
    pub identifier: ASN1Identifier,
    pub depth: usize,
    pub is_constructed: bool,
    pub encoded_bytes: Bytes,
    pub data_bytes: Option<Bytes>,
}

impl ParserNode {
    pub fn is_end_marker(&self) -> bool {
        self.identifier.tag_class == TagClass::Universal
            && self.identifier.tag_number == 0
            && !self.is_constructed
            && self.encoded_bytes.len() == 2
            && self.encoded_bytes.as_ref() == [0x00, 0x00]
    }
}

#[derive(Debug)]
pub(crate) struct ParseResult {
    pub nodes: Vec<ParserNode>,
}

impl ParseResult {
    const MAXIMUM_NODE_DEPTH: usize = 50;
    const MAXIMUM_NODE_COUNT: usize = 100_000;

    pub fn parse(data: Bytes, rules: EncodingRules) -> Result<ParseResult, ASN1Error> {
        let mut nodes = Vec::with_capacity(16);
        let mut current_data = data;
        let mut count = 0usize;

        Self::_parse_node(&mut current_data, rules, 1, &mut nodes, &mut count)?;

        if !current_data.is_empty() {
             return Err(ASN1Error::new(
                ErrorCode::InvalidASN1Object,
                "Trailing unparsed data is present".to_string(),
                file!().to_string(),
                line!(),
            ));
        }

        Ok(ParseResult { nodes })
    }

    fn _parse_node(
        data: &mut Bytes,
        rules: EncodingRules,
        depth: usize,
        nodes: &mut Vec<ParserNode>,
        count: &mut usize,
    ) -> Result<(), ASN1Error> {
        if depth > Self::MAXIMUM_NODE_DEPTH {
            return Err(ASN1Error::new(
                ErrorCode::InvalidASN1Object,
                "Excessive stack depth was reached".to_string(),
                file!().to_string(),
                line!(),
            ));
        }

        *count += 1;
        if *count > Self::MAXIMUM_NODE_COUNT {
            return Err(ASN1Error::new(
                ErrorCode::InvalidASN1Object,
                "Excessive number of ASN.1 nodes in a single parse".to_string(),
                file!().to_string(),
                line!(),
            ));
        }

        if data.is_empty() {
             return Err(ASN1Error::new(
                ErrorCode::TruncatedASN1Field,
                "".to_string(),
                file!().to_string(),
                line!(),
            ));
        }

        let original_data = data.clone();
        let raw_identifier = data.split_to(1)[0];

        let constructed = (raw_identifier & 0x20) != 0;
        let identifier: ASN1Identifier;

        if (raw_identifier & 0x1f) == 0x1f {
            let tag_class = TagClass::from_top_byte(raw_identifier);
            let (tag_number, _bytes_read) = read_asn1_discipline_uint(data)?;
             if tag_number < 0x1f {
                 return Err(ASN1Error::new(
                    ErrorCode::InvalidFieldIdentifier,
                    format!("ASN.1 tag incorrectly encoded in long form: {}", tag_number),
                    file!().to_string(),
                    line!(),
                ));
            }
            const MAXIMUM_TAG_NUMBER: u64 = (1u64 << 63) - 1;
            if tag_number > MAXIMUM_TAG_NUMBER {
                return Err(ASN1Error::new(
                    ErrorCode::InvalidFieldIdentifier,
                    "ASN.1 tag number exceeds the maximum supported value".to_string(),
                    file!().to_string(),
                    line!(),
                ));
            }
            identifier = ASN1Identifier::new(tag_number, tag_class);
        } else {
            identifier = ASN1Identifier::from_short_identifier(raw_identifier);
        }

        let wide_length = _read_asn1_length(data, !rules.non_minimal_encoded_lengths_allowed())?;
        
        match wide_length {
            ASN1Length::Definite(length) => {
                 let length_usize: usize = length.try_into().map_err(|_| {
                     ASN1Error::new(
                         ErrorCode::UnsupportedFieldLength,
                         "Field length exceeds what this platform can represent".to_string(),
                         file!().to_string(),
                         line!(),
                     )
                 })?;
                 if data.len() < length_usize {
                     return Err(ASN1Error::new(
                        ErrorCode::TruncatedASN1Field,
                        "".to_string(),
                        file!().to_string(),
                        line!(),
                    ));
                 }
                 
                 let sub_data = data.split_to(length_usize);
                 // encoded_bytes is original_data[0 .. (header + length)]
                 let total_len = original_data.len() - data.len(); 
                 let encoded_bytes = original_data.slice(0..total_len);

                 if constructed {
                     nodes.push(ParserNode {
                         identifier,
                         depth,
                         is_constructed: true,
                         encoded_bytes,
                         data_bytes: None,
                     });
                     
                     let mut check_sub = sub_data;
                     while !check_sub.is_empty() {
                         Self::_parse_node(&mut check_sub, rules, depth + 1, nodes, count)?;
                     }
                 } else {
                     nodes.push(ParserNode {
                         identifier,
                         depth,
                         is_constructed: false,
                         encoded_bytes,
                         data_bytes: Some(sub_data),
                     });
                 }
            }
            ASN1Length::Indefinite => {
                if !rules.indefinite_length_allowed() {
                    return Err(ASN1Error::new(
                        ErrorCode::UnsupportedFieldLength,
                        "Indefinite form of field length not supported in DER.".to_string(),
                        file!().to_string(),
                        line!(),
                    ));
                }
                if !constructed {
                     return Err(ASN1Error::new(
                        ErrorCode::UnsupportedFieldLength,
                        "Indefinite-length field must have constructed identifier".to_string(),
                        file!().to_string(),
                        line!(),
                    ));
                }

                nodes.push(ParserNode {
                    identifier,
                    depth,
                    is_constructed: true,
                    encoded_bytes: Bytes::new(), // placeholder
                    data_bytes: None,
                });
                let last_index = nodes.len() - 1;

                loop {
                    if data.is_empty() {
                        return Err(ASN1Error::new(
                            ErrorCode::TruncatedASN1Field,
                            "Indefinite-length field missing end-of-content marker".to_string(),
                            file!().to_string(),
                            line!(),
                        ));
                    }
                    Self::_parse_node(data, rules, depth + 1, nodes, count)?;
                    let found_end_marker =
                        matches!(nodes.last(), Some(node) if node.is_end_marker());
                    if found_end_marker {
                        nodes.pop();
                        break;
                    }
                }

                let consumed = original_data.len() - data.len();
                let encoded_bytes = original_data.slice(0..consumed);
                nodes[last_index].encoded_bytes = encoded_bytes;
            }
        }

        Ok(())
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ASN1Length {
    Indefinite,
    Definite(u64), // Using u64 to store UInt
}

fn _read_asn1_length(data: &mut Bytes, minimal_encoding: bool) -> Result<ASN1Length, ASN1Error> {
    if data.is_empty() {
        return Err(ASN1Error::new(ErrorCode::TruncatedASN1Field, "".to_string(), file!().to_string(), line!()));
    }
    let first_byte = data.split_to(1)[0];
    
    if first_byte == 0x80 {
        return Ok(ASN1Length::Indefinite);
    }
    
    if (first_byte & 0x80) == 0x80 {
        // Long form
        let field_length = (first_byte & 0x7F) as usize;
        if data.len() < field_length {
            return Err(ASN1Error::new(
                ErrorCode::TruncatedASN1Field,
                "".to_string(),
                file!().to_string(),
                line!(),
            ));
        }
        let length_bytes = data.split_to(field_length);
        let mut length: u64 = 0;
        for &b in length_bytes.iter() {
            length = length.checked_mul(256).ok_or_else(|| {
                ASN1Error::new(
                    ErrorCode::InvalidASN1Object,
                    "Field length exceeds supported range".to_string(),
                    file!().to_string(),
                    line!(),
                )
            })?;
            length += b as u64;
        }

        if minimal_encoding {
            if length < 128 {
                return Err(ASN1Error::new(
                    ErrorCode::UnsupportedFieldLength,
                    "Field length encoded in long form, but DER requires short form".to_string(),
                    file!().to_string(),
                    line!(),
                ));
            }
            let required_bytes = minimal_octet_len(length);
            if field_length > required_bytes {
                return Err(ASN1Error::new(
                    ErrorCode::UnsupportedFieldLength,
                    "Field length encoded in excessive number of bytes".to_string(),
                    file!().to_string(),
                    line!(),
                ));
            }
        }

        Ok(ASN1Length::Definite(length))
    } else {
        Ok(ASN1Length::Definite(first_byte as u64))
    }
}

fn read_asn1_discipline_uint(data: &mut Bytes) -> Result<(u64, usize), ASN1Error> {
    // Base 128
    let mut value: u64 = 0;
    let mut read = 0;
    loop {
        if data.is_empty() {
             return Err(ASN1Error::new(ErrorCode::TruncatedASN1Field, "".to_string(), file!().to_string(), line!()));
        }
        let byte = data.split_to(1)[0];
        read += 1;
        let chunk = u64::from(byte & 0x7F);
        value = value
            .checked_mul(128)
            .and_then(|v| v.checked_add(chunk))
            .ok_or_else(|| {
                ASN1Error::new(
                    ErrorCode::InvalidFieldIdentifier,
                    "Base-128 tag number exceeds u64 range".to_string(),
                    file!().to_string(),
                    line!(),
                )
            })?;
        if (byte & 0x80) == 0 {
            break;
        }
    }
    Ok((value, read))
}


#[derive(Debug, Clone)]
pub struct ASN1NodeCollection {
    // We use Arc to share the vector of all nodes parsed in the result
    nodes: Arc<Vec<ParserNode>>,
    // range of indices in `nodes` that belong to this collection
    range: Range<usize>,
    depth: usize,
}

impl ASN1NodeCollection {
    pub(crate) fn new(nodes: Arc<Vec<ParserNode>>, range: Range<usize>, depth: usize) -> Self {
        ASN1NodeCollection { nodes, range, depth }
    }
}

impl IntoIterator for ASN1NodeCollection {
    type Item = ASN1Node;
    type IntoIter = ASN1NodeCollectionIterator;

    fn into_iter(self) -> Self::IntoIter {
        ASN1NodeCollectionIterator {
            nodes: self.nodes,
            range: self.range,
            _depth: self.depth,
        }
    }
}


pub struct ASN1NodeCollectionIterator {
    nodes: Arc<Vec<ParserNode>>,
    range: Range<usize>,
    _depth: usize,
}

impl ASN1NodeCollectionIterator {
    pub fn peek(&self) -> Option<ASN1Node> {
        if self.range.start >= self.range.end {
            return None;
        }
        let index = self.range.start;
        let end_index = self.subtree_end_index(index);
        Some(self.clone_node(index, end_index))
    }

    fn subtree_end_index(&self, index: usize) -> usize {
        let node_depth = self.nodes[index].depth;
        let mut search_index = index + 1;
        while search_index < self.range.end {
            if self.nodes[search_index].depth <= node_depth {
                break;
            }
            search_index += 1;
        }
        search_index
    }

    fn clone_node(&self, index: usize, end_index: usize) -> ASN1Node {
        let node = &self.nodes[index];
        if node.is_constructed {
            let collection = ASN1NodeCollection::new(
                self.nodes.clone(),
                (index + 1)..end_index,
                node.depth,
            );
            ASN1Node {
                identifier: node.identifier,
                content: Content::Constructed(collection),
                encoded_bytes: node.encoded_bytes.clone(),
            }
        } else {
            ASN1Node {
                identifier: node.identifier,
                content: Content::Primitive(node.data_bytes.clone().unwrap()),
                encoded_bytes: node.encoded_bytes.clone(),
            }
        }
    }
}

impl Iterator for ASN1NodeCollectionIterator {
    type Item = ASN1Node;

    fn next(&mut self) -> Option<Self::Item> {
        if self.range.start >= self.range.end {
            return None;
        }
        let index = self.range.start;
        let end_index = self.subtree_end_index(index);
        self.range.start = end_index;
        Some(self.clone_node(index, end_index))
    }
}


#[derive(Debug, Clone)]
pub struct ASN1Node {
    pub identifier: ASN1Identifier,
    pub content: Content,
    pub encoded_bytes: Bytes,
}

impl ASN1Node {
    pub fn is_constructed(&self) -> bool {
        matches!(self.content, Content::Constructed(_))
    }
}

#[derive(Debug, Clone)]
pub enum Content {
    Constructed(ASN1NodeCollection),
    Primitive(Bytes),
}
