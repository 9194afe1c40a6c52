// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Hand-rolled decoding of the `osmformat.proto` messages carried inside
//! OSM PBF blobs: the header block, primitive blocks/groups, and the
//! node/way/relation primitives themselves (including dense-encoded nodes).

use super::wire::{self, FieldValue};
use super::Error;

#[derive(Debug, Default)]
pub struct HeaderBlock {
    pub required_features: Vec<String>,
}

impl HeaderBlock {
    pub fn parse_from_bytes(data: &[u8]) -> Result<Self, Error> {
        let mut out = Self::default();
        for field in wire::fields(data) {
            let (number, value) = field?;
            if let (4, FieldValue::LengthDelimited(v)) = (number, value) {
                out.required_features
                    .push(String::from_utf8_lossy(v).into_owned());
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Default)]
pub struct StringTable {
    pub s: Vec<Vec<u8>>,
}

impl StringTable {
    fn parse(data: &[u8]) -> Result<Self, Error> {
        let mut out = Self::default();
        for field in wire::fields(data) {
            let (number, value) = field?;
            if let (1, FieldValue::LengthDelimited(v)) = (number, value) {
                out.s.push(v.to_vec());
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Default)]
pub struct PrimitiveBlock {
    pub stringtable: StringTable,
    pub primitivegroup: Vec<PrimitiveGroup>,
    granularity: Option<i32>,
    lat_offset: Option<i64>,
    lon_offset: Option<i64>,
}

impl PrimitiveBlock {
    pub fn granularity(&self) -> i32 {
        self.granularity.unwrap_or(100)
    }

    pub fn lat_offset(&self) -> i64 {
        self.lat_offset.unwrap_or(0)
    }

    pub fn lon_offset(&self) -> i64 {
        self.lon_offset.unwrap_or(0)
    }

    pub fn parse_from_bytes(data: &[u8]) -> Result<Self, Error> {
        let mut out = Self::default();
        for field in wire::fields(data) {
            let (number, value) = field?;
            match (number, value) {
                (1, FieldValue::LengthDelimited(v)) => out.stringtable = StringTable::parse(v)?,
                (2, FieldValue::LengthDelimited(v)) => {
                    out.primitivegroup.push(PrimitiveGroup::parse(v)?)
                }
                (17, FieldValue::Varint(v)) => out.granularity = Some(v as i32),
                (19, FieldValue::Varint(v)) => out.lat_offset = Some(wire::zigzag_decode(v)),
                (20, FieldValue::Varint(v)) => out.lon_offset = Some(wire::zigzag_decode(v)),
                _ => {}
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Default)]
pub struct PrimitiveGroup {
    pub nodes: Vec<Node>,
    pub dense: Option<DenseNodes>,
    pub ways: Vec<Way>,
    pub relations: Vec<Relation>,
}

impl PrimitiveGroup {
    fn parse(data: &[u8]) -> Result<Self, Error> {
        let mut out = Self::default();
        for field in wire::fields(data) {
            let (number, value) = field?;
            match (number, value) {
                (1, FieldValue::LengthDelimited(v)) => out.nodes.push(Node::parse(v)?),
                (2, FieldValue::LengthDelimited(v)) => out.dense = Some(DenseNodes::parse(v)?),
                (3, FieldValue::LengthDelimited(v)) => out.ways.push(Way::parse(v)?),
                (4, FieldValue::LengthDelimited(v)) => out.relations.push(Relation::parse(v)?),
                _ => {}
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Default)]
pub struct Node {
    id: Option<i64>,
    pub keys: Vec<u32>,
    pub vals: Vec<u32>,
    lat: Option<i64>,
    lon: Option<i64>,
}

impl Node {
    pub fn id(&self) -> i64 {
        self.id.unwrap_or(0)
    }

    pub fn lat(&self) -> i64 {
        self.lat.unwrap_or(0)
    }

    pub fn lon(&self) -> i64 {
        self.lon.unwrap_or(0)
    }

    fn parse(data: &[u8]) -> Result<Self, Error> {
        let mut out = Self::default();
        for field in wire::fields(data) {
            let (number, value) = field?;
            match (number, value) {
                (1, FieldValue::Varint(v)) => out.id = Some(wire::zigzag_decode(v)),
                (2, FieldValue::LengthDelimited(v)) => out.keys = as_u32s(v)?,
                (3, FieldValue::LengthDelimited(v)) => out.vals = as_u32s(v)?,
                (8, FieldValue::Varint(v)) => out.lat = Some(wire::zigzag_decode(v)),
                (9, FieldValue::Varint(v)) => out.lon = Some(wire::zigzag_decode(v)),
                _ => {}
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Default)]
pub struct DenseNodes {
    pub id: Vec<i64>,
    pub lat: Vec<i64>,
    pub lon: Vec<i64>,
}

impl DenseNodes {
    fn parse(data: &[u8]) -> Result<Self, Error> {
        let mut out = Self::default();
        for field in wire::fields(data) {
            let (number, value) = field?;
            match (number, value) {
                (1, FieldValue::LengthDelimited(v)) => out.id = wire::packed_sint64(v)?,
                (8, FieldValue::LengthDelimited(v)) => out.lat = wire::packed_sint64(v)?,
                (9, FieldValue::LengthDelimited(v)) => out.lon = wire::packed_sint64(v)?,
                _ => {}
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Default)]
pub struct Way {
    id: Option<i64>,
    pub keys: Vec<u32>,
    pub vals: Vec<u32>,
    pub refs: Vec<i64>,
}

impl Way {
    pub fn id(&self) -> i64 {
        self.id.unwrap_or(0)
    }

    fn parse(data: &[u8]) -> Result<Self, Error> {
        let mut out = Self::default();
        for field in wire::fields(data) {
            let (number, value) = field?;
            match (number, value) {
                (1, FieldValue::Varint(v)) => out.id = Some(wire::zigzag_decode(v)),
                (2, FieldValue::LengthDelimited(v)) => out.keys = as_u32s(v)?,
                (3, FieldValue::LengthDelimited(v)) => out.vals = as_u32s(v)?,
                (8, FieldValue::LengthDelimited(v)) => out.refs = wire::packed_sint64(v)?,
                _ => {}
            }
        }
        Ok(out)
    }
}

pub mod relation {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum MemberType {
        Node,
        Way,
        Relation,
    }

    impl MemberType {
        pub fn from_i32(v: i32) -> Option<Self> {
            match v {
                0 => Some(Self::Node),
                1 => Some(Self::Way),
                2 => Some(Self::Relation),
                _ => None,
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct Relation {
    id: Option<i64>,
    pub keys: Vec<u32>,
    pub vals: Vec<u32>,
    pub roles_sid: Vec<i32>,
    pub memids: Vec<i64>,
    pub types: Vec<relation::MemberType>,
}

impl Relation {
    pub fn id(&self) -> i64 {
        self.id.unwrap_or(0)
    }

    fn parse(data: &[u8]) -> Result<Self, Error> {
        let mut out = Self::default();
        for field in wire::fields(data) {
            let (number, value) = field?;
            match (number, value) {
                (1, FieldValue::Varint(v)) => out.id = Some(wire::zigzag_decode(v)),
                (2, FieldValue::LengthDelimited(v)) => out.keys = as_u32s(v)?,
                (3, FieldValue::LengthDelimited(v)) => out.vals = as_u32s(v)?,
                (8, FieldValue::LengthDelimited(v)) => {
                    out.roles_sid = wire::packed_varints(v)?.into_iter().map(|x| x as i32).collect()
                }
                (9, FieldValue::LengthDelimited(v)) => out.memids = wire::packed_sint64(v)?,
                (10, FieldValue::LengthDelimited(v)) => {
                    out.types = wire::packed_varints(v)?
                        .into_iter()
                        .filter_map(|x| relation::MemberType::from_i32(x as i32))
                        .collect()
                }
                _ => {}
            }
        }
        Ok(out)
    }
}

fn as_u32s(data: &[u8]) -> Result<Vec<u32>, Error> {
    Ok(wire::packed_varints(data)?.into_iter().map(|x| x as u32).collect())
}
