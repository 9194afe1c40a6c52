// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Hand-rolled decoding of the `fileformat.proto` messages used to frame an
//! [OSM PBF file](https://wiki.openstreetmap.org/wiki/PBF_Format#File_format):
//! `BlobHeader` and `Blob`.

use super::wire::{self, FieldValue};
use super::Error;

#[derive(Debug, Default)]
pub struct BlobHeader {
    pub type_: Option<String>,
    datasize: i32,
}

impl BlobHeader {
    pub fn type_(&self) -> &str {
        self.type_.as_deref().unwrap_or("")
    }

    pub fn datasize(&self) -> i32 {
        self.datasize
    }

    pub fn parse_from_bytes(data: &[u8]) -> Result<Self, Error> {
        let mut out = Self::default();
        for field in wire::fields(data) {
            let (number, value) = field?;
            match (number, value) {
                (1, FieldValue::LengthDelimited(v)) => {
                    out.type_ = Some(String::from_utf8_lossy(v).into_owned())
                }
                (3, FieldValue::Varint(v)) => out.datasize = v as i32,
                _ => {}
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Default)]
pub struct Blob {
    raw_size: Option<i32>,
    pub data: Option<blob::Data>,
}

impl Blob {
    pub fn raw_size(&self) -> i32 {
        self.raw_size.unwrap_or(0)
    }

    pub fn parse_from_bytes(data: &[u8]) -> Result<Self, Error> {
        let mut out = Self::default();
        for field in wire::fields(data) {
            let (number, value) = field?;
            match (number, value) {
                (1, FieldValue::LengthDelimited(v)) => {
                    out.data = Some(blob::Data::Raw(v.to_vec()))
                }
                (2, FieldValue::Varint(v)) => out.raw_size = Some(v as i32),
                (3, FieldValue::LengthDelimited(v)) => {
                    out.data = Some(blob::Data::ZlibData(v.to_vec()))
                }
                (4, FieldValue::LengthDelimited(v)) => {
                    out.data = Some(blob::Data::LzmaData(v.to_vec()))
                }
                (5, FieldValue::LengthDelimited(v)) => {
                    out.data = Some(blob::Data::OBSOLETEBzip2Data(v.to_vec()))
                }
                (6, FieldValue::LengthDelimited(v)) => {
                    out.data = Some(blob::Data::Lz4Data(v.to_vec()))
                }
                (7, FieldValue::LengthDelimited(v)) => {
                    out.data = Some(blob::Data::ZstdData(v.to_vec()))
                }
                _ => {}
            }
        }
        Ok(out)
    }
}

pub mod blob {
    #[derive(Debug, Clone)]
    pub enum Data {
        Raw(Vec<u8>),
        ZlibData(Vec<u8>),
        LzmaData(Vec<u8>),
        OBSOLETEBzip2Data(Vec<u8>),
        Lz4Data(Vec<u8>),
        ZstdData(Vec<u8>),
    }
}
