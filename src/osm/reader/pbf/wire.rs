// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Minimal protobuf wire-format decoder covering exactly what reading OSM PBF
//! requires: varint/zigzag scalars, length-delimited bytes and packed
//! repeated fields. There are no message descriptors and no code generation -
//! callers match field numbers by hand against the well-known
//! `fileformat.proto`/`osmformat.proto` layouts.

use super::Error;

#[derive(Debug, Clone, Copy)]
pub enum FieldValue<'a> {
    Varint(u64),
    Fixed64(u64),
    LengthDelimited(&'a [u8]),
    Fixed32(u32),
}

/// Iterates over the top-level `(field_number, value)` pairs of a protobuf message.
pub fn fields(data: &[u8]) -> Fields<'_> {
    Fields { data, pos: 0 }
}

pub struct Fields<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for Fields<'a> {
    type Item = Result<(u32, FieldValue<'a>), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.data.len() {
            None
        } else {
            Some(self.step())
        }
    }
}

impl<'a> Fields<'a> {
    fn step(&mut self) -> Result<(u32, FieldValue<'a>), Error> {
        let tag = read_varint(self.data, &mut self.pos)?;
        let field_number = (tag >> 3) as u32;
        let wire_type = (tag & 0x7) as u8;

        let value = match wire_type {
            0 => FieldValue::Varint(read_varint(self.data, &mut self.pos)?),
            1 => FieldValue::Fixed64(read_fixed64(self.data, &mut self.pos)?),
            2 => {
                let len = read_varint(self.data, &mut self.pos)? as usize;
                let end = self
                    .pos
                    .checked_add(len)
                    .filter(|&e| e <= self.data.len())
                    .ok_or_else(|| Error::Malformed("length-delimited field out of bounds".into()))?;
                let slice = &self.data[self.pos..end];
                self.pos = end;
                FieldValue::LengthDelimited(slice)
            }
            5 => FieldValue::Fixed32(read_fixed32(self.data, &mut self.pos)?),
            other => return Err(Error::Malformed(format!("unsupported wire type {other}"))),
        };

        Ok((field_number, value))
    }
}

fn read_varint(data: &[u8], pos: &mut usize) -> Result<u64, Error> {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    loop {
        let byte = *data
            .get(*pos)
            .ok_or_else(|| Error::Malformed("truncated varint".into()))?;
        *pos += 1;
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift >= 64 {
            return Err(Error::Malformed("varint too long".into()));
        }
    }
}

fn read_fixed64(data: &[u8], pos: &mut usize) -> Result<u64, Error> {
    let end = *pos + 8;
    let bytes: [u8; 8] = data
        .get(*pos..end)
        .ok_or_else(|| Error::Malformed("truncated fixed64".into()))?
        .try_into()
        .unwrap();
    *pos = end;
    Ok(u64::from_le_bytes(bytes))
}

fn read_fixed32(data: &[u8], pos: &mut usize) -> Result<u32, Error> {
    let end = *pos + 4;
    let bytes: [u8; 4] = data
        .get(*pos..end)
        .ok_or_else(|| Error::Malformed("truncated fixed32".into()))?
        .try_into()
        .unwrap();
    *pos = end;
    Ok(u32::from_le_bytes(bytes))
}

/// Decodes a zigzag-encoded varint (protobuf `sint64`/`sint32`) back to a signed value.
pub fn zigzag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

/// Decodes a packed repeated varint field's raw payload into plain `u64`s.
pub fn packed_varints(data: &[u8]) -> Result<Vec<u64>, Error> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        out.push(read_varint(data, &mut pos)?);
    }
    Ok(out)
}

/// Decodes a packed repeated `sint64` field's raw payload.
pub fn packed_sint64(data: &[u8]) -> Result<Vec<i64>, Error> {
    Ok(packed_varints(data)?.into_iter().map(zigzag_decode).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zigzag_round_trips() {
        assert_eq!(zigzag_decode(0), 0);
        assert_eq!(zigzag_decode(1), -1);
        assert_eq!(zigzag_decode(2), 1);
        assert_eq!(zigzag_decode(3), -2);
    }

    #[test]
    fn reads_varint_and_length_delimited_fields() {
        // field 1 (varint) = 150, field 2 (length-delimited) = "hi"
        let data = [0x08, 0x96, 0x01, 0x12, 0x02, b'h', b'i'];
        let parsed: Vec<_> = fields(&data).collect::<Result<_, _>>().unwrap();
        assert_eq!(parsed.len(), 2);
        match parsed[0] {
            (1, FieldValue::Varint(v)) => assert_eq!(v, 150),
            _ => panic!("unexpected field 0"),
        }
        match parsed[1] {
            (2, FieldValue::LengthDelimited(v)) => assert_eq!(v, b"hi"),
            _ => panic!("unexpected field 1"),
        }
    }
}
