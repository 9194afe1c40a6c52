// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::fs::File;
use std::io;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use graph_builder::GraphBuilder;

use crate::osm::Profile;
use crate::Graph;

mod graph_builder;
mod model;
mod pbf;
mod xml;

/// Format of the input OSM file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Unknown format - guess the format from the first bytes of the data.
    Unknown,

    /// Force uncompressed [OSM XML](https://wiki.openstreetmap.org/wiki/OSM_XML)
    Xml,

    /// Force [OSM XML](https://wiki.openstreetmap.org/wiki/OSM_XML)
    /// with [gzip](https://en.wikipedia.org/wiki/Gzip) compression
    XmlGz,

    /// Force [OSM XML](https://wiki.openstreetmap.org/wiki/OSM_XML)
    /// with [bzip2](https://en.wikipedia.org/wiki/Bzip2) compression
    XmlBz2,

    /// Force [OSM PBF](https://wiki.openstreetmap.org/wiki/PBF_Format)
    Pbf,
}

impl FileFormat {
    /// Guesses a [FileFormat] from the first bytes of a buffer by their magic numbers,
    /// falling back to [FileFormat::Xml].
    fn sniff(head: &[u8]) -> Self {
        if head.starts_with(&[0x1f, 0x8b]) {
            Self::XmlGz
        } else if head.starts_with(b"BZh") {
            Self::XmlBz2
        } else if head.len() >= 4 {
            // PBF files start with a big-endian u32 BlobHeader length, followed
            // by a BlobHeader whose first field (1, length-delimited) spells out
            // "OSMHeader" or "OSMData" - neither of which is valid OSM XML.
            let header_len = u32::from_be_bytes([head[0], head[1], head[2], head[3]]) as usize;
            if header_len > 0 && header_len < MAX_SNIFF_HEADER_LEN && head.len() > 4 + 2 {
                Self::Pbf
            } else {
                Self::Xml
            }
        } else {
            Self::Xml
        }
    }
}

const MAX_SNIFF_HEADER_LEN: usize = 64 * 1024;

/// Additional controls for interpreting OSM data as a routing [Graph].
#[derive(Debug)]
pub struct Options<'a> {
    /// How OSM features should be interpreted and converted into a [Graph].
    pub profile: &'a Profile<'a>,

    /// Format of the input data. [FileFormat::Unknown] sniffs the format from the data itself.
    pub file_format: FileFormat,

    /// Filter features by a specific bounding box. In order: left (min lon), bottom (min lat),
    /// right (max lon), top (max lat). Ignored if all values are set to zero, or at least one
    /// of them is not finite.
    pub bbox: [f32; 4],
}

/// Error conditions which may occur while reading OSM data into a [Graph].
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] Arc<io::Error>),

    #[error("malformed xml: {0}")]
    Xml(#[from] Arc<quick_xml::Error>),

    #[error("malformed pbf: {0}")]
    Pbf(#[from] pbf::Error),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(Arc::new(e))
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::Xml(Arc::new(e))
    }
}

/// Internal trait for objects which can stream [osm features](model::Feature)
/// from an underlying source.
trait FeatureReader {
    type Error;
    fn next(&mut self) -> Result<Option<model::Feature>, Self::Error>;
}

impl<I, E> FeatureReader for I
where
    I: Iterator<Item = Result<model::Feature, E>>,
{
    type Error = E;

    fn next(&mut self) -> Result<Option<model::Feature>, Self::Error> {
        Iterator::next(self).transpose()
    }
}

/// Parse OSM features from a file at the provided path into a [Graph] as per the provided [Options].
pub fn add_features_from_file<P: AsRef<Path>>(
    g: &mut Graph,
    options: &Options,
    path: P,
) -> Result<(), Error> {
    let mut f = io::BufReader::new(File::open(path)?);
    let format = resolve_format(options.file_format, &mut f)?;
    add_features_from_io_with_format(g, options, f, format)
}

/// Parse OSM features from a reader into a [Graph] as per the provided [Options].
pub fn add_features_from_io<R: io::BufRead>(
    g: &mut Graph,
    options: &Options,
    mut reader: R,
) -> Result<(), Error> {
    let format = resolve_format(options.file_format, &mut reader)?;
    add_features_from_io_with_format(g, options, reader, format)
}

/// Parse OSM features from a static buffer into a [Graph] as per the provided [Options].
pub fn add_features_from_buffer(g: &mut Graph, options: &Options, data: &[u8]) -> Result<(), Error> {
    let format = match options.file_format {
        FileFormat::Unknown => FileFormat::sniff(data),
        other => other,
    };

    match format {
        FileFormat::Xml => {
            GraphBuilder::new(g, options).add_features(xml::features_from_buffer(data))?
        }
        FileFormat::XmlGz => {
            let mut decompressed = Vec::new();
            flate2::read::GzDecoder::new(data).read_to_end(&mut decompressed)?;
            GraphBuilder::new(g, options).add_features(xml::features_from_buffer(&decompressed))?
        }
        FileFormat::XmlBz2 => {
            let mut decompressed = Vec::new();
            bzip2::read::BzDecoder::new(data).read_to_end(&mut decompressed)?;
            GraphBuilder::new(g, options).add_features(xml::features_from_buffer(&decompressed))?
        }
        FileFormat::Pbf => {
            GraphBuilder::new(g, options).add_features(pbf::features_from_file(data))?
        }
        FileFormat::Unknown => unreachable!("resolved above"),
    }

    Ok(())
}

/// Reads a few bytes from `r` to resolve [FileFormat::Unknown] without consuming the stream.
fn resolve_format<R: io::BufRead>(requested: FileFormat, r: &mut R) -> Result<FileFormat, Error> {
    if requested != FileFormat::Unknown {
        return Ok(requested);
    }
    let head = r.fill_buf()?;
    Ok(FileFormat::sniff(head))
}

fn add_features_from_io_with_format<R: io::BufRead>(
    g: &mut Graph,
    options: &Options,
    mut reader: R,
    format: FileFormat,
) -> Result<(), Error> {
    match format {
        FileFormat::Xml => GraphBuilder::new(g, options).add_features(xml::features_from_file(reader))?,
        FileFormat::XmlGz => {
            let decompressed = io::BufReader::new(flate2::read::GzDecoder::new(reader));
            GraphBuilder::new(g, options).add_features(xml::features_from_file(decompressed))?
        }
        FileFormat::XmlBz2 => {
            let decompressed = io::BufReader::new(bzip2::read::BzDecoder::new(reader));
            GraphBuilder::new(g, options).add_features(xml::features_from_file(decompressed))?
        }
        FileFormat::Pbf => {
            let mut data = Vec::new();
            reader.read_to_end(&mut data)?;
            GraphBuilder::new(g, options).add_features(pbf::features_from_file(data.as_slice()))?
        }
        FileFormat::Unknown => unreachable!("resolved by caller"),
    }

    Ok(())
}
