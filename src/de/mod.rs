//
// Copyright 2024 nskeyed Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # The bplist parser.
//!
//! Parsing proceeds in two phases. The document metadata is recovered first:
//! the header is checked for the magic number and version, the trailer is
//! read from the end of the input, and the offset table is materialized.
//! The object tree is then decoded recursively starting at the root object,
//! with every offset checked against the object region before a single
//! payload byte is interpreted.
//!
//! Containers may share sub-objects through the offset table; two references
//! to the same object decode to equal values. A container that (transitively)
//! references itself is rejected.

mod parser;

use log::debug;

use std::collections::BTreeSet;

use crate::document::{
    HEADER_SIZE,
    HEADER_VERSION_00,
    TRAILER_SIZE,
    ObjectFormat,
    OffsetTable,
};
use crate::error::{Error, Result};
use crate::object::{Date, Dictionary, Object, Uid};

#[derive(Clone, Eq, PartialEq, Debug)]
struct Metadata {
    /// The table of offsets from the start of the input to the location of a given object.
    offset_table: OffsetTable,
    /// The byte length of an object reference.
    object_reference_size: usize,
    /// The index of the root object to decode.
    root_object: usize,
    /// The range of bytes of the input where objects may reside.
    object_table_range: std::ops::Range<usize>,
}

impl Metadata {
    /// Utilizes the offset table to compute the offset of the given object.
    fn offset_of(&self, object: usize) -> Result<usize> {
        if object >= self.offset_table.len() {
            Err(Error::InvalidObjectReference(object))
        } else {
            Ok(self.offset_table[object])
        }
    }
}

/// Provides access to objects within the object table.
#[derive(Debug)]
struct ObjectTable<'a> {
    input: &'a [u8],
    metadata: Metadata,
}

/// Defines a parser for a single object which reports failures against the
/// offset of the object being decoded.
macro_rules! define_parser {
    ($name:ident, $parser:expr, $type:ty) => {
        fn $name(&self, object: usize) -> Result<$type> {
            let (offset, data) = self.data_for(object)?;
            $parser(data)
                .map(|(_, value)| value)
                .map_err(|_| Error::InvalidObject(offset))
        }
    };
}

impl<'a> ObjectTable<'a> {
    /// Returns the offset of the object and the slice of the object region
    /// starting at it.
    ///
    /// The slice ends at the offset table, so an object payload can never
    /// pull in offset table or trailer bytes. Leading fill bytes are padding
    /// and are skipped.
    fn data_for(&self, object: usize) -> Result<(usize, &[u8])> {
        let mut offset = self.metadata.offset_of(object)?;

        // Make sure the offset is to a point within the object table.
        if !self.metadata.object_table_range.contains(&offset) {
            return Err(Error::InvalidOffsetToObject { object, offset });
        }

        let end = self.metadata.object_table_range.end;
        while self.input[offset] == ObjectFormat::Fill.tag_bits() {
            offset += 1;
            if offset >= end {
                return Err(Error::InvalidOffsetToObject { object, offset });
            }
        }

        Ok((offset, &self.input[offset .. end]))
    }

    /// Parses the marker byte for the specified object and returns the format.
    fn kind_of(&self, object: usize) -> Result<ObjectFormat> {
        let (offset, data) = self.data_for(object)?;
        parser::object::any_marker(data)
            .map(|(_, (format, _))| format)
            .map_err(|_| Error::InvalidObject(offset))
    }

    define_parser![parse_boolean, parser::object::boolean, bool];
    define_parser![parse_uint8, parser::object::uint8, u8];
    define_parser![parse_uint16, parser::object::uint16, u16];
    define_parser![parse_uint32, parser::object::uint32, u32];
    define_parser![parse_sint64, parser::object::sint64, i64];
    define_parser![parse_float32, parser::object::float32, f32];
    define_parser![parse_float64, parser::object::float64, f64];
    define_parser![parse_date, parser::object::date, f64];
    define_parser![parse_data, parser::object::data, &[u8]];
    define_parser![parse_ascii_string, parser::object::ascii_string, &str];
    define_parser![parse_utf16_string, parser::object::utf16_string, String];
    define_parser![parse_uid, parser::object::uid, u64];

    /// Parses an array of objects whose reference size is determined in metadata.
    fn parse_array(&self, object: usize) -> Result<Vec<usize>> {
        let (offset, data) = self.data_for(object)?;
        parser::object::array(self.metadata.object_reference_size)(data)
            .map(|(_, objects)| objects)
            .map_err(|_| Error::InvalidObject(offset))
    }

    /// Parses a dictionary of objects whose reference size is determined in metadata.
    fn parse_dictionary(&self, object: usize) -> Result<Vec<(usize, usize)>> {
        let (offset, data) = self.data_for(object)?;
        parser::object::dictionary(self.metadata.object_reference_size)(data)
            .map(|(_, pairs)| pairs)
            .map_err(|_| Error::InvalidObject(offset))
    }
}

/// Decodes an object tree from the object table.
#[derive(Debug)]
struct Decoder<'a> {
    object_table: ObjectTable<'a>,
    /// Set of the containers currently being decoded, to detect cycles.
    collection_stack: BTreeSet<usize>,
}

impl<'a> Decoder<'a> {
    /// Pushes a container onto the collection stack to ensure no cycles can occur.
    #[must_use = "the result must be checked to avoid creating a cycle"]
    fn enter_collection(&mut self, object: usize) -> Result<()> {
        let already_visited = self.collection_stack.insert(object) == false;
        if already_visited {
            Err(Error::CycleDetected(object))
        } else {
            Ok(())
        }
    }

    /// Pops the given container from the stack.
    fn exit_collection(&mut self, object: usize) {
        let was_present = self.collection_stack.remove(&object);
        assert!(was_present, "unbalanced calls in collection stack tracking");
    }

    /// Decodes the object with the given index into its object model form.
    fn decode_object(&mut self, object: usize) -> Result<Object> {
        let format = self.object_table.kind_of(object)?;

        match format {
            ObjectFormat::Boolean =>
                Ok(Object::Boolean(self.object_table.parse_boolean(object)?)),
            ObjectFormat::UInt8 =>
                Ok(Object::Integer(self.object_table.parse_uint8(object)? as i64)),
            ObjectFormat::UInt16 =>
                Ok(Object::Integer(self.object_table.parse_uint16(object)? as i64)),
            ObjectFormat::UInt32 =>
                Ok(Object::Integer(self.object_table.parse_uint32(object)? as i64)),
            ObjectFormat::SInt64 =>
                Ok(Object::Integer(self.object_table.parse_sint64(object)?)),
            ObjectFormat::Float32 =>
                Ok(Object::from(self.object_table.parse_float32(object)? as f64)),
            ObjectFormat::Float64 =>
                Ok(Object::from(self.object_table.parse_float64(object)?)),
            ObjectFormat::Date => {
                let absolute_time = self.object_table.parse_date(object)?;
                Ok(Object::Date(Date::from_absolute_time(absolute_time)))
            }
            ObjectFormat::Data =>
                Ok(Object::Data(self.object_table.parse_data(object)?.to_vec())),
            ObjectFormat::AsciiString =>
                Ok(Object::from(self.object_table.parse_ascii_string(object)?)),
            ObjectFormat::Utf16String =>
                Ok(Object::String(self.object_table.parse_utf16_string(object)?)),
            ObjectFormat::Uid =>
                Ok(Object::Uid(Uid::new(self.object_table.parse_uid(object)?))),

            // A fill marker standing alone carries no value.
            ObjectFormat::Fill => {
                let (offset, _) = self.object_table.data_for(object)?;
                Err(Error::InvalidObject(offset))
            }

            ObjectFormat::Array => {
                let references = self.object_table.parse_array(object)?;

                // Track entering the array to detect reference cycles.
                self.enter_collection(object)?;
                let result = references
                    .into_iter()
                    .map(|element| self.decode_object(element))
                    .collect::<Result<Vec<Object>>>();
                self.exit_collection(object);
                Ok(Object::Array(result?))
            }

            ObjectFormat::Dictionary => {
                let pairs = self.object_table.parse_dictionary(object)?;

                // Track entering the dictionary to detect reference cycles.
                self.enter_collection(object)?;
                let result = pairs
                    .into_iter()
                    .map(|(key, value)| {
                        Ok((self.decode_object(key)?, self.decode_object(value)?))
                    })
                    .collect::<Result<Dictionary>>();
                self.exit_collection(object);
                Ok(Object::Dictionary(result?))
            }
        }
    }
}

/// Parses the metadata necessary to interpret the contents of the document.
///
/// # Notes
///
/// The smallest possible document consists of:
///   1. A fixed-sized header.
///   2. An object table with a single one-byte entry such as a zero-length array.
///   3. An offset table with a single one-byte entry for the root object.
///   4. A fixed-sized trailer.
fn parse_metadata(input: &[u8]) -> Result<Metadata> {
    if input.len() < HEADER_SIZE + 2 + TRAILER_SIZE {
        return Err(Error::Eof);
    }

    // Parse the header and verify both the magic number and the version marker.
    let header_slice = &input[0 .. HEADER_SIZE];
    let (_, header) = parser::document::header(header_slice).map_err(|_| {
        Error::MissingOrInvalidHeader
    })?;
    if header.version != HEADER_VERSION_00 {
        return Err(Error::UnsupportedVersion);
    }

    // Parse the trailer from the end of the input and sanity check the fields.
    let trailer_slice = &input[input.len() - TRAILER_SIZE .. ];
    let (_, trailer) = parser::document::trailer(trailer_slice).map_err(|_| {
        Error::MissingOrInvalidTrailer
    })?;
    if !parser::utils::is_valid_reference_width(trailer.offset_table_entry_size) {
        return Err(Error::InvalidTrailerWidth(trailer.offset_table_entry_size));
    }
    if !parser::utils::is_valid_reference_width(trailer.object_reference_size) {
        return Err(Error::InvalidTrailerWidth(trailer.object_reference_size));
    }
    if trailer.root_object >= trailer.number_of_objects {
        return Err(Error::InvalidRootObject);
    }

    // Compute the location and length of the offset table.
    let offset_table_start = trailer.offset_table_offset;
    let offset_table_length = trailer
        .number_of_objects
        .checked_mul(trailer.offset_table_entry_size)
        .ok_or(Error::MissingOrInvalidOffsetTable)?;

    // The offset table must sit between the object region and the trailer.
    if offset_table_start < HEADER_SIZE {
        return Err(Error::MissingOrInvalidOffsetTable);
    }
    let offset_table_end = offset_table_start
        .checked_add(offset_table_length)
        .ok_or(Error::MissingOrInvalidOffsetTable)?;
    if offset_table_end > (input.len() - TRAILER_SIZE) {
        return Err(Error::MissingOrInvalidOffsetTable);
    }

    // Parse the offset table.
    let offset_table_slice = &input[offset_table_start .. offset_table_end];
    let (_, offset_table) = parser::document::offset_table(
        trailer.number_of_objects,
        trailer.offset_table_entry_size
    )(offset_table_slice).map_err(|_| {
        Error::MissingOrInvalidOffsetTable
    })?;

    debug!(
        "parsed bplist metadata: {} objects, {}-byte references, root {}",
        trailer.number_of_objects,
        trailer.object_reference_size,
        trailer.root_object,
    );

    Ok(Metadata {
        offset_table,
        object_reference_size: trailer.object_reference_size,
        root_object: trailer.root_object,
        object_table_range: (HEADER_SIZE .. offset_table_start),
    })
}

/// Parses a binary property list document into its top object.
///
/// Any object kind may be the root; a keyed archive will always have a
/// dictionary at the top, but standalone documents holding a single scalar
/// are valid.
pub fn from_bytes(input: &[u8]) -> Result<Object> {
    let metadata = parse_metadata(input)?;
    let root_object = metadata.root_object;

    let mut decoder = Decoder {
        object_table: ObjectTable { input, metadata },
        collection_stack: BTreeSet::new(),
    };
    decoder.decode_object(root_object)
}
