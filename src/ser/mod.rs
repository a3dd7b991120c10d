//
// Copyright 2024 nskeyed Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # The bplist generator.
//!
//! Serialization is a single depth-first pass over the object tree. Each
//! object appends its offset to the offset vector as it is emitted, and the
//! vector index becomes the object's reference. Containers reserve space for
//! their child references up front and back-fill the slots as the children
//! are written, so the output buffer is only ever addressed by offset and
//! only ever grows.
//!
//! The reference width is fixed before the pass begins by counting the
//! objects the tree will produce; the offset width is chosen afterwards from
//! the largest offset actually written.

use log::debug;

use crate::document::{
    HEADER_MAGIC_NUMBER,
    HEADER_VERSION_00,
    EXTENDED_LENGTH,
    ObjectFormat,
};
use crate::error::{Error, Result};
use crate::object::Object;

/// Returns the smallest of 1, 2, 4 or 8 bytes able to hold the value.
fn minimal_uint_width(value: u64) -> usize {
    if value <= u8::MAX as u64 {
        1
    } else if value <= u16::MAX as u64 {
        2
    } else if value <= u32::MAX as u64 {
        4
    } else {
        8
    }
}

/// Counts the objects a tree will occupy in the object table.
///
/// The generator does not deduplicate, so every node in the tree becomes one
/// object table entry; dictionaries contribute one entry per key and value.
fn count_objects(object: &Object) -> Result<u64> {
    let children = match object {
        Object::Array(elements) => {
            let mut total = 0u64;
            for element in elements {
                total = total
                    .checked_add(count_objects(element)?)
                    .ok_or(Error::Overflow)?;
            }
            total
        }
        Object::Dictionary(dict) => {
            let mut total = 0u64;
            for (key, value) in dict {
                total = total
                    .checked_add(count_objects(key)?)
                    .ok_or(Error::Overflow)?
                    .checked_add(count_objects(value)?)
                    .ok_or(Error::Overflow)?;
            }
            total
        }
        _ => 0,
    };
    children.checked_add(1).ok_or(Error::Overflow)
}

struct Writer {
    /// The output buffer, headed by the magic number.
    buf: Vec<u8>,
    /// Byte offset of each emitted object, indexed by object reference.
    offsets: Vec<usize>,
    /// The byte length of an object reference.
    ref_size: usize,
}

impl Writer {
    /// Appends a big-endian unsigned integer of the given width.
    fn push_be_uint(&mut self, width: usize, value: u64) {
        let bytes = value.to_be_bytes();
        self.buf.extend_from_slice(&bytes[8 - width ..]);
    }

    /// Writes an integer object using the smallest width that holds it.
    ///
    /// Negative values always occupy the 8-byte two's-complement form; the
    /// narrower widths are interpreted as unsigned by readers.
    fn write_integer(&mut self, value: i64) {
        if value < 0 {
            self.buf.push(ObjectFormat::SInt64.marker(0));
            self.buf.extend_from_slice(&value.to_be_bytes());
            return;
        }
        match minimal_uint_width(value as u64) {
            1 => {
                self.buf.push(ObjectFormat::UInt8.marker(0));
                self.push_be_uint(1, value as u64);
            }
            2 => {
                self.buf.push(ObjectFormat::UInt16.marker(0));
                self.push_be_uint(2, value as u64);
            }
            4 => {
                self.buf.push(ObjectFormat::UInt32.marker(0));
                self.push_be_uint(4, value as u64);
            }
            _ => {
                self.buf.push(ObjectFormat::SInt64.marker(0));
                self.buf.extend_from_slice(&value.to_be_bytes());
            }
        }
    }

    /// Writes a marker byte for the format, with the payload count either
    /// embedded in the low nibble or carried by a trailing integer object.
    fn write_marker_and_length(&mut self, format: ObjectFormat, count: usize) -> Result<()> {
        if count < EXTENDED_LENGTH as usize {
            self.buf.push(format.marker(count as u8));
        } else {
            self.buf.push(format.marker(EXTENDED_LENGTH));
            let count = i64::try_from(count).map_err(|_| Error::Overflow)?;
            self.write_integer(count);
        }
        Ok(())
    }

    /// Back-fills a previously reserved reference slot with an object index.
    fn patch_reference(&mut self, at: usize, index: usize) {
        debug_assert!(
            (index as u128) < (1u128 << (8 * self.ref_size)),
            "object index exceeds the chosen reference width"
        );
        let bytes = (index as u64).to_be_bytes();
        self.buf[at .. at + self.ref_size].copy_from_slice(&bytes[8 - self.ref_size ..]);
    }

    /// Emits one object and its children, returning the object's index.
    fn write_object(&mut self, object: &Object) -> Result<usize> {
        let index = self.offsets.len();
        self.offsets.push(self.buf.len());

        match object {
            Object::Boolean(value) => {
                self.buf.push(ObjectFormat::Boolean.marker(*value as u8));
            }

            Object::Integer(value) => {
                self.write_integer(*value);
            }

            Object::Real(value) => {
                self.buf.push(ObjectFormat::Float64.marker(0));
                self.buf.extend_from_slice(&value.into_inner().to_be_bytes());
            }

            Object::Date(date) => {
                self.buf.push(ObjectFormat::Date.marker(0));
                self.buf.extend_from_slice(&date.absolute_time().to_be_bytes());
            }

            Object::Data(data) => {
                self.write_marker_and_length(ObjectFormat::Data, data.len())?;
                self.buf.extend_from_slice(data);
            }

            Object::String(string) => {
                if string.is_ascii() {
                    self.write_marker_and_length(ObjectFormat::AsciiString, string.len())?;
                    self.buf.extend_from_slice(string.as_bytes());
                } else {
                    let code_units = string.encode_utf16().collect::<Vec<u16>>();
                    self.write_marker_and_length(ObjectFormat::Utf16String, code_units.len())?;
                    for unit in code_units {
                        self.buf.extend_from_slice(&unit.to_be_bytes());
                    }
                }
            }

            Object::Uid(uid) => {
                let width = minimal_uint_width(uid.get());
                self.buf.push(ObjectFormat::Uid.marker(width as u8 - 1));
                self.push_be_uint(width, uid.get());
            }

            Object::Array(elements) => {
                self.write_marker_and_length(ObjectFormat::Array, elements.len())?;
                let reference_start = self.buf.len();
                self.buf.resize(reference_start + elements.len() * self.ref_size, 0);
                for (position, element) in elements.iter().enumerate() {
                    let child = self.write_object(element)?;
                    self.patch_reference(reference_start + position * self.ref_size, child);
                }
            }

            Object::Dictionary(dict) => {
                self.write_marker_and_length(ObjectFormat::Dictionary, dict.len())?;
                let reference_start = self.buf.len();
                let value_start = reference_start + dict.len() * self.ref_size;
                self.buf.resize(reference_start + 2 * dict.len() * self.ref_size, 0);
                for (position, (key, value)) in dict.iter().enumerate() {
                    let key_index = self.write_object(key)?;
                    self.patch_reference(reference_start + position * self.ref_size, key_index);
                    let value_index = self.write_object(value)?;
                    self.patch_reference(value_start + position * self.ref_size, value_index);
                }
            }
        }

        Ok(index)
    }
}

/// Serializes an object tree into a complete bplist00 document.
pub fn to_bytes(root: &Object) -> Result<Vec<u8>> {
    let number_of_objects = count_objects(root)?;
    let ref_size = minimal_uint_width(number_of_objects - 1);

    let mut writer = Writer {
        buf: Vec::new(),
        offsets: Vec::new(),
        ref_size,
    };

    // Header.
    writer.buf.extend_from_slice(HEADER_MAGIC_NUMBER);
    writer.buf.push(HEADER_VERSION_00.0);
    writer.buf.push(HEADER_VERSION_00.1);

    // Object table, root first.
    let root_index = writer.write_object(root)?;
    debug_assert_eq!(root_index, 0);
    debug_assert_eq!(writer.offsets.len() as u64, number_of_objects);

    // Offset table. The trailer only expresses offsets of up to four bytes.
    let offset_table_offset = writer.buf.len();
    let largest_offset = offset_table_offset as u64;
    if largest_offset > u32::MAX as u64 {
        return Err(Error::Overflow);
    }
    let offset_size = match minimal_uint_width(largest_offset) {
        8 => return Err(Error::Overflow),
        width => width,
    };
    for position in 0 .. writer.offsets.len() {
        let offset = writer.offsets[position] as u64;
        writer.push_be_uint(offset_size, offset);
    }

    // Trailer: five unused bytes, sort version, widths, counts and offsets.
    writer.buf.extend_from_slice(&[0u8; 6]);
    writer.buf.push(offset_size as u8);
    writer.buf.push(ref_size as u8);
    writer.push_be_uint(8, number_of_objects);
    writer.push_be_uint(8, 0);
    writer.push_be_uint(8, offset_table_offset as u64);

    debug!(
        "generated bplist: {} objects, {}-byte references, {}-byte offsets, {} bytes total",
        number_of_objects,
        ref_size,
        offset_size,
        writer.buf.len(),
    );

    Ok(writer.buf)
}
