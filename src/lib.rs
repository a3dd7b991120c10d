//
// Copyright 2024 nskeyed Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! Reads and writes Apple's binary property list format (bplist00) and the
//! `NSKeyedArchiver` object-graph serialization layered on top of it.
//!
//! The bplist codec operates on the [`Object`] value tree: [`parse`] decodes
//! an in-memory document into one, [`generate`] serializes one back out.
//! The archive layer operates on [`NsValue`] host graphs: [`unarchive`] and
//! [`archive`] convert between archives and graphs, consulting the class
//! registry for any custom classes the graph contains.

mod de;
mod document;
mod error;
mod ser;

pub mod archive;
pub mod object;

pub use object::{Date, Dictionary, Object, Uid};

pub use archive::archiver::ArchivingObject;
pub use archive::record::{Field, Record, RecordAdapter};
pub use archive::registry::{register, register_record, ClassAdapter};
pub use archive::unarchiver::ArchivedObject;
pub use archive::{Instance, NsValue};

pub use error::{Error, Result};

use std::sync::Arc;

/// Parses a binary property list document into its top object.
pub fn parse(bytes: &[u8]) -> Result<Object> {
    de::from_bytes(bytes)
}

/// Serializes an object tree into a complete bplist00 document.
pub fn generate(object: &Object) -> Result<Vec<u8>> {
    ser::to_bytes(object)
}

/// Unpacks an NSKeyedArchiver archive into a host object graph.
///
/// When the archive's `$top` holds the conventional single `"root"` entry,
/// the root value is returned directly; otherwise the decoded top-level
/// entries are returned as a dictionary.
pub fn unarchive(bytes: &[u8]) -> Result<NsValue> {
    archive::unarchiver::from_bytes(bytes)
}

/// Packs a host object graph into an NSKeyedArchiver archive.
pub fn archive(value: &NsValue) -> Result<Vec<u8>> {
    archive::archiver::to_bytes(value)
}

/// Merges a batch of `{class name: adapter}` entries into the class
/// registry. Existing registrations for the same names are replaced.
pub fn update_class_map<I>(mapping: I)
where
    I: IntoIterator<Item = (String, Arc<dyn ClassAdapter>)>,
{
    archive::registry::update_class_map(mapping)
}
