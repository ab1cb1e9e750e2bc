use crate::error::Result;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Reads a single JSON document (an order summary, a link request) from any source.
pub fn read_document<T: DeserializeOwned>(source: impl Read) -> Result<T> {
    Ok(serde_json::from_reader(BufReader::new(source))?)
}

pub fn read_document_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    read_document(File::open(path)?)
}
