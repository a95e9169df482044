//! Corpus data model shared by every engine stage

mod document;

pub use document::Document;
