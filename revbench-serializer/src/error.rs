//! Serialization Errors

use revbench_model::ModelError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while encoding or decoding a document
#[derive(Debug, Error)]
pub enum SerializeError {
    /// The document is not well-formed XML
    #[error("malformed document: {0}")]
    Xml(String),

    /// Start and end tags do not pair up
    #[error("unbalanced document: {0}")]
    Unbalanced(&'static str),

    /// The document holds no root element
    #[error("document has no root element")]
    EmptyDocument,

    /// The root is neither a suite nor a suite container
    #[error("unexpected root element <{0}>")]
    UnexpectedRoot(String),

    /// A required attribute is absent
    #[error("<{element}> is missing attribute \"{attribute}\"")]
    MissingAttribute {
        /// Element name
        element: String,
        /// Attribute name
        attribute: &'static str,
    },

    /// An attribute value could not be parsed
    #[error("<{element}> attribute \"{attribute}\" has invalid value {value:?}")]
    InvalidAttribute {
        /// Element name
        element: String,
        /// Attribute name
        attribute: String,
        /// Raw value
        value: String,
    },

    /// The decoded values violate a model rule
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A document file could not be read or written
    #[error("{}: {source}", path.display())]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Decoding one of several files failed
    #[error("{}: {source}", path.display())]
    File {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: Box<SerializeError>,
    },
}

impl SerializeError {
    pub(crate) fn xml(err: impl std::fmt::Display) -> Self {
        SerializeError::Xml(err.to_string())
    }
}
