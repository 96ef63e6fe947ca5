//! Error types for packet construction and masking.

use thiserror::Error;

/// Errors raised while building, parsing or masking packets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    /// Buffer too short for the header being decoded.
    #[error("{layer} header truncated: need {needed} bytes, have {available}")]
    Truncated {
        layer: &'static str,
        needed: usize,
        available: usize,
    },

    /// Frame does not carry the expected protocol.
    #[error("unexpected {layer}: {message}")]
    Unexpected {
        layer: &'static str,
        message: String,
    },

    /// A don't-care range would hide part of the structural headers.
    #[error("mask range at bit {offset_bits} overlaps the first {structural_bytes} structural bytes")]
    MaskOverlapsHeader {
        offset_bits: usize,
        structural_bytes: usize,
    },

    /// A don't-care range or field extends past the end of the template.
    #[error("mask range {offset_bits}+{len_bits} bits exceeds template of {template_bytes} bytes")]
    MaskOutOfBounds {
        offset_bits: usize,
        len_bits: usize,
        template_bytes: usize,
    },
}

impl PacketError {
    pub(crate) fn truncated(layer: &'static str, needed: usize, available: usize) -> Self {
        Self::Truncated {
            layer,
            needed,
            available,
        }
    }

    pub(crate) fn unexpected(layer: &'static str, message: impl Into<String>) -> Self {
        Self::Unexpected {
            layer,
            message: message.into(),
        }
    }
}
