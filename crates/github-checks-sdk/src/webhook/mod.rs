//! Inbound webhook support.

mod validation;

pub use validation::SignatureValidator;
