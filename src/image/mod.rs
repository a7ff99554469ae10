//! Binary images: the compiled, self-describing form of one compilation unit.
//!
//! ## Format
//!
//! ```text
//! b"TDDIMG" | version: u8 | JSON body
//! ```
//!
//! The body is a serialized [`Image`]. Every collection in it is an ordered `Vec`, so encoding the
//! same program twice yields identical bytes.

pub mod ir;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use ir::{BinaryOp, Const, Expr, Intrinsic, Stmt, UnaryOp};

pub const MAGIC: &[u8; 6] = b"TDDIMG";
pub const FORMAT_VERSION: u8 = 1;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("not a tddlive image (bad magic)")]
    BadMagic,
    #[error("unsupported image format version {0} (expected {expected})", expected = FORMAT_VERSION)]
    UnsupportedVersion(u8),
    #[error("malformed image body: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A compiled unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    /// Assembly name of the unit; the key under which it is stored and resolved.
    pub name: String,
    /// Names of directly referenced units, in declaration order.
    pub references: Vec<String>,
    pub types: Vec<TypeImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeImage {
    pub full_name: String,
    pub attributes: Vec<String>,
    pub fields: Vec<FieldImage>,
    pub methods: Vec<MethodImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldImage {
    pub name: String,
    pub init: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodImage {
    pub name: String,
    pub arity: usize,
    /// Total local slots, parameters included.
    pub locals: usize,
    pub attributes: Vec<String>,
    pub body: Vec<Stmt>,
    /// 1-based declaration line in the unit's source.
    pub line: usize,
}

impl Image {
    pub fn find_type(&self, full_name: &str) -> Option<&TypeImage> {
        self.types.iter().find(|t| t.full_name == full_name)
    }

    /// Encode to the on-disk representation.
    pub fn encode(&self) -> Result<Vec<u8>, ImageError> {
        let mut bytes = Vec::with_capacity(1024);
        bytes.extend_from_slice(MAGIC);
        bytes.push(FORMAT_VERSION);
        serde_json::to_writer(&mut bytes, self)?;
        Ok(bytes)
    }

    /// Decode from the on-disk representation.
    ///
    /// Expression trees nest one JSON level per operator, so a long `a + b + ...` chain runs past
    /// serde_json's default recursion limit. The limit is lifted and the stack grows on demand
    /// instead.
    pub fn decode(bytes: &[u8]) -> Result<Image, ImageError> {
        let body = bytes.strip_prefix(MAGIC.as_slice()).ok_or(ImageError::BadMagic)?;
        let (&version, body) = body.split_first().ok_or(ImageError::BadMagic)?;
        if version != FORMAT_VERSION {
            return Err(ImageError::UnsupportedVersion(version));
        }
        let mut de = serde_json::Deserializer::from_slice(body);
        de.disable_recursion_limit();
        let image = Image::deserialize(serde_stacker::Deserializer::new(&mut de))?;
        de.end()?;
        Ok(image)
    }
}

impl TypeImage {
    pub fn method(&self, name: &str) -> Option<&MethodImage> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// Lowercase hex SHA-256 of an encoded image.
pub fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Image {
        Image {
            name: "Calc".to_string(),
            references: vec!["Shared".to_string()],
            types: vec![TypeImage {
                full_name: "Calc.Math".to_string(),
                attributes: vec![],
                fields: vec![FieldImage {
                    name: "seed".to_string(),
                    init: Expr::Const(Const::Int(1)),
                }],
                methods: vec![MethodImage {
                    name: "add".to_string(),
                    arity: 2,
                    locals: 2,
                    attributes: vec![],
                    body: vec![Stmt::Return(Some(Expr::Binary(
                        Box::new(Expr::Local(0)),
                        BinaryOp::Add,
                        Box::new(Expr::Local(1)),
                    )))],
                    line: 3,
                }],
            }],
        }
    }

    #[test]
    fn test_encode_starts_with_magic_and_version() {
        let bytes = sample().encode().unwrap();
        assert!(bytes.starts_with(MAGIC));
        assert_eq!(bytes[MAGIC.len()], FORMAT_VERSION);
        assert_eq!(Image::decode(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let a = sample().encode().unwrap();
        let b = sample().encode().unwrap();
        assert_eq!(a, b);
        assert_eq!(digest(&a), digest(&b));
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        assert!(matches!(Image::decode(b"NOTIMG\x01{}"), Err(ImageError::BadMagic)));
        assert!(matches!(Image::decode(b"TDD"), Err(ImageError::BadMagic)));
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let mut bytes = sample().encode().unwrap();
        bytes[MAGIC.len()] = 99;
        let err = Image::decode(&bytes).unwrap_err();
        assert!(matches!(err, ImageError::UnsupportedVersion(99)));
        assert_eq!(err.to_string(), "unsupported image format version 99 (expected 1)");
    }

    #[test]
    fn test_decode_accepts_deeply_nested_expressions() {
        let mut sum = Expr::Const(Const::Int(1));
        for _ in 0..500 {
            sum = Expr::Binary(Box::new(sum), BinaryOp::Add, Box::new(Expr::Const(Const::Int(1))));
        }
        let mut image = sample();
        image.types[0].methods[0].body = vec![Stmt::Return(Some(sum))];

        let bytes = image.encode().unwrap();
        assert_eq!(Image::decode(&bytes).unwrap(), image);
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut bytes = sample().encode().unwrap();
        bytes.extend_from_slice(b"{}");
        assert!(matches!(Image::decode(&bytes), Err(ImageError::Malformed(_))));
    }

    #[test]
    fn test_decode_rejects_truncated_body() {
        let bytes = sample().encode().unwrap();
        let truncated = &bytes[..bytes.len() - 5];
        assert!(matches!(Image::decode(truncated), Err(ImageError::Malformed(_))));
    }

    #[test]
    fn test_digest_is_lowercase_hex_sha256() {
        assert_eq!(
            digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_lookup_helpers() {
        let image = sample();
        let ty = image.find_type("Calc.Math").unwrap();
        assert_eq!(ty.method("add").unwrap().arity, 2);
        assert_eq!(ty.field_index("seed"), Some(0));
        assert!(image.find_type("Math").is_none());
    }
}
