//! Guest module loading.
//!
//! Responsibilities:
//! - Detect whether the provided bytes are a `.wasm` binary or `.wat` text.
//! - If it looks like WAT, convert it to WASM bytes (via the `wat` crate).
//! - Compile a wasmtime `Module` from the resulting WASM bytes.
//!
//! File extensions are not trusted; the bytes themselves are sniffed. Leading whitespace and a
//! UTF-8 BOM are accepted in front of WAT.

use std::path::{Path, PathBuf};
use wasmtime::{Engine, Module};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read module {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input was empty or otherwise not recognized as WASM/WAT.
    #[error("unrecognized module format (expected wasm or wat)")]
    UnrecognizedFormat,

    #[error("failed to parse WAT: {0}")]
    WatParseFailed(#[from] wat::Error),

    #[error("failed to compile WASM module: {0:#}")]
    CompileFailed(anyhow::Error),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DetectedFormat {
    Wasm,
    Wat,
}

/// Result of normalizing (detecting + possibly converting) the input.
#[derive(Clone, Debug)]
pub struct Detected {
    pub format: DetectedFormat,
    /// Always valid WASM bytes (for WASM/WAT inputs).
    pub wasm_bytes: Vec<u8>,
}

/// Detect -> (optional) wat->wasm -> compile.
pub fn compile_module(engine: &Engine, bytes: &[u8]) -> Result<Module, LoadError> {
    let Detected { format, wasm_bytes } = normalize_to_wasm(bytes)?;
    log::debug!("compiling {format:?} module ({} bytes)", wasm_bytes.len());
    Module::new(engine, &wasm_bytes).map_err(LoadError::CompileFailed)
}

pub fn load_file(engine: &Engine, path: &Path) -> Result<Module, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    compile_module(engine, &bytes)
}

/// Detect format and normalize to valid WASM bytes.
pub fn normalize_to_wasm(bytes: &[u8]) -> Result<Detected, LoadError> {
    let format = detect_format(bytes).ok_or(LoadError::UnrecognizedFormat)?;

    match format {
        DetectedFormat::Wasm => Ok(Detected {
            format,
            wasm_bytes: bytes.to_vec(),
        }),
        DetectedFormat::Wat => Ok(Detected {
            format,
            wasm_bytes: wat::parse_bytes(bytes)?.into_owned(),
        }),
    }
}

/// Best-effort detection.
///
/// - `\0asm` magic means WASM.
/// - Otherwise, after a BOM and leading whitespace, a `(` means WAT.
pub fn detect_format(bytes: &[u8]) -> Option<DetectedFormat> {
    if bytes.starts_with(b"\0asm") {
        return Some(DetectedFormat::Wasm);
    }

    let i = skip_bom_and_leading_ws(bytes);
    if bytes.get(i) == Some(&b'(') {
        return Some(DetectedFormat::Wat);
    }

    None
}

fn skip_bom_and_leading_ws(bytes: &[u8]) -> usize {
    let start = if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        3
    } else {
        0
    };
    start
        + bytes[start..]
            .iter()
            .take_while(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
            .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_wasm_magic() {
        assert_eq!(
            detect_format(b"\0asm\x01\x00\x00\x00"),
            Some(DetectedFormat::Wasm)
        );
    }

    #[test]
    fn detects_wat_with_whitespace() {
        assert_eq!(detect_format(b"   \n\t(module)"), Some(DetectedFormat::Wat));
    }

    #[test]
    fn detects_wat_with_bom() {
        assert_eq!(
            detect_format(b"\xEF\xBB\xBF(module)"),
            Some(DetectedFormat::Wat)
        );
    }

    #[test]
    fn unrecognized_returns_none() {
        assert_eq!(detect_format(b"not wasm"), None);
        assert_eq!(detect_format(b""), None);
        assert!(matches!(
            normalize_to_wasm(b"  "),
            Err(LoadError::UnrecognizedFormat)
        ));
    }

    #[test]
    fn wat_is_converted_and_compiled() {
        let engine = Engine::default();
        let module = compile_module(&engine, b"(module (func (export \"start\")))").unwrap();
        assert!(module.get_export("start").is_some());
    }

    #[test]
    fn broken_wat_reports_parse_error() {
        let err = normalize_to_wasm(b"(module (func").unwrap_err();
        assert!(matches!(err, LoadError::WatParseFailed(_)));
    }
}
