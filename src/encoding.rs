use std::fmt;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};

use crate::error::{RenameError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingSource {
    Override,
    Bom,
    Utf8,
    Detector,
}

impl fmt::Display for EncodingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EncodingSource::Override => "override",
            EncodingSource::Bom => "bom",
            EncodingSource::Utf8 => "utf-8",
            EncodingSource::Detector => "detector",
        };
        f.write_str(label)
    }
}

/// CSV text after decoding, with the byte-order mark already removed.
#[derive(Debug, Clone)]
pub struct DecodedCsv {
    pub text: String,
    pub encoding: &'static Encoding,
    pub source: EncodingSource,
    pub had_errors: bool,
}

/// How the bytes of a mapping CSV are turned into text.
#[derive(Debug, Clone, Default)]
pub struct EncodingStrategy {
    forced: Option<&'static Encoding>,
}

impl EncodingStrategy {
    pub fn new(label: Option<&str>) -> Result<Self> {
        let Some(label) = label.map(str::trim).filter(|label| !label.is_empty()) else {
            return Ok(Self::default());
        };
        let encoding =
            Encoding::for_label(label.as_bytes()).ok_or_else(|| RenameError::UnknownEncoding {
                label: label.to_string(),
            })?;
        Ok(Self {
            forced: Some(encoding),
        })
    }

    pub fn describe(&self) -> String {
        match self.forced {
            Some(encoding) => format!("{} (override)", encoding.name()),
            None => "auto-detect (BOM, UTF-8, detector)".to_string(),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> DecodedCsv {
        let (encoding, source) = match self.forced {
            Some(encoding) => (encoding, EncodingSource::Override),
            None => sniff(bytes),
        };
        let (text, had_errors) = encoding.decode_with_bom_removal(bytes);
        DecodedCsv {
            text: text.into_owned(),
            encoding,
            source,
            had_errors,
        }
    }
}

fn sniff(bytes: &[u8]) -> (&'static Encoding, EncodingSource) {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return (encoding, EncodingSource::Bom);
    }
    if std::str::from_utf8(bytes).is_ok() {
        return (UTF_8, EncodingSource::Utf8);
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    (detector.guess(None, true), EncodingSource::Detector)
}
