//! Primary-header access for raw and reduced frames.
//!
//! Only the header is read: 80-byte cards up to `END`. Gzipped frames are
//! decompressed on the fly.

use flate2::read::GzDecoder;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{Error, Result};

const CARD_LEN: usize = 80;
/// Guard against reading pixel data as header when `END` is missing.
const MAX_CARDS: usize = 36 * 64;

#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    String(String),
    Integer(i64),
    Float(f64),
    Logical(bool),
}

impl HeaderValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HeaderValue::Float(f) => Some(*f),
            HeaderValue::Integer(i) => Some(*i as f64),
            HeaderValue::String(s) => s.trim().parse().ok(),
            HeaderValue::Logical(_) => None,
        }
    }

    /// Truthiness in the FITS sense: `T`, non-zero numbers, or a string
    /// spelling of true.
    pub fn as_bool(&self) -> bool {
        match self {
            HeaderValue::Logical(b) => *b,
            HeaderValue::Integer(i) => *i != 0,
            HeaderValue::Float(f) => *f != 0.0,
            HeaderValue::String(s) => matches!(s.trim(), "T" | "True" | "true" | "1"),
        }
    }

    /// Text rendering used for matching and titles.
    pub fn to_text(&self) -> String {
        match self {
            HeaderValue::String(s) => s.clone(),
            HeaderValue::Integer(i) => i.to_string(),
            HeaderValue::Float(f) => f.to_string(),
            HeaderValue::Logical(b) => if *b { "T" } else { "F" }.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitsHeader {
    cards: HashMap<String, HeaderValue>,
}

impl FitsHeader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: HeaderValue) {
        self.cards.insert(key.to_ascii_uppercase(), value);
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.cards.get(&key.to_ascii_uppercase())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get_text(&self, key: &str) -> Option<String> {
        self.get(key).map(HeaderValue::to_text)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(HeaderValue::as_f64)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Header access used by the classifier and the fan-out.
///
/// A missing key is an ordinary outcome (`Ok(None)`); only an unreadable
/// file is an error.
pub trait HeaderSource: Send + Sync {
    fn read_header(&self, path: &Path) -> Result<FitsHeader>;

    fn get_header_field(&self, path: &Path, key: &str) -> Result<Option<HeaderValue>> {
        Ok(self.read_header(path)?.get(key).cloned())
    }
}

/// Reads headers straight from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FitsFileReader;

impl HeaderSource for FitsFileReader {
    fn read_header(&self, path: &Path) -> Result<FitsHeader> {
        let file = File::open(path).map_err(|e| Error::fits(path, e.to_string()))?;
        let is_gz = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));

        let result = if is_gz {
            parse_header(&mut BufReader::new(GzDecoder::new(file)))
        } else {
            parse_header(&mut BufReader::new(file))
        };
        result.map_err(|msg| Error::fits(path, msg))
    }
}

fn parse_header<R: Read>(reader: &mut R) -> std::result::Result<FitsHeader, String> {
    let mut header = FitsHeader::new();
    let mut card = [0u8; CARD_LEN];

    for _ in 0..MAX_CARDS {
        reader
            .read_exact(&mut card)
            .map_err(|e| format!("truncated header: {e}"))?;
        let keyword = String::from_utf8_lossy(&card[..8]);
        let keyword = keyword.trim();

        if keyword == "END" {
            return Ok(header);
        }
        if keyword.is_empty() || keyword == "COMMENT" || keyword == "HISTORY" {
            continue;
        }
        if &card[8..10] == b"= " {
            header.insert(keyword, parse_value(&String::from_utf8_lossy(&card[10..])));
        }
    }

    Err("no END card found".to_string())
}

fn parse_value(raw: &str) -> HeaderValue {
    let s = raw.trim();

    if let Some(rest) = s.strip_prefix('\'') {
        // '' is an escaped quote inside a string value
        let mut out = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    out.push('\'');
                    chars.next();
                    continue;
                }
                break;
            }
            out.push(c);
        }
        return HeaderValue::String(out.trim_end().to_string());
    }

    let value = s.split('/').next().unwrap_or("").trim();

    match value {
        "T" => return HeaderValue::Logical(true),
        "F" => return HeaderValue::Logical(false),
        _ => {}
    }
    if let Ok(i) = value.parse::<i64>() {
        return HeaderValue::Integer(i);
    }
    if let Ok(f) = value.replace(['D', 'd'], "E").parse::<f64>() {
        return HeaderValue::Float(f);
    }
    HeaderValue::String(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{write_fits, write_fits_gz};
    use tempfile::TempDir;

    #[test]
    fn test_parse_value_types() {
        assert_eq!(
            parse_value("'SCIENCE '           / image type"),
            HeaderValue::String("SCIENCE".into())
        );
        assert_eq!(parse_value("                  45 / sec"), HeaderValue::Integer(45));
        assert_eq!(parse_value("  30.5"), HeaderValue::Float(30.5));
        assert_eq!(parse_value("1.5D2"), HeaderValue::Float(150.0));
        assert_eq!(parse_value("                   T"), HeaderValue::Logical(true));
        assert_eq!(parse_value("'O''Neil'"), HeaderValue::String("O'Neil".into()));
    }

    #[test]
    fn test_read_header_plain_and_gzipped() {
        let temp = TempDir::new().unwrap();
        let cards = [
            ("IMGTYPE", HeaderValue::String("SCIENCE".into())),
            ("EXPTIME", HeaderValue::Float(45.0)),
            ("ONTARGET", HeaderValue::Logical(true)),
        ];

        let plain = temp.path().join("rc20240101_01_02_03.fits");
        write_fits(&plain, &cards).unwrap();
        let gz = temp.path().join("rc20240101_01_02_04.fits.gz");
        write_fits_gz(&gz, &cards).unwrap();

        for path in [plain, gz] {
            let header = FitsFileReader.read_header(&path).unwrap();
            assert_eq!(header.get_text("IMGTYPE").as_deref(), Some("SCIENCE"));
            assert_eq!(header.get_f64("exptime"), Some(45.0));
            assert!(header.get("ONTARGET").unwrap().as_bool());
        }
    }

    #[test]
    fn test_missing_key_is_none_not_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("rc20240101_01_02_03.fits");
        write_fits(&path, &[("EXPTIME", HeaderValue::Integer(10))]).unwrap();

        let value = FitsFileReader.get_header_field(&path, "IMGTYPE").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_truncated_file_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("partial.fits");
        std::fs::write(&path, b"SIMPLE  =                    T").unwrap();
        assert!(matches!(
            FitsFileReader.read_header(&path),
            Err(Error::Fits { .. })
        ));
    }
}
