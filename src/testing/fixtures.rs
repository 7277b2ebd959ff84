//! Minimal FITS files: a primary header and no data.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::fits::HeaderValue;

const CARD: usize = 80;
const BLOCK: usize = 2880;

fn card(keyword: &str, value: &HeaderValue) -> String {
    let rendered = match value {
        HeaderValue::String(s) => format!("'{:<8}'", s.replace('\'', "''")),
        HeaderValue::Integer(i) => format!("{i:>20}"),
        HeaderValue::Float(f) => format!("{:>20}", format!("{f:?}")),
        HeaderValue::Logical(b) => format!("{:>20}", if *b { "T" } else { "F" }),
    };
    format!("{:<8}= {}", keyword.to_uppercase(), rendered)
}

/// Header bytes: `SIMPLE`, `BITPIX`, `NAXIS`, the given cards, `END`,
/// padded to a whole block.
pub fn header_bytes(cards: &[(&str, HeaderValue)]) -> Vec<u8> {
    let mut lines = vec![
        card("SIMPLE", &HeaderValue::Logical(true)),
        card("BITPIX", &HeaderValue::Integer(16)),
        card("NAXIS", &HeaderValue::Integer(0)),
    ];
    lines.extend(cards.iter().map(|(k, v)| card(k, v)));
    lines.push("END".to_string());

    let mut bytes = Vec::with_capacity(BLOCK);
    for line in lines {
        let mut padded = line.into_bytes();
        padded.truncate(CARD);
        padded.resize(CARD, b' ');
        bytes.extend_from_slice(&padded);
    }
    let len = bytes.len().div_ceil(BLOCK) * BLOCK;
    bytes.resize(len, b' ');
    bytes
}

pub fn write_fits(path: &Path, cards: &[(&str, HeaderValue)]) -> std::io::Result<()> {
    std::fs::write(path, header_bytes(cards))
}

pub fn write_fits_gz(path: &Path, cards: &[(&str, HeaderValue)]) -> std::io::Result<()> {
    let mut encoder = GzEncoder::new(File::create(path)?, Compression::default());
    encoder.write_all(&header_bytes(cards))?;
    encoder.finish()?;
    Ok(())
}

/// A raw frame with the cards the loop reads.
pub fn write_raw_frame(
    path: &Path,
    imgtype: &str,
    object: &str,
    filter: &str,
    exptime: f64,
) -> std::io::Result<()> {
    write_fits(
        path,
        &[
            ("IMGTYPE", HeaderValue::String(imgtype.to_string())),
            ("OBJECT", HeaderValue::String(object.to_string())),
            ("FILTER", HeaderValue::String(filter.to_string())),
            ("EXPTIME", HeaderValue::Float(exptime)),
            ("REQ_ID", HeaderValue::String("1001".to_string())),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_is_block_aligned() {
        let bytes = header_bytes(&[("OBJECT", HeaderValue::String("M31".into()))]);
        assert_eq!(bytes.len(), BLOCK);
        assert!(bytes.starts_with(b"SIMPLE  =                    T"));
        let end = bytes
            .chunks(CARD)
            .position(|c| c.starts_with(b"END "))
            .unwrap();
        assert_eq!(end, 4);
    }
}
