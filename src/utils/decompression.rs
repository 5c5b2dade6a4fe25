#[cfg(feature = "compression-gzip")]
use std::io::Read;

use anyhow::Result;
use bytes::Bytes;
#[cfg(feature = "compression-gzip")]
use anyhow::Context;
#[cfg(feature = "compression-gzip")]
use flate2::read::MultiGzDecoder;

use crate::assets::AssetKind;

/// Compression formats detected by magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    Gzip,
    Uncompressed,
}

/// Decompression for mirrored assets
pub struct DecompressionService;

impl DecompressionService {
    /// Detect compression format using magic bytes
    pub fn detect_compression_format(data: &[u8]) -> CompressionFormat {
        match infer::get(data) {
            Some(kind) if kind.mime_type() == "application/gzip" => CompressionFormat::Gzip,
            _ => CompressionFormat::Uncompressed,
        }
    }

    /// Decode asset content according to its declared kind.
    ///
    /// The suffix decides, not the content: a `.csv` asset is stored as-is
    /// even if it happens to start with gzip magic bytes.
    pub fn decompress_asset(kind: AssetKind, data: Bytes) -> Result<Vec<u8>> {
        match kind {
            AssetKind::Csv => Ok(data.to_vec()),
            AssetKind::Gzip => Self::decompress_gzip(data),
        }
    }

    /// Whether the magic bytes agree with the declared kind
    pub fn matches_declared_kind(kind: AssetKind, data: &[u8]) -> bool {
        let detected = Self::detect_compression_format(data);
        match kind {
            AssetKind::Csv => detected == CompressionFormat::Uncompressed,
            AssetKind::Gzip => detected == CompressionFormat::Gzip,
        }
    }

    /// Every member of a concatenated gzip stream is decoded
    #[cfg(feature = "compression-gzip")]
    fn decompress_gzip(data: Bytes) -> Result<Vec<u8>> {
        let mut decoder = MultiGzDecoder::new(data.as_ref());
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .context("Failed to decompress gzip data")?;
        Ok(decompressed)
    }

    #[cfg(not(feature = "compression-gzip"))]
    fn decompress_gzip(_data: Bytes) -> Result<Vec<u8>> {
        anyhow::bail!("gzip support not compiled in (enable the compression-gzip feature)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_detect_uncompressed() {
        let data = b"Phone|Lang\n15551234567|en\n";
        let format = DecompressionService::detect_compression_format(data);
        assert_eq!(format, CompressionFormat::Uncompressed);
    }

    #[test]
    fn test_detect_and_decompress_gzip() {
        let plain = b"Phone|Lang\n15551234567|en\n";
        let compressed = gzip(plain);

        assert_eq!(
            DecompressionService::detect_compression_format(&compressed),
            CompressionFormat::Gzip
        );

        let decompressed =
            DecompressionService::decompress_asset(AssetKind::Gzip, Bytes::from(compressed))
                .unwrap();
        assert_eq!(decompressed, plain);
    }

    #[test]
    fn test_concatenated_members_are_all_decoded() {
        let mut concatenated = gzip(b"Phone|Lang\n1|en\n");
        concatenated.extend(gzip(b"2|fr\n"));

        let decompressed =
            DecompressionService::decompress_asset(AssetKind::Gzip, Bytes::from(concatenated))
                .unwrap();
        assert_eq!(decompressed, b"Phone|Lang\n1|en\n2|fr\n");
    }

    #[test]
    fn test_declared_kind_against_magic_bytes() {
        let compressed = gzip(b"Phone|Lang\n");
        assert!(DecompressionService::matches_declared_kind(AssetKind::Gzip, &compressed));
        assert!(!DecompressionService::matches_declared_kind(AssetKind::Csv, &compressed));
        assert!(DecompressionService::matches_declared_kind(AssetKind::Csv, b"Phone|Lang\n"));
        assert!(!DecompressionService::matches_declared_kind(AssetKind::Gzip, b"Phone|Lang\n"));
    }

    #[test]
    fn test_csv_asset_passes_through() {
        let compressed = gzip(b"abc");
        let stored =
            DecompressionService::decompress_asset(AssetKind::Csv, Bytes::from(compressed.clone()))
                .unwrap();
        assert_eq!(stored, compressed);
    }

    #[test]
    fn test_corrupt_gzip_is_an_error() {
        let result = DecompressionService::decompress_asset(
            AssetKind::Gzip,
            Bytes::from_static(b"definitely not gzip"),
        );
        assert!(result.is_err());
    }
}
