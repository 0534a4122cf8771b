use crate::{constants::GZIP_MAGIC, utils::util::Result};
use flate2::read::MultiGzDecoder;
use std::{
    fs::File,
    io::{self, BufRead, BufReader, Read},
    path::Path,
};

/// A line-oriented byte source, already decompressed.
pub type VcfSource = Box<dyn BufRead + Send>;

/// Buffers `inner` and transparently decompresses it when its first bytes
/// carry the gzip signature. BGZF is a valid multi-member gzip stream, so it is
/// covered as well.
pub fn sniff_source<R: Read + Send + 'static>(inner: R) -> Result<VcfSource> {
    let mut buffered = BufReader::new(inner);
    let is_gzipped = buffered.fill_buf()?.starts_with(&GZIP_MAGIC);
    if is_gzipped {
        log::trace!("Input carries a gzip signature, decompressing");
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(buffered))))
    } else {
        Ok(Box::new(buffered))
    }
}

/// Opens `path` for reading; `-` is standard input.
pub fn open_vcf_source(path: &Path) -> Result<VcfSource> {
    if path == Path::new("-") {
        log::trace!("Reading VCF from stdin");
        return sniff_source(io::stdin());
    }
    let file = File::open(path).map_err(|error| {
        io::Error::new(
            error.kind(),
            format!("Failed to open file {}: {error}", path.display()),
        )
    })?;
    sniff_source(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VcfError;
    use flate2::{write::GzEncoder, Compression};
    use std::io::Write;
    use tempfile::tempdir;

    fn read_all(mut source: VcfSource) -> String {
        let mut text = String::new();
        source.read_to_string(&mut text).unwrap();
        text
    }

    #[test]
    fn plain_source_is_passed_through() {
        let source = sniff_source(io::Cursor::new(b"##fileformat=VCFv4.2\n".to_vec())).unwrap();
        assert_eq!(read_all(source), "##fileformat=VCFv4.2\n");
    }

    #[test]
    fn gzip_source_is_decompressed() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"##fileformat=VCFv4.2\n").unwrap();
        let compressed = encoder.finish().unwrap();
        let source = sniff_source(io::Cursor::new(compressed)).unwrap();
        assert_eq!(read_all(source), "##fileformat=VCFv4.2\n");
    }

    #[test]
    fn concatenated_gzip_members_are_read_in_full() {
        let mut compressed = Vec::new();
        for chunk in ["first\n", "second\n"] {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(chunk.as_bytes()).unwrap();
            compressed.extend(encoder.finish().unwrap());
        }
        let source = sniff_source(io::Cursor::new(compressed)).unwrap();
        assert_eq!(read_all(source), "first\nsecond\n");
    }

    #[test]
    fn empty_source_is_not_an_error() {
        let source = sniff_source(io::Cursor::new(Vec::new())).unwrap();
        assert_eq!(read_all(source), "");
    }

    #[test]
    fn open_missing_file_reports_path() {
        let temp_dir = tempdir().expect("temp dir should be created");
        let path = temp_dir.path().join("missing.vcf");
        let err = open_vcf_source(&path).err().unwrap();
        assert!(matches!(err, VcfError::Io(_)));
        assert!(err.to_string().contains("missing.vcf"));
    }
}
