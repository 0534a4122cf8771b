use super::vcf_reader::VcfReader;
use crate::{
    core::{header::Header, record::Record},
    error::VcfError,
    utils::util::Result,
};
use std::path::Path;

pub type RecordIter = Box<dyn Iterator<Item = Result<Record>>>;

/// A source of VCF data. Every backend yields the same header and record model.
pub trait Backend {
    fn name(&self) -> &'static str;

    /// Opens `path` (`-` for stdin) and returns its header and a single-pass record stream.
    fn open(&self, path: &Path) -> Result<(Header, RecordIter)>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendKind {
    /// Built-in text parser for VCF and gzip/BGZF-compressed VCF
    #[default]
    Text,
    /// htslib, adds BCF input
    Htslib,
}

/// Whether this build carries the htslib backend.
pub fn htslib_enabled() -> bool {
    cfg!(feature = "htslib")
}

pub fn select(kind: BackendKind) -> Result<Box<dyn Backend>> {
    match kind {
        BackendKind::Text => Ok(Box::new(TextBackend)),
        #[cfg(feature = "htslib")]
        BackendKind::Htslib => Ok(Box::new(htslib::HtslibBackend)),
        #[cfg(not(feature = "htslib"))]
        BackendKind::Htslib => Err(VcfError::BackendUnavailable("htslib")),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextBackend;

impl Backend for TextBackend {
    fn name(&self) -> &'static str {
        "text"
    }

    fn open(&self, path: &Path) -> Result<(Header, RecordIter)> {
        let reader = VcfReader::from_path(path)?;
        let header = reader.header().clone();
        Ok((header, Box::new(reader)))
    }
}

#[cfg(feature = "htslib")]
pub mod htslib {
    use super::{Backend, RecordIter};
    use crate::{
        core::{
            header::{Header, SamplesInfos},
            header_line::HeaderLine,
            record::Record,
        },
        error::VcfError,
        io::vcf_reader::RecordParser,
        utils::util::Result,
    };
    use rust_htslib::bcf::{self, header::HeaderRecord, Read};
    use std::path::Path;

    /// Reads VCF, VCF.gz and BCF through htslib, then maps each record onto the
    /// text model by way of its VCF rendering.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct HtslibBackend;

    fn unquote(value: &str) -> String {
        match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
            Some(inner) => inner.replace("\\\"", "\"").replace("\\\\", "\\"),
            None => value.to_string(),
        }
    }

    fn convert_header(view: &bcf::header::HeaderView) -> Result<Header> {
        let mut lines = Vec::new();
        for record in view.header_records() {
            let line = match record {
                HeaderRecord::Generic { key, value } => HeaderLine::simple(&key, &value),
                HeaderRecord::Filter { key, values }
                | HeaderRecord::Info { key, values }
                | HeaderRecord::Format { key, values }
                | HeaderRecord::Contig { key, values }
                | HeaderRecord::Structured { key, values } => HeaderLine::compound(
                    &key,
                    values
                        .iter()
                        .filter(|(k, _)| k.as_str() != "IDX")
                        .map(|(k, v)| (k.clone(), unquote(v))),
                )?,
            };
            lines.push(line);
        }
        let samples = view
            .samples()
            .iter()
            .map(|s| String::from_utf8_lossy(s).into_owned())
            .collect();
        Ok(Header::new(lines, SamplesInfos::new(samples)?))
    }

    struct HtslibRecords {
        reader: bcf::Reader,
        record: bcf::Record,
        header: Header,
        parser: RecordParser,
        done: bool,
    }

    impl Iterator for HtslibRecords {
        type Item = Result<Record>;

        fn next(&mut self) -> Option<Self::Item> {
            if self.done {
                return None;
            }
            let result = match self.reader.read(&mut self.record)? {
                Ok(()) => self
                    .record
                    .to_vcf_string()
                    .map_err(VcfError::from)
                    .and_then(|line| self.parser.parse(&self.header, line.trim_end())),
                Err(error) => Err(error.into()),
            };
            if result.is_err() {
                self.done = true;
            }
            Some(result)
        }
    }

    impl Backend for HtslibBackend {
        fn name(&self) -> &'static str {
            "htslib"
        }

        fn open(&self, path: &Path) -> Result<(Header, RecordIter)> {
            log::trace!("Opening {} with htslib", path.display());
            let reader = if path == Path::new("-") {
                bcf::Reader::from_stdin()?
            } else {
                bcf::Reader::from_path(path)?
            };
            let header = convert_header(reader.header())?;
            let record = reader.empty_record();
            let records = HtslibRecords {
                reader,
                record,
                header: header.clone(),
                parser: RecordParser::new(),
                done: false,
            };
            Ok((header, Box::new(records)))
        }
    }

}
