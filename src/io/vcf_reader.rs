use super::readers::{open_vcf_source, sniff_source, VcfSource};
use crate::{
    constants::{
        ALT_SEPARATOR, COLUMN_HEADER_PREFIX, FILTER_SEPARATOR, FORMAT_SEPARATOR, GENOTYPE_KEY,
        ID_SEPARATOR, INFO_SEPARATOR, META_PREFIX, MISSING_VALUE, NUM_FIXED_COLUMNS, PASS_FILTER,
    },
    core::{
        allele::{classify, AltAllele},
        coercion::{
            coerce, format_field, format_float, split_values, CoercionContext, FieldValue,
            Spellings,
        },
        header::{FieldKind, Header, SamplesInfos},
        header_line::parse_header_line,
        record::{Call, Genotype, Record},
    },
    utils::util::Result,
};
use indexmap::IndexMap;
use std::{
    collections::HashSet,
    io::{BufRead, Read},
    path::Path,
};

/// Turns data lines into records against a fixed header.
///
/// Keys and FILTER labels without a header declaration are passed through and
/// warned about once per parser.
#[derive(Debug, Default)]
pub struct RecordParser {
    warned: HashSet<(&'static str, String)>,
}

impl RecordParser {
    pub fn new() -> Self {
        Self::default()
    }

    fn warn_once(&mut self, kind: &'static str, id: &str) {
        if self.warned.insert((kind, id.to_string())) {
            log::warn!("{kind} {id} is not declared in the header, passing it through");
        }
    }

    /// Parses one data line (without its line terminator). Errors carry no line number.
    pub fn parse(&mut self, header: &Header, line: &str) -> Result<Record> {
        let columns: Vec<&str> = line.split('\t').collect();
        let samples = header.samples();
        let expected = if samples.has_format_column() {
            NUM_FIXED_COLUMNS + 1 + samples.len()
        } else {
            NUM_FIXED_COLUMNS
        };
        if columns.len() != expected {
            return Err(crate::record_error!(
                "expected {expected} tab-separated columns, got {}",
                columns.len()
            ));
        }

        let chrom = columns[0];
        if chrom.is_empty() {
            return Err(crate::record_error!("empty chromosome").with_field("CHROM"));
        }
        let mut column_spellings = Spellings::default();
        let pos: u64 = columns[1].parse().map_err(|_| {
            crate::record_error!("invalid position {:?}", columns[1]).with_field("POS")
        })?;
        column_spellings.remember("POS", &pos.to_string(), columns[1]);
        let id = split_or_empty(columns[2], ID_SEPARATOR);
        let reference = columns[3];
        if reference.is_empty() {
            return Err(crate::record_error!("empty reference allele").with_field("REF"));
        }
        let alt: Vec<AltAllele> = split_or_empty(columns[4], ALT_SEPARATOR)
            .iter()
            .map(|token| classify(reference, token))
            .collect();
        let qual = match columns[5] {
            MISSING_VALUE => None,
            raw => {
                let qual = raw.parse::<f64>().map_err(|_| {
                    crate::record_error!("invalid quality {raw:?}").with_field("QUAL")
                })?;
                column_spellings.remember("QUAL", &format_float(qual), raw);
                Some(qual)
            }
        };
        let filter = split_or_empty(columns[6], FILTER_SEPARATOR);
        for label in &filter {
            if label != PASS_FILTER && header.filter_line(label).is_none() {
                self.warn_once("FILTER", label);
            }
        }

        let percent_encoded = header.uses_percent_encoding();
        let ctx = CoercionContext::new(alt.len(), percent_encoded);
        let (info, info_spellings) = self.parse_info(header, columns[7], &ctx)?;

        let (format, calls) = if samples.has_format_column() {
            let format = split_or_empty(columns[8], FORMAT_SEPARATOR);
            if let Some((_, key)) = format
                .iter()
                .enumerate()
                .find(|(i, key)| format[..*i].contains(key))
            {
                return Err(
                    crate::record_error!("FORMAT key appears more than once").with_field(key),
                );
            }
            let calls = samples
                .names()
                .iter()
                .zip(&columns[NUM_FIXED_COLUMNS + 1..])
                .map(|(name, column)| self.parse_call(header, name, &format, column, &ctx))
                .collect::<Result<Vec<_>>>()?;
            (format, calls)
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(Record {
            chrom: chrom.to_string(),
            pos,
            id,
            reference: reference.to_string(),
            alt,
            qual,
            filter,
            info,
            format,
            calls,
            column_spellings,
            info_spellings,
        })
    }

    fn parse_info(
        &mut self,
        header: &Header,
        column: &str,
        ctx: &CoercionContext,
    ) -> Result<(IndexMap<String, FieldValue>, Spellings)> {
        let mut info = IndexMap::new();
        let mut spellings = Spellings::default();
        if column == MISSING_VALUE {
            return Ok((info, spellings));
        }
        for entry in column.split(INFO_SEPARATOR) {
            let (key, raw) = match entry.split_once('=') {
                Some((key, raw)) => (key, Some(raw)),
                None => (entry, None),
            };
            if key.is_empty() {
                return Err(crate::record_error!("empty INFO key in {column:?}").with_field("INFO"));
            }
            let value = match header.schema_for(FieldKind::Info, key) {
                Some(schema) => {
                    let tokens = raw.map(split_values).unwrap_or_default();
                    coerce(schema, &tokens, ctx)?
                }
                None => {
                    self.warn_once("INFO", key);
                    match raw {
                        Some(raw) => FieldValue::Raw(raw.to_string()),
                        None => FieldValue::Flag(true),
                    }
                }
            };
            if info.contains_key(key) {
                return Err(
                    crate::record_error!("INFO key appears more than once").with_field(key),
                );
            }
            if let (Some(raw), Some(canonical)) = (raw, format_field(&value, ctx.percent_encoded)) {
                spellings.remember(key, &canonical, raw);
            }
            info.insert(key.to_string(), value);
        }
        Ok((info, spellings))
    }

    fn parse_call(
        &mut self,
        header: &Header,
        sample: &str,
        format: &[String],
        column: &str,
        ctx: &CoercionContext,
    ) -> Result<Call> {
        if format.is_empty() {
            if column != MISSING_VALUE {
                return Err(crate::record_error!(
                    "sample {sample} has data {column:?} but the FORMAT column is empty"
                ));
            }
            return Ok(Call::new(sample));
        }
        let tokens: Vec<&str> = column.split(FORMAT_SEPARATOR).collect();
        if tokens.len() > format.len() {
            return Err(crate::record_error!(
                "sample {sample} has {} values but FORMAT declares {} keys",
                tokens.len(),
                format.len()
            ));
        }
        let ploidy = format
            .iter()
            .position(|key| key == GENOTYPE_KEY)
            .and_then(|idx| tokens.get(idx))
            .and_then(|gt| Genotype::parse(gt))
            .map(|gt| gt.ploidy());
        let ctx = match ploidy {
            Some(ploidy) => ctx.with_ploidy(ploidy),
            None => *ctx,
        };

        let mut call = Call::new(sample);
        for (key, raw) in format.iter().zip(&tokens) {
            let value = match header.schema_for(FieldKind::Format, key) {
                Some(schema) => coerce(schema, &split_values(raw), &ctx)?,
                None => {
                    self.warn_once("FORMAT", key);
                    FieldValue::Raw(raw.to_string())
                }
            };
            if let Some(canonical) = format_field(&value, ctx.percent_encoded) {
                call.spellings.remember(key, &canonical, raw);
            }
            call.data.insert(key.clone(), value);
        }
        Ok(call)
    }
}

fn split_or_empty(column: &str, separator: char) -> Vec<String> {
    if column == MISSING_VALUE {
        Vec::new()
    } else {
        column.split(separator).map(str::to_string).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    Header,
    Body,
    Closed,
}

/// Streaming VCF reader. The header is parsed on construction, records are
/// yielded lazily and only once.
pub struct VcfReader {
    source: Option<VcfSource>,
    header: Header,
    parser: RecordParser,
    state: ReaderState,
    buf: String,
    line_no: usize,
    records_read: usize,
}

impl VcfReader {
    pub fn new(source: VcfSource) -> Result<Self> {
        let mut reader = VcfReader {
            source: Some(source),
            header: Header::default(),
            parser: RecordParser::new(),
            state: ReaderState::Header,
            buf: String::new(),
            line_no: 0,
            records_read: 0,
        };
        reader.read_header()?;
        Ok(reader)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        log::trace!("Start loading VCF {}", path.display());
        Self::new(open_vcf_source(path)?)
    }

    pub fn from_reader<R: Read + Send + 'static>(inner: R) -> Result<Self> {
        Self::new(sniff_source(inner)?)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// 1-based number of the last line read.
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Releases the underlying stream. Further iteration yields nothing.
    pub fn close(&mut self) {
        if self.source.take().is_some() {
            log::trace!("Closed VCF reader after {} line(s)", self.line_no);
        }
        self.state = ReaderState::Closed;
    }

    fn read_line(&mut self) -> Result<bool> {
        let Some(source) = self.source.as_mut() else {
            return Ok(false);
        };
        self.buf.clear();
        if source.read_line(&mut self.buf)? == 0 {
            return Ok(false);
        }
        self.line_no += 1;
        Ok(true)
    }

    fn current_line(&self) -> &str {
        self.buf.trim_end_matches(['\n', '\r'])
    }

    fn read_header(&mut self) -> Result<()> {
        let mut lines = Vec::new();
        loop {
            if !self.read_line()? {
                return Err(crate::format_error!("missing #CHROM column header line")
                    .with_line(self.line_no + 1));
            }
            let line = self.current_line();
            if line.is_empty() {
                continue;
            }
            if line.starts_with(META_PREFIX) {
                let parsed = parse_header_line(line).map_err(|e| e.with_line(self.line_no))?;
                lines.push(parsed);
            } else if line.starts_with(COLUMN_HEADER_PREFIX) {
                let samples =
                    SamplesInfos::parse_column_header(line).map_err(|e| e.with_line(self.line_no))?;
                self.header = Header::new(lines, samples);
                self.state = ReaderState::Body;
                break;
            } else {
                return Err(
                    crate::format_error!("data line before #CHROM column header line")
                        .with_line(self.line_no),
                );
            }
        }
        if self.header.fileformat().is_none() {
            log::warn!("VCF header has no ##fileformat line");
        }
        log::debug!(
            "Parsed VCF header: {} line(s), {} sample(s)",
            self.header.lines().len(),
            self.header.samples().len()
        );
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            if !self.read_line()? {
                return Ok(None);
            }
            let line = self.buf.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                continue;
            }
            if line.starts_with(COLUMN_HEADER_PREFIX) {
                let what = if line.starts_with(META_PREFIX) {
                    "meta-information line"
                } else {
                    "column header line"
                };
                return Err(crate::format_error!("{what} after the header").with_line(self.line_no));
            }
            let line_no = self.line_no;
            return self
                .parser
                .parse(&self.header, line)
                .map(Some)
                .map_err(|e| e.with_line(line_no));
        }
    }
}

impl Iterator for VcfReader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != ReaderState::Body {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => {
                self.records_read += 1;
                Some(Ok(record))
            }
            Ok(None) => {
                log::debug!("Finished reading {} record(s)", self.records_read);
                self.close();
                None
            }
            Err(error) => {
                self.close();
                Some(Err(error))
            }
        }
    }
}

/// Parses a complete header from `text` (meta lines and the column header line).
pub fn parse_header_text(text: &str) -> Result<Header> {
    let reader = VcfReader::from_reader(std::io::Cursor::new(text.as_bytes().to_vec()))?;
    Ok(reader.header)
}

impl std::fmt::Debug for VcfReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VcfReader")
            .field("state", &self.state)
            .field("line_no", &self.line_no)
            .field("records_read", &self.records_read)
            .finish()
    }
}
