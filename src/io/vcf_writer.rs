use crate::{
    constants::{
        ALT_SEPARATOR, FILTER_SEPARATOR, FORMAT_SEPARATOR, ID_SEPARATOR, INFO_SEPARATOR,
        MISSING_VALUE,
    },
    core::{
        coercion::{format_field, format_float, FieldValue},
        header::Header,
        record::{Call, Record},
    },
    utils::util::Result,
};
use flate2::{write::GzEncoder, Compression};
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputType {
    Vcf { is_uncompressed: bool },
}

impl OutputType {
    pub fn infer_from_extension(path: &str) -> OutputType {
        let path_lower = path.to_lowercase();
        match path_lower.as_str() {
            s if s.ends_with(".gz") || s.ends_with(".bgz") => OutputType::Vcf {
                is_uncompressed: false,
            },
            _ => OutputType::Vcf {
                is_uncompressed: true,
            },
        }
    }
}

/// Byte sink for [`VcfWriter::from_path`] and [`VcfWriter::to_stdout`].
pub enum OutputSink {
    Plain(BufWriter<Box<dyn Write + Send>>),
    Gzip(GzEncoder<BufWriter<Box<dyn Write + Send>>>),
}

impl OutputSink {
    fn new(inner: Box<dyn Write + Send>, output_type: OutputType) -> Self {
        let buffered = BufWriter::new(inner);
        match output_type {
            OutputType::Vcf {
                is_uncompressed: true,
            } => OutputSink::Plain(buffered),
            OutputType::Vcf {
                is_uncompressed: false,
            } => OutputSink::Gzip(GzEncoder::new(buffered, Compression::default())),
        }
    }

    /// Flushes and, for gzip output, writes the stream trailer.
    pub fn finish(self) -> io::Result<()> {
        match self {
            OutputSink::Plain(mut writer) => writer.flush(),
            OutputSink::Gzip(encoder) => encoder.finish()?.flush(),
        }
    }
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputSink::Plain(writer) => writer.write(buf),
            OutputSink::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputSink::Plain(writer) => writer.flush(),
            OutputSink::Gzip(encoder) => encoder.flush(),
        }
    }
}

/// Writes a header on construction, then one line per record.
pub struct VcfWriter<W: Write> {
    inner: W,
    header: Header,
    percent_encoded: bool,
    records_written: usize,
}

impl VcfWriter<OutputSink> {
    /// Creates `path`, gzip-compressing when it ends in `.gz` or `.bgz`.
    pub fn from_path<P: AsRef<Path>>(path: P, header: Header) -> Result<Self> {
        let path = path.as_ref();
        let output_type = OutputType::infer_from_extension(&path.to_string_lossy());
        log::trace!("{:?}", &output_type);
        let file = File::create(path).map_err(|error| {
            io::Error::new(
                error.kind(),
                format!("Failed to create output {}: {error}", path.display()),
            )
        })?;
        Self::new(OutputSink::new(Box::new(file), output_type), header)
    }

    pub fn to_stdout(header: Header, output_type: OutputType) -> Result<Self> {
        Self::new(OutputSink::new(Box::new(io::stdout()), output_type), header)
    }

    /// Flushes all output, completing the gzip stream if any.
    pub fn finish(self) -> Result<()> {
        Ok(self.close()?.finish()?)
    }
}

impl<W: Write> VcfWriter<W> {
    pub fn new(inner: W, header: Header) -> Result<Self> {
        let mut writer = VcfWriter {
            inner,
            percent_encoded: header.uses_percent_encoding(),
            header,
            records_written: 0,
        };
        writer.write_header()?;
        Ok(writer)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    fn write_header(&mut self) -> Result<()> {
        for line in self.header.lines() {
            writeln!(self.inner, "{line}")?;
        }
        writeln!(self.inner, "{}", self.header.samples().column_header())?;
        Ok(())
    }

    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        let line = self.format_record(record)?;
        self.inner.write_all(line.as_bytes())?;
        self.inner.write_all(b"\n")?;
        self.records_written += 1;
        Ok(())
    }

    /// Flushes and hands back the underlying writer.
    pub fn close(mut self) -> Result<W> {
        self.inner.flush()?;
        log::debug!("Wrote {} record(s)", self.records_written);
        Ok(self.inner)
    }

    /// Renders `record` as one data line without the line terminator.
    pub fn format_record(&self, record: &Record) -> Result<String> {
        let samples = self.header.samples();
        if samples.has_format_column() {
            if record.calls.len() != samples.len() {
                return Err(crate::record_error!(
                    "record at {}:{} has {} call(s), header declares {} sample(s)",
                    record.chrom,
                    record.pos,
                    record.calls.len(),
                    samples.len()
                ));
            }
        } else if !record.calls.is_empty() {
            return Err(crate::record_error!(
                "record at {}:{} has calls, header declares no samples",
                record.chrom,
                record.pos
            ));
        }

        let mut line = String::with_capacity(256);
        line.push_str(&record.chrom);
        line.push('\t');
        line.push_str(record.column_spellings.render("POS", &record.pos.to_string()));
        line.push('\t');
        push_joined(&mut line, &record.id, ID_SEPARATOR);
        line.push('\t');
        line.push_str(&record.reference);
        line.push('\t');
        if record.alt.is_empty() {
            line.push_str(MISSING_VALUE);
        } else {
            for (i, allele) in record.alt.iter().enumerate() {
                if i > 0 {
                    line.push(ALT_SEPARATOR);
                }
                line.push_str(&allele.to_string());
            }
        }
        line.push('\t');
        match record.qual {
            Some(qual) => {
                line.push_str(record.column_spellings.render("QUAL", &format_float(qual)))
            }
            None => line.push_str(MISSING_VALUE),
        }
        line.push('\t');
        push_joined(&mut line, &record.filter, FILTER_SEPARATOR);
        line.push('\t');
        self.push_info(&mut line, record);

        if samples.has_format_column() {
            line.push('\t');
            push_joined(&mut line, &record.format, FORMAT_SEPARATOR);
            for call in &record.calls {
                line.push('\t');
                self.push_call(&mut line, &record.format, call);
            }
        }
        Ok(line)
    }

    fn push_info(&self, line: &mut String, record: &Record) {
        let mut written = 0;
        for (key, value) in &record.info {
            if matches!(value, FieldValue::Flag(false)) {
                continue;
            }
            if written > 0 {
                line.push(INFO_SEPARATOR);
            }
            line.push_str(key);
            if let Some(text) = format_field(value, self.percent_encoded) {
                line.push('=');
                line.push_str(record.info_spellings.render(key, &text));
            }
            written += 1;
        }
        if written == 0 {
            line.push_str(MISSING_VALUE);
        }
    }

    fn push_call(&self, line: &mut String, format: &[String], call: &Call) {
        // Keys absent at the end are dropped, absent keys before a present one become `.`.
        let present = format
            .iter()
            .rposition(|key| call.data.contains_key(key))
            .map_or(0, |idx| idx + 1);
        if present == 0 {
            line.push_str(MISSING_VALUE);
            return;
        }
        for (i, key) in format[..present].iter().enumerate() {
            if i > 0 {
                line.push(FORMAT_SEPARATOR);
            }
            match call
                .data
                .get(key)
                .and_then(|value| format_field(value, self.percent_encoded))
            {
                Some(text) => line.push_str(call.spellings.render(key, &text)),
                None => line.push_str(MISSING_VALUE),
            }
        }
    }
}

fn push_joined(line: &mut String, items: &[String], separator: char) {
    if items.is_empty() {
        line.push_str(MISSING_VALUE);
        return;
    }
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            line.push(separator);
        }
        line.push_str(item);
    }
}
