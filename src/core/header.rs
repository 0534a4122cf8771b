use super::header_line::{CompoundHeaderLine, FieldSchema, HeaderLine};
use crate::{
    constants::{
        COLUMN_HEADER_PREFIX, FIXED_COLUMNS, FORMAT_COLUMN, NUM_FIXED_COLUMNS,
        PERCENT_ENCODING_VERSION,
    },
    error::VcfError,
    utils::util::{parse_fileformat_version, Result},
};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Info,
    Format,
}

impl FieldKind {
    pub fn key(&self) -> &'static str {
        match self {
            FieldKind::Info => "INFO",
            FieldKind::Format => "FORMAT",
        }
    }
}

/// Sample names from the column header line, in column order.
#[derive(Debug, Clone, Default)]
pub struct SamplesInfos {
    names: Vec<String>,
    name_to_idx: HashMap<String, usize>,
    has_format_column: bool,
}

impl PartialEq for SamplesInfos {
    fn eq(&self, other: &Self) -> bool {
        self.names == other.names && self.has_format_column == other.has_format_column
    }
}

impl SamplesInfos {
    pub fn new(names: Vec<String>) -> Result<Self> {
        let has_format_column = !names.is_empty();
        Self::with_format_column(names, has_format_column)
    }

    fn with_format_column(names: Vec<String>, has_format_column: bool) -> Result<Self> {
        let mut name_to_idx = HashMap::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            if name_to_idx.insert(name.clone(), idx).is_some() {
                return Err(crate::format_error!("Duplicate sample name: {name}"));
            }
        }
        Ok(SamplesInfos {
            names,
            name_to_idx,
            has_format_column,
        })
    }

    /// Parses the `#CHROM ...` column header line.
    pub fn parse_column_header(line: &str) -> Result<Self> {
        let columns: Vec<&str> = line.split('\t').collect();
        let first = columns
            .first()
            .and_then(|c| c.strip_prefix(COLUMN_HEADER_PREFIX))
            .unwrap_or_default();
        let fixed_ok = columns.len() >= NUM_FIXED_COLUMNS
            && first == FIXED_COLUMNS[0]
            && columns[1..NUM_FIXED_COLUMNS] == FIXED_COLUMNS[1..];
        if !fixed_ok {
            return Err(crate::format_error!(
                "Column header line must start with #{}, got {line:?}",
                FIXED_COLUMNS.join("\t")
            ));
        }
        match columns.get(NUM_FIXED_COLUMNS) {
            None => Self::with_format_column(Vec::new(), false),
            Some(&FORMAT_COLUMN) => Self::with_format_column(
                columns[NUM_FIXED_COLUMNS + 1..]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                true,
            ),
            Some(other) => Err(crate::format_error!(
                "Expected {FORMAT_COLUMN} as ninth column header, got {other:?}"
            )),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_idx.get(name).copied()
    }

    pub fn has_format_column(&self) -> bool {
        self.has_format_column
    }

    pub fn column_header(&self) -> String {
        let mut line = format!("{COLUMN_HEADER_PREFIX}{}", FIXED_COLUMNS.join("\t"));
        if self.has_format_column {
            line.push('\t');
            line.push_str(FORMAT_COLUMN);
            for name in &self.names {
                line.push('\t');
                line.push_str(name);
            }
        }
        line
    }
}

/// Ordered header lines plus sample names, indexed for schema lookups.
#[derive(Debug, Clone, Default)]
pub struct Header {
    lines: Vec<HeaderLine>,
    samples: SamplesInfos,
    info_idx: HashMap<String, usize>,
    format_idx: HashMap<String, usize>,
    filter_idx: HashMap<String, usize>,
    contig_idx: HashMap<String, usize>,
}

impl PartialEq for Header {
    fn eq(&self, other: &Self) -> bool {
        self.lines == other.lines && self.samples == other.samples
    }
}

impl Header {
    pub fn new(lines: Vec<HeaderLine>, samples: SamplesInfos) -> Self {
        let mut header = Header {
            samples,
            ..Default::default()
        };
        for line in lines {
            header.add_line(line);
        }
        header
    }

    /// Appends a line, keeping the first declaration of any duplicated ID for lookups.
    pub fn add_line(&mut self, line: HeaderLine) {
        let idx = self.lines.len();
        if let HeaderLine::Compound(compound) = &line {
            let index = match compound.key() {
                "INFO" => Some(&mut self.info_idx),
                "FORMAT" => Some(&mut self.format_idx),
                "FILTER" => Some(&mut self.filter_idx),
                "contig" => Some(&mut self.contig_idx),
                _ => None,
            };
            if let (Some(index), Some(id)) = (index, compound.id()) {
                if index.contains_key(id) {
                    log::warn!(
                        "Duplicate {} header line for ID {id}, keeping the first",
                        compound.key()
                    );
                } else {
                    index.insert(id.to_string(), idx);
                }
            }
        }
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[HeaderLine] {
        &self.lines
    }

    pub fn lines_with_key<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a HeaderLine> {
        self.lines.iter().filter(move |line| line.key() == key)
    }

    pub fn has_header_line(&self, key: &str, id: &str) -> bool {
        self.lines_with_key(key).any(|line| line.id() == Some(id))
    }

    pub fn samples(&self) -> &SamplesInfos {
        &self.samples
    }

    pub fn sample_names(&self) -> &[String] {
        self.samples.names()
    }

    pub fn set_samples(&mut self, samples: SamplesInfos) {
        self.samples = samples;
    }

    pub fn schema_for(&self, kind: FieldKind, id: &str) -> Option<&FieldSchema> {
        let index = match kind {
            FieldKind::Info => &self.info_idx,
            FieldKind::Format => &self.format_idx,
        };
        index
            .get(id)
            .and_then(|&idx| self.lines[idx].as_compound())
            .and_then(CompoundHeaderLine::schema)
    }

    pub fn require_schema(&self, kind: FieldKind, id: &str) -> Result<&FieldSchema> {
        self.schema_for(kind, id)
            .ok_or_else(|| VcfError::HeaderNotFound {
                kind: kind.key(),
                id: id.to_string(),
            })
    }

    pub fn filter_line(&self, id: &str) -> Option<&CompoundHeaderLine> {
        self.filter_idx
            .get(id)
            .and_then(|&idx| self.lines[idx].as_compound())
    }

    pub fn require_filter(&self, id: &str) -> Result<&CompoundHeaderLine> {
        self.filter_line(id).ok_or_else(|| VcfError::HeaderNotFound {
            kind: "FILTER",
            id: id.to_string(),
        })
    }

    pub fn contig_line(&self, id: &str) -> Option<&CompoundHeaderLine> {
        self.contig_idx
            .get(id)
            .and_then(|&idx| self.lines[idx].as_compound())
    }

    /// Value of the `##fileformat` line, if any.
    pub fn fileformat(&self) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            HeaderLine::Simple(simple) if simple.key == "fileformat" => Some(simple.value.as_str()),
            _ => None,
        })
    }

    /// Whether string values are percent-encoded (VCFv4.3 and later).
    pub fn uses_percent_encoding(&self) -> bool {
        self.fileformat()
            .and_then(parse_fileformat_version)
            .is_some_and(|version| version >= PERCENT_ENCODING_VERSION)
    }

    /// A copy without the lines matching any `(key, id)` pair. The original is untouched.
    pub fn without_lines(&self, remove: &[(&str, &str)]) -> Header {
        let lines = self
            .lines
            .iter()
            .filter(|line| {
                !remove
                    .iter()
                    .any(|(key, id)| line.key() == *key && line.id() == Some(*id))
            })
            .cloned()
            .collect();
        Header::new(lines, self.samples.clone())
    }

    /// A copy without the `##SAMPLE` lines for the given sample IDs.
    pub fn without_sample_lines(&self, ids: &[&str]) -> Header {
        let remove: Vec<(&str, &str)> = ids.iter().map(|id| ("SAMPLE", *id)).collect();
        self.without_lines(&remove)
    }

    /// Projects the header onto `names`, returning the new header and the
    /// original column index of each kept sample.
    pub fn subset_samples(&self, names: &[String]) -> Result<(Header, Vec<usize>)> {
        let indices = names
            .iter()
            .map(|name| {
                self.samples.index_of(name).ok_or_else(|| {
                    crate::format_error!("Sample {name} is not present in the header")
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let dropped: Vec<&str> = self
            .samples
            .names()
            .iter()
            .filter(|name| !names.contains(*name))
            .map(String::as_str)
            .collect();
        let mut header = self.without_sample_lines(&dropped);
        header.samples =
            SamplesInfos::with_format_column(names.to_vec(), self.samples.has_format_column)?;
        Ok((header, indices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::header_line::{parse_header_line, Number, ValueType};

    fn header_from(text: &[&str], samples: &[&str]) -> Header {
        let lines = text.iter().map(|l| parse_header_line(l).unwrap()).collect();
        let samples = SamplesInfos::new(samples.iter().map(|s| s.to_string()).collect()).unwrap();
        Header::new(lines, samples)
    }

    fn example_header() -> Header {
        header_from(
            &[
                "##fileformat=VCFv4.3",
                "##contig=<ID=20,length=62435964>",
                r#"##INFO=<ID=DP,Number=1,Type=Integer,Description="Total Depth">"#,
                r#"##FILTER=<ID=q10,Description="Quality below 10">"#,
                r#"##FORMAT=<ID=GT,Number=1,Type=String,Description="Genotype">"#,
                r#"##SAMPLE=<ID=NA00001,Description="first">"#,
                r#"##SAMPLE=<ID=NA00002,Description="second">"#,
            ],
            &["NA00001", "NA00002"],
        )
    }

    #[test]
    fn schema_lookup_by_kind() {
        let header = example_header();
        let dp = header.schema_for(FieldKind::Info, "DP").unwrap();
        assert_eq!(dp.number, Number::Fixed(1));
        assert_eq!(dp.ty, ValueType::Integer);
        assert!(header.schema_for(FieldKind::Format, "DP").is_none());
        assert!(header.schema_for(FieldKind::Format, "GT").is_some());
    }

    #[test]
    fn hard_lookups_raise_header_not_found() {
        let header = example_header();
        assert!(header.require_filter("q10").is_ok());
        let err = header.require_filter("q20").unwrap_err();
        assert!(matches!(err, VcfError::HeaderNotFound { kind: "FILTER", .. }));
        let err = header.require_schema(FieldKind::Info, "AF").unwrap_err();
        assert_eq!(err.to_string(), "No INFO header line found for ID AF");
    }

    #[test]
    fn fileformat_and_percent_encoding() {
        let header = example_header();
        assert_eq!(header.fileformat(), Some("VCFv4.3"));
        assert!(header.uses_percent_encoding());
        let old = header_from(&["##fileformat=VCFv4.2"], &[]);
        assert!(!old.uses_percent_encoding());
        assert!(!Header::default().uses_percent_encoding());
    }

    #[test]
    fn without_sample_lines_leaves_original_untouched() {
        let header = example_header();
        let derived = header.without_sample_lines(&["NA00002"]);
        assert_eq!(derived.lines().len(), header.lines().len() - 1);
        assert!(derived.has_header_line("SAMPLE", "NA00001"));
        assert!(!derived.has_header_line("SAMPLE", "NA00002"));
        assert!(header.has_header_line("SAMPLE", "NA00002"));
        assert!(derived.schema_for(FieldKind::Info, "DP").is_some());
    }

    #[test]
    fn subset_samples_reorders_and_projects() {
        let header = example_header();
        let (subset, indices) = header.subset_samples(&["NA00002".to_string()]).unwrap();
        assert_eq!(indices, vec![1]);
        assert_eq!(subset.sample_names(), ["NA00002"]);
        assert!(!subset.has_header_line("SAMPLE", "NA00001"));
        assert!(header.subset_samples(&["NA9".to_string()]).is_err());
    }

    #[test]
    fn first_duplicate_definition_wins() {
        let header = header_from(
            &[
                r#"##INFO=<ID=DP,Number=1,Type=Integer,Description="first">"#,
                r#"##INFO=<ID=DP,Number=.,Type=Float,Description="second">"#,
            ],
            &[],
        );
        assert_eq!(header.lines().len(), 2);
        assert_eq!(
            header.schema_for(FieldKind::Info, "DP").unwrap().description,
            "first"
        );
    }

    #[test]
    fn parses_column_header_with_samples() {
        let samples = SamplesInfos::parse_column_header(
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tNA00001\tNA00002\tNA00003",
        )
        .unwrap();
        assert_eq!(samples.names(), ["NA00001", "NA00002", "NA00003"]);
        assert_eq!(samples.index_of("NA00003"), Some(2));
        assert!(samples.has_format_column());
    }

    #[test]
    fn parses_column_header_without_samples() {
        let line = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO";
        let samples = SamplesInfos::parse_column_header(line).unwrap();
        assert!(samples.is_empty());
        assert!(!samples.has_format_column());
        assert_eq!(samples.column_header(), line);

        let line = "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT";
        let samples = SamplesInfos::parse_column_header(line).unwrap();
        assert!(samples.is_empty());
        assert_eq!(samples.column_header(), line);
    }

    #[test]
    fn rejects_bad_column_headers() {
        for line in [
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER",
            "CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO",
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tINFO\tFILTER",
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tS1",
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS1",
        ] {
            let err = SamplesInfos::parse_column_header(line).unwrap_err();
            assert!(matches!(err, VcfError::IncorrectFormat { .. }), "{line}");
        }
    }
}
