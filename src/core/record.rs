use super::{
    allele::{AlleleKind, AltAllele},
    coercion::{FieldValue, Spellings, Value},
};
use crate::constants::{
    DEFAULT_PLOIDY, FILTERED_KEY, FILTER_SEPARATOR, GENOTYPE_KEY, MISSING_VALUE, PASS_FILTER,
    PHASED_SEPARATOR, UNPHASED_SEPARATOR,
};
use indexmap::IndexMap;
use std::{
    collections::{BTreeSet, HashSet},
    fmt,
};

/// Record-level classification over all ALT alleles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Single(AlleleKind),
    /// More than one distinct allele kind among the ALTs.
    Mixed,
}

/// One data line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub chrom: String,
    /// 1-based.
    pub pos: u64,
    pub id: Vec<String>,
    pub reference: String,
    pub alt: Vec<AltAllele>,
    pub qual: Option<f64>,
    /// Empty for a missing FILTER column, `["PASS"]` for a passing record.
    pub filter: Vec<String>,
    pub info: IndexMap<String, FieldValue>,
    pub format: Vec<String>,
    pub calls: Vec<Call>,
    /// Source text of `POS` and `QUAL` when not in canonical form.
    pub column_spellings: Spellings,
    /// Source text of INFO values, by key, when not in canonical form.
    pub info_spellings: Spellings,
}

impl Record {
    pub fn new(chrom: &str, pos: u64, reference: &str, alt: Vec<AltAllele>) -> Self {
        Record {
            chrom: chrom.to_string(),
            pos,
            reference: reference.to_string(),
            alt,
            ..Default::default()
        }
    }

    /// `None` when the record has no ALT alleles.
    pub fn kind(&self) -> Option<RecordKind> {
        let kinds: HashSet<AlleleKind> = self.alt.iter().map(AltAllele::kind).collect();
        match kinds.len() {
            0 => None,
            1 => self.alt.first().map(|a| RecordKind::Single(a.kind())),
            _ => Some(RecordKind::Mixed),
        }
    }

    pub fn is_snv(&self) -> bool {
        self.kind() == Some(RecordKind::Single(AlleleKind::Snv))
    }

    pub fn is_pass(&self) -> bool {
        self.filter.iter().any(|f| f == PASS_FILTER)
    }

    /// Adds a FILTER label. `PASS` replaces every other label, any other label
    /// removes `PASS`. Labels already present are not repeated.
    pub fn add_filter(&mut self, label: &str) {
        if label == PASS_FILTER {
            self.filter = vec![PASS_FILTER.to_string()];
            return;
        }
        self.filter.retain(|f| f != PASS_FILTER);
        if !self.filter.iter().any(|f| f == label) {
            self.filter.push(label.to_string());
        }
    }

    /// Appends a FORMAT key, giving every call `default` for it.
    pub fn add_format(&mut self, key: &str, default: FieldValue) {
        if self.format.iter().any(|k| k == key) {
            return;
        }
        self.format.push(key.to_string());
        for call in &mut self.calls {
            call.data.insert(key.to_string(), default.clone());
        }
    }

    pub fn call_for_sample(&self, name: &str) -> Option<&Call> {
        self.calls.iter().find(|c| c.sample == name)
    }

    /// Keeps the calls at `indices`, in that order.
    pub fn retain_calls(&mut self, indices: &[usize]) {
        let calls = std::mem::take(&mut self.calls);
        self.calls = indices.iter().filter_map(|&i| calls.get(i).cloned()).collect();
        if self.calls.is_empty() {
            self.format.clear();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Zygosity {
    HomRef,
    Het,
    HomAlt,
    /// At least one allele is a no-call, or there is no genotype.
    Indeterminate,
}

/// A parsed `GT` value. Separators are kept per position, mixed phasing is not normalised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Genotype {
    pub alleles: Vec<Option<usize>>,
    pub separators: Vec<char>,
}

impl Genotype {
    pub fn parse(s: &str) -> Option<Self> {
        let mut alleles = Vec::new();
        let mut separators = Vec::new();
        let mut rest = s;
        loop {
            let end = rest
                .find([PHASED_SEPARATOR, UNPHASED_SEPARATOR])
                .unwrap_or(rest.len());
            let token = &rest[..end];
            alleles.push(match token {
                MISSING_VALUE => None,
                _ => Some(token.parse().ok()?),
            });
            match rest[end..].chars().next() {
                Some(sep) => {
                    separators.push(sep);
                    rest = &rest[end + sep.len_utf8()..];
                }
                None => break,
            }
        }
        Some(Genotype {
            alleles,
            separators,
        })
    }

    pub fn ploidy(&self) -> usize {
        self.alleles.len()
    }

    /// True when there is at least one separator and all of them are `|`.
    pub fn is_phased(&self) -> bool {
        !self.separators.is_empty() && self.separators.iter().all(|&s| s == PHASED_SEPARATOR)
    }

    pub fn is_called(&self) -> bool {
        self.alleles.iter().all(Option::is_some)
    }

    pub fn zygosity(&self) -> Zygosity {
        let called: Option<Vec<usize>> = self.alleles.iter().copied().collect();
        let Some(called) = called else {
            return Zygosity::Indeterminate;
        };
        let distinct: BTreeSet<usize> = called.iter().copied().collect();
        match (distinct.len(), distinct.first()) {
            (_, None) => Zygosity::Indeterminate,
            (1, Some(0)) => Zygosity::HomRef,
            (1, Some(_)) => Zygosity::HomAlt,
            _ => Zygosity::Het,
        }
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, allele) in self.alleles.iter().enumerate() {
            if i > 0 {
                if let Some(sep) = self.separators.get(i - 1) {
                    write!(f, "{sep}")?;
                }
            }
            match allele {
                Some(idx) => write!(f, "{idx}")?,
                None => f.write_str(MISSING_VALUE)?,
            }
        }
        Ok(())
    }
}

/// Per-sample data of one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Call {
    pub sample: String,
    /// FORMAT key -> value. Keys truncated off the end of the sample column are absent.
    pub data: IndexMap<String, FieldValue>,
    /// Source text of values, by FORMAT key, when not in canonical form.
    pub spellings: Spellings,
}

impl Call {
    pub fn new(sample: &str) -> Self {
        Call {
            sample: sample.to_string(),
            ..Default::default()
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.data.get(key)
    }

    pub fn genotype(&self) -> Option<Genotype> {
        let gt = match self.data.get(GENOTYPE_KEY)? {
            FieldValue::Single(Value::String(s)) | FieldValue::Raw(s) => s.as_str(),
            FieldValue::Single(Value::Missing) => MISSING_VALUE,
            _ => return None,
        };
        Genotype::parse(gt)
    }

    /// Number of alleles in `GT`, or the diploid default.
    pub fn ploidy(&self) -> usize {
        self.genotype()
            .map(|gt| gt.ploidy())
            .unwrap_or(DEFAULT_PLOIDY)
    }

    pub fn is_called(&self) -> bool {
        self.genotype().is_some_and(|gt| gt.is_called())
    }

    pub fn is_phased(&self) -> bool {
        self.genotype().is_some_and(|gt| gt.is_phased())
    }

    pub fn zygosity(&self) -> Zygosity {
        self.genotype()
            .map(|gt| gt.zygosity())
            .unwrap_or(Zygosity::Indeterminate)
    }

    pub fn is_variant(&self) -> bool {
        matches!(self.zygosity(), Zygosity::Het | Zygosity::HomAlt)
    }

    /// The genotype spelled out as allele sequences. No-calls and indices
    /// beyond the ALT list are `None`.
    pub fn gt_bases(&self, reference: &str, alt: &[AltAllele]) -> Option<Vec<Option<String>>> {
        let gt = self.genotype()?;
        Some(
            gt.alleles
                .iter()
                .map(|allele| match allele {
                    Some(0) => Some(reference.to_string()),
                    Some(idx) => alt.get(idx - 1).map(|a| a.to_string()),
                    None => None,
                })
                .collect(),
        )
    }

    /// True when `FT` carries any label other than `PASS`.
    pub fn is_filtered(&self) -> bool {
        let labels: Vec<String> = match self.data.get(FILTERED_KEY) {
            Some(FieldValue::Single(v)) => vec![v.to_string()],
            Some(FieldValue::List(values)) => values.iter().map(|v| v.to_string()).collect(),
            Some(FieldValue::Raw(raw)) => vec![raw.clone()],
            _ => return false,
        };
        labels
            .iter()
            .flat_map(|l| l.split(FILTER_SEPARATOR))
            .any(|l| l != PASS_FILTER && l != MISSING_VALUE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::allele::classify;

    fn call_with_gt(gt: &str) -> Call {
        let mut call = Call::new("NA00001");
        call.data.insert(
            GENOTYPE_KEY.to_string(),
            FieldValue::Single(Value::String(gt.to_string())),
        );
        call
    }

    #[test]
    fn genotype_parsing_keeps_separators() {
        let gt = Genotype::parse("0|1/.").unwrap();
        assert_eq!(gt.alleles, vec![Some(0), Some(1), None]);
        assert_eq!(gt.separators, vec!['|', '/']);
        assert!(!gt.is_phased());
        assert_eq!(gt.to_string(), "0|1/.");

        let haploid = Genotype::parse("1").unwrap();
        assert_eq!(haploid.ploidy(), 1);
        assert!(!haploid.is_phased());

        assert!(Genotype::parse("0/x").is_none());
        assert!(Genotype::parse("").is_none());
        assert!(Genotype::parse("0/").is_none());
    }

    #[test]
    fn zygosity_classification() {
        assert_eq!(call_with_gt("0/0").zygosity(), Zygosity::HomRef);
        assert_eq!(call_with_gt("1/0").zygosity(), Zygosity::Het);
        assert_eq!(call_with_gt("1|2").zygosity(), Zygosity::Het);
        assert_eq!(call_with_gt("2/2").zygosity(), Zygosity::HomAlt);
        assert_eq!(call_with_gt("./1").zygosity(), Zygosity::Indeterminate);
        assert_eq!(call_with_gt(".").zygosity(), Zygosity::Indeterminate);
        assert_eq!(Call::new("x").zygosity(), Zygosity::Indeterminate);
    }

    #[test]
    fn call_helpers() {
        let call = call_with_gt("0|1");
        assert!(call.is_called());
        assert!(call.is_phased());
        assert!(call.is_variant());
        assert_eq!(call.ploidy(), 2);
        assert!(!call_with_gt("0/0").is_variant());
        assert_eq!(Call::new("x").ploidy(), DEFAULT_PLOIDY);
        assert_eq!(call_with_gt("1").ploidy(), 1);
    }

    #[test]
    fn gt_bases_resolves_alleles() {
        let alt = vec![classify("G", "A"), classify("G", "<DEL>")];
        let bases = call_with_gt("0/2").gt_bases("G", &alt).unwrap();
        assert_eq!(bases, vec![Some("G".to_string()), Some("<DEL>".to_string())]);
        let bases = call_with_gt("./3").gt_bases("G", &alt).unwrap();
        assert_eq!(bases, vec![None, None]);
    }

    #[test]
    fn filtered_calls() {
        let mut call = Call::new("x");
        assert!(!call.is_filtered());
        call.data.insert(
            FILTERED_KEY.to_string(),
            FieldValue::Single(Value::String("PASS".to_string())),
        );
        assert!(!call.is_filtered());
        call.data.insert(
            FILTERED_KEY.to_string(),
            FieldValue::Single(Value::String("PASS;q10".to_string())),
        );
        assert!(call.is_filtered());
    }

    #[test]
    fn record_kind_and_mixed() {
        let mut record = Record::new("1", 10, "A", vec![classify("A", "G")]);
        assert_eq!(record.kind(), Some(RecordKind::Single(AlleleKind::Snv)));
        assert!(record.is_snv());
        record.alt.push(classify("A", "C"));
        assert!(record.is_snv());
        record.alt.push(classify("A", "G]17:198982]"));
        assert_eq!(record.kind(), Some(RecordKind::Mixed));
        assert!(!record.is_snv());
        record.alt.clear();
        assert_eq!(record.kind(), None);
    }

    #[test]
    fn add_filter_pass_semantics() {
        let mut record = Record::default();
        record.add_filter("PASS");
        assert_eq!(record.filter, vec!["PASS"]);
        assert!(record.is_pass());
        record.add_filter("q10");
        record.add_filter("q10");
        assert_eq!(record.filter, vec!["q10"]);
        record.add_filter("s50");
        assert_eq!(record.filter, vec!["q10", "s50"]);
        record.add_filter("PASS");
        assert_eq!(record.filter, vec!["PASS"]);
    }

    #[test]
    fn add_format_and_retain_calls() {
        let mut record = Record::new("1", 10, "A", vec![classify("A", "G")]);
        record.format = vec![GENOTYPE_KEY.to_string()];
        record.calls = vec![call_with_gt("0/0"), call_with_gt("0/1"), call_with_gt("1/1")];
        record.calls[1].sample = "NA00002".to_string();
        record.calls[2].sample = "NA00003".to_string();

        record.add_format("DP", FieldValue::Single(Value::Missing));
        assert_eq!(record.format, vec!["GT", "DP"]);
        assert!(record
            .calls
            .iter()
            .all(|c| c.get("DP") == Some(&FieldValue::Single(Value::Missing))));

        assert_eq!(
            record.call_for_sample("NA00002").and_then(|c| c.genotype()),
            Genotype::parse("0/1")
        );
        assert!(record.call_for_sample("nobody").is_none());

        record.retain_calls(&[2, 0]);
        let names: Vec<_> = record.calls.iter().map(|c| c.sample.as_str()).collect();
        assert_eq!(names, vec!["NA00003", "NA00001"]);
        record.retain_calls(&[]);
        assert!(record.format.is_empty());
    }
}
