pub const META_PREFIX: &str = "##";
pub const COLUMN_HEADER_PREFIX: &str = "#";
pub const MISSING_VALUE: &str = ".";
pub const PASS_FILTER: &str = "PASS";
pub const GENOTYPE_KEY: &str = "GT";
pub const FILTERED_KEY: &str = "FT";

/// The eight mandatory columns of the column header line.
pub const FIXED_COLUMNS: [&str; 8] = [
    "CHROM", "POS", "ID", "REF", "ALT", "QUAL", "FILTER", "INFO",
];
pub const FORMAT_COLUMN: &str = "FORMAT";
pub const NUM_FIXED_COLUMNS: usize = FIXED_COLUMNS.len();

pub const ID_SEPARATOR: char = ';';
pub const FILTER_SEPARATOR: char = ';';
pub const INFO_SEPARATOR: char = ';';
pub const VALUE_SEPARATOR: char = ',';
pub const ALT_SEPARATOR: char = ',';
pub const FORMAT_SEPARATOR: char = ':';
pub const PHASED_SEPARATOR: char = '|';
pub const UNPHASED_SEPARATOR: char = '/';

/// Meta-information keys parsed as `KEY=<...>` compound lines.
pub const COMPOUND_KEYS: [&str; 8] = [
    "INFO", "FORMAT", "FILTER", "contig", "ALT", "PEDIGREE", "SAMPLE", "META",
];

/// Sub-fields written double-quoted when a compound line is constructed programmatically.
pub const QUOTED_SUBFIELDS: [&str; 3] = ["Description", "Source", "Version"];

pub const DEFAULT_PLOIDY: usize = 2;

/// First file format version whose string values are percent-encoded.
pub const PERCENT_ENCODING_VERSION: (u32, u32) = (4, 3);

pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub fn is_compound_key(key: &str) -> bool {
    COMPOUND_KEYS.contains(&key)
}
