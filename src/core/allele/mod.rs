mod bnd;

pub use bnd::{BreakEnd, SequencePosition, SingleBreakEnd};

use crate::constants::MISSING_VALUE;
use std::fmt;

/// Top-level classification of one ALT allele.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlleleKind {
    Snv,
    Mnv,
    Indel,
    Symbolic,
    BreakEnd,
    SingleBreakEnd,
    Missing,
    Unknown,
}

impl fmt::Display for AlleleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlleleKind::Snv => "SNV",
            AlleleKind::Mnv => "MNV",
            AlleleKind::Indel => "INDEL",
            AlleleKind::Symbolic => "SYMBOLIC",
            AlleleKind::BreakEnd => "BND",
            AlleleKind::SingleBreakEnd => "SINGLE_BND",
            AlleleKind::Missing => "MISSING",
            AlleleKind::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubstitutionKind {
    Snv,
    Mnv,
    Indel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndelDirection {
    Insertion,
    Deletion,
}

/// A literal base sequence replacing REF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pub kind: SubstitutionKind,
    pub value: String,
    /// REF and ALT differ in length and share neither first nor last base.
    pub complex: bool,
}

impl Substitution {
    /// Insertion or deletion relative to `reference`; `None` unless the lengths differ.
    pub fn indel_direction(&self, reference: &str) -> Option<IndelDirection> {
        match self.value.len().cmp(&reference.len()) {
            std::cmp::Ordering::Greater => Some(IndelDirection::Insertion),
            std::cmp::Ordering::Less => Some(IndelDirection::Deletion),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// An ALT of the form `<TAG>` or `<TAG:SUBTYPE...>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolicAllele {
    pub tag: String,
    pub subtype: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AltAllele {
    Substitution(Substitution),
    Symbolic(SymbolicAllele),
    BreakEnd(BreakEnd),
    SingleBreakEnd(SingleBreakEnd),
    Missing,
    /// Unrecognised token, kept verbatim.
    Unknown(String),
}

impl AltAllele {
    pub fn kind(&self) -> AlleleKind {
        match self {
            AltAllele::Substitution(sub) => match sub.kind {
                SubstitutionKind::Snv => AlleleKind::Snv,
                SubstitutionKind::Mnv => AlleleKind::Mnv,
                SubstitutionKind::Indel => AlleleKind::Indel,
            },
            AltAllele::Symbolic(_) => AlleleKind::Symbolic,
            AltAllele::BreakEnd(_) => AlleleKind::BreakEnd,
            AltAllele::SingleBreakEnd(_) => AlleleKind::SingleBreakEnd,
            AltAllele::Missing => AlleleKind::Missing,
            AltAllele::Unknown(_) => AlleleKind::Unknown,
        }
    }

    pub fn as_substitution(&self) -> Option<&Substitution> {
        match self {
            AltAllele::Substitution(sub) => Some(sub),
            _ => None,
        }
    }

    pub fn as_breakend(&self) -> Option<&BreakEnd> {
        match self {
            AltAllele::BreakEnd(bnd) => Some(bnd),
            _ => None,
        }
    }
}

impl fmt::Display for AltAllele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AltAllele::Substitution(sub) => f.write_str(&sub.value),
            AltAllele::Symbolic(sym) => match &sym.subtype {
                Some(subtype) => write!(f, "<{}:{subtype}>", sym.tag),
                None => write!(f, "<{}>", sym.tag),
            },
            AltAllele::BreakEnd(bnd) => bnd.fmt(f),
            AltAllele::SingleBreakEnd(bnd) => bnd.fmt(f),
            AltAllele::Missing => f.write_str(MISSING_VALUE),
            AltAllele::Unknown(raw) => f.write_str(raw),
        }
    }
}

pub(crate) fn is_bases(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| matches!(b.to_ascii_uppercase(), b'A' | b'C' | b'G' | b'T' | b'N'))
}

/// Classifies one ALT token against REF. Never fails: tokens that fit no known
/// shape become [`AltAllele::Unknown`], and every result renders back to `alt`.
pub fn classify(reference: &str, alt: &str) -> AltAllele {
    if alt == MISSING_VALUE {
        return AltAllele::Missing;
    }

    if alt.len() > 2 && alt.starts_with('<') && alt.ends_with('>') {
        let interior = &alt[1..alt.len() - 1];
        let (tag, subtype) = match interior.split_once(':') {
            Some((tag, subtype)) => (tag, Some(subtype.to_string())),
            None => (interior, None),
        };
        if tag.is_empty() {
            return AltAllele::Unknown(alt.to_string());
        }
        return AltAllele::Symbolic(SymbolicAllele {
            tag: tag.to_string(),
            subtype,
        });
    }

    if alt.contains(['[', ']']) {
        return bnd::parse_breakend(alt)
            .map(AltAllele::BreakEnd)
            .unwrap_or_else(|| AltAllele::Unknown(alt.to_string()));
    }

    if let Some(single) = bnd::parse_single_breakend(alt) {
        return AltAllele::SingleBreakEnd(single);
    }

    if !is_bases(alt) {
        return AltAllele::Unknown(alt.to_string());
    }

    let (kind, complex) = if alt.len() == reference.len() {
        if alt.len() == 1 {
            (SubstitutionKind::Snv, false)
        } else {
            (SubstitutionKind::Mnv, false)
        }
    } else {
        let (r, a) = (reference.as_bytes(), alt.as_bytes());
        let shared_prefix = matches!((r.first(), a.first()), (Some(x), Some(y)) if x.eq_ignore_ascii_case(y));
        let shared_suffix = matches!((r.last(), a.last()), (Some(x), Some(y)) if x.eq_ignore_ascii_case(y));
        (SubstitutionKind::Indel, !(shared_prefix || shared_suffix))
    };
    AltAllele::Substitution(Substitution {
        kind,
        value: alt.to_string(),
        complex,
    })
}
