use crate::constants::MISSING_VALUE;
use std::fmt;

/// Which side of the joined piece the local sequence `t` is written on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequencePosition {
    /// `t[p[`, `t]p]`, `t.`
    Leading,
    /// `]p]t`, `[p[t`, `.t`
    Trailing,
}

/// A mated breakend, `t[p[`, `t]p]`, `]p]t` or `[p[t`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakEnd {
    pub sequence: String,
    pub mate_chrom: String,
    /// 1-based mate position.
    pub mate_pos: u64,
    pub position: SequencePosition,
    /// `]` around the mate locus means the joined mate sequence runs forward.
    pub mate_strand_forward: bool,
    /// False when the mate contig was written as `<ctg>`.
    pub within_main_assembly: bool,
}

impl BreakEnd {
    fn bracket(&self) -> char {
        if self.mate_strand_forward {
            ']'
        } else {
            '['
        }
    }

    /// Whether the local side of the join reads on the forward strand.
    pub fn local_strand_forward(&self) -> bool {
        self.position == SequencePosition::Leading
    }

    /// Two-character strand code as used by SV callers' `STRANDS` INFO field.
    pub fn strands(&self) -> [u8; 2] {
        match (self.position, self.mate_strand_forward) {
            (SequencePosition::Trailing, false) => *b"+-",
            (SequencePosition::Trailing, true) => *b"--",
            (SequencePosition::Leading, false) => *b"++",
            (SequencePosition::Leading, true) => *b"-+",
        }
    }
}

impl fmt::Display for BreakEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.bracket();
        let mate = if self.within_main_assembly {
            format!("{}:{}", self.mate_chrom, self.mate_pos)
        } else {
            format!("<{}>:{}", self.mate_chrom, self.mate_pos)
        };
        match self.position {
            SequencePosition::Leading => write!(f, "{}{b}{mate}{b}", self.sequence),
            SequencePosition::Trailing => write!(f, "{b}{mate}{b}{}", self.sequence),
        }
    }
}

/// A breakend without a mate, `t.` or `.t`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleBreakEnd {
    pub sequence: String,
    pub position: SequencePosition,
}

impl fmt::Display for SingleBreakEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            SequencePosition::Leading => write!(f, "{}{MISSING_VALUE}", self.sequence),
            SequencePosition::Trailing => write!(f, "{MISSING_VALUE}{}", self.sequence),
        }
    }
}

pub(super) fn parse_breakend(alt: &str) -> Option<BreakEnd> {
    let bytes = alt.as_bytes();
    let first_bracket_idx = bytes.iter().position(|&b| b == b'[' || b == b']')?;
    let bracket = bytes[first_bracket_idx];
    let second_bracket_idx = bytes
        .iter()
        .skip(first_bracket_idx + 1)
        .position(|&b| b == bracket)
        .map(|rel| rel + first_bracket_idx + 1)?;

    let (position, sequence) = if first_bracket_idx == 0 {
        (SequencePosition::Trailing, &alt[second_bracket_idx + 1..])
    } else if second_bracket_idx == bytes.len() - 1 {
        (SequencePosition::Leading, &alt[..first_bracket_idx])
    } else {
        return None;
    };
    if !super::is_bases(sequence) {
        return None;
    }

    let mate = &alt[first_bracket_idx + 1..second_bracket_idx];
    let (contig, pos) = mate.rsplit_once(':')?;
    let mate_pos: u64 = pos.parse().ok()?;
    let (mate_chrom, within_main_assembly) =
        match contig.strip_prefix('<').and_then(|c| c.strip_suffix('>')) {
            Some(inner) => (inner, false),
            None => (contig, true),
        };
    if mate_chrom.is_empty() || mate_chrom.contains(['[', ']', '<', '>']) {
        return None;
    }

    let bnd = BreakEnd {
        sequence: sequence.to_string(),
        mate_chrom: mate_chrom.to_string(),
        mate_pos,
        position,
        mate_strand_forward: bracket == b']',
        within_main_assembly,
    };
    // Non-canonical spellings (e.g. zero-padded positions) stay Unknown so output is verbatim.
    (bnd.to_string() == alt).then_some(bnd)
}

pub(super) fn parse_single_breakend(alt: &str) -> Option<SingleBreakEnd> {
    let (position, sequence) = if let Some(seq) = alt.strip_suffix('.') {
        (SequencePosition::Leading, seq)
    } else if let Some(seq) = alt.strip_prefix('.') {
        (SequencePosition::Trailing, seq)
    } else {
        return None;
    };
    if !super::is_bases(sequence) {
        return None;
    }
    Some(SingleBreakEnd {
        sequence: sequence.to_string(),
        position,
    })
}
