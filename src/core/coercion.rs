use super::header_line::{FieldSchema, Number, ValueType};
use crate::{
    constants::{DEFAULT_PLOIDY, MISSING_VALUE, VALUE_SEPARATOR},
    utils::util::{genotype_count, Result},
};
use std::{collections::HashMap, fmt};

/// One typed value of an INFO or FORMAT field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(String),
    Character(char),
    /// The `.` token at the position of a value.
    Missing,
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{v}"),
            Value::Float(v) => f.write_str(&format_float(*v)),
            Value::String(v) => f.write_str(v),
            Value::Character(c) => write!(f, "{c}"),
            Value::Missing => f.write_str(MISSING_VALUE),
        }
    }
}

/// A coerced INFO or FORMAT field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Presence of a Flag field; `false` is dropped on output.
    Flag(bool),
    /// A `Number=1` field.
    Single(Value),
    /// Any other arity, including single-element and empty collections.
    List(Vec<Value>),
    /// A field without a header declaration, kept verbatim.
    Raw(String),
}

impl FieldValue {
    pub fn as_single(&self) -> Option<&Value> {
        match self {
            FieldValue::Single(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            FieldValue::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_raw(&self) -> Option<&str> {
        match self {
            FieldValue::Raw(v) => Some(v),
            _ => None,
        }
    }

    /// A value that renders as the bare missing token.
    pub fn missing_for(number: Number) -> Self {
        if number.is_scalar() {
            FieldValue::Single(Value::Missing)
        } else {
            FieldValue::List(Vec::new())
        }
    }
}

/// Record-level facts the derived arities depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoercionContext {
    pub alt_count: usize,
    pub ploidy: usize,
    pub percent_encoded: bool,
}

impl CoercionContext {
    pub fn new(alt_count: usize, percent_encoded: bool) -> Self {
        CoercionContext {
            alt_count,
            ploidy: DEFAULT_PLOIDY,
            percent_encoded,
        }
    }

    pub fn with_ploidy(self, ploidy: usize) -> Self {
        CoercionContext { ploidy, ..self }
    }

    /// Expected value count for `number`, `None` when unbounded.
    pub fn expected_count(&self, number: Number) -> Result<Option<usize>> {
        Ok(match number {
            Number::Fixed(k) => Some(k),
            Number::PerAlt => Some(self.alt_count),
            Number::PerAllele => Some(self.alt_count + 1),
            Number::PerGenotype => Some(
                genotype_count(self.alt_count + 1, self.ploidy).ok_or_else(|| {
                    crate::record_error!(
                        "genotype count for {} allele(s) at ploidy {} is out of range",
                        self.alt_count + 1,
                        self.ploidy
                    )
                })?,
            ),
            Number::Unbounded => None,
        })
    }
}

/// Splits a raw field value on the value separator. A missing field is a single `.` token.
pub fn split_values(raw: &str) -> Vec<&str> {
    raw.split(VALUE_SEPARATOR).collect()
}

/// Converts raw tokens into a typed field value according to `schema`.
///
/// A Flag takes no tokens. A `Number=1` field yields [`FieldValue::Single`]; every
/// other arity yields [`FieldValue::List`]. A lone `.` for a collection is the
/// wholly missing value, an empty list that is exempt from the arity check.
pub fn coerce(schema: &FieldSchema, tokens: &[&str], ctx: &CoercionContext) -> Result<FieldValue> {
    let id = schema.id.as_str();
    if schema.ty == ValueType::Flag {
        if !tokens.is_empty() {
            return Err(
                crate::record_error!("Flag field must not have a value, got {:?}", tokens.join(","))
                    .with_field(id),
            );
        }
        return Ok(FieldValue::Flag(true));
    }
    if tokens.is_empty() {
        return Err(
            crate::record_error!("{} field has no value", schema.ty).with_field(id),
        );
    }

    if schema.number.is_scalar() {
        if tokens.len() != 1 {
            return Err(arity_error(id, 1, tokens.len()));
        }
        return parse_value(schema, tokens[0], ctx).map(FieldValue::Single);
    }

    if tokens == [MISSING_VALUE] {
        return Ok(FieldValue::List(Vec::new()));
    }
    if let Some(expected) = ctx
        .expected_count(schema.number)
        .map_err(|error| error.with_field(id))?
    {
        if tokens.len() != expected {
            return Err(arity_error(id, expected, tokens.len()));
        }
    }
    tokens
        .iter()
        .map(|token| parse_value(schema, token, ctx))
        .collect::<Result<Vec<_>>>()
        .map(FieldValue::List)
}

fn arity_error(id: &str, expected: usize, actual: usize) -> crate::error::VcfError {
    crate::record_error!("expected {expected} value(s), got {actual}").with_field(id)
}

fn parse_value(schema: &FieldSchema, token: &str, ctx: &CoercionContext) -> Result<Value> {
    if token == MISSING_VALUE {
        return Ok(Value::Missing);
    }
    let invalid = || {
        crate::record_error!("invalid {} value {token:?}", schema.ty).with_field(&schema.id)
    };
    match schema.ty {
        ValueType::Integer => token.parse::<i64>().map(Value::Integer).map_err(|_| invalid()),
        ValueType::Float => token.parse::<f64>().map(Value::Float).map_err(|_| invalid()),
        ValueType::String => Ok(Value::String(if ctx.percent_encoded {
            percent_decode(token)
        } else {
            token.to_string()
        })),
        ValueType::Character => {
            let decoded = if ctx.percent_encoded {
                percent_decode(token)
            } else {
                token.to_string()
            };
            let mut chars = decoded.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Character(c)),
                _ => Err(invalid()),
            }
        }
        ValueType::Flag => Err(invalid()),
    }
}

pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let text = if value > 0.0 { "Inf" } else { "-Inf" };
        text.to_string()
    } else {
        value.to_string()
    }
}

/// Renders one value using the textual conventions accepted on input.
pub fn format_value(value: &Value, percent_encoded: bool) -> String {
    match value {
        Value::String(s) if percent_encoded => percent_encode(s),
        Value::Character(c) if percent_encoded => percent_encode(&c.to_string()),
        _ => value.to_string(),
    }
}

/// Renders the value part of a field; `None` for a Flag, which is written as a bare key.
pub fn format_field(value: &FieldValue, percent_encoded: bool) -> Option<String> {
    match value {
        FieldValue::Flag(_) => None,
        FieldValue::Single(v) => Some(format_value(v, percent_encoded)),
        FieldValue::List(values) if values.is_empty() => Some(MISSING_VALUE.to_string()),
        FieldValue::List(values) => Some(
            values
                .iter()
                .map(|v| format_value(v, percent_encoded))
                .collect::<Vec<_>>()
                .join(&VALUE_SEPARATOR.to_string()),
        ),
        FieldValue::Raw(raw) => Some(raw.clone()),
    }
}

/// Source text of fields whose canonical rendering differs from it, such as
/// `0.50`, `+5` or an unescaped `:` in a percent-encoded file.
///
/// Each entry keeps the canonical text of the value as parsed. The source text is
/// only reused while the current value still renders to that canonical text, so
/// an edited value is written canonically.
#[derive(Debug, Clone, Default)]
pub struct Spellings(HashMap<String, (String, String)>);

impl Spellings {
    /// Remembers `source` for `key` when it differs from `canonical`.
    pub fn remember(&mut self, key: &str, canonical: &str, source: &str) {
        if canonical != source {
            self.0
                .insert(key.to_string(), (canonical.to_string(), source.to_string()));
        }
    }

    /// The text to write for `key` whose value currently renders as `canonical`.
    pub fn render<'a>(&'a self, key: &str, canonical: &'a str) -> &'a str {
        match self.0.get(key) {
            Some((parsed, source)) if parsed == canonical => source,
            _ => canonical,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// Spellings never make two values unequal.
impl PartialEq for Spellings {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

const PERCENT_CODES: [(char, &str); 8] = [
    ('%', "%25"),
    (':', "%3A"),
    (';', "%3B"),
    ('=', "%3D"),
    (',', "%2C"),
    ('\r', "%0D"),
    ('\n', "%0A"),
    ('\t', "%09"),
];

pub fn percent_decode(s: &str) -> String {
    if !s.contains('%') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let candidate = rest.get(pos..pos + 3);
        match candidate.and_then(|code| {
            PERCENT_CODES
                .iter()
                .find(|(_, c)| c.eq_ignore_ascii_case(code))
        }) {
            Some((decoded, _)) => {
                out.push(*decoded);
                rest = &rest[pos + 3..];
            }
            None => {
                out.push('%');
                rest = &rest[pos + 1..];
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match PERCENT_CODES.iter().find(|(decoded, _)| *decoded == c) {
            Some((_, code)) => out.push_str(code),
            None => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VcfError;
    use approx::assert_relative_eq;

    fn schema(number: Number, ty: ValueType) -> FieldSchema {
        FieldSchema::new("X", number, ty, "test field")
    }

    fn ctx(alt_count: usize) -> CoercionContext {
        CoercionContext::new(alt_count, true)
    }

    #[test]
    fn fixed_one_is_scalar() {
        let value = coerce(&schema(Number::Fixed(1), ValueType::Integer), &["14"], &ctx(1)).unwrap();
        assert_eq!(value, FieldValue::Single(Value::Integer(14)));
    }

    #[test]
    fn other_arities_are_collections_even_with_one_value() {
        for number in [Number::PerAlt, Number::Unbounded] {
            let value = coerce(&schema(number, ValueType::Integer), &["3"], &ctx(1)).unwrap();
            assert_eq!(value, FieldValue::List(vec![Value::Integer(3)]));
        }
        let value = coerce(&schema(Number::PerAllele, ValueType::Integer), &["3", "4"], &ctx(1))
            .unwrap();
        assert_eq!(value.as_list().unwrap().len(), 2);
    }

    #[test]
    fn per_alt_arity_law() {
        let s = schema(Number::PerAlt, ValueType::Float);
        for alt_count in 1..4 {
            for n in 1..5 {
                let tokens = vec!["0.5"; n];
                let result = coerce(&s, &tokens, &ctx(alt_count));
                assert_eq!(result.is_ok(), n == alt_count, "alts={alt_count} n={n}");
            }
        }
    }

    #[test]
    fn fixed_arity_law() {
        for k in 2..5 {
            let s = schema(Number::Fixed(k), ValueType::Integer);
            for n in 1..6 {
                let tokens = vec!["1"; n];
                assert_eq!(coerce(&s, &tokens, &ctx(1)).is_ok(), n == k);
            }
        }
    }

    #[test]
    fn arity_error_names_field_and_counts() {
        let s = FieldSchema::new("AD", Number::PerAllele, ValueType::Integer, "Allelic depths");
        let err = coerce(&s, &["1", "2", "3"], &ctx(1)).unwrap_err();
        assert!(matches!(err, VcfError::InvalidRecord { .. }));
        let msg = err.to_string();
        assert!(msg.contains("AD"), "{msg}");
        assert!(msg.contains("expected 2"), "{msg}");
        assert!(msg.contains("got 3"), "{msg}");
    }

    #[test]
    fn per_genotype_uses_ploidy() {
        let s = schema(Number::PerGenotype, ValueType::Integer);
        assert!(coerce(&s, &["0", "10", "100"], &ctx(1)).is_ok());
        let haploid = ctx(1).with_ploidy(1);
        assert!(coerce(&s, &["0", "10"], &haploid).is_ok());
        assert!(coerce(&s, &["0", "10", "100"], &haploid).is_err());
        assert!(coerce(&s, &vec!["1"; 6], &ctx(2)).is_ok());
    }

    #[test]
    fn oversized_genotype_count_is_a_record_error() {
        let s = FieldSchema::new("PL", Number::PerGenotype, ValueType::Integer, "Likelihoods");
        let err = coerce(&s, &["1"], &ctx(60).with_ploidy(60)).unwrap_err();
        assert!(matches!(err, VcfError::InvalidRecord { field: Some(ref f), .. } if f == "PL"));
        assert!(err.to_string().contains("out of range"), "{err}");
        assert_eq!(
            coerce(&s, &["."], &ctx(60).with_ploidy(60)).unwrap(),
            FieldValue::List(Vec::new())
        );
    }

    #[test]
    fn unbounded_is_never_arity_checked() {
        let s = schema(Number::Unbounded, ValueType::String);
        for n in 1..8 {
            assert!(coerce(&s, &vec!["x"; n], &ctx(0)).is_ok());
        }
    }

    #[test]
    fn flag_presence() {
        let s = schema(Number::Fixed(0), ValueType::Flag);
        assert_eq!(coerce(&s, &[], &ctx(1)).unwrap(), FieldValue::Flag(true));
        assert!(coerce(&s, &["1"], &ctx(1)).is_err());
    }

    #[test]
    fn missing_markers_are_distinct() {
        let scalar = coerce(&schema(Number::Fixed(1), ValueType::Integer), &["."], &ctx(1)).unwrap();
        assert_eq!(scalar, FieldValue::Single(Value::Missing));

        let whole = coerce(&schema(Number::PerAlt, ValueType::Integer), &["."], &ctx(2)).unwrap();
        assert_eq!(whole, FieldValue::List(Vec::new()));

        let partial =
            coerce(&schema(Number::PerAlt, ValueType::Integer), &["1", "."], &ctx(2)).unwrap();
        assert_eq!(partial, FieldValue::List(vec![Value::Integer(1), Value::Missing]));
    }

    #[test]
    fn float_spellings() {
        let s = schema(Number::Fixed(1), ValueType::Float);
        let value = |t: &str| {
            coerce(&s, &[t], &ctx(1))
                .unwrap()
                .as_single()
                .and_then(Value::as_float)
                .unwrap()
        };
        assert_relative_eq!(value("0.25"), 0.25);
        assert_relative_eq!(value("1e-3"), 0.001);
        assert!(value("NaN").is_nan());
        assert!(value("inf").is_infinite());
        assert!(value("-Inf") < 0.0);
        assert!(coerce(&s, &["1.2.3"], &ctx(1)).is_err());
    }

    #[test]
    fn type_errors_are_record_errors() {
        let err = coerce(&schema(Number::Fixed(1), ValueType::Integer), &["1.5"], &ctx(1))
            .unwrap_err();
        assert!(matches!(err, VcfError::InvalidRecord { field: Some(ref f), .. } if f == "X"));
        assert!(coerce(&schema(Number::Fixed(1), ValueType::Character), &["ab"], &ctx(1)).is_err());
        assert_eq!(
            coerce(&schema(Number::Fixed(1), ValueType::Character), &["a"], &ctx(1)).unwrap(),
            FieldValue::Single(Value::Character('a'))
        );
    }

    #[test]
    fn strings_are_percent_decoded_when_enabled() {
        let s = schema(Number::Fixed(1), ValueType::String);
        let decoded = coerce(&s, &["a%3Bb%2Cc%25"], &ctx(1)).unwrap();
        assert_eq!(decoded, FieldValue::Single(Value::String("a;b,c%".to_string())));
        let verbatim = coerce(&s, &["a%3Bb"], &CoercionContext::new(1, false)).unwrap();
        assert_eq!(verbatim, FieldValue::Single(Value::String("a%3Bb".to_string())));
    }

    #[test]
    fn percent_codes_round_trip() {
        let text = "x%3Ay%3Bz%3D%25%2C%0D%0A%09";
        let decoded = percent_decode(text);
        assert_eq!(decoded, "x:y;z=%,\r\n\t");
        assert_eq!(percent_encode(&decoded), text);
        assert_eq!(percent_decode("50% done %zz"), "50% done %zz");
        assert_eq!(percent_decode("%3a"), ":");
    }

    #[test]
    fn spellings_apply_only_to_unchanged_values() {
        let mut spellings = Spellings::default();
        spellings.remember("AF", "0.5", "0.50");
        spellings.remember("DP", "7", "7");
        assert_eq!(spellings.render("AF", "0.5"), "0.50");
        assert_eq!(spellings.render("AF", "0.25"), "0.25");
        assert_eq!(spellings.render("DP", "7"), "7");
        assert_eq!(spellings.render("XX", "1"), "1");

        let mut other = Spellings::default();
        assert_eq!(spellings, other);
        other.remember("AF", "0.5", "5e-1");
        spellings.clear();
        assert!(spellings.is_empty());
        assert!(!other.is_empty());
    }

    #[test]
    fn format_field_inverts_coercion() {
        assert_eq!(format_field(&FieldValue::Flag(true), true), None);
        assert_eq!(
            format_field(&FieldValue::List(Vec::new()), true).as_deref(),
            Some(".")
        );
        assert_eq!(
            format_field(
                &FieldValue::List(vec![Value::Float(0.5), Value::Missing, Value::Float(29.0)]),
                true
            )
            .as_deref(),
            Some("0.5,.,29")
        );
        assert_eq!(
            format_field(&FieldValue::Single(Value::String("a;b".into())), true).as_deref(),
            Some("a%3Bb")
        );
        assert_eq!(
            format_field(&FieldValue::Raw("a;b".into()), true).as_deref(),
            Some("a;b")
        );
        assert_eq!(format_float(f64::NAN), "NaN");
        assert_eq!(format_float(f64::NEG_INFINITY), "-Inf");
    }
}
