use crate::{
    constants::{is_compound_key, META_PREFIX, QUOTED_SUBFIELDS},
    utils::util::{log_warning, Result},
};
use indexmap::IndexMap;
use std::fmt;

/// Declared arity of an INFO or FORMAT field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Number {
    /// A fixed count, e.g. `Number=2`.
    Fixed(usize),
    /// One value per ALT allele (`A`).
    PerAlt,
    /// One value per allele including REF (`R`).
    PerAllele,
    /// One value per possible genotype (`G`).
    PerGenotype,
    /// Any count (`.`).
    Unbounded,
}

impl Number {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "A" => Ok(Number::PerAlt),
            "R" => Ok(Number::PerAllele),
            "G" => Ok(Number::PerGenotype),
            "." => Ok(Number::Unbounded),
            _ => s
                .parse::<usize>()
                .map(Number::Fixed)
                .map_err(|_| crate::header_error!("Invalid Number value '{s}'")),
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Number::Fixed(1))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Fixed(n) => write!(f, "{n}"),
            Number::PerAlt => write!(f, "A"),
            Number::PerAllele => write!(f, "R"),
            Number::PerGenotype => write!(f, "G"),
            Number::Unbounded => write!(f, "."),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Integer,
    Float,
    String,
    Character,
    Flag,
}

impl ValueType {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "Integer" => Ok(ValueType::Integer),
            "Float" => Ok(ValueType::Float),
            "String" => Ok(ValueType::String),
            "Character" => Ok(ValueType::Character),
            "Flag" => Ok(ValueType::Flag),
            _ => Err(crate::header_error!("Invalid Type value '{s}'")),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueType::Integer => "Integer",
            ValueType::Float => "Float",
            ValueType::String => "String",
            ValueType::Character => "Character",
            ValueType::Flag => "Flag",
        };
        f.write_str(s)
    }
}

/// Typed view of an INFO or FORMAT declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub id: String,
    pub number: Number,
    pub ty: ValueType,
    pub description: String,
    pub extras: IndexMap<String, String>,
}

impl FieldSchema {
    pub fn new(id: &str, number: Number, ty: ValueType, description: &str) -> Self {
        FieldSchema {
            id: id.to_string(),
            number,
            ty,
            description: description.to_string(),
            extras: IndexMap::new(),
        }
    }

    fn from_fields(key: &str, fields: &IndexMap<String, SubField>) -> Result<Self> {
        let get = |name: &str| -> Result<&str> {
            fields
                .get(name)
                .map(|f| f.value.as_str())
                .ok_or_else(|| missing_field(key, name))
        };
        let id = get("ID")?;
        let number = Number::parse(get("Number")?)
            .map_err(|e| crate::header_error!("{key} header line for ID {id}: {e}"))?;
        let ty = ValueType::parse(get("Type")?)
            .map_err(|e| crate::header_error!("{key} header line for ID {id}: {e}"))?;
        if ty == ValueType::Flag && number != Number::Fixed(0) {
            log::warn!("{key} field {id} has Type=Flag but Number={number}, expected Number=0");
        }
        let extras = fields
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "ID" | "Number" | "Type" | "Description"))
            .map(|(k, f)| (k.clone(), f.value.clone()))
            .collect();
        Ok(FieldSchema {
            id: id.to_string(),
            number,
            ty,
            description: get("Description")?.to_string(),
            extras,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SubField {
    value: String,
    quoted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleHeaderLine {
    pub key: String,
    pub value: String,
}

/// A `##KEY=<k=v,...>` line. Sub-fields keep the order they were parsed or built in.
#[derive(Debug, Clone)]
pub struct CompoundHeaderLine {
    key: String,
    fields: IndexMap<String, SubField>,
    schema: Option<FieldSchema>,
    // Original `<...>` text of a parsed line, dropped on modification.
    raw: Option<String>,
}

impl PartialEq for CompoundHeaderLine {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.fields == other.fields
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HeaderLine {
    Simple(SimpleHeaderLine),
    Compound(CompoundHeaderLine),
}

fn missing_field(key: &str, name: &str) -> crate::error::VcfError {
    crate::header_error!("{key} header line is missing required field {name}")
}

fn required_fields(key: &str) -> &'static [&'static str] {
    match key {
        "INFO" | "FORMAT" => &["ID", "Number", "Type", "Description"],
        "FILTER" | "ALT" | "contig" | "SAMPLE" | "META" => &["ID"],
        _ => &[],
    }
}

fn needs_quotes(name: &str, value: &str) -> bool {
    QUOTED_SUBFIELDS.contains(&name)
        || value.is_empty()
        || value
            .chars()
            .any(|c| matches!(c, ',' | '<' | '>' | '"' | '=' | ' '))
}

impl CompoundHeaderLine {
    fn build(key: &str, fields: IndexMap<String, SubField>, raw: Option<String>) -> Result<Self> {
        for name in required_fields(key) {
            if !fields.contains_key(*name) {
                return Err(missing_field(key, name));
            }
        }
        let schema = match key {
            "INFO" | "FORMAT" => Some(FieldSchema::from_fields(key, &fields)?),
            _ => None,
        };
        Ok(CompoundHeaderLine {
            key: key.to_string(),
            fields,
            schema,
            raw,
        })
    }

    /// Builds a new line in canonical sub-field order: ID, Number, Type, Description, then the rest.
    pub fn new<K, V>(key: &str, pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let given: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let mut fields = IndexMap::new();
        for name in ["ID", "Number", "Type", "Description"] {
            if let Some((_, value)) = given.iter().find(|(k, _)| k == name) {
                fields.insert(
                    name.to_string(),
                    SubField {
                        quoted: needs_quotes(name, value),
                        value: value.clone(),
                    },
                );
            }
        }
        for (name, value) in given {
            if fields.contains_key(&name) {
                continue;
            }
            fields.insert(
                name.clone(),
                SubField {
                    quoted: needs_quotes(&name, &value),
                    value,
                },
            );
        }
        Self::build(key, fields, None)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn id(&self) -> Option<&str> {
        self.get("ID")
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|f| f.value.as_str())
    }

    pub fn description(&self) -> Option<&str> {
        self.get("Description")
    }

    /// Sub-fields in stored order, values unquoted and unescaped.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(k, f)| (k.as_str(), f.value.as_str()))
    }

    pub fn schema(&self) -> Option<&FieldSchema> {
        self.schema.as_ref()
    }

    /// The `length` of a contig line, if present and numeric.
    pub fn length(&self) -> Option<u64> {
        let raw = self.get("length")?;
        raw.parse().map(Some).unwrap_or_else(|error| {
            log_warning(format!("Ignoring invalid {} length {raw:?}: {error}", self.key), None)
        })
    }

    /// Sets a sub-field, appending it if new. The line is re-validated.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        let mut fields = self.fields.clone();
        fields.insert(
            name.to_string(),
            SubField {
                quoted: needs_quotes(name, value),
                value: value.to_string(),
            },
        );
        *self = Self::build(&self.key, fields, None)?;
        Ok(())
    }

    fn render_value(&self) -> String {
        if let Some(raw) = &self.raw {
            return raw.clone();
        }
        let body = self
            .fields
            .iter()
            .map(|(name, field)| {
                if field.quoted {
                    format!("{name}=\"{}\"", escape_quoted(&field.value))
                } else {
                    format!("{name}={}", field.value)
                }
            })
            .collect::<Vec<_>>()
            .join(",");
        format!("<{body}>")
    }
}

fn escape_quoted(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl HeaderLine {
    pub fn simple(key: &str, value: &str) -> Self {
        HeaderLine::Simple(SimpleHeaderLine {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    pub fn compound<K, V>(key: &str, pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: Into<String>,
        V: Into<String>,
    {
        CompoundHeaderLine::new(key, pairs).map(HeaderLine::Compound)
    }

    pub fn info(schema: &FieldSchema) -> Result<Self> {
        Self::field_line("INFO", schema)
    }

    pub fn format(schema: &FieldSchema) -> Result<Self> {
        Self::field_line("FORMAT", schema)
    }

    fn field_line(key: &str, schema: &FieldSchema) -> Result<Self> {
        let mut pairs = vec![
            ("ID".to_string(), schema.id.clone()),
            ("Number".to_string(), schema.number.to_string()),
            ("Type".to_string(), schema.ty.to_string()),
            ("Description".to_string(), schema.description.clone()),
        ];
        pairs.extend(schema.extras.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self::compound(key, pairs)
    }

    pub fn filter(id: &str, description: &str) -> Result<Self> {
        Self::compound("FILTER", [("ID", id), ("Description", description)])
    }

    pub fn contig(id: &str, length: Option<u64>) -> Result<Self> {
        let mut pairs = vec![("ID".to_string(), id.to_string())];
        if let Some(length) = length {
            pairs.push(("length".to_string(), length.to_string()));
        }
        Self::compound("contig", pairs)
    }

    pub fn key(&self) -> &str {
        match self {
            HeaderLine::Simple(line) => &line.key,
            HeaderLine::Compound(line) => line.key(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            HeaderLine::Simple(_) => None,
            HeaderLine::Compound(line) => line.id(),
        }
    }

    pub fn as_compound(&self) -> Option<&CompoundHeaderLine> {
        match self {
            HeaderLine::Compound(line) => Some(line),
            HeaderLine::Simple(_) => None,
        }
    }

    /// The text after `KEY=`, exactly as it is written out.
    pub fn value(&self) -> String {
        match self {
            HeaderLine::Simple(line) => line.value.clone(),
            HeaderLine::Compound(line) => line.render_value(),
        }
    }
}

impl fmt::Display for HeaderLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{META_PREFIX}{}={}", self.key(), self.value())
    }
}

/// Parses one `##` meta-information line (without trailing newline).
pub fn parse_header_line(line: &str) -> Result<HeaderLine> {
    let body = line
        .strip_prefix(META_PREFIX)
        .ok_or_else(|| crate::header_error!("Header line does not start with '##': {line:?}"))?;
    let (key, value) = body
        .split_once('=')
        .ok_or_else(|| crate::header_error!("Header line has no '=': {line:?}"))?;
    if key.is_empty() {
        return Err(crate::header_error!("Header line has an empty key: {line:?}"));
    }

    if !is_compound_key(key) {
        return Ok(HeaderLine::simple(key, value));
    }

    let interior = value
        .strip_prefix('<')
        .and_then(|v| v.strip_suffix('>'))
        .ok_or_else(|| {
            crate::header_error!("{key} header line value must be enclosed in '<' and '>': {value:?}")
        })?;
    let fields = parse_compound_fields(interior)
        .map_err(|e| crate::header_error!("Malformed {key} header line {line:?}: {e}"))?;
    CompoundHeaderLine::build(key, fields, Some(value.to_string())).map(HeaderLine::Compound)
}

/// Splits the interior of `<...>` into ordered `name=value` pairs. Commas inside
/// double quotes, `<...>` or `[...]` spans are not delimiters.
fn parse_compound_fields(interior: &str) -> std::result::Result<IndexMap<String, SubField>, String> {
    let mut fields = IndexMap::new();
    if interior.is_empty() {
        return Ok(fields);
    }
    let mut chars = interior.chars().peekable();

    loop {
        let mut name = String::new();
        loop {
            match chars.next() {
                Some('=') => break,
                Some(',') | None => {
                    return Err(format!("sub-field {name:?} has no '='"));
                }
                Some(c) => name.push(c),
            }
        }
        if name.is_empty() {
            return Err("empty sub-field name".to_string());
        }

        let mut value = String::new();
        let quoted = chars.peek() == Some(&'"');
        if quoted {
            chars.next();
            loop {
                match chars.next() {
                    Some('\\') => match chars.next() {
                        Some(c @ ('"' | '\\')) => value.push(c),
                        Some(c) => {
                            value.push('\\');
                            value.push(c);
                        }
                        None => return Err(format!("unterminated quote in sub-field {name}")),
                    },
                    Some('"') => break,
                    Some(c) => value.push(c),
                    None => return Err(format!("unterminated quote in sub-field {name}")),
                }
            }
            match chars.peek() {
                None | Some(',') => {}
                Some(c) => {
                    return Err(format!(
                        "unexpected character {c:?} after quoted value of sub-field {name}"
                    ))
                }
            }
        } else {
            let mut angle = 0usize;
            let mut square = 0usize;
            while let Some(&c) = chars.peek() {
                match c {
                    ',' if angle == 0 && square == 0 => break,
                    '<' => angle += 1,
                    '>' => {
                        angle = angle
                            .checked_sub(1)
                            .ok_or_else(|| format!("unbalanced '>' in sub-field {name}"))?
                    }
                    '[' => square += 1,
                    ']' => square = square.saturating_sub(1),
                    _ => {}
                }
                value.push(c);
                chars.next();
            }
            if angle != 0 {
                return Err(format!("unbalanced '<' in sub-field {name}"));
            }
        }

        if fields.contains_key(&name) {
            return Err(format!("duplicate sub-field {name}"));
        }
        fields.insert(name, SubField { value, quoted });

        match chars.next() {
            Some(',') => continue,
            None => break,
            Some(c) => return Err(format!("unexpected character {c:?}")),
        }
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VcfError;

    #[test]
    fn parses_simple_line() {
        let line = parse_header_line("##fileformat=VCFv4.3").unwrap();
        assert_eq!(line, HeaderLine::simple("fileformat", "VCFv4.3"));
        assert_eq!(line.to_string(), "##fileformat=VCFv4.3");
    }

    #[test]
    fn simple_value_may_contain_equals() {
        let line = parse_header_line("##source=tool --opt=1").unwrap();
        assert_eq!(line.key(), "source");
        assert_eq!(line.value(), "tool --opt=1");
    }

    #[test]
    fn parses_info_line_into_schema() {
        let line = parse_header_line(
            r#"##INFO=<ID=AF,Number=A,Type=Float,Description="Allele Frequency, per ALT",Source="dbsnp">"#,
        )
        .unwrap();
        let compound = line.as_compound().unwrap();
        let schema = compound.schema().unwrap();
        assert_eq!(schema.id, "AF");
        assert_eq!(schema.number, Number::PerAlt);
        assert_eq!(schema.ty, ValueType::Float);
        assert_eq!(schema.description, "Allele Frequency, per ALT");
        assert_eq!(schema.extras.get("Source").map(String::as_str), Some("dbsnp"));
    }

    #[test]
    fn quoted_values_keep_delimiters_and_escaped_quotes() {
        let line = parse_header_line(
            r#"##FILTER=<ID=q10,Description="Quality <10, see \"docs\"">"#,
        )
        .unwrap();
        assert_eq!(
            line.as_compound().unwrap().description(),
            Some(r#"Quality <10, see "docs""#)
        );
    }

    #[test]
    fn parsed_line_renders_exactly_as_read() {
        let text = r#"##contig=<ID=20,length=62435964,assembly=B36,md5=f126cdf8a6e0c7f379d618ff66beb2da,species="Homo sapiens",taxonomy=x>"#;
        let line = parse_header_line(text).unwrap();
        assert_eq!(line.to_string(), text);
        let fields: Vec<_> = line.as_compound().unwrap().fields().map(|(k, _)| k).collect();
        assert_eq!(
            fields,
            ["ID", "length", "assembly", "md5", "species", "taxonomy"]
        );
        assert_eq!(line.as_compound().unwrap().length(), Some(62435964));
    }

    #[test]
    fn meta_values_with_brackets_are_one_field() {
        let line = parse_header_line(
            "##META=<ID=Assay,Type=String,Number=.,Values=[WholeGenome, Exome]>",
        )
        .unwrap();
        assert_eq!(
            line.as_compound().unwrap().get("Values"),
            Some("[WholeGenome, Exome]")
        );
    }

    #[test]
    fn new_line_uses_canonical_order() {
        let line = HeaderLine::compound(
            "INFO",
            [
                ("Description", "Total Depth"),
                ("Type", "Integer"),
                ("ID", "DP"),
                ("Number", "1"),
            ],
        )
        .unwrap();
        assert_eq!(
            line.to_string(),
            r#"##INFO=<ID=DP,Number=1,Type=Integer,Description="Total Depth">"#
        );
    }

    #[test]
    fn info_constructor_round_trips_through_parser() {
        let mut schema = FieldSchema::new("XS", Number::Unbounded, ValueType::String, r#"a "b" c"#);
        schema.extras.insert("Version".to_string(), "2".to_string());
        let line = HeaderLine::info(&schema).unwrap();
        let text = line.to_string();
        assert_eq!(
            text,
            r#"##INFO=<ID=XS,Number=.,Type=String,Description="a \"b\" c",Version="2">"#
        );
        let reparsed = parse_header_line(&text).unwrap();
        assert_eq!(reparsed, line);
        assert_eq!(reparsed.as_compound().unwrap().schema(), Some(&schema));
    }

    #[test]
    fn set_drops_original_text() {
        let mut line = match parse_header_line("##contig=<ID=1, length=10>") {
            Ok(HeaderLine::Compound(line)) => line,
            other => panic!("unexpected {other:?}"),
        };
        line.set("assembly", "b37").unwrap();
        assert_eq!(
            HeaderLine::Compound(line).to_string(),
            "##contig=<ID=1, length=10,assembly=b37>"
        );
    }

    #[test]
    fn unknown_bracketed_key_is_simple() {
        let line = parse_header_line("##GATKCommandLine=<ID=HaplotypeCaller,Version=4>").unwrap();
        assert!(matches!(line, HeaderLine::Simple(_)));
        assert_eq!(line.value(), "<ID=HaplotypeCaller,Version=4>");
    }

    #[test]
    fn missing_required_field_names_kind_and_field() {
        let err = parse_header_line("##INFO=<ID=DP,Number=1,Type=Integer>").unwrap_err();
        assert!(matches!(err, VcfError::InvalidHeader { .. }));
        assert!(err.to_string().contains("INFO"));
        assert!(err.to_string().contains("Description"));

        let err = parse_header_line(r#"##FILTER=<Description="no id">"#).unwrap_err();
        assert!(err.to_string().contains("FILTER header line is missing required field ID"));
    }

    #[test]
    fn pedigree_line_needs_no_id() {
        let line = parse_header_line("##PEDIGREE=<Derived=T1,Original=G1>").unwrap();
        assert_eq!(line.id(), None);
        assert_eq!(line.as_compound().unwrap().get("Original"), Some("G1"));
    }

    #[test]
    fn rejects_malformed_lines() {
        for text in [
            r#"##FILTER=<ID=q10,Description="unterminated>"#,
            "##contig=<ID=1,length=5",
            "##contig=<ID=<1,length=5>",
            "##contig=<ID=1>,length=5>",
            "##INFO=<ID=DP,Number=x,Type=Integer,Description=\"d\">",
            "##INFO=<ID=DP,Number=1,Type=Long,Description=\"d\">",
            "##contig=<ID=1,ID=2>",
            "##contig=<ID>",
            "##fileformat",
            "#fileformat=VCFv4.3",
        ] {
            let err = parse_header_line(text).unwrap_err();
            assert!(
                matches!(err, VcfError::InvalidHeader { .. }),
                "{text}: unexpected {err:?}"
            );
        }
    }

    #[test]
    fn number_and_type_display_round_trip() {
        for s in ["0", "1", "7", "A", "R", "G", "."] {
            assert_eq!(Number::parse(s).unwrap().to_string(), s);
        }
        for s in ["Integer", "Float", "String", "Character", "Flag"] {
            assert_eq!(ValueType::parse(s).unwrap().to_string(), s);
        }
        assert!(Number::Fixed(1).is_scalar());
        assert!(!Number::Fixed(2).is_scalar());
        assert!(!Number::PerAlt.is_scalar());
    }
}
