//! Scalar values and their invariant text form.
//!
//! Every leaf the walker writes into an attribute, a text node or a simple
//! element passes through [`Scalar::to_text`], and every leaf it reads back
//! passes through [`ScalarType::parse`]. Neither direction consults the host
//! locale, so a document written on one machine reads identically on another.
//!
//! | Kind | Written as | Parsed from |
//! |------|------------|-------------|
//! | `bool` | `true` / `false` | case-insensitive `true` / `false` |
//! | integers | decimal | decimal, range-checked per declared width |
//! | floats | shortest round-trip form | any Rust float literal, `inf`, `NaN` |
//! | `DateTime` | RFC 3339, nine fractional digits, `Z` | any RFC 3339 offset, normalised to UTC |
//! | enums | variant name | case-insensitive variant name |

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use thiserror::Error;

/// Errors raised while converting between text and scalar values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("cannot convert '{text}' to {target}")]
    Invalid { text: String, target: &'static str },

    #[error("value '{text}' is out of range for {target}")]
    OutOfRange { text: String, target: &'static str },

    #[error("'{text}' is not a variant of {enum_name}")]
    UnknownVariant {
        text: String,
        enum_name: &'static str,
    },

    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("no value present for {target}")]
    Absent { target: &'static str },

    #[error("character U+{code:04X} in {target} is not allowed in XML")]
    Unrepresentable { code: u32, target: &'static str },
}

impl ConversionError {
    fn invalid(text: &str, target: &'static str) -> Self {
        ConversionError::Invalid {
            text: text.to_string(),
            target,
        }
    }

    fn out_of_range(text: impl ToString, target: &'static str) -> Self {
        ConversionError::OutOfRange {
            text: text.to_string(),
            target,
        }
    }
}

/// Static description of an enum usable as a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumInfo {
    pub name: &'static str,
    pub variants: &'static [&'static str],
}

impl EnumInfo {
    /// Looks up a variant by name, ignoring ASCII case and surrounding whitespace.
    pub fn lookup(&self, text: &str) -> Option<&'static str> {
        let text = text.trim();
        self.variants
            .iter()
            .copied()
            .find(|variant| variant.eq_ignore_ascii_case(text))
    }

    /// The first declared variant, which doubles as the enum's default.
    pub fn first_variant(&self) -> Option<&'static str> {
        self.variants.first().copied()
    }
}

/// Implemented by enums that are stored as their variant name.
///
/// Usually generated by the `xml_enum!` macro in `xmlbind`.
pub trait XmlEnum: Sized + Copy + 'static {
    const INFO: &'static EnumInfo;

    fn variant_name(self) -> &'static str;

    /// Case-insensitive reverse of [`XmlEnum::variant_name`].
    fn from_variant_name(name: &str) -> Option<Self>;
}

/// Declared scalar kind of a member or collection item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Char,
    String,
    DateTime,
    Enum(&'static EnumInfo),
}

impl ScalarType {
    /// Declared name of the type, used when an item element has no explicit name.
    pub fn type_name(self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::I8 => "i8",
            ScalarType::I16 => "i16",
            ScalarType::I32 => "i32",
            ScalarType::I64 => "i64",
            ScalarType::U8 => "u8",
            ScalarType::U16 => "u16",
            ScalarType::U32 => "u32",
            ScalarType::U64 => "u64",
            ScalarType::F32 => "f32",
            ScalarType::F64 => "f64",
            ScalarType::Char => "char",
            ScalarType::String => "String",
            ScalarType::DateTime => "DateTime",
            ScalarType::Enum(info) => info.name,
        }
    }

    /// Value used for an empty element of this type.
    pub fn default_scalar(self) -> Scalar {
        match self {
            ScalarType::Bool => Scalar::Bool(false),
            ScalarType::I8 | ScalarType::I16 | ScalarType::I32 | ScalarType::I64 => Scalar::Int(0),
            ScalarType::U8 | ScalarType::U16 | ScalarType::U32 | ScalarType::U64 => {
                Scalar::UInt(0)
            }
            ScalarType::F32 => Scalar::Single(0.0),
            ScalarType::F64 => Scalar::Float(0.0),
            ScalarType::Char => Scalar::Char('\0'),
            ScalarType::String => Scalar::Str(String::new()),
            ScalarType::DateTime => Scalar::DateTime(DateTime::<Utc>::UNIX_EPOCH),
            ScalarType::Enum(info) => Scalar::Enum(info.first_variant().unwrap_or_default()),
        }
    }

    /// Parses invariant text into a scalar of this type.
    pub fn parse(self, text: &str) -> Result<Scalar, ConversionError> {
        let target = self.type_name();
        match self {
            ScalarType::Bool => parse_bool(text).map(Scalar::Bool),
            ScalarType::I8 => parse_signed(text, i8::MIN.into(), i8::MAX.into(), target),
            ScalarType::I16 => parse_signed(text, i16::MIN.into(), i16::MAX.into(), target),
            ScalarType::I32 => parse_signed(text, i32::MIN.into(), i32::MAX.into(), target),
            ScalarType::I64 => parse_signed(text, i64::MIN, i64::MAX, target),
            ScalarType::U8 => parse_unsigned(text, u8::MAX.into(), target),
            ScalarType::U16 => parse_unsigned(text, u16::MAX.into(), target),
            ScalarType::U32 => parse_unsigned(text, u32::MAX.into(), target),
            ScalarType::U64 => parse_unsigned(text, u64::MAX, target),
            ScalarType::F32 => text
                .trim()
                .parse::<f32>()
                .map(Scalar::Single)
                .map_err(|_| ConversionError::invalid(text, target)),
            ScalarType::F64 => text
                .trim()
                .parse::<f64>()
                .map(Scalar::Float)
                .map_err(|_| ConversionError::invalid(text, target)),
            ScalarType::Char => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Scalar::Char(c)),
                    _ => Err(ConversionError::invalid(text, target)),
                }
            }
            ScalarType::String => Ok(Scalar::Str(text.to_string())),
            ScalarType::DateTime => parse_datetime(text).map(Scalar::DateTime),
            ScalarType::Enum(info) => info.lookup(text).map(Scalar::Enum).ok_or_else(|| {
                ConversionError::UnknownVariant {
                    text: text.to_string(),
                    enum_name: info.name,
                }
            }),
        }
    }
}

fn parse_bool(text: &str) -> Result<bool, ConversionError> {
    let trimmed = text.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(ConversionError::invalid(text, "bool"))
    }
}

fn parse_signed(
    text: &str,
    min: i64,
    max: i64,
    target: &'static str,
) -> Result<Scalar, ConversionError> {
    let trimmed = text.trim();
    let value = trimmed.parse::<i128>().map_err(|_| ConversionError::invalid(text, target))?;
    if value < i128::from(min) || value > i128::from(max) {
        return Err(ConversionError::out_of_range(trimmed, target));
    }
    i64::try_from(value)
        .map(Scalar::Int)
        .map_err(|_| ConversionError::out_of_range(trimmed, target))
}

fn parse_unsigned(text: &str, max: u64, target: &'static str) -> Result<Scalar, ConversionError> {
    let trimmed = text.trim();
    let value = trimmed.parse::<i128>().map_err(|_| ConversionError::invalid(text, target))?;
    if value < 0 || value > i128::from(max) {
        return Err(ConversionError::out_of_range(trimmed, target));
    }
    u64::try_from(value)
        .map(Scalar::UInt)
        .map_err(|_| ConversionError::out_of_range(trimmed, target))
}

fn parse_datetime(text: &str) -> Result<DateTime<Utc>, ConversionError> {
    let trimmed = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    // Offset-less timestamps are taken as UTC.
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| ConversionError::invalid(text, "DateTime"))
}

/// Whether `c` matches the XML 1.0 `Char` production.
pub fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}'
    )
}

/// An owned scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Single(f32),
    Float(f64),
    Char(char),
    Str(String),
    DateTime(DateTime<Utc>),
    Enum(&'static str),
}

impl Scalar {
    /// Renders the value in its invariant text form.
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(v) => v.to_string(),
            Scalar::UInt(v) => v.to_string(),
            Scalar::Single(v) => v.to_string(),
            Scalar::Float(v) => v.to_string(),
            Scalar::Char(c) => c.to_string(),
            Scalar::Str(s) => s.clone(),
            Scalar::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::Nanos, true),
            Scalar::Enum(name) => (*name).to_string(),
        }
    }

    /// [`Scalar::to_text`], rejecting characters an XML document cannot carry.
    pub fn to_xml_text(&self) -> Result<String, ConversionError> {
        let text = self.to_text();
        match text.chars().find(|c| !is_xml_char(*c)) {
            Some(c) => Err(ConversionError::Unrepresentable {
                code: u32::from(c),
                target: self.kind_name(),
            }),
            None => Ok(text),
        }
    }

    /// Short label for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Scalar::Bool(_) => "bool",
            Scalar::Int(_) => "signed integer",
            Scalar::UInt(_) => "unsigned integer",
            Scalar::Single(_) | Scalar::Float(_) => "float",
            Scalar::Char(_) => "char",
            Scalar::Str(_) => "string",
            Scalar::DateTime(_) => "DateTime",
            Scalar::Enum(_) => "enum",
        }
    }

    fn mismatch(&self, expected: &'static str) -> ConversionError {
        ConversionError::Mismatch {
            expected,
            found: self.kind_name(),
        }
    }

    pub fn into_bool(self) -> Result<bool, ConversionError> {
        match self {
            Scalar::Bool(b) => Ok(b),
            Scalar::Str(s) => parse_bool(&s),
            other => Err(other.mismatch("bool")),
        }
    }

    /// Narrows an integer scalar into a concrete signed width.
    pub fn into_signed<T: TryFrom<i64>>(self, target: &'static str) -> Result<T, ConversionError> {
        let wide = match self {
            Scalar::Int(v) => v,
            Scalar::UInt(v) => i64::try_from(v).map_err(|_| ConversionError::out_of_range(v, target))?,
            other => return Err(other.mismatch(target)),
        };
        T::try_from(wide).map_err(|_| ConversionError::out_of_range(wide, target))
    }

    /// Narrows an integer scalar into a concrete unsigned width.
    pub fn into_unsigned<T: TryFrom<u64>>(
        self,
        target: &'static str,
    ) -> Result<T, ConversionError> {
        let wide = match self {
            Scalar::UInt(v) => v,
            Scalar::Int(v) => u64::try_from(v).map_err(|_| ConversionError::out_of_range(v, target))?,
            other => return Err(other.mismatch(target)),
        };
        T::try_from(wide).map_err(|_| ConversionError::out_of_range(wide, target))
    }

    pub fn into_f64(self) -> Result<f64, ConversionError> {
        match self {
            Scalar::Float(v) => Ok(v),
            Scalar::Single(v) => Ok(f64::from(v)),
            Scalar::Int(v) => Ok(v as f64),
            Scalar::UInt(v) => Ok(v as f64),
            other => Err(other.mismatch("f64")),
        }
    }

    pub fn into_f32(self) -> Result<f32, ConversionError> {
        match self {
            Scalar::Single(v) => Ok(v),
            Scalar::Float(v) => Ok(v as f32),
            Scalar::Int(v) => Ok(v as f32),
            Scalar::UInt(v) => Ok(v as f32),
            other => Err(other.mismatch("f32")),
        }
    }

    pub fn into_char(self) -> Result<char, ConversionError> {
        match self {
            Scalar::Char(c) => Ok(c),
            Scalar::Str(s) => ScalarType::Char.parse(&s)?.into_char(),
            other => Err(other.mismatch("char")),
        }
    }

    pub fn into_string(self) -> Result<String, ConversionError> {
        match self {
            Scalar::Str(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn into_datetime(self) -> Result<DateTime<Utc>, ConversionError> {
        match self {
            Scalar::DateTime(dt) => Ok(dt),
            Scalar::Str(s) => parse_datetime(&s),
            other => Err(other.mismatch("DateTime")),
        }
    }

    /// Resolves an enum scalar (or a bare variant name) into `E`.
    pub fn into_enum<E: XmlEnum>(self) -> Result<E, ConversionError> {
        let name = match &self {
            Scalar::Enum(name) => *name,
            Scalar::Str(s) => s.as_str(),
            other => return Err(other.mismatch(E::INFO.name)),
        };
        E::from_variant_name(name).ok_or_else(|| ConversionError::UnknownVariant {
            text: name.to_string(),
            enum_name: E::INFO.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    static STATUS: EnumInfo = EnumInfo {
        name: "ProgressStatus",
        variants: &["Pending", "Running", "Done"],
    };

    #[test]
    fn test_bool_is_case_insensitive() {
        assert_eq!(ScalarType::Bool.parse("TRUE"), Ok(Scalar::Bool(true)));
        assert_eq!(ScalarType::Bool.parse(" false "), Ok(Scalar::Bool(false)));
        assert!(ScalarType::Bool.parse("yes").is_err());
        assert_eq!(Scalar::Bool(true).to_text(), "true");
    }

    #[test]
    fn test_integer_width_is_checked() {
        assert_eq!(ScalarType::I8.parse("127"), Ok(Scalar::Int(127)));
        assert!(matches!(
            ScalarType::I8.parse("128"),
            Err(ConversionError::OutOfRange { .. })
        ));
        assert!(matches!(
            ScalarType::U16.parse("-1"),
            Err(ConversionError::OutOfRange { .. })
        ));
        assert!(matches!(
            ScalarType::I32.parse("12a"),
            Err(ConversionError::Invalid { .. })
        ));
        assert_eq!(ScalarType::U64.parse(&u64::MAX.to_string()), Ok(Scalar::UInt(u64::MAX)));
    }

    #[test]
    fn test_float_text_round_trips() {
        let text = Scalar::Float(0.1).to_text();
        assert_eq!(text, "0.1");
        assert_eq!(ScalarType::F64.parse(&text), Ok(Scalar::Float(0.1)));
        assert_eq!(Scalar::Single(1.5).to_text(), "1.5");
    }

    #[test]
    fn test_datetime_uses_fixed_utc_form() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        let text = Scalar::DateTime(dt).to_text();
        assert_eq!(text, "2024-03-09T14:05:00.000000000Z");
        assert_eq!(ScalarType::DateTime.parse(&text), Ok(Scalar::DateTime(dt)));

        let offset = ScalarType::DateTime.parse("2024-03-09T16:05:00+02:00").unwrap();
        assert_eq!(offset, Scalar::DateTime(dt));

        let naive = ScalarType::DateTime.parse("2024-03-09T14:05:00").unwrap();
        assert_eq!(naive, Scalar::DateTime(dt));
    }

    #[test]
    fn test_enum_lookup_ignores_case() {
        let ty = ScalarType::Enum(&STATUS);
        assert_eq!(ty.parse("running"), Ok(Scalar::Enum("Running")));
        assert_eq!(ty.parse("DONE"), Ok(Scalar::Enum("Done")));
        assert!(matches!(
            ty.parse("Cancelled"),
            Err(ConversionError::UnknownVariant { .. })
        ));
        assert_eq!(ty.default_scalar(), Scalar::Enum("Pending"));
        assert_eq!(ty.type_name(), "ProgressStatus");
    }

    #[test]
    fn test_char_requires_single_character() {
        assert_eq!(ScalarType::Char.parse("x"), Ok(Scalar::Char('x')));
        assert!(ScalarType::Char.parse("xy").is_err());
        assert!(ScalarType::Char.parse("").is_err());
    }

    #[test]
    fn test_control_characters_are_not_xml_text() {
        assert_eq!(
            Scalar::Char('\0').to_xml_text(),
            Err(ConversionError::Unrepresentable {
                code: 0,
                target: "char"
            })
        );
        assert!(Scalar::Str("bell\u{7}".into()).to_xml_text().is_err());
        assert!(Scalar::Str("\u{FFFF}".into()).to_xml_text().is_err());
        assert_eq!(
            Scalar::Str("tab\tline\n\u{1F600}".into()).to_xml_text(),
            Ok("tab\tline\n\u{1F600}".to_string())
        );
        assert_eq!(Scalar::Char('x').to_xml_text(), Ok("x".to_string()));
    }

    #[test]
    fn test_narrowing_conversions() {
        assert_eq!(Scalar::Int(42).into_signed::<i16>("i16"), Ok(42));
        assert!(Scalar::Int(70_000).into_signed::<i16>("i16").is_err());
        assert_eq!(Scalar::UInt(7).into_signed::<i32>("i32"), Ok(7));
        assert!(Scalar::Int(-1).into_unsigned::<u8>("u8").is_err());
        assert!(matches!(
            Scalar::Str("x".into()).into_signed::<i32>("i32"),
            Err(ConversionError::Mismatch { .. })
        ));
    }

    #[test]
    fn test_strings_are_kept_verbatim() {
        assert_eq!(
            ScalarType::String.parse("  padded  "),
            Ok(Scalar::Str("  padded  ".to_string()))
        );
        assert_eq!(ScalarType::String.default_scalar(), Scalar::Str(String::new()));
    }
}
