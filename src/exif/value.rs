use std::fmt;

/// A decoded EXIF value, independent of the parsing library.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Text(String),
    Integer(i64),
    Float(f64),
    /// A rational pair `(numerator, denominator)`. The denominator may be 0.
    Rational(i64, i64),
    List(Vec<TagValue>),
    Bytes(Vec<u8>),
}

impl TagValue {
    /// Numeric value of a plain number or rational pair.
    ///
    /// Returns `None` for non-numeric values and for rationals with a zero
    /// denominator.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TagValue::Integer(v) => Some(*v as f64),
            TagValue::Float(v) => Some(*v),
            TagValue::Rational(_, 0) => None,
            TagValue::Rational(n, d) => Some(*n as f64 / *d as f64),
            _ => None,
        }
    }

    /// The string content of a text value, with trailing NULs removed.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TagValue::Text(s) => Some(s.trim_end_matches('\0')),
            _ => None,
        }
    }

    /// Elements of a list value; a scalar is a one-element slice.
    pub fn components(&self) -> &[TagValue] {
        match self {
            TagValue::List(items) => items,
            other => std::slice::from_ref(other),
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Text(s) => f.write_str(s.trim_end_matches('\0')),
            TagValue::Integer(v) => write!(f, "{v}"),
            TagValue::Float(v) => write!(f, "{v}"),
            TagValue::Rational(n, d) => write!(f, "{n}/{d}"),
            TagValue::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            TagValue::Bytes(bytes) => {
                if bytes.len() <= 16 {
                    write!(f, "b'")?;
                    for b in bytes {
                        if b.is_ascii_graphic() || *b == b' ' {
                            write!(f, "{}", *b as char)?;
                        } else {
                            write!(f, "\\x{b:02x}")?;
                        }
                    }
                    write!(f, "'")
                } else {
                    write!(f, "<{} bytes>", bytes.len())
                }
            }
        }
    }
}
