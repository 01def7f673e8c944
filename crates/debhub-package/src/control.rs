//! Parser for RFC822-style control paragraphs.

use indexmap::IndexMap;

use crate::error::{PackageError, Result};

/// One control paragraph: field names mapped to values, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paragraph {
    fields: IndexMap<String, String>,
}

impl Paragraph {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Splits control text into paragraphs.
///
/// Paragraphs are separated by blank lines. A line starting with a space or tab continues the
/// previous field's value; continuation lines are joined with `\n`. Lines starting with `#` are
/// comments. A repeated field within a paragraph keeps the last value.
///
/// # Errors
///
/// * [`PackageError::MalformedControl`] for a continuation line with no field to continue, a
///   line without a `:` separator, or an empty field name.
///
/// # Example
///
/// ```
/// use debhub_package::control::parse_paragraphs;
///
/// let paragraphs = parse_paragraphs("Package: foo\nVersion: 1.0\n").unwrap();
/// assert_eq!(paragraphs.len(), 1);
/// assert_eq!(paragraphs[0].get("Version"), Some("1.0"));
/// ```
pub fn parse_paragraphs(text: &str) -> Result<Vec<Paragraph>> {
    let mut paragraphs = Vec::new();
    let mut current = Paragraph::default();
    let mut last_field: Option<String> = None;

    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
            last_field = None;
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            let value = last_field
                .as_ref()
                .and_then(|field| current.fields.get_mut(field))
                .ok_or_else(|| {
                    PackageError::MalformedControl(format!(
                        "line {}: continuation without a field",
                        idx + 1
                    ))
                })?;
            value.push('\n');
            value.push_str(line.trim());
            continue;
        }

        let (name, value) = line.split_once(':').ok_or_else(|| {
            PackageError::MalformedControl(format!("line {}: missing `:` separator", idx + 1))
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(PackageError::MalformedControl(format!(
                "line {}: empty field name",
                idx + 1
            )));
        }

        current
            .fields
            .insert(name.to_string(), value.trim().to_string());
        last_field = Some(name.to_string());
    }

    if !current.is_empty() {
        paragraphs.push(current);
    }

    Ok(paragraphs)
}
