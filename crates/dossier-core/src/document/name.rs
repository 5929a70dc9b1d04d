//! Field name grammar.
//!
//! - `applicant_name` -- top-level scalar.
//! - `languages[]` -- top-level multi checkbox group.
//! - `sibling[2][name]` -- field `name` of the second `sibling` item.
//! - `sibling[#][name]` -- same, inside a template (index not yet assigned).
//! - `sibling[2][hobbies][]` -- multi checkbox group inside an item.
//!
//! Group and field segments are word characters (`[A-Za-z0-9_]`). Indices in
//! names are 1-based.

/// Suffix marking a multi checkbox group.
pub const MULTI_MARKER: &str = "[]";

/// Index placeholder used in templates.
pub const INDEX_PLACEHOLDER: &str = "#";

/// Index component of an indexed field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPart {
    Placeholder,
    /// 1-based position.
    Position(usize),
}

/// Parsed field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldName<'a> {
    Plain {
        name: &'a str,
        multi: bool,
    },
    Indexed {
        group: &'a str,
        index: IndexPart,
        field: &'a str,
        multi: bool,
    },
}

fn is_word(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl<'a> FieldName<'a> {
    /// Parse a raw field name. Returns `None` if it fits neither shape.
    pub fn parse(raw: &'a str) -> Option<Self> {
        let (base, multi) = match raw.strip_suffix(MULTI_MARKER) {
            Some(base) => (base, true),
            None => (raw, false),
        };

        let Some(open) = base.find('[') else {
            return is_word(base).then_some(Self::Plain { name: base, multi });
        };

        let group = &base[..open];
        let rest = base[open..].strip_prefix('[')?.strip_suffix(']')?;
        let (index, field) = rest.split_once("][")?;

        if !is_word(group) || !is_word(field) {
            return None;
        }

        let index = if index == INDEX_PLACEHOLDER {
            IndexPart::Placeholder
        } else if !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()) {
            match index.parse::<usize>().ok()? {
                0 => return None,
                n => IndexPart::Position(n),
            }
        } else {
            return None;
        };

        Some(Self::Indexed {
            group,
            index,
            field,
            multi,
        })
    }

    pub fn is_multi(&self) -> bool {
        match self {
            Self::Plain { multi, .. } | Self::Indexed { multi, .. } => *multi,
        }
    }

    /// Group this name belongs to, if indexed.
    pub fn group(&self) -> Option<&'a str> {
        match self {
            Self::Indexed { group, .. } => Some(group),
            Self::Plain { .. } => None,
        }
    }
}

/// Render an indexed name at the given 1-based position.
pub fn indexed_name(group: &str, position: usize, field: &str, multi: bool) -> String {
    let marker = if multi { MULTI_MARKER } else { "" };
    format!("{group}[{position}][{field}]{marker}")
}

/// Rewrite the index component of `raw` to `position`.
///
/// Names that are not indexed are returned unchanged.
pub fn with_position(raw: &str, position: usize) -> String {
    match FieldName::parse(raw) {
        Some(FieldName::Indexed {
            group,
            field,
            multi,
            ..
        }) => indexed_name(group, position, field, multi),
        _ => raw.to_string(),
    }
}

/// Turn `text` into a renumbering pattern by marking where the index goes.
///
/// Text that already carries the `#` placeholder is its own pattern.
/// Otherwise the last digit run equal to `current` (or, when `current` is
/// `None`, the last digit run at all) is replaced by `#`.
/// Returns `None` if the text does not embed an index.
pub fn index_pattern(text: &str, current: Option<usize>) -> Option<String> {
    if text.contains(INDEX_PLACEHOLDER) {
        return Some(text.to_string());
    }

    let bytes = text.as_bytes();
    let mut runs = Vec::new();
    let mut start = 0;
    while start < bytes.len() {
        if !bytes[start].is_ascii_digit() {
            start += 1;
            continue;
        }
        let mut end = start;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        runs.push((start, end));
        start = end;
    }

    // The index is the trailing run that matches, so `address1-line-1`
    // keeps its `address1` prefix.
    let (start, end) = runs.into_iter().rev().find(|&(start, end)| match current {
        Some(n) => text[start..end].parse::<usize>().ok() == Some(n),
        None => true,
    })?;
    Some(format!("{}{INDEX_PLACEHOLDER}{}", &text[..start], &text[end..]))
}

/// Fill a pattern produced by [`index_pattern`].
pub fn fill_pattern(pattern: &str, position: usize) -> String {
    pattern.replace(INDEX_PLACEHOLDER, &position.to_string())
}
