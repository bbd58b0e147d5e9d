//! Ignore-masks: name patterns left out of a comparison

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};

use crate::{Error, Result};

/// Decides whether a name is covered by a mask.
pub trait MaskMatcher {
    /// `extension` is `None` for directories.
    fn matches(&self, name: &str, extension: Option<&str>) -> bool;
}

/// Characters no file name can contain, so no mask may either.
const FORBIDDEN: [char; 6] = ['\\', '/', '<', '>', ':', '"'];

/// A compiled mask string such as `*.bak;*.tmp|keep.tmp`.
///
/// Items are separated by `;`, and `;;` stands for a literal semicolon.
/// Everything after the single `|` excludes names the earlier items matched;
/// a mask starting with `|` first includes every name. Only `*` and `?` are
/// wildcards: every other character matches itself, ignoring case. An item
/// ending in `.` or `.*` also matches names without an extension, so `*.*`
/// covers every name and `Make*.*` covers `Makefile`.
#[derive(Debug, Clone)]
pub struct NameMask {
    text: String,
    include: GlobGroup,
    exclude: GlobGroup,
}

#[derive(Debug, Clone)]
struct GlobGroup {
    /// Every item, applied to every name.
    any: GlobSet,
    /// Items ending in `.` or `.*` with that tail cut off, applied only to
    /// names without an extension.
    bare: GlobSet,
}

impl GlobGroup {
    fn compile(mask: &str, items: &[String]) -> Result<Self> {
        let mut any = GlobSetBuilder::new();
        let mut bare = GlobSetBuilder::new();
        for item in items {
            any.add(literal_glob(mask, item)?);
            if let Some(stem) = item.strip_suffix(".*").or_else(|| item.strip_suffix('.')) {
                bare.add(literal_glob(mask, stem)?);
            }
        }
        Ok(GlobGroup {
            any: any.build().map_err(|e| invalid(mask, e))?,
            bare: bare.build().map_err(|e| invalid(mask, e))?,
        })
    }

    fn matches(&self, name: &str, has_extension: bool) -> bool {
        self.any.is_match(name) || (!has_extension && self.bare.is_match(name))
    }
}

/// A glob in which only `*` and `?` keep their meaning.
fn literal_glob(mask: &str, item: &str) -> Result<Glob> {
    let mut pattern = String::with_capacity(item.len() * 2);
    for c in item.chars() {
        if matches!(c, '[' | ']' | '{' | '}' | ',' | '!') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    GlobBuilder::new(&pattern)
        .case_insensitive(true)
        .literal_separator(true)
        .backslash_escape(true)
        .build()
        .map_err(|e| invalid(mask, e))
}

fn invalid(mask: &str, err: globset::Error) -> Error {
    Error::InvalidMask {
        mask: mask.to_string(),
        reason: err.to_string(),
    }
}

fn syntax_error(mask: &str, reason: impl Into<String>) -> Error {
    Error::InvalidMask {
        mask: mask.to_string(),
        reason: reason.into(),
    }
}

/// Trims an item and folds runs of `*`; empty items are dropped.
fn push_item(items: &mut Vec<String>, raw: &str) {
    let mut item = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        if c == '*' && item.ends_with('*') {
            continue;
        }
        item.push(c);
    }
    if !item.is_empty() {
        items.push(item);
    }
}

/// Splits a mask string into its include and exclude items.
fn parse(mask: &str) -> Result<(Vec<String>, Vec<String>)> {
    let mut include = Vec::new();
    let mut exclude: Option<Vec<String>> = None;
    let mut item = String::new();
    let mut chars = mask.chars().peekable();
    loop {
        let next = chars.next();
        match next {
            Some(';') if chars.peek() == Some(&';') => {
                chars.next();
                item.push(';');
            }
            Some(c) if c != ';' && c != '|' => {
                if c < ' ' || FORBIDDEN.contains(&c) {
                    return Err(syntax_error(mask, format!("{c:?} cannot appear in a mask")));
                }
                item.push(c);
            }
            _ => {
                push_item(exclude.as_mut().unwrap_or(&mut include), &item);
                item.clear();
                match next {
                    None => break,
                    Some('|') => {
                        if exclude.is_some() {
                            return Err(syntax_error(mask, "only one '|' is allowed"));
                        }
                        if include.is_empty() {
                            include.push("*".to_string());
                        }
                        exclude = Some(Vec::new());
                    }
                    _ => {}
                }
            }
        }
    }
    if exclude.as_ref().is_some_and(Vec::is_empty) {
        return Err(syntax_error(mask, "'|' must be followed by a mask"));
    }
    Ok((include, exclude.unwrap_or_default()))
}

impl NameMask {
    pub fn new(mask: &str) -> Result<Self> {
        let (include, exclude) = parse(mask)?;
        Ok(NameMask {
            text: mask.to_string(),
            include: GlobGroup::compile(mask, &include)?,
            exclude: GlobGroup::compile(mask, &exclude)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl MaskMatcher for NameMask {
    fn matches(&self, name: &str, extension: Option<&str>) -> bool {
        let has_extension = match extension {
            Some(ext) => !ext.is_empty(),
            None => name.contains('.'),
        };
        self.include.matches(name, has_extension) && !self.exclude.matches(name, has_extension)
    }
}
