//! Login form extraction.
//!
//! Captive portals serve anything from clean HTML5 to table soup with
//! unclosed tags, so parsing is a best-effort tree walk: elements missing a
//! required attribute are skipped, never treated as errors.

use scraper::{ElementRef, Html, Selector};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

// ── Ordered field map ───────────────────────────────────────────────────────

/// Insertion-ordered map of form field names to values.
///
/// Names are unique. Re-inserting a name replaces its value in place, so the
/// original position is kept and the last value wins.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldMap<V> {
    entries: Vec<(String, V)>,
}

/// A submission payload: every value is present.
pub type Payload = FieldMap<String>;

impl<V> FieldMap<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert or replace. Returns the previous value, if any.
    pub fn insert(&mut self, name: impl Into<String>, value: V) -> Option<V> {
        let name = name.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == name) {
            return Some(std::mem::replace(&mut slot.1, value));
        }
        self.entries.push((name, value));
        None
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == name)
    }

    pub fn remove(&mut self, name: &str) -> Option<V> {
        let idx = self.entries.iter().position(|(k, _)| k == name)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FieldMap<Option<String>> {
    /// Drop null-valued fields, producing a sendable payload.
    pub fn into_payload(self) -> Payload {
        self.entries
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect()
    }
}

impl Payload {
    /// Items sorted by name then value, the identity used for deduplication.
    pub fn sorted_items(&self) -> Vec<(String, String)> {
        let mut items = self.entries.clone();
        items.sort();
        items
    }

    /// Pairs in insertion order, as sent on the wire.
    pub fn as_pairs(&self) -> &[(String, String)] {
        &self.entries
    }
}

impl<K, T, V> FromIterator<(K, T)> for FieldMap<V>
where
    K: Into<String>,
    T: Into<V>,
{
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v.into());
        }
        map
    }
}

impl<V: Serialize> Serialize for FieldMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        f.write_str("}")
    }
}

// ── Parsed form ─────────────────────────────────────────────────────────────

/// HTTP method a form submits with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormMethod {
    #[default]
    Get,
    Post,
}

impl FormMethod {
    /// Parse a `method` attribute. Anything but `post` submits as GET.
    pub fn from_attr(attr: Option<&str>) -> Self {
        match attr.map(|m| m.trim().to_ascii_lowercase()) {
            Some(m) if m == "post" => Self::Post,
            _ => Self::Get,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// The form chosen as the login form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedForm {
    /// Raw `action` attribute; empty means "submit to the page itself".
    pub action: String,
    pub method: FormMethod,
    /// Default values. `None` marks a field the page declared without a value;
    /// such fields are dropped before submission unless something fills them.
    pub fields: FieldMap<Option<String>>,
    /// How many forms the page had in total.
    pub form_count: usize,
}

/// Input types whose `value` attribute is carried into the submission.
const VALUE_CARRYING_TYPES: [&str; 4] = ["hidden", "text", "email", "tel"];

/// Parse `html` and return its most complex form, or `None` if it has none.
///
/// Complexity is the number of `input`, `select` and `button` descendants;
/// the first form wins a tie.
pub fn extract_login_form(html: &str) -> Option<ParsedForm> {
    let document = Html::parse_document(html);
    let form_sel = Selector::parse("form").ok()?;
    let control_sel = Selector::parse("input, select, button").ok()?;

    let forms: Vec<ElementRef> = document.select(&form_sel).collect();
    let mut best: Option<(ElementRef, usize)> = None;
    for form in &forms {
        let controls = form.select(&control_sel).count();
        match best {
            Some((_, n)) if n >= controls => {}
            _ => best = Some((*form, controls)),
        }
    }
    let (form, _) = best?;

    Some(ParsedForm {
        action: form.value().attr("action").unwrap_or("").to_string(),
        method: FormMethod::from_attr(form.value().attr("method")),
        fields: extract_fields(form),
        form_count: forms.len(),
    })
}

fn extract_fields(form: ElementRef) -> FieldMap<Option<String>> {
    let mut fields = FieldMap::new();

    if let Ok(input_sel) = Selector::parse("input") {
        for input in form.select(&input_sel) {
            let el = input.value();
            let Some(name) = el.attr("name").filter(|n| !n.is_empty()) else {
                continue;
            };
            let input_type = el.attr("type").unwrap_or("text").to_ascii_lowercase();
            let value = if VALUE_CARRYING_TYPES.contains(&input_type.as_str()) {
                el.attr("value").map(str::to_string)
            } else {
                Some(String::new())
            };
            fields.insert(name, value);
        }
    }

    if let (Ok(select_sel), Ok(option_sel)) = (Selector::parse("select"), Selector::parse("option"))
    {
        for select in form.select(&select_sel) {
            let Some(name) = select.value().attr("name").filter(|n| !n.is_empty()) else {
                continue;
            };
            let chosen = select
                .select(&option_sel)
                .find(|o| o.value().attr("selected").is_some())
                .or_else(|| select.select(&option_sel).next());
            if let Some(value) = chosen.and_then(|o| o.value().attr("value")) {
                fields.insert(name, Some(value.to_string()));
            }
        }
    }

    fields
}
