use serde_json::{Map, Value};

/// Element count used for number arrays that do not declare `count`.
pub const DEFAULT_ARRAY_LEN: usize = 2;

const CHOICE_PREFIX: &str = "choice_";

/// Kind of a schema entry, dispatched from the `type` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarKind {
    /// `true`/`false` toggle.
    Boolean,
    /// Single number.
    Number,
    /// Fixed-length array of numbers.
    NumberArray,
    /// Free text.
    String,
    /// One of an ordered list of text choices.
    Choice,
    /// Grouping marker; never part of the state.
    Section,
    /// Unknown or missing `type` tag. Holds the raw tag when there was one.
    Untyped(Option<String>),
}

impl VarKind {
    /// Dispatch a `type` tag.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("boolean") => VarKind::Boolean,
            Some("number") => VarKind::Number,
            Some("number_array") => VarKind::NumberArray,
            Some("string") => VarKind::String,
            Some("choice") => VarKind::Choice,
            Some("section") => VarKind::Section,
            other => VarKind::Untyped(other.map(str::to_string)),
        }
    }

    /// The tag this kind was parsed from, if any.
    pub fn tag(&self) -> Option<&str> {
        match self {
            VarKind::Boolean => Some("boolean"),
            VarKind::Number => Some("number"),
            VarKind::NumberArray => Some("number_array"),
            VarKind::String => Some("string"),
            VarKind::Choice => Some("choice"),
            VarKind::Section => Some("section"),
            VarKind::Untyped(tag) => tag.as_deref(),
        }
    }
}

/// Schema metadata for one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    /// Dispatched `type` tag.
    pub kind: VarKind,
    /// Literal default; wins over type-based defaulting.
    pub default: Option<Value>,
    /// Edits are refused when set.
    pub readonly: bool,
    /// Display label.
    pub label: Option<String>,
    /// Display help text.
    pub help: Option<String>,
    /// Declared element count for number arrays.
    pub count: Option<usize>,
    /// Lower bound hint.
    pub min: Option<f64>,
    /// Upper bound hint.
    pub max: Option<f64>,
    /// Step hint.
    pub step: Option<f64>,
    /// Ordered choices, resolved at parse time.
    pub choices: Vec<String>,
    /// Preview image location, opaque to the editor.
    pub preview_url: Option<String>,
}

impl Descriptor {
    /// A descriptor of the given kind with every optional field unset.
    pub fn new(kind: VarKind) -> Self {
        Self {
            kind,
            default: None,
            readonly: false,
            label: None,
            help: None,
            count: None,
            min: None,
            max: None,
            step: None,
            choices: Vec::new(),
            preview_url: None,
        }
    }

    /// Parse a descriptor object. Non-object values yield an untyped descriptor.
    pub fn from_value(value: &Value) -> Self {
        match value.as_object() {
            Some(obj) => Self::from_map(obj),
            None => Self::new(VarKind::Untyped(None)),
        }
    }

    /// Parse a descriptor from its JSON fields.
    pub fn from_map(obj: &Map<String, Value>) -> Self {
        let text = |key: &str| obj.get(key).and_then(Value::as_str).map(str::to_string);
        let number = |key: &str| obj.get(key).and_then(Value::as_f64);

        Self {
            kind: VarKind::from_tag(obj.get("type").and_then(Value::as_str)),
            default: obj.get("default").cloned(),
            readonly: obj.get("readonly").and_then(Value::as_bool).unwrap_or(false),
            label: text("label"),
            help: text("help"),
            count: obj
                .get("count")
                .and_then(Value::as_u64)
                .and_then(|n| usize::try_from(n).ok()),
            min: number("min"),
            max: number("max"),
            step: number("step"),
            choices: resolve_choices(obj),
            preview_url: text("previewURL"),
        }
    }

    /// Whether this entry is a section marker rather than a variable.
    pub fn is_section(&self) -> bool {
        self.kind == VarKind::Section
    }

    /// Number of elements a number array holds.
    pub fn array_len(&self) -> usize {
        self.count.unwrap_or(DEFAULT_ARRAY_LEN)
    }

    /// Canonical default value.
    ///
    /// A literal `default` is returned as a deep copy. Otherwise the value
    /// depends on the kind; sections and untyped entries have no sensible
    /// default and yield `Value::Null`.
    pub fn default_value(&self) -> Value {
        if let Some(literal) = &self.default {
            return literal.clone();
        }
        match &self.kind {
            VarKind::Boolean => Value::Bool(false),
            VarKind::Number => Value::from(0),
            VarKind::NumberArray => Value::Array(vec![Value::from(0); self.array_len()]),
            VarKind::String => Value::String(String::new()),
            VarKind::Choice => Value::String(self.choices.first().cloned().unwrap_or_default()),
            VarKind::Section | VarKind::Untyped(_) => Value::Null,
        }
    }

    /// Default for one element of a number array.
    pub fn default_element(&self, index: usize) -> Value {
        match self.default_value() {
            Value::Array(items) => items.get(index).cloned().unwrap_or_else(|| Value::from(0)),
            _ => Value::from(0),
        }
    }
}

/// Default value for a possibly missing descriptor.
pub fn default_value_for(descriptor: Option<&Descriptor>) -> Value {
    descriptor.map(Descriptor::default_value).unwrap_or(Value::Null)
}

/// Choices of a possibly missing descriptor.
pub fn resolve_choices_for(descriptor: Option<&Descriptor>) -> Vec<String> {
    descriptor.map(|d| d.choices.clone()).unwrap_or_default()
}

/// Resolve the ordered choice list of a raw descriptor object.
///
/// A `choices` array wins and is returned in order. Otherwise every
/// `choice_<N>` field is collected and ordered by ascending `N`.
pub fn resolve_choices(obj: &Map<String, Value>) -> Vec<String> {
    if let Some(Value::Array(items)) = obj.get("choices") {
        return items.iter().map(value_to_text).collect();
    }

    let mut numbered: Vec<(i64, String)> = obj
        .iter()
        .filter_map(|(key, value)| {
            let index = key.strip_prefix(CHOICE_PREFIX)?.parse::<i64>().ok()?;
            Some((index, value_to_text(value)))
        })
        .collect();
    numbered.sort_by_key(|(index, _)| *index);
    numbered.into_iter().map(|(_, text)| text).collect()
}

/// Text form of a choice entry.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}
