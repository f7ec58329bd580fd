//! Schema entries, value kinds and series naming.

use crate::storage::PerfValue;

/// `perf schema` type code of a long-running counter (`U64 | COUNTER`).
const TYPE_CODE_COUNTER: f64 = 10.0;

/// How a series is exposed to the scraper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Gauge,
    Counter,
}

impl ValueKind {
    /// Maps a `perf schema` type code to a value kind.
    ///
    /// `10` is a monotonic counter. `2` (value) and `5` (average) are gauges,
    /// and so is every code not listed here.
    pub fn from_type_code(code: f64) -> Self {
        if code == TYPE_CODE_COUNTER {
            ValueKind::Counter
        } else {
            ValueKind::Gauge
        }
    }
}

/// Type and description of one counter path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchemaEntry<'a> {
    pub kind: ValueKind,
    pub description: &'a str,
}

/// Reads a schema node of the form `{"type": <code>, "description": <text>}`.
pub fn schema_entry(node: &PerfValue) -> Option<SchemaEntry<'_>> {
    let code = node.get("type")?.as_number()?;
    let description = node
        .get("description")
        .and_then(PerfValue::as_str)
        .unwrap_or_default();
    Some(SchemaEntry {
        kind: ValueKind::from_type_code(code),
        description,
    })
}

/// Looks up the schema entry of `counter` (top-level counter) or of
/// `counter`/`field` (entry inside a section).
pub fn lookup<'a>(
    schema: &'a PerfValue,
    counter: &str,
    field: Option<&str>,
) -> Option<SchemaEntry<'a>> {
    let node = schema.get(counter)?;
    match field {
        Some(field) => schema_entry(node.get(field)?),
        None => schema_entry(node),
    }
}

/// Counts the counter paths of `counters` that `schema` does not describe.
///
/// A non-zero result means the daemon answered `perf schema` before all of its
/// subsystems registered their counters.
pub fn missing_entries(schema: &PerfValue, counters: &PerfValue) -> usize {
    let Some(counters) = counters.as_map() else {
        return 0;
    };
    let mut missing = 0;
    for (name, value) in counters {
        match value {
            PerfValue::Number(_) => {
                if lookup(schema, name, None).is_none() {
                    missing += 1;
                }
            }
            // A top-level aggregate: its leaves share the counter's entry.
            PerfValue::Map(_) if lookup(schema, name, None).is_some() => {}
            PerfValue::Map(fields) => {
                missing += fields
                    .keys()
                    .filter(|field| lookup(schema, name, Some(field)).is_none())
                    .count();
            }
            _ => {}
        }
    }
    missing
}

/// Makes a counter name a valid series name component.
///
/// Hyphens and periods become underscores and runs of underscores collapse
/// into one, so the function is idempotent.
pub fn normalize_metric_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if c == '-' || c == '.' { '_' } else { c };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    out
}

/// Builds `<prefix>_<part>[_<part>...]`, normalized.
pub fn series_name(prefix: &str, parts: &[&str]) -> String {
    let mut name = prefix.to_string();
    for part in parts {
        name.push('_');
        name.push_str(part);
    }
    normalize_metric_name(&name)
}
