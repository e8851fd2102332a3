use regex::Regex;
use serde::{Deserialize, Deserializer, de::Error as _};
use serde_json::Value;

lazy_static::lazy_static! {
    pub static ref QUALIFIED_NAME_RE: Regex = Regex::new(r"^(?:(?P<prefix>.*):)?(?P<local>[^:]*)$").unwrap();
}

/// CBV web vocabulary prefixes, e.g. `BizStep-shipping`.
const CBV_WEB_PREFIXES: [&str; 6] = ["BizStep", "Disp", "BTT", "SDT", "ER", "ERC"];

/// Read a diagram/form identifier that may be encoded as a number or a numeric string.
pub fn node_id_from_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read a form counter the way the editor stores it: numbers, numeric strings, or garbage
/// (which counts as nothing).
pub fn count_from_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u32)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f as u32),
        _ => None,
    }
}

pub fn de_node_id<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    node_id_from_value(&value)
        .ok_or_else(|| D::Error::custom(format!("expected a numeric node id, found {value}")))
}

pub fn de_opt_node_id<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => node_id_from_value(&value)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected a numeric node id, found {value}"))),
    }
}

pub fn de_lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(count_from_value).unwrap_or(0))
}

/// Split `prefix:local` at the last colon; names without a colon have an empty prefix.
pub fn split_qualified_name(key: &str) -> (&str, &str) {
    QUALIFIED_NAME_RE
        .captures(key)
        .map(|caps| {
            (
                caps.name("prefix").map_or("", |m| m.as_str()),
                caps.name("local").map_or(key, |m| m.as_str()),
            )
        })
        .unwrap_or(("", key))
}

/// Last segment of a CBV URN or web URI (`urn:epcglobal:cbv:bizstep:shipping`,
/// `https://ref.gs1.org/cbv/BizStep-shipping`), or the value itself.
pub fn vocabulary_term(raw: &str) -> &str {
    let tail = raw.rsplit([':', '/']).next().unwrap_or(raw);
    tail.split_once('-')
        .filter(|(prefix, _)| CBV_WEB_PREFIXES.contains(prefix))
        .map(|(_, term)| term)
        .unwrap_or(tail)
}

/// Word-wrap `text` so that no line exceeds `width` characters where a break is possible.
/// Existing line breaks are kept.
pub fn wrap_text(text: &str, width: usize) -> String {
    let mut out = Vec::new();
    for line in text.split('\n') {
        let mut current = String::new();
        for word in line.split_whitespace() {
            if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
                out.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        out.push(current);
    }
    out.join("\n")
}
