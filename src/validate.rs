//! Best-effort parsing of structured model output.
//!
//! [`validate_response`] never fails: every unusable reply degrades to the
//! schema's [`Default`] instance. Callers tell success from failure by
//! comparing against that default, typically through a dedicated sentinel
//! variant or field.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

static BRACED_OBJECT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").ok());

/// Structured shape expected from a model reply.
///
/// Allowed values belong in the type itself, e.g. an enum whose variants are
/// the permitted strings. [`ResponseSchema::check`] covers constraints serde
/// cannot express.
///
/// # Examples
///
/// ```
/// use parley_llm::{ResponseSchema, validate_response};
/// use serde::Deserialize;
///
/// #[derive(Debug, Default, PartialEq, Deserialize)]
/// struct Score {
///     value: u8,
/// }
///
/// impl ResponseSchema for Score {
///     fn check(&self) -> Result<(), String> {
///         if self.value <= 10 {
///             Ok(())
///         } else {
///             Err(format!("score {} out of range", self.value))
///         }
///     }
/// }
///
/// assert_eq!(validate_response::<Score>(r#"{"value": 7}"#), Score { value: 7 });
/// assert_eq!(validate_response::<Score>(r#"{"value": 70}"#), Score::default());
/// ```
pub trait ResponseSchema: DeserializeOwned + Default {
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Parses `raw` into `T`, falling back to `T::default()` on any failure.
///
/// Steps, in order:
/// 1. empty input yields the default
/// 2. code fences and the literal token `json` are stripped
/// 3. the cleaned text is parsed as JSON
/// 4. failing that, the outermost `{...}` span is extracted and parsed
/// 5. the parsed value is deserialized into `T` and passed through [`ResponseSchema::check`]
pub fn validate_response<T: ResponseSchema>(raw: &str) -> T {
    if raw.is_empty() {
        warn!("empty reply, using default");
        return T::default();
    }

    let cleaned = strip_formatting(raw);
    let value = match parse_strict(&cleaned) {
        Ok(value) => value,
        Err(strict_err) => {
            warn!(error = %strict_err, "reply is not valid JSON, extracting braced object");
            match extract_braced(&cleaned) {
                Some(value) => value,
                None => {
                    warn!("no parseable object in reply, using default");
                    return T::default();
                }
            }
        }
    };

    match conform::<T>(value) {
        Ok(parsed) => parsed,
        Err(reason) => {
            warn!(%reason, "reply does not match expected schema, using default");
            T::default()
        }
    }
}

fn strip_formatting(raw: &str) -> String {
    raw.replace("```", "").replace("json", "")
}

fn parse_strict(text: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(text)
}

fn extract_braced(text: &str) -> Option<Value> {
    let regex = BRACED_OBJECT.as_ref()?;
    let candidate = regex.find(text)?;
    serde_json::from_str(candidate.as_str()).ok()
}

fn conform<T: ResponseSchema>(value: Value) -> Result<T, String> {
    let parsed: T = serde_json::from_value(value).map_err(|err| err.to_string())?;
    parsed.check()?;
    Ok(parsed)
}
