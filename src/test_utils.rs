use std::path::{Path, PathBuf};

use anyhow::bail;
use itertools::Itertools;
use serde::{de::{Error, Visitor}, Deserialize};

use crate::{parser::parse_all, value::Value};

/// What one top-level form of a fixture program should produce.
#[derive(Debug, Clone)]
pub enum ExpectedOutcome {
    /// The printed value, and the text the form wrote to the output port.
    Value { output: String, display: Option<String> },

    /// The kind of error the form fails with.
    Error(String),
}

struct ExpectedOutcomeVisitor;

impl<'de> Deserialize<'de> for ExpectedOutcome {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de> {

        deserializer.deserialize_map(ExpectedOutcomeVisitor)
    }
}

impl<'de> Visitor<'de> for ExpectedOutcomeVisitor {
    type Value = ExpectedOutcome;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(formatter, "A structure whose first key is the boolean 'ok'. If it's okay, then 'output' and optionally 'display', otherwise 'type'")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: serde::de::MapAccess<'de>, {

        if map.next_key::<String>()? != Some("ok".to_owned()) {
            return Err(A::Error::custom("First key should be 'ok'"))
        }

        let ok: bool = map.next_value()?;
        let second = map.next_key::<String>()?
            .ok_or(A::Error::custom("Must have at least two keys"))?;

        let result = if ok {
            if second != "output" {
                return Err(A::Error::custom("Second ok key should be 'output'"))
            }
            let output: String = map.next_value()?;

            let display = match map.next_key::<String>()?.as_deref() {
                Some("display") => Some(map.next_value::<String>()?),
                Some(other) => return Err(A::Error::custom(format!("Unexpected key '{}'", other))),
                None => return Ok(ExpectedOutcome::Value { output, display: None }),
            };
            ExpectedOutcome::Value { output, display }
        } else {
            if second != "type" {
                return Err(A::Error::custom("Second key of a failure should be 'type'"))
            }
            ExpectedOutcome::Error(map.next_value()?)
        };

        if map.next_key::<String>()?.is_some() {
            return Err(A::Error::custom("Too many keys"));
        }

        Ok(result)
    }
}

fn load_input_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Value>> {
    let source = std::fs::read_to_string(path)?;
    Ok(parse_all(&source)?)
}

fn load_output_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<ExpectedOutcome>> {
    let source = std::fs::read(path)?;
    let result: Vec<ExpectedOutcome> = serde_json::from_slice(&source)?;
    Ok(result)
}

/// Pairs every form of `test_inputs/<testcase>.scm` with its entry in
/// `test_outputs/<testcase>.json`.
pub fn load_test_pair(testcase: &str) -> anyhow::Result<Vec<(Value, ExpectedOutcome)>> {
    let base_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let input = load_input_file(base_path.join("test_inputs").join(format!("{}.scm", testcase)))?;
    let output = load_output_file(base_path.join("test_outputs").join(format!("{}.json", testcase)))?;

    if input.len() != output.len() {
        bail!("Testcase {} has {} forms but {} expected outcomes", testcase, input.len(), output.len());
    }
    Ok(input.into_iter().zip(output).collect_vec())
}

pub fn all_testcases() -> impl Iterator<Item = &'static str> {
    [
        "literals",
        "special_forms",
        "errors",
        "tail_calls",
        "continuations",
        "redefinition",
        "higher_order",
        "display",
    ].into_iter()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_expectations() -> anyhow::Result<()> {
        let outcomes: Vec<ExpectedOutcome> = serde_json::from_str(r#"[
            {"ok": true, "output": "3"},
            {"ok": true, "output": "okay", "display": "hi"},
            {"ok": false, "type": "Unbound"}
        ]"#)?;

        assert!(matches!(&outcomes[0], ExpectedOutcome::Value { output, display: None } if output == "3"));
        assert!(matches!(&outcomes[1], ExpectedOutcome::Value { display: Some(text), .. } if text == "hi"));
        assert!(matches!(&outcomes[2], ExpectedOutcome::Error(kind) if kind == "Unbound"));
        Ok(())
    }

    #[test]
    fn rejects_misordered_keys() {
        assert!(serde_json::from_str::<Vec<ExpectedOutcome>>(r#"[{"output": "3", "ok": true}]"#).is_err());
        assert!(serde_json::from_str::<Vec<ExpectedOutcome>>(r#"[{"ok": false, "output": "3"}]"#).is_err());
        assert!(serde_json::from_str::<Vec<ExpectedOutcome>>(r#"[{"ok": true, "output": "3", "type": "x"}]"#).is_err());
    }

    #[test]
    fn every_fixture_lines_up() -> anyhow::Result<()> {
        for testcase in all_testcases() {
            load_test_pair(testcase)?;
        }
        Ok(())
    }
}
