// Copyright 2026 the PBS client authors. MIT license.
//! Parses the launcher's JSON argument blobs, grounded on
//! `JsonArgParser<ExecutableArgument>` in
//! `cc/process_launcher/argument_parser/src/json_arg_parser.h`.

use serde::Deserialize;
use thiserror::Error;

/// One child process to launch: the executable, its argv, and whether to
/// respawn it when it exits. `restart` defaults to `true`, matching the
/// original's default member initializer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExecutableArgument {
  pub executable_name: String,
  #[serde(default)]
  pub command_line_args: Vec<String>,
  #[serde(default = "default_restart")]
  pub restart: bool,
}

fn default_restart() -> bool {
  true
}

#[derive(Debug, Error)]
pub enum ArgParseError {
  #[error("argument blob is not valid JSON: {0}")]
  InvalidJson(#[from] serde_json::Error),
  #[error("argument blob is missing required field `executable_name`")]
  MissingExecutableName,
}

/// Parses one CLI argument into an `ExecutableArgument`. Unlike
/// `nlohmann::json`'s permissive missing-field handling, `serde`'s derive
/// already rejects a missing `executable_name` with a deserialize error;
/// this still maps that specific case to `MissingExecutableName` so the
/// error message matches the original's distinct "invalid exec arg json"
/// code rather than a generic parse failure.
pub fn parse_executable_argument(json: &str) -> Result<ExecutableArgument, ArgParseError> {
  let value: serde_json::Value = serde_json::from_str(json)?;
  if value.get("executable_name").is_none() {
    return Err(ArgParseError::MissingExecutableName);
  }
  Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn parses_minimal_blob_with_default_restart_true() {
    let parsed = parse_executable_argument(r#"{"executable_name": "/bin/echo"}"#).unwrap();
    assert_eq!(parsed.executable_name, "/bin/echo");
    assert!(parsed.command_line_args.is_empty());
    assert!(parsed.restart);
  }

  #[test]
  fn parses_full_blob() {
    let parsed = parse_executable_argument(
      r#"{"executable_name": "/bin/sleep", "command_line_args": ["1"], "restart": false}"#,
    )
    .unwrap();
    assert_eq!(parsed.executable_name, "/bin/sleep");
    assert_eq!(parsed.command_line_args, vec!["1".to_string()]);
    assert!(!parsed.restart);
  }

  #[test]
  fn missing_executable_name_is_a_distinct_error() {
    let result = parse_executable_argument(r#"{"command_line_args": []}"#);
    assert!(matches!(result, Err(ArgParseError::MissingExecutableName)));
  }

  #[test]
  fn malformed_json_is_invalid_json_error() {
    let result = parse_executable_argument("not json");
    assert!(matches!(result, Err(ArgParseError::InvalidJson(_))));
  }
}
