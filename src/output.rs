/*!
 * Report Rendering
 * Turns monitor reports into stdout lines
 */

use crate::core::errors::ConfigError;
use crate::core::types::MountRecord;
use crate::monitor::Report;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// `MOUNTED: ...` lines and indented table dumps
    #[default]
    Text,
    /// One JSON object per report
    Json,
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(ConfigError::InvalidValue {
                var: "MOUNTWATCH_FORMAT",
                value: s.to_string(),
                expected: "text or json",
            }),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => f.write_str("text"),
            OutputFormat::Json => f.write_str("json"),
        }
    }
}

#[derive(Serialize)]
struct TableLine<'a> {
    mounts: &'a [MountRecord],
}

/// Render one report for `println!`
///
/// Event lines carry no newline. A text table dump already ends with one,
/// so printing it leaves the blank separator line after the dump.
pub fn render(report: &Report, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => match report {
            Report::Event(event) => event.to_string(),
            Report::Table(snapshot) => snapshot.dump().to_string(),
        },
        OutputFormat::Json => {
            let rendered = match report {
                Report::Event(event) => serde_json::to_string(event),
                Report::Table(snapshot) => serde_json::to_string(&TableLine {
                    mounts: snapshot.records(),
                }),
            };
            // Plain records and enums always serialize
            rendered.unwrap_or_default()
        }
    }
}
