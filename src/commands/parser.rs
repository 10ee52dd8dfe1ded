//! Parsing of `##vso[area.event key=value;...]data` lines.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

/// Marker that starts a logging command anywhere in a line.
pub const COMMAND_PREFIX: &str = "##vso[";

static COMMAND_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^##vso\[(?P<area>[A-Za-z0-9_]+)\.(?P<event>[A-Za-z0-9_]+)(?:\s+(?P<props>[^\]]*))?\s*\](?P<data>.*)$")
        .expect("COMMAND_REGEX must compile")
});

/// Escapes applied to property values, undone in this order.
const PROPERTY_ESCAPES: &[(&str, &str)] = &[
    ("%3B", ";"),
    ("%0D", "\r"),
    ("%0A", "\n"),
    ("%5D", "]"),
    ("%25", "%"),
];

/// Escapes applied to command data.
const DATA_ESCAPES: &[(&str, &str)] = &[("%0D", "\r"), ("%0A", "\n"), ("%25", "%")];

/// A logging command found in step output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingCommand {
    /// Lower-cased area, e.g. `task`.
    pub area: String,
    /// Lower-cased event, e.g. `setvariable`.
    pub event: String,
    /// Properties keyed by lower-cased name.
    pub properties: BTreeMap<String, String>,
    pub data: String,
}

impl LoggingCommand {
    /// `area.event`, as used in messages.
    pub fn name(&self) -> String {
        format!("{}.{}", self.area, self.event)
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// A boolean property. Absent or unparsable values are `false`.
    pub fn flag(&self, key: &str) -> bool {
        self.property(key)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }
}

/// Outcome of looking for a command in one output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// Ordinary output.
    Text,
    Command(LoggingCommand),
    /// The line carries the command prefix but is not a valid command.
    Malformed,
}

/// Look for a logging command in `line`.
///
/// ```
/// use stepworker::commands::{parse_line, ParsedLine};
///
/// let ParsedLine::Command(command) = parse_line("##vso[task.setvariable variable=a;issecret=true]b") else {
///     panic!("expected a command");
/// };
/// assert_eq!(command.name(), "task.setvariable");
/// assert!(command.flag("issecret"));
/// assert_eq!(command.data, "b");
/// ```
pub fn parse_line(line: &str) -> ParsedLine {
    let Some(start) = line.find(COMMAND_PREFIX) else {
        return ParsedLine::Text;
    };
    let text = line[start..].trim_end_matches(['\r', '\n']);

    let Some(captures) = COMMAND_REGEX.captures(text) else {
        return ParsedLine::Malformed;
    };

    let mut properties = BTreeMap::new();
    if let Some(props) = captures.name("props") {
        for pair in props.as_str().split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            match pair.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    properties.insert(
                        key.trim().to_ascii_lowercase(),
                        unescape(value, PROPERTY_ESCAPES),
                    );
                }
                _ => return ParsedLine::Malformed,
            }
        }
    }

    ParsedLine::Command(LoggingCommand {
        area: captures["area"].to_ascii_lowercase(),
        event: captures["event"].to_ascii_lowercase(),
        properties,
        data: unescape(&captures["data"], DATA_ESCAPES),
    })
}

fn unescape(value: &str, escapes: &[(&str, &str)]) -> String {
    escapes
        .iter()
        .fold(value.to_string(), |acc, (from, to)| acc.replace(from, to))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(line: &str) -> LoggingCommand {
        match parse_line(line) {
            ParsedLine::Command(command) => command,
            other => panic!("expected a command, got {:?}", other),
        }
    }

    #[test]
    fn plain_output_is_text() {
        assert_eq!(parse_line("compiling stepworker v0.3.0"), ParsedLine::Text);
        assert_eq!(parse_line(""), ParsedLine::Text);
    }

    #[test]
    fn parses_properties_case_insensitively() {
        let cmd = command("##vso[Task.SetVariable Variable=Out;IsSecret=True]value");
        assert_eq!(cmd.area, "task");
        assert_eq!(cmd.event, "setvariable");
        assert_eq!(cmd.property("variable"), Some("Out"));
        assert!(cmd.flag("ISSECRET"));
        assert!(!cmd.flag("isreadonly"));
        assert_eq!(cmd.data, "value");
    }

    #[test]
    fn command_without_properties() {
        let cmd = command("##vso[task.setsecret]s3cr3t");
        assert!(cmd.properties.is_empty());
        assert_eq!(cmd.data, "s3cr3t");
    }

    #[test]
    fn command_after_leading_text() {
        let cmd = command("2024-01-01T00:00:00Z ##vso[task.complete result=Failed;]done\r\n");
        assert_eq!(cmd.property("result"), Some("Failed"));
        assert_eq!(cmd.data, "done");
    }

    #[test]
    fn unescapes_property_values_and_data() {
        let cmd = command("##vso[task.setvariable variable=x%3By%5D%25]line1%0Aline2%250A");
        assert_eq!(cmd.property("variable"), Some("x;y]%"));
        assert_eq!(cmd.data, "line1\nline2%0A");
    }

    #[test]
    fn malformed_commands_are_reported() {
        assert_eq!(parse_line("##vso[task]x"), ParsedLine::Malformed);
        assert_eq!(parse_line("##vso[task.setvariable x"), ParsedLine::Malformed);
        assert_eq!(
            parse_line("##vso[task.setvariable novalue]x"),
            ParsedLine::Malformed
        );
    }
}
