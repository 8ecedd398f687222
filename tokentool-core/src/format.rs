//! Output rendering for an issued token.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;
use thiserror::Error;

use crate::token::TokenRecord;

/// Error type for rendering.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The requested output format does not exist.
    #[error("unknown output format '{name}' (expected one of: text, json, curlrc)")]
    UnknownFormat { name: String },

    /// The response body could not be re-encoded.
    #[error("failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Token followed by user, project, project domain and roles.
    #[default]
    Text,
    /// The response body, pretty-printed with tabs.
    Json,
    /// `header` lines for a curl config file (`curl -K`).
    Curlrc,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
            Self::Curlrc => "curlrc",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "curlrc" => Ok(Self::Curlrc),
            other => Err(FormatError::UnknownFormat {
                name: other.to_string(),
            }),
        }
    }
}

/// Render a token in the given format. The result ends with a newline.
///
/// `body` is the raw response body; only the JSON format uses it.
pub fn render(token: &TokenRecord, body: &[u8], format: OutputFormat) -> Result<String, FormatError> {
    match format {
        OutputFormat::Text => Ok(render_text(token)),
        OutputFormat::Json => render_json(body),
        OutputFormat::Curlrc => Ok(render_curlrc(token)),
    }
}

fn render_text(token: &TokenRecord) -> String {
    let mut out = String::new();
    out.push_str(token.subject_token.expose());
    out.push('\n');
    out.push_str(&format!("User:\t\t {}\n", token.user.id));
    out.push_str(&format!("Project:\t {}\n", token.project.id));
    out.push_str(&format!("Project domain:\t {}\n", token.project.domain.id));
    out.push_str("Roles:\t\t ");
    // Every name is followed by ", ", including the last one.
    for name in token.role_names() {
        out.push_str(name);
        out.push_str(", ");
    }
    out.push('\n');
    out
}

fn render_json(body: &[u8]) -> Result<String, FormatError> {
    let value: Value = serde_json::from_slice(body)?;

    let mut out = Vec::with_capacity(body.len() * 2);
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"\t"));
    value.serialize(&mut serializer)?;
    out.push(b'\n');

    Ok(String::from_utf8_lossy(&out).into_owned())
}

fn render_curlrc(token: &TokenRecord) -> String {
    format!(
        "header \"X-Auth-Token: {}\"\nheader \"Content-Type: application/json\"\n",
        token.subject_token.expose()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Secret;
    use crate::token::Role;
    use serde_json::json;

    fn record() -> (TokenRecord, Vec<u8>) {
        let body = serde_json::to_vec(&json!({
            "token": {
                "roles": [{"id": "r1", "name": "admin"}, {"id": "r2", "name": "member"}],
                "project": {"id": "p1", "name": "proj1", "domain": {"id": "d1"}},
                "user": {"id": "u1"}
            }
        }))
        .unwrap();
        let value = serde_json::from_slice(&body).unwrap();
        let token = TokenRecord::from_body(Secret::new("tok123"), &value).unwrap();
        (token, body)
    }

    #[test]
    fn test_parse_formats() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("curlrc".parse::<OutputFormat>().unwrap(), OutputFormat::Curlrc);
        assert!(matches!(
            "yaml".parse::<OutputFormat>(),
            Err(FormatError::UnknownFormat { ref name }) if name == "yaml"
        ));
    }

    #[test]
    fn test_render_text() {
        let (token, body) = record();
        let text = render(&token, &body, OutputFormat::Text).unwrap();
        assert_eq!(
            text,
            "tok123\nUser:\t\t u1\nProject:\t p1\nProject domain:\t d1\nRoles:\t\t admin, member, \n"
        );
    }

    #[test]
    fn test_render_text_preserves_role_order() {
        let (mut token, body) = record();
        token.roles = ["reader", "admin", "member"]
            .iter()
            .map(|name| Role {
                id: String::new(),
                name: name.to_string(),
            })
            .collect();

        let text = render(&token, &body, OutputFormat::Text).unwrap();
        assert!(text.ends_with("Roles:\t\t reader, admin, member, \n"));
    }

    #[test]
    fn test_render_curlrc() {
        let (token, body) = record();
        let rendered = render(&token, &body, OutputFormat::Curlrc).unwrap();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(
            lines,
            vec![
                r#"header "X-Auth-Token: tok123""#,
                r#"header "Content-Type: application/json""#,
            ]
        );
    }

    #[test]
    fn test_render_json_tab_indented_in_received_order() {
        let (token, _) = record();
        let body = br#"{"token":{"user":{"id":"u1"},"roles":[]}}"#;
        let rendered = render(&token, body, OutputFormat::Json).unwrap();
        assert_eq!(
            rendered,
            "{\n\t\"token\": {\n\t\t\"user\": {\n\t\t\t\"id\": \"u1\"\n\t\t},\n\t\t\"roles\": []\n\t}\n}\n"
        );
    }

    #[test]
    fn test_render_json_keeps_number_text() {
        let (token, _) = record();
        let body = br#"{"token":{"n":1e2,"big":123456789012345678901234567890,"f":1.10}}"#;
        let rendered = render(&token, body, OutputFormat::Json).unwrap();
        assert_eq!(
            rendered,
            "{\n\t\"token\": {\n\t\t\"n\": 1e2,\n\t\t\"big\": 123456789012345678901234567890,\n\t\t\"f\": 1.10\n\t}\n}\n"
        );
    }
}
