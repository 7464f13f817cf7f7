use serde::Deserialize;

/// Settings shared by every parse driven by one grammar.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Characters skipped between tokens. Newlines additionally advance the line counter.
    pub whitespace: String,
    /// Number of characters of upcoming input shown when a rule is entered.
    pub preview_length: usize,
    /// Number of messages kept by [`TraceBuffer`](crate::trace::TraceBuffer).
    pub trace_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            whitespace: " \t\r\n".to_owned(),
            preview_length: 40,
            trace_capacity: 30,
        }
    }
}

#[test]
fn partial_config_keeps_defaults() {
    let config: Config = serde_json::from_str(r#"{ "previewLength": 8 }"#).unwrap();
    assert_eq!(config.preview_length, 8);
    assert_eq!(config.trace_capacity, 30);
    assert_eq!(config.whitespace, " \t\r\n");
}
