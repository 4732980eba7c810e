//! Fixed text templates for state blocks and instruction wrappers.
//!
//! Values pulled from a turn record are formatted the way the dataset
//! tooling has always printed them: lists in bracketed, comma-separated
//! form, strings bare at the top level and single-quoted inside lists,
//! missing values as `None`.

use serde_json::Value;

use crate::config::ScreenType;

/// Everything one state block shows.
#[derive(Debug, Clone, Copy)]
pub struct StateFields<'a> {
    pub t: u64,
    pub goal: Option<&'a Value>,
    pub blstats: Option<&'a Value>,
    pub screen: ScreenType,
    pub screen_content: Option<&'a Value>,
    pub inventory: Option<&'a Value>,
    pub message: Option<&'a Value>,
    pub action: Option<&'a Value>,
}

/// Render one `## STATE AT T` block.
pub fn render_state(fields: &StateFields<'_>) -> String {
    format!(
        "\n## STATE AT T: {t}\nGoal: {goal}\nBlstats: {blstats}\n{screen}:\n{screen_content}\nInventory:\n{inventory}\nMessage: {message}\nAction: {action}\n\n",
        t = fields.t,
        goal = display_opt(fields.goal),
        blstats = display_opt(fields.blstats),
        screen = fields.screen.heading(),
        screen_content = render_screen(fields.screen_content),
        inventory = render_inventory(fields.inventory),
        message = display_opt(fields.message),
        action = display_opt(fields.action),
    )
}

/// Wrap state text in the `# INSTRUCTION` template.
pub fn render_instruction(system_message: Option<&Value>, instruction: &str, current_state: &str) -> String {
    format!(
        "\n# INSTRUCTION:\nSystem Message: {system_message}\nInstruction: {instruction}\n\n{current_state}\n",
        system_message = display_opt(system_message),
    )
}

/// A screen stored as a list of rows is shown one row per line.
fn render_screen(value: Option<&Value>) -> String {
    match value {
        Some(Value::Array(rows)) if rows.iter().all(Value::is_string) => rows
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n"),
        other => display_opt(other),
    }
}

fn render_inventory(value: Option<&Value>) -> String {
    match value {
        Some(Value::Array(items)) => items.iter().map(display).collect::<Vec<_>>().join("\n"),
        None | Some(Value::Null) => String::new(),
        Some(other) => display(other),
    }
}

fn display_opt(value: Option<&Value>) -> String {
    value.map_or_else(|| "None".to_string(), display)
}

/// Top-level form: strings without quotes, everything else as [`repr`].
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => repr(other),
    }
}

/// Nested form used inside lists and maps.
pub fn repr(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(repr).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Object(map) => {
            let inner: Vec<String> = map.iter().map(|(k, v)| format!("{}: {}", quote(k), repr(v))).collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

fn quote(s: &str) -> String {
    if s.contains('\'') && !s.contains('"') {
        format!("\"{s}\"")
    } else {
        format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
    }
}
