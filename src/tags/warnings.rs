use super::vendor::TagFields;

const MISSING_VALUES: &[&str] = &["undefined", "null", ""];

/// Builds the warning text for a Floodlight record
///
/// Checks run in a fixed order and each failing check contributes one line:
/// advertiser, activity, group, custom variables, sales order and the event
/// snippet flag. Returns `None` when every check passes.
pub fn floodlight_warnings(fields: &TagFields, event_snippet: bool) -> Option<String> {
    let mut lines = Vec::new();

    if fields.advertiser.is_none() {
        lines.push("- Missing advertiser value.".to_string());
    }
    if fields.activity.is_none() {
        lines.push("- Missing activity tag string value.".to_string());
    }
    if fields.group.is_none() {
        lines.push("- Missing activity group string value.".to_string());
    }

    if fields.uvars.is_empty() {
        lines.push("- No Uvars found.".to_string());
    } else {
        for uvar in &fields.uvars {
            match uvar.split_once('=') {
                Some((name, value)) if MISSING_VALUES.contains(&value.trim()) => {
                    lines.push(format!("- {} value may be missing.", name));
                }
                Some(_) => {}
                None => lines.push("- No Uvars found.".to_string()),
            }
        }
    }

    if fields.order.is_none() {
        lines.push("- Missing sales order value.".to_string());
    }
    if !event_snippet {
        lines.push("- Missing event snippet value.".to_string());
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
