use anyhow::{bail, Context};
use context_trim::{
    extract_fenced, notes_for_phase, render_task_notes, strip_reasoning, validate_task_notes,
    ContextTrimmer, Message, TaskNote, TokenBudget, TrimConfig, TrimReport,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Read a file, or stdin when the path is `-`.
pub fn read_input(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read stdin")?;
        return Ok(buffer);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn parse_messages(input: &str) -> anyhow::Result<Vec<Message>> {
    let messages: Vec<Message> =
        serde_json::from_str(input).context("Input must be a JSON array of {role, content} messages")?;
    if let Some(index) = messages.iter().position(|m| m.role.is_empty()) {
        bail!("Message {index} has an empty role");
    }
    Ok(messages)
}

#[derive(Serialize)]
struct TrimOutput<'a> {
    messages: &'a [Message],
    report: &'a TrimReport,
}

/// Trim a JSON conversation and render the result as JSON.
///
/// `budget` falls back to the configured `max_tokens`.
pub fn trim(
    trimmer: &ContextTrimmer,
    config: &TrimConfig,
    input: &str,
    budget: Option<i64>,
    with_report: bool,
) -> anyhow::Result<String> {
    let messages = parse_messages(input)?;
    let budget = match budget {
        Some(budget) => TokenBudget::new(budget)?,
        None => TokenBudget::try_from(config.max_tokens)?,
    };
    debug!(messages = messages.len(), %budget, "Trimming conversation");

    let trimmed = trimmer.trim(messages, budget.get())?;
    let report = &trimmed.report;
    if report.trim_occurred() {
        info!(
            "Trimmed {} -> {} tokens ({:.1}% of budget, {} messages dropped, truncated: {})",
            report.input_tokens,
            report.output_tokens,
            report.usage_percentage(),
            report.messages_dropped,
            report.truncated
        );
    } else {
        info!("Conversation fits: {} of {} tokens", report.input_tokens, report.budget);
    }

    let output = if with_report {
        serde_json::to_string_pretty(&TrimOutput {
            messages: &trimmed.messages,
            report,
        })?
    } else {
        serde_json::to_string_pretty(&trimmed.messages)?
    };
    Ok(output)
}

/// Total content tokens of a JSON conversation.
pub fn count(trimmer: &ContextTrimmer, input: &str) -> anyhow::Result<usize> {
    let messages = parse_messages(input)?;
    Ok(trimmer.count(&messages)?)
}

/// Validate a task-note config, returning the number of notes.
pub fn validate_notes(config: &TrimConfig, input: &str) -> anyhow::Result<usize> {
    let value: serde_json::Value =
        serde_json::from_str(input).context("Task-note config must be JSON")?;
    let notes = validate_task_notes(&value, &config.notes)?;
    Ok(notes.len())
}

/// Validate a task-note config and substitute `vars` into it.
///
/// With `phase`, only the notes for that phase are rendered.
pub fn render_notes(
    config: &TrimConfig,
    input: &str,
    vars: &[(String, String)],
    phase: Option<&str>,
) -> anyhow::Result<String> {
    let value: serde_json::Value =
        serde_json::from_str(input).context("Task-note config must be JSON")?;
    let mut notes = validate_task_notes(&value, &config.notes)?;
    if let Some(phase) = phase {
        if !config.notes.allows_phase(phase) {
            bail!("Unknown phase '{phase}'");
        }
        let selected: Vec<TaskNote> = notes_for_phase(&notes, phase).cloned().collect();
        debug!(phase, selected = selected.len(), "Filtered notes by phase");
        notes = selected;
    }
    let vars: BTreeMap<String, String> = vars.iter().cloned().collect();
    let rendered = render_task_notes(&notes, &vars);
    Ok(serde_json::to_string_pretty(&rendered)?)
}

pub fn extract(input: &str, tag: &str) -> String {
    extract_fenced(input, tag)
}

pub fn strip(input: &str) -> String {
    strip_reasoning(input)
}

/// Parse a `key=value` pair.
pub fn parse_var(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_trim::CharTokenizer;
    use std::io::Write;
    use std::sync::Arc;

    fn trimmer() -> ContextTrimmer {
        ContextTrimmer::new(Arc::new(CharTokenizer))
    }

    const CONVERSATION: &str = r#"[
        {"role": "system", "content": "sssss"},
        {"role": "user", "content": "uuuuuUUUUU"},
        {"role": "assistant", "content": "aaaaaaaa"}
    ]"#;

    #[test]
    fn trims_json_conversation() {
        let output = trim(&trimmer(), &TrimConfig::default(), CONVERSATION, Some(12), false).unwrap();
        let messages: Vec<Message> = serde_json::from_str(&output).unwrap();

        assert_eq!(
            messages,
            vec![Message::user("UUUU"), Message::assistant("aaaaaaaa")]
        );
    }

    #[test]
    fn trim_uses_configured_budget() {
        let config = TrimConfig {
            max_tokens: 8,
            ..TrimConfig::default()
        };
        let output = trim(&trimmer(), &config, CONVERSATION, None, true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["messages"].as_array().unwrap().len(), 1);
        assert_eq!(value["report"]["output_tokens"], 8);
        assert_eq!(value["report"]["budget"], 8);
        assert_eq!(value["report"]["messages_dropped"], 2);
    }

    #[test]
    fn trim_rejects_bad_budget_and_input() {
        let config = TrimConfig::default();
        assert!(trim(&trimmer(), &config, CONVERSATION, Some(-3), false).is_err());
        assert!(trim(&trimmer(), &config, "{\"role\": \"user\"}", Some(3), false).is_err());
        assert!(trim(&trimmer(), &config, r#"[{"role": "", "content": "x"}]"#, Some(3), false).is_err());
    }

    #[test]
    fn counts_tokens() {
        assert_eq!(count(&trimmer(), CONVERSATION).unwrap(), 23);
        assert_eq!(count(&trimmer(), "[]").unwrap(), 0);
    }

    #[test]
    fn validates_and_renders_notes() {
        let config = TrimConfig::default();
        let input = r#"[{"phases": ["plan formulation"], "note": "Study {{research_topic}}"}]"#;

        assert_eq!(validate_notes(&config, input).unwrap(), 1);

        let rendered = render_notes(
            &config,
            input,
            &[("research_topic".to_string(), "graph neural networks".to_string())],
            None,
        )
        .unwrap();
        assert!(rendered.contains("Study graph neural networks"));
    }

    #[test]
    fn renders_notes_for_one_phase() {
        let config = TrimConfig::default();
        let input = r#"[
            {"phases": ["plan formulation"], "note": "Plan {{research_topic}}"},
            {"phases": ["report writing"], "note": "Write in {{language}}"}
        ]"#;
        let vars = [("language".to_string(), "German".to_string())];

        let rendered = render_notes(&config, input, &vars, Some("report writing")).unwrap();
        let notes: Vec<TaskNote> = serde_json::from_str(&rendered).unwrap();

        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].note, "Write in German");
        assert!(render_notes(&config, input, &vars, Some("lunch")).is_err());
    }

    #[test]
    fn rejects_invalid_notes() {
        let config = TrimConfig::default();
        let input = r#"[{"phases": ["lunch"], "note": ""}]"#;
        let err = validate_notes(&config, input).unwrap_err();
        assert!(err.to_string().contains("Invalid phase 'lunch'"));
    }

    #[test]
    fn reads_input_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{CONVERSATION}").unwrap();

        let input = read_input(file.path()).unwrap();

        assert_eq!(count(&trimmer(), &input).unwrap(), 23);
    }

    #[test]
    fn parses_vars() {
        assert_eq!(
            parse_var("language=English").unwrap(),
            ("language".to_string(), "English".to_string())
        );
        assert_eq!(parse_var("k=a=b").unwrap().1, "a=b");
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }

    #[test]
    fn extracts_and_strips() {
        assert_eq!(extract("```SUMMARY\nok\n```", "SUMMARY"), "ok");
        assert_eq!(strip("<think>hmm</think>done"), "done");
    }
}
