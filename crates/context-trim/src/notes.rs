//! Phase-scoped task notes with `{{variable}}` placeholders.
//!
//! A task-note config is a JSON list of `{"phases": [...], "note": "..."}`
//! entries. Validation checks the structure and that every phase and
//! placeholder appears in a [`NoteAllowList`]; rendering substitutes
//! placeholder values into fresh copies of the notes.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Matches `{{ name }}` with optional inner whitespace.
static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("placeholder regex is valid"));

const DEFAULT_PHASES: &[&str] = &[
    "literature review",
    "plan formulation",
    "data preparation",
    "running experiments",
    "results interpretation",
    "report writing",
    "report refinement",
];

const DEFAULT_VARIABLES: &[&str] = &[
    "research_topic",
    "api_key",
    "deepseek_api_key",
    "google_api_key",
    "anthropic_api_key",
    "language",
    "llm_backend",
];

/// A note attached to one or more workflow phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNote {
    pub phases: Vec<String>,
    pub note: String,
}

/// Phase and placeholder names a task-note config may use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteAllowList {
    /// Workflow phases, in workflow order
    pub phases: Vec<String>,
    /// Placeholder variable names
    pub variables: BTreeSet<String>,
}

impl Default for NoteAllowList {
    fn default() -> Self {
        Self {
            phases: DEFAULT_PHASES.iter().map(|p| p.to_string()).collect(),
            variables: DEFAULT_VARIABLES.iter().map(|v| v.to_string()).collect(),
        }
    }
}

impl NoteAllowList {
    pub fn allows_phase(&self, phase: &str) -> bool {
        self.phases.iter().any(|p| p == phase)
    }

    pub fn allows_variable(&self, variable: &str) -> bool {
        self.variables.contains(variable)
    }

    fn phases_display(&self) -> String {
        self.phases.join(", ")
    }

    fn variables_display(&self) -> String {
        self.variables.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Errors found while validating a task-note config.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NoteError {
    #[error("Configuration must be a list")]
    NotAList,

    #[error("Entry {index} must be an object")]
    EntryNotObject { index: usize },

    #[error("Entry {index} must have both 'phases' and 'note' keys")]
    MissingKeys { index: usize },

    #[error("'phases' in entry {index} must be a list")]
    PhasesNotList { index: usize },

    #[error("Invalid phase '{phase}' in entry {index}. Allowed phases are: {allowed}")]
    InvalidPhase {
        index: usize,
        phase: String,
        allowed: String,
    },

    #[error("'note' in entry {index} must be a string")]
    NoteNotString { index: usize },

    #[error("Invalid variable '{variable}' in note in entry {index}. Allowed variables are: {allowed}")]
    InvalidVariable {
        index: usize,
        variable: String,
        allowed: String,
    },
}

/// Validate an untyped task-note config and return the parsed notes.
///
/// Reports the first problem found, in entry order.
pub fn validate_task_notes(config: &Value, allow: &NoteAllowList) -> Result<Vec<TaskNote>, NoteError> {
    let entries = config.as_array().ok_or(NoteError::NotAList)?;
    let mut notes = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let object = entry
            .as_object()
            .ok_or(NoteError::EntryNotObject { index })?;

        let (Some(phases), Some(note)) = (object.get("phases"), object.get("note")) else {
            return Err(NoteError::MissingKeys { index });
        };

        let phases = phases
            .as_array()
            .ok_or(NoteError::PhasesNotList { index })?
            .iter()
            .map(|phase| match phase.as_str() {
                Some(name) if allow.allows_phase(name) => Ok(name.to_string()),
                Some(name) => Err(invalid_phase(index, name, allow)),
                None => Err(invalid_phase(index, &phase.to_string(), allow)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let note = note
            .as_str()
            .ok_or(NoteError::NoteNotString { index })?
            .to_string();
        check_placeholders(index, &note, allow)?;

        notes.push(TaskNote { phases, note });
    }

    tracing::debug!(entries = notes.len(), "Task-note config is valid");
    Ok(notes)
}

/// Validate already-typed notes against the allow-list.
pub fn check_task_notes(notes: &[TaskNote], allow: &NoteAllowList) -> Result<(), NoteError> {
    for (index, note) in notes.iter().enumerate() {
        if let Some(phase) = note.phases.iter().find(|p| !allow.allows_phase(p)) {
            return Err(invalid_phase(index, phase, allow));
        }
        check_placeholders(index, &note.note, allow)?;
    }
    Ok(())
}

/// Names of all placeholders in `text`, in order of appearance.
pub fn placeholders(text: &str) -> Vec<&str> {
    PLACEHOLDER
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect()
}

/// Substitute placeholder values into copies of `notes`.
///
/// Placeholders without a value are left as written.
pub fn render_task_notes(notes: &[TaskNote], vars: &BTreeMap<String, String>) -> Vec<TaskNote> {
    notes
        .iter()
        .map(|note| TaskNote {
            phases: note.phases.clone(),
            note: render_placeholders(&note.note, vars),
        })
        .collect()
}

/// Substitute placeholder values into a single string.
pub fn render_placeholders(text: &str, vars: &BTreeMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Notes that apply to `phase`.
pub fn notes_for_phase<'a>(notes: &'a [TaskNote], phase: &'a str) -> impl Iterator<Item = &'a TaskNote> + 'a {
    notes.iter().filter(move |n| n.phases.iter().any(|p| p == phase))
}

fn check_placeholders(index: usize, text: &str, allow: &NoteAllowList) -> Result<(), NoteError> {
    match placeholders(text).into_iter().find(|v| !allow.allows_variable(v)) {
        Some(variable) => Err(NoteError::InvalidVariable {
            index,
            variable: variable.to_string(),
            allowed: allow.variables_display(),
        }),
        None => Ok(()),
    }
}

fn invalid_phase(index: usize, phase: &str, allow: &NoteAllowList) -> NoteError {
    NoteError::InvalidPhase {
        index,
        phase: phase.to_string(),
        allowed: allow.phases_display(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn accepts_valid_config() {
        let config = json!([
            {"phases": ["plan formulation"], "note": "Focus on {{research_topic}}."},
            {"phases": ["report writing", "report refinement"], "note": "Write in {{ language }}."},
            {"phases": [], "note": "No placeholders."}
        ]);

        let notes = validate_task_notes(&config, &NoteAllowList::default()).unwrap();

        assert_eq!(notes.len(), 3);
        assert_eq!(notes[1].phases, vec!["report writing", "report refinement"]);
    }

    #[test]
    fn rejects_non_list() {
        let result = validate_task_notes(&json!({"phases": []}), &NoteAllowList::default());
        assert_eq!(result, Err(NoteError::NotAList));
    }

    #[test]
    fn rejects_bad_entries() {
        let allow = NoteAllowList::default();

        assert_eq!(
            validate_task_notes(&json!(["text"]), &allow),
            Err(NoteError::EntryNotObject { index: 0 })
        );
        assert_eq!(
            validate_task_notes(&json!([{"phases": []}]), &allow),
            Err(NoteError::MissingKeys { index: 0 })
        );
        assert_eq!(
            validate_task_notes(&json!([{"phases": "plan formulation", "note": ""}]), &allow),
            Err(NoteError::PhasesNotList { index: 0 })
        );
        assert_eq!(
            validate_task_notes(&json!([{"phases": [], "note": 3}]), &allow),
            Err(NoteError::NoteNotString { index: 0 })
        );
    }

    #[test]
    fn reports_invalid_phase_with_index() {
        let config = json!([
            {"phases": ["data preparation"], "note": "ok"},
            {"phases": ["coffee break"], "note": "nope"}
        ]);

        let err = validate_task_notes(&config, &NoteAllowList::default()).unwrap_err();

        assert!(matches!(&err, NoteError::InvalidPhase { index: 1, phase, .. } if phase == "coffee break"));
        assert!(err.to_string().contains("literature review"));
    }

    #[test]
    fn reports_invalid_variable() {
        let config = json!([{"phases": [], "note": "Use {{api_key}} and {{ password }}"}]);

        let err = validate_task_notes(&config, &NoteAllowList::default()).unwrap_err();

        assert!(matches!(err, NoteError::InvalidVariable { index: 0, ref variable, .. } if variable == "password"));
    }

    #[test]
    fn custom_allow_list() {
        let allow = NoteAllowList {
            phases: vec!["triage".to_string()],
            variables: ["ticket".to_string()].into_iter().collect(),
        };
        let notes = vec![TaskNote {
            phases: vec!["triage".to_string()],
            note: "Handle {{ticket}}".to_string(),
        }];

        assert!(check_task_notes(&notes, &allow).is_ok());
        assert!(check_task_notes(&notes, &NoteAllowList::default()).is_err());
    }

    #[test]
    fn renders_without_mutating_input() {
        let notes = vec![TaskNote {
            phases: vec!["plan formulation".to_string()],
            note: "Study {{research_topic}} in {{ language }}; keep {{llm_backend}}".to_string(),
        }];

        let rendered = render_task_notes(
            &notes,
            &vars(&[("research_topic", "protein folding"), ("language", "French")]),
        );

        assert_eq!(
            rendered[0].note,
            "Study protein folding in French; keep {{llm_backend}}"
        );
        assert!(notes[0].note.starts_with("Study {{research_topic}}"));
    }

    #[test]
    fn lists_placeholders_in_order() {
        assert_eq!(placeholders("{{a}} x {{ b }} {{a}}"), vec!["a", "b", "a"]);
        assert!(placeholders("{single} {{ }}").is_empty());
    }

    #[test]
    fn filters_notes_by_phase() {
        let notes = vec![
            TaskNote { phases: vec!["report writing".into()], note: "a".into() },
            TaskNote { phases: vec!["plan formulation".into()], note: "b".into() },
        ];
        let selected: Vec<_> = notes_for_phase(&notes, "plan formulation").collect();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].note, "b");
    }
}
