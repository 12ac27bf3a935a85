use anyhow::Result;
use inquire::{Select, Text};

use sysreq_core::{
    EntityStore, Forest, RequirementDraft, RequirementId, VocabularyId, VocabularyKind,
    TEXTUAL_ID_SEPARATOR,
};

const NONE_OPTION: &str = "(none)";

/// Prompts for an optional text field, keeping `current` when left unchanged
fn prompt_optional(label: &str, current: Option<&str>) -> Result<Option<String>> {
    let value = Text::new(label)
        .with_default(current.unwrap_or(""))
        .prompt()?;
    let value = value.trim();
    Ok(if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    })
}

/// Prompts the user to pick a vocabulary entry of a kind
fn prompt_vocabulary(
    label: &str,
    entries: Vec<(VocabularyId, String)>,
    current: Option<VocabularyId>,
) -> Result<Option<VocabularyId>> {
    if entries.is_empty() {
        return Ok(None);
    }

    let mut options = vec![NONE_OPTION.to_string()];
    options.extend(entries.iter().map(|(_, name)| name.clone()));
    let cursor = current
        .and_then(|id| entries.iter().position(|(e, _)| *e == id))
        .map(|i| i + 1)
        .unwrap_or(0);

    let selection = Select::new(label, options)
        .with_starting_cursor(cursor)
        .raw_prompt()?;

    Ok(match selection.index {
        0 => None,
        i => entries.get(i - 1).map(|(id, _)| *id),
    })
}

fn entries_of<S: EntityStore + ?Sized>(
    store: &S,
    kind: VocabularyKind,
) -> Result<Vec<(VocabularyId, String)>> {
    Ok(store
        .list_vocabulary(kind)?
        .into_iter()
        .map(|e| (e.id, e.name))
        .collect())
}

/// Prompts the user for the descriptive fields of a requirement
///
/// `current` pre-fills every prompt when editing.
pub fn prompt_draft<S: EntityStore + ?Sized>(
    store: &S,
    current: Option<&RequirementDraft>,
) -> Result<RequirementDraft> {
    let base = current.cloned().unwrap_or_default();

    let behavior = Text::new("Behavior:")
        .with_default(&base.behavior)
        .prompt()?;
    let condition = Text::new("Condition:")
        .with_default(&base.condition)
        .prompt()?;

    let function_id = prompt_vocabulary(
        "Function:",
        entries_of(store, VocabularyKind::Function)?,
        base.function_id,
    )?;
    let variable_id = prompt_vocabulary(
        "Variable:",
        entries_of(store, VocabularyKind::Variable)?,
        base.variable_id,
    )?;
    let mode_id = prompt_vocabulary(
        "Mode:",
        entries_of(store, VocabularyKind::Mode)?,
        base.mode_id,
    )?;

    // Only offer the components the chosen mode allows, if it restricts them
    let mut components = entries_of(store, VocabularyKind::Component)?;
    if let Some(mode_id) = mode_id {
        let allowed: Vec<VocabularyId> = store
            .mode_components()?
            .into_iter()
            .filter(|mc| mc.mode_id == mode_id)
            .map(|mc| mc.component_id)
            .collect();
        if !allowed.is_empty() {
            components.retain(|(id, _)| allowed.contains(id));
        }
    }
    let component_id = prompt_vocabulary("Component:", components, base.component_id)?;

    let latency = prompt_optional("Latency reference:", base.latency.as_deref())?;
    let tolerance = prompt_optional("Tolerance reference:", base.tolerance.as_deref())?;

    // Use the Editor type for multiline input
    let justification = inquire::Editor::new("Justification:")
        .with_predefined_text(&base.justification)
        .prompt()?;

    Ok(RequirementDraft {
        behavior,
        condition,
        justification: justification.trim_end().to_string(),
        latency,
        tolerance,
        function_id,
        variable_id,
        component_id,
        mode_id,
    })
}

/// Prompts the user to select a requirement from the forest
pub fn prompt_select_requirement(forest: &Forest) -> Result<RequirementId> {
    let nodes: Vec<_> = forest.iter().collect();
    if nodes.is_empty() {
        anyhow::bail!("No requirements to select from");
    }

    let options: Vec<String> = nodes
        .iter()
        .map(|n| {
            let indent = "  ".repeat(n.textual_id.matches(TEXTUAL_ID_SEPARATOR).count());
            format!("{}{}  {}", indent, n.textual_id, n.requirement.behavior)
        })
        .collect();

    let selection = Select::new("Select a requirement:", options).raw_prompt()?;
    Ok(nodes[selection.index].requirement.id)
}
