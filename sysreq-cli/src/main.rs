mod cli;
mod prompts;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::{Path, PathBuf};

use sysreq_core::project::{export_project, import_project, read_project_file, write_project_file};
use sysreq_core::settings::{get_settings_path, Settings};
use sysreq_core::{
    build_forest, create_backend, determine_database_path, export_to_file, stats, EntityStore,
    ExportFormat, HierarchyEngine, HierarchyError, MoveKind, Requirement, RequirementDraft,
    StoreSnapshot, VocabularyKind,
};

use crate::cli::{Cli, Command, ConfigCommand, DraftArgs, VocabCommand};

type Engine<'s> = HierarchyEngine<'s, dyn EntityStore>;

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    // Settings do not need a database
    if let Command::Config(config_cmd) = &cli.command {
        return handle_config_command(config_cmd, &get_settings_path()?);
    }

    // Determine which database to use
    let db_path = determine_database_path(cli.db.as_deref())?;
    log::debug!("Using database {:?}", db_path);
    let store = create_backend(&db_path, None)
        .with_context(|| format!("Failed to open database {:?}", db_path))?;
    let engine: Engine<'_> = HierarchyEngine::new(&*store);

    if let Err(err) = run(&cli.command, &engine) {
        if let Some(HierarchyError::Persistence(_)) = err.downcast_ref::<HierarchyError>() {
            eprintln!(
                "{}",
                "Storage failure: the change was rolled back. Run `sysreq check` before continuing."
                    .red()
            );
        }
        return Err(err);
    }

    Ok(())
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run(command: &Command, engine: &Engine<'_>) -> Result<()> {
    match command {
        Command::Add {
            parent,
            fields,
            interactive,
        } => {
            add_requirement(engine, parent.as_deref(), fields, *interactive)?;
        }
        Command::List { flat } => {
            list_requirements(engine, *flat)?;
        }
        Command::Show { id } => {
            show_requirement(engine, id.as_deref())?;
        }
        Command::Edit {
            id,
            fields,
            interactive,
        } => {
            edit_requirement(engine, id.as_deref(), fields, *interactive)?;
        }
        Command::Move { id, direction } => {
            move_requirement(engine, id, direction)?;
        }
        Command::Reparent { id, to } => {
            reparent_requirement(engine, id, to.as_deref())?;
        }
        Command::Del { id, yes } => {
            delete_requirement(engine, id, *yes)?;
        }
        Command::Check => {
            check_hierarchy(engine)?;
        }
        Command::Normalize => {
            let changed = engine.normalize()?;
            if changed == 0 {
                println!("{}", "Nothing to repair.".green());
            } else {
                println!("{} {} requirement(s).", "Repaired".green(), changed);
            }
        }
        Command::Stats => {
            show_stats(engine.store())?;
        }
        Command::Vocab(vocab_cmd) => {
            handle_vocab_command(vocab_cmd, engine.store())?;
        }
        Command::Config(config_cmd) => {
            handle_config_command(config_cmd, &get_settings_path()?)?;
        }
        Command::Export { format, output } => {
            handle_export_command(engine.store(), format.as_deref(), output.as_deref())?;
        }
        Command::Import { file, yes } => {
            handle_import_command(engine.store(), file, *yes)?;
        }
    }

    Ok(())
}

// =============================================================================
// Requirements
// =============================================================================

fn resolve(engine: &Engine<'_>, reference: &str) -> Result<Requirement> {
    engine
        .resolve(reference)
        .with_context(|| format!("Cannot find requirement '{}'", reference))
}

/// Resolves a reference, prompting for a selection when none was given
fn resolve_or_select(engine: &Engine<'_>, reference: Option<&str>) -> Result<Requirement> {
    match reference {
        Some(reference) => resolve(engine, reference),
        None => {
            let id = prompts::prompt_select_requirement(&engine.forest()?)?;
            Ok(engine.get(id)?)
        }
    }
}

fn vocabulary_id(
    store: &dyn EntityStore,
    kind: VocabularyKind,
    name: &str,
) -> Result<sysreq_core::VocabularyId> {
    match store.find_vocabulary(kind, name)? {
        Some(entry) => Ok(entry.id),
        None => anyhow::bail!(
            "Unknown {} '{}'. Add it with: sysreq vocab add {} \"{}\"",
            kind,
            name,
            kind,
            name
        ),
    }
}

/// Overlays the fields given on the command line onto `draft`
fn apply_fields(
    store: &dyn EntityStore,
    mut draft: RequirementDraft,
    fields: &DraftArgs,
) -> Result<RequirementDraft> {
    let optional = |value: &String| {
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    };

    if let Some(behavior) = &fields.behavior {
        draft.behavior = behavior.clone();
    }
    if let Some(condition) = &fields.condition {
        draft.condition = condition.clone();
    }
    if let Some(justification) = &fields.justification {
        draft.justification = justification.clone();
    }
    if let Some(latency) = &fields.latency {
        draft.latency = optional(latency);
    }
    if let Some(tolerance) = &fields.tolerance {
        draft.tolerance = optional(tolerance);
    }

    // An empty name clears the reference
    let lookup = |kind: VocabularyKind, name: &String| -> Result<Option<sysreq_core::VocabularyId>> {
        if name.trim().is_empty() {
            Ok(None)
        } else {
            vocabulary_id(store, kind, name.trim()).map(Some)
        }
    };
    if let Some(name) = &fields.function {
        draft.function_id = lookup(VocabularyKind::Function, name)?;
    }
    if let Some(name) = &fields.variable {
        draft.variable_id = lookup(VocabularyKind::Variable, name)?;
    }
    if let Some(name) = &fields.component {
        draft.component_id = lookup(VocabularyKind::Component, name)?;
    }
    if let Some(name) = &fields.mode {
        draft.mode_id = lookup(VocabularyKind::Mode, name)?;
    }

    Ok(draft)
}

fn add_requirement(
    engine: &Engine<'_>,
    parent: Option<&str>,
    fields: &DraftArgs,
    interactive: bool,
) -> Result<()> {
    let parent_id = match parent {
        Some(reference) => Some(resolve(engine, reference)?.id),
        None => None,
    };

    // Default to interactive mode if no behavior is provided
    let draft = if interactive || fields.behavior.is_none() {
        let base = apply_fields(engine.store(), RequirementDraft::default(), fields)?;
        prompts::prompt_draft(engine.store(), Some(&base))?
    } else {
        apply_fields(engine.store(), RequirementDraft::default(), fields)?
    };

    if draft.behavior.trim().is_empty() {
        anyhow::bail!("Behavior is required. Use --behavior to specify it.");
    }

    let added = engine.insert(parent_id, draft)?;

    println!("{}", "Requirement added successfully!".green());
    println!("ID: {}", engine.textual_id(added.id)?.green());

    Ok(())
}

fn list_requirements(engine: &Engine<'_>, flat: bool) -> Result<()> {
    let snapshot = engine.store().snapshot()?;
    let forest = build_forest(snapshot.requirements.clone())?;

    if forest.is_empty() {
        println!("{}", "No requirements found.".yellow());
        return Ok(());
    }

    if flat {
        println!(
            "{:<12} | {:<6} | {:<15} | {:<15} | {:<50}",
            "ID", "Row", "Component", "Mode", "Behavior"
        );
        println!("{}", "-".repeat(110));
        for node in forest.iter() {
            let req = &node.requirement;
            println!(
                "{:<12} | {:<6} | {:<15} | {:<15} | {:<50}",
                node.textual_id,
                req.id,
                snapshot
                    .vocabulary_name(VocabularyKind::Component, req.component_id)
                    .unwrap_or("-"),
                snapshot
                    .vocabulary_name(VocabularyKind::Mode, req.mode_id)
                    .unwrap_or("-"),
                req.behavior
            );
        }
        return Ok(());
    }

    for node in forest.iter() {
        let req = &node.requirement;
        let indent = "  ".repeat(node.depth());
        let mut line = format!("{}{} {}", indent, node.textual_id.green(), req.behavior);
        if !req.condition.is_empty() {
            line.push_str(&format!(" {}", format!("[when {}]", req.condition).dimmed()));
        }
        println!("{}", line);
    }
    println!();
    println!("{} requirement(s) in {} root(s)", forest.len(), forest.roots.len());

    Ok(())
}

fn print_vocabulary_field(snapshot: &StoreSnapshot, label: &str, kind: VocabularyKind, id: Option<i64>) {
    if let Some(name) = snapshot.vocabulary_name(kind, id) {
        println!("{}: {}", label.blue(), name);
    }
}

fn show_requirement(engine: &Engine<'_>, reference: Option<&str>) -> Result<()> {
    let req = resolve_or_select(engine, reference)?;
    let snapshot = engine.store().snapshot()?;

    // Show stays usable on a damaged hierarchy so the rows `check` reports can be inspected
    println!("{}: {}", "ID".blue(), engine.display_id(&req).green());
    println!("{}: {}", "Row".blue(), req.id);
    match req.parent_id {
        Some(parent_id) => {
            let parent = engine.get(parent_id)?;
            println!("{}: {}", "Parent".blue(), engine.display_id(&parent));
        }
        None => println!("{}: -", "Parent".blue()),
    }
    println!("{}: {}", "Level".blue(), req.level);
    println!("{}: {}", "Behavior".blue(), req.behavior);
    if !req.condition.is_empty() {
        println!("{}: {}", "Condition".blue(), req.condition);
    }
    print_vocabulary_field(&snapshot, "Function", VocabularyKind::Function, req.function_id);
    print_vocabulary_field(&snapshot, "Variable", VocabularyKind::Variable, req.variable_id);
    print_vocabulary_field(&snapshot, "Component", VocabularyKind::Component, req.component_id);
    print_vocabulary_field(&snapshot, "Mode", VocabularyKind::Mode, req.mode_id);
    if let Some(latency) = &req.latency {
        println!("{}: {}", "Latency".blue(), latency);
    }
    if let Some(tolerance) = &req.tolerance {
        println!("{}: {}", "Tolerance".blue(), tolerance);
    }
    if !req.justification.is_empty() {
        println!("{}:\n{}", "Justification".blue(), req.justification);
    }

    let children = engine.store().count_children(Some(req.id))?;
    match engine.count_descendants(req.id) {
        Ok(descendants) => println!(
            "{}: {} child(ren), {} descendant(s)",
            "Subtree".blue(),
            children,
            descendants
        ),
        Err(err) => println!(
            "{}: {} child(ren), {}",
            "Subtree".blue(),
            children,
            err.to_string().red()
        ),
    }

    Ok(())
}

fn edit_requirement(
    engine: &Engine<'_>,
    reference: Option<&str>,
    fields: &DraftArgs,
    interactive: bool,
) -> Result<()> {
    let req = resolve_or_select(engine, reference)?;

    let draft = if interactive || fields.is_empty() {
        let base = apply_fields(engine.store(), req.draft(), fields)?;
        prompts::prompt_draft(engine.store(), Some(&base))?
    } else {
        apply_fields(engine.store(), req.draft(), fields)?
    };

    if draft == req.draft() {
        println!("{}", "No changes made.".yellow());
        return Ok(());
    }

    engine.update_content(req.id, draft)?;
    println!(
        "{} {}",
        "Requirement updated:".green(),
        engine.textual_id(req.id)?
    );

    Ok(())
}

fn parse_move_kind(direction: &str) -> Result<MoveKind> {
    match MoveKind::parse(direction) {
        Some(kind) => Ok(kind),
        None => anyhow::bail!(
            "Invalid direction: {}. Valid values: up, down, top, bottom",
            direction
        ),
    }
}

fn move_requirement(engine: &Engine<'_>, reference: &str, direction: &str) -> Result<()> {
    let kind = parse_move_kind(direction)?;
    let req = resolve(engine, reference)?;
    let before = engine.textual_id(req.id)?;

    if engine.move_within_siblings(req.id, kind)? {
        println!(
            "{} {} -> {}",
            "Moved".green(),
            before,
            engine.textual_id(req.id)?.green()
        );
    } else {
        println!(
            "{}",
            format!("{} cannot move {}; nothing changed.", before, kind).yellow()
        );
    }

    Ok(())
}

fn reparent_requirement(engine: &Engine<'_>, reference: &str, to: Option<&str>) -> Result<()> {
    let req = resolve(engine, reference)?;
    let new_parent = match to {
        Some(target) => Some(resolve(engine, target)?.id),
        None => None,
    };
    let before = engine.textual_id(req.id)?;

    if engine.reparent(req.id, new_parent)? {
        println!(
            "{} {} -> {}",
            "Reparented".green(),
            before,
            engine.textual_id(req.id)?.green()
        );
    } else {
        println!(
            "{}",
            format!("{} already has that parent; nothing changed.", before).yellow()
        );
    }

    Ok(())
}

fn delete_requirement(engine: &Engine<'_>, reference: &str, skip_confirm: bool) -> Result<()> {
    let req = resolve(engine, reference)?;
    let textual = engine.textual_id(req.id)?;
    let descendants = engine.count_descendants(req.id)?;

    // Display requirement info
    println!("{}", "Requirement to delete:".yellow());
    println!("  ID: {}", textual);
    println!("  Behavior: {}", req.behavior);
    if descendants > 0 {
        println!(
            "{}",
            format!(
                "  This will also delete {} descendant requirement(s).",
                descendants
            )
            .red()
        );
    }

    // Confirm deletion unless --yes flag is used
    if !skip_confirm {
        let prompt = format!(
            "Delete {} requirement(s) in total?",
            descendants + 1
        );
        let confirm = inquire::Confirm::new(&prompt)
            .with_default(false)
            .prompt()?;

        if !confirm {
            println!("{}", "Deletion cancelled.".yellow());
            return Ok(());
        }
    }

    let report = engine.delete(req.id)?;
    println!(
        "{} {} ({} requirement(s) removed)",
        "Deleted".green(),
        textual,
        report.removed.len()
    );

    Ok(())
}

fn check_hierarchy(engine: &Engine<'_>) -> Result<()> {
    let report = engine.validate()?;

    if report.is_valid() {
        println!(
            "{}",
            format!("All {} requirement(s) are consistent.", report.checked).green()
        );
        return Ok(());
    }

    println!("{}", "Integrity problems found:".red());
    for issue in &report.issues {
        println!("  - {}", issue);
    }
    println!("Ordering and level problems can be repaired with `sysreq normalize`.");
    anyhow::bail!("{} integrity problem(s) found", report.issues.len())
}

fn show_stats(store: &dyn EntityStore) -> Result<()> {
    let stats = stats(store)?;
    println!("{}: {}", "Backend".blue(), stats.backend_type);
    println!("{}: {}", "Requirements".blue(), stats.requirement_count);
    println!("{}: {}", "Roots".blue(), stats.root_count);
    println!("{}: {}", "Functions".blue(), stats.function_count);
    println!("{}: {}", "Variables".blue(), stats.variable_count);
    println!("{}: {}", "Components".blue(), stats.component_count);
    println!("{}: {}", "Modes".blue(), stats.mode_count);
    Ok(())
}

// =============================================================================
// Settings
// =============================================================================

fn handle_config_command(cmd: &ConfigCommand, settings_path: &Path) -> Result<()> {
    let mut settings = Settings::load_or_default(settings_path)?;

    match cmd {
        ConfigCommand::Show => {
            println!("{}: {}", "Settings file".blue(), settings_path.display());
            println!(
                "{}: {}",
                "Database".blue(),
                settings.database.as_deref().unwrap_or("(default)")
            );
            println!("{}: {}", "Export format".blue(), settings.export_format);
            return Ok(());
        }
        ConfigCommand::Database { path } => {
            settings.database = path
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string);
        }
        ConfigCommand::ExportFormat { format } => {
            let Some(parsed) = ExportFormat::parse(format) else {
                anyhow::bail!(
                    "Unknown export format: {}. Supported formats: csv, latex, markdown, json",
                    format
                );
            };
            settings.export_format = parsed.to_string();
        }
    }

    settings.save(settings_path)?;
    println!("{} {}", "Settings saved to".green(), settings_path.display());

    Ok(())
}

// =============================================================================
// Vocabulary
// =============================================================================

fn parse_kind(kind: &str) -> Result<VocabularyKind> {
    match VocabularyKind::parse(kind) {
        Some(kind) => Ok(kind),
        None => anyhow::bail!(
            "Invalid kind: {}. Valid values: function, variable, component, mode",
            kind
        ),
    }
}

fn handle_vocab_command(cmd: &VocabCommand, store: &dyn EntityStore) -> Result<()> {
    match cmd {
        VocabCommand::Add { kind, name } => {
            let kind = parse_kind(kind)?;
            store.add_vocabulary(kind, name.trim())?;
            println!("{} {} '{}'", "Added".green(), kind, name.trim());
        }
        VocabCommand::List { kind } => {
            let kinds = match kind {
                Some(kind) => vec![parse_kind(kind)?],
                None => VocabularyKind::ALL.to_vec(),
            };
            let mode_components = store.mode_components()?;
            let components = store.list_vocabulary(VocabularyKind::Component)?;

            for kind in kinds {
                println!("{}", kind.table().blue());
                let entries = store.list_vocabulary(kind)?;
                if entries.is_empty() {
                    println!("  {}", "(none)".dimmed());
                }
                for entry in entries {
                    if kind != VocabularyKind::Mode {
                        println!("  {}", entry.name);
                        continue;
                    }
                    let allowed: Vec<&str> = mode_components
                        .iter()
                        .filter(|mc| mc.mode_id == entry.id)
                        .filter_map(|mc| components.iter().find(|c| c.id == mc.component_id))
                        .map(|c| c.name.as_str())
                        .collect();
                    if allowed.is_empty() {
                        println!("  {} {}", entry.name, "(all components)".dimmed());
                    } else {
                        println!("  {} [{}]", entry.name, allowed.join(", "));
                    }
                }
            }
        }
        VocabCommand::Rename {
            kind,
            name,
            new_name,
        } => {
            let kind = parse_kind(kind)?;
            let id = vocabulary_id(store, kind, name)?;
            store.rename_vocabulary(kind, id, new_name.trim())?;
            println!("{} {} '{}' to '{}'", "Renamed".green(), kind, name, new_name.trim());
        }
        VocabCommand::Remove { kind, name, yes } => {
            let kind = parse_kind(kind)?;
            let id = vocabulary_id(store, kind, name)?;

            if !*yes {
                let prompt = format!(
                    "Remove {} '{}'? Requirements using it will lose the reference.",
                    kind, name
                );
                let confirm = inquire::Confirm::new(&prompt)
                    .with_default(false)
                    .prompt()?;
                if !confirm {
                    println!("{}", "Removal cancelled.".yellow());
                    return Ok(());
                }
            }

            store.remove_vocabulary(kind, id)?;
            println!("{} {} '{}'", "Removed".green(), kind, name);
        }
        VocabCommand::Allow { mode, component } => {
            let mode_id = vocabulary_id(store, VocabularyKind::Mode, mode)?;
            let component_id = vocabulary_id(store, VocabularyKind::Component, component)?;
            store.allow_component(mode_id, component_id)?;
            println!("{} '{}' in mode '{}'", "Allowed".green(), component, mode);
        }
        VocabCommand::Disallow { mode, component } => {
            let mode_id = vocabulary_id(store, VocabularyKind::Mode, mode)?;
            let component_id = vocabulary_id(store, VocabularyKind::Component, component)?;
            store.disallow_component(mode_id, component_id)?;
            println!("{} '{}' in mode '{}'", "Disallowed".green(), component, mode);
        }
    }

    Ok(())
}

// =============================================================================
// Import / Export
// =============================================================================

fn handle_export_command(
    store: &dyn EntityStore,
    format: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let format = match format {
        Some(format) => format.to_string(),
        None => Settings::load_or_default(get_settings_path()?)?.export_format,
    };

    if format.eq_ignore_ascii_case("project") {
        let output_path = output
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("project.json"));
        let project = export_project(store)?;
        write_project_file(&output_path, &project)?;

        println!("Exported project: {}", output_path.display());
        println!("  Total requirements: {}", project.summary.requirement_count);
        return Ok(());
    }

    let Some(export_format) = ExportFormat::parse(&format) else {
        anyhow::bail!(
            "Unknown export format: {}. Supported formats: csv, latex, markdown, json, project",
            format
        );
    };
    let output_path = output
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(format!("requirements.{}", export_format.extension())));

    let written = export_to_file(store, export_format, &output_path)?;
    println!("Exported to {}: {}", export_format, output_path.display());
    println!("  Total requirements: {}", written);

    Ok(())
}

fn handle_import_command(store: &dyn EntityStore, file: &Path, skip_confirm: bool) -> Result<()> {
    let project = read_project_file(file)
        .with_context(|| format!("Failed to read project file {:?}", file))?;
    let existing = store.all_requirements()?.len();

    println!("{}", "Project to import:".yellow());
    println!(
        "  Exported: {}",
        project.exported_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("  Requirements: {}", project.requirements.len());
    println!("  Vocabulary entries: {}", project.configuration.len());

    if !skip_confirm {
        let prompt = format!(
            "Replace the {} requirement(s) currently in the database?",
            existing
        );
        let confirm = inquire::Confirm::new(&prompt)
            .with_default(false)
            .prompt()?;
        if !confirm {
            println!("{}", "Import cancelled.".yellow());
            return Ok(());
        }
    }

    let report = import_project(store, &project)?;
    println!(
        "{} {} requirement(s) and {} vocabulary entries",
        "Imported".green(),
        report.requirements,
        report.vocabulary
    );
    if report.repaired > 0 {
        println!(
            "{}",
            format!("Repaired the ordering of {} requirement(s).", report.repaired).yellow()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysreq_core::{MemoryBackend, SqliteBackend};
    use tempfile::NamedTempFile;

    #[test]
    fn test_apply_fields_resolves_names() {
        let store = MemoryBackend::new();
        let pump = store.add_vocabulary(VocabularyKind::Component, "Pump").unwrap();

        let fields = DraftArgs {
            behavior: Some("Start".to_string()),
            component: Some("Pump".to_string()),
            latency: Some("  ".to_string()),
            ..Default::default()
        };
        let draft = apply_fields(&store, RequirementDraft::default(), &fields).unwrap();
        assert_eq!(draft.behavior, "Start");
        assert_eq!(draft.component_id, Some(pump));
        assert_eq!(draft.latency, None);

        let clear = DraftArgs {
            component: Some(String::new()),
            ..Default::default()
        };
        let cleared = apply_fields(&store, draft, &clear).unwrap();
        assert_eq!(cleared.component_id, None);
        assert_eq!(cleared.behavior, "Start");
    }

    #[test]
    fn test_apply_fields_rejects_unknown_names() {
        let store = MemoryBackend::new();
        let fields = DraftArgs {
            mode: Some("Cruise".to_string()),
            ..Default::default()
        };
        let err = apply_fields(&store, RequirementDraft::default(), &fields).unwrap_err();
        assert!(err.to_string().contains("Unknown mode 'Cruise'"));
    }

    #[test]
    fn test_parse_move_kind() {
        assert_eq!(parse_move_kind("UP").unwrap(), MoveKind::Up);
        assert_eq!(parse_move_kind("bottom").unwrap(), MoveKind::Bottom);
        assert!(parse_move_kind("sideways").is_err());
    }

    #[test]
    fn test_commands_against_sqlite_file() {
        let file = NamedTempFile::new().unwrap();
        let store = SqliteBackend::new(file.path()).unwrap();
        let engine: Engine<'_> = HierarchyEngine::new(&store as &dyn EntityStore);

        let add = |parent: Option<&str>, behavior: &str| {
            let fields = DraftArgs {
                behavior: Some(behavior.to_string()),
                ..Default::default()
            };
            add_requirement(&engine, parent, &fields, false)
        };
        add(None, "root").unwrap();
        add(Some("R0"), "first").unwrap();
        add(Some("R0"), "second").unwrap();

        move_requirement(&engine, "R0-1", "up").unwrap();
        assert_eq!(engine.resolve("R0-0").unwrap().behavior, "second");

        reparent_requirement(&engine, "R0-1", None).unwrap();
        assert_eq!(engine.resolve("R1").unwrap().behavior, "first");

        check_hierarchy(&engine).unwrap();
        show_requirement(&engine, Some("R0-0")).unwrap();
        delete_requirement(&engine, "R0", true).unwrap();
        assert_eq!(store.all_requirements().unwrap().len(), 1);
        assert_eq!(engine.resolve("R0").unwrap().behavior, "first");
    }

    #[test]
    fn test_export_and_import_project_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.json");

        let source = MemoryBackend::new();
        HierarchyEngine::new(&source)
            .insert(None, RequirementDraft::new("Vent"))
            .unwrap();
        handle_export_command(&source, Some("project"), Some(&path)).unwrap();

        let target = MemoryBackend::new();
        handle_import_command(&target, &path, true).unwrap();
        assert_eq!(target.snapshot().unwrap(), source.snapshot().unwrap());

        let csv = dir.path().join("out.csv");
        handle_export_command(&target, Some("csv"), Some(&csv)).unwrap();
        assert!(std::fs::read_to_string(&csv).unwrap().contains("R0"));
        assert!(handle_export_command(&target, Some("pdf"), None).is_err());
    }

    #[test]
    fn test_config_command_saves_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sysreq.config");

        handle_config_command(
            &ConfigCommand::Database {
                path: Some("plant.db".to_string()),
            },
            &path,
        )
        .unwrap();
        handle_config_command(
            &ConfigCommand::ExportFormat {
                format: "LaTeX".to_string(),
            },
            &path,
        )
        .unwrap();
        assert!(handle_config_command(
            &ConfigCommand::ExportFormat {
                format: "pdf".to_string()
            },
            &path
        )
        .is_err());

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.database.as_deref(), Some("plant.db"));
        assert_eq!(settings.export_format(), Some(ExportFormat::Latex));

        handle_config_command(&ConfigCommand::Database { path: None }, &path).unwrap();
        assert_eq!(Settings::load(&path).unwrap().database, None);
        handle_config_command(&ConfigCommand::Show, &path).unwrap();
    }
}
