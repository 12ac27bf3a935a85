//! Document encoders for the requirement forest
//!
//! Every encoder walks the forest in display order and emits the same
//! columns: `ID, Component, Function, Variable, Mode, Condition, Behavior,
//! Latency, Tolerance, Justification`.

use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::db::EntityStore;
use crate::error::{HierarchyResult, StoreError};
use crate::hierarchy::{build_forest, Forest, ForestNode};
use crate::models::{StoreSnapshot, VocabularyKind};

/// Column headers shared by all tabular exports
pub const EXPORT_COLUMNS: [&str; 10] = [
    "ID",
    "Component",
    "Function",
    "Variable",
    "Mode",
    "Condition",
    "Behavior",
    "Latency",
    "Tolerance",
    "Justification",
];

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Latex,
    Markdown,
    Json,
}

impl ExportFormat {
    /// Parse an export format from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "latex" | "tex" => Some(ExportFormat::Latex),
            "markdown" | "md" => Some(ExportFormat::Markdown),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }

    /// Conventional file extension
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Latex => "tex",
            ExportFormat::Markdown => "md",
            ExportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Latex => write!(f, "latex"),
            ExportFormat::Markdown => write!(f, "markdown"),
            ExportFormat::Json => write!(f, "json"),
        }
    }
}

/// One requirement flattened to display strings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    pub textual_id: String,
    pub component: String,
    pub function: String,
    pub variable: String,
    pub mode: String,
    pub condition: String,
    pub behavior: String,
    pub latency: String,
    pub tolerance: String,
    pub justification: String,
}

impl ExportRow {
    fn from_node(node: &ForestNode, snapshot: &StoreSnapshot) -> Self {
        let req = &node.requirement;
        let name = |kind, id| snapshot.vocabulary_name(kind, id).unwrap_or("").to_string();
        Self {
            textual_id: node.textual_id.clone(),
            component: name(VocabularyKind::Component, req.component_id),
            function: name(VocabularyKind::Function, req.function_id),
            variable: name(VocabularyKind::Variable, req.variable_id),
            mode: name(VocabularyKind::Mode, req.mode_id),
            condition: req.condition.clone(),
            behavior: req.behavior.clone(),
            latency: req.latency.clone().unwrap_or_default(),
            tolerance: req.tolerance.clone().unwrap_or_default(),
            justification: req.justification.clone(),
        }
    }

    /// Cells in [`EXPORT_COLUMNS`] order
    pub fn cells(&self) -> [&str; 10] {
        [
            &self.textual_id,
            &self.component,
            &self.function,
            &self.variable,
            &self.mode,
            &self.condition,
            &self.behavior,
            &self.latency,
            &self.tolerance,
            &self.justification,
        ]
    }
}

/// Flattens a snapshot into export rows in display order
pub fn export_rows(snapshot: &StoreSnapshot) -> HierarchyResult<Vec<ExportRow>> {
    let forest = build_forest(snapshot.requirements.clone())?;
    Ok(forest
        .iter()
        .map(|node| ExportRow::from_node(node, snapshot))
        .collect())
}

fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Comma separated values with a header line and CRLF line endings
pub fn export_csv(snapshot: &StoreSnapshot) -> HierarchyResult<String> {
    let mut output = EXPORT_COLUMNS.join(",");
    output.push_str("\r\n");

    for row in export_rows(snapshot)? {
        let cells: Vec<Cow<'_, str>> = row.cells().into_iter().map(csv_field).collect();
        output.push_str(&cells.join(","));
        output.push_str("\r\n");
    }
    Ok(output)
}

fn latex_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '~' => escaped.push_str("\\textasciitilde{}"),
            '^' => escaped.push_str("\\textasciicircum{}"),
            '\n' => escaped.push(' '),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// A `longtable` environment ready to be `\input` into a document
pub fn export_latex(snapshot: &StoreSnapshot) -> HierarchyResult<String> {
    let mut output = String::new();
    output.push_str("% Requires \\usepackage{longtable}\n");
    output.push_str("\\begin{longtable}{|l|l|l|l|l|p{2.5cm}|p{4cm}|l|l|p{3cm}|}\n\\hline\n");
    output.push_str(&EXPORT_COLUMNS.join(" & "));
    output.push_str(" \\\\\n\\hline\n\\endhead\n");

    for row in export_rows(snapshot)? {
        let cells: Vec<String> = row.cells().into_iter().map(latex_escape).collect();
        output.push_str(&cells.join(" & "));
        output.push_str(" \\\\\n\\hline\n");
    }

    output.push_str("\\end{longtable}\n");
    Ok(output)
}

/// Indented outline, one bullet per requirement
pub fn export_markdown(snapshot: &StoreSnapshot) -> HierarchyResult<String> {
    let forest = build_forest(snapshot.requirements.clone())?;
    let mut output = String::from("# System Requirements\n\n");

    for node in forest.iter() {
        let row = ExportRow::from_node(node, snapshot);
        let indent = "  ".repeat(node.depth());
        output.push_str(&format!("{}- **{}** {}\n", indent, row.textual_id, row.behavior));

        let details = [
            ("Condition", &row.condition),
            ("Component", &row.component),
            ("Function", &row.function),
            ("Variable", &row.variable),
            ("Mode", &row.mode),
            ("Latency", &row.latency),
            ("Tolerance", &row.tolerance),
            ("Justification", &row.justification),
        ];
        for (label, value) in details {
            if !value.is_empty() {
                output.push_str(&format!("{}  - {}: {}\n", indent, label, value));
            }
        }
    }
    Ok(output)
}

/// The nested forest as pretty-printed JSON
pub fn export_forest_json(snapshot: &StoreSnapshot) -> HierarchyResult<String> {
    let forest: Forest = build_forest(snapshot.requirements.clone())?;
    Ok(serde_json::to_string_pretty(&forest).map_err(StoreError::from)?)
}

/// Encodes a snapshot in the requested format
pub fn render_export(snapshot: &StoreSnapshot, format: ExportFormat) -> HierarchyResult<String> {
    match format {
        ExportFormat::Csv => export_csv(snapshot),
        ExportFormat::Latex => export_latex(snapshot),
        ExportFormat::Markdown => export_markdown(snapshot),
        ExportFormat::Json => export_forest_json(snapshot),
    }
}

/// Exports the contents of a store to a file, returning the number of requirements written
pub fn export_to_file<S, P>(store: &S, format: ExportFormat, output_path: P) -> HierarchyResult<usize>
where
    S: EntityStore + ?Sized,
    P: AsRef<Path>,
{
    let snapshot = store.snapshot()?;
    let content = render_export(&snapshot, format)?;

    // Ensure parent directories exist
    if let Some(parent) = output_path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(StoreError::from)?;
        }
    }
    fs::write(output_path.as_ref(), content).map_err(StoreError::from)?;

    log::info!(
        "Exported {} requirements as {} to {}",
        snapshot.requirements.len(),
        format,
        output_path.as_ref().display()
    );
    Ok(snapshot.requirements.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryBackend;
    use crate::hierarchy::HierarchyEngine;
    use crate::models::RequirementDraft;
    use tempfile::tempdir;

    fn sample() -> MemoryBackend {
        let store = MemoryBackend::new();
        let valve = store.add_vocabulary(VocabularyKind::Component, "Valve").unwrap();
        let open = store.add_vocabulary(VocabularyKind::Function, "Open").unwrap();

        let engine = HierarchyEngine::new(&store);
        let root = engine
            .insert(
                None,
                RequirementDraft::new("Relieve pressure, \"fast\"")
                    .with_component(valve)
                    .with_function(open)
                    .with_condition("p > 5 bar"),
            )
            .unwrap();
        engine
            .insert(Some(root.id), RequirementDraft::new("Log 100% of events_x"))
            .unwrap();
        engine.insert(None, RequirementDraft::new("Stay idle")).unwrap();
        store
    }

    #[test]
    fn test_export_rows_in_display_order() {
        let rows = export_rows(&sample().snapshot().unwrap()).unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.textual_id.as_str()).collect();
        assert_eq!(ids, vec!["R0", "R0-0", "R1"]);
        assert_eq!(rows[0].component, "Valve");
        assert_eq!(rows[0].function, "Open");
        assert_eq!(rows[1].component, "");
    }

    #[test]
    fn test_export_csv_quotes_fields() {
        let csv = export_csv(&sample().snapshot().unwrap()).unwrap();
        let lines: Vec<_> = csv.split("\r\n").collect();

        assert_eq!(lines[0], EXPORT_COLUMNS.join(","));
        assert_eq!(
            lines[1],
            "R0,Valve,Open,,,p > 5 bar,\"Relieve pressure, \"\"fast\"\"\",,,"
        );
        assert_eq!(lines[3], "R1,,,,,,Stay idle,,,");
    }

    #[test]
    fn test_export_latex_escapes_cells() {
        let tex = export_latex(&sample().snapshot().unwrap()).unwrap();
        assert!(tex.contains("\\begin{longtable}"));
        assert!(tex.contains("Log 100\\% of events\\_x"));
        assert!(tex.trim_end().ends_with("\\end{longtable}"));
    }

    #[test]
    fn test_export_markdown_outline() {
        let md = export_markdown(&sample().snapshot().unwrap()).unwrap();
        assert!(md.contains("- **R0** Relieve pressure"));
        assert!(md.contains("  - Component: Valve\n"));
        assert!(md.contains("  - **R0-0** Log 100% of events_x\n"));
        assert!(md.contains("\n- **R1** Stay idle\n"));
    }

    #[test]
    fn test_export_forest_json_nests_children() {
        let json = export_forest_json(&sample().snapshot().unwrap()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let roots = value["roots"].as_array().unwrap();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0]["textual_id"], "R0");
        assert_eq!(roots[0]["children"][0]["textual_id"], "R0-0");
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(format!("reqs.{}", ExportFormat::Csv.extension()));

        let written = export_to_file(&sample(), ExportFormat::Csv, &path).unwrap();
        assert_eq!(written, 3);
        assert!(fs::read_to_string(&path).unwrap().starts_with("ID,Component"));
    }

    #[test]
    fn test_export_to_file_creates_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("latest").join("reqs.tex");

        export_to_file(&sample(), ExportFormat::Latex, &path).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("longtable"));
    }

    #[test]
    fn test_export_format_parse() {
        assert_eq!(ExportFormat::parse("TEX"), Some(ExportFormat::Latex));
        assert_eq!(ExportFormat::parse("md"), Some(ExportFormat::Markdown));
        assert_eq!(ExportFormat::parse("pdf"), None);
    }
}
