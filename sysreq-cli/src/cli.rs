use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Hierarchical system requirements with derived R0-1 style ids")]
pub struct Cli {
    /// Path to the requirements database (":memory:" for a throwaway store)
    #[clap(long, global = true)]
    pub db: Option<PathBuf>,

    /// Increase logging verbosity (-v info, -vv debug, -vvv trace)
    #[clap(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[clap(subcommand)]
    pub command: Command,
}

/// Descriptive fields of a requirement; vocabulary entries are given by name
#[derive(Args, Debug, Default)]
pub struct DraftArgs {
    /// What the system shall do
    #[clap(long)]
    pub behavior: Option<String>,

    /// Triggering condition
    #[clap(long)]
    pub condition: Option<String>,

    /// Rationale
    #[clap(long)]
    pub justification: Option<String>,

    /// Latency reference (e.g. L-100ms)
    #[clap(long)]
    pub latency: Option<String>,

    /// Tolerance reference (e.g. T-5%)
    #[clap(long)]
    pub tolerance: Option<String>,

    /// Function name
    #[clap(long)]
    pub function: Option<String>,

    /// Variable name
    #[clap(long)]
    pub variable: Option<String>,

    /// Component name
    #[clap(long)]
    pub component: Option<String>,

    /// Mode name
    #[clap(long)]
    pub mode: Option<String>,
}

impl DraftArgs {
    /// True if no field was given on the command line
    pub fn is_empty(&self) -> bool {
        self.behavior.is_none()
            && self.condition.is_none()
            && self.justification.is_none()
            && self.latency.is_none()
            && self.tolerance.is_none()
            && self.function.is_none()
            && self.variable.is_none()
            && self.component.is_none()
            && self.mode.is_none()
    }
}

#[derive(Subcommand, Debug)]
pub enum VocabCommand {
    /// Add a function, variable, component or mode
    Add {
        /// Kind of entry (function, variable, component, mode)
        kind: String,

        /// Name of the entry
        name: String,
    },

    /// List vocabulary entries
    List {
        /// Only list this kind
        kind: Option<String>,
    },

    /// Rename a vocabulary entry
    Rename {
        /// Kind of entry
        kind: String,

        /// Current name
        name: String,

        /// New name
        new_name: String,
    },

    /// Remove a vocabulary entry; requirements using it lose the reference
    Remove {
        /// Kind of entry
        kind: String,

        /// Name of the entry
        name: String,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },

    /// Allow a component in requirements of a mode
    Allow {
        /// Mode name
        #[clap(long)]
        mode: String,

        /// Component name
        #[clap(long)]
        component: String,
    },

    /// Revoke a mode/component association
    Disallow {
        /// Mode name
        #[clap(long)]
        mode: String,

        /// Component name
        #[clap(long)]
        component: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the settings file and its values
    Show,

    /// Set the database opened when neither --db nor SYSREQ_DB is given
    Database {
        /// Database path; omit to clear the setting
        path: Option<String>,
    },

    /// Set the default export format
    ExportFormat {
        /// csv, latex, markdown or json
        format: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a new requirement (a root unless --parent is given)
    Add {
        /// Parent requirement (textual id like R0-1 or row id)
        #[clap(long)]
        parent: Option<String>,

        #[clap(flatten)]
        fields: DraftArgs,

        /// Use interactive mode (prompts)
        #[clap(long)]
        interactive: bool,
    },

    /// Show the requirement tree
    List {
        /// Show a flat table instead of the tree
        #[clap(long)]
        flat: bool,
    },

    /// Show details for a specific requirement
    Show {
        /// Textual id or row id (prompts if omitted)
        id: Option<String>,
    },

    /// Edit the descriptive fields of a requirement
    Edit {
        /// Textual id or row id (prompts if omitted)
        id: Option<String>,

        #[clap(flatten)]
        fields: DraftArgs,

        /// Use interactive mode (prompts)
        #[clap(long)]
        interactive: bool,
    },

    /// Move a requirement among its siblings
    Move {
        /// Textual id or row id
        id: String,

        /// Direction: up, down, top or bottom
        direction: String,
    },

    /// Move a requirement (and its subtree) under another parent
    Reparent {
        /// Textual id or row id
        id: String,

        /// New parent; omit to make the requirement a root
        #[clap(long)]
        to: Option<String>,
    },

    /// Delete a requirement and all of its descendants
    Del {
        /// Textual id or row id
        id: String,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },

    /// Check the hierarchy for integrity problems
    Check,

    /// Close ordering gaps and fix stale levels
    Normalize,

    /// Show store statistics
    Stats,

    /// Manage functions, variables, components and modes
    #[clap(subcommand)]
    Vocab(VocabCommand),

    /// Show or change the user settings
    #[clap(subcommand)]
    Config(ConfigCommand),

    /// Export requirements
    Export {
        /// csv, latex, markdown, json or project (defaults to the settings file)
        #[clap(long)]
        format: Option<String>,

        /// Output file path
        #[clap(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Replace the database contents with a project file
    Import {
        /// Project file (JSON) to import
        file: PathBuf,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },
}
