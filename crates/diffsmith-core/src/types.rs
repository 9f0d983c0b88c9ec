//! Core types for the patch pipeline
//!
//! Defines the data flowing through one batch:
//! - edit requests and categories
//! - task items, notes, and task lists
//! - content snapshots and patch candidates
//! - validation/apply results, task outcomes, and the batch report

use chrono::{DateTime, Utc};
use diffsmith_grammar::{line_count, ContentHash};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter, Write as _};
use std::str::FromStr;
use ulid::Ulid;

/// Role of one target file; processing order is the declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Markup (`index.html`)
    Structure,
    /// Stylesheet (`index.css`)
    Style,
    /// Script (`index.js`)
    Behavior,
}

impl Category {
    /// Every category, in processing order
    pub const ALL: [Category; 3] = [Self::Structure, Self::Style, Self::Behavior];

    /// Default target file name
    #[inline]
    #[must_use]
    pub const fn default_file_name(self) -> &'static str {
        match self {
            Self::Structure => "index.html",
            Self::Style => "index.css",
            Self::Behavior => "index.js",
        }
    }

    /// Source language shown in prompts
    #[inline]
    #[must_use]
    pub const fn language(self) -> &'static str {
        match self {
            Self::Structure => "HTML",
            Self::Style => "CSS",
            Self::Behavior => "JavaScript",
        }
    }

    /// Lowercase name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Structure => "structure",
            Self::Style => "style",
            Self::Behavior => "behavior",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "structure" | "html" => Ok(Self::Structure),
            "style" | "css" => Ok(Self::Style),
            "behavior" | "behaviour" | "js" | "javascript" => Ok(Self::Behavior),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

/// Unrecognised category name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category '{0}', expected structure, style or behavior")]
pub struct UnknownCategory(pub String);

/// Natural-language edit request; immutable for the whole batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EditRequest(String);

impl EditRequest {
    /// Wrap request text
    #[inline]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Request text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One edit task produced by decomposition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskItem {
    /// Target category
    pub category: Category,
    /// `{action} {target} {location or purpose}`
    pub description: String,
    /// Position within the category; lower runs first
    pub sequence: usize,
}

impl TaskItem {
    /// Create a task item
    #[inline]
    pub fn new(category: Category, description: impl Into<String>, sequence: usize) -> Self {
        Self {
            category,
            description: description.into(),
            sequence,
        }
    }
}

impl Display for TaskItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}: {}", self.category, self.sequence + 1, self.description)
    }
}

/// Shared identifier declared during decomposition
///
/// Rendered as `kind: identifier - explanation`, e.g.
/// `css-class: card - used for card layout`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Note {
    pub kind: String,
    pub identifier: String,
    pub explanation: String,
}

impl Note {
    /// Create a note
    pub fn new(
        kind: impl Into<String>,
        identifier: impl Into<String>,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            identifier: identifier.into(),
            explanation: explanation.into(),
        }
    }

    /// Parse `kind: identifier - explanation`; markdown backticks are ignored
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let cleaned = text.replace('`', "");
        let (kind, rest) = cleaned.split_once(':')?;
        let (identifier, explanation) = rest.split_once(" - ")?;

        let kind = kind.trim();
        let identifier = identifier.trim();
        let explanation = explanation.trim();
        if kind.is_empty() || identifier.is_empty() || explanation.is_empty() {
            return None;
        }
        if kind.contains(char::is_whitespace) {
            return None;
        }
        Some(Self::new(kind, identifier, explanation))
    }
}

impl Display for Note {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} - {}", self.kind, self.identifier, self.explanation)
    }
}

/// Decomposition output: ordered tasks per category plus accumulated notes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    tasks: IndexMap<Category, Vec<TaskItem>>,
    notes: Vec<Note>,
}

impl TaskList {
    /// Create an empty task list
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append items for `category`, renumbering them after any existing ones
    pub fn extend_category(&mut self, category: Category, descriptions: impl IntoIterator<Item = String>) {
        let items = self.tasks.entry(category).or_default();
        for description in descriptions {
            let sequence = items.len();
            items.push(TaskItem::new(category, description, sequence));
        }
    }

    /// Add a note unless an identical one is already present
    ///
    /// Returns whether the note was added.
    pub fn add_note(&mut self, note: Note) -> bool {
        if self.notes.contains(&note) {
            return false;
        }
        self.notes.push(note);
        true
    }

    /// Tasks of one category in sequence order
    #[must_use]
    pub fn tasks(&self, category: Category) -> &[TaskItem] {
        self.tasks.get(&category).map_or(&[][..], Vec::as_slice)
    }

    /// Every task, categories in processing order
    pub fn iter(&self) -> impl Iterator<Item = &TaskItem> {
        Category::ALL.into_iter().flat_map(move |c| self.tasks(c).iter())
    }

    /// Accumulated notes
    #[inline]
    #[must_use]
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Total number of tasks
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.values().map(Vec::len).sum()
    }

    /// No task in any category
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Target content fetched immediately before one synthesis attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSnapshot {
    category: Category,
    content: String,
    hash: ContentHash,
    fetched_at: DateTime<Utc>,
}

impl ContentSnapshot {
    /// Capture fetched content
    pub fn new(category: Category, content: impl Into<String>) -> Self {
        let content = content.into();
        let hash = ContentHash::of_text(&content);
        Self {
            category,
            content,
            hash,
            fetched_at: Utc::now(),
        }
    }

    /// Category the content belongs to
    #[inline]
    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    /// Raw text
    #[inline]
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Blake3 hash of the text
    #[inline]
    #[must_use]
    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    /// Fetch time
    #[inline]
    #[must_use]
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Number of lines
    #[inline]
    #[must_use]
    pub fn line_count(&self) -> usize {
        line_count(&self.content)
    }

    /// Content with right-aligned 1-based line numbers, `   4| text`
    #[must_use]
    pub fn numbered(&self) -> String {
        let width = self.line_count().max(1).to_string().len();
        let mut out = String::with_capacity(self.content.len() + self.line_count() * (width + 2));
        for (i, line) in self.content.lines().enumerate() {
            let _ = writeln!(out, "{:>width$}| {line}", i + 1);
        }
        out
    }
}

/// Synthesizer output for one task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchCandidate {
    /// No textual change needed
    Skip { category: Category },
    /// Unified-diff text
    Diff { category: Category, text: String },
}

impl PatchCandidate {
    /// Category the candidate targets
    #[inline]
    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            Self::Skip { category } | Self::Diff { category, .. } => *category,
        }
    }

    /// Whether this is the SKIP sentinel
    #[inline]
    #[must_use]
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::Skip { .. })
    }

    /// Diff text, `None` for SKIP
    #[inline]
    #[must_use]
    pub fn diff_text(&self) -> Option<&str> {
        match self {
            Self::Skip { .. } => None,
            Self::Diff { text, .. } => Some(text),
        }
    }
}

/// Validator verdict; producing one never mutates the target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub diagnostic: String,
}

impl ValidationResult {
    /// Passing result with an empty diagnostic
    #[inline]
    #[must_use]
    pub fn valid() -> Self {
        Self {
            valid: true,
            diagnostic: String::new(),
        }
    }

    /// Failing result
    #[inline]
    pub fn invalid(diagnostic: impl Into<String>) -> Self {
        Self {
            valid: false,
            diagnostic: diagnostic.into(),
        }
    }
}

/// Applier verdict
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyResult {
    pub applied: bool,
    /// Content re-read after the commit (or the last known content on failure)
    pub resulting_content: String,
    pub message: String,
}

/// Final state of one task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeState {
    Applied,
    Skipped,
    Failed,
}

/// Why a task failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Attempt budget consumed without a valid candidate
    RetryExhausted,
    /// Commit failed or disagreed with the dry run
    ApplyDivergence,
    /// Batch was cancelled before the task started
    Cancelled,
}

/// Result of processing one task item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task: TaskItem,
    pub state: OutcomeState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    pub attempts_used: u32,
}

impl TaskOutcome {
    /// Applied after `attempts` attempts
    #[must_use]
    pub fn applied(task: TaskItem, attempts: u32) -> Self {
        Self {
            task,
            state: OutcomeState::Applied,
            failure: None,
            diagnostic: None,
            attempts_used: attempts,
        }
    }

    /// Skipped on attempt `attempts`
    #[must_use]
    pub fn skipped(task: TaskItem, attempts: u32) -> Self {
        Self {
            task,
            state: OutcomeState::Skipped,
            failure: None,
            diagnostic: None,
            attempts_used: attempts,
        }
    }

    /// Failed with a diagnostic
    pub fn failed(task: TaskItem, kind: FailureKind, diagnostic: impl Into<String>, attempts: u32) -> Self {
        Self {
            task,
            state: OutcomeState::Failed,
            failure: Some(kind),
            diagnostic: Some(diagnostic.into()),
            attempts_used: attempts,
        }
    }
}

/// Aggregated result of one batch; per-task failures are entries, not errors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub session: Ulid,
    pub outcomes: Vec<TaskOutcome>,
    pub notes: Vec<Note>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    /// Number of outcomes in `state`
    #[must_use]
    pub fn count(&self, state: OutcomeState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }

    /// Whether every task was applied or skipped
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.count(OutcomeState::Failed) == 0
    }
}

/// Explicit per-batch context handed to every pipeline call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchContext {
    /// Identity of the target set (directory, container, project)
    pub target: String,
    /// Session identity for logs and reports
    pub session: Ulid,
    files: IndexMap<Category, String>,
}

impl BatchContext {
    /// Context with default file names and a fresh session id
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            session: Ulid::new(),
            files: Category::ALL
                .into_iter()
                .map(|c| (c, c.default_file_name().to_string()))
                .collect(),
        }
    }

    /// Override the file name of one category
    #[must_use]
    pub fn with_file_name(mut self, category: Category, name: impl Into<String>) -> Self {
        self.files.insert(category, name.into());
        self
    }

    /// Use a specific session id
    #[inline]
    #[must_use]
    pub fn with_session(mut self, session: Ulid) -> Self {
        self.session = session;
        self
    }

    /// Target file name of `category`
    #[must_use]
    pub fn file_name(&self, category: Category) -> &str {
        self.files
            .get(&category)
            .map_or(category.default_file_name(), String::as_str)
    }
}

/// Request sent to the text-synthesis service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptContext {
    pub system: String,
    pub user: String,
}

impl PromptContext {
    /// Create a prompt
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Exit status and combined output of a patch tool run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub exit_code: i32,
    pub output: String,
}

impl ToolOutput {
    /// Exit code 0
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            output: output.into(),
        }
    }

    /// Non-zero exit code
    pub fn failure(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
        }
    }

    /// Whether the tool succeeded
    #[inline]
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_in_processing_order() {
        assert_eq!(
            Category::ALL,
            [Category::Structure, Category::Style, Category::Behavior]
        );
        assert_eq!(Category::Style.default_file_name(), "index.css");
        assert_eq!("JS".parse::<Category>().unwrap(), Category::Behavior);
        assert!("markup".parse::<Category>().is_err());
    }

    #[test]
    fn note_parses_canonical_shape() {
        let note = Note::parse("css-class: card - used for card layout").unwrap();
        assert_eq!(note, Note::new("css-class", "card", "used for card layout"));
        assert_eq!(note.to_string(), "css-class: card - used for card layout");
    }

    #[test]
    fn note_strips_backticks() {
        let note = Note::parse("`function: showModal - displays modal on button click`").unwrap();
        assert_eq!(note.identifier, "showModal");
    }

    #[test]
    fn note_rejects_loose_text() {
        assert!(Note::parse("remember to use the card class").is_none());
        assert!(Note::parse("css class: card - spaced kind").is_none());
        assert!(Note::parse("css-class: card").is_none());
    }

    #[test]
    fn task_list_keeps_order_and_dedupes_notes() {
        let mut list = TaskList::new();
        list.extend_category(Category::Style, vec!["Add a .card class".to_string()]);
        list.extend_category(
            Category::Structure,
            vec!["Add a nav element".to_string(), "Add two links inside the nav".to_string()],
        );
        assert!(list.add_note(Note::new("css-class", "card", "card layout")));
        assert!(!list.add_note(Note::new("css-class", "card", "card layout")));

        let order: Vec<_> = list.iter().map(|t| (t.category, t.sequence)).collect();
        assert_eq!(
            order,
            vec![
                (Category::Structure, 0),
                (Category::Structure, 1),
                (Category::Style, 0)
            ]
        );
        assert_eq!(list.len(), 3);
        assert_eq!(list.notes().len(), 1);
        assert!(list.tasks(Category::Behavior).is_empty());
    }

    #[test]
    fn snapshot_numbers_lines() {
        let snapshot = ContentSnapshot::new(Category::Style, "a\nb\n");
        assert_eq!(snapshot.numbered(), "1| a\n2| b\n");
        assert_eq!(snapshot.line_count(), 2);
        assert_eq!(*snapshot.hash(), ContentHash::of_text("a\nb\n"));
    }

    #[test]
    fn context_file_names_override() {
        let ctx = BatchContext::new("site").with_file_name(Category::Behavior, "app.js");
        assert_eq!(ctx.file_name(Category::Behavior), "app.js");
        assert_eq!(ctx.file_name(Category::Structure), "index.html");
    }

    #[test]
    fn outcome_serializes_without_empty_fields() {
        let outcome = TaskOutcome::applied(TaskItem::new(Category::Structure, "Change the title", 0), 1);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["state"], "applied");
        assert!(json.get("diagnostic").is_none());
    }
}
