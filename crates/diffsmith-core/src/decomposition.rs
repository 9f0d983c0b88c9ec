//! Task decomposition
//!
//! Turns one edit request into ordered task items per category plus shared
//! notes, with one text-synthesis round trip per category. The reply format
//! is a numbered list of `{action} {target} {location or purpose}` items and
//! an optional `note:` section of `kind: identifier - explanation` lines.

use crate::error::{DecompositionError, TransportError};
use crate::ports::{with_deadline, TextSynthesizer};
use crate::types::{Category, EditRequest, Note, PromptContext, TaskList};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

/// Reply meaning "no edits for this category"
pub const NONE_SENTINEL: &str = "NONE";

/// First words that describe activity around an edit, not an edit
pub const BANNED_ACTIONS: &[&str] = &[
    "open", "locate", "find", "save", "refresh", "reload", "test", "run", "view", "preview", "verify",
];

static ITEM_RE: Lazy<Regex> = Lazy::new(|| compile_regex(r"^\s*\d+[.)]\s+(.*)$"));
static NOTE_RE: Lazy<Regex> = Lazy::new(|| compile_regex(r"(?i)^\s*\**note\**\s*:\s*(.*)$"));
static BULLET_RE: Lazy<Regex> = Lazy::new(|| compile_regex(r"^\s*[-*•]\s+(.*)$"));

fn compile_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|err| panic!("invalid pattern {pattern}: {err}"))
}

/// Category-specific prompt material
#[derive(Debug, Clone, Copy)]
pub struct DecompositionProfile {
    pub category: Category,
    /// What belongs in this category and what does not
    pub scope: &'static str,
    /// Good items followed by ❌ counter-examples
    pub examples: &'static str,
}

impl DecompositionProfile {
    /// Profile for `category`
    #[must_use]
    pub const fn for_category(category: Category) -> Self {
        match category {
            Category::Structure => Self {
                category,
                scope: "Break down only HTML source edits: add, modify or move HTML elements. \
                        Exclude file operations, testing and styling specifics.\n\
                        Tailwind CSS is already loaded from a CDN, so utility classes may be used directly in markup. \
                        If a custom class is needed across several elements, name it and declare it in the `note:` section.",
                examples: "1. Add an empty <nav> element above the main heading\n\
                           2. Inside the <nav>, insert two anchor tags: 'Home' and 'About Us'\n\
                           3. Below the <nav>, add the HTML structure for a card component\n\
                           4. Move the existing main heading element into the card component\n\
                           ❌ Locate the HTML file\n\
                           ❌ Open the editor and find the <body> tag\n\
                           ❌ Save the changes and refresh the browser",
            },
            Category::Style => Self {
                category,
                scope: "Break down only CSS source edits: add or adjust styles, selectors and properties. \
                        Exclude HTML structure and JavaScript logic.\n\
                        Tailwind CSS is already loaded from a CDN; only add custom CSS where utility classes are not enough. \
                        Declare every new class in the `note:` section as `css-class: className - description`.",
                examples: "1. Add background-color and padding styles to the <nav> element\n\
                           2. Create a .card class with rounded corners and a shadow\n\
                           ❌ Add a new <div> with class 'card'\n\
                           ❌ Attach click event logic to trigger an animation",
            },
            Category::Behavior => Self {
                category,
                scope: "Break down only JavaScript source edits: add or modify script logic, functions and event handlers. \
                        Exclude markup and styling details.\n\
                        Declare every function or constant reused across items in the `note:` section as \
                        `function: functionName - description`.",
                examples: "1. Add a click event listener to the 'About Us' link\n\
                           2. Define a function to toggle the navigation menu\n\
                           3. Attach the toggle function to a button element\n\
                           ❌ Modify <nav> layout\n\
                           ❌ Change text alignment using CSS",
            },
        }
    }

    /// System and user messages for one decomposition pass
    #[must_use]
    pub fn prompt(&self, request: &EditRequest, known_notes: &[Note]) -> PromptContext {
        let language = self.category.language();
        let mut system = format!(
            "You are a senior process analyst specializing in web development and task breakdown.\n\n\
             You will receive a user request for webpage modifications. Break down only the parts involving \
             {language} source code edits into clear, sequential TODO items. Each item will later become one diff.\n\n\
             {scope}\n\n\
             Rules:\n\
             * Do NOT include tasks about locating, opening, saving, testing, refreshing or viewing files.\n\
             * Describe only the specific code edit.\n\
             * Each item is one numbered line: `{{action}} {{target}} {{location or purpose}}`.\n\
             * Order items so that each one only depends on items before it.\n\
             * If no {language} change is required, reply with exactly {NONE_SENTINEL}.\n\
             * Declare class names, function names or other identifiers shared between items in a `note:` section, \
             one per line as `kind: identifier - explanation`, e.g. `css-class: card - used for card layout`.\n\n\
             Example items:\n{examples}\n",
            scope = self.scope,
            examples = self.examples,
        );
        if !known_notes.is_empty() {
            system.push_str("\nIdentifiers already declared for other files:\n");
            for note in known_notes {
                let _ = writeln!(system, "- {note}");
            }
        }
        PromptContext::new(system, request.as_str())
    }
}

/// Parsed decomposition reply for one category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedReply {
    /// Accepted item descriptions, in reply order
    pub items: Vec<String>,
    pub notes: Vec<Note>,
    /// Items dropped by the filters
    pub dropped: Vec<String>,
}

impl ParsedReply {
    /// Nothing at all could be read from the reply
    #[must_use]
    pub fn is_unparsable(&self) -> bool {
        self.items.is_empty() && self.notes.is_empty() && self.dropped.is_empty()
    }
}

/// Parse a decomposition reply
///
/// Numbered items may wrap onto following lines; continuation lines are
/// joined with a space. A blank line or a new item ends the current one.
#[must_use]
pub fn parse_reply(text: &str) -> ParsedReply {
    let mut reply = ParsedReply::default();
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NONE_SENTINEL) {
        return reply;
    }

    let mut current: Option<String> = None;
    let mut in_notes = false;

    for line in trimmed.lines() {
        if let Some(caps) = NOTE_RE.captures(line) {
            flush_item(&mut current, &mut reply);
            in_notes = true;
            push_note(caps.get(1).map_or("", |m| m.as_str()), &mut reply);
        } else if let Some(caps) = ITEM_RE.captures(line) {
            flush_item(&mut current, &mut reply);
            in_notes = false;
            current = Some(caps.get(1).map_or("", |m| m.as_str()).trim().to_string());
        } else if in_notes {
            if let Some(caps) = BULLET_RE.captures(line) {
                push_note(caps.get(1).map_or("", |m| m.as_str()), &mut reply);
            } else if line.trim().is_empty() {
                continue;
            } else {
                push_note(line, &mut reply);
            }
        } else if line.trim().is_empty() {
            flush_item(&mut current, &mut reply);
        } else if let Some(item) = current.as_mut() {
            item.push(' ');
            item.push_str(line.trim());
        } else if line.trim_start().starts_with('❌') {
            reply.dropped.push(line.trim().to_string());
        }
    }
    flush_item(&mut current, &mut reply);

    reply
}

fn push_note(text: &str, reply: &mut ParsedReply) {
    if text.trim().is_empty() {
        return;
    }
    match Note::parse(text) {
        Some(note) if !reply.notes.contains(&note) => reply.notes.push(note),
        Some(_) => {}
        None => tracing::debug!("Ignoring malformed note: {}", text.trim()),
    }
}

fn flush_item(current: &mut Option<String>, reply: &mut ParsedReply) {
    let Some(raw) = current.take() else { return };
    let item = raw.trim().trim_start_matches('✅').trim().to_string();
    if item.is_empty() {
        return;
    }
    match rejection(&item) {
        Some(reason) => {
            tracing::debug!("Dropping item ({}): {}", reason, item);
            reply.dropped.push(item);
        }
        None => reply.items.push(item),
    }
}

/// Why an item is not an edit task, if it is not
fn rejection(item: &str) -> Option<&'static str> {
    if item.starts_with('❌') {
        return Some("counter-example");
    }
    let words: Vec<&str> = item.split_whitespace().collect();
    if words.len() < 2 {
        return Some("malformed");
    }
    let action = words[0]
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    if BANNED_ACTIONS.contains(&action.as_str()) {
        return Some("meta-action");
    }
    None
}

/// Runs one decomposition pass per category through the text-synthesis service
pub struct TaskDecomposer {
    service: Arc<dyn TextSynthesizer>,
    timeout: Duration,
}

impl std::fmt::Debug for TaskDecomposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDecomposer")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl TaskDecomposer {
    /// Create decomposer
    #[inline]
    #[must_use]
    pub fn new(service: Arc<dyn TextSynthesizer>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    /// Decompose `request` for one category
    ///
    /// `known_notes` are notes from earlier categories; they are shown to the
    /// service so later categories can refer to them.
    ///
    /// # Errors
    /// Returns [`DecompositionError::Transport`] when the service call fails
    pub async fn decompose(
        &self,
        request: &EditRequest,
        category: Category,
        known_notes: &[Note],
    ) -> Result<ParsedReply, DecompositionError> {
        let prompt = DecompositionProfile::for_category(category).prompt(request, known_notes);
        let text = with_deadline("decomposition", self.timeout, self.service.complete(&prompt))
            .await
            .map_err(|source: TransportError| DecompositionError::Transport { category, source })?;

        let reply = parse_reply(&text);
        if reply.is_unparsable() && !is_none_reply(&text) {
            tracing::warn!(
                "Decomposition reply for {} has no numbered items; treating as no edits",
                category
            );
        }
        tracing::debug!(
            "Decomposed {}: {} items, {} notes, {} dropped",
            category,
            reply.items.len(),
            reply.notes.len(),
            reply.dropped.len()
        );
        Ok(reply)
    }

    /// Decompose `request` for every category, in processing order
    ///
    /// An empty result is returned as-is; the caller decides whether that
    /// aborts the batch.
    ///
    /// # Errors
    /// Returns the first failed category pass
    pub async fn decompose_all(&self, request: &EditRequest) -> Result<TaskList, DecompositionError> {
        let mut list = TaskList::new();
        for category in Category::ALL {
            let reply = self.decompose(request, category, list.notes()).await?;
            list.extend_category(category, reply.items);
            for note in reply.notes {
                list.add_note(note);
            }
        }
        tracing::info!(
            "Decomposed request into {} tasks and {} notes",
            list.len(),
            list.notes().len()
        );
        Ok(list)
    }
}

fn is_none_reply(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NONE_SENTINEL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::MockTextSynthesizer;
    use pretty_assertions::assert_eq;

    #[test]
    fn numbered_items_keep_order() {
        let reply = parse_reply(
            "1. Add an empty <nav> element above the main heading\n\
             2) Inside the <nav>, insert two anchor tags: 'Home' and 'About Us'\n\
             3. Move the main heading into a card component",
        );
        assert_eq!(
            reply.items,
            vec![
                "Add an empty <nav> element above the main heading",
                "Inside the <nav>, insert two anchor tags: 'Home' and 'About Us'",
                "Move the main heading into a card component",
            ]
        );
    }

    #[test]
    fn wrapped_item_is_joined() {
        let reply = parse_reply("1. Add a footer element\n   below the card component\n2. Add a copyright line inside the footer");
        assert_eq!(reply.items[0], "Add a footer element below the card component");
        assert_eq!(reply.items.len(), 2);
    }

    #[test]
    fn meta_actions_are_filtered() {
        let reply = parse_reply(
            "1. Locate the HTML file\n\
             2. Open the editor and find the <body> tag\n\
             3. Add a <nav> element at the top of <body>\n\
             4. Save the changes and refresh the browser\n\
             5. **Test** the page in a browser",
        );
        assert_eq!(reply.items, vec!["Add a <nav> element at the top of <body>"]);
        assert_eq!(reply.dropped.len(), 4);
    }

    #[test]
    fn counter_examples_and_fragments_are_dropped() {
        let reply = parse_reply("1. ❌ Modify <nav> layout\n2. Nav\n3. Define a toggleMenu function");
        assert_eq!(reply.items, vec!["Define a toggleMenu function"]);
    }

    #[test]
    fn inline_and_bulleted_notes() {
        let reply = parse_reply(
            "1. Create a .card class with rounded corners\n\n\
             note: css-class: card - used for card layout\n\
             Note:\n\
             - function: showModal - displays modal on button click\n\
             - css-class: card - used for card layout\n\
             - remember the card",
        );
        assert_eq!(reply.items.len(), 1);
        assert_eq!(
            reply.notes,
            vec![
                Note::new("css-class", "card", "used for card layout"),
                Note::new("function", "showModal", "displays modal on button click"),
            ]
        );
    }

    #[test]
    fn none_reply_is_empty_and_parsable() {
        for text in ["NONE", "  none \n", ""] {
            let reply = parse_reply(text);
            assert!(reply.items.is_empty());
            assert!(is_none_reply(text));
        }
    }

    #[test]
    fn prose_reply_is_unparsable() {
        let reply = parse_reply("I think the page looks fine as it is.");
        assert!(reply.is_unparsable());
    }

    #[test]
    fn prompt_lists_known_notes() {
        let request = EditRequest::new("add a card");
        let notes = vec![Note::new("css-class", "card", "card layout")];
        let prompt = DecompositionProfile::for_category(Category::Style).prompt(&request, &notes);
        assert!(prompt.system.contains("CSS source code edits"));
        assert!(prompt.system.contains("- css-class: card - card layout"));
        assert!(prompt.system.contains("reply with exactly NONE"));
        assert_eq!(prompt.user, "add a card");
    }

    #[tokio::test]
    async fn decompose_all_runs_categories_in_order() {
        let mut service = MockTextSynthesizer::new();
        let mut seq = mockall::Sequence::new();
        service
            .expect_complete()
            .withf(|p| p.system.contains("HTML source code edits"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok("1. Add a card container around the heading\nnote: css-class: card - card layout".into())
            });
        service
            .expect_complete()
            .withf(|p| p.system.contains("CSS source code edits") && p.system.contains("css-class: card"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("1. Create a .card class with a shadow\nnote: css-class: card - card layout".into()));
        service
            .expect_complete()
            .withf(|p| p.system.contains("JavaScript source code edits"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("NONE".into()));

        let decomposer = TaskDecomposer::new(Arc::new(service), Duration::from_secs(5));
        let list = decomposer
            .decompose_all(&EditRequest::new("put the heading in a card"))
            .await
            .unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(list.tasks(Category::Structure)[0].sequence, 0);
        assert_eq!(list.tasks(Category::Style)[0].description, "Create a .card class with a shadow");
        assert!(list.tasks(Category::Behavior).is_empty());
        assert_eq!(list.notes().len(), 1);
    }

    #[tokio::test]
    async fn transport_failure_names_category() {
        let mut service = MockTextSynthesizer::new();
        service
            .expect_complete()
            .returning(|_| Err(TransportError::Connection("refused".into())));

        let decomposer = TaskDecomposer::new(Arc::new(service), Duration::from_secs(5));
        let err = decomposer
            .decompose_all(&EditRequest::new("anything"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DecompositionError::Transport {
                category: Category::Structure,
                source: TransportError::Connection("refused".into()),
            }
        );
    }
}
