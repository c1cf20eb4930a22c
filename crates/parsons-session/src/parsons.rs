//! Parsons widget adapter
//!
//! Translates the widget's sortable-list and code-line events into log
//! records, and decorates session starts and commits with the widget's
//! current state.

use std::sync::Arc;

use parsons_core::{BatchId, CodeLine, EventKind, EventRecord, SolutionLine, to_json_array};
use parsons_storage::{ElementError, FormDocument};
use serde_json::Value;
use tracing::debug;

use crate::logger::SessionLogger;

/// Spaces per indent level when rendering lines as code
pub const INDENT_WIDTH: usize = 4;

/// Read access to a Parsons widget's state
pub trait ParsonsWidget: Send + Sync {
    /// Lines whose code the student has edited
    fn modified_lines(&self) -> Vec<CodeLine>;

    /// Look up a line by element id
    fn line_by_id(&self, id: &str) -> Option<CodeLine>;

    /// Current solution, one entry per line
    fn solution_code(&self) -> Vec<String>;

    /// Lines of one list, in display order
    fn list_lines(&self, list: ParsonsList) -> Vec<CodeLine>;
}

/// The two sortable lists of a Parsons widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsonsList {
    Starter,
    Solution,
}

/// A change reported by a sortable list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortableUpdate {
    /// A line changed indentation
    Reindent { target_id: String, indent: u32 },
    /// A line moved; `list_ids` is the target list's order afterwards
    Moved {
        kind: EventKind,
        target_id: String,
        list_ids: Vec<String>,
    },
}

/// Binds a [`SessionLogger`] to one widget
pub struct ParsonsLogger {
    logger: SessionLogger,
    widget: Arc<dyn ParsonsWidget>,
}

impl ParsonsLogger {
    /// Attach to `widget`, registering the session-start and commit mappers
    pub fn attach(logger: SessionLogger, widget: Arc<dyn ParsonsWidget>) -> Self {
        for kind in [EventKind::Init, EventKind::Resume] {
            let widget = widget.clone();
            logger.register_mapper(kind, move |mut record| {
                record.set_field("lines", to_json_array(&widget.modified_lines()));
                Some(record)
            });
        }

        let commit_widget = widget.clone();
        logger.register_commit_mapper(move |mut payload| {
            let code: Vec<Value> = commit_widget
                .solution_code()
                .iter()
                .map(|line| Value::String(line.replace('\n', ";")))
                .collect();
            payload.set_field("solutionCode", Value::Array(code));
            Some(payload)
        });

        debug!("Attached Parsons widget");
        Self { logger, widget }
    }

    pub fn logger(&self) -> &SessionLogger {
        &self.logger
    }

    /// Log a sortable-list change
    pub fn on_sortable_update(&self, update: SortableUpdate) -> bool {
        let record = match update {
            SortableUpdate::Reindent { target_id, indent } => {
                EventRecord::reindent(target_id, indent)
            }
            SortableUpdate::Moved {
                kind,
                target_id,
                list_ids,
            } => {
                let lines: Vec<SolutionLine> = list_ids
                    .into_iter()
                    .map(|id| SolutionLine {
                        indent: self.widget.line_by_id(&id).map(|line| line.indent),
                        id,
                    })
                    .collect();
                EventRecord::reorder(kind, target_id, &lines)
            }
        };
        self.logger.log_event(record)
    }

    /// Forward an input event from a code line's text field
    ///
    /// The code line's name is the batch id, so edits to one line coalesce.
    pub fn on_text_update(&self, input_type: &str, line_name: &str, value: &str) {
        self.logger
            .on_field_input(input_type, Some(BatchId::from(line_name)), value, None);
    }

    /// Log a submission and commit
    pub async fn on_submit(&self) -> bool {
        self.logger.on_submit().await
    }

    /// Render both lists into hidden form fields before the form is sent
    ///
    /// # Errors
    ///
    /// Returns [`ElementError::MissingElement`] if either field is absent;
    /// neither field is written in that case.
    pub fn stuff_into(
        &self,
        form: &dyn FormDocument,
        starter_id: &str,
        solution_id: &str,
    ) -> Result<(), ElementError> {
        let field = |id: &str| {
            form.element_by_id(id)
                .ok_or_else(|| ElementError::MissingElement(id.to_string()))
        };
        let starter = field(starter_id)?;
        let solution = field(solution_id)?;

        starter.set_value(&grab_list(&self.widget.list_lines(ParsonsList::Starter)));
        solution.set_value(&grab_list(&self.widget.list_lines(ParsonsList::Solution)));
        Ok(())
    }
}

/// Render lines as source code, indenting each by its level
pub fn grab_list(lines: &[CodeLine]) -> String {
    lines
        .iter()
        .map(|line| {
            format!(
                "{}{}",
                " ".repeat(line.indent as usize * INDENT_WIDTH),
                line.code
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
