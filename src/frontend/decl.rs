//! frontend::decl
//!
//! A line-oriented declaration frontend.
//!
//! # Format
//!
//! ```text
//! -- comment
//! type Point = Point Nat Nat
//! origin = Point 0 0
//! double x =
//!   x + x
//! > double 21
//! ```
//!
//! - `type <Name> ...` declares a type
//! - `<name> [args] = ...` declares a term
//! - `> <expr>` is a watch expression
//! - Indented lines continue the previous declaration
//! - Blank lines and `--` comments are ignored
//!
//! The frontend does not type-check bodies; it only splits the file into
//! named definitions, which is all the command loop needs.

use std::collections::BTreeSet;
use std::path::Path;

use super::{CheckOutcome, CheckedProgram, Diagnostic, Frontend};
use crate::core::branch::{Definition, Dimension};
use crate::core::types::Name;

const COMMENT: &str = "--";
const WATCH: char = '>';
const TYPE_KEYWORD: &str = "type";

/// Built-in [`Frontend`] for declaration files.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclarationFrontend;

impl DeclarationFrontend {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug)]
struct Pending {
    name: Name,
    kind: Dimension,
    source: String,
}

impl Frontend for DeclarationFrontend {
    fn check(&self, path: &Path, source: &str) -> CheckOutcome {
        let mut diagnostics = Vec::new();
        let mut definitions: Vec<(Name, Definition)> = Vec::new();
        let mut watches = Vec::new();
        let mut seen: BTreeSet<(Dimension, Name)> = BTreeSet::new();
        let mut pending: Option<Pending> = None;

        for (index, raw) in source.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim_end();
            let trimmed = line.trim_start();

            if trimmed.is_empty() || trimmed.starts_with(COMMENT) {
                continue;
            }

            if line.len() != trimmed.len() {
                match pending.as_mut() {
                    Some(p) => {
                        p.source.push('\n');
                        p.source.push_str(line);
                    }
                    None => diagnostics.push(Diagnostic::new(
                        line_no,
                        "indented line does not continue a definition",
                    )),
                }
                continue;
            }

            finish(&mut pending, &mut definitions);

            if let Some(expr) = trimmed.strip_prefix(WATCH) {
                let expr = expr.trim();
                if expr.is_empty() {
                    diagnostics.push(Diagnostic::new(line_no, "empty watch expression"));
                } else {
                    watches.push(expr.to_string());
                }
                continue;
            }

            match declaration_head(trimmed) {
                Ok((kind, raw_name)) => match Name::new(raw_name) {
                    Ok(name) => {
                        if !seen.insert((kind, name.clone())) {
                            diagnostics.push(Diagnostic::new(
                                line_no,
                                format!("{kind} '{name}' is defined more than once"),
                            ));
                        }
                        pending = Some(Pending {
                            name,
                            kind,
                            source: trimmed.to_string(),
                        });
                    }
                    Err(_) => diagnostics
                        .push(Diagnostic::new(line_no, format!("invalid name '{raw_name}'"))),
                },
                Err(message) => diagnostics.push(Diagnostic::new(line_no, message)),
            }
        }
        finish(&mut pending, &mut definitions);

        if diagnostics.is_empty() {
            CheckOutcome::Checked(CheckedProgram {
                path: path.to_path_buf(),
                definitions,
                watches,
            })
        } else {
            CheckOutcome::Diagnostics(diagnostics)
        }
    }
}

fn finish(pending: &mut Option<Pending>, definitions: &mut Vec<(Name, Definition)>) {
    if let Some(p) = pending.take() {
        definitions.push((p.name, Definition::new(p.kind, p.source)));
    }
}

/// Dimension and name of an unindented declaration line.
fn declaration_head(line: &str) -> Result<(Dimension, &str), &'static str> {
    let mut tokens = line.split_whitespace();
    let first = tokens.next().ok_or("expected a declaration")?;

    if first == TYPE_KEYWORD {
        let name = tokens.next().ok_or("type declaration is missing a name")?;
        return Ok((Dimension::Type, name));
    }

    if !line.contains('=') {
        return Err("expected a definition, type declaration or watch");
    }
    let name = first.split('=').next().unwrap_or(first);
    if name.is_empty() {
        return Err("definition is missing a name");
    }
    Ok((Dimension::Term, name))
}
