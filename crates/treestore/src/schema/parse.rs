//! Reader for the column-aligned model language.
//!
//! ```text
//! ?Paper  Title UNIQUE Text
//!         Author ?Person XREF Paper
//!         Year Int
//! ```
//!
//! A line starting in column 0 opens a model (`?Class` or `#Subtype`).
//! Every further token on a line sits right of the one before it. The first
//! token of an indented line is a down-alternative of the most recent token
//! in the same column. `//` starts a comment; tabs advance to the next
//! multiple of eight.

use crate::error::{Result, StoreError};
use crate::key::{Key, CONSTRAINT_CLASS, SUBTYPE_CLASS, SYSTEM_TAGS, TAG_CLASS};
use crate::lexicon::Lexicon;
use crate::tree::{NodeId, Tree, Value};

const TAB_WIDTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Token<'a> {
    column: usize,
    text: &'a str,
}

/// Parse model definitions into raw model trees, one per model.
///
/// Class names after `?` must already be defined in the lexicon; tags,
/// subtypes and constraint names are interned on the fly.
///
/// # Errors
///
/// Returns [`StoreError::SchemaAuthoring`] for misaligned lines and lines
/// outside any model, and [`StoreError::UnknownName`] for undefined classes.
pub fn parse_models(text: &str, lexicon: &dyn Lexicon) -> Result<Vec<Tree>> {
    let mut models = Vec::new();
    let mut current: Option<Tree> = None;
    let mut open: Vec<(usize, NodeId)> = Vec::new();

    for (number, line) in text.lines().enumerate() {
        let line_no = number + 1;
        let tokens = tokenize(line);
        let Some(first) = tokens.first() else {
            continue;
        };

        let mut last;
        if first.column == 0 {
            let model = model_key(first.text, lexicon, line_no)?;
            if let Some(done) = current.take() {
                models.push(done);
            }
            let tree = Tree::new(model, 0, None)?;
            last = tree.root();
            open = vec![(0, last)];
            current = Some(tree);
        } else {
            let tree = current.as_mut().ok_or_else(|| {
                StoreError::authoring(format!("line {line_no}: indented line outside any model"))
            })?;
            let slot = open
                .iter()
                .position(|(column, _)| *column == first.column)
                .filter(|&slot| slot > 0)
                .ok_or_else(|| {
                    StoreError::authoring(format!(
                        "line {line_no}: `{}` at column {} lines up with nothing above it",
                        first.text,
                        first.column + 1
                    ))
                })?;
            let above = open[slot].1;
            let key = token_key(first.text, None, lexicon, line_no)?;
            let id = tree.add_node(key, Value::None, 0)?;
            tree.link_down(above, id);
            open.truncate(slot);
            open.push((first.column, id));
            last = id;
        }

        let Some(tree) = current.as_mut() else {
            continue;
        };
        let mut previous = first.text;
        for token in &tokens[1..] {
            let key = token_key(token.text, Some(previous), lexicon, line_no)?;
            let id = tree.add_node(key, Value::None, 0)?;
            tree.link_right(last, id);
            open.push((token.column, id));
            last = id;
            previous = token.text;
        }
    }

    models.extend(current);
    Ok(models)
}

fn model_key(text: &str, lexicon: &dyn Lexicon, line_no: usize) -> Result<Key> {
    if text.starts_with('?') || text.starts_with('#') {
        token_key(text, None, lexicon, line_no)
    } else {
        Err(StoreError::authoring(format!(
            "line {line_no}: a model starts with ?Class or #Subtype, found `{text}`"
        )))
    }
}

fn token_key(
    text: &str,
    previous: Option<&str>,
    lexicon: &dyn Lexicon,
    line_no: usize,
) -> Result<Key> {
    match previous {
        Some("XREF") => return lexicon.intern(TAG_CLASS, text),
        Some("Constraint") => return lexicon.intern(CONSTRAINT_CLASS, text),
        _ => {}
    }

    if let Some(name) = text.strip_prefix('?') {
        if name.is_empty() {
            return Err(StoreError::authoring(format!("line {line_no}: empty class name")));
        }
        return lexicon
            .class_by_name(name)
            .map(Key::class_marker)
            .ok_or_else(|| StoreError::UnknownName {
                name: name.to_string(),
            });
    }
    if let Some(name) = text.strip_prefix('#') {
        if name.is_empty() {
            return Err(StoreError::authoring(format!("line {line_no}: empty subtype name")));
        }
        return lexicon.intern(SUBTYPE_CLASS, name);
    }
    if let Some((key, _)) = SYSTEM_TAGS.iter().find(|(_, name)| *name == text) {
        return Ok(*key);
    }
    lexicon.intern(TAG_CLASS, text)
}

fn tokenize(line: &str) -> Vec<Token<'_>> {
    let line = match line.find("//") {
        Some(at) => &line[..at],
        None => line,
    };

    let mut tokens = Vec::new();
    let mut column = 0;
    let mut start: Option<(usize, usize)> = None;
    for (offset, ch) in line.char_indices() {
        if ch.is_whitespace() {
            if let Some((begin, at)) = start.take() {
                tokens.push(Token {
                    column: at,
                    text: &line[begin..offset],
                });
            }
            column = if ch == '\t' {
                (column / TAB_WIDTH + 1) * TAB_WIDTH
            } else {
                column + 1
            };
        } else {
            if start.is_none() {
                start = Some((offset, column));
            }
            column += 1;
        }
    }
    if let Some((begin, at)) = start {
        tokens.push(Token {
            column: at,
            text: &line[begin..],
        });
    }
    tokens
}
