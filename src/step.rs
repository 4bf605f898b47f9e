//! Minimal STEP (ISO-10303-21) parser scoped to exactly what [`crate::ifc`]
//! needs: entity instances of the form `#id=TYPE(arg, arg, ...);` in the
//! `DATA` section, with enough value parsing (strings, numbers, `$`/`*`,
//! nested lists, `#id` references) to walk `IsDecomposedBy`,
//! `ContainsElements`, `IsDefinedBy`, and property sets. This is not a
//! general EXPRESS/IFC schema implementation.

use crate::error::{ChunkerError, Result};
use std::collections::HashMap;

/// One parsed attribute value of a STEP entity instance.
#[derive(Clone, Debug, PartialEq)]
pub enum StepValue {
    Id(u64),
    Int(i64),
    Real(f64),
    Str(String),
    /// An EXPRESS enumeration or simple-type keyword, e.g. `.T.` or `.NOTDEFINED.`
    Keyword(String),
    List(Vec<StepValue>),
    /// `$`: explicitly unset.
    Null,
    /// `*`: inherited from a supertype, not resolved here.
    Inherited,
}

impl StepValue {
    pub fn as_id(&self) -> Option<u64> {
        match self {
            StepValue::Id(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StepValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[StepValue]> {
        match self {
            StepValue::List(items) => Some(items),
            _ => None,
        }
    }
}

/// One `#id = TYPE(args);` instance from the `DATA` section.
#[derive(Clone, Debug)]
pub struct StepEntity {
    pub id: u64,
    pub type_name: String,
    pub args: Vec<StepValue>,
}

impl StepEntity {
    pub fn arg(&self, index: usize) -> Option<&StepValue> {
        self.args.get(index)
    }
}

/// A parsed STEP file: every entity instance keyed by id, plus file order
/// (STEP ids are assigned in ascending declaration order in practice, and
/// file order is what `ifcopenshell`'s `by_type` iteration relies on).
#[derive(Clone, Debug, Default)]
pub struct StepModel {
    pub entities: HashMap<u64, StepEntity>,
    pub order: Vec<u64>,
}

impl StepModel {
    pub fn get(&self, id: u64) -> Option<&StepEntity> {
        self.entities.get(&id)
    }
}

/// Parses the `DATA` section of a STEP file. Header section and comments
/// (`/* ... */`) are skipped; only the shape the IFC builder needs is kept.
pub fn parse(text: &str) -> Result<StepModel> {
    let mut model = StepModel::default();
    let data = strip_comments(text);

    for statement in split_statements(&data) {
        let statement = statement.trim();
        if statement.is_empty() || !statement.starts_with('#') {
            continue;
        }
        let entity = parse_entity(statement)?;
        model.order.push(entity.id);
        model.entities.insert(entity.id, entity);
    }

    Ok(model)
}

fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Splits on top-level `;` terminators, respecting quoted strings so a `;`
/// inside a name doesn't end the statement early.
fn split_statements(text: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_string = !in_string;
                current.push(c);
            }
            ';' if !in_string => {
                statements.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        statements.push(current);
    }
    statements
}

fn parse_entity(statement: &str) -> Result<StepEntity> {
    let eq = statement.find('=').ok_or_else(|| {
        ChunkerError::IfcParseError(format!("malformed entity instance: {statement}"))
    })?;
    let id_part = statement[..eq].trim();
    let id = id_part.trim_start_matches('#').parse::<u64>().map_err(|_| {
        ChunkerError::IfcParseError(format!("malformed instance id: {id_part}"))
    })?;

    let rest = statement[eq + 1..].trim();
    let open = rest.find('(').ok_or_else(|| {
        ChunkerError::IfcParseError(format!("missing argument list: {statement}"))
    })?;
    let type_name = rest[..open].trim().to_ascii_uppercase();
    let close = rest.rfind(')').ok_or_else(|| {
        ChunkerError::IfcParseError(format!("missing closing paren: {statement}"))
    })?;
    let args_src = &rest[open + 1..close];

    let args = parse_arg_list(args_src)?;
    Ok(StepEntity {
        id,
        type_name,
        args,
    })
}

/// Splits a comma-separated argument list, honoring nested `(...)` and
/// quoted strings, then parses each piece as a [`StepValue`].
fn parse_arg_list(src: &str) -> Result<Vec<StepValue>> {
    let mut args = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut current = String::new();
    let mut chars = src.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_string = !in_string;
                current.push(c);
            }
            '(' if !in_string => {
                depth += 1;
                current.push(c);
            }
            ')' if !in_string => {
                depth -= 1;
                current.push(c);
            }
            ',' if !in_string && depth == 0 => {
                args.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() || !args.is_empty() {
        args.push(current);
    }

    args.iter()
        .map(|raw| parse_value(raw.trim()))
        .collect::<Result<Vec<_>>>()
}

fn parse_value(raw: &str) -> Result<StepValue> {
    if raw.is_empty() || raw == "$" {
        return Ok(StepValue::Null);
    }
    if raw == "*" {
        return Ok(StepValue::Inherited);
    }
    if let Some(rest) = raw.strip_prefix('#') {
        return rest
            .parse::<u64>()
            .map(StepValue::Id)
            .map_err(|_| ChunkerError::IfcParseError(format!("malformed reference: {raw}")));
    }
    if raw.starts_with('(') && raw.ends_with(')') {
        let inner = &raw[1..raw.len() - 1];
        return Ok(StepValue::List(parse_arg_list(inner)?));
    }
    if raw.starts_with('\'') && raw.ends_with('\'') && raw.len() >= 2 {
        // STEP escapes an embedded quote as a doubled quote.
        let inner = &raw[1..raw.len() - 1];
        return Ok(StepValue::Str(inner.replace("''", "'")));
    }
    if raw.starts_with('.') && raw.ends_with('.') && raw.len() >= 2 {
        return Ok(StepValue::Keyword(raw[1..raw.len() - 1].to_string()));
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Ok(StepValue::Int(i));
    }
    if let Ok(f) = raw.parse::<f64>() {
        return Ok(StepValue::Real(f));
    }
    // Typed values like `IFCLABEL('x')` or bare identifiers (enumeration
    // constants, entity names with no `#`): keep the raw text.
    if let Some(open) = raw.find('(') {
        if raw.ends_with(')') {
            let inner = &raw[open + 1..raw.len() - 1];
            let mut inner_args = parse_arg_list(inner)?;
            if inner_args.len() == 1 {
                return Ok(inner_args.remove(0));
            }
            return Ok(StepValue::List(inner_args));
        }
    }
    Ok(StepValue::Str(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_simple_entity() {
        let text = "ISO-10303-21;\nHEADER;\nENDSEC;\nDATA;\n#1=IFCWALL('2O2Fr$t4X7Zf8NOew3FNr2',#2,'Wall',$,$,#5,#6,$);\nENDSEC;\nEND-ISO-10303-21;";
        let model = parse(text).unwrap();
        let wall = model.get(1).unwrap();
        assert_eq!(wall.type_name, "IFCWALL");
        assert_eq!(wall.arg(0).unwrap().as_str(), Some("2O2Fr$t4X7Zf8NOew3FNr2"));
        assert_eq!(wall.arg(1).unwrap().as_id(), Some(2));
        assert_eq!(wall.arg(3), Some(&StepValue::Null));
    }

    #[test]
    fn parses_nested_lists_and_keywords() {
        let text = "#10=IFCRELAGGREGATES('guid',$,$,$,#1,(#2,#3));";
        let model = parse(text).unwrap();
        let rel = model.get(10).unwrap();
        let related = rel.arg(5).unwrap().as_list().unwrap();
        assert_eq!(related.len(), 2);
        assert_eq!(related[0].as_id(), Some(2));
    }

    #[test]
    fn strips_block_comments() {
        let text = "/* a comment with ; inside */\n#1=IFCLABEL('x');";
        let model = parse(text).unwrap();
        assert!(model.get(1).is_some());
    }
}
