//! `${...}` expression evaluation.
//!
//! Two expression forms are recognized inside string values:
//! - `${name(arg, ...)}` calls a registered function. Quoted arguments are
//!   literals, other arguments may themselves contain expressions.
//! - `${path}` / `${path:default}` substitutes another configuration value.
//!
//! Function results are memoized per `(name, args)` for one evaluation pass,
//! so `${randomUuid()}` yields the same value everywhere in a resolved tree
//! and a fresh one on the next resolution.
//!
//! Function results are literal and never evaluated again. Values under
//! `env` and `sys` come from the process, not from configuration authors,
//! so they are literal too: they can be referenced but are not interpolated.

use super::ConfigProcessor;
use crate::error::{ConfigError, ConfigResult};
use crate::function::FunctionRegistry;
use crate::provider::{ENV_ROOT, SYS_ROOT};
use crate::tree::{MapNode, TreeNode, TreePath, join};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

const OPEN: &str = "${";

#[derive(Debug, Clone)]
pub struct EvaluationProcessor {
    functions: Arc<FunctionRegistry>,
}

impl EvaluationProcessor {
    pub fn new(functions: Arc<FunctionRegistry>) -> Self {
        Self { functions }
    }
}

impl ConfigProcessor for EvaluationProcessor {
    fn name(&self) -> &'static str {
        "evaluation"
    }

    fn process(&self, root: &mut MapNode) -> ConfigResult<()> {
        let snapshot = TreeNode::Map(root.clone());
        let pending = snapshot
            .walk()
            .any(|(_, node)| node.as_str().is_some_and(|v| v.contains(OPEN)));
        if !pending {
            return Ok(());
        }

        let mut resolver = Resolver::new(&self.functions, &snapshot);
        for (key, child) in root.iter_mut() {
            if is_literal_root(key) {
                continue;
            }
            rewrite(child, &join("", key), &mut resolver)?;
        }
        Ok(())
    }
}

fn is_literal_root(key: &str) -> bool {
    key == ENV_ROOT || key == SYS_ROOT
}

fn rewrite(node: &mut TreeNode, path: &str, resolver: &mut Resolver<'_>) -> ConfigResult<()> {
    match node {
        TreeNode::Value(value) => {
            if value.value().contains(OPEN) {
                if let Some(resolved) = resolver.reference(path)? {
                    value.set_value(resolved);
                }
            }
        }
        TreeNode::Map(map) => {
            for (key, child) in map.iter_mut() {
                rewrite(child, &join(path, key), resolver)?;
            }
        }
        TreeNode::Array(array) => {
            for (index, child) in array.iter_mut().enumerate() {
                rewrite(child, &join(path, &index.to_string()), resolver)?;
            }
        }
    }
    Ok(())
}

/// State of one evaluation pass.
struct Resolver<'a> {
    functions: &'a FunctionRegistry,
    tree: &'a TreeNode,
    calls: HashMap<(String, Vec<String>), String>,
    references: HashMap<String, String>,
    stack: Vec<String>,
}

impl<'a> Resolver<'a> {
    fn new(functions: &'a FunctionRegistry, tree: &'a TreeNode) -> Self {
        Self {
            functions,
            tree,
            calls: HashMap::new(),
            references: HashMap::new(),
            stack: Vec::new(),
        }
    }

    /// Fully evaluated value at `path`, `None` if absent.
    fn reference(&mut self, path: &str) -> ConfigResult<Option<String>> {
        if let Some(resolved) = self.references.get(path) {
            return Ok(Some(resolved.clone()));
        }
        if self.stack.iter().any(|p| p == path) {
            let mut chain = self.stack.clone();
            chain.push(path.to_string());
            return Err(ConfigError::evaluation(
                format!("${{{}}}", path),
                format!("circular reference: {}", chain.join(" -> ")),
            ));
        }

        let raw = match self.tree.get(path)? {
            None => return Ok(None),
            Some(TreeNode::Value(value)) => value.value().to_string(),
            Some(other) => {
                return Err(ConfigError::evaluation(
                    format!("${{{}}}", path),
                    format!("references a {} node, expected a value", other.kind()),
                ));
            }
        };

        let literal = TreePath::parse(path)?
            .segments()
            .first()
            .is_some_and(|root| is_literal_root(root));
        if literal {
            self.references.insert(path.to_string(), raw.clone());
            return Ok(Some(raw));
        }

        self.stack.push(path.to_string());
        let resolved = self.interpolate(&raw);
        self.stack.pop();
        let resolved = resolved?;
        self.references.insert(path.to_string(), resolved.clone());
        Ok(Some(resolved))
    }

    /// Replace every top-level expression in `text`.
    fn interpolate(&mut self, text: &str) -> ConfigResult<String> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find(OPEN) {
            out.push_str(&rest[..start]);
            let body = start + OPEN.len();
            let end = find_closing(rest.as_bytes(), body)
                .ok_or_else(|| ConfigError::evaluation(text, "unterminated expression"))?;
            out.push_str(&self.evaluate(&rest[body..end])?);
            rest = &rest[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn evaluate(&mut self, expression: &str) -> ConfigResult<String> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Err(ConfigError::evaluation("${}", "empty expression"));
        }

        if let Some((name, raw_args)) = parse_call(expression) {
            let args = split_top_level(raw_args, b',', true)
                .into_iter()
                .map(|arg| self.argument(arg))
                .collect::<ConfigResult<Vec<_>>>()?;
            return self.call(name, args);
        }

        let parts = split_top_level(expression, b':', false);
        let path = parts[0].trim();
        let default = (parts.len() > 1).then(|| &expression[parts[0].len() + 1..]);
        match (self.reference(path)?, default) {
            (Some(value), _) => Ok(value),
            (None, Some(default)) => self.interpolate(default),
            (None, None) => Err(ConfigError::evaluation(
                format!("${{{}}}", expression),
                "unresolved reference",
            )),
        }
    }

    fn argument(&mut self, raw: &str) -> ConfigResult<String> {
        let raw = raw.trim();
        let bytes = raw.as_bytes();
        if bytes.len() >= 2
            && matches!(bytes[0], b'\'' | b'"')
            && bytes[bytes.len() - 1] == bytes[0]
        {
            return Ok(raw[1..raw.len() - 1].to_string());
        }
        self.interpolate(raw)
    }

    fn call(&mut self, name: &str, args: Vec<String>) -> ConfigResult<String> {
        let key = (name.to_string(), args);
        if let Some(result) = self.calls.get(&key) {
            return Ok(result.clone());
        }
        let result = self.functions.call(name, &key.1).inspect_err(|e| {
            warn!(function = %name, error = %e, "Configuration function failed");
        })?;
        self.calls.insert(key, result.clone());
        Ok(result)
    }
}

/// `name(args)` with an identifier name.
fn parse_call(expression: &str) -> Option<(&str, &str)> {
    let open = expression.find('(')?;
    let name = expression[..open].trim();
    let args = expression[open + 1..].strip_suffix(')')?;
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some((name, args))
}

/// Index of the `}` closing an expression whose body starts at `from`.
fn find_closing(bytes: &[u8], from: usize) -> Option<usize> {
    let mut depth = 1usize;
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{') {
            depth += 1;
            i += 2;
            continue;
        }
        if bytes[i] == b'}' {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

/// Split on `sep` outside nested expressions and parentheses (and quotes
/// when `quotes` is set). Blank input yields no parts.
fn split_top_level(s: &str, sep: u8, quotes: bool) -> Vec<&str> {
    if s.trim().is_empty() {
        return Vec::new();
    }
    let bytes = s.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == q {
                quote = None;
            }
        } else if quotes && matches!(b, b'\'' | b'"') {
            quote = Some(b);
        } else if b == b'$' && bytes.get(i + 1) == Some(&b'{') {
            depth += 1;
            i += 1;
        } else if b == b'(' {
            depth += 1;
        } else if matches!(b, b'}' | b')') {
            depth = depth.saturating_sub(1);
        } else if b == sep && depth == 0 {
            parts.push(&s[start..i]);
            start = i + 1;
        }
        i += 1;
    }
    parts.push(&s[start..]);
    parts
}
