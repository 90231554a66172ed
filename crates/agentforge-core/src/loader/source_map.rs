//! Line lookup for keys and list items of spec documents.
//!
//! serde gives us a typed value but forgets where each field came from. A
//! `SourceMap` is a cheap scan of the raw text that remembers the line of
//! every top-level key and of every item directly under a top-level list,
//! which is all the granularity validation messages need.

use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap {
    keys: HashMap<String, usize>,
    items: HashMap<String, Vec<usize>>,
}

impl SourceMap {
    /// Scan a block-style YAML mapping document.
    pub fn from_yaml(text: &str) -> Self {
        let mut map = SourceMap::default();
        let mut current: Option<String> = None;
        let mut item_indent: Option<usize> = None;

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("---") {
                continue;
            }
            let indent = line.len() - trimmed.len();
            let is_item = trimmed == "-" || trimmed.starts_with("- ");

            if is_item {
                if let Some(key) = &current {
                    match item_indent {
                        None => {
                            item_indent = Some(indent);
                            map.items.entry(key.clone()).or_default().push(line_no);
                        }
                        Some(expected) if expected == indent => {
                            map.items.entry(key.clone()).or_default().push(line_no);
                        }
                        Some(_) => {}
                    }
                }
                continue;
            }

            if indent == 0 {
                if let Some((key, rest)) = trimmed.split_once(':') {
                    let key = key.trim().trim_matches(|c| c == '"' || c == '\'').to_string();
                    map.keys.entry(key.clone()).or_insert(line_no);
                    // Block scalars (`|`, `>`) own their indented lines.
                    let rest = rest.trim_start();
                    let block_scalar = rest.starts_with('|') || rest.starts_with('>');
                    current = if block_scalar { None } else { Some(key) };
                    item_indent = None;
                }
            }
        }
        map
    }

    /// Scan a TOML document, treating each `[[table]]` header as an item of
    /// `table`.
    pub fn from_toml(text: &str) -> Self {
        let mut map = SourceMap::default();
        for (idx, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if let Some(table) = trimmed
                .strip_prefix("[[")
                .and_then(|rest| rest.strip_suffix("]]"))
            {
                let table = table.trim().to_string();
                map.keys.entry(table.clone()).or_insert(idx + 1);
                map.items.entry(table).or_default().push(idx + 1);
            } else if let Some((key, _)) = trimmed.split_once('=') {
                map.keys.entry(key.trim().to_string()).or_insert(idx + 1);
            }
        }
        map
    }

    pub fn key_line(&self, key: &str) -> Option<usize> {
        self.keys.get(key).copied()
    }

    pub fn item_line(&self, key: &str, index: usize) -> Option<usize> {
        self.items.get(key).and_then(|lines| lines.get(index)).copied()
    }
}
