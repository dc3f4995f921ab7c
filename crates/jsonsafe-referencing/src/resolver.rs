use std::borrow::Cow;

use ahash::AHashMap;
use percent_encoding::percent_decode_str;
use serde_json::Value;

use crate::{
    path::{join_path, split_fragment},
    pointer::{escape_segment, pointer},
    dialect::{SKIP_CHILDREN, WITH_NAMED_CHILDREN},
    Draft, Error,
};

/// A subschema found by [`resolve`].
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<'a> {
    /// The referenced subschema.
    pub target: &'a Value,
    /// The document that owns `target`.
    pub root: &'a Value,
    /// Canonical absolute path of `target`, used as the base for references inside it.
    pub path: String,
    /// Dialect of the owning document.
    pub draft: Draft,
}

/// Find every subschema `reference` may point to when seen from `base`.
///
/// Matches are collected from `$id`-anchored resources, `$anchor` names, plain JSON Pointer
/// fragments and the additional `documents`. All of them are returned in discovery order, callers
/// normally take the first one.
///
/// # Errors
///
/// Fails on malformed anchors or when an additional document declares an unknown dialect.
pub fn resolve<'a>(
    root: &'a Value,
    documents: &'a AHashMap<String, Value>,
    reference: &str,
    base: &str,
    draft: Draft,
) -> Result<Vec<Resolved<'a>>, Error> {
    let full = join_path(base, reference);
    let (main, fragment) = split_fragment(&full);
    let local = decode_fragment(fragment);

    let mut search = Search {
        root,
        draft,
        full: &full,
        main,
        local: &local,
        results: Vec::new(),
    };
    search.visit(root, "", false)?;
    let mut results = search.results;

    if main.is_empty() {
        if local.is_empty() {
            results.push(Resolved {
                target: root,
                root,
                path: full.clone(),
                draft,
            });
        } else if local.starts_with('/') {
            if let Some(target) = pointer(root, &local) {
                results.push(Resolved {
                    target,
                    root,
                    path: join_path(main, &format!("#{local}")),
                    draft,
                });
            }
        }
    }

    if !main.is_empty() {
        if let Some(document) = documents.get(main) {
            let document_draft = Draft::detect(document)?.unwrap_or(draft);
            let found = resolve(
                document,
                documents,
                &format!("#{fragment}"),
                "",
                document_draft,
            )?;
            results.extend(found.into_iter().map(|resolved| Resolved {
                path: join_path(main, &resolved.path),
                ..resolved
            }));
        }
    }

    if let Some(document) = documents.get(full.as_str()) {
        results.push(Resolved {
            target: document,
            root: document,
            path: full.clone(),
            draft: Draft::detect(document)?.unwrap_or(draft),
        });
    }

    Ok(results)
}

/// JSON Pointer of `target` inside `document`, compared by identity.
#[must_use]
pub fn pointer_to(document: &Value, target: &Value) -> Option<String> {
    fn walk(current: &Value, target: &Value, path: &mut Vec<String>) -> bool {
        if std::ptr::eq(current, target) {
            return true;
        }
        match current {
            Value::Object(map) => {
                for (key, value) in map {
                    path.push(escape_segment(key).into_owned());
                    if walk(value, target, path) {
                        return true;
                    }
                    path.pop();
                }
                false
            }
            Value::Array(items) => {
                for (idx, value) in items.iter().enumerate() {
                    path.push(idx.to_string());
                    if walk(value, target, path) {
                        return true;
                    }
                    path.pop();
                }
                false
            }
            _ => false,
        }
    }
    let mut path = Vec::new();
    if walk(document, target, &mut path) {
        Some(path.iter().fold(String::new(), |mut acc, segment| {
            acc.push('/');
            acc.push_str(segment);
            acc
        }))
    } else {
        None
    }
}

fn decode_fragment(fragment: &str) -> Cow<'_, str> {
    percent_decode_str(fragment)
        .decode_utf8()
        .unwrap_or(Cow::Borrowed(fragment))
}

struct Search<'a, 'r> {
    root: &'a Value,
    draft: Draft,
    full: &'r str,
    main: &'r str,
    local: &'r str,
    results: Vec<Resolved<'a>>,
}

impl<'a> Search<'a, '_> {
    fn push(&mut self, target: &'a Value, path: String) {
        self.results.push(Resolved {
            target,
            root: self.root,
            path,
            draft: self.draft,
        });
    }

    fn visit(
        &mut self,
        node: &'a Value,
        parent_path: &str,
        named_children: bool,
    ) -> Result<(), Error> {
        match node {
            Value::Array(items) => {
                for item in items {
                    self.visit(item, parent_path, false)?;
                }
                Ok(())
            }
            Value::Object(map) if named_children => {
                for value in map.values() {
                    self.visit(value, parent_path, false)?;
                }
                Ok(())
            }
            Value::Object(map) => {
                let mut path = Cow::Borrowed(parent_path);
                if let Some(id) = self.draft.id_of(node) {
                    path = Cow::Owned(join_path(parent_path, id));
                    if path == self.full || (path == self.main && self.local.is_empty()) {
                        self.push(node, self.full.to_string());
                    } else if path == self.main && self.local.starts_with('/') {
                        if let Some(target) = pointer(node, self.local) {
                            let canonical = join_path(&path, &format!("#{}", self.local));
                            self.push(target, canonical);
                        }
                    }
                }
                for keyword in self.anchor_keywords() {
                    if let Some(anchor) = map.get(*keyword).and_then(Value::as_str) {
                        if anchor.contains('#') {
                            return Err(Error::invalid_anchor(
                                anchor,
                                "anchors can not contain '#'",
                            ));
                        }
                        if anchor.starts_with('/') {
                            return Err(Error::invalid_anchor(
                                anchor,
                                "anchors can not start with '/'",
                            ));
                        }
                        if join_path(&path, &format!("#{anchor}")) == self.full {
                            self.push(node, self.full.to_string());
                        }
                    }
                }
                for (key, value) in map {
                    if !self.draft.is_known_keyword(key) || SKIP_CHILDREN.contains(&key.as_str()) {
                        continue;
                    }
                    self.visit(value, &path, WITH_NAMED_CHILDREN.contains(&key.as_str()))?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn anchor_keywords(&self) -> &'static [&'static str] {
        match self.draft {
            Draft::Draft4 | Draft::Draft6 | Draft::Draft7 => &[],
            Draft::Draft201909 => &["$anchor"],
            Draft::Draft202012 => &["$anchor", "$dynamicAnchor"],
        }
    }
}

#[cfg(test)]
mod tests {
    use ahash::AHashMap;
    use serde_json::{json, Value};
    use test_case::test_case;

    use super::{pointer_to, resolve};
    use crate::{Draft, Error};

    fn first<'a>(
        root: &'a Value,
        documents: &'a AHashMap<String, Value>,
        reference: &str,
    ) -> Option<(&'a Value, String)> {
        resolve(root, documents, reference, "", Draft::Draft202012)
            .expect("Resolution should not fail")
            .into_iter()
            .next()
            .map(|resolved| (resolved.target, resolved.path))
    }

    #[test]
    fn test_root_reference() {
        let root = json!({"items": {"$ref": "#"}});
        let documents = AHashMap::new();
        let (target, path) = first(&root, &documents, "#").expect("Should resolve");
        assert!(std::ptr::eq(target, &root));
        assert_eq!(path, "#");
    }

    #[test_case("#/$defs/a", &json!({"type": "integer"}); "defs")]
    #[test_case("#/$defs/a~1b", &json!({"type": "null"}); "escaped slash")]
    #[test_case("#/$defs/%25x", &json!({"type": "boolean"}); "percent encoded")]
    #[test_case("#/$defs/list/1", &json!({"minimum": 1}); "array index")]
    fn test_pointer_fragment(reference: &str, expected: &Value) {
        let root = json!({
            "$defs": {
                "a": {"type": "integer"},
                "a/b": {"type": "null"},
                "%x": {"type": "boolean"},
                "list": [{}, {"minimum": 1}]
            }
        });
        let documents = AHashMap::new();
        let (target, _) = first(&root, &documents, reference).expect("Should resolve");
        assert_eq!(target, expected);
    }

    #[test]
    fn test_id_resolution() {
        let root = json!({
            "$id": "http://example.com/root.json",
            "$defs": {
                "item": {
                    "$id": "item.json",
                    "type": "string",
                    "$defs": {"inner": {"minLength": 2}}
                }
            }
        });
        let documents = AHashMap::new();
        let found = resolve(
            &root,
            &documents,
            "item.json",
            "http://example.com/root.json",
            Draft::Draft202012,
        )
        .expect("Resolution should not fail");
        assert_eq!(found[0].target["type"], "string");
        assert_eq!(found[0].path, "http://example.com/item.json");

        let found = resolve(
            &root,
            &documents,
            "item.json#/$defs/inner",
            "http://example.com/root.json",
            Draft::Draft202012,
        )
        .expect("Resolution should not fail");
        assert_eq!(found[0].target, &json!({"minLength": 2}));
        assert_eq!(found[0].path, "http://example.com/item.json#/$defs/inner");
    }

    #[test]
    fn test_draft4_id() {
        let root = json!({"definitions": {"a": {"id": "#foo", "type": "null"}}});
        let documents = AHashMap::new();
        let found = resolve(&root, &documents, "#foo", "", Draft::Draft4)
            .expect("Resolution should not fail");
        assert_eq!(found[0].target["type"], "null");
    }

    #[test]
    fn test_anchor() {
        let root = json!({"$defs": {"a": {"$anchor": "name", "type": "string"}}});
        let documents = AHashMap::new();
        let (target, path) = first(&root, &documents, "#name").expect("Should resolve");
        assert_eq!(target["type"], "string");
        assert_eq!(path, "#name");
    }

    #[test]
    fn test_invalid_anchor() {
        let root = json!({"$defs": {"a": {"$anchor": "/bad"}}});
        let documents = AHashMap::new();
        assert!(matches!(
            resolve(&root, &documents, "#x", "", Draft::Draft202012),
            Err(Error::InvalidAnchor { .. })
        ));
    }

    #[test]
    fn test_additional_document() {
        let root = json!({"$ref": "ext#"});
        let mut documents = AHashMap::new();
        documents.insert("ext".to_string(), json!({"type": "string"}));
        let found = resolve(&root, &documents, "ext#", "", Draft::Draft202012)
            .expect("Resolution should not fail");
        assert_eq!(found[0].target, &json!({"type": "string"}));
        assert!(std::ptr::eq(found[0].root, &documents["ext"]));
        assert_eq!(found[0].path, "ext#");
    }

    #[test]
    fn test_additional_document_fragment() {
        let root = json!({});
        let mut documents = AHashMap::new();
        documents.insert(
            "https://example.com/defs.json".to_string(),
            json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "definitions": {"pos": {"minimum": 0}}
            }),
        );
        let found = resolve(
            &root,
            &documents,
            "https://example.com/defs.json#/definitions/pos",
            "",
            Draft::Draft202012,
        )
        .expect("Resolution should not fail");
        assert_eq!(found[0].target, &json!({"minimum": 0}));
        assert_eq!(found[0].draft, Draft::Draft7);
        assert_eq!(found[0].path, "https://example.com/defs.json#/definitions/pos");
    }

    #[test]
    fn test_whole_document_match() {
        let root = json!({});
        let mut documents = AHashMap::new();
        documents.insert("ext".to_string(), json!({"type": "string"}));
        let found = resolve(&root, &documents, "ext", "", Draft::Draft202012)
            .expect("Resolution should not fail");
        assert!(found.iter().all(|resolved| resolved.target == &json!({"type": "string"})));
        assert!(!found.is_empty());
    }

    #[test]
    fn test_unresolvable() {
        let root = json!({"$defs": {}});
        let documents = AHashMap::new();
        assert!(first(&root, &documents, "#/$defs/missing").is_none());
        assert!(first(&root, &documents, "missing.json").is_none());
    }

    #[test]
    fn test_data_keywords_are_not_traversed() {
        let root = json!({"const": {"$id": "fake.json"}, "enum": [{"$anchor": "x"}]});
        let documents = AHashMap::new();
        assert!(first(&root, &documents, "fake.json").is_none());
        assert!(first(&root, &documents, "#x").is_none());
    }

    #[test]
    fn test_shadowed_ids_are_all_reported() {
        let root = json!({
            "$defs": {
                "a": {"$id": "dup.json", "type": "string"},
                "b": {"$id": "dup.json", "type": "number"}
            }
        });
        let documents = AHashMap::new();
        let found = resolve(&root, &documents, "dup.json", "", Draft::Draft202012)
            .expect("Resolution should not fail");
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_pointer_to() {
        let root = json!({"$defs": {"a/b": {"items": [{}, {"type": "null"}]}}});
        let target = &root["$defs"]["a/b"]["items"][1];
        assert_eq!(pointer_to(&root, target).as_deref(), Some("/$defs/a~1b/items/1"));
        assert_eq!(pointer_to(&root, &root).as_deref(), Some(""));
        assert_eq!(pointer_to(&root, &json!(1)), None);
    }
}
