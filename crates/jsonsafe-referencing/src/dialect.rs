use serde_json::Value;

use crate::Error;

/// JSON Schema dialects understood by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[non_exhaustive]
pub enum Draft {
    Draft4,
    Draft6,
    Draft7,
    Draft201909,
    #[default]
    Draft202012,
}

const DRAFT4_ONLY: &[&str] = &["id"];

const SINCE_DRAFT4: &[&str] = &[
    "$ref",
    "$schema",
    "additionalItems",
    "additionalProperties",
    "allOf",
    "anyOf",
    "default",
    "definitions",
    "dependencies",
    "description",
    "enum",
    "exclusiveMaximum",
    "exclusiveMinimum",
    "format",
    "items",
    "maxItems",
    "maxLength",
    "maxProperties",
    "maximum",
    "minItems",
    "minLength",
    "minProperties",
    "minimum",
    "multipleOf",
    "not",
    "oneOf",
    "pattern",
    "patternProperties",
    "properties",
    "required",
    "title",
    "type",
    "uniqueItems",
];

const SINCE_DRAFT6: &[&str] = &["$id", "const", "contains", "examples", "propertyNames"];

const SINCE_DRAFT7: &[&str] = &[
    "$comment",
    "contentEncoding",
    "contentMediaType",
    "else",
    "if",
    "readOnly",
    "then",
    "writeOnly",
];

const SINCE_DRAFT201909: &[&str] = &[
    "$anchor",
    "$defs",
    "$vocabulary",
    "contentSchema",
    "dependentRequired",
    "dependentSchemas",
    "deprecated",
    "maxContains",
    "minContains",
    "unevaluatedItems",
    "unevaluatedProperties",
];

const DRAFT201909_ONLY: &[&str] = &["$recursiveAnchor", "$recursiveRef"];

const SINCE_DRAFT202012: &[&str] = &["$dynamicAnchor", "$dynamicRef", "prefixItems"];

const REMOVED_IN_DRAFT201909: &[&str] = &["dependencies"];

const REMOVED_IN_DRAFT202012: &[&str] = &["additionalItems"];

impl Draft {
    /// Detect the dialect declared by `$schema`, if any.
    ///
    /// # Errors
    ///
    /// Fails when `$schema` is not a string or names an unknown dialect.
    pub fn detect(contents: &Value) -> Result<Option<Draft>, Error> {
        let Some(schema) = contents.as_object().and_then(|obj| obj.get("$schema")) else {
            return Ok(None);
        };
        let Some(uri) = schema.as_str() else {
            return Err(Error::InvalidSpecification);
        };
        let normalized = uri.trim_end_matches('#');
        let normalized = normalized
            .strip_prefix("https://")
            .or_else(|| normalized.strip_prefix("http://"))
            .unwrap_or(normalized);
        match normalized {
            "json-schema.org/draft-04/schema" => Ok(Some(Draft::Draft4)),
            "json-schema.org/draft-06/schema" => Ok(Some(Draft::Draft6)),
            "json-schema.org/draft-07/schema" => Ok(Some(Draft::Draft7)),
            "json-schema.org/draft/2019-09/schema" => Ok(Some(Draft::Draft201909)),
            "json-schema.org/draft/2020-12/schema" => Ok(Some(Draft::Draft202012)),
            _ => Err(Error::UnknownSpecification {
                uri: uri.to_string(),
            }),
        }
    }

    /// The keyword carrying a resource identifier in this dialect.
    #[must_use]
    pub fn id_keyword(self) -> &'static str {
        match self {
            Draft::Draft4 => "id",
            _ => "$id",
        }
    }

    /// The resource identifier declared by `contents`, if any.
    #[must_use]
    pub fn id_of(self, contents: &Value) -> Option<&str> {
        contents.get(self.id_keyword()).and_then(Value::as_str)
    }

    /// Whether `$ref` overrides every sibling keyword.
    #[must_use]
    pub fn exclusive_ref(self) -> bool {
        self <= Draft::Draft7
    }

    /// Whether `keyword` belongs to the vocabulary of this dialect.
    #[must_use]
    pub fn is_known_keyword(self, keyword: &str) -> bool {
        let in_list = |list: &[&'static str]| list.contains(&keyword);
        match self {
            Draft::Draft4 => in_list(SINCE_DRAFT4) || in_list(DRAFT4_ONLY),
            Draft::Draft6 => in_list(SINCE_DRAFT4) || in_list(SINCE_DRAFT6),
            Draft::Draft7 => {
                in_list(SINCE_DRAFT4) || in_list(SINCE_DRAFT6) || in_list(SINCE_DRAFT7)
            }
            Draft::Draft201909 => {
                (in_list(SINCE_DRAFT4) && !in_list(REMOVED_IN_DRAFT201909))
                    || in_list(SINCE_DRAFT6)
                    || in_list(SINCE_DRAFT7)
                    || in_list(SINCE_DRAFT201909)
                    || in_list(DRAFT201909_ONLY)
            }
            Draft::Draft202012 => {
                (in_list(SINCE_DRAFT4)
                    && !in_list(REMOVED_IN_DRAFT201909)
                    && !in_list(REMOVED_IN_DRAFT202012))
                    || in_list(SINCE_DRAFT6)
                    || in_list(SINCE_DRAFT7)
                    || in_list(SINCE_DRAFT201909)
                    || in_list(SINCE_DRAFT202012)
            }
        }
    }
}

/// Keywords whose value is a map from arbitrary names to subschemas.
pub(crate) const WITH_NAMED_CHILDREN: &[&str] = &[
    "$defs",
    "definitions",
    "dependentSchemas",
    "patternProperties",
    "properties",
];

/// Keywords holding data rather than subschemas.
pub(crate) const SKIP_CHILDREN: &[&str] = &["const", "default", "enum", "examples"];

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::Draft;
    use crate::Error;

    #[test_case("http://json-schema.org/draft-04/schema#", Draft::Draft4)]
    #[test_case("http://json-schema.org/draft-06/schema#", Draft::Draft6)]
    #[test_case("http://json-schema.org/draft-07/schema", Draft::Draft7)]
    #[test_case("https://json-schema.org/draft/2019-09/schema", Draft::Draft201909)]
    #[test_case("https://json-schema.org/draft/2020-12/schema#", Draft::Draft202012)]
    fn test_detect(uri: &str, expected: Draft) {
        assert_eq!(Draft::detect(&json!({"$schema": uri})), Ok(Some(expected)));
    }

    #[test]
    fn test_detect_missing() {
        assert_eq!(Draft::detect(&json!({"type": "string"})), Ok(None));
        assert_eq!(Draft::detect(&json!(true)), Ok(None));
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(
            Draft::detect(&json!({"$schema": "http://example.com/custom"})),
            Err(Error::UnknownSpecification {
                uri: "http://example.com/custom".to_string()
            })
        );
        assert_eq!(
            Draft::detect(&json!({"$schema": 7})),
            Err(Error::InvalidSpecification)
        );
    }

    #[test_case(Draft::Draft4, "id", true)]
    #[test_case(Draft::Draft4, "$id", false)]
    #[test_case(Draft::Draft4, "const", false)]
    #[test_case(Draft::Draft7, "if", true)]
    #[test_case(Draft::Draft7, "unevaluatedProperties", false)]
    #[test_case(Draft::Draft201909, "$recursiveRef", true)]
    #[test_case(Draft::Draft202012, "$recursiveRef", false)]
    #[test_case(Draft::Draft202012, "prefixItems", true)]
    #[test_case(Draft::Draft202012, "additionalItems", false)]
    #[test_case(Draft::Draft201909, "dependencies", false)]
    #[test_case(Draft::Draft201909, "additionalItems", true)]
    #[test_case(Draft::Draft202012, "totallyMadeUp", false)]
    fn test_known_keywords(draft: Draft, keyword: &str, expected: bool) {
        assert_eq!(draft.is_known_keyword(keyword), expected);
    }

    #[test]
    fn test_id_of() {
        assert_eq!(Draft::Draft4.id_of(&json!({"id": "a"})), Some("a"));
        assert_eq!(Draft::Draft7.id_of(&json!({"id": "a"})), None);
        assert_eq!(Draft::Draft7.id_of(&json!({"$id": "b"})), Some("b"));
    }
}
