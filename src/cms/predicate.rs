//! Query predicate builders
//!
//! Predicates are rendered in the API's bracket syntax, e.g.
//! `[at(document.type, "post")]`; a query wraps them in one more pair.

/// Exact match on a document field
pub fn at(path: &str, value: &str) -> String {
    format!("[at({}, \"{}\")]", path, escape(value))
}

/// Match documents of the given custom type
pub fn document_type(doc_type: &str) -> String {
    at("document.type", doc_type)
}

/// Match the document of a type with the given uid
pub fn uid(doc_type: &str, uid: &str) -> String {
    at(&format!("my.{}.uid", doc_type), uid)
}

/// Combine predicates into the `q` parameter value
pub fn query(predicates: &[String]) -> String {
    format!("[{}]", predicates.concat())
}

/// Render orderings into the `orderings` parameter value
pub fn orderings(fields: &[String]) -> String {
    format!("[{}]", fields.join(","))
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_syntax() {
        let q = query(&[document_type("post")]);
        assert_eq!(q, r#"[[at(document.type, "post")]]"#);

        let q = query(&[document_type("post"), uid("post", "hello")]);
        assert_eq!(
            q,
            r#"[[at(document.type, "post")][at(my.post.uid, "hello")]]"#
        );
    }

    #[test]
    fn test_quotes_are_escaped() {
        assert_eq!(at("my.post.uid", r#"a"b"#), r#"[at(my.post.uid, "a\"b")]"#);
    }

    #[test]
    fn test_orderings() {
        let o = orderings(&["document.first_publication_date desc".to_string()]);
        assert_eq!(o, "[document.first_publication_date desc]");
    }
}
