//! Path-template route table.
//!
//! Templates use `{name}` segments for variables, e.g. `/v1/books/{id}`.
//! Inserting an existing `(method, template)` pair replaces its target.

use std::collections::HashMap;

use http::Method;

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Var(String),
}

#[derive(Debug, Clone)]
struct Entry<T> {
    method: Method,
    template: String,
    segments: Vec<Segment>,
    target: T,
}

impl<T> Entry<T> {
    fn matches(&self, path: &[&str]) -> Option<HashMap<String, String>> {
        if path.len() != self.segments.len() {
            return None;
        }
        let mut vars = HashMap::new();
        for (segment, actual) in self.segments.iter().zip(path) {
            match segment {
                Segment::Literal(lit) if lit == actual => {}
                Segment::Literal(_) => return None,
                Segment::Var(name) => {
                    vars.insert(name.clone(), (*actual).to_string());
                }
            }
        }
        Some(vars)
    }
}

/// A successful lookup.
#[derive(Debug)]
pub(crate) struct Matched<'a, T> {
    pub(crate) template: &'a str,
    pub(crate) target: &'a T,
    pub(crate) vars: HashMap<String, String>,
}

/// Routes keyed by method and path template.
#[derive(Debug, Clone)]
pub(crate) struct RouteTable<T> {
    entries: Vec<Entry<T>>,
}

impl<T> Default for RouteTable<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> RouteTable<T> {
    /// Inserts a route, returning `true` when it replaced an earlier one.
    pub(crate) fn insert(&mut self, method: Method, template: &str, target: T) -> bool {
        let segments = parse(template);
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.method == method && same_shape(&e.segments, &segments))
        {
            entry.template = template.to_string();
            entry.segments = segments;
            entry.target = target;
            return true;
        }
        self.entries.push(Entry {
            method,
            template: template.to_string(),
            segments,
            target,
        });
        false
    }

    /// Finds the route for `method` and `path`. Literal-only templates are
    /// preferred over templates with variables.
    pub(crate) fn find(&self, method: &Method, path: &str) -> Option<Matched<'_, T>> {
        let parts: Vec<&str> = split(path).collect();
        let mut best: Option<(usize, Matched<'_, T>)> = None;
        for entry in self.entries.iter().filter(|e| e.method == *method) {
            let Some(vars) = entry.matches(&parts) else {
                continue;
            };
            let score = vars.len();
            if best.as_ref().map_or(true, |(s, _)| score < *s) {
                best = Some((
                    score,
                    Matched {
                        template: &entry.template,
                        target: &entry.target,
                        vars,
                    },
                ));
            }
        }
        best.map(|(_, m)| m)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Two templates collide when they differ only in variable names.
fn same_shape(a: &[Segment], b: &[Segment]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|pair| match pair {
            (Segment::Literal(x), Segment::Literal(y)) => x == y,
            (Segment::Var(_), Segment::Var(_)) => true,
            _ => false,
        })
}

fn parse(template: &str) -> Vec<Segment> {
    split(template)
        .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => Segment::Var(name.to_string()),
            None => Segment::Literal(s.to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variables_are_captured() {
        let mut table = RouteTable::default();
        table.insert(Method::GET, "/v1/shelves/{shelf}/books/{book}", 1);

        let m = table.find(&Method::GET, "/v1/shelves/3/books/9").unwrap();
        assert_eq!(*m.target, 1);
        assert_eq!(m.template, "/v1/shelves/{shelf}/books/{book}");
        assert_eq!(m.vars.get("shelf").map(String::as_str), Some("3"));
        assert_eq!(m.vars.get("book").map(String::as_str), Some("9"));

        assert!(table.find(&Method::POST, "/v1/shelves/3/books/9").is_none());
        assert!(table.find(&Method::GET, "/v1/shelves/3").is_none());
    }

    #[test]
    fn test_last_registration_wins() {
        let mut table = RouteTable::default();
        assert!(!table.insert(Method::POST, "/v1/books/{id}", "first"));
        assert!(table.insert(Method::POST, "/v1/books/{book_id}", "second"));
        assert_eq!(table.len(), 1);

        let m = table.find(&Method::POST, "/v1/books/1").unwrap();
        assert_eq!(*m.target, "second");
        assert_eq!(m.vars.get("book_id").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_literal_route_preferred() {
        let mut table = RouteTable::default();
        table.insert(Method::GET, "/v1/books/{id}", "by-id");
        table.insert(Method::GET, "/v1/books/latest", "latest");

        assert_eq!(*table.find(&Method::GET, "/v1/books/latest").unwrap().target, "latest");
        assert_eq!(*table.find(&Method::GET, "/v1/books/7").unwrap().target, "by-id");
    }
}
