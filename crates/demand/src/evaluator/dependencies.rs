use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use crate::{config::Config, request::DynRequest};

/// Which requests asked for which, in the order the edges were first seen.
pub(super) struct DependencyGraph<C: Config> {
    nodes: HashMap<Box<dyn DynRequest>, usize, C::BuildHasher>,
    labels: Vec<String>,
    edges: Vec<(usize, usize)>,
    seen: HashSet<(usize, usize), C::BuildHasher>,
}

impl<C: Config> Default for DependencyGraph<C> {
    fn default() -> Self {
        Self {
            nodes: HashMap::default(),
            labels: Vec::new(),
            edges: Vec::new(),
            seen: HashSet::default(),
        }
    }
}

impl<C: Config> DependencyGraph<C> {
    fn intern(&mut self, request: &(dyn DynRequest + 'static)) -> usize {
        if let Some(node) = self.nodes.get(request) {
            return *node;
        }

        let node = self.labels.len();

        self.labels.push(format!("{request:?}"));
        self.nodes.insert(request.clone_boxed(), node);

        node
    }

    /// Records that `to` was requested, by `from` if it isn't a root.
    pub(super) fn record(
        &mut self,
        from: Option<&(dyn DynRequest + 'static)>,
        to: &(dyn DynRequest + 'static),
    ) {
        let to = self.intern(to);

        let Some(from) = from else {
            return;
        };

        let from = self.intern(from);

        if self.seen.insert((from, to)) {
            self.edges.push((from, to));
        }
    }

    pub(super) fn edges(&self) -> Vec<(String, String)> {
        self.edges
            .iter()
            .map(|(from, to)| {
                (self.labels[*from].clone(), self.labels[*to].clone())
            })
            .collect()
    }

    pub(super) fn write_graphviz(
        &self,
        out: &mut impl fmt::Write,
    ) -> fmt::Result {
        writeln!(out, "digraph Dependencies {{")?;

        for (node, label) in self.labels.iter().enumerate() {
            writeln!(out, "    n{node} [label=\"{}\"];", escape_label(label))?;
        }

        for (from, to) in &self.edges {
            writeln!(out, "    n{from} -> n{to};")?;
        }

        writeln!(out, "}}")
    }
}

fn escape_label(label: &str) -> String {
    let mut escaped = String::with_capacity(label.len());

    for c in label.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }

    escaped
}

#[cfg(test)]
mod test {
    use super::escape_label;

    #[test]
    fn labels_are_escaped() {
        assert_eq!(escape_label("Walk(4)"), "Walk(4)");
        assert_eq!(escape_label(r#"Lookup("A")"#), r#"Lookup(\"A\")"#);
        assert_eq!(escape_label("a\\b\nc"), "a\\\\b\\nc");
    }
}
