use std::{
    collections::BTreeMap,
    fmt::{self, Write},
};

use crate::{ast::AstStore, AstId};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Vertex<'a> {
    pub name: &'a str,
    pub id: u32,
}

/// Receiver of the parent/child edges of a parsed tree.
pub trait GraphSink {
    fn edge(&mut self, parent: Vertex<'_>, child: Vertex<'_>, child_text: &str);
}

/// Collects edges into a graphviz `digraph`.
#[derive(Default)]
pub struct DotGraph {
    /// Name and label of every vertex.
    vertices: BTreeMap<u32, (String, String)>,
    edges: Vec<(u32, u32)>,
}

impl DotGraph {
    pub fn new() -> DotGraph {
        DotGraph::default()
    }

    fn key(&self, id: u32) -> String {
        let name = self.vertices.get(&id).map_or("", |(name, _)| name.as_str());
        format!("\"{name}({id})\"")
    }

    pub fn write_into(&self, buf: &mut dyn Write) -> fmt::Result {
        writeln!(buf, "digraph {{")?;
        for (&id, (_, label)) in &self.vertices {
            writeln!(buf, "    {} [label=\"{label}\"]", self.key(id))?;
        }
        for &(parent, child) in &self.edges {
            writeln!(buf, "    {} -> {}", self.key(parent), self.key(child))?;
        }
        writeln!(buf, "}}")
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

impl GraphSink for DotGraph {
    fn edge(&mut self, parent: Vertex<'_>, child: Vertex<'_>, child_text: &str) {
        self.vertices
            .entry(parent.id)
            .or_insert_with(|| (escape(parent.name), escape(parent.name)));
        self.vertices.entry(child.id).or_insert_with(|| {
            let name = escape(child.name);
            let mut label = name.clone();
            if !child_text.is_empty() {
                label.push_str("\\n");
                label.push_str(&escape(child_text));
            }
            (name, label)
        });
        self.edges.push((parent.id, child.id));
    }
}

impl fmt::Display for DotGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_into(f)
    }
}

impl<V> AstStore<'_, V> {
    /// Reports every edge of the flattened tree, parents before their children.
    pub fn export_graph(&self, sink: &mut dyn GraphSink) {
        if let Some(root) = self.root() {
            self.export_node(root, sink);
        }
    }

    fn export_node(&self, id: AstId, sink: &mut dyn GraphSink) {
        let node = self.node(id);
        let parent = Vertex {
            name: node.name(),
            id: node.debug_id(),
        };
        for child in node.children() {
            let vertex = Vertex {
                name: child.name(),
                id: child.debug_id(),
            };
            sink.edge(parent, vertex, child.text());
            self.export_node(child.id(), sink);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DotGraph, GraphSink, Vertex};

    #[test]
    fn dot_output() {
        let mut graph = DotGraph::new();
        let root = Vertex {
            name: "expression",
            id: 0,
        };
        let int = Vertex {
            name: "int_number",
            id: 2,
        };
        let func = Vertex { name: "func", id: 3 };
        graph.edge(root, int, "1");
        graph.edge(root, func, "\"");

        insta::assert_snapshot!(graph.to_string(), @r#"
        digraph {
            "expression(0)" [label="expression"]
            "int_number(2)" [label="int_number\n1"]
            "func(3)" [label="func\n\""]
            "expression(0)" -> "int_number(2)"
            "expression(0)" -> "func(3)"
        }
        "#);
    }
}
