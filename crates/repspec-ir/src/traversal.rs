//! Traversal and cursor APIs for navigating the document tree

use crate::node::Node;
use crate::Error;
use crate::Result;

/// A cursor for navigating the tree
pub struct Cursor<'a> {
    /// Current node
    node: &'a Node,

    /// Path to current node (for error reporting)
    path: Vec<String>,
}

/// Trait for traversing the tree
pub trait Traversal {
    /// Visit a node
    fn visit(&mut self, node: &Node, path: &[String]);

    /// Called when entering a node with children
    fn enter(&mut self, _node: &Node, _path: &[String]) {}

    /// Called when leaving a node with children
    fn leave(&mut self, _node: &Node, _path: &[String]) {}

    /// Returns true if traversal should continue
    fn should_continue(&self) -> bool {
        true
    }
}

impl<'a> Cursor<'a> {
    /// Create a new cursor at the given node
    pub fn new(node: &'a Node) -> Self {
        Self {
            node,
            path: node.lineage.clone(),
        }
    }

    /// Get the current node
    pub fn node(&self) -> &'a Node {
        self.node
    }

    /// Get the current path
    pub fn path(&self) -> &[String] {
        &self.path
    }

    fn not_found(&self, segment: &str) -> Error {
        let mut path = self.path.clone();
        path.push(segment.to_string());
        Error::node_not_found(path.join("."))
    }

    /// Navigate to a child node by name
    pub fn child(&self, name: &str) -> Result<Cursor<'a>> {
        let child = self.node.find_child(name).ok_or_else(|| self.not_found(name))?;
        let mut path = self.path.clone();
        path.push(name.to_string());
        Ok(Cursor { node: child, path })
    }

    /// Cursors for every child, in order
    pub fn children(&self) -> Vec<Cursor<'a>> {
        self.node
            .children
            .iter()
            .map(|child| {
                let mut path = self.path.clone();
                path.push(child.name.clone());
                Cursor { node: child, path }
            })
            .collect()
    }

    /// Navigate using a dotted path (e.g., "performance.performance_map.grid_variables").
    ///
    /// A segment may carry a child index (`children[2]`) selecting among
    /// same-named siblings.
    pub fn navigate(&self, path: &str) -> Result<Cursor<'a>> {
        let mut cursor = Cursor {
            node: self.node,
            path: self.path.clone(),
        };

        for segment in path.split('.') {
            if segment.is_empty() {
                continue;
            }

            if let Some(open_bracket) = segment.find('[') {
                let name = &segment[..open_bracket];
                let close_bracket = segment
                    .find(']')
                    .ok_or_else(|| Error::invalid_path(path, format!("unclosed bracket in '{segment}'")))?;
                let index: usize = segment[open_bracket + 1..close_bracket]
                    .parse()
                    .map_err(|_| Error::invalid_path(path, format!("invalid index in '{segment}'")))?;

                let node = cursor
                    .node
                    .find_children(name)
                    .get(index)
                    .copied()
                    .ok_or_else(|| cursor.not_found(segment))?;
                cursor.path.push(name.to_string());
                cursor.node = node;
            } else {
                cursor = cursor.child(segment)?;
            }
        }

        Ok(cursor)
    }
}

/// Walk the tree depth first, visiting each node before its children
pub fn walk<T: Traversal>(node: &Node, visitor: &mut T) {
    walk_recursive(node, visitor, &mut vec![]);
}

fn walk_recursive<T: Traversal>(node: &Node, visitor: &mut T, path: &mut Vec<String>) {
    if !visitor.should_continue() {
        return;
    }

    visitor.visit(node, path);

    if !node.children.is_empty() {
        visitor.enter(node, path);
        path.push(node.name.clone());

        for child in &node.children {
            walk_recursive(child, visitor, path);
        }

        path.pop();
        visitor.leave(node, path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, NodeType, SheetKind};

    fn sample() -> Node {
        let mut root = Node::root("RS0003");
        let mut performance = root.spawn("performance", NodeType::Group);
        let mut map = performance.spawn("performance_map", NodeType::Group);
        map.open_sheet("performance_map", SheetKind::PerformanceMap);
        let mut grid = map.spawn("grid_variables", NodeType::Group);
        let speed = grid.spawn("speed_number", NodeType::Element);
        let pressure = grid.spawn("static_pressure_difference", NodeType::Element);
        grid.add_child(speed).add_child(pressure);
        map.add_child(grid);
        performance.add_child(map);
        root.add_child(performance);
        root
    }

    #[test]
    fn test_cursor_creation() {
        let root = sample();
        let cursor = Cursor::new(&root);
        assert_eq!(cursor.node().node_type, NodeType::Root);
        assert!(cursor.path().is_empty());
    }

    #[test]
    fn test_cursor_child() {
        let root = sample();
        let cursor = Cursor::new(&root).child("performance").unwrap();
        assert_eq!(cursor.node().name, "performance");
        assert_eq!(cursor.path(), &["performance"]);
    }

    #[test]
    fn test_cursor_child_not_found() {
        let root = sample();
        match Cursor::new(&root).child("performance").unwrap().child("bogus") {
            Err(Error::NodeNotFound { path }) => assert_eq!(path, "performance.bogus"),
            _ => panic!("Expected NodeNotFound error"),
        }
    }

    #[test]
    fn test_cursor_children_keep_order() {
        let root = sample();
        let grid = Cursor::new(&root)
            .navigate("performance.performance_map.grid_variables")
            .unwrap();
        let names: Vec<_> = grid.children().iter().map(|c| c.node().name.clone()).collect();
        assert_eq!(names, ["speed_number", "static_pressure_difference"]);
        assert_eq!(
            grid.children()[1].path().join("."),
            "performance.performance_map.grid_variables.static_pressure_difference"
        );
    }

    #[test]
    fn test_cursor_navigate() {
        let root = sample();
        let leaf = Cursor::new(&root)
            .navigate("performance.performance_map.grid_variables.speed_number")
            .unwrap();
        assert_eq!(leaf.node().sheet, "performance_map");
        assert_eq!(
            leaf.path(),
            &["performance", "performance_map", "grid_variables", "speed_number"]
        );
    }

    #[test]
    fn test_cursor_navigate_with_index() {
        let root = sample();
        let cursor = Cursor::new(&root).navigate("performance[0]").unwrap();
        assert_eq!(cursor.node().name, "performance");
        assert!(matches!(
            Cursor::new(&root).navigate("performance[1]"),
            Err(Error::NodeNotFound { .. })
        ));
    }

    #[test]
    fn test_cursor_navigate_error() {
        let root = sample();
        assert!(matches!(
            Cursor::new(&root).navigate("performance[x]"),
            Err(Error::InvalidPath { .. })
        ));
        assert!(matches!(
            Cursor::new(&root).navigate("performance[0"),
            Err(Error::InvalidPath { .. })
        ));
    }

    struct Collector {
        visited: Vec<String>,
        limit: usize,
    }

    impl Traversal for Collector {
        fn visit(&mut self, node: &Node, _path: &[String]) {
            self.visited.push(node.name.clone());
        }

        fn should_continue(&self) -> bool {
            self.visited.len() < self.limit
        }
    }

    #[test]
    fn test_walk_preorder() {
        let root = sample();
        let mut collector = Collector {
            visited: Vec::new(),
            limit: usize::MAX,
        };
        walk(&root, &mut collector);
        assert_eq!(
            collector.visited,
            vec![
                "",
                "performance",
                "performance_map",
                "grid_variables",
                "speed_number",
                "static_pressure_difference"
            ]
        );
    }

    #[test]
    fn test_walk_stops_early() {
        let root = sample();
        let mut collector = Collector {
            visited: Vec::new(),
            limit: 3,
        };
        walk(&root, &mut collector);
        assert_eq!(collector.visited.len(), 3);
    }
}
