//! Lineage resolution over a loaded schema file set

use crate::loader::{normalize, SchemaLoader};
use crate::model::{SchemaFile, SchemaNode, Shape};
use crate::resolver::ResolutionContext;
use crate::{dotted, Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// Per-lineage-segment branch choices; `None` means "no choice here".
pub type Selectors = Vec<Option<usize>>;

/// One `allOf` entry of the form `if {k: const v} then {properties: ...}`.
#[derive(Debug, Clone)]
pub struct Conditional {
    /// Selector field tested by `if`
    pub key: String,
    /// Constant the field must equal
    pub value: Value,
    /// Properties whose schema is replaced when the condition holds
    pub overrides: Vec<(String, SchemaNode)>,
}

/// A loaded, cross-reference-resolved schema for one RS.
///
/// The index is immutable once loaded and may be shared read-only; every
/// resolution call owns its own [`ResolutionContext`].
#[derive(Debug)]
pub struct SchemaIndex {
    root: Arc<SchemaFile>,
    files: HashMap<PathBuf, Arc<SchemaFile>>,
}

impl SchemaIndex {
    pub(crate) fn new(root: Arc<SchemaFile>, files: HashMap<PathBuf, Arc<SchemaFile>>) -> Self {
        Self { root, files }
    }

    /// RS id of the root file.
    pub fn rs_id(&self) -> &str {
        &self.root.rs_id
    }

    /// Root node of the RS schema.
    pub fn root(&self) -> SchemaNode {
        SchemaNode::new(Arc::clone(&self.root), "", self.root.rs_id.clone())
    }

    pub fn title(&self) -> Option<&str> {
        self.root.title()
    }

    /// Directory holding the root schema file.
    pub fn schema_dir(&self) -> &Path {
        self.root.dir()
    }

    /// Every loaded file.
    pub fn files(&self) -> impl Iterator<Item = &Arc<SchemaFile>> {
        self.files.values()
    }

    /// Schema `version`, read from the root file or else the base file.
    pub fn version(&self) -> Option<&str> {
        if let Some(version) = self.root.root.get("version").and_then(Value::as_str) {
            return Some(version);
        }
        let mut files: Vec<_> = self.files.values().collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
            .into_iter()
            .find_map(|f| f.root.get("version").and_then(Value::as_str))
    }

    /// Display title declared by an RS's root schema.
    pub fn rs_title(&self, rs_id: &str) -> Result<String> {
        if let Some(file) = self
            .files
            .values()
            .find(|f| f.rs_id == rs_id && f.is_representation())
        {
            return file
                .title()
                .map(str::to_string)
                .ok_or_else(|| Error::NotFound(format!("{rs_id} declares no title")));
        }
        let path = SchemaLoader::new(self.schema_dir()).find_schema_file(rs_id)?;
        let root = SchemaLoader::load_from_file(&path)?;
        root.get("title")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::NotFound(format!("{rs_id} declares no title")))
    }

    /// Raw node at `pointer` inside the loaded file at `path`.
    ///
    /// The node belongs to the file's own representation, or to this index's
    /// RS when the file only carries shared definitions.
    pub fn node_at(&self, path: &Path, pointer: &str) -> Option<SchemaNode> {
        let file = self.files.get(path)?;
        file.root.pointer(pointer)?;
        let representation = if file.is_representation() {
            file.rs_id.clone()
        } else {
            self.root.rs_id.clone()
        };
        Some(SchemaNode::new(Arc::clone(file), pointer, representation))
    }

    /// Follow `$ref` chains until a concrete node is reached.
    pub fn deref(&self, node: &SchemaNode) -> Result<SchemaNode> {
        let mut ctx = ResolutionContext::new();
        self.deref_in(node, &mut ctx)
    }

    /// [`Self::deref`] within an existing resolution context.
    pub fn deref_in(&self, node: &SchemaNode, ctx: &mut ResolutionContext) -> Result<SchemaNode> {
        ctx.clear_chain();
        let mut current = node.clone();
        while let Some(reference) = current.reference().map(str::to_string) {
            ctx.visit(&current)?;
            ctx.push_scope(Arc::clone(current.file()));
            let target = self.follow(&reference, &current, ctx);
            ctx.pop_scope();
            current = target?;
        }
        ctx.clear_chain();
        Ok(current)
    }

    /// Resolve `reference` as written inside `from`'s file.
    pub fn resolve_reference(&self, from: &SchemaNode, reference: &str) -> Result<SchemaNode> {
        let mut ctx = ResolutionContext::new();
        ctx.push_scope(Arc::clone(from.file()));
        let target = self.follow(reference, from, &mut ctx)?;
        ctx.pop_scope();
        self.deref_in(&target, &mut ctx)
    }

    fn follow(
        &self,
        reference: &str,
        from: &SchemaNode,
        ctx: &ResolutionContext,
    ) -> Result<SchemaNode> {
        let scope = ctx
            .current_scope()
            .ok_or_else(|| Error::resolution(reference, "no file scope"))?;
        let (file_part, fragment) = match reference.split_once('#') {
            Some((file, fragment)) => (file, fragment),
            None => (reference, ""),
        };

        let file = if file_part.is_empty() {
            Arc::clone(scope)
        } else {
            let path = normalize(&scope.dir().join(file_part))?;
            self.files
                .get(&path)
                .cloned()
                .ok_or_else(|| {
                    Error::resolution(reference, format!("{} is not loaded", path.display()))
                })?
        };

        if file.root.pointer(fragment).is_none() {
            return Err(Error::resolution(
                reference,
                format!("no node at '{fragment}' in {}", file.file_name()),
            ));
        }

        let crosses = file.is_representation() && file.rs_id != from.representation();
        let mut target = SchemaNode::new(
            Arc::clone(&file),
            fragment,
            if crosses {
                file.rs_id.clone()
            } else {
                from.representation().to_string()
            },
        );
        target.rs = if crosses {
            Some(file.rs_id.clone())
        } else {
            from.rs.clone()
        };
        trace!("Followed {} from {} to {}", reference, from.location(), target.location());
        Ok(target)
    }

    /// Dereferenced property `name` of a record node.
    pub fn child(&self, record: &SchemaNode, name: &str) -> Result<Option<SchemaNode>> {
        let mut ctx = ResolutionContext::new();
        self.child_in(record, name, &mut ctx)
    }

    fn child_in(
        &self,
        record: &SchemaNode,
        name: &str,
        ctx: &mut ResolutionContext,
    ) -> Result<Option<SchemaNode>> {
        if !record.has_property(name) {
            return Ok(None);
        }
        let raw = record.descend(&["properties", name]);
        self.deref_in(&raw, ctx).map(Some)
    }

    /// Dereferenced item schema of an array node.
    pub fn items(&self, array: &SchemaNode) -> Result<Option<SchemaNode>> {
        if !array.raw().get("items").is_some_and(Value::is_object) {
            return Ok(None);
        }
        self.deref(&array.descend(&["items"])).map(Some)
    }

    /// Step through array item schemas; lineage walking treats arrays as transparent.
    fn through_items(&self, node: SchemaNode, ctx: &mut ResolutionContext) -> Result<SchemaNode> {
        let mut current = node;
        while current.shape() == Shape::Array
            && current.raw().get("items").is_some_and(Value::is_object)
        {
            current = self.deref_in(&current.descend(&["items"]), ctx)?;
        }
        Ok(current)
    }

    fn alternative_keyword(node: &SchemaNode) -> Option<&'static str> {
        let raw = node.raw();
        if raw.get("oneOf").is_some() {
            Some("oneOf")
        } else if raw.get("anyOf").is_some() {
            Some("anyOf")
        } else {
            None
        }
    }

    fn branch_count(node: &SchemaNode) -> usize {
        Self::alternative_keyword(node)
            .and_then(|kw| node.raw().get(kw))
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }

    /// Dereferenced branches of an alternative set, in declaration order.
    pub fn branches(&self, alternatives: &SchemaNode) -> Result<Vec<SchemaNode>> {
        let mut ctx = ResolutionContext::new();
        self.branches_in(alternatives, &mut ctx)
    }

    fn branches_in(
        &self,
        alternatives: &SchemaNode,
        ctx: &mut ResolutionContext,
    ) -> Result<Vec<SchemaNode>> {
        (0..Self::branch_count(alternatives))
            .map(|i| self.branch_in(alternatives, i, ctx))
            .collect()
    }

    /// Dereferenced branch `index` of an alternative set.
    pub fn branch(&self, alternatives: &SchemaNode, index: usize) -> Result<SchemaNode> {
        let mut ctx = ResolutionContext::new();
        self.branch_in(alternatives, index, &mut ctx)
    }

    fn branch_in(
        &self,
        alternatives: &SchemaNode,
        index: usize,
        ctx: &mut ResolutionContext,
    ) -> Result<SchemaNode> {
        let keyword = Self::alternative_keyword(alternatives).ok_or_else(|| {
            Error::malformed(alternatives.location(), "not an alternative set")
        })?;
        if index >= Self::branch_count(alternatives) {
            return Err(Error::malformed(
                alternatives.location(),
                format!("branch {index} out of range"),
            ));
        }
        let raw = alternatives.descend(&[keyword, &index.to_string()]);
        self.deref_in(&raw, ctx)
    }

    /// Key identifying one branch: the RS id it crosses into, else its title,
    /// else the last segment of its reference, else its index.
    pub fn branch_key(&self, alternatives: &SchemaNode, index: usize) -> Result<String> {
        let keyword = Self::alternative_keyword(alternatives).ok_or_else(|| {
            Error::malformed(alternatives.location(), "not an alternative set")
        })?;
        let raw = alternatives.descend(&[keyword, &index.to_string()]);
        let resolved = self.branch(alternatives, index)?;
        if let Some(rs) = resolved.rs() {
            if rs != alternatives.representation() {
                return Ok(rs.to_string());
            }
        }
        if let Some(title) = resolved.title() {
            return Ok(title.to_string());
        }
        if let Some(reference) = raw.reference() {
            if let Some(last) = reference.rsplit('/').next().filter(|s| !s.is_empty()) {
                return Ok(last.to_string());
            }
        }
        Ok(index.to_string())
    }

    /// Keys of every branch, in declaration order.
    pub fn branch_keys(&self, alternatives: &SchemaNode) -> Result<Vec<String>> {
        (0..Self::branch_count(alternatives))
            .map(|i| self.branch_key(alternatives, i))
            .collect()
    }

    /// Selector index of the branch whose key equals `key`.
    pub fn branch_index(&self, alternatives: &SchemaNode, key: &str) -> Result<Option<usize>> {
        Ok(self
            .branch_keys(alternatives)?
            .iter()
            .position(|k| k == key))
    }

    /// Selector entry for a document location governed by `node`.
    ///
    /// Uses the `metadata.schema` RS identifier carried by the content when it
    /// names a branch; otherwise picks the first branch whose declared
    /// structure admits every field present in the content.
    pub fn selector_for_content(&self, node: &SchemaNode, content: &Value) -> Result<Option<usize>> {
        if node.shape() != Shape::Alternatives {
            return Ok(None);
        }
        if let Some(rs) = content
            .get("metadata")
            .and_then(|m| m.get("schema"))
            .and_then(Value::as_str)
        {
            if let Some(index) = self.branch_index(node, rs)? {
                debug!("Selected branch {} ({}) of {}", index, rs, node.location());
                return Ok(Some(index));
            }
        }
        let mut ctx = ResolutionContext::new();
        for (index, branch) in self.branches_in(node, &mut ctx)?.into_iter().enumerate() {
            if self.content_fits(&branch, content, &mut ctx)? {
                debug!("Selected branch {} of {} by structure", index, node.location());
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    fn content_fits(
        &self,
        node: &SchemaNode,
        content: &Value,
        ctx: &mut ResolutionContext,
    ) -> Result<bool> {
        let node = self.through_items(node.clone(), ctx)?;
        match content {
            Value::Object(map) => match node.shape() {
                Shape::Alternatives => {
                    for branch in self.branches_in(&node, ctx)? {
                        if self.content_fits(&branch, content, ctx)? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                Shape::Record => {
                    for (key, value) in map {
                        match self.child_in(&node, key, ctx)? {
                            Some(child) => {
                                if !self.content_fits(&child, value, ctx)? {
                                    return Ok(false);
                                }
                            }
                            None => return Ok(false),
                        }
                    }
                    Ok(true)
                }
                _ => Ok(false),
            },
            Value::Array(items) => match items.first() {
                Some(first) => self.content_fits(&node, first, ctx),
                None => Ok(true),
            },
            _ => Ok(true),
        }
    }

    /// Resolve the schema node governing `lineage`.
    ///
    /// `selectors` runs parallel to `lineage`; entry `i` picks the branch of
    /// the alternative set reached at `lineage[i]`. Where no choice is given,
    /// every branch is searched and the first one containing the rest of the
    /// lineage wins. Arrays are stepped through transparently.
    pub fn resolve<S: AsRef<str>>(&self, lineage: &[S], selectors: &[Option<usize>]) -> Result<SchemaNode> {
        let mut ctx = ResolutionContext::new();
        ctx.push_scope(Arc::clone(&self.root));
        let lineage: Vec<&str> = lineage.iter().map(AsRef::as_ref).collect();
        let node = self.walk(self.root(), &lineage, selectors, 0, &mut ctx)?;

        if node.shape() == Shape::Alternatives {
            if let Some(Some(choice)) = lineage
                .len()
                .checked_sub(1)
                .and_then(|last| selectors.get(last))
            {
                return self.branch_in(&node, *choice, &mut ctx);
            }
        }
        Ok(node)
    }

    /// [`Self::resolve`], mapping "not found" to `None`.
    pub fn try_resolve<S: AsRef<str>>(
        &self,
        lineage: &[S],
        selectors: &[Option<usize>],
    ) -> Result<Option<SchemaNode>> {
        match self.resolve(lineage, selectors) {
            Ok(node) => Ok(Some(node)),
            Err(e) if e.is_not_found() => {
                trace!("No schema node for '{}'", dotted(lineage));
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn walk(
        &self,
        node: SchemaNode,
        lineage: &[&str],
        selectors: &[Option<usize>],
        depth: usize,
        ctx: &mut ResolutionContext,
    ) -> Result<SchemaNode> {
        if depth == lineage.len() {
            return Ok(node);
        }
        let segment = lineage[depth];
        let node = self.through_items(node, ctx)?;

        match node.shape() {
            Shape::Alternatives => {
                let choice = depth
                    .checked_sub(1)
                    .and_then(|previous| selectors.get(previous).copied().flatten());
                if let Some(choice) = choice {
                    let branch = self.branch_in(&node, choice, ctx)?;
                    return self.walk_unselected(branch, lineage, selectors, depth, ctx);
                }
                self.walk_unselected(node, lineage, selectors, depth, ctx)
            }
            Shape::Record => match self.child_in(&node, segment, ctx)? {
                Some(child) => self.walk(child, lineage, selectors, depth + 1, ctx),
                None => Err(Error::lineage_not_found(&lineage[..=depth], segment)),
            },
            Shape::Array | Shape::Leaf => Err(Error::lineage_not_found(&lineage[..=depth], segment)),
        }
    }

    /// Continue at `depth` from a node whose branch (if any) is not yet chosen.
    fn walk_unselected(
        &self,
        node: SchemaNode,
        lineage: &[&str],
        selectors: &[Option<usize>],
        depth: usize,
        ctx: &mut ResolutionContext,
    ) -> Result<SchemaNode> {
        let node = self.through_items(node, ctx)?;
        if node.shape() != Shape::Alternatives {
            return self.walk(node, lineage, selectors, depth, ctx);
        }
        for branch in self.branches_in(&node, ctx)? {
            match self.walk_unselected(branch, lineage, selectors, depth, ctx) {
                Ok(found) => return Ok(found),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Err(Error::lineage_not_found(&lineage[..=depth], lineage[depth]))
    }

    /// Declared axis order of the grid-variable group at `lineage`.
    ///
    /// Resolves the parent of the group; when the parent is an alternative set
    /// the first branch whose group declares every observed name wins.
    pub fn grid_variable_order<S: AsRef<str>>(
        &self,
        selectors: &[Option<usize>],
        lineage: &[S],
        observed: &[String],
    ) -> Result<Vec<String>> {
        let failure = || Error::GridVariables {
            lineage: dotted(lineage),
            observed: observed.join(", "),
        };
        let Some((group, parent_lineage)) = lineage.split_last() else {
            return Err(failure());
        };
        let parent_selectors = &selectors[..selectors.len().min(parent_lineage.len())];
        let parent = self.resolve(parent_lineage, parent_selectors)?;

        let mut ctx = ResolutionContext::new();
        let parent = self.through_items(parent, &mut ctx)?;
        let candidates = if parent.shape() == Shape::Alternatives {
            self.branches_in(&parent, &mut ctx)?
        } else {
            vec![parent]
        };

        for candidate in candidates {
            let candidate = self.through_items(candidate, &mut ctx)?;
            if let Some(group_node) = self.child_in(&candidate, group.as_ref(), &mut ctx)? {
                let names = group_node.property_names();
                if observed.iter().all(|name| names.contains(name)) {
                    return Ok(names);
                }
            }
        }
        Err(failure())
    }

    /// Conditional selectors declared under a record's `allOf`.
    pub fn conditionals(&self, record: &SchemaNode) -> Result<Vec<Conditional>> {
        let Some(entries) = record.raw().get("allOf").and_then(Value::as_array) else {
            return Ok(Vec::new());
        };
        let mut found = Vec::new();
        for (i, entry) in entries.iter().enumerate() {
            let Some(tests) = entry
                .get("if")
                .and_then(|c| c.get("properties"))
                .and_then(Value::as_object)
            else {
                continue;
            };
            let overridden: Vec<String> = entry
                .get("then")
                .and_then(|t| t.get("properties"))
                .and_then(Value::as_object)
                .map(|props| props.keys().cloned().collect())
                .unwrap_or_default();

            for (key, test) in tests {
                let Some(value) = test.get("const") else {
                    continue;
                };
                let mut overrides = Vec::new();
                for name in &overridden {
                    let raw = record.descend(&["allOf", &i.to_string(), "then", "properties", name]);
                    overrides.push((name.clone(), self.deref(&raw)?));
                }
                found.push(Conditional {
                    key: key.clone(),
                    value: value.clone(),
                    overrides,
                });
            }
        }
        Ok(found)
    }
}
