//! Scope trees built from JavaScript source.
//!
//! tree-sitter produces the concrete syntax tree; [`ScopeBuilder`] folds it
//! into a [`ScopeTree`], keeping only the nodes that open a lexical scope and
//! the names each of them binds. Binding rules follow ES2015+:
//!
//! - `var` hoists to the nearest function (or the program);
//! - `let`, `const`, `class` and function declarations bind in the enclosing
//!   block;
//! - parameters bind in the function scope, together with the function
//!   body's own declarations;
//! - a named function or class expression binds its name inside itself.

use anyhow::anyhow;
use serde::Serialize;
use tree_sitter::{Language, Node, Parser, Tree};

use crate::error::TrapError;
use crate::source::{LineIndex, SourceRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Program,
    Function,
    Class,
    Block,
    For,
    Catch,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScopeNode {
    pub kind: ScopeKind,
    pub range: SourceRange,
    pub declared: Vec<String>,
    pub children: Vec<ScopeNode>,
}

impl ScopeNode {
    pub fn new(kind: ScopeKind, range: SourceRange) -> Self {
        Self {
            kind,
            range,
            declared: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn declare(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.declared.contains(&name) {
            self.declared.push(name);
        }
    }

    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.declare(name);
        }
        self
    }

    pub fn with_child(mut self, child: ScopeNode) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScopeTree {
    pub root: ScopeNode,
}

pub trait SyntaxProvider: Send + Sync {
    fn name(&self) -> &str;

    fn analyze(&self, source: &str) -> Result<ScopeTree, TrapError>;
}

/// JavaScript provider backed by tree-sitter.
pub struct TreeSitterProvider {
    language: Language,
    tolerate_errors: bool,
}

impl TreeSitterProvider {
    pub fn javascript() -> Result<Self, TrapError> {
        let provider = Self {
            language: tree_sitter_javascript::language(),
            tolerate_errors: false,
        };
        provider
            .parser()
            .map_err(|err| TrapError::parse(err.to_string()))?;
        Ok(provider)
    }

    /// Keep going on sources with syntax errors instead of failing; the
    /// scope tree then reflects tree-sitter's error recovery.
    pub fn tolerate_errors(mut self, tolerate: bool) -> Self {
        self.tolerate_errors = tolerate;
        self
    }

    fn parser(&self) -> anyhow::Result<Parser> {
        let mut parser = Parser::new();
        parser
            .set_language(self.language)
            .map_err(|err| anyhow!("failed to load tree-sitter-javascript: {err}"))?;
        Ok(parser)
    }

    pub fn parse(&self, source: &str) -> Result<Tree, TrapError> {
        let mut parser = self
            .parser()
            .map_err(|err| TrapError::parse(err.to_string()))?;
        parser
            .parse(source, None)
            .ok_or_else(|| TrapError::parse("tree-sitter failed to parse source"))
    }
}

impl SyntaxProvider for TreeSitterProvider {
    fn name(&self) -> &str {
        "tree-sitter-javascript"
    }

    fn analyze(&self, source: &str) -> Result<ScopeTree, TrapError> {
        let tree = self.parse(source)?;
        let root = tree.root_node();

        if !self.tolerate_errors && root.has_error() {
            let index = LineIndex::new(source);
            let at = first_error(root)
                .map(|node| index.position_at(node.start_byte()))
                .unwrap_or_else(|| index.position_at(0));
            return Err(TrapError::parse(format!("syntax error at {at}")));
        }

        Ok(ScopeBuilder::new(source).build(root))
    }
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.is_error() || current.is_missing() {
            return Some(current);
        }
        for i in (0..current.child_count()).rev() {
            if let Some(child) = current.child(i) {
                if child.has_error() {
                    stack.push(child);
                }
            }
        }
    }
    None
}

struct ScopeBuilder<'s> {
    source: &'s str,
    index: LineIndex<'s>,
    stack: Vec<ScopeNode>,
}

impl<'s> ScopeBuilder<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            index: LineIndex::new(source),
            stack: Vec::new(),
        }
    }

    fn build(mut self, root: Node<'_>) -> ScopeTree {
        let mut program = ScopeNode::new(ScopeKind::Program, self.range(root));
        // The program scope reaches to the end of the file even when
        // tree-sitter stops the root node at the last token.
        program.range.end = program.range.end.max(self.index.position_at(self.source.len()));
        self.stack.push(program);
        self.visit_children(root);

        let root = self.stack.pop().unwrap_or_else(|| {
            ScopeNode::new(ScopeKind::Program, self.index.range(0, self.source.len()))
        });
        ScopeTree { root }
    }

    fn range(&self, node: Node<'_>) -> SourceRange {
        self.index.range(node.start_byte(), node.end_byte())
    }

    fn text(&self, node: Node<'_>) -> String {
        node.utf8_text(self.source.as_bytes())
            .unwrap_or_default()
            .to_string()
    }

    fn open(&mut self, kind: ScopeKind, node: Node<'_>) {
        let scope = ScopeNode::new(kind, self.range(node));
        self.stack.push(scope);
    }

    fn close(&mut self) {
        if self.stack.len() < 2 {
            return;
        }
        if let Some(scope) = self.stack.pop() {
            if let Some(parent) = self.stack.last_mut() {
                parent.children.push(scope);
            }
        }
    }

    fn declare_lexical(&mut self, name: String) {
        if let Some(scope) = self.stack.last_mut() {
            scope.declare(name);
        }
    }

    fn declare_var(&mut self, name: String) {
        let target = self
            .stack
            .iter_mut()
            .rev()
            .find(|scope| matches!(scope.kind, ScopeKind::Function | ScopeKind::Program));
        if let Some(scope) = target {
            scope.declare(name);
        }
    }

    fn visit_children(&mut self, node: Node<'_>) {
        for i in 0..node.named_child_count() {
            if let Some(child) = node.named_child(i) {
                self.visit(child);
            }
        }
    }

    fn visit(&mut self, node: Node<'_>) {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                if let Some(name) = node.child_by_field_name("name") {
                    let name = self.text(name);
                    self.declare_lexical(name);
                }
                self.visit_function(node, false);
            }
            "function" | "function_expression" | "generator_function" => {
                self.visit_function(node, true);
            }
            "arrow_function" | "method_definition" => self.visit_function(node, false),
            "class_declaration" => {
                if let Some(name) = node.child_by_field_name("name") {
                    let name = self.text(name);
                    self.declare_lexical(name);
                }
                self.visit_class(node);
            }
            "class" => self.visit_class(node),
            "lexical_declaration" => {
                for name in self.declarator_names(node) {
                    self.declare_lexical(name);
                }
                self.visit_children(node);
            }
            "variable_declaration" => {
                for name in self.declarator_names(node) {
                    self.declare_var(name);
                }
                self.visit_children(node);
            }
            "statement_block" | "switch_body" | "class_static_block" => {
                self.open(ScopeKind::Block, node);
                self.visit_children(node);
                self.close();
            }
            "for_statement" => {
                self.open(ScopeKind::For, node);
                self.visit_children(node);
                self.close();
            }
            "for_in_statement" => self.visit_for_in(node),
            "catch_clause" => self.visit_catch(node),
            "import_statement" => {
                let mut names = Vec::new();
                self.import_names(node, &mut names);
                for name in names {
                    self.declare_lexical(name);
                }
            }
            _ => self.visit_children(node),
        }
    }

    fn visit_function(&mut self, node: Node<'_>, binds_own_name: bool) {
        self.open(ScopeKind::Function, node);

        if binds_own_name {
            if let Some(name) = node.child_by_field_name("name") {
                let name = self.text(name);
                self.declare_lexical(name);
            }
        }

        if let Some(parameter) = node.child_by_field_name("parameter") {
            let name = self.text(parameter);
            self.declare_lexical(name);
        }

        if let Some(parameters) = node.child_by_field_name("parameters") {
            let mut names = Vec::new();
            self.pattern_names(parameters, &mut names);
            for name in names {
                self.declare_lexical(name);
            }
            // default values may contain closures
            self.visit_children(parameters);
        }

        if let Some(body) = node.child_by_field_name("body") {
            if body.kind() == "statement_block" {
                self.visit_children(body);
            } else {
                self.visit(body);
            }
        }

        self.close();
    }

    fn visit_class(&mut self, node: Node<'_>) {
        self.open(ScopeKind::Class, node);
        if let Some(name) = node.child_by_field_name("name") {
            let name = self.text(name);
            self.declare_lexical(name);
        }
        for i in 0..node.named_child_count() {
            if let Some(child) = node.named_child(i) {
                if child.kind() == "class_body" || child.kind() == "class_heritage" {
                    self.visit_children(child);
                }
            }
        }
        self.close();
    }

    fn visit_for_in(&mut self, node: Node<'_>) {
        self.open(ScopeKind::For, node);

        let kind = (0..node.child_count())
            .filter_map(|i| node.child(i))
            .map(|child| child.kind())
            .find(|kind| matches!(*kind, "var" | "let" | "const"));

        if let Some(left) = node.child_by_field_name("left") {
            let mut names = Vec::new();
            self.pattern_names(left, &mut names);
            for name in names {
                match kind {
                    Some("var") => self.declare_var(name),
                    Some(_) => self.declare_lexical(name),
                    None => {}
                }
            }
        }
        if let Some(right) = node.child_by_field_name("right") {
            self.visit(right);
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.visit(body);
        }

        self.close();
    }

    fn visit_catch(&mut self, node: Node<'_>) {
        self.open(ScopeKind::Catch, node);
        if let Some(parameter) = node.child_by_field_name("parameter") {
            let mut names = Vec::new();
            self.pattern_names(parameter, &mut names);
            for name in names {
                self.declare_lexical(name);
            }
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.visit_children(body);
        }
        self.close();
    }

    fn declarator_names(&self, declaration: Node<'_>) -> Vec<String> {
        let mut names = Vec::new();
        for i in 0..declaration.named_child_count() {
            if let Some(declarator) = declaration.named_child(i) {
                if declarator.kind() != "variable_declarator" {
                    continue;
                }
                if let Some(name) = declarator.child_by_field_name("name") {
                    self.pattern_names(name, &mut names);
                }
            }
        }
        names
    }

    /// Identifiers bound by a binding pattern, in source order. Default
    /// values and property keys are not bindings and are skipped.
    fn pattern_names(&self, node: Node<'_>, names: &mut Vec<String>) {
        match node.kind() {
            "identifier" | "shorthand_property_identifier_pattern" => {
                names.push(self.text(node));
            }
            "assignment_pattern" | "object_assignment_pattern" => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.pattern_names(left, names);
                }
            }
            "pair_pattern" => {
                if let Some(value) = node.child_by_field_name("value") {
                    self.pattern_names(value, names);
                }
            }
            "formal_parameters" | "object_pattern" | "array_pattern" | "rest_pattern" => {
                for i in 0..node.named_child_count() {
                    if let Some(child) = node.named_child(i) {
                        self.pattern_names(child, names);
                    }
                }
            }
            _ => {}
        }
    }

    fn import_names(&self, node: Node<'_>, names: &mut Vec<String>) {
        match node.kind() {
            "import_specifier" => {
                let bound = node
                    .child_by_field_name("alias")
                    .or_else(|| node.child_by_field_name("name"));
                if let Some(bound) = bound {
                    names.push(self.text(bound));
                }
            }
            "identifier" => names.push(self.text(node)),
            "import_statement" | "import_clause" | "named_imports" | "namespace_import" => {
                for i in 0..node.named_child_count() {
                    if let Some(child) = node.named_child(i) {
                        self.import_names(child, names);
                    }
                }
            }
            _ => {}
        }
    }
}
