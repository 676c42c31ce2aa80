//! Per-node virtual filesystem.
//!
//! One tree rooted at `/`. Builtins only ever touch the root's direct
//! children; the working directory is a label and is never resolved here.

use serde::{Deserialize, Serialize};
use synapse_core::{ActorId, Result, SynapseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Dir,
}

/// A file or directory. Files carry `content`, directories carry `children`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VNode {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<VNode>>,
}

impl VNode {
    pub fn file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::File,
            content: Some(content.into()),
            children: None,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Dir,
            content: None,
            children: Some(Vec::new()),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Dir
    }

    /// Listing label: directories get a trailing `/`.
    pub fn label(&self) -> String {
        if self.is_dir() {
            format!("{}/", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// The whole tree of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileSystem {
    root: VNode,
}

impl Default for FileSystem {
    fn default() -> Self {
        Self {
            root: VNode::dir("/"),
        }
    }
}

impl FileSystem {
    /// The tree a brand-new node starts with.
    pub fn seeded(id: &ActorId) -> Self {
        let manifest = serde_json::json!({
            "node": id.as_str(),
            "version": env!("CARGO_PKG_VERSION"),
            "capabilities": ["shell", "relay"],
        });
        let mut fs = Self::default();
        fs.children_mut().push(VNode::dir("logs"));
        fs.children_mut().push(VNode::file(
            "manifest.json",
            serde_json::to_string_pretty(&manifest).unwrap_or_default(),
        ));
        fs
    }

    /// Rebuild from a persisted root, repairing the root invariants.
    pub fn from_root(mut root: VNode) -> Self {
        root.name = "/".into();
        root.kind = NodeKind::Dir;
        root.content = None;
        if root.children.is_none() {
            root.children = Some(Vec::new());
        }
        Self { root }
    }

    pub fn root(&self) -> &VNode {
        &self.root
    }

    fn children(&self) -> &[VNode] {
        self.root.children.as_deref().unwrap_or_default()
    }

    fn children_mut(&mut self) -> &mut Vec<VNode> {
        self.root.children.get_or_insert_with(Vec::new)
    }

    fn find(&self, name: &str) -> Option<&VNode> {
        self.children().iter().find(|c| c.name == name)
    }

    /// Labels of the root's children in insertion order.
    pub fn ls(&self) -> Vec<String> {
        self.children().iter().map(VNode::label).collect()
    }

    pub fn len(&self) -> usize {
        self.children().len()
    }

    pub fn is_empty(&self) -> bool {
        self.children().is_empty()
    }

    pub fn mkdir(&mut self, name: &str) -> Result<()> {
        self.create("mkdir", VNode::dir(validate_name("mkdir", name)?))
    }

    pub fn touch(&mut self, name: &str) -> Result<()> {
        self.create("touch", VNode::file(validate_name("touch", name)?, ""))
    }

    fn create(&mut self, command: &str, node: VNode) -> Result<()> {
        if self.find(&node.name).is_some() {
            return Err(SynapseError::usage(
                command,
                format!("{}: already exists", node.name),
            ));
        }
        self.children_mut().push(node);
        Ok(())
    }

    /// Remove the first child called `name`.
    pub fn rm(&mut self, name: &str) -> Result<VNode> {
        let name = validate_name("rm", name)?;
        let children = self.children_mut();
        match children.iter().position(|c| c.name == name) {
            Some(idx) => Ok(children.remove(idx)),
            None => Err(SynapseError::usage(
                "rm",
                format!("{name}: no such file or directory"),
            )),
        }
    }

    pub fn cat(&self, name: &str) -> Result<String> {
        let name = validate_name("cat", name)?;
        match self.find(name) {
            Some(node) if node.is_dir() => {
                Err(SynapseError::usage("cat", format!("{name}: is a directory")))
            }
            Some(node) => Ok(node.content.clone().unwrap_or_default()),
            None => Err(SynapseError::usage("cat", format!("{name}: no such file"))),
        }
    }

    /// Overwrite a file's content, creating the file when absent.
    pub fn write(&mut self, name: &str, content: &str) -> Result<()> {
        let name = validate_name("echo", name)?;
        match self.children_mut().iter_mut().find(|c| c.name == name) {
            Some(node) if node.is_dir() => {
                Err(SynapseError::usage("echo", format!("{name}: is a directory")))
            }
            Some(node) => {
                node.content = Some(content.to_string());
                Ok(())
            }
            None => {
                self.children_mut().push(VNode::file(name, content));
                Ok(())
            }
        }
    }
}

fn validate_name<'a>(command: &str, name: &'a str) -> Result<&'a str> {
    let name = name.trim();
    if name.is_empty() {
        return Err(SynapseError::usage(command, "missing name"));
    }
    if name.contains('/') || name == "." || name == ".." {
        return Err(SynapseError::usage(
            command,
            format!("{name}: invalid name"),
        ));
    }
    Ok(name)
}
