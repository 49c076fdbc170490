//! Declarative component trees
//!
//! Builds a tree of components from a nested description, using only the
//! public `Component` API: the root is mounted and initialized directly,
//! every descendant is attached with `set_ref`.
//!
//! ```rust
//! use serde_json::json;
//! use trellis_children::{children_of, mount};
//! use trellis_core::{ComponentDef, Runtime};
//!
//! let runtime = Runtime::new();
//! let doc = runtime.document().clone();
//! let app = doc.append_element(doc.body(), "div").unwrap();
//! doc.set_attribute(app, "id", "app").unwrap();
//! for _ in 0..2 {
//!     let row = doc.append_element(app, "li").unwrap();
//!     doc.add_class(row, "row").unwrap();
//! }
//!
//! let shell = ComponentDef::new("Shell").state("ready", json!(true)).class();
//! let row = ComponentDef::new("Row").class();
//!
//! let root = pollster::block_on(
//!     mount(shell, "#app")
//!         .children(move |parent| children_of(parent, ".row", &row).unwrap_or_default())
//!         .run(&runtime),
//! )
//! .unwrap();
//! assert_eq!(root.ref_ids(), vec!["Row.0", "Row.1"]);
//! ```

use std::rc::Rc;

use futures::future::LocalBoxFuture;
use serde_json::Value;
use tracing::{debug, warn};

use trellis_core::{
    dataset, Component, ComponentClass, ComponentError, ComponentKind, Document, NodeId, Options,
    Projection, RefSpec, Result, Runtime, State, Target,
};

/// Produces the children of a mounted node
pub type ChildrenFn = Rc<dyn Fn(&Component) -> Vec<MountNode>>;

/// One node of a component tree description
#[derive(Clone)]
pub struct MountNode {
    class: ComponentClass,
    target: Target,
    id: Option<String>,
    options: Options,
    state: State,
    projection: Projection,
    children: Option<ChildrenFn>,
}

/// Describe a component of `class` mounted on `target`
pub fn mount(class: ComponentClass, target: impl Into<Target>) -> MountNode {
    MountNode {
        class,
        target: target.into(),
        id: None,
        options: Options::new(),
        state: State::new(),
        projection: Projection::new(),
        children: None,
    }
}

impl MountNode {
    /// Reference id under the parent; generated when not given
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options = self.options.merge(options);
        self
    }

    /// Initial state for the root node
    pub fn state(mut self, state: State) -> Self {
        self.state = state;
        self
    }

    /// Parent-to-child projection for attached nodes
    pub fn projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn children<F>(mut self, f: F) -> Self
    where
        F: Fn(&Component) -> Vec<MountNode> + 'static,
    {
        self.children = Some(Rc::new(f));
        self
    }

    fn is_detached(&self) -> bool {
        self.class.kind() == ComponentKind::Detached
    }

    /// Build this node as an application root
    pub async fn run(self, runtime: &Runtime) -> Result<Component> {
        let document = runtime.document().clone();

        let component = if self.is_detached() {
            let component = self.class.construct(runtime, self.options.clone());
            component.init(self.state.clone())?;
            component
        } else {
            let el = resolve(&document, document.root(), &self.target)?
                .ok_or_else(|| ComponentError::MissingRoot(self.class.name().to_string()))?;
            let options = dataset(&document, el).merge(self.options.clone());
            let component = self.class.construct(runtime, options);
            component.mount(el, None)?;
            component.init(self.state.clone())?;
            component
        };

        if let Some(children) = &self.children {
            attach_all(&component, children(&component)).await?;
        }
        Ok(component)
    }

    /// Attach this node under `parent`
    ///
    /// A target that does not resolve inside the parent is skipped with a
    /// warning and yields `None`.
    pub fn attach<'a>(self, parent: &'a Component) -> LocalBoxFuture<'a, Result<Option<Component>>> {
        Box::pin(async move {
            let runtime = parent.runtime().clone();
            let document = runtime.document().clone();
            let id = match &self.id {
                Some(id) => id.clone(),
                None => runtime.next_ref_id(self.class.name()),
            };

            let mut spec = RefSpec::class(id.clone(), self.class.clone());
            if self.is_detached() {
                spec = spec.options(self.options.clone());
            } else {
                let scope = parent.el().unwrap_or_else(|| document.root());
                let Some(el) = resolve(&document, scope, &self.target)? else {
                    warn!(parent = %parent.label(), reference = %id, target = ?self.target, "child target not found");
                    return Ok(None);
                };
                let options = dataset(&document, el).merge(self.options.clone());
                spec = spec.el(el).options(options);
            }

            let child = parent.set_ref(spec, self.projection.clone()).await?;
            debug!(parent = %parent.label(), reference = %id, "child attached");

            if let Some(children) = &self.children {
                attach_all(&child, children(&child)).await?;
            }
            Ok(Some(child))
        })
    }
}

fn resolve(document: &Document, scope: NodeId, target: &Target) -> Result<Option<NodeId>> {
    match target {
        Target::Node(node) if document.contains(scope, *node) => Ok(Some(*node)),
        Target::Node(_) => Ok(None),
        Target::Selector(selector) => Ok(document.query_selector(scope, selector)?),
    }
}

/// Attach `nodes` under `parent` in order, skipping unresolved targets
pub async fn attach_all(parent: &Component, nodes: Vec<MountNode>) -> Result<Vec<Component>> {
    let mut attached = Vec::with_capacity(nodes.len());
    for node in nodes {
        if let Some(child) = node.attach(parent).await? {
            attached.push(child);
        }
    }
    Ok(attached)
}

/// One node per element matching `selector` inside `parent`'s root
pub fn children_of(
    parent: &Component,
    selector: &str,
    class: &ComponentClass,
) -> Result<Vec<MountNode>> {
    let runtime = parent.runtime();
    let document = runtime.document();
    let scope = parent.el().unwrap_or_else(|| document.root());
    let nodes = document
        .query_selector_all(scope, selector)?
        .into_iter()
        .map(|el| mount(class.clone(), el).id(runtime.next_ref_id(class.name())))
        .collect();
    Ok(nodes)
}

/// Initial state with a single key
pub fn state_of(key: &str, value: Value) -> State {
    let mut state = State::new();
    state.insert(key.to_string(), value);
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trellis_core::ComponentDef;

    #[test]
    fn test_builder_keeps_settings() {
        let node = mount(ComponentDef::new("Card").class(), "#card")
            .id("card")
            .state(state_of("open", json!(true)));
        assert_eq!(node.id.as_deref(), Some("card"));
        assert_eq!(node.target, Target::Selector("#card".into()));
        assert_eq!(node.state.get("open"), Some(&json!(true)));
        assert!(node.children.is_none());
    }

    #[test]
    fn test_resolve_requires_containment() {
        let runtime = Runtime::new();
        let doc = runtime.document().clone();
        let scope = doc.append_element(doc.body(), "div").unwrap();
        let outside = doc.append_element(doc.body(), "span").unwrap();
        assert_eq!(resolve(&doc, scope, &Target::Node(outside)).unwrap(), None);
        assert_eq!(resolve(&doc, doc.root(), &Target::Node(outside)).unwrap(), Some(outside));
    }
}
