//! Transient position tracking for one walk.

/// Where the walker currently is, for diagnostics and namespace checks.
///
/// One context lives for the duration of a single read or write and is
/// dropped with its serializer or deserializer.
#[derive(Debug, Clone, Default)]
pub struct SerializationContext {
    path: Vec<String>,
    namespace: Option<String>,
}

impl SerializationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, element: &str) {
        self.path.push(element.to_string());
    }

    pub fn leave(&mut self) {
        self.path.pop();
    }

    /// Number of open elements.
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Slash-separated path of open elements, `/` at the document level.
    pub fn path(&self) -> String {
        if self.path.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", self.path.join("/"))
        }
    }

    /// Path of `element` as a child of the current position.
    pub fn child_path(&self, element: &str) -> String {
        if self.path.is_empty() {
            format!("/{element}")
        } else {
            format!("{}/{element}", self.path())
        }
    }

    /// Namespace adopted from the document root.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn adopt_namespace(&mut self, namespace: Option<String>) {
        self.namespace = namespace;
    }
}
