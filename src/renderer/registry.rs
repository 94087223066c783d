use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};
use uuid::Uuid;

type Documents = RwLock<HashMap<Uuid, Arc<str>>>;

/// A published map page. The page stays reachable at `url()` until the view
/// is dropped.
pub struct MapView {
    id: Uuid,
    url: String,
    registry: Weak<Documents>,
}

impl MapView {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for MapView {
    fn drop(&mut self) {
        match self.registry.upgrade() {
            Some(documents) => {
                debug!("[map_server] dropping map {} from registry", self.id);
                let mut documents = match documents.write() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                documents.remove(&self.id);
            }
            None => debug!("[map_server] registry gone for map {}", self.id),
        }
    }
}

#[derive(Clone)]
pub struct Registry {
    url_prefix: Arc<RwLock<String>>,
    documents: Arc<Documents>,
}

impl Registry {
    pub fn new(url_prefix: &str) -> Self {
        Self {
            url_prefix: Arc::new(RwLock::new(url_prefix.to_string())),
            documents: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn set_url_prefix(&self, url_prefix: &str) {
        let mut prefix = self.url_prefix.write().unwrap();
        *prefix = url_prefix.to_string();
    }

    pub fn register(&self, document: String) -> MapView {
        let id = Uuid::new_v4();
        self.documents
            .write()
            .unwrap()
            .insert(id, Arc::from(document));
        let url_prefix = self.url_prefix.read().unwrap();
        MapView {
            id,
            url: format!("{}/maps/{}", *url_prefix, id),
            registry: Arc::downgrade(&self.documents),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<str>> {
        self.documents.read().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_view_unregisters_document() {
        let registry = Registry::new("http://127.0.0.1:1234/prefix");
        let view = registry.register("<html></html>".to_string());
        assert_eq!(
            view.url(),
            format!("http://127.0.0.1:1234/prefix/maps/{}", view.id())
        );
        assert_eq!(registry.get(&view.id()).as_deref(), Some("<html></html>"));
        let other = registry.register("<html>2</html>".to_string());
        assert_eq!(registry.len(), 2);

        let id = view.id();
        drop(view);
        assert!(registry.get(&id).is_none());
        assert!(registry.get(&other.id()).is_some());
        drop(other);
        assert!(registry.is_empty());
    }

    #[test]
    fn view_outliving_registry() {
        let registry = Registry::new("http://localhost");
        let view = registry.register(String::new());
        drop(registry);
        // nothing left to unregister from
        drop(view);
    }
}
