//! Query options for entity operations

use std::collections::BTreeMap;

/// Query parameters with map semantics: setting a key twice keeps the last
/// value, and insertion order does not affect the rendered query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    params: BTreeMap<String, String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.insert(key, value);
        self
    }

    pub fn set_optional<K: Into<String>, V: ToString>(self, key: K, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(key, v),
            None => self,
        }
    }

    pub fn insert<K: Into<String>, V: ToString>(&mut self, key: K, value: V) {
        self.params.insert(key.into(), value.to_string());
    }

    /// Overlay `other` on top of these options
    pub fn merge(mut self, other: &QueryOptions) -> Self {
        for (k, v) in &other.params {
            self.params.insert(k.clone(), v.clone());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn page(self, page: u32) -> Self {
        self.set("page", page)
    }

    pub fn per_page(self, per_page: u32) -> Self {
        self.set("per_page", per_page)
    }

    pub fn sort(self, field: &str) -> Self {
        self.set("sort", field)
    }

    pub fn to_query_string(&self) -> String {
        if self.params.is_empty() {
            String::new()
        } else {
            format!(
                "?{}",
                self.params
                    .iter()
                    .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                    .collect::<Vec<_>>()
                    .join("&")
            )
        }
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for QueryOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = QueryOptions::new();
        for (k, v) in iter {
            options.insert(k, v);
        }
        options
    }
}
