use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    time::SystemTime,
};

use lockable_model::{
    Labels, RequestId, Resource, ResourceDef, ResourceName, ResourcePage, ResourceQuery,
    ResourceState,
};

use crate::error::CoreError;

/// Definitions and occupancy of every known resource.
///
/// Has no locking of its own: it is only ever touched from inside the
/// manager's critical section.
#[derive(Debug, Default)]
pub struct Registry {
    /// Resources indexed by name, kept in name order.
    resources: BTreeMap<ResourceName, Resource>,
    /// Index: label -> names of resources carrying it.
    by_label: HashMap<String, BTreeSet<ResourceName>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new resource in the `Free` state.
    pub fn register(&mut self, def: &ResourceDef) -> Result<(), CoreError> {
        def.validate()?;
        if self.resources.contains_key(&def.name) {
            return Err(CoreError::DuplicateResource(def.name.clone()));
        }

        let res = Resource::from_def(def);
        self.index(&res.name, &res.labels);
        self.resources.insert(res.name.clone(), res);
        Ok(())
    }

    /// Delete a resource; only free resources can be removed.
    pub fn remove(&mut self, name: &str) -> Result<Resource, CoreError> {
        let res = self.lookup(name)?;
        if !res.is_free() {
            return Err(invalid_state(res, ResourceState::Free));
        }

        let labels = res.labels.clone();
        self.unindex(name, &labels);
        self.resources
            .remove(name)
            .ok_or_else(|| CoreError::NotFound(name.to_string()))
    }

    pub fn lookup(&self, name: &str) -> Result<&Resource, CoreError> {
        self.resources
            .get(name)
            .ok_or_else(|| CoreError::NotFound(name.to_string()))
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    /// Resources carrying `label`, in name order.
    pub fn by_label(&self, label: &str) -> Vec<&Resource> {
        self.label_names(label)
            .filter_map(|name| self.resources.get(name))
            .collect()
    }

    /// Names of resources carrying `label`, in name order.
    pub fn label_names<'a>(
        &'a self,
        label: &str,
    ) -> impl Iterator<Item = &'a ResourceName> + use<'a> {
        self.by_label.get(label).into_iter().flatten()
    }

    #[inline]
    pub fn is_free(&self, name: &str) -> bool {
        self.resources.get(name).is_some_and(Resource::is_free)
    }

    pub fn has_free(&self) -> bool {
        self.resources.values().any(Resource::is_free)
    }

    /// Mark a free resource as held by `request`.
    pub fn occupy(&mut self, name: &str, request: RequestId) -> Result<(), CoreError> {
        let res = self
            .resources
            .get_mut(name)
            .ok_or_else(|| CoreError::NotFound(name.to_string()))?;
        if !res.is_free() {
            return Err(invalid_state(res, ResourceState::Free));
        }

        res.state = ResourceState::Held;
        res.holder = Some(request);
        res.updated_at = SystemTime::now();
        Ok(())
    }

    /// Occupy every name for `request`, or none of them.
    pub fn occupy_all(
        &mut self,
        names: &[ResourceName],
        request: RequestId,
    ) -> Result<(), CoreError> {
        for name in names {
            let res = self.lookup(name)?;
            if !res.is_free() {
                return Err(invalid_state(res, ResourceState::Free));
            }
        }
        for name in names {
            self.occupy(name, request)?;
        }
        Ok(())
    }

    /// Return a held resource to the pool.
    pub fn free(&mut self, name: &str) -> Result<(), CoreError> {
        let res = self
            .resources
            .get_mut(name)
            .ok_or_else(|| CoreError::NotFound(name.to_string()))?;
        if res.is_free() {
            return Err(invalid_state(res, ResourceState::Held));
        }

        res.state = ResourceState::Free;
        res.holder = None;
        res.updated_at = SystemTime::now();
        Ok(())
    }

    /// Replace the labels of a free resource.
    pub fn set_labels(&mut self, name: &str, labels: Labels) -> Result<(), CoreError> {
        if labels.iter().any(|l| l.trim().is_empty()) {
            return Err(lockable_model::ModelError::EmptyLabel.into());
        }
        let res = self.lookup(name)?;
        if !res.is_free() {
            return Err(invalid_state(res, ResourceState::Free));
        }

        let old = res.labels.clone();
        self.unindex(name, &old);
        self.index(name, &labels);
        if let Some(res) = self.resources.get_mut(name) {
            res.labels = labels;
            res.updated_at = SystemTime::now();
        }
        Ok(())
    }

    pub fn set_note(&mut self, name: &str, note: String) -> Result<(), CoreError> {
        let res = self
            .resources
            .get_mut(name)
            .ok_or_else(|| CoreError::NotFound(name.to_string()))?;
        res.note = note;
        res.updated_at = SystemTime::now();
        Ok(())
    }

    /// Query resources with combined filters and pagination.
    ///
    /// Results come back in name order. When `label` is given the label index
    /// narrows the scan. `total` counts matches before pagination.
    pub fn query(&self, q: &ResourceQuery) -> ResourcePage<Resource> {
        let iter: Box<dyn Iterator<Item = &Resource>> = match &q.label {
            Some(label) => Box::new(
                self.label_names(label)
                    .filter_map(|name| self.resources.get(name)),
            ),
            None => Box::new(self.resources.values()),
        };

        let iter: Box<dyn Iterator<Item = &Resource>> = match q.state {
            Some(state) => Box::new(iter.filter(move |res| res.state == state)),
            None => iter,
        };

        let filtered: Vec<&Resource> = iter.collect();
        let total = filtered.len();

        let items = filtered
            .into_iter()
            .skip(q.offset)
            .take(q.limit)
            .cloned()
            .collect();

        ResourcePage { items, total }
    }

    fn index(&mut self, name: &str, labels: &Labels) {
        for label in labels {
            self.by_label
                .entry(label.clone())
                .or_default()
                .insert(name.to_string());
        }
    }

    fn unindex(&mut self, name: &str, labels: &Labels) {
        for label in labels {
            if let Some(names) = self.by_label.get_mut(label) {
                names.remove(name);
                if names.is_empty() {
                    self.by_label.remove(label);
                }
            }
        }
    }
}

fn invalid_state(res: &Resource, expected: ResourceState) -> CoreError {
    CoreError::InvalidState {
        resource: res.name.clone(),
        expected,
        actual: res.state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Registry {
        let mut reg = Registry::new();
        reg.register(&ResourceDef::new("r1").with_label("gpu")).unwrap();
        reg.register(&ResourceDef::new("r2").with_label("gpu")).unwrap();
        reg.register(&ResourceDef::new("r3").with_label("cpu")).unwrap();
        reg
    }

    #[test]
    fn register_and_lookup() {
        let reg = setup();
        let res = reg.lookup("r1").expect("resource should exist");
        assert_eq!(res.name, "r1");
        assert!(res.is_free());
        assert_eq!(reg.query(&ResourceQuery::new()).total, 3);
    }

    #[test]
    fn register_duplicate_fails() {
        let mut reg = setup();
        let err = reg.register(&ResourceDef::new("r1")).unwrap_err();
        assert_eq!(err, CoreError::DuplicateResource("r1".into()));
    }

    #[test]
    fn lookup_unknown_is_not_found() {
        let reg = setup();
        assert_eq!(
            reg.lookup("nope").unwrap_err(),
            CoreError::NotFound("nope".into())
        );
    }

    #[test]
    fn by_label_returns_name_order() {
        let reg = setup();
        let names: Vec<_> = reg.by_label("gpu").iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["r1", "r2"]);
        assert!(reg.by_label("missing").is_empty());
    }

    #[test]
    fn occupy_and_free() {
        let mut reg = setup();
        let id = RequestId::new(1);

        reg.occupy("r1", id).unwrap();
        let res = reg.lookup("r1").unwrap();
        assert_eq!(res.state, ResourceState::Held);
        assert_eq!(res.holder, Some(id));

        reg.free("r1").unwrap();
        assert!(reg.is_free("r1"));
        assert!(reg.lookup("r1").unwrap().holder.is_none());
    }

    #[test]
    fn occupy_held_is_invalid_state() {
        let mut reg = setup();
        reg.occupy("r1", RequestId::new(1)).unwrap();
        let err = reg.occupy("r1", RequestId::new(2)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidState {
                expected: ResourceState::Free,
                actual: ResourceState::Held,
                ..
            }
        ));
    }

    #[test]
    fn free_free_is_invalid_state() {
        let mut reg = setup();
        let err = reg.free("r1").unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidState {
                expected: ResourceState::Held,
                actual: ResourceState::Free,
                ..
            }
        ));
    }

    #[test]
    fn occupy_all_is_atomic() {
        let mut reg = setup();
        reg.occupy("r2", RequestId::new(1)).unwrap();

        let names = vec!["r1".to_string(), "r2".to_string()];
        assert!(reg.occupy_all(&names, RequestId::new(2)).is_err());
        assert!(reg.is_free("r1"), "partial allocation must not happen");
    }

    #[test]
    fn remove_free_resource() {
        let mut reg = setup();
        let removed = reg.remove("r1").unwrap();
        assert_eq!(removed.name, "r1");
        assert!(!reg.contains("r1"));
        let names: Vec<_> = reg.label_names("gpu").cloned().collect();
        assert_eq!(names, vec!["r2".to_string()]);
    }

    #[test]
    fn remove_held_resource_fails() {
        let mut reg = setup();
        reg.occupy("r1", RequestId::new(1)).unwrap();
        assert!(matches!(
            reg.remove("r1"),
            Err(CoreError::InvalidState { .. })
        ));
        assert!(reg.contains("r1"));
    }

    #[test]
    fn set_labels_reindexes() {
        let mut reg = setup();
        reg.set_labels("r3", Labels::from(["gpu".to_string()])).unwrap();
        assert_eq!(reg.by_label("gpu").len(), 3);
        assert!(reg.by_label("cpu").is_empty());
    }

    #[test]
    fn set_labels_on_held_resource_fails() {
        let mut reg = setup();
        reg.occupy("r1", RequestId::new(1)).unwrap();
        assert!(reg.set_labels("r1", Labels::new()).is_err());
        assert!(reg.lookup("r1").unwrap().labels.contains("gpu"));
    }

    #[test]
    fn query_by_label_and_state() {
        let mut reg = setup();
        reg.occupy("r1", RequestId::new(1)).unwrap();

        let page = reg.query(&ResourceQuery::new().with_label("gpu"));
        assert_eq!(page.total, 2);

        let page = reg.query(
            &ResourceQuery::new()
                .with_label("gpu")
                .with_state(ResourceState::Free),
        );
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "r2");
    }

    #[test]
    fn query_pagination() {
        let reg = setup();
        let page = reg.query(&ResourceQuery::new().with_offset(1).with_limit(1));
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "r2");
    }

    #[test]
    fn query_unknown_label_is_empty() {
        let reg = setup();
        let page = reg.query(&ResourceQuery::new().with_label("nope"));
        assert_eq!(page.total, 0);
        assert!(page.items.is_empty());
    }
}
