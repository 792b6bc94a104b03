//! Decides whether a lock target can be satisfied right now.
//!
//! Pure over the registry: no resource is touched here. Among equally
//! eligible resources the choice is made in ascending name order, so the
//! same state always yields the same binding.

use lockable_model::{ResourceName, TargetSpec};

use crate::registry::Registry;

/// Pick the resources that would satisfy `target` from what is free now.
///
/// Returns `None` when the target cannot be met in full; partial matches are
/// never returned.
pub fn find_match(target: &TargetSpec, registry: &Registry) -> Option<Vec<ResourceName>> {
    match target {
        TargetSpec::Names(names) => names
            .iter()
            .all(|name| registry.is_free(name))
            .then(|| names.clone()),
        TargetSpec::Label { label, quantity } => {
            let chosen: Vec<ResourceName> = registry
                .label_names(label)
                .filter(|name| registry.is_free(name))
                .take(*quantity)
                .cloned()
                .collect();
            (chosen.len() == *quantity).then_some(chosen)
        }
    }
}

/// Returns `true` if `target` could ever be met by the registered resources,
/// ignoring who holds them right now.
pub fn is_feasible(target: &TargetSpec, registry: &Registry) -> bool {
    match target {
        TargetSpec::Names(names) => names.iter().all(|name| registry.contains(name)),
        TargetSpec::Label { label, quantity } => registry.label_names(label).count() >= *quantity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockable_model::{RequestId, ResourceDef};

    fn setup() -> Registry {
        let mut reg = Registry::new();
        reg.register(&ResourceDef::new("b").with_label("gpu")).unwrap();
        reg.register(&ResourceDef::new("a").with_label("gpu")).unwrap();
        reg.register(&ResourceDef::new("c").with_label("gpu")).unwrap();
        reg.register(&ResourceDef::new("x").with_label("cpu")).unwrap();
        reg
    }

    #[test]
    fn names_match_in_given_order() {
        let reg = setup();
        let chosen = find_match(&TargetSpec::names(["x", "a"]), &reg);
        assert_eq!(chosen, Some(vec!["x".to_string(), "a".to_string()]));
    }

    #[test]
    fn names_need_every_resource_free() {
        let mut reg = setup();
        reg.occupy("a", RequestId::new(1)).unwrap();
        assert!(find_match(&TargetSpec::names(["x", "a"]), &reg).is_none());
        assert!(find_match(&TargetSpec::name("x"), &reg).is_some());
    }

    #[test]
    fn unknown_name_never_matches() {
        let reg = setup();
        assert!(find_match(&TargetSpec::name("ghost"), &reg).is_none());
    }

    #[test]
    fn label_picks_lowest_names_first() {
        let reg = setup();
        let chosen = find_match(&TargetSpec::label("gpu", 2), &reg);
        assert_eq!(chosen, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn label_skips_held_resources() {
        let mut reg = setup();
        reg.occupy("a", RequestId::new(1)).unwrap();
        let chosen = find_match(&TargetSpec::label("gpu", 2), &reg);
        assert_eq!(chosen, Some(vec!["b".to_string(), "c".to_string()]));
    }

    #[test]
    fn label_without_enough_free_is_none() {
        let mut reg = setup();
        reg.occupy("a", RequestId::new(1)).unwrap();
        reg.occupy("b", RequestId::new(1)).unwrap();
        assert!(find_match(&TargetSpec::label("gpu", 2), &reg).is_none());
        assert!(find_match(&TargetSpec::label("tpu", 1), &reg).is_none());
    }

    #[test]
    fn matching_is_deterministic() {
        let reg = setup();
        let first = find_match(&TargetSpec::label("gpu", 1), &reg);
        let second = find_match(&TargetSpec::label("gpu", 1), &reg);
        assert_eq!(first, second);
    }

    #[test]
    fn feasibility_ignores_occupancy() {
        let mut reg = setup();
        reg.occupy("x", RequestId::new(1)).unwrap();
        assert!(is_feasible(&TargetSpec::name("x"), &reg));
        assert!(is_feasible(&TargetSpec::label("gpu", 3), &reg));
        assert!(!is_feasible(&TargetSpec::label("gpu", 4), &reg));
        assert!(!is_feasible(&TargetSpec::name("ghost"), &reg));
    }
}
