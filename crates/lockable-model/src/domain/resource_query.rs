use super::ResourceState;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

/// Query parameters for listing resources with filtering and pagination.
#[derive(Debug, Clone, Default)]
pub struct ResourceQuery {
    pub label: Option<String>,
    pub state: Option<ResourceState>,
    pub limit: usize,
    pub offset: usize,
}

/// Result of a paginated resource query.
#[derive(Debug, Clone)]
pub struct ResourcePage<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl ResourceQuery {
    pub fn new() -> Self {
        Self {
            label: None,
            state: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_state(mut self, state: ResourceState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.min(MAX_LIMIT);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_capped() {
        let q = ResourceQuery::new().with_limit(10_000);
        assert_eq!(q.limit, MAX_LIMIT);
    }

    #[test]
    fn builder_sets_filters() {
        let q = ResourceQuery::new()
            .with_label("gpu")
            .with_state(ResourceState::Free)
            .with_offset(5);
        assert_eq!(q.label.as_deref(), Some("gpu"));
        assert_eq!(q.state, Some(ResourceState::Free));
        assert_eq!(q.offset, 5);
        assert_eq!(q.limit, DEFAULT_LIMIT);
    }
}
