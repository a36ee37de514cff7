/// Hands out table aliases for one sort spec or aggregation item.
///
/// Every spec gets its own arena with a distinct prefix, so aliases stay unique
/// across a query and do not depend on the order in which specs resolve.
#[derive(Debug, Clone)]
pub struct AliasArena {
    prefix: String,
    next: usize,
}

impl AliasArena {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 0,
        }
    }

    pub fn for_sort(index: usize) -> Self {
        Self::new(format!("__s{index}"))
    }

    pub fn for_aggregation(index: usize) -> Self {
        Self::new(format!("__a{index}"))
    }

    pub fn fresh(&mut self) -> String {
        let alias = format!("{}_{}", self.prefix, self.next);
        self.next += 1;
        alias
    }

    pub fn allocated(&self) -> usize {
        self.next
    }
}
