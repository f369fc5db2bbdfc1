use std::collections::VecDeque;

use lazyload_config::ConfigPatch;
use lazyload_model::DescriptorOverrides;

/// Names requested together by one `require`/`and` call, or discovered
/// together in one payload. Siblings load concurrently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchRequest {
    pub names: Vec<String>,
    /// Merged into every descriptor of the batch when it is dequeued.
    pub properties: DescriptorOverrides,
    /// Merged into the loader's configuration when the batch is dequeued.
    pub config: ConfigPatch,
    /// Discovery depth: `0` for caller requests.
    pub depth: usize,
}

impl BatchRequest {
    /// Parses a comma-delimited name list. Blank entries are dropped.
    pub fn new(names: &str) -> Self {
        Self::from_names(names.split(',').map(str::to_string))
    }

    pub fn from_names<I>(names: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .collect(),
            ..Default::default()
        }
    }

    pub fn with_properties(mut self, properties: DescriptorOverrides) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_config(mut self, config: ConfigPatch) -> Self {
        self.config = config;
        self
    }

    pub fn at_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }
}

/// FIFO of pending batches. Discovered dependencies jump the line.
#[derive(Debug, Default)]
pub struct BatchQueue {
    batches: VecDeque<BatchRequest>,
}

impl BatchQueue {
    pub fn push_back(&mut self, batch: BatchRequest) {
        self.batches.push_back(batch);
    }

    pub fn push_front(&mut self, batch: BatchRequest) {
        self.batches.push_front(batch);
    }

    pub fn pop_front(&mut self) -> Option<BatchRequest> {
        self.batches.pop_front()
    }

    pub fn clear(&mut self) {
        self.batches.clear();
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_comma_lists() {
        let batch = BatchRequest::new(" x.js, y.js ,,");
        assert_eq!(batch.names, vec!["x.js", "y.js"]);
        assert_eq!(batch.depth, 0);
    }

    #[test]
    fn front_pushes_drain_first() {
        let mut queue = BatchQueue::default();
        queue.push_back(BatchRequest::new("a"));
        queue.push_back(BatchRequest::new("b"));
        queue.push_front(BatchRequest::new("dep").at_depth(1));

        let order: Vec<_> = std::iter::from_fn(|| queue.pop_front())
            .map(|b| b.names.join(","))
            .collect();
        assert_eq!(order, vec!["dep", "a", "b"]);
    }
}
