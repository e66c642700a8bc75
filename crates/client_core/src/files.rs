use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct FileSelectionSet {
    paths: Vec<String>,
    seen: HashSet<String>,
}

impl FileSelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<I, P>(&mut self, incoming: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        let before = self.paths.len();
        for path in incoming {
            let path = path.into();
            if path.trim().is_empty() {
                continue;
            }
            if self.seen.insert(path.clone()) {
                self.paths.push(path);
            }
        }
        self.paths.len() - before
    }

    pub fn clear(&mut self) {
        self.paths.clear();
        self.seen.clear();
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
