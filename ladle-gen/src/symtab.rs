use indexmap::IndexSet;
use smartstring::alias::String;

/// Interns names and hands out dense indices in insertion order.
///
/// Used for lexical state names and production names.
#[derive(Default, Debug, Clone)]
pub struct Symtab {
    set: IndexSet<String>,
}

impl Symtab {
    pub fn new() -> Self {
        Self {
            set: IndexSet::new(),
        }
    }

    pub fn add(&mut self, sym: &str) -> usize {
        if let Some(idx) = self.set.get_index_of(sym) {
            return idx;
        }
        self.set.insert_full(sym.into()).0
    }

    pub fn idx(&self, sym: &str) -> Option<usize> {
        self.set.get_index_of(sym)
    }

    pub fn sym(&self, idx: usize) -> Option<&str> {
        self.set.get_index(idx).map(|x| x.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.set.iter().map(|x| x.as_str())
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}
