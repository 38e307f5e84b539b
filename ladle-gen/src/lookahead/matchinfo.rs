/// A partial match: a sequence of token kinds no longer than the current
/// lookahead limit.
///
/// Matches are shared as `Rc<MatchInfo>`. FOLLOW computation tells the
/// matches a walk passed through unchanged from the ones it extended by
/// pointer identity, so an unchanged match must be the same allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchInfo {
    tokens: Vec<usize>,
}

impl MatchInfo {
    pub fn new(limit: usize) -> Self {
        Self {
            tokens: Vec::with_capacity(limit),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    #[inline]
    pub fn tokens(&self) -> &[usize] {
        &self.tokens
    }

    /// A copy with `kind` appended.
    pub fn extended(&self, kind: usize) -> Self {
        let mut tokens = Vec::with_capacity(self.tokens.capacity().max(self.tokens.len() + 1));
        tokens.extend_from_slice(&self.tokens);
        tokens.push(kind);
        Self { tokens }
    }

    /// Compares the common prefix of both matches. Returns the shorter match
    /// if they agree on it, `None` if they differ. Empty matches are the
    /// caller's business.
    pub fn common_prefix<'a>(&'a self, other: &'a MatchInfo) -> Option<&'a MatchInfo> {
        let shorter = if self.len() <= other.len() { self } else { other };
        let n = shorter.len();
        (self.tokens[..n] == other.tokens[..n]).then_some(shorter)
    }
}

impl From<Vec<usize>> for MatchInfo {
    fn from(tokens: Vec<usize>) -> Self {
        Self { tokens }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_copies() {
        let m = MatchInfo::new(3);
        let a = m.extended(4);
        let b = a.extended(7);
        assert!(m.is_empty());
        assert_eq!(a.tokens(), &[4]);
        assert_eq!(b.tokens(), &[4, 7]);
    }

    #[test]
    fn common_prefix_is_positional() {
        let a = MatchInfo::from(vec![1, 2, 3]);
        let b = MatchInfo::from(vec![1, 2]);
        let c = MatchInfo::from(vec![1, 5]);
        assert_eq!(a.common_prefix(&b), Some(&b));
        assert_eq!(b.common_prefix(&a), Some(&b));
        assert_eq!(a.common_prefix(&c), None);
    }
}
