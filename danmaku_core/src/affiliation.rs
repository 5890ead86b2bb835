use crate::host::HostObject;
use crate::probe::ProbeChain;

/// Decides friend or foe from group tokens. Every lookup failure counts as
/// "not friendly".
#[derive(Debug, Clone)]
pub struct AffiliationResolver {
    chain: ProbeChain,
}

impl AffiliationResolver {
    pub fn new(chain: ProbeChain) -> Self {
        Self { chain }
    }

    pub fn token(&self, actor: &dyn HostObject) -> Option<String> {
        self.chain.resolve_text(actor)
    }

    pub fn is_friendly(&self, observer: &dyn HostObject, other: &dyn HostObject) -> bool {
        if observer.handle() == other.handle() {
            return false;
        }
        match (self.token(observer), self.token(other)) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => false,
        }
    }
}
