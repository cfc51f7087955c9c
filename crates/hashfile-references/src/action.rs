use crate::content_key::ContentKey;

/// The net effect of one committed transaction.
///
/// `inserts` are the keys written by the commit, pointing at the bytes it
/// appended. `deletes` are the keys it retired, as they were in the previous
/// snapshot. A pair present in both was deleted and then re-inserted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Action {
    inserts: Vec<ContentKey>,
    deletes: Vec<ContentKey>,
}

impl Action {
    pub(crate) fn from_parts(inserts: Vec<ContentKey>, deletes: Vec<ContentKey>) -> Self {
        Self { inserts, deletes }
    }

    /// Keys inserted by this action, in staging order.
    pub fn inserts(&self) -> &[ContentKey] {
        &self.inserts
    }

    /// Keys deleted by this action.
    pub fn deletes(&self) -> &[ContentKey] {
        &self.deletes
    }

    pub fn has_inserts(&self) -> bool {
        !self.inserts.is_empty()
    }

    pub fn has_deletes(&self) -> bool {
        !self.deletes.is_empty()
    }

    /// Returns `true` if the action neither inserts nor deletes.
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.deletes.is_empty()
    }
}
