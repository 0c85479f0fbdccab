pub type SessionId = u64;
pub type DeltaSeq = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeScope {
    Document,
    ShadowRoot,
    SubDocument,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DialogState {
    Open,
    Modal,
}
