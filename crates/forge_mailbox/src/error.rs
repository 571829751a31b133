/// Errors surfaced by [`crate::Xchan`] and [`crate::Mailbox`] writers.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The channel's input side is closed, or the write was cancelled via
    /// context.
    #[error("mailbox is closed")]
    Closed,
}
