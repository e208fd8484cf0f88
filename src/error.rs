/// The broad class of a service failure.
///
/// Every service error maps to exactly one kind, which is what a request
/// layer needs to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input broke a structural rule, e.g. an empty title.
    Validation,
    /// The referenced entity does not exist.
    NotFound,
    /// The operation would break an invariant, e.g. deleting a category that
    /// still has tasks.
    Conflict,
    /// The database failed or could not be reached.
    Store,
}
