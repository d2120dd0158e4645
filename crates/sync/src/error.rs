use core::fmt::{self, Display};

#[derive(Debug)]
pub enum Error {
    /// The class has no questions at all; nothing can be selected.
    EmptyPool,
    /// `hydrate` was called after a local edit had already been applied.
    AlreadyMutated,
    /// A read or write against the backend failed terminally.
    Backend(client::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPool => f.write_str("The question pool for this class is empty."),
            Self::AlreadyMutated => f.write_str("The view already has local edits; hydrate must come first."),
            Self::Backend(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<client::Error> for Error {
    fn from(err: client::Error) -> Self {
        Self::Backend(err)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
