use thiserror::Error;

use crate::model::{CatalogError, IdError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Id(#[from] IdError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
