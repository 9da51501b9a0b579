use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum PruneError {
    #[error("account store failure: {source}")]
    Store {
        #[source]
        source: BoxError,
    },
}

impl PruneError {
    pub(crate) fn store<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store {
            source: Box::new(source),
        }
    }
}
