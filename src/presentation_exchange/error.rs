use thiserror::Error;

/// Errors of the presentation exchange engine.
#[derive(Debug, Error)]
pub enum PresentationExchangeError {
    /// The presentation definition is malformed.
    #[error("invalid presentation definition: {0}")]
    Definition(String),

    /// No combination of the candidate credentials satisfies the requirements.
    #[error("no credentials satisfy {0}")]
    NoCandidates(String),

    /// Several credentials are applicable and the holder must choose.
    #[error("{0} credentials are applicable, select the credentials to present")]
    AmbiguousSelection(usize),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("`{0}` selects proof values, which cannot be filtered")]
    ProofPathNotFilterable(String),

    #[error("invalid JSONPath `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },

    /// The applicable credentials are not all about the same subject.
    #[error("applicable credentials have different credential subjects, a presentation is signed for one subject")]
    MultipleSubjects,

    #[error("signing DID `{0}` is not controlled by the wallet")]
    UnknownSigningDid(String),

    /// A received presentation does not satisfy the definition.
    #[error("presentation rejected: {0}")]
    Verification(String),

    /// A wallet, signer, store or document loader failure.
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),

    #[error("presentation definition `{definition_id}`: {source}")]
    InDefinition {
        definition_id: String,
        #[source]
        source: Box<PresentationExchangeError>,
    },
}

pub type Result<T, E = PresentationExchangeError> = std::result::Result<T, E>;

impl PresentationExchangeError {
    /// The error kind, looking through definition context.
    pub fn root(&self) -> &Self {
        match self {
            Self::InDefinition { source, .. } => source.root(),
            other => other,
        }
    }

    pub(crate) fn in_definition(self, definition_id: &str) -> Self {
        match self {
            already @ Self::InDefinition { .. } => already,
            other => Self::InDefinition {
                definition_id: definition_id.to_owned(),
                source: Box::new(other),
            },
        }
    }

    pub(crate) fn invalid_path(path: &str, reason: impl ToString) -> Self {
        Self::InvalidPath {
            path: path.to_owned(),
            reason: reason.to_string(),
        }
    }
}
