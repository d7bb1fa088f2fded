use serde_json::Value as Json;

use crate::core::{
    credential::CredentialRecord,
    credential_format::ProofType,
    input_descriptor::{Constraints, Directive},
};

use super::{
    error::{PresentationExchangeError, Result},
    field::field_matches,
    reveal::reveal_document,
    PresentationExchange,
};

impl PresentationExchange {
    /// Keep the credentials satisfying `constraints`, in order.
    ///
    /// When the constraints require limited disclosure, the kept credentials
    /// are replaced by derived ones revealing only what the fields select, or
    /// what `reveal_document` marks when given. Inputs are never modified.
    pub async fn filter_constraints(
        &self,
        constraints: &Constraints,
        credentials: &[CredentialRecord],
        reveal_document: Option<&Json>,
    ) -> Result<Vec<CredentialRecord>> {
        self.filter_candidates(constraints, credentials.iter().collect(), reveal_document)
            .await
    }

    pub(crate) async fn filter_candidates(
        &self,
        constraints: &Constraints,
        candidates: Vec<&CredentialRecord>,
        reveal_document: Option<&Json>,
    ) -> Result<Vec<CredentialRecord>> {
        let mut applicable = Vec::with_capacity(candidates.len());
        for credential in candidates {
            if !self.satisfies(constraints, credential).await? {
                tracing::debug!(credential = %credential.id(), "constraints not satisfied");
                continue;
            }

            if constraints.is_limit_disclosure_required() {
                applicable.push(self.disclose(constraints, credential, reveal_document).await?);
            } else {
                applicable.push(credential.clone());
            }
        }
        Ok(applicable)
    }

    async fn satisfies(&self, constraints: &Constraints, credential: &CredentialRecord) -> Result<bool> {
        if constraints.subject_is_issuer() == Some(&Directive::Required)
            && !subject_is_issuer(credential)
        {
            return Ok(false);
        }

        for field in constraints.fields() {
            if !field_matches(field, &credential.value)? {
                return Ok(false);
            }

            // Holder binding applies whatever the directive says.
            let bound = field
                .id()
                .and_then(|id| constraints.holder_directive(id))
                .is_some();
            if bound && !self.holds_subjects(credential).await {
                tracing::debug!(credential = %credential.id(), "holder is not the subject");
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Whether the credential has subjects and the wallet controls all of them.
    async fn holds_subjects(&self, credential: &CredentialRecord) -> bool {
        if credential.subject_ids.is_empty() {
            return false;
        }
        for subject in &credential.subject_ids {
            match self.wallet.get_local_did(subject).await {
                Ok(Some(_)) => {}
                Ok(None) => return false,
                Err(error) => {
                    tracing::warn!("wallet lookup of {subject} failed: {error:#}");
                    return false;
                }
            }
        }
        true
    }

    async fn disclose(
        &self,
        constraints: &Constraints,
        credential: &CredentialRecord,
        reveal_override: Option<&Json>,
    ) -> Result<CredentialRecord> {
        if !self.config.selective_disclosure {
            return Err(PresentationExchangeError::UnsupportedOperation(
                "limited disclosure is required but selective disclosure is disabled".into(),
            ));
        }

        let reveal = match reveal_override {
            Some(frame) => frame.clone(),
            None => reveal_document(&credential.value, constraints)?,
        };

        let proof_type = ProofType::BbsBlsSignatureProof2020;
        let suite = self.signer.suite_for(None, &proof_type).ok_or_else(|| {
            PresentationExchangeError::UnsupportedOperation(format!(
                "limited disclosure is required but no {proof_type} suite is available"
            ))
        })?;

        let derived = self
            .signer
            .derive(&credential.value, &reveal, &suite, self.loader.as_ref())
            .await?;
        tracing::debug!(credential = %credential.id(), "derived selectively disclosed credential");

        Ok(credential.clone().with_value(derived))
    }
}

fn subject_is_issuer(credential: &CredentialRecord) -> bool {
    credential
        .issuer_id
        .as_ref()
        .is_some_and(|issuer| credential.subject_ids.contains(issuer))
}
