//! This library provides a [DIF Presentation Exchange] engine for DIDComm
//! verifiable credential agents.
//!
//! [DIF Presentation Exchange]: <https://identity.foundation/presentation-exchange/>
//!
//! Given a verifier's [`PresentationDefinition`] and the holder's stored
//! credentials, the engine works out which credentials satisfy which input
//! descriptors, derives selectively disclosed credentials when the definition
//! limits disclosure, and assembles the Verifiable Presentation answering the
//! request together with its [`PresentationSubmission`].
//!
//! [`PresentationDefinition`]: crate::core::presentation_definition::PresentationDefinition
//! [`PresentationSubmission`]: crate::core::presentation_submission::PresentationSubmission
//!
//! # Holder Usage
//!
//! The engine reaches the agent's key material and proof suites through the
//! [`Wallet`] and [`Signer`] traits:
//!
//! ```ignore
//! use didcomm_pres_exch::config::PresentationExchangeConfig;
//! use didcomm_pres_exch::holder::store::InMemoryCredentialStore;
//! use didcomm_pres_exch::presentation_exchange::{PresentationExchange, PresentationOptions};
//!
//! let exchange = PresentationExchange::builder()
//!     .with_wallet(wallet)
//!     .with_signer(signer)
//!     .with_config(PresentationExchangeConfig::from_json_str(config)?)
//!     .build()?;
//!
//! // Read the credentials that may answer the request.
//! let candidates = exchange.retrieve_candidates(&store, &definition).await?;
//!
//! // Select, derive and sign.
//! let presentation = exchange
//!     .create_vp(
//!         &candidates,
//!         &definition,
//!         &PresentationOptions::new(challenge).with_domain(domain),
//!     )
//!     .await?;
//! ```
//!
//! When several credentials are applicable and the agent does not respond
//! automatically, the holder's choice is passed as a [`RecordsFilter`].
//!
//! [`Wallet`]: crate::holder::wallet::Wallet
//! [`Signer`]: crate::holder::signer::Signer
//! [`RecordsFilter`]: crate::presentation_exchange::RecordsFilter
//!
//! # Verifier Usage
//!
//! A received presentation is checked against the definition it answers:
//!
//! ```ignore
//! exchange
//!     .verify_received_presentation(&definition, &presentation)
//!     .await?;
//! ```
//!
//! Proof verification itself belongs to the signature suites; this checks
//! that the submitted credentials satisfy the definition.
//!
//! # Evaluation Overview
//!
//! 1. *Requirements*: submission requirements compile into a
//!    [`Requirement`] tree, where leaves group input descriptors.
//! 2. *Filtering*: per input descriptor, candidates are filtered by schema,
//!    then by the constraints fields, evaluating each [`Filter`] on the values
//!    the field paths select.
//! 3. *Quotas*: a leaf returns its matches only when its quota holds; groups
//!    merge their children's matches, excluding credentials whose participation
//!    breaks the group quota.
//! 4. *Merge*: matched credentials are deduplicated and the descriptor map
//!    points each input descriptor at its credentials' positions.
//!
//! [`Requirement`]: crate::presentation_exchange::Requirement
//! [`Filter`]: crate::core::filter::Filter

pub mod config;
pub mod core;
pub mod holder;
pub mod presentation_exchange;
pub mod utils;
pub use serde_json_path::JsonPath;
