//! Eager request validation.
//!
//! Every request is validated before any expensive work starts; nothing
//! past this step ever sees an invalid request. Relation-type names are
//! parsed into [`crate::schema::RelationType`] upstream (e.g. by the HTTP
//! layer), so unknown names fail at the edge; this module enforces the
//! numeric and filter constraints.

use crate::error::{GraphServiceError, Result};
use crate::schema::{GraphRequest, MAX_NODES_HARD_CAP};

/// Longest accepted document id in a filter
const MAX_DOCUMENT_ID_LEN: usize = 512;

/// Validate a graph request. Returns `Validation` on the first violation.
pub fn validate_request(req: &GraphRequest) -> Result<()> {
    if req.max_nodes == 0 {
        return Err(GraphServiceError::Validation(
            "max_nodes must be positive".into(),
        ));
    }
    if req.max_nodes > MAX_NODES_HARD_CAP {
        return Err(GraphServiceError::Validation(format!(
            "max_nodes {} exceeds the hard cap of {}",
            req.max_nodes, MAX_NODES_HARD_CAP
        )));
    }

    if req.relation_types.is_empty() {
        return Err(GraphServiceError::Validation(
            "relation_types must name at least one of knn, entity, anchor".into(),
        ));
    }

    if let Some(documents) = &req.document_filter {
        if documents.is_empty() {
            return Err(GraphServiceError::Validation(
                "document_filter must not be empty when present".into(),
            ));
        }
        for id in documents {
            if id.is_empty() {
                return Err(GraphServiceError::Validation(
                    "document_filter contains an empty id".into(),
                ));
            }
            if id.len() > MAX_DOCUMENT_ID_LEN {
                return Err(GraphServiceError::Validation(format!(
                    "document id exceeds {} bytes",
                    MAX_DOCUMENT_ID_LEN
                )));
            }
            if id.chars().any(char::is_control) {
                return Err(GraphServiceError::Validation(
                    "document id contains control characters".into(),
                ));
            }
        }
    }

    if let Some(anchor) = &req.anchor_filter {
        if anchor.is_empty() {
            return Err(GraphServiceError::Validation(
                "anchor_filter must not be empty when present".into(),
            ));
        }
    }

    Ok(())
}
