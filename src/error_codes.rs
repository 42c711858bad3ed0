//! Chunkgraph-specific error codes
//!
//! Error codes follow the pattern: CGR-{CATEGORY}-{3-digit number}
//!
//! Categories (1-4 uppercase letters):
//! - VAL: Request validation errors (bad parameters, unknown relation types)
//! - DATA: Collaborator availability errors (chunk store, snapshot source)
//! - CMP: Computation errors (projection timeout)
//! - FLAG: Feature gating errors
//! - INT: Unexpected internal errors
//!
//! Each error code is stable and should not be reused.

/// Request failed validation (bad shape or parameters)
pub const CGR_VAL_001_BAD_REQUEST: &str = "CGR-VAL-001";

/// Chunk store or snapshot source is unreachable
pub const CGR_DATA_001_STORE_UNREACHABLE: &str = "CGR-DATA-001";

/// Projection computation exceeded its time ceiling
pub const CGR_CMP_001_PROJECTION_TIMEOUT: &str = "CGR-CMP-001";

/// Feature flag for the graph data service is off
pub const CGR_FLAG_001_FEATURE_DISABLED: &str = "CGR-FLAG-001";

/// Unexpected internal failure
pub const CGR_INT_001_UNEXPECTED: &str = "CGR-INT-001";

/// Error code documentation
///
/// | Code | Description | Remediation |
/// |------|-------------|-------------|
/// | CGR-VAL-001 | Request failed validation | Fix the request parameters; not retryable as-is |
/// | CGR-DATA-001 | Chunk store unreachable | Retry later; check the chunk store |
/// | CGR-CMP-001 | Projection timed out | Retry with a smaller `max_nodes` |
/// | CGR-FLAG-001 | Feature disabled | Enable the graph data feature flag |
/// | CGR-INT-001 | Internal error | Check service logs; report if persistent |
pub const ERROR_CODE_DOCUMENTATION: &str = "Error code documentation available in source";
