//! Case records: request bodies, defaults, and list rendering.

pub mod types;

pub use types::{
    decode_body, render_case, CaseUpdate, CreateCaseRequest, CreatedCase, MessageResponse,
    NewCase, DEFAULT_PRIORITY, STATUS_OPEN,
};
