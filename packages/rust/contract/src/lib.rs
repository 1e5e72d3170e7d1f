//! Structured-output contracts for model responses.
//!
//! A contract declares the shape a response must have ([`Schema`]), renders
//! that shape into prompt instructions, and turns raw model text into a
//! validated domain value or a [`ParseFailure`](campaignsmith_shared::ParseFailure).

pub mod contracts;
pub mod extract;
mod fields;
pub mod schema;

pub use contracts::{
    BlogPostContract, EmailDraftContract, EvaluationContract, IdeaEvaluationsContract,
    IdeaPoolContract, ResponseContract, SocialPostsContract,
};
pub use extract::{extract_tagged, parse_object};
pub use schema::{FieldKind, FieldSpec, Schema};
