//! Clinical domain tools exposed to the agent.
//!
//! Both tools are pure functions: the renal calculator evaluates a closed-form
//! estimate, the guideline lookups return templated protocol text.

mod guidelines;
mod renal;

pub use guidelines::{clinical_guidelines, retrieve_medical_knowledge};
pub use renal::{
    calculate_renal_function, estimate_gfr, round2, DEFAULT_AGE, DEFAULT_CREATININE,
    DEFAULT_GENDER,
};
