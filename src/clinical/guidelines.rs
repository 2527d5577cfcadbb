//! Static treatment protocol lookups.

/// Treatment protocol for a condition.
pub fn clinical_guidelines(condition: &str) -> String {
    format!(
        "Protocol for {}: 1. Lifestyle changes, 2. First-line: ACE Inhibitors.",
        condition.trim()
    )
}

/// Knowledge-base lookup for a medical term or symptom.
pub fn retrieve_medical_knowledge(query: &str) -> String {
    format!("Retrieved: Protocol for {} suggests...", query.trim())
}
