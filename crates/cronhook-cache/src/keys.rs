//! Key builders for every entry cronhook writes to the store.

/// Lock key for a job run: `job:<name>`.
pub fn job_lock(job_name: &str) -> String {
    format!("job:{job_name}")
}
