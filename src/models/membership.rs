use crate::error::{DirectoryError, DirectoryResult, MemberFailure};

/// Outcome of a bulk add/remove membership call, one entry per user id in
/// request order.
///
/// Membership changes are applied one call at a time with no rollback, so
/// successful entries are persisted even when others failed.
#[derive(Debug, Default)]
pub struct MembershipReport {
    pub group_id: String,
    pub outcomes: Vec<(String, DirectoryResult<()>)>,
}

impl MembershipReport {
    pub fn new(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            outcomes: Vec::new(),
        }
    }

    pub fn record(&mut self, user_id: impl Into<String>, outcome: DirectoryResult<()>) {
        self.outcomes.push((user_id.into(), outcome));
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|(_, o)| o.is_ok())
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.is_ok())
            .map(|(id, _)| id.as_str())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &DirectoryError)> {
        self.outcomes
            .iter()
            .filter_map(|(id, o)| o.as_ref().err().map(|e| (id.as_str(), e)))
    }

    /// Collapse into the aggregate-error contract: `Ok` only when every id
    /// succeeded, otherwise an `Aggregate` error naming each failed id.
    pub fn into_result(self) -> DirectoryResult<()> {
        let failures: Vec<MemberFailure> = self
            .outcomes
            .into_iter()
            .filter_map(|(user_id, outcome)| {
                outcome.err().map(|e| MemberFailure {
                    user_id,
                    message: e.to_string(),
                })
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DirectoryError::Aggregate(failures))
        }
    }
}
