/// Outcome of an idempotent provisioning attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProvisionOutcome {
    /// The privileged operation succeeded.
    Created,
    /// The operation failed but the resource is already there; nothing to do.
    AlreadyPresent,
    /// The operation failed and the resource is absent or unverifiable.
    Failed,
}

/// Classifies a two-phase "create, then check existence on failure" attempt.
///
/// `present_after_failure` is the existence probe's verdict, or `None` when
/// the probe itself failed. Both a failed probe and a confirmed absence mean
/// the original failure stands; only a confirmed presence downgrades it to a
/// no-op. This keeps the decision out of driver-specific error strings.
pub(crate) fn classify_provision(
    creation_succeeded: bool,
    present_after_failure: Option<bool>,
) -> ProvisionOutcome {
    match (creation_succeeded, present_after_failure) {
        (true, _) => ProvisionOutcome::Created,
        (false, Some(true)) => ProvisionOutcome::AlreadyPresent,
        (false, _) => ProvisionOutcome::Failed,
    }
}
