use crate::domain::ports::MigrationContext;
use crate::utils::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    UpToDate,
    Applied(Vec<String>),
    Failed(String),
}

/// Brings `context` up to date. A failure is logged and, unless `fail_on_error`
/// is set, reported as [`MigrationOutcome::Failed`] instead of an error.
pub async fn ensure_migrated<C>(context: &C, fail_on_error: bool) -> Result<MigrationOutcome>
where
    C: MigrationContext + ?Sized,
{
    match try_migrate(context).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            tracing::error!("An error occurred migrating {}: {}", context.name(), e);
            if fail_on_error {
                Err(e)
            } else {
                Ok(MigrationOutcome::Failed(e.to_string()))
            }
        }
    }
}

async fn try_migrate<C>(context: &C) -> Result<MigrationOutcome>
where
    C: MigrationContext + ?Sized,
{
    let pending = context.pending_migrations().await?;
    if pending.is_empty() {
        tracing::info!("{} schema is up to date", context.name());
        return Ok(MigrationOutcome::UpToDate);
    }

    for migration in &pending {
        tracing::info!("applying migration {} to {}", migration, context.name());
    }
    context.migrate().await?;
    tracing::info!("{} migrated ({} applied)", context.name(), pending.len());
    Ok(MigrationOutcome::Applied(pending))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::BootcampError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeContext {
        pending: Vec<String>,
        fail: bool,
        runs: AtomicUsize,
    }

    #[async_trait]
    impl MigrationContext for FakeContext {
        fn name(&self) -> &str {
            "FakeContext"
        }

        async fn pending_migrations(&self) -> Result<Vec<String>> {
            Ok(self.pending.clone())
        }

        async fn migrate(&self) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(BootcampError::config("disk full"))
            } else {
                Ok(())
            }
        }
    }

    fn context(pending: &[&str], fail: bool) -> FakeContext {
        FakeContext {
            pending: pending.iter().map(|s| s.to_string()).collect(),
            fail,
            runs: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_up_to_date_skips_migrate() {
        let ctx = context(&[], false);
        assert_eq!(ensure_migrated(&ctx, false).await.unwrap(), MigrationOutcome::UpToDate);
        assert_eq!(ctx.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pending_are_applied() {
        let ctx = context(&["1_create_products"], false);
        assert_eq!(
            ensure_migrated(&ctx, false).await.unwrap(),
            MigrationOutcome::Applied(vec!["1_create_products".to_string()])
        );
        assert_eq!(ctx.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_tolerated_unless_required() {
        let ctx = context(&["1_create_products"], true);
        assert!(matches!(
            ensure_migrated(&ctx, false).await.unwrap(),
            MigrationOutcome::Failed(_)
        ));
        assert!(ensure_migrated(&ctx, true).await.is_err());
    }
}
