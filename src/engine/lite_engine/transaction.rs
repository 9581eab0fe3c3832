// implements operations defined in Index.cs

use super::*;

impl<SF: StreamFactory> LiteEngine<SF> {
    pub async fn with_transaction<R>(
        &self,
        f: impl AsyncFnOnce(&mut TransactionLiteEngine<SF>) -> Result<R>,
    ) -> Result<R> {
        let mut monitor = self.monitor.borrow_mut();
        let (transaction, _is_new) = monitor.get_or_create_transaction(false).await?;
        let transaction_id = transaction.transaction_id();

        let mut engine = TransactionLiteEngine {
            disk: &self.disk,
            header: &self.header,
            #[cfg(feature = "sequential-index")]
            sequences: &self.sequences,
            transaction: &mut *transaction,
        };

        let outcome = f(&mut engine).await;

        let result = match outcome {
            Ok(result) => {
                transaction.commit().await?;

                #[allow(clippy::collapsible_if)]
                if self.header.borrow().pragmas().checkpoint() > 0 {
                    if self.disk.get_file_length(FileOrigin::Log)
                        > self.header.borrow().pragmas().checkpoint() as u64
                            * crate::engine::PAGE_SIZE as u64
                    {
                        self.wal_index
                            .try_checkpoint(&self.disk, &self.locker)
                            .await?;
                    }
                }
                Ok(result)
            }
            Err(err) => {
                // TODO: check if the error is io error
                transaction.rollback().await?;
                Err(err)
            }
        };

        monitor.release_transaction(transaction_id).await?;

        result
    }
}
