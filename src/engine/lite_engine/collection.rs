// implements operations defined in Collection.cs

use super::*;
use crate::engine::data_service::DataService;
use crate::engine::index_service::IndexService;
use crate::utils::Order;

impl<SF: StreamFactory> LiteEngine<SF> {
    pub fn get_collection_names(&self) -> Vec<String> {
        self.header
            .borrow()
            .collections()
            .map(|x| x.0.to_string())
            .collect()
    }
}

impl<SF: StreamFactory> TransactionLiteEngine<'_, SF> {
    pub async fn drop_collection(&mut self, name: &str) -> Result<bool> {
        let snapshot = self
            .transaction
            .create_snapshot(LockMode::Write, name, false)
            .await?;
        if snapshot.collection_page().is_none() {
            return Ok(false);
        }

        debug_log!(COMMAND: "Drop collection `{}`", name);

        snapshot.trans_pages().borrow_mut().on_commit({
            let name = name.to_string();
            move |h| h.delete_collection(&name)
        });

        let collation = self.header.borrow().pragmas().collation();
        let max_items_count = self.disk.max_items_count();
        let mut parts = snapshot.as_parts();
        let mut indexer = IndexService::new(parts.index_pages, collation, max_items_count);
        let mut data = DataService::new(parts.data_pages, max_items_count);

        // delete every document (and its non-pk index entries) before the
        // collection entry itself disappears from the header on commit.
        let pk_nodes = indexer
            .find_all(parts.collection_page.pk_index(), Order::Ascending)
            .await?
            .iter()
            .map(|node| (node.position(), node.data_block()))
            .collect::<Vec<_>>();

        for (position, data_block) in pk_nodes {
            data.delete(data_block).await?;
            indexer
                .delete_all(position, &mut parts.collection_page)
                .await?;
        }

        self.transaction.safe_point().await?;

        Ok(true)
    }
}

transaction_wrapper!(pub async fn drop_collection(&mut self, name: &str) -> Result<bool>);
