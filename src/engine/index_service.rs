use crate::engine::collection_index::CollectionIndex;
use crate::engine::index_node::{IndexNode, IndexNodeMut};
use crate::engine::pages::{CollectionIndexRef, CollectionIndexesMut, CollectionIndexesPartialBorrow};
use crate::engine::snapshot::SnapshotIndexPages;
use crate::engine::utils::{PartialBorrower, PartialRefMut};
use crate::engine::{IndexPage, MAX_LEVEL_LENGTH, PageAddress, StreamFactory};
use crate::expression::BsonExpression;
use crate::utils::{Collation, Order};
use crate::{Result, bson};
use std::cmp::Ordering;
use std::collections::HashSet;

pub(crate) type IndexNodeMutRef<'snapshot> = PartialRefMut<IndexNodeMut<'snapshot>, PageAddress>;

/// Skip-list index operations over a single collection's index pages.
///
/// Node keys are always kept in ascending order regardless of the `Order`
/// a caller scans with; `Order` only selects which sentinel a walk starts
/// from and which of `prev`/`next` it follows.
pub(crate) struct IndexService<'snapshot, SF: StreamFactory> {
    pages: PartialIndexNodeAccessorMut<'snapshot, SF>,
    collation: Collation,
    max_item_count: u32,
}

impl<'snapshot, SF: StreamFactory> IndexService<'snapshot, SF> {
    pub fn new(
        pages: SnapshotIndexPages<'snapshot, SF>,
        collation: Collation,
        max_item_count: u32,
    ) -> Self {
        Self {
            pages: PartialIndexNodeAccessorMut::new(pages),
            collation,
            max_item_count,
        }
    }
}

impl<SF: StreamFactory> IndexService<'_, SF> {
    pub fn collation(&self) -> &Collation {
        &self.collation
    }

    /// Creates a brand-new index: a fresh index page holding only the head
    /// (`MinValue`) and tail (`MaxValue`) sentinel nodes, fully linked at
    /// every level, and registers it on the collection.
    pub async fn create_index<'c>(
        &mut self,
        name: &str,
        expression: BsonExpression,
        unique: bool,
        collection_indexes: &mut CollectionIndexesPartialBorrow<'c>,
    ) -> Result<CollectionIndexRef<'c>> {
        let mut index = collection_indexes.insert_collection_index(name, expression, unique)?;
        let slot = index.slot();

        let levels = MAX_LEVEL_LENGTH;
        let length = IndexNode::get_node_length(levels, &bson::Value::MinValue);

        let index_page = self.pages.snapshot_mut().new_page().await?;

        let head = index_page.insert_index_node(
            slot,
            levels,
            bson::Value::MinValue,
            PageAddress::EMPTY,
            length,
        );
        let head_position = head.position();

        let mut tail = index_page.insert_index_node(
            slot,
            levels,
            bson::Value::MaxValue,
            PageAddress::EMPTY,
            length,
        );
        let tail_position = tail.position();

        for level in 0..levels {
            tail.set_prev(level, head_position);
        }

        let mut head = index_page.get_index_node_mut(head_position.index())?;
        for level in 0..levels {
            head.set_next(level, tail_position);
        }

        index_page.set_page_list_slot(0);
        let page_id = index_page.page_id();

        index.set_free_index_page_list(page_id);
        index.set_head(head_position);
        index.set_tail(tail_position);

        Ok(index)
    }

    /// Removes an entire index's node chain (all real nodes plus both
    /// sentinels). The `CollectionIndex` entry itself is removed by the
    /// caller once this returns.
    pub async fn drop_index(
        &mut self,
        collection_page: &mut CollectionIndexesMut<'_>,
        name: &str,
    ) -> Result<()> {
        let (head, tail) = {
            let index = collection_page.get(name).expect("index must exist");
            (index.head(), index.tail())
        };

        let mut current = {
            let head_node = self.get_node(head).await?;
            head_node.get_next(0)
        };

        while current != tail {
            let node = self.get_node_data(current).await?;
            let next = node.get_next(0);
            self.delete_single_node(node).await?;
            current = next;
        }

        self.remove_node(head).await?;
        self.remove_node(tail).await?;

        Ok(())
    }

    /// Collects every non-sentinel node, in the requested order.
    pub async fn find_all(
        &mut self,
        index: &CollectionIndex,
        order: Order,
    ) -> Result<Vec<IndexNodeMutRef<'_>>> {
        let start = match order {
            Order::Ascending => index.head(),
            Order::Descending => index.tail(),
        };

        let mut next_addr = {
            let start_node = self.get_node(start).await?;
            start_node.get_next_prev(0, order)
        };

        let mut nodes = vec![];

        while !next_addr.is_empty() {
            let node = self.get_node(next_addr).await?;
            if matches!(node.key(), bson::Value::MinValue | bson::Value::MaxValue) {
                break;
            }
            next_addr = node.get_next_prev(0, order);
            nodes.push(node);
        }

        Ok(nodes)
    }

    /// Descends the skip list from its top level looking for `value`.
    ///
    /// With `sibling = false`, returns only an exact match. With
    /// `sibling = true`, returns the first node at-or-past `value` in the
    /// scan direction (used to find an insertion/deletion neighbor).
    pub async fn find(
        &mut self,
        index: &CollectionIndex,
        value: &bson::Value,
        sibling: bool,
        order: Order,
    ) -> Result<Option<IndexNodeMutRef<'_>>> {
        let start = match order {
            Order::Ascending => index.head(),
            Order::Descending => index.tail(),
        };

        let mut left_addr = start;

        for level in (0..MAX_LEVEL_LENGTH).rev() {
            loop {
                let right_addr = {
                    let left = self.get_node(left_addr).await?;
                    left.get_next_prev(level, order)
                };
                if right_addr.is_empty() {
                    break;
                }

                let right = self.get_node(right_addr).await?;
                let diff = self.collation.compare_values(right.key(), value);

                let overshot = match order {
                    Order::Ascending => diff != Ordering::Less,
                    Order::Descending => diff != Ordering::Greater,
                };

                if diff == Ordering::Equal {
                    return Ok(Some(right));
                }

                if overshot {
                    if level == 0 && sibling {
                        if matches!(right.key(), bson::Value::MinValue | bson::Value::MaxValue) {
                            return Ok(None);
                        }
                        return Ok(Some(right));
                    }
                    break;
                }

                left_addr = right_addr;
            }
        }

        Ok(None)
    }

    /// Inserts a new key into the skip list, choosing a random level count
    /// and splicing the node in one level at a time. `last`, if given, is
    /// chained to the new node via `next_node` (the per-document index-node
    /// list, distinct from skip-list pointers).
    pub async fn add_node(
        &mut self,
        index: &mut CollectionIndex,
        key: bson::Value,
        data_block: PageAddress,
        last: Option<&mut IndexNodeMutRef<'_>>,
    ) -> Result<IndexNodeMutRef<'_>> {
        let levels = self.flip_coin();
        let length = IndexNode::get_node_length(levels, &key);

        let mut left_addrs = vec![PageAddress::EMPTY; levels as usize];
        {
            let mut left_addr = index.head();
            for level in (0..MAX_LEVEL_LENGTH).rev() {
                loop {
                    let right_addr = {
                        let left = self.get_node(left_addr).await?;
                        left.get_next(level)
                    };
                    if right_addr.is_empty() {
                        break;
                    }

                    let is_less = {
                        let right = self.get_node(right_addr).await?;
                        self.collation.compare_values(right.key(), &key) == Ordering::Less
                    };
                    if !is_less {
                        break;
                    }

                    left_addr = right_addr;
                }
                if level < levels {
                    left_addrs[level as usize] = left_addr;
                }
            }
        }

        let free_index_page_list = index.free_index_page_list();
        let (new_position, new_page_id) = {
            let page = self
                .pages
                .snapshot_mut()
                .get_free_index_page(length, free_index_page_list)
                .await?;
            let page_id = page.page_id();
            let node = page.insert_index_node(index.slot(), levels, key, data_block, length);
            (node.position(), page_id)
        };
        self.pages
            .snapshot_mut()
            .add_or_remove_free_index_list(new_page_id, index.free_index_page_list_mut())
            .await?;

        for level in 0..levels {
            let left_addr = left_addrs[level as usize];

            let next_addr = {
                let mut left = self.get_node_mut(left_addr).await?;
                let next_addr = left.get_next(level);
                left.set_next(level, new_position);
                next_addr
            };

            if !next_addr.is_empty() {
                let mut next = self.get_node_mut(next_addr).await?;
                next.set_prev(level, new_position);
            }

            let mut new_node = self.get_node_mut(new_position).await?;
            new_node.set_prev(level, left_addr);
            new_node.set_next(level, next_addr);
        }

        if let Some(last) = last {
            last.set_next_node(new_position);
        }

        self.get_node_mut(new_position).await
    }

    pub async fn get_node(&mut self, address: PageAddress) -> Result<IndexNodeMutRef<'_>> {
        self.pages.get_node_mut(address).await
    }

    async fn get_node_mut(&mut self, address: PageAddress) -> Result<IndexNodeMutRef<'_>> {
        self.pages.get_node_mut(address).await
    }

    pub async fn get_node_opt(
        &mut self,
        address: PageAddress,
    ) -> Result<Option<IndexNodeMutRef<'_>>> {
        self.pages.get_node_opt(address).await
    }

    async fn get_node_data(&mut self, address: PageAddress) -> Result<IndexNode> {
        let node = self.get_node(address).await?;
        Ok(node.to_read_only())
    }

    /// Follows the per-document `next_node` chain starting at `start_address`
    /// (inclusive), returning every node along it.
    pub async fn get_node_list(&mut self, start_address: PageAddress) -> Result<Vec<IndexNode>> {
        let mut nodes = vec![];
        let mut current = start_address;

        while !current.is_empty() {
            let node = self.get_node_data(current).await?;
            current = node.next_node();
            nodes.push(node);
        }

        Ok(nodes)
    }

    async fn remove_node(&mut self, address: PageAddress) -> Result<()> {
        self.pages.remove_node(address).await
    }

    async fn delete_single_node(&mut self, node: IndexNode) -> Result<()> {
        for level in (0..node.levels()).rev() {
            let prev_addr = node.get_prev(level);
            let next_addr = node.get_next(level);

            if !prev_addr.is_empty() {
                let mut prev = self.get_node_mut(prev_addr).await?;
                prev.set_next(level, next_addr);
            }

            if !next_addr.is_empty() {
                let mut next = self.get_node_mut(next_addr).await?;
                next.set_prev(level, prev_addr);
            }
        }

        self.remove_node(node.position()).await
    }

    /// Walks the per-document node chain starting at `position`, deleting
    /// every node whose owning index name is in `to_delete` from the skip
    /// list, and returns the last surviving node in the chain (so new nodes
    /// can be spliced back in after it).
    pub async fn delete_list(
        &mut self,
        position: PageAddress,
        to_delete: HashSet<String>,
        indexes: &mut CollectionIndexesMut<'_>,
    ) -> Result<IndexNodeMutRef<'_>> {
        let slots = indexes.get_collection_indexes_slots();

        let mut current = position;
        let mut survivor = None;

        loop {
            let node = self.get_node_data(current).await?;
            let next = node.next_node();

            let name = slots
                .get(node.slot() as usize)
                .and_then(|x| *x)
                .map(|x| x.name().to_string());

            let should_delete = name.is_some_and(|name| to_delete.contains(&name));

            if should_delete {
                self.delete_single_node(node).await?;
            } else {
                survivor = Some(current);
            }

            if next.is_empty() {
                break;
            }
            current = next;
        }

        let survivor = survivor.expect("at least the PK node always survives");
        self.get_node_mut(survivor).await
    }

    /// Deletes every index node chained off the document at `position`
    /// (used when the whole document is removed, not just updated).
    pub async fn delete_all(
        &mut self,
        position: PageAddress,
        indexes: &mut CollectionIndexesMut<'_>,
    ) -> Result<()> {
        let names = indexes
            .values()
            .map(|x| x.name().to_string())
            .collect::<HashSet<_>>();
        self.delete_list(position, names, indexes).await?;
        Ok(())
    }

    /// Classic 1/2-probability skip-list level count, capped at
    /// `MAX_LEVEL_LENGTH`.
    fn flip_coin(&self) -> u8 {
        let mut levels = 1;
        while levels < MAX_LEVEL_LENGTH && rand::random::<bool>() {
            levels += 1;
        }
        levels
    }
}

pub(crate) struct PartialIndexNodeAccessorMut<'snapshot, SF: StreamFactory> {
    inner: PartialBorrower<SnapshotIndexPages<'snapshot, SF>, PageAddress>,
}

impl<'snapshot, SF: StreamFactory> PartialIndexNodeAccessorMut<'snapshot, SF> {
    fn new(pages: SnapshotIndexPages<'snapshot, SF>) -> Self {
        Self {
            inner: PartialBorrower::new(pages),
        }
    }

    fn snapshot_mut(&mut self) -> &mut SnapshotIndexPages<'snapshot, SF> {
        self.inner.target_mut()
    }

    async fn get_node_mut(&mut self, address: PageAddress) -> Result<IndexNodeMutRef<'snapshot>> {
        Ok(self
            .get_node_opt(address)
            .await?
            .expect("index node not found"))
    }

    async fn get_node_opt(
        &mut self,
        address: PageAddress,
    ) -> Result<Option<IndexNodeMutRef<'snapshot>>> {
        if address.is_empty() {
            return Ok(None);
        }

        unsafe {
            Ok(Some(
                self.inner
                    .try_get_borrow_async::<_, _, crate::Error>(
                        address,
                        async |pages: &mut SnapshotIndexPages<SF>, address| {
                            Ok(pages
                                .get_page(address.page_id())
                                .await?
                                .get_index_node_mut(address.index())?)
                        },
                    )
                    .await?,
            ))
        }
    }

    async fn remove_node(&mut self, address: PageAddress) -> Result<()> {
        unsafe {
            self.inner
                .try_delete_borrow_async(
                    address,
                    async |pages: &mut SnapshotIndexPages<SF>, address| {
                        let page = pages.get_page(address.page_id()).await?;
                        page.delete_index_node(address.index());
                        Ok(())
                    },
                )
                .await
        }
    }
}
