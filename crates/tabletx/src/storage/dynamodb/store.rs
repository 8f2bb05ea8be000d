//! DynamoDB store implementation.
//!
//! Implements `tabletx_core::store::Store` on top of `aws-sdk-dynamodb`.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_dynamodb::types::{
    Delete, KeysAndAttributes, Put, TransactWriteItem, Update,
};
use aws_sdk_dynamodb::Client;
use tracing::debug;

use tabletx_core::store::{
    BatchGetInput, BatchGetOutput, GetItemInput, Page, QueryInput, Result, ScanInput, Store,
    WriteOperation,
};
use tabletx_core::Item;

use super::conversions::{
    attributes_to_item, attributes_to_key, item_to_attributes, key_to_attributes,
    values_to_attributes, AttributeMap,
};
use super::error::{
    map_batch_get_item_error, map_build_error, map_get_item_error, map_query_error,
    map_scan_error, map_transact_write_error,
};
use crate::config::Config;

/// DynamoDB-backed store.
#[derive(Debug, Clone)]
pub struct DynamoDbStore {
    client: Client,
}

impl DynamoDbStore {
    /// Creates a store with the given DynamoDB client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Creates a store from configuration.
    ///
    /// Uses the AWS SDK default credential chain with the configured region
    /// and, when set, a custom endpoint such as DynamoDB Local.
    pub async fn from_config(config: &Config) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));
        if let Some(endpoint_url) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        let sdk_config = loader.load().await;
        debug!(region = %config.region, endpoint = ?config.endpoint_url, "Created DynamoDB store");
        Self::new(Client::new(&sdk_config))
    }
}

fn items_from(items: &[AttributeMap]) -> Result<Vec<Item>> {
    items.iter().map(attributes_to_item).collect()
}

fn limit_from(limit: Option<usize>) -> Option<i32> {
    limit.map(|limit| i32::try_from(limit).unwrap_or(i32::MAX))
}

fn transact_item(operation: WriteOperation) -> Result<TransactWriteItem> {
    let item = match operation {
        WriteOperation::Put(op) => TransactWriteItem::builder().put(
            Put::builder()
                .table_name(op.table_name)
                .set_item(Some(item_to_attributes(&op.item)))
                .set_condition_expression(op.condition)
                .set_expression_attribute_names(op.attribute_names.map(|n| n.into_iter().collect()))
                .set_expression_attribute_values(values_to_attributes(op.attribute_values.as_ref()))
                .build()
                .map_err(map_build_error)?,
        ),
        WriteOperation::Update(op) => TransactWriteItem::builder().update(
            Update::builder()
                .table_name(op.table_name)
                .set_key(Some(key_to_attributes(&op.key)))
                .update_expression(op.update)
                .set_condition_expression(op.condition)
                .set_expression_attribute_names(op.attribute_names.map(|n| n.into_iter().collect()))
                .set_expression_attribute_values(values_to_attributes(op.attribute_values.as_ref()))
                .build()
                .map_err(map_build_error)?,
        ),
        WriteOperation::Delete(op) => TransactWriteItem::builder().delete(
            Delete::builder()
                .table_name(op.table_name)
                .set_key(Some(key_to_attributes(&op.key)))
                .set_condition_expression(op.condition)
                .set_expression_attribute_names(op.attribute_names.map(|n| n.into_iter().collect()))
                .set_expression_attribute_values(values_to_attributes(op.attribute_values.as_ref()))
                .build()
                .map_err(map_build_error)?,
        ),
    };
    Ok(item.build())
}

#[async_trait]
impl Store for DynamoDbStore {
    async fn get_item(&self, input: GetItemInput) -> Result<Option<Item>> {
        let output = self
            .client
            .get_item()
            .table_name(&input.table_name)
            .set_key(Some(key_to_attributes(&input.key)))
            .consistent_read(input.consistent_read)
            .send()
            .await
            .map_err(map_get_item_error)?;

        output.item.as_ref().map(attributes_to_item).transpose()
    }

    async fn batch_get_items(&self, input: BatchGetInput) -> Result<BatchGetOutput> {
        let request = KeysAndAttributes::builder()
            .set_keys(Some(input.keys.iter().map(key_to_attributes).collect()))
            .consistent_read(input.consistent_read)
            .build()
            .map_err(map_build_error)?;

        let output = self
            .client
            .batch_get_item()
            .request_items(&input.table_name, request)
            .send()
            .await
            .map_err(map_batch_get_item_error)?;

        let items = match output.responses.as_ref().and_then(|r| r.get(&input.table_name)) {
            Some(items) => items_from(items)?,
            None => Vec::new(),
        };
        let unprocessed_keys = match output
            .unprocessed_keys
            .as_ref()
            .and_then(|u| u.get(&input.table_name))
        {
            Some(unprocessed) => unprocessed
                .keys()
                .iter()
                .map(attributes_to_key)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(BatchGetOutput {
            items,
            unprocessed_keys,
        })
    }

    async fn query(&self, input: QueryInput) -> Result<Page> {
        let output = self
            .client
            .query()
            .table_name(input.table_name)
            .set_index_name(input.index_name)
            .consistent_read(input.consistent_read)
            .key_condition_expression(input.key_condition)
            .set_filter_expression(input.filter)
            .set_expression_attribute_names(input.attribute_names.map(|n| n.into_iter().collect()))
            .set_expression_attribute_values(values_to_attributes(input.attribute_values.as_ref()))
            .set_exclusive_start_key(input.exclusive_start_key.as_ref().map(key_to_attributes))
            .set_limit(limit_from(input.limit))
            .scan_index_forward(input.scan_index_forward)
            .send()
            .await
            .map_err(map_query_error)?;

        Ok(Page {
            items: items_from(output.items())?,
            last_evaluated_key: output
                .last_evaluated_key
                .as_ref()
                .map(attributes_to_key)
                .transpose()?,
        })
    }

    async fn scan(&self, input: ScanInput) -> Result<Page> {
        let output = self
            .client
            .scan()
            .table_name(input.table_name)
            .set_index_name(input.index_name)
            .consistent_read(input.consistent_read)
            .set_filter_expression(input.filter)
            .set_expression_attribute_names(input.attribute_names.map(|n| n.into_iter().collect()))
            .set_expression_attribute_values(values_to_attributes(input.attribute_values.as_ref()))
            .set_exclusive_start_key(input.exclusive_start_key.as_ref().map(key_to_attributes))
            .set_limit(limit_from(input.limit))
            .send()
            .await
            .map_err(map_scan_error)?;

        Ok(Page {
            items: items_from(output.items())?,
            last_evaluated_key: output
                .last_evaluated_key
                .as_ref()
                .map(attributes_to_key)
                .transpose()?,
        })
    }

    async fn transact_write(&self, operations: Vec<WriteOperation>) -> Result<()> {
        let count = operations.len();
        let items = operations
            .into_iter()
            .map(transact_item)
            .collect::<Result<Vec<_>>>()?;

        self.client
            .transact_write_items()
            .set_transact_items(Some(items))
            .send()
            .await
            .map_err(map_transact_write_error)?;

        debug!(operations = count, "Transaction committed");
        Ok(())
    }
}
