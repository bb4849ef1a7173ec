//! DynamoDB record store

use abstractio_cloud::{
    AttributeValue, CloudError, FieldUpdates, ProviderRecord, RecordQuery, RecordStore, Result,
};
use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{AttributeValue as SdkValue, ReturnValue, Select};
use std::collections::HashMap;

/// DynamoDB-backed [`RecordStore`]
#[derive(Debug, Clone)]
pub struct DynamoDb {
    client: Client,
}

impl DynamoDb {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RecordStore for DynamoDb {
    async fn get_record(&self, table: &str, key: &ProviderRecord) -> Result<Option<ProviderRecord>> {
        let output = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(to_sdk_record(key)))
            .send()
            .await
            .map_err(|e| store_error(table, "getting item", e))?;

        Ok(output.item().map(from_sdk_record))
    }

    async fn put_record(&self, table: &str, record: &ProviderRecord) -> Result<()> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(to_sdk_record(record)))
            .send()
            .await
            .map_err(|e| store_error(table, "creating item", e))?;
        Ok(())
    }

    async fn scan_records(&self, table: &str, attributes: &[String]) -> Result<Vec<ProviderRecord>> {
        let (select, attributes_to_get) = if attributes.is_empty() {
            (Select::AllAttributes, None)
        } else {
            (Select::SpecificAttributes, Some(attributes.to_vec()))
        };

        let mut records = Vec::new();
        let mut start_key = None;
        loop {
            let output = self
                .client
                .scan()
                .table_name(table)
                .select(select.clone())
                .set_attributes_to_get(attributes_to_get.clone())
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| store_error(table, "scanning items", e))?;

            records.extend(output.items().iter().map(from_sdk_record));
            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }
        tracing::debug!(table, count = records.len(), "Scanned DynamoDB table");
        Ok(records)
    }

    async fn query_records(&self, table: &str, query: &RecordQuery) -> Result<Vec<ProviderRecord>> {
        let names: HashMap<String, String> = query.attribute_names().into_iter().collect();
        let values: HashMap<String, SdkValue> = query
            .attribute_values()
            .iter()
            .map(|(placeholder, value)| (placeholder.clone(), to_sdk(value)))
            .collect();

        let mut records = Vec::new();
        let mut start_key = None;
        loop {
            let output = self
                .client
                .query()
                .table_name(table)
                .set_index_name(query.index_name().map(str::to_string))
                .key_condition_expression(query.key_condition_expression())
                .set_expression_attribute_names(Some(names.clone()))
                .set_expression_attribute_values(Some(values.clone()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| store_error(table, "querying items", e))?;

            records.extend(output.items().iter().map(from_sdk_record));
            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }
        tracing::debug!(table, count = records.len(), "Queried DynamoDB table");
        Ok(records)
    }

    async fn update_record(
        &self,
        table: &str,
        key: &ProviderRecord,
        updates: &FieldUpdates,
    ) -> Result<ProviderRecord> {
        let names: HashMap<String, String> = updates.attribute_names().into_iter().collect();
        let values: HashMap<String, SdkValue> = updates
            .attribute_values()
            .iter()
            .map(|(placeholder, value)| (placeholder.clone(), to_sdk(value)))
            .collect();

        let output = self
            .client
            .update_item()
            .table_name(table)
            .set_key(Some(to_sdk_record(key)))
            .update_expression(updates.update_expression())
            .set_condition_expression(updates.condition_expression())
            .set_expression_attribute_names(Some(names))
            .set_expression_attribute_values(Some(values))
            .return_values(ReturnValue::UpdatedNew)
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                let rejected = e
                    .as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception());
                if rejected {
                    tracing::warn!(table, "DynamoDB update condition not met");
                    CloudError::ConditionFailed(message)
                } else {
                    tracing::error!(table, error = %message, "Error while updating a DynamoDB item");
                    CloudError::Store(message)
                }
            })?;

        Ok(output.attributes().map(from_sdk_record).unwrap_or_default())
    }
}

fn store_error(table: &str, action: &str, err: impl std::error::Error) -> CloudError {
    let message = DisplayErrorContext(&err).to_string();
    tracing::error!(table, error = %message, "Error while {} in DynamoDB", action);
    CloudError::Store(message)
}

pub fn to_sdk(value: &AttributeValue) -> SdkValue {
    match value {
        AttributeValue::S(s) => SdkValue::S(s.clone()),
        AttributeValue::N(n) => SdkValue::N(n.clone()),
        AttributeValue::Bool(b) => SdkValue::Bool(*b),
        AttributeValue::Ss(set) => SdkValue::Ss(set.clone()),
    }
}

/// `None` for attribute types cluster records never use (lists, maps, binary, null)
pub fn from_sdk(value: &SdkValue) -> Option<AttributeValue> {
    match value {
        SdkValue::S(s) => Some(AttributeValue::S(s.clone())),
        SdkValue::N(n) => Some(AttributeValue::N(n.clone())),
        SdkValue::Bool(b) => Some(AttributeValue::Bool(*b)),
        SdkValue::Ss(set) => Some(AttributeValue::Ss(set.clone())),
        _ => None,
    }
}

pub fn to_sdk_record(record: &ProviderRecord) -> HashMap<String, SdkValue> {
    record
        .iter()
        .map(|(field, value)| (field.clone(), to_sdk(value)))
        .collect()
}

pub fn from_sdk_record(item: &HashMap<String, SdkValue>) -> ProviderRecord {
    item.iter()
        .filter_map(|(field, value)| match from_sdk(value) {
            Some(converted) => Some((field.clone(), converted)),
            None => {
                tracing::debug!(field = %field, "Skipping attribute of unsupported type");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_conversion() {
        let record = ProviderRecord::from([
            ("id".to_string(), AttributeValue::s("c-1")),
            ("port".to_string(), AttributeValue::n(8080)),
            ("has_ip".to_string(), AttributeValue::Bool(false)),
            (
                "env_variables".to_string(),
                AttributeValue::Ss(vec!["A=1".to_string()]),
            ),
        ]);

        let sdk = to_sdk_record(&record);
        assert_eq!(sdk["port"], SdkValue::N("8080".to_string()));
        assert_eq!(from_sdk_record(&sdk), record);
    }

    #[test]
    fn test_unsupported_attributes_are_skipped() {
        let item = HashMap::from([
            ("id".to_string(), SdkValue::S("c-1".to_string())),
            ("tags".to_string(), SdkValue::L(vec![SdkValue::Null(true)])),
            ("deleted_at".to_string(), SdkValue::Null(true)),
        ]);

        let record = from_sdk_record(&item);
        assert_eq!(record.len(), 1);
        assert_eq!(record["id"], AttributeValue::s("c-1"));
    }
}
