//! In-memory client that records statements and replays canned rows.

use crate::client::GenericClient;
use crate::error::{OrmError, OrmResult};
use crate::record::Record;
use crate::value::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub(crate) struct RecordingClient {
    statements: Mutex<Vec<(String, Vec<Value>)>>,
    responses: Mutex<VecDeque<OrmResult<Vec<Record>>>>,
    in_transaction: bool,
}

impl RecordingClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A client that reports an already open transaction.
    pub(crate) fn inside_transaction() -> Self {
        Self {
            in_transaction: true,
            ..Self::default()
        }
    }

    /// Queue the rows returned by the next `query`/`execute` call.
    pub(crate) fn respond(&self, rows: Vec<Record>) -> &Self {
        self.responses.lock().unwrap().push_back(Ok(rows));
        self
    }

    pub(crate) fn fail_next(&self, message: &str) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(OrmError::Other(message.to_string())));
        self
    }

    pub(crate) fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.statements.lock().unwrap().clone()
    }

    pub(crate) fn sql(&self) -> Vec<String> {
        self.statements().into_iter().map(|(sql, _)| sql).collect()
    }

    pub(crate) fn count(&self) -> usize {
        self.statements.lock().unwrap().len()
    }

    fn record(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Record>> {
        self.statements
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

impl GenericClient for RecordingClient {
    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Record>> {
        self.record(sql, params)
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        self.record(sql, params).map(|rows| rows.len() as u64)
    }
}
