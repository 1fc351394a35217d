//! List and pub/sub commands used by the job subsystem.

use std::time::Instant;

use redis::AsyncCommands;
use tracing::debug;

use sources_core::result::AppResult;

use super::client::RedisClient;

impl RedisClient {
    /// Append a value to the tail of a list. Returns the new list length.
    pub async fn push_back(&self, list: &str, value: &[u8]) -> AppResult<u64> {
        let mut conn = self.conn_mut();
        let len: u64 = conn.rpush(list, value).await.map_err(Self::map_err)?;
        debug!(list, len, "Pushed value onto list");
        Ok(len)
    }

    /// Pop the head of a list, blocking up to the configured pop timeout.
    ///
    /// Returns `None` when the timeout expires with the list still empty.
    pub async fn pop_front_blocking(&self, list: &str) -> AppResult<Option<Vec<u8>>> {
        let mut conn = self.blocking_conn();
        let reply: Option<(String, Vec<u8>)> = redis::cmd("BLPOP")
            .arg(list)
            .arg(self.pop_timeout().as_secs())
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(reply.map(|(_, value)| value))
    }

    /// Length of a list.
    pub async fn list_len(&self, list: &str) -> AppResult<u64> {
        let mut conn = self.conn_mut();
        conn.llen(list).await.map_err(Self::map_err)
    }

    /// Publish a message on a channel. Returns the number of receivers.
    pub async fn publish(&self, channel: &str, message: &str) -> AppResult<u64> {
        let mut conn = self.conn_mut();
        conn.publish(channel, message).await.map_err(Self::map_err)
    }

    /// Send a PING and return the round-trip time in milliseconds.
    pub async fn ping(&self) -> AppResult<u128> {
        let mut conn = self.conn_mut();
        let started = Instant::now();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(started.elapsed().as_millis())
    }
}
