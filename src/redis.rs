use crate::error::Result;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct RedisClient {
    manager: Arc<Mutex<ConnectionManager>>,
}

impl RedisClient {
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self {
            manager: Arc::new(Mutex::new(manager)),
        })
    }

    // Rate limiting
    pub async fn check_rate_limit(
        &self,
        key: &str,
        limit: u32,
        window_seconds: usize,
    ) -> Result<bool> {
        let mut conn = self.manager.lock().await;
        let key = format!("rate:{}", key);

        let current: Option<u32> = conn.get(&key).await?;

        if current.unwrap_or(0) >= limit {
            tracing::debug!("Rate limit hit for {}", key);
            return Ok(false);
        }

        let _: () = conn.incr(&key, 1).await?;
        let _: () = conn.expire(&key, window_seconds as i64).await?;

        Ok(true)
    }

    // Session management
    pub async fn store_session(
        &self,
        session_id: &str,
        user_id: &str,
        ttl_seconds: usize,
    ) -> Result<()> {
        let mut conn = self.manager.lock().await;
        let key = format!("session:{}", session_id);

        let _: () = conn.set_ex(key, user_id, ttl_seconds as u64).await?;
        Ok(())
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<String>> {
        let mut conn = self.manager.lock().await;
        let key = format!("session:{}", session_id);

        let user_id: Option<String> = conn.get(key).await?;
        Ok(user_id)
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let mut conn = self.manager.lock().await;
        let key = format!("session:{}", session_id);

        let _: () = conn.del(key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
    }

    #[tokio::test]
    #[ignore = "needs a Redis server at REDIS_URL"]
    async fn rate_limit_counts_up_to_the_limit() {
        let client = RedisClient::new(&redis_url()).await.unwrap();
        let key = format!("test:{}", uuid::Uuid::new_v4());

        assert!(client.check_rate_limit(&key, 2, 60).await.unwrap());
        assert!(client.check_rate_limit(&key, 2, 60).await.unwrap());
        assert!(!client.check_rate_limit(&key, 2, 60).await.unwrap());
    }

    #[tokio::test]
    #[ignore = "needs a Redis server at REDIS_URL"]
    async fn unreadable_counter_is_an_error_not_a_pass() {
        let client = RedisClient::new(&redis_url()).await.unwrap();
        let key = format!("test:{}", uuid::Uuid::new_v4());

        let mut raw = Client::open(redis_url())
            .unwrap()
            .get_multiplexed_async_connection()
            .await
            .unwrap();
        let _: () = raw.set_ex(format!("rate:{}", key), "-5", 60).await.unwrap();

        assert!(client.check_rate_limit(&key, 10, 60).await.is_err());
    }
}
