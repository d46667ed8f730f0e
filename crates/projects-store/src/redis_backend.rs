//! Redis implementation of [`KvBackend`]
//!
//! Holds an r2d2 pool of synchronous Redis connections. Each backend call
//! leases one connection for a single command and returns it to the pool.
//! The pool is built lazily, so an unreachable server surfaces as a
//! connectivity error on the first request rather than at startup.

use projects_domain::codec::FieldMap;
use projects_domain::{BackendError, KvBackend};
use redis::{Commands, ConnectionAddr, ConnectionInfo, RedisConnectionInfo, RedisError};
use std::collections::HashMap;

/// Connection settings for [`RedisBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisOptions {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Password, if the server requires AUTH
    pub password: Option<String>,
    /// Maximum pooled connections
    pub pool_size: u32,
}

impl RedisOptions {
    /// Connection settings for the client, database 0
    ///
    /// The password is passed through as-is, so it may contain characters
    /// that are reserved in a URL.
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: RedisConnectionInfo {
                password: self.password.clone().filter(|p| !p.is_empty()),
                ..RedisConnectionInfo::default()
            },
        }
    }
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            pool_size: 100,
        }
    }
}

/// Pooled Redis backend
pub struct RedisBackend {
    pool: r2d2::Pool<redis::Client>,
}

impl RedisBackend {
    /// Create the backend. Fails only on malformed options.
    pub fn connect(options: &RedisOptions) -> Result<Self, BackendError> {
        let client = redis::Client::open(options.connection_info())
            .map_err(|e| BackendError::Connection(format!("invalid redis options: {}", e)))?;

        let pool = r2d2::Pool::builder()
            .max_size(options.pool_size.max(1))
            .min_idle(Some(0))
            .build_unchecked(client);

        tracing::debug!(
            "Redis pool created for {}:{} (max {} connections)",
            options.host,
            options.port,
            options.pool_size
        );

        Ok(Self { pool })
    }

    fn lease(&self) -> Result<r2d2::PooledConnection<redis::Client>, BackendError> {
        self.pool
            .get()
            .map_err(|e| BackendError::Connection(e.to_string()))
    }
}

fn command_error(err: RedisError) -> BackendError {
    if err.is_io_error()
        || err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.is_timeout()
    {
        BackendError::Connection(err.to_string())
    } else {
        BackendError::Protocol(err.to_string())
    }
}

impl KvBackend for RedisBackend {
    fn hash_get_all(&self, key: &str) -> Result<Option<FieldMap>, BackendError> {
        let mut conn = self.lease()?;
        let fields: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(key)
            .query(&mut *conn)
            .map_err(command_error)?;

        // Redis never keeps an empty hash, so no fields means no key
        if fields.is_empty() {
            Ok(None)
        } else {
            Ok(Some(fields))
        }
    }

    fn hash_set_all(&self, key: &str, fields: &FieldMap) -> Result<(), BackendError> {
        let mut conn = self.lease()?;
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in fields {
            cmd.arg(field).arg(value);
        }
        cmd.query::<()>(&mut *conn).map_err(command_error)
    }

    fn set_add(&self, set: &str, member: &str) -> Result<(), BackendError> {
        let mut conn = self.lease()?;
        redis::cmd("SADD")
            .arg(set)
            .arg(member)
            .query::<()>(&mut *conn)
            .map_err(command_error)
    }

    fn set_remove(&self, set: &str, member: &str) -> Result<(), BackendError> {
        let mut conn = self.lease()?;
        redis::cmd("SREM")
            .arg(set)
            .arg(member)
            .query::<()>(&mut *conn)
            .map_err(command_error)
    }

    fn set_members(&self, set: &str) -> Result<Vec<String>, BackendError> {
        let mut conn = self.lease()?;
        redis::cmd("SMEMBERS")
            .arg(set)
            .query(&mut *conn)
            .map_err(command_error)
    }

    fn delete_key(&self, key: &str) -> Result<(), BackendError> {
        let mut conn = self.lease()?;
        redis::cmd("DEL")
            .arg(key)
            .query::<()>(&mut *conn)
            .map_err(command_error)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, BackendError> {
        let mut conn = self.lease()?;
        let conn: &mut redis::Connection = &mut conn;
        let keys = conn
            .scan_match::<_, String>(format!("{}*", prefix))
            .map_err(command_error)?
            .collect();
        Ok(keys)
    }
}
