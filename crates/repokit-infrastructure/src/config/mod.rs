mod store;

pub use store::{StoreConfig, ENV_BUSY_TIMEOUT_MS, ENV_DATABASE_URL, ENV_MAX_CONNECTIONS};
