use serde::{Deserialize, Serialize};

/// Remote conversation thread. The service owns the message history; this
/// side keeps only the id and refetches snapshots on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    pub created_at: i64,
}
