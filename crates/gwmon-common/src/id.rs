use snowflake::SnowflakeIdBucket;
use std::sync::Mutex;

/// Largest machine or node id a snowflake bucket accepts (5 bits each).
pub const MAX_SNOWFLAKE_ID: i32 = 31;

struct Generator {
    machine_id: i32,
    node_id: i32,
    bucket: SnowflakeIdBucket,
}

static ID_GENERATOR: Mutex<Option<Generator>> = Mutex::new(None);

/// Configures the process-wide snowflake generator.
///
/// Re-initializing with the ids already in use keeps the running bucket, so
/// its sequence is not reset.
pub fn init(machine_id: i32, node_id: i32) {
    let mut gen = ID_GENERATOR.lock().unwrap_or_else(|e| e.into_inner());
    if matches!(&*gen, Some(g) if g.machine_id == machine_id && g.node_id == node_id) {
        return;
    }
    *gen = Some(Generator {
        machine_id,
        node_id,
        bucket: SnowflakeIdBucket::new(machine_id, node_id),
    });
}

/// Next id from the process-wide generator, in decimal form. Falls back to
/// machine 1 / node 1 if [`init`] was never called.
pub fn next_id() -> String {
    let mut gen = ID_GENERATOR.lock().unwrap_or_else(|e| e.into_inner());
    let gen = gen.get_or_insert_with(|| Generator {
        machine_id: 1,
        node_id: 1,
        bucket: SnowflakeIdBucket::new(1, 1),
    });
    gen.bucket.get_id().to_string()
}

/// Supplies the gateway identifier attached to every cloud sync.
///
/// Called once per sync attempt; implementations may return a fresh value on
/// every call.
pub trait GatewayIdentity: Send + Sync {
    fn current_identifier(&self) -> String;
}

/// [`GatewayIdentity`] drawing from the process-wide snowflake generator.
pub struct SnowflakeIdentity;

impl SnowflakeIdentity {
    pub fn new(machine_id: i32, node_id: i32) -> Self {
        init(machine_id, node_id);
        Self
    }
}

impl GatewayIdentity for SnowflakeIdentity {
    fn current_identifier(&self) -> String {
        next_id()
    }
}

/// A fixed identifier, for gateways provisioned with a static hardware ID.
pub struct StaticIdentity(pub String);

impl GatewayIdentity for StaticIdentity {
    fn current_identifier(&self) -> String {
        self.0.clone()
    }
}
