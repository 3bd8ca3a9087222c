use host_integration::{config::HostProcessorConfig, node::TestNode};

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub async fn create_node() -> TestNode {
    init_logging();
    TestNode::new(HostProcessorConfig::default()).await
}
